//! Phase-1 rendezvous messages: one JSON object per line, tagged by `type`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::state::StateDelta;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Sent by the new process once state and config are loaded.
    Ready { pid: u32 },
    /// Sent by the new process instead of `ready` when it cannot take over.
    Error {
        error: String,
        #[serde(default)]
        pid: u32,
    },
    Delta { delta: StateDelta },
    DeltaComplete,
}

impl Message {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready { .. } => "ready",
            Self::Error { .. } => "error",
            Self::Delta { .. } => "delta",
            Self::DeltaComplete => "delta_complete",
        }
    }
}

pub async fn write_message<W>(writer: &mut W, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(message).context("failed to encode upgrade message")?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .with_context(|| format!("failed to send {} message", message.kind()))?;
    writer.flush().await.context("failed to flush upgrade socket")
}

/// Reads the next message; `None` at end of stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .await
            .context("failed to read upgrade message")?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        return serde_json::from_str(trimmed)
            .map(Some)
            .with_context(|| format!("failed to decode upgrade message: {trimmed}"));
    }
}
