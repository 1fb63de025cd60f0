//! Runtime state carried from the old process to the new one.
//!
//! The snapshot is written as CBOR so the new binary can decode it without
//! sharing anything but the serde model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use glacic_config::Config;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpLease {
    pub mac: String,
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
    pub expires: DateTime<Utc>,
    #[serde(default)]
    pub interface: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsCacheEntry {
    pub name: String,
    /// DNS RR type code.
    #[serde(rename = "type")]
    pub record_type: u16,
    pub ttl: u32,
    /// Record data in wire format.
    pub data: Vec<u8>,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConntrackEntry {
    pub protocol: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: u16,
    pub dst_port: u16,
    pub state: String,
    pub timeout: u32,
}

/// Describes one handed-off endpoint: `network` is `tcp`, `udp`, `unix`
/// or `unixgram`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListenerInfo {
    pub network: String,
    pub address: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStatus {
    pub id: String,
    pub name: String,
    pub description: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub last_duration: Option<Duration>,
    pub last_error: String,
    pub next_run: Option<DateTime<Utc>>,
    pub run_count: i64,
    pub error_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeState {
    pub config_path: PathBuf,
    pub config: Config,
    #[serde(default)]
    pub dhcp_leases: Vec<DhcpLease>,
    #[serde(default)]
    pub dns_cache: Vec<DnsCacheEntry>,
    #[serde(default)]
    pub conntrack_entries: Vec<ConntrackEntry>,
    #[serde(default)]
    pub listeners: Vec<ListenerInfo>,
    #[serde(default)]
    pub scheduler_state: Vec<TaskStatus>,
    pub checkpoint_id: u64,
    /// Version of the binary that wrote the snapshot.
    pub version: String,
    pub upgrade_time: DateTime<Utc>,
    pub pid: u32,
}

/// Changes recorded after the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDelta {
    pub checkpoint_id: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dhcp_added: Vec<DhcpLease>,
    /// MAC addresses.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dhcp_removed: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_added: Vec<DnsCacheEntry>,
    pub timestamp: DateTime<Utc>,
}

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.dhcp_added.is_empty() && self.dhcp_removed.is_empty() && self.dns_added.is_empty()
    }
}

pub fn write_state_file(path: &Path, state: &UpgradeState) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create state directory {}", parent.display()))?;
    }
    let mut data = Vec::new();
    ciborium::into_writer(state, &mut data).context("failed to encode upgrade state")?;
    std::fs::write(path, data)
        .with_context(|| format!("failed to write state file {}", path.display()))
}

pub fn read_state_file(path: &Path) -> Result<UpgradeState> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to open state file {}", path.display()))?;
    ciborium::from_reader(data.as_slice())
        .with_context(|| format!("failed to decode state file {}", path.display()))
}
