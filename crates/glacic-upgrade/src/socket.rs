#[cfg(not(target_os = "linux"))]
compile_error!("glacic-upgrade passes descriptors with SCM_RIGHTS and SO_DOMAIN; only Linux is supported");

use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use tokio::net::{UnixListener, UnixStream};

/// Binds the rendezvous socket with mode 0600, replacing any stale socket
/// file left by an interrupted upgrade.
pub(crate) async fn bind_listener(socket_path: &Path) -> Result<UnixListener> {
    if let Some(parent) = socket_path.parent()
        && !parent.exists()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create upgrade socket directory {}", parent.display()))?;
        chmod(parent, 0o755).await?;
    }
    if remove_if_present(socket_path).await? {
        tracing::debug!(path = %socket_path.display(), "removed stale upgrade socket");
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind upgrade socket {}", socket_path.display()))?;
    chmod(socket_path, 0o600).await?;
    Ok(listener)
}

pub(crate) async fn connect(socket_path: &Path) -> Result<UnixStream> {
    UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("failed to connect to upgrade socket {}", socket_path.display()))
}

pub(crate) async fn cleanup_socket_file(socket_path: &Path) -> Result<()> {
    remove_if_present(socket_path).await.map(drop)
}

/// Blocking std stream for descriptor passing.
pub(crate) fn into_blocking(stream: UnixStream) -> Result<std::os::unix::net::UnixStream> {
    let stream = stream
        .into_std()
        .context("failed to detach upgrade socket from runtime")?;
    stream
        .set_nonblocking(false)
        .context("failed to make upgrade socket blocking")?;
    Ok(stream)
}

/// `true` when a file was removed.
async fn remove_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err).with_context(|| format!("failed to remove {}", path.display())),
    }
}

async fn chmod(path: &Path, mode: u32) -> Result<()> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("failed to chmod {mode:o} {}", path.display()))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    #[tokio::test]
    async fn bind_and_connect_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let socket_path = dir.path().join("upgrade.sock");
        let listener = super::bind_listener(&socket_path).await?;

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await?;
            let (read_half, mut write_half) = stream.into_split();
            let mut reader = BufReader::new(read_half);
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            write_half.write_all(b"{\"type\":\"delta_complete\"}\n").await?;
            anyhow::Ok(line)
        });

        let mut client = super::connect(&socket_path).await?;
        client.write_all(b"{\"type\":\"ready\",\"pid\":1}\n").await?;

        let mut response = String::new();
        let mut client_reader = BufReader::new(client);
        client_reader.read_line(&mut response).await?;

        let request = server.await??;
        assert_eq!(request.trim(), "{\"type\":\"ready\",\"pid\":1}");
        assert_eq!(response.trim(), "{\"type\":\"delta_complete\"}");

        super::cleanup_socket_file(&socket_path).await?;
        assert!(!socket_path.exists());
        super::cleanup_socket_file(&socket_path).await?;
        Ok(())
    }

    #[tokio::test]
    async fn bind_listener_replaces_stale_socket() -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let socket_path = dir.path().join("run").join("upgrade.sock");
        let first = super::bind_listener(&socket_path).await?;
        drop(first);
        assert!(socket_path.exists());

        let _second = super::bind_listener(&socket_path).await?;
        let socket_mode = std::fs::metadata(&socket_path)?.permissions().mode() & 0o777;
        assert_eq!(socket_mode, 0o600);
        Ok(())
    }
}
