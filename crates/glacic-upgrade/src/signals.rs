use anyhow::{Context, Result, bail};
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::manager::UPGRADE_PID_ENV;

/// Runs `callback` on every SIGUSR2 until `cancel` fires.
pub fn on_handoff_signal<F>(cancel: CancellationToken, callback: F) -> Result<JoinHandle<()>>
where
    F: Fn() + Send + 'static,
{
    let mut handoff =
        signal(SignalKind::user_defined2()).context("failed to install SIGUSR2 handler")?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = handoff.recv() => {
                    if received.is_none() {
                        return;
                    }
                    tracing::info!("received upgrade signal");
                    callback();
                }
            }
        }
    }))
}

/// Sends SIGUSR1 to `pid` to report readiness.
pub fn notify_ready(pid: u32) -> Result<()> {
    let pid = libc::pid_t::try_from(pid).with_context(|| format!("pid out of range: {pid}"))?;
    // SAFETY: `kill` has no memory-safety preconditions; a bad pid yields an error code.
    let rc = unsafe { libc::kill(pid, libc::SIGUSR1) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        bail!("failed to signal process {pid}: {err}");
    }
    Ok(())
}

/// PID of the process that started this one for an upgrade, if any.
pub fn upgrade_parent_pid() -> Option<u32> {
    std::env::var(UPGRADE_PID_ENV).ok()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn handoff_signal_invokes_callback() -> Result<()> {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let task = on_handoff_signal(cancel.clone(), move || {
            let _ = tx.send(());
        })?;

        // SAFETY: the SIGUSR2 handler above is installed, so the default
        // terminate action does not apply.
        unsafe { libc::kill(libc::getpid(), libc::SIGUSR2) };
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await?
            .context("callback channel closed")?;

        cancel.cancel();
        task.await?;
        Ok(())
    }

    #[tokio::test]
    async fn notify_ready_delivers_sigusr1() -> Result<()> {
        let mut ready = signal(SignalKind::user_defined1())?;
        notify_ready(std::process::id())?;
        tokio::time::timeout(Duration::from_secs(5), ready.recv())
            .await?
            .context("signal stream closed")?;
        Ok(())
    }

    #[test]
    fn test_notify_ready_rejects_out_of_range_pid() {
        assert!(notify_ready(u32::MAX).is_err());
    }
}
