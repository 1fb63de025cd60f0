use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use glacic_upgrade::{UpgradeManager, signals};
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling upgrade");
            token.cancel();
        }
    });
}

fn build_manager(
    socket: Option<PathBuf>,
    state_file: Option<PathBuf>,
    timeout: Duration,
) -> UpgradeManager {
    let mut manager = UpgradeManager::new();
    if let Some(socket) = socket {
        manager.set_socket_path(socket);
    }
    if let Some(state_file) = state_file {
        manager.set_state_file(state_file);
    }
    manager.set_handoff_timeout(timeout);
    manager
}

pub(crate) async fn handle_upgrade(
    config_path: &Path,
    binary: &Path,
    socket: Option<PathBuf>,
    state_file: Option<PathBuf>,
    timeout: Duration,
) -> Result<()> {
    let config = glacic_config::load_file(config_path)?;
    glacic_config::validate(&config).into_result()?;
    let binary = binary
        .canonicalize()
        .with_context(|| format!("new binary not found: {}", binary.display()))?;

    // The new process reports readiness with SIGUSR1; without a handler
    // that signal would terminate this process.
    let mut ready = signal(SignalKind::user_defined1()).context("failed to install SIGUSR1 handler")?;

    let manager = build_manager(socket, state_file, timeout);
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    manager
        .initiate_upgrade(&cancel, &binary, &config, config_path)
        .await?;

    match tokio::time::timeout(timeout, ready.recv()).await {
        Ok(Some(())) => info!("new process reported ready"),
        _ => warn!("new process did not report readiness in time"),
    }
    eprintln!("Handed off to {}", binary.display());
    Ok(())
}

/// Entry point when started by an upgrading process.
pub(crate) async fn handle_standby(config_path: &Path) -> Result<()> {
    let manager = UpgradeManager::from_env();
    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    manager.run_standby(&cancel, config_path).await?;

    let names = manager.listener_names();
    info!(endpoints = names.len(), "took over from previous process");
    for name in &names {
        if let Ok(Some(endpoint)) = manager.get_listener(name) {
            info!(name = %name, addr = %endpoint.local_addr().unwrap_or_default(), "listener ready");
        }
    }

    if let Some(parent) = signals::upgrade_parent_pid()
        && let Err(e) = signals::notify_ready(parent)
    {
        warn!(error = %e, parent, "failed to notify previous process");
    }
    Ok(())
}
