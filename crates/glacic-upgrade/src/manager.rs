//! Zero-downtime upgrade coordination.
//!
//! The old process snapshots its state, spawns the new binary in standby
//! mode and meets it on a Unix socket twice: phase 1 streams deltas as
//! JSON lines, phase 2 passes the registered sockets with `SCM_RIGHTS`.
//! The new process side is [`UpgradeManager::run_standby`].

use std::collections::BTreeMap;
use std::os::fd::AsFd;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use glacic_config::Config;
use glacic_core::{ConfigError, UpgradeFailure};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::delta::DeltaCollector;
use crate::endpoint::{Endpoint, EndpointKind};
use crate::handoff;
use crate::protocol::{self, Message};
use crate::socket;
use crate::state::{
    ConntrackEntry, DhcpLease, DnsCacheEntry, ListenerInfo, StateDelta, TaskStatus, UpgradeState,
    read_state_file, write_state_file,
};

pub const DEFAULT_SOCKET_PATH: &str = "/run/firewall/upgrade.sock";
pub const DEFAULT_STATE_FILE: &str = "/run/firewall/upgrade-state.gob";
pub const HANDOFF_TIMEOUT: Duration = Duration::from_secs(30);

/// Set for the new process to the old process's PID.
pub const UPGRADE_PID_ENV: &str = "FIREWALL_UPGRADE_PID";
/// Set to `1` for the new process so it starts in standby mode.
pub const STANDBY_ENV: &str = "GLACIC_UPGRADE_STANDBY";
/// Rendezvous socket and state file locations passed to the new process.
pub const SOCKET_ENV: &str = "GLACIC_UPGRADE_SOCKET";
pub const STATE_FILE_ENV: &str = "GLACIC_UPGRADE_STATE_FILE";

type Collector<T> = Arc<dyn Fn() -> Vec<T> + Send + Sync>;
type Restorer<T> = Arc<dyn Fn(&[T]) -> Result<()> + Send + Sync>;

#[derive(Clone, Default)]
struct Callbacks {
    collect_dhcp: Option<Collector<DhcpLease>>,
    collect_dns: Option<Collector<DnsCacheEntry>>,
    collect_conntrack: Option<Collector<ConntrackEntry>>,
    collect_scheduler: Option<Collector<TaskStatus>>,
    restore_dhcp: Option<Restorer<DhcpLease>>,
    restore_dns: Option<Restorer<DnsCacheEntry>>,
    restore_conntrack: Option<Restorer<ConntrackEntry>>,
    restore_scheduler: Option<Restorer<TaskStatus>>,
}

#[derive(Default)]
struct Inner {
    endpoints: BTreeMap<String, Endpoint>,
    checkpoint_id: u64,
    collector: Option<Arc<DeltaCollector>>,
    upgrade_active: bool,
    callbacks: Callbacks,
}

pub struct UpgradeManager {
    socket_path: PathBuf,
    state_file: PathBuf,
    handoff_timeout: Duration,
    inner: RwLock<Inner>,
}

impl Default for UpgradeManager {
    fn default() -> Self {
        Self::new()
    }
}

fn failure(kind: UpgradeFailure) -> anyhow::Error {
    ConfigError::Upgrade(kind).into()
}

impl UpgradeManager {
    pub fn new() -> Self {
        Self::with_paths(DEFAULT_SOCKET_PATH, DEFAULT_STATE_FILE)
    }

    pub fn with_paths(socket_path: impl Into<PathBuf>, state_file: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            state_file: state_file.into(),
            handoff_timeout: HANDOFF_TIMEOUT,
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Default paths, overridden by [`SOCKET_ENV`] and [`STATE_FILE_ENV`]
    /// when set by the upgrading process.
    pub fn from_env() -> Self {
        let var = |name: &str, default: &str| {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(default))
        };
        Self::with_paths(
            var(SOCKET_ENV, DEFAULT_SOCKET_PATH),
            var(STATE_FILE_ENV, DEFAULT_STATE_FILE),
        )
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn set_socket_path(&mut self, path: impl Into<PathBuf>) {
        self.socket_path = path.into();
    }

    pub fn state_file(&self) -> &Path {
        &self.state_file
    }

    pub fn set_state_file(&mut self, path: impl Into<PathBuf>) {
        self.state_file = path.into();
    }

    pub fn handoff_timeout(&self) -> Duration {
        self.handoff_timeout
    }

    /// Bounds each wait of the handoff: connect, ready, second connection.
    pub fn set_handoff_timeout(&mut self, timeout: Duration) {
        self.handoff_timeout = timeout;
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Endpoint registry

    pub fn register_listener(&self, name: &str, listener: impl Into<Endpoint>) -> Result<()> {
        self.register(name, listener.into(), EndpointKind::Listener)
    }

    pub fn register_packet_conn(&self, name: &str, conn: impl Into<Endpoint>) -> Result<()> {
        self.register(name, conn.into(), EndpointKind::Packet)
    }

    fn register(&self, name: &str, endpoint: Endpoint, expected: EndpointKind) -> Result<()> {
        handoff::check_endpoint_name(name)?;
        if endpoint.kind() != expected {
            bail!(
                "endpoint {name} is a {} socket and cannot be registered as {}",
                endpoint.network(),
                match expected {
                    EndpointKind::Listener => "a listener",
                    EndpointKind::Packet => "a packet endpoint",
                }
            );
        }
        let network = endpoint.network();
        self.write().endpoints.insert(name.to_string(), endpoint);
        tracing::info!(name, network, "registered endpoint for upgrade handoff");
        Ok(())
    }

    /// Stops tracking `name` and hands the socket back to the caller.
    pub fn unregister(&self, name: &str) -> Option<Endpoint> {
        self.write().endpoints.remove(name)
    }

    pub fn listener_names(&self) -> Vec<String> {
        self.read().endpoints.keys().cloned().collect()
    }

    /// A duplicate of the named stream listener.
    pub fn get_listener(&self, name: &str) -> Result<Option<Endpoint>> {
        self.get_endpoint(name, EndpointKind::Listener)
    }

    /// A duplicate of the named datagram socket.
    pub fn get_packet_conn(&self, name: &str) -> Result<Option<Endpoint>> {
        self.get_endpoint(name, EndpointKind::Packet)
    }

    fn get_endpoint(&self, name: &str, kind: EndpointKind) -> Result<Option<Endpoint>> {
        let inner = self.read();
        match inner.endpoints.get(name) {
            Some(endpoint) if endpoint.kind() == kind => endpoint.try_clone().map(Some),
            _ => Ok(None),
        }
    }

    // State callbacks

    pub fn set_dhcp_collector(&self, f: impl Fn() -> Vec<DhcpLease> + Send + Sync + 'static) {
        self.write().callbacks.collect_dhcp = Some(Arc::new(f));
    }

    pub fn set_dns_collector(&self, f: impl Fn() -> Vec<DnsCacheEntry> + Send + Sync + 'static) {
        self.write().callbacks.collect_dns = Some(Arc::new(f));
    }

    pub fn set_conntrack_collector(
        &self,
        f: impl Fn() -> Vec<ConntrackEntry> + Send + Sync + 'static,
    ) {
        self.write().callbacks.collect_conntrack = Some(Arc::new(f));
    }

    pub fn set_scheduler_collector(&self, f: impl Fn() -> Vec<TaskStatus> + Send + Sync + 'static) {
        self.write().callbacks.collect_scheduler = Some(Arc::new(f));
    }

    pub fn set_dhcp_restorer(
        &self,
        f: impl Fn(&[DhcpLease]) -> Result<()> + Send + Sync + 'static,
    ) {
        self.write().callbacks.restore_dhcp = Some(Arc::new(f));
    }

    pub fn set_dns_restorer(
        &self,
        f: impl Fn(&[DnsCacheEntry]) -> Result<()> + Send + Sync + 'static,
    ) {
        self.write().callbacks.restore_dns = Some(Arc::new(f));
    }

    pub fn set_conntrack_restorer(
        &self,
        f: impl Fn(&[ConntrackEntry]) -> Result<()> + Send + Sync + 'static,
    ) {
        self.write().callbacks.restore_conntrack = Some(Arc::new(f));
    }

    pub fn set_scheduler_restorer(
        &self,
        f: impl Fn(&[TaskStatus]) -> Result<()> + Send + Sync + 'static,
    ) {
        self.write().callbacks.restore_scheduler = Some(Arc::new(f));
    }

    // Snapshot

    /// Snapshots config, collector output and endpoint descriptions.
    /// Collectors run after the lock is released.
    pub fn collect_state(&self, config: &Config, config_path: &Path) -> UpgradeState {
        let (callbacks, listeners, checkpoint_id) = {
            let inner = self.read();
            let listeners: Vec<ListenerInfo> = inner
                .endpoints
                .iter()
                .map(|(name, endpoint)| ListenerInfo {
                    network: endpoint.network().to_string(),
                    address: endpoint.local_addr().unwrap_or_default(),
                    name: name.clone(),
                })
                .collect();
            (inner.callbacks.clone(), listeners, inner.checkpoint_id)
        };

        let mut state = UpgradeState {
            config_path: config_path.to_path_buf(),
            config: config.clone(),
            dhcp_leases: Vec::new(),
            dns_cache: Vec::new(),
            conntrack_entries: Vec::new(),
            listeners,
            scheduler_state: Vec::new(),
            checkpoint_id,
            version: env!("CARGO_PKG_VERSION").to_string(),
            upgrade_time: Utc::now(),
            pid: std::process::id(),
        };
        if let Some(collect) = &callbacks.collect_dhcp {
            state.dhcp_leases = collect();
            tracing::info!(count = state.dhcp_leases.len(), "collected DHCP leases");
        }
        if let Some(collect) = &callbacks.collect_dns {
            state.dns_cache = collect();
            tracing::info!(count = state.dns_cache.len(), "collected DNS cache entries");
        }
        if let Some(collect) = &callbacks.collect_conntrack {
            state.conntrack_entries = collect();
            tracing::info!(count = state.conntrack_entries.len(), "collected conntrack entries");
        }
        if let Some(collect) = &callbacks.collect_scheduler {
            state.scheduler_state = collect();
            tracing::info!(count = state.scheduler_state.len(), "collected scheduler state");
        }
        state
    }

    pub fn save_state(&self, state: &UpgradeState) -> Result<()> {
        write_state_file(&self.state_file, state)?;
        tracing::info!(path = %self.state_file.display(), "saved upgrade state");
        Ok(())
    }

    pub fn load_state(&self) -> Result<UpgradeState> {
        let state = read_state_file(&self.state_file)?;
        tracing::info!(
            version = %state.version,
            pid = state.pid,
            leases = state.dhcp_leases.len(),
            dns_cache = state.dns_cache.len(),
            "loaded upgrade state"
        );
        Ok(state)
    }

    /// Hands each kind of state to its restorer. A failing restorer is
    /// logged and the rest still run.
    pub fn restore_state(&self, state: &UpgradeState) {
        let callbacks = self.read().callbacks.clone();
        run_restorer("DHCP leases", &callbacks.restore_dhcp, &state.dhcp_leases);
        run_restorer("DNS cache", &callbacks.restore_dns, &state.dns_cache);
        run_restorer(
            "conntrack entries",
            &callbacks.restore_conntrack,
            &state.conntrack_entries,
        );
        run_restorer(
            "scheduler state",
            &callbacks.restore_scheduler,
            &state.scheduler_state,
        );
    }

    /// Removes the state file; a missing file is fine.
    pub fn cleanup_state(&self) -> Result<()> {
        match std::fs::remove_file(&self.state_file) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err).with_context(|| {
                format!("failed to remove state file {}", self.state_file.display())
            }),
        }
    }

    // Delta recording

    pub fn is_upgrade_active(&self) -> bool {
        self.read().upgrade_active
    }

    pub fn delta_collector(&self) -> Option<Arc<DeltaCollector>> {
        self.read().collector.clone()
    }

    fn active_collector(&self) -> Option<Arc<DeltaCollector>> {
        let inner = self.read();
        if inner.upgrade_active {
            inner.collector.clone()
        } else {
            None
        }
    }

    pub fn record_dhcp_lease(&self, lease: DhcpLease) {
        if let Some(collector) = self.active_collector() {
            collector.record_lease(lease);
        }
    }

    pub fn record_dhcp_release(&self, mac: &str) {
        if let Some(collector) = self.active_collector() {
            collector.record_release(mac);
        }
    }

    pub fn record_dns_cache(&self, entry: DnsCacheEntry) {
        if let Some(collector) = self.active_collector() {
            collector.record_dns(entry);
        }
    }

    fn stop_delta_collection(&self) {
        let mut inner = self.write();
        if let Some(collector) = &inner.collector {
            collector.stop();
        }
        inner.upgrade_active = false;
    }

    // Old side

    /// Hands this process's sockets and state to `new_binary`.
    ///
    /// On success the caller should exit. On failure the spawned process
    /// has been killed and this process keeps serving.
    pub async fn initiate_upgrade(
        &self,
        cancel: &CancellationToken,
        new_binary: &Path,
        config: &Config,
        config_path: &Path,
    ) -> Result<()> {
        tracing::info!(new_binary = %new_binary.display(), "initiating seamless upgrade");
        let listener = self.begin_upgrade(config, config_path).await?;

        let mut child = match self.spawn_standby(new_binary, config_path) {
            Ok(child) => child,
            Err(err) => {
                self.stop_delta_collection();
                self.remove_socket().await;
                return Err(failure(UpgradeFailure::Spawn(format!("{err:#}"))));
            }
        };
        let child_pid = child.id().unwrap_or_default();
        tracing::info!(
            new_pid = child_pid,
            old_pid = std::process::id(),
            "started new process in standby mode"
        );

        let result = self
            .coordinate(&listener, Some(&mut child), child_pid, cancel)
            .await;
        if result.is_err() {
            kill_child(&mut child).await;
        }
        drop(listener);
        self.remove_socket().await;
        if result.is_ok() {
            tracing::info!("upgrade complete, old process may exit");
        }
        result
    }

    /// Steps before the spawn: start delta collection, write the state
    /// file, bind the rendezvous socket.
    async fn begin_upgrade(&self, config: &Config, config_path: &Path) -> Result<UnixListener> {
        let checkpoint_id = {
            let mut inner = self.write();
            inner.checkpoint_id += 1;
            inner.collector = Some(Arc::new(DeltaCollector::new(inner.checkpoint_id)));
            inner.upgrade_active = true;
            inner.checkpoint_id
        };
        tracing::info!(checkpoint_id, "started delta collection");

        let state = self.collect_state(config, config_path);
        if let Err(err) = self.save_state(&state) {
            self.stop_delta_collection();
            return Err(failure(UpgradeFailure::StateSave(format!("{err:#}"))));
        }

        match socket::bind_listener(&self.socket_path).await {
            Ok(listener) => Ok(listener),
            Err(err) => {
                self.stop_delta_collection();
                Err(failure(UpgradeFailure::SocketCreate(format!("{err:#}"))))
            }
        }
    }

    async fn coordinate(
        &self,
        listener: &UnixListener,
        mut child: Option<&mut Child>,
        child_pid: u32,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let timeout = self.handoff_timeout;

        let conn = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(err) => {
                    self.stop_delta_collection();
                    return Err(failure(UpgradeFailure::NotReady(format!(
                        "failed to accept upgrade connection: {err}"
                    ))));
                }
            },
            status = wait_for_exit(child.as_deref_mut()) => {
                self.stop_delta_collection();
                return Err(failure(UpgradeFailure::ChildExited(status)));
            }
            _ = tokio::time::sleep(timeout) => {
                self.stop_delta_collection();
                return Err(failure(UpgradeFailure::ConnectTimeout));
            }
            _ = cancel.cancelled() => {
                self.stop_delta_collection();
                return Err(failure(UpgradeFailure::Cancelled));
            }
        };

        let phase_one = tokio::select! {
            synced = tokio::time::timeout(timeout, self.sync_deltas(conn, child_pid)) => {
                synced.unwrap_or_else(|_| Err(failure(UpgradeFailure::NotReady(
                    "timed out during delta sync".to_string(),
                ))))
            }
            status = wait_for_exit(child.as_deref_mut()) => {
                Err(failure(UpgradeFailure::ChildExited(status)))
            }
            _ = cancel.cancelled() => Err(failure(UpgradeFailure::Cancelled)),
        };
        if let Err(err) = phase_one {
            self.stop_delta_collection();
            return Err(err);
        }
        tracing::info!("delta sync complete, waiting for listener handoff connection");

        let conn = tokio::select! {
            accepted = listener.accept() => accepted
                .map(|(stream, _)| stream)
                .map_err(|err| failure(UpgradeFailure::Handoff(format!(
                    "failed to accept listener connection: {err}"
                ))))?,
            status = wait_for_exit(child.as_deref_mut()) => {
                return Err(failure(UpgradeFailure::ChildExited(status)));
            }
            _ = tokio::time::sleep(timeout) => return Err(failure(UpgradeFailure::ListenerTimeout)),
            _ = cancel.cancelled() => return Err(failure(UpgradeFailure::Cancelled)),
        };

        self.handoff_endpoints(conn)
            .await
            .map_err(|err| failure(UpgradeFailure::Handoff(format!("{err:#}"))))
    }

    /// Phase 1: ready check, then deltas until `delta_complete`.
    async fn sync_deltas(&self, conn: UnixStream, child_pid: u32) -> Result<()> {
        let (read_half, mut write_half) = conn.into_split();
        let mut reader = BufReader::new(read_half);
        wait_for_ready(&mut reader, child_pid).await?;

        self.send_deltas(&mut write_half)
            .await
            .map_err(|err| failure(UpgradeFailure::DeltaSend(format!("{err:#}"))))?;
        self.stop_delta_collection();
        self.send_final_delta(&mut write_half)
            .await
            .map_err(|err| failure(UpgradeFailure::DeltaSend(format!("{err:#}"))))
    }

    async fn send_deltas<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(collector) = self.delta_collector() else {
            return Ok(());
        };
        if collector.is_empty() {
            tracing::info!("no deltas to send");
            return Ok(());
        }
        let delta = collector.flush();
        log_delta("sending delta", &delta);
        protocol::write_message(writer, &Message::Delta { delta }).await
    }

    async fn send_final_delta<W>(&self, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if let Some(collector) = self.delta_collector() {
            let delta = collector.flush();
            if !delta.is_empty() {
                log_delta("sending final delta", &delta);
                protocol::write_message(writer, &Message::Delta { delta }).await?;
            }
        }
        protocol::write_message(writer, &Message::DeltaComplete).await
    }

    /// Phase 2: one descriptor per registered endpoint. The duplicates are
    /// closed after sending and the stream is closed to mark the end.
    async fn handoff_endpoints(&self, conn: UnixStream) -> Result<()> {
        let endpoints: Vec<(String, Endpoint)> = {
            let inner = self.read();
            inner
                .endpoints
                .iter()
                .filter_map(|(name, endpoint)| match endpoint.try_clone() {
                    Ok(dup) => Some((name.clone(), dup)),
                    Err(err) => {
                        tracing::warn!(name = %name, error = %err, "failed to duplicate endpoint");
                        None
                    }
                })
                .collect()
        };

        let stream = socket::into_blocking(conn)?;
        stream
            .set_write_timeout(Some(self.handoff_timeout))
            .context("failed to set handoff write timeout")?;
        tokio::task::spawn_blocking(move || handoff::send_endpoints(&stream, &endpoints))
            .await
            .context("endpoint handoff task failed")?
    }

    /// Spawns the new binary with this process's own stdout and stderr
    /// descriptors, so its output outlives this process.
    fn spawn_standby(&self, new_binary: &Path, config_path: &Path) -> Result<Child> {
        let stdout = std::io::stdout()
            .as_fd()
            .try_clone_to_owned()
            .context("failed to duplicate stdout")?;
        let stderr = std::io::stderr()
            .as_fd()
            .try_clone_to_owned()
            .context("failed to duplicate stderr")?;

        let mut cmd = Command::new(new_binary);
        if let Some(arg0) = std::env::args_os().next() {
            cmd.arg0(arg0);
        }
        cmd.arg("--config")
            .arg(config_path)
            .env(UPGRADE_PID_ENV, std::process::id().to_string())
            .env(STANDBY_ENV, "1")
            .env(SOCKET_ENV, &self.socket_path)
            .env(STATE_FILE_ENV, &self.state_file)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        // SAFETY: setsid() is async-signal-safe, runs before exec in child.
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
        cmd.spawn()
            .with_context(|| format!("failed to execute {}", new_binary.display()))
    }

    async fn remove_socket(&self) {
        if let Err(err) = socket::cleanup_socket_file(&self.socket_path).await {
            tracing::warn!(error = %err, "failed to remove upgrade socket");
        }
    }

    // New side

    /// Takes over from the old process: load state and config, sync
    /// deltas, receive the sockets, delete the state file.
    pub async fn run_standby(&self, cancel: &CancellationToken, config_path: &Path) -> Result<()> {
        tracing::info!("starting in upgrade standby mode");
        let state = self.load_state().context("failed to load state")?;

        let config = match glacic_config::load_file(config_path) {
            Ok(config) => config,
            Err(err) => {
                self.send_error(&format!("failed to load config: {err:#}")).await;
                return Err(err.context("failed to load config"));
            }
        };
        if let Err(err) = glacic_config::validate(&config).into_result() {
            self.send_error(&err.to_string()).await;
            return Err(err.into());
        }
        tracing::info!("configuration validated successfully");

        self.restore_state(&state);

        let conn = tokio::select! {
            conn = socket::connect(&self.socket_path) => {
                conn.context("failed to connect to upgrade socket")?
            }
            _ = cancel.cancelled() => bail!("standby cancelled"),
        };
        let (read_half, mut write_half) = conn.into_split();
        protocol::write_message(&mut write_half, &Message::Ready {
            pid: std::process::id(),
        })
        .await
        .context("failed to send ready message")?;

        let mut reader = BufReader::new(read_half);
        tokio::select! {
            received = tokio::time::timeout(self.handoff_timeout, self.receive_deltas(&mut reader)) => {
                received
                    .map_err(|_| anyhow!("timed out waiting for deltas"))?
                    .context("failed to receive deltas")?;
            }
            _ = cancel.cancelled() => bail!("standby cancelled"),
        }
        drop(reader);
        drop(write_half);

        let conn = socket::connect(&self.socket_path)
            .await
            .context("failed to connect for listener handoff")?;
        let stream = socket::into_blocking(conn)?;
        stream
            .set_read_timeout(Some(self.handoff_timeout))
            .context("failed to set handoff read timeout")?;
        let received = tokio::task::spawn_blocking(move || handoff::receive_endpoints(&stream))
            .await
            .context("endpoint handoff task failed")?
            .context("failed to receive listeners")?;
        {
            let mut inner = self.write();
            for (name, endpoint) in received {
                inner.endpoints.insert(name, endpoint);
            }
        }

        if let Err(err) = self.cleanup_state() {
            tracing::warn!(error = %err, "failed to remove upgrade state file");
        }
        tracing::info!("upgrade standby complete, taking over");
        Ok(())
    }

    async fn receive_deltas<R>(&self, reader: &mut R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        loop {
            match protocol::read_message(reader).await? {
                Some(Message::Delta { delta }) => self.apply_delta(&delta),
                Some(Message::DeltaComplete) => {
                    tracing::info!("delta sync complete");
                    return Ok(());
                }
                Some(other) => {
                    tracing::warn!(kind = other.kind(), "unexpected message during delta sync");
                }
                None => bail!("connection closed before delta_complete"),
            }
        }
    }

    /// Released leases are only logged; they expire on their own.
    fn apply_delta(&self, delta: &StateDelta) {
        log_delta("applying delta", delta);
        let callbacks = self.read().callbacks.clone();
        run_restorer("DHCP additions", &callbacks.restore_dhcp, &delta.dhcp_added);
        run_restorer("DNS additions", &callbacks.restore_dns, &delta.dns_added);
        if !delta.dhcp_removed.is_empty() {
            tracing::info!(
                count = delta.dhcp_removed.len(),
                "DHCP leases released during upgrade"
            );
        }
    }

    async fn send_error(&self, message: &str) {
        if let Err(err) = self.try_send_error(message).await {
            tracing::warn!(error = %err, "failed to report standby failure to old process");
        }
    }

    async fn try_send_error(&self, message: &str) -> Result<()> {
        let mut conn = socket::connect(&self.socket_path).await?;
        protocol::write_message(&mut conn, &Message::Error {
            error: message.to_string(),
            pid: std::process::id(),
        })
        .await
    }
}

fn run_restorer<T>(what: &str, restorer: &Option<Restorer<T>>, items: &[T]) {
    let Some(restore) = restorer else {
        return;
    };
    if items.is_empty() {
        return;
    }
    match restore(items) {
        Ok(()) => tracing::info!(count = items.len(), "restored {what}"),
        Err(err) => tracing::warn!(error = %err, "failed to restore {what}"),
    }
}

fn log_delta(what: &str, delta: &StateDelta) {
    tracing::info!(
        checkpoint = delta.checkpoint_id,
        dhcp_added = delta.dhcp_added.len(),
        dhcp_removed = delta.dhcp_removed.len(),
        dns_added = delta.dns_added.len(),
        "{what}"
    );
}

async fn wait_for_ready<R>(reader: &mut R, expected: u32) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    match protocol::read_message(reader).await {
        Ok(Some(Message::Ready { pid })) if pid == expected => {
            tracing::info!(pid, "new process is ready");
            Ok(())
        }
        Ok(Some(Message::Ready { pid })) => Err(failure(UpgradeFailure::PidMismatch {
            expected,
            got: pid,
        })),
        Ok(Some(Message::Error { error, .. })) => Err(failure(UpgradeFailure::UnexpectedMessage {
            kind: "error".to_string(),
            error,
        })),
        Ok(Some(other)) => Err(failure(UpgradeFailure::UnexpectedMessage {
            kind: other.kind().to_string(),
            error: String::new(),
        })),
        Ok(None) => Err(failure(UpgradeFailure::NotReady(
            "connection closed before ready message".to_string(),
        ))),
        Err(err) => Err(failure(UpgradeFailure::NotReady(format!("{err:#}")))),
    }
}

async fn wait_for_exit(child: Option<&mut Child>) -> String {
    match child {
        Some(child) => match child.wait().await {
            Ok(status) => status.to_string(),
            Err(err) => err.to_string(),
        },
        None => std::future::pending().await,
    }
}

async fn kill_child(child: &mut Child) {
    tracing::info!(pid = ?child.id(), "killing new process after failed upgrade");
    if let Err(err) = child.start_kill() {
        tracing::debug!(error = %err, "new process already gone");
    }
    if let Err(err) = child.wait().await {
        tracing::debug!(error = %err, "failed to reap new process");
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
