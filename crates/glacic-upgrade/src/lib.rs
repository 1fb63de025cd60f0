//! Seamless binary replacement: state snapshot, delta sync and socket
//! handoff between the running process and its successor.

pub mod delta;
pub mod endpoint;
pub mod handoff;
pub mod manager;
pub mod protocol;
pub mod signals;
pub(crate) mod socket;
pub mod state;

pub use delta::DeltaCollector;
pub use endpoint::{Endpoint, EndpointKind};
pub use manager::{
    DEFAULT_SOCKET_PATH, DEFAULT_STATE_FILE, HANDOFF_TIMEOUT, SOCKET_ENV, STANDBY_ENV,
    STATE_FILE_ENV, UPGRADE_PID_ENV, UpgradeManager,
};
pub use protocol::Message;
pub use state::{
    ConntrackEntry, DhcpLease, DnsCacheEntry, ListenerInfo, StateDelta, TaskStatus, UpgradeState,
};
