/// Failure kinds raised by config loading, migration and validation.
///
/// These travel inside `anyhow::Error`; callers classify with
/// `err.downcast_ref::<ConfigError>()`.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("HCL parse error: {0}")]
    Parse(String),

    #[error("decode error at {field}: {message}")]
    Decode { field: String, message: String },

    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("unsupported config schema version {version} (supported: {supported})")]
    UnsupportedVersion { version: String, supported: String },

    #[error("config version {found} does not match current version {current}")]
    VersionMismatch { found: String, current: String },

    #[error(transparent)]
    Upgrade(#[from] UpgradeFailure),
}

/// Old-side and new-side failures of the upgrade handoff.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum UpgradeFailure {
    #[error("failed to save state: {0}")]
    StateSave(String),

    #[error("failed to create upgrade socket: {0}")]
    SocketCreate(String),

    #[error("failed to start new process: {0}")]
    Spawn(String),

    #[error("new process exited prematurely: {0}")]
    ChildExited(String),

    #[error("timeout waiting for new process connection")]
    ConnectTimeout,

    #[error("new process failed to become ready: {0}")]
    NotReady(String),

    #[error("PID mismatch: expected {expected}, got {got}")]
    PidMismatch { expected: u32, got: u32 },

    #[error("unexpected message type: {kind} (error: {error})")]
    UnexpectedMessage { kind: String, error: String },

    #[error("failed to send deltas: {0}")]
    DeltaSend(String),

    #[error("timeout waiting for listener connection")]
    ListenerTimeout,

    #[error("failed to hand off listeners: {0}")]
    Handoff(String),

    #[error("upgrade cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse() {
        let err = ConfigError::Parse("glacic.hcl:3:1: unexpected '}'".into());
        assert_eq!(
            err.to_string(),
            "HCL parse error: glacic.hcl:3:1: unexpected '}'"
        );
    }

    #[test]
    fn test_display_decode() {
        let err = ConfigError::Decode {
            field: "interface.eth0.mtu".into(),
            message: "expected number".into(),
        };
        assert_eq!(
            err.to_string(),
            "decode error at interface.eth0.mtu: expected number"
        );
    }

    #[test]
    fn test_display_validation_joins_entries() {
        let err = ConfigError::Validation(vec![
            "interfaces[0]: invalid interface name: 1eth".into(),
            "routes[0]: invalid gateway IP: nope".into(),
        ]);
        assert_eq!(
            err.to_string(),
            "config validation failed: interfaces[0]: invalid interface name: 1eth; routes[0]: invalid gateway IP: nope"
        );
    }

    #[test]
    fn test_display_unsupported_version() {
        let err = ConfigError::UnsupportedVersion {
            version: "2.0".into(),
            supported: "1.0".into(),
        };
        assert_eq!(
            err.to_string(),
            "unsupported config schema version 2.0 (supported: 1.0)"
        );
    }

    #[test]
    fn test_display_version_mismatch() {
        let err = ConfigError::VersionMismatch {
            found: "1.0".into(),
            current: "1.1".into(),
        };
        assert_eq!(
            err.to_string(),
            "config version 1.0 does not match current version 1.1"
        );
    }

    #[test]
    fn test_display_pid_mismatch() {
        let err = UpgradeFailure::PidMismatch {
            expected: 10,
            got: 11,
        };
        assert_eq!(err.to_string(), "PID mismatch: expected 10, got 11");
    }

    #[test]
    fn test_display_unexpected_message() {
        let err = UpgradeFailure::UnexpectedMessage {
            kind: "error".into(),
            error: "config validation failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "unexpected message type: error (error: config validation failed)"
        );
    }

    #[test]
    fn test_upgrade_failure_is_transparent_inside_config_error() {
        let err: ConfigError = UpgradeFailure::ConnectTimeout.into();
        assert_eq!(
            err.to_string(),
            "timeout waiting for new process connection"
        );
    }

    #[test]
    fn test_downcast_through_anyhow() {
        let err = anyhow::Error::new(ConfigError::Migration("boom".into()));
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::Migration(_))
        ));
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ConfigError>();
        assert_send_sync::<UpgradeFailure>();
    }
}
