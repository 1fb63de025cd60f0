use std::path::PathBuf;

pub const APP_NAME: &str = "glacic";
pub const DEFAULT_CONFIG_FILE: &str = "glacic.hcl";

const SYSTEM_CONFIG_DIR: &str = "/etc/glacic";
const SYSTEM_STATE_DIR: &str = "/var/lib/glacic";
const SYSTEM_RUN_DIR: &str = "/run/glacic";

#[derive(Clone, Copy)]
enum Kind {
    Config,
    State,
    Run,
}

impl Kind {
    fn env_var(self) -> &'static str {
        match self {
            Self::Config => "GLACIC_CONFIG_DIR",
            Self::State => "GLACIC_STATE_DIR",
            Self::Run => "GLACIC_RUN_DIR",
        }
    }

    fn prefix_subdir(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::State => "state",
            Self::Run => "run",
        }
    }

    fn system_dir(self) -> &'static str {
        match self {
            Self::Config => SYSTEM_CONFIG_DIR,
            Self::State => SYSTEM_STATE_DIR,
            Self::Run => SYSTEM_RUN_DIR,
        }
    }
}

fn effective_uid() -> u32 {
    #[cfg(unix)]
    {
        // SAFETY: `geteuid` has no preconditions and returns caller effective UID.
        unsafe { libc::geteuid() }
    }
    #[cfg(not(unix))]
    {
        u32::MAX
    }
}

fn non_empty_env(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn user_dir(kind: Kind) -> PathBuf {
    let Some(dirs) = directories::ProjectDirs::from("", "", APP_NAME) else {
        return std::env::temp_dir().join(format!("{APP_NAME}-{}", kind.prefix_subdir()));
    };
    match kind {
        Kind::Config => dirs.config_dir().to_path_buf(),
        Kind::State => dirs
            .state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf(),
        Kind::Run => dirs
            .runtime_dir()
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::temp_dir().join(format!("{APP_NAME}-{}", effective_uid()))
            }),
    }
}

fn resolve(kind: Kind, uid: u32) -> PathBuf {
    if let Some(dir) = non_empty_env(kind.env_var()) {
        return dir;
    }
    if let Some(prefix) = non_empty_env("GLACIC_PREFIX") {
        return prefix.join(kind.prefix_subdir());
    }
    if uid == 0 {
        return PathBuf::from(kind.system_dir());
    }
    user_dir(kind)
}

/// Directory holding the firewall config and its `backups/` directory.
pub fn config_dir() -> PathBuf {
    resolve(Kind::Config, effective_uid())
}

/// Persistent state such as safe-mode hints.
pub fn state_dir() -> PathBuf {
    resolve(Kind::State, effective_uid())
}

pub fn run_dir() -> PathBuf {
    resolve(Kind::Run, effective_uid())
}

pub fn default_config_file() -> PathBuf {
    config_dir().join(DEFAULT_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 4] = [
        "GLACIC_CONFIG_DIR",
        "GLACIC_STATE_DIR",
        "GLACIC_RUN_DIR",
        "GLACIC_PREFIX",
    ];

    struct EnvGuard(Vec<(&'static str, Option<std::ffi::OsString>)>);

    impl EnvGuard {
        fn clear() -> Self {
            let saved = VARS.iter().map(|v| (*v, std::env::var_os(v))).collect();
            for var in VARS {
                // SAFETY: tests touching the environment are serialized.
                unsafe { std::env::remove_var(var) };
            }
            Self(saved)
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (var, value) in &self.0 {
                // SAFETY: tests touching the environment are serialized.
                unsafe {
                    match value {
                        Some(v) => std::env::set_var(var, v),
                        None => std::env::remove_var(var),
                    }
                }
            }
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_explicit_overrides_win() {
        let _guard = EnvGuard::clear();
        // SAFETY: serialized test.
        unsafe {
            std::env::set_var("GLACIC_CONFIG_DIR", "/tmp/cfg");
            std::env::set_var("GLACIC_PREFIX", "/opt/glacic");
        }
        assert_eq!(config_dir(), PathBuf::from("/tmp/cfg"));
        assert_eq!(default_config_file(), PathBuf::from("/tmp/cfg/glacic.hcl"));
        assert_eq!(state_dir(), PathBuf::from("/opt/glacic/state"));
        assert_eq!(run_dir(), PathBuf::from("/opt/glacic/run"));
    }

    #[test]
    #[serial_test::serial]
    fn test_empty_override_is_ignored() {
        let _guard = EnvGuard::clear();
        // SAFETY: serialized test.
        unsafe {
            std::env::set_var("GLACIC_STATE_DIR", "");
            std::env::set_var("GLACIC_PREFIX", "/srv");
        }
        assert_eq!(state_dir(), PathBuf::from("/srv/state"));
    }

    #[test]
    #[serial_test::serial]
    fn test_root_uses_system_dirs() {
        let _guard = EnvGuard::clear();
        assert_eq!(resolve(Kind::Config, 0), PathBuf::from("/etc/glacic"));
        assert_eq!(resolve(Kind::State, 0), PathBuf::from("/var/lib/glacic"));
        assert_eq!(resolve(Kind::Run, 0), PathBuf::from("/run/glacic"));
        assert_ne!(resolve(Kind::Config, 1000), PathBuf::from("/etc/glacic"));
    }
}
