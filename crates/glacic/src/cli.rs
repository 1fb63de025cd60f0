use std::path::PathBuf;

use clap::{Parser, Subcommand};
use glacic_core::{Direction, OutputFormat};

#[derive(Parser)]
#[command(name = "glacic")]
#[command(about = "Glacic: firewall configuration and seamless upgrade")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (defaults to glacic.hcl in the config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load the config strictly and report validation findings
    Check,

    /// Inspect and edit the config file in place
    Config {
        #[command(subcommand)]
        cmd: ConfigCommands,
    },

    /// Manage versioned config backups
    Backup {
        #[command(subcommand)]
        cmd: BackupCommands,
    },

    /// Encode a DHCP option the way a scope's `options` map would
    DhcpOption {
        /// Option name or code, e.g. `router` or `66`
        key: String,

        /// Value, optionally prefixed with its type (`ip:`, `str:`, `hex:`, `u8:`...)
        value: String,
    },

    /// Print each zone's compiled match expression
    Zones {
        #[arg(long, value_enum, default_value = "in")]
        direction: Direction,
    },

    /// Hand this process's sockets and state to a new binary
    Upgrade {
        /// Path of the new binary
        #[arg(long)]
        binary: PathBuf,

        /// Rendezvous socket path
        #[arg(long)]
        socket: Option<PathBuf>,

        /// State file path
        #[arg(long)]
        state_file: Option<PathBuf>,

        /// Seconds to wait at each handoff step
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the config file (or the decoded model with --format json)
    Show,

    /// List top-level blocks
    Sections,

    /// Print one block
    Get {
        /// Block type, e.g. `zone`
        kind: String,

        /// Block labels, e.g. `lan`
        labels: Vec<String>,
    },

    /// Replace or add one block from a file
    Set {
        kind: String,

        labels: Vec<String>,

        /// File holding the new block text
        #[arg(long)]
        file: PathBuf,
    },

    /// Remove one block
    Remove { kind: String, labels: Vec<String> },

    /// Reformat the file
    Format {
        /// Write the result back instead of printing it
        #[arg(long)]
        write: bool,
    },

    /// Migrate the file to a newer schema version, keeping comments
    Migrate {
        /// Target version (defaults to current)
        #[arg(long)]
        to: Option<String>,
    },

    /// Show what `format --write` would change
    Diff,

    /// Comment out blocks that fail to load and show what was skipped
    Salvage {
        /// Write the salvaged text back
        #[arg(long)]
        write: bool,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Snapshot the current config
    Create {
        #[arg(short, long, default_value = "")]
        description: String,

        /// Exempt the backup from pruning
        #[arg(long)]
        pin: bool,
    },

    List,

    /// Print a backup's content
    Show { version: u32 },

    /// Replace the config with a backup
    Restore {
        version: u32,

        /// Refuse backups with an older schema instead of migrating them
        #[arg(long)]
        no_migrate: bool,
    },

    Pin { version: u32 },

    Unpin { version: u32 },

    Delete { version: u32 },

    /// Diff a backup against the current config
    Compare { version: u32 },

    Stats,

    /// Check that a backup loads and validates
    Validate { version: u32 },

    /// Change how many unpinned backups are kept
    SetMax { max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["glacic", "check", "--config", "/tmp/fw.hcl"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Check)));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/fw.hcl")));
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_config_set_requires_file() {
        assert!(Cli::try_parse_from(["glacic", "config", "set", "zone", "lan"]).is_err());
        let cli = Cli::try_parse_from([
            "glacic", "config", "set", "zone", "lan", "--file", "lan.hcl",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Config {
                cmd: ConfigCommands::Set { kind, labels, file },
            }) => {
                assert_eq!(kind, "zone");
                assert_eq!(labels, vec!["lan"]);
                assert_eq!(file, PathBuf::from("lan.hcl"));
            }
            _ => panic!("expected config set command"),
        }
    }

    #[test]
    fn test_backup_restore_flags() {
        let cli = Cli::try_parse_from(["glacic", "backup", "restore", "3", "--no-migrate"]).unwrap();
        match cli.command {
            Some(Commands::Backup {
                cmd: BackupCommands::Restore {
                    version,
                    no_migrate,
                },
            }) => {
                assert_eq!(version, 3);
                assert!(no_migrate);
            }
            _ => panic!("expected backup restore command"),
        }
    }

    #[test]
    fn test_zones_direction() {
        let cli = Cli::try_parse_from(["glacic", "zones", "--direction", "out"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Zones {
                direction: Direction::Out
            })
        ));
    }

    #[test]
    fn test_no_subcommand_is_allowed() {
        let cli = Cli::try_parse_from(["glacic"]).unwrap();
        assert!(cli.command.is_none());
    }
}
