use std::time::Duration;

use anyhow::Result;
use clap::{CommandFactory, Parser};

mod backup_cmds;
mod check_cmd;
mod cli;
mod config_cmds;
mod upgrade_cmd;

use cli::{Cli, Commands, ConfigCommands};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing (output to stderr, initialize only once)
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let cli = Cli::parse();
    let format = cli.format;
    let config_path = cli
        .config
        .unwrap_or_else(glacic_config::paths::default_config_file);

    if std::env::var(glacic_upgrade::STANDBY_ENV).is_ok_and(|v| v == "1") {
        return upgrade_cmd::handle_standby(&config_path).await;
    }

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Check => check_cmd::handle_check(&config_path, format)?,
        Commands::Config { cmd } => match cmd {
            ConfigCommands::Show => config_cmds::handle_config_show(&config_path, format)?,
            ConfigCommands::Sections => config_cmds::handle_config_sections(&config_path, format)?,
            ConfigCommands::Get { kind, labels } => {
                config_cmds::handle_config_get(&config_path, &kind, &labels)?;
            }
            ConfigCommands::Set { kind, labels, file } => {
                config_cmds::handle_config_set(&config_path, &kind, &labels, &file)?;
            }
            ConfigCommands::Remove { kind, labels } => {
                config_cmds::handle_config_remove(&config_path, &kind, &labels)?;
            }
            ConfigCommands::Format { write } => {
                config_cmds::handle_config_format(&config_path, write)?;
            }
            ConfigCommands::Migrate { to } => {
                config_cmds::handle_config_migrate(&config_path, to.as_deref())?;
            }
            ConfigCommands::Diff => config_cmds::handle_config_diff(&config_path)?,
            ConfigCommands::Salvage { write } => {
                config_cmds::handle_config_salvage(&config_path, write)?;
            }
        },
        Commands::Backup { cmd } => backup_cmds::handle_backup(&config_path, cmd, format)?,
        Commands::DhcpOption { key, value } => {
            check_cmd::handle_dhcp_option(&key, &value, format)?;
        }
        Commands::Zones { direction } => check_cmd::handle_zones(&config_path, direction, format)?,
        Commands::Upgrade {
            binary,
            socket,
            state_file,
            timeout_secs,
        } => {
            upgrade_cmd::handle_upgrade(
                &config_path,
                &binary,
                socket,
                state_file,
                Duration::from_secs(timeout_secs),
            )
            .await?;
        }
    }
    Ok(())
}
