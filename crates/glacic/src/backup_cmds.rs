use std::path::Path;

use anyhow::Result;
use glacic_config::{BackupInfo, BackupManager};
use glacic_core::OutputFormat;

use crate::cli::BackupCommands;

pub(crate) fn handle_backup(
    config_path: &Path,
    cmd: BackupCommands,
    format: OutputFormat,
) -> Result<()> {
    let mut manager = BackupManager::new(config_path, 0);
    match cmd {
        BackupCommands::Create { description, pin } => {
            let info = if pin {
                manager.create_pinned_backup(&description)?
            } else {
                manager.create_backup(&description, false)?
            };
            print_info(&info, format)?;
        }
        BackupCommands::List => {
            let backups = manager.list_backups()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&backups)?),
                OutputFormat::Text => {
                    if backups.is_empty() {
                        println!("No backups in {}", manager.backup_dir().display());
                    }
                    for info in &backups {
                        println!("{}", summary_line(info));
                    }
                }
            }
        }
        BackupCommands::Show { version } => {
            let content = manager.get_backup_content(version)?;
            print!("{}", String::from_utf8_lossy(&content));
        }
        BackupCommands::Restore {
            version,
            no_migrate,
        } => {
            manager.restore_backup(version, !no_migrate)?;
            eprintln!("Restored backup v{version} to {}", config_path.display());
        }
        BackupCommands::Pin { version } => {
            manager.pin_backup(version)?;
            eprintln!("Pinned backup v{version}");
        }
        BackupCommands::Unpin { version } => {
            manager.unpin_backup(version)?;
            eprintln!("Unpinned backup v{version}");
        }
        BackupCommands::Delete { version } => {
            manager.delete_backup(version)?;
            eprintln!("Deleted backup v{version}");
        }
        BackupCommands::Compare { version } => {
            print!("{}", manager.compare_with_current(version)?);
        }
        BackupCommands::Stats => {
            let stats = manager.stats()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&stats)?),
                OutputFormat::Text => {
                    println!("total:   {}", stats.total);
                    println!("pinned:  {}", stats.pinned);
                    println!("auto:    {}", stats.auto);
                    println!("size:    {} bytes", stats.total_size);
                    println!("max:     {}", manager.max_backups());
                }
            }
        }
        BackupCommands::Validate { version } => {
            manager.validate_backup(version)?;
            println!("Backup v{version} is valid");
        }
        BackupCommands::SetMax { max } => {
            manager.set_max_backups(max)?;
            eprintln!("Keeping at most {max} unpinned backups");
        }
    }
    Ok(())
}

fn print_info(info: &BackupInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(info)?),
        OutputFormat::Text => println!("{}", summary_line(info)),
    }
    Ok(())
}

fn summary_line(info: &BackupInfo) -> String {
    let mut flags = Vec::new();
    if info.pinned {
        flags.push("pinned");
    }
    if info.is_auto {
        flags.push("auto");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    format!(
        "v{:<4} {}  schema {:<4} {:>8} B{flags}  {}",
        info.version,
        info.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        info.schema_version,
        info.size,
        info.description
    )
}
