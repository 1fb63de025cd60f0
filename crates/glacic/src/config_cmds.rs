use std::path::Path;

use anyhow::{Context, Result, bail};
use glacic_config::{BackupManager, ConfigFile, SchemaVersion, editor, load_forgiving};
use glacic_core::OutputFormat;
use tracing::warn;

fn labels(labels: &[String]) -> Vec<&str> {
    labels.iter().map(String::as_str).collect()
}

/// Snapshots the file before an in-place edit. A failed snapshot does not
/// block the edit.
fn backup_before_edit(config_path: &Path, description: &str) {
    if !config_path.exists() {
        return;
    }
    let manager = BackupManager::new(config_path, 0);
    if let Err(e) = manager.create_backup(description, true) {
        warn!(error = %e, "failed to back up config before editing");
    }
}

pub(crate) fn handle_config_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let file = ConfigFile::load_file(config_path)?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(file.config())?),
        OutputFormat::Text => print!("{}", file.get_raw()),
    }
    Ok(())
}

pub(crate) fn handle_config_sections(config_path: &Path, format: OutputFormat) -> Result<()> {
    let file = ConfigFile::load_file(config_path)?;
    let sections = file.list_sections();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sections)?),
        OutputFormat::Text => {
            for section in sections {
                if section.label.is_empty() {
                    println!("{}", section.kind);
                } else {
                    println!("{} {}", section.kind, section.label);
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn handle_config_get(config_path: &Path, kind: &str, labels_arg: &[String]) -> Result<()> {
    let file = ConfigFile::load_file(config_path)?;
    let text = if labels_arg.is_empty() {
        file.get_section(kind)?
    } else {
        file.get_section_by_label(kind, &labels(labels_arg))?
    };
    println!("{}", text.trim_end());
    Ok(())
}

pub(crate) fn handle_config_set(
    config_path: &Path,
    kind: &str,
    labels_arg: &[String],
    block_file: &Path,
) -> Result<()> {
    let text = std::fs::read_to_string(block_file)
        .with_context(|| format!("failed to read block file {}", block_file.display()))?;
    let mut file = ConfigFile::load_file(config_path)?;
    if labels_arg.is_empty() {
        file.set_section(kind, &text)?;
    } else {
        file.set_section_by_label(kind, &labels(labels_arg), &text)?;
    }
    if !file.has_changes() {
        eprintln!("No changes");
        return Ok(());
    }
    backup_before_edit(config_path, &format!("before config set {kind}"));
    file.save()?;
    eprintln!("Updated {kind} in {}", config_path.display());
    Ok(())
}

pub(crate) fn handle_config_remove(
    config_path: &Path,
    kind: &str,
    labels_arg: &[String],
) -> Result<()> {
    let mut file = ConfigFile::load_file(config_path)?;
    if labels_arg.is_empty() {
        file.remove_section(kind)?;
    } else {
        file.remove_section_by_label(kind, &labels(labels_arg))?;
    }
    backup_before_edit(config_path, &format!("before config remove {kind}"));
    file.save()?;
    eprintln!("Removed {kind} from {}", config_path.display());
    Ok(())
}

fn formatted(config_path: &Path) -> Result<ConfigFile> {
    let mut file = ConfigFile::load_file(config_path)?;
    let text = editor::format(&file.get_raw())?;
    file.set_raw(&text)?;
    Ok(file)
}

pub(crate) fn handle_config_format(config_path: &Path, write: bool) -> Result<()> {
    let mut file = formatted(config_path)?;
    if !write {
        print!("{}", file.get_raw());
        return Ok(());
    }
    if file.has_changes() {
        backup_before_edit(config_path, "before config format");
        file.save()?;
        eprintln!("Formatted {}", config_path.display());
    } else {
        eprintln!("{} is already formatted", config_path.display());
    }
    Ok(())
}

pub(crate) fn handle_config_diff(config_path: &Path) -> Result<()> {
    let file = formatted(config_path)?;
    let diff = file.diff();
    if diff.is_empty() {
        println!("No differences");
    } else {
        print!("{diff}");
    }
    Ok(())
}

pub(crate) fn handle_config_migrate(config_path: &Path, to: Option<&str>) -> Result<()> {
    let target = match to {
        Some(v) => SchemaVersion::parse(v)?,
        None => SchemaVersion::current(),
    };
    let mut file = ConfigFile::load_file(config_path)?;
    let applied = file.migrate_to(target)?;
    if applied.is_empty() {
        eprintln!("{} is already at schema {target} or newer", config_path.display());
        return Ok(());
    }
    backup_before_edit(config_path, &format!("before migration to {target}"));
    file.save()?;
    for step in &applied {
        println!("{step}");
    }
    eprintln!("Migrated {} to schema {target}", config_path.display());
    Ok(())
}

pub(crate) fn handle_config_salvage(config_path: &Path, write: bool) -> Result<()> {
    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read config file {}", config_path.display()))?;
    let result = load_forgiving(&text, &config_path.display().to_string());
    if !result.had_errors {
        println!("No errors; nothing to salvage");
        return Ok(());
    }
    print!("{}", result.salvage_diff());
    if let Some(fatal) = &result.fatal_error {
        bail!("nothing could be salvaged: {fatal}");
    }
    if write {
        backup_before_edit(config_path, "before salvage");
        std::fs::write(config_path, &result.salvaged_text)
            .with_context(|| format!("failed to write {}", config_path.display()))?;
        eprintln!(
            "Wrote salvaged config ({} block(s) commented out)",
            result.skipped_blocks.len()
        );
    }
    Ok(())
}
