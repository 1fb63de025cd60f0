//! Versioned config backups with a JSON sidecar per snapshot.
//!
//! Layout: `<config dir>/backups/config.<version>.<YYYYMMDD-HHMMSS>.hcl`
//! plus `<that path>.meta.json`. Versions only grow; pinned backups are
//! exempt from pruning.

use std::fmt::Write as _;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::loader::{LoadOptions, Loader, save_file};
use crate::version::{CURRENT_SCHEMA_VERSION, SchemaVersion};

pub const DEFAULT_MAX_BACKUPS: usize = 20;

const META_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupInfo {
    pub version: u32,
    pub timestamp: DateTime<Utc>,
    pub description: String,
    pub path: PathBuf,
    pub size: u64,
    pub is_auto: bool,
    pub pinned: bool,
    pub schema_version: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BackupStats {
    /// Includes pinned backups.
    pub total: usize,
    pub pinned: usize,
    pub auto: usize,
    pub total_size: u64,
}

/// Sidecar contents as found on disk; older or hand-written files may
/// lack any field.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Sidecar {
    version: u32,
    timestamp: Option<DateTime<Utc>>,
    description: String,
    path: Option<PathBuf>,
    size: u64,
    is_auto: bool,
    pinned: bool,
    schema_version: String,
}

#[derive(Debug, Clone)]
pub struct BackupManager {
    config_path: PathBuf,
    backup_dir: PathBuf,
    max_backups: usize,
    loader: Loader,
}

impl BackupManager {
    /// `max_backups == 0` selects [`DEFAULT_MAX_BACKUPS`].
    pub fn new(config_path: impl Into<PathBuf>, max_backups: usize) -> Self {
        let config_path = config_path.into();
        let backup_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("backups");
        Self {
            config_path,
            backup_dir,
            max_backups: if max_backups == 0 {
                DEFAULT_MAX_BACKUPS
            } else {
                max_backups
            },
            loader: Loader::default(),
        }
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn max_backups(&self) -> usize {
        self.max_backups
    }

    /// Ignores zero; otherwise applies the new limit immediately.
    pub fn set_max_backups(&mut self, max: usize) -> Result<()> {
        if max > 0 {
            self.max_backups = max;
            self.prune()?;
        }
        Ok(())
    }

    fn ensure_backup_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.backup_dir).with_context(|| {
            format!(
                "failed to create backup directory {}",
                self.backup_dir.display()
            )
        })
    }

    pub fn create_backup(&self, description: &str, is_auto: bool) -> Result<BackupInfo> {
        self.create(description, is_auto, false)
    }

    /// Manual backup that pruning never removes.
    pub fn create_pinned_backup(&self, description: &str) -> Result<BackupInfo> {
        self.create(description, false, true)
    }

    fn create(&self, description: &str, is_auto: bool, pinned: bool) -> Result<BackupInfo> {
        self.ensure_backup_dir()?;
        let data = fs::read(&self.config_path).with_context(|| {
            format!("failed to read config {}", self.config_path.display())
        })?;

        let version = self
            .list_backups()?
            .iter()
            .map(|b| b.version)
            .max()
            .unwrap_or(0)
            + 1;
        let timestamp = Utc::now();
        let filename = format!("config.{version}.{}.hcl", timestamp.format("%Y%m%d-%H%M%S"));
        let path = self.backup_dir.join(filename);

        fs::write(&path, &data)
            .with_context(|| format!("failed to write backup {}", path.display()))?;
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644))
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;

        let info = BackupInfo {
            version,
            timestamp,
            description: description.to_string(),
            size: data.len() as u64,
            is_auto,
            pinned,
            schema_version: self.schema_version_of(&data, &path),
            path,
        };
        write_sidecar(&info)?;
        tracing::info!(version, is_auto, pinned, "created config backup");

        self.prune()?;
        Ok(info)
    }

    fn schema_version_of(&self, data: &[u8], path: &Path) -> String {
        let text = String::from_utf8_lossy(data);
        let options = LoadOptions {
            auto_migrate: false,
            ..LoadOptions::default()
        };
        match self
            .loader
            .load_hcl(&text, &path.display().to_string(), &options)
        {
            Ok(result) if !result.config.schema_version.is_empty() => {
                result.config.schema_version
            }
            Ok(_) => CURRENT_SCHEMA_VERSION.to_string(),
            Err(err) => {
                tracing::debug!(error = %err, "backup content did not load; assuming current schema");
                CURRENT_SCHEMA_VERSION.to_string()
            }
        }
    }

    /// All backups, newest first.
    pub fn list_backups(&self) -> Result<Vec<BackupInfo>> {
        self.ensure_backup_dir()?;
        let entries = fs::read_dir(&self.backup_dir).with_context(|| {
            format!(
                "failed to read backup directory {}",
                self.backup_dir.display()
            )
        })?;

        let mut backups = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read backup directory entry")?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Ok(meta) = entry.metadata() else {
                continue;
            };
            if meta.is_dir() || !name.ends_with(".hcl") {
                continue;
            }

            let path = entry.path();
            let sidecar: Sidecar = fs::read(sidecar_path(&path))
                .ok()
                .and_then(|raw| serde_json::from_slice(&raw).ok())
                .unwrap_or_default();

            backups.push(BackupInfo {
                version: if sidecar.version == 0 {
                    version_from_filename(&name)
                } else {
                    sidecar.version
                },
                timestamp: sidecar
                    .timestamp
                    .or_else(|| meta.modified().ok().map(DateTime::<Utc>::from))
                    .unwrap_or_default(),
                description: sidecar.description,
                path: sidecar.path.unwrap_or(path),
                size: if sidecar.size == 0 {
                    meta.len()
                } else {
                    sidecar.size
                },
                is_auto: sidecar.is_auto,
                pinned: sidecar.pinned,
                schema_version: sidecar.schema_version,
            });
        }

        backups.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(backups)
    }

    pub fn get_backup(&self, version: u32) -> Result<BackupInfo> {
        self.list_backups()?
            .into_iter()
            .find(|b| b.version == version)
            .ok_or_else(|| anyhow::anyhow!("backup version {version} not found"))
    }

    pub fn get_backup_content(&self, version: u32) -> Result<Vec<u8>> {
        let info = self.get_backup(version)?;
        fs::read(&info.path).with_context(|| format!("failed to read backup {}", info.path.display()))
    }

    pub fn get_latest_backup(&self) -> Result<BackupInfo> {
        self.list_backups()?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("no backups found"))
    }

    /// Restores `version` over the config file, migrating it to the current
    /// schema first when it was written under another one. The config being
    /// replaced is saved as an auto backup.
    pub fn restore_backup(&self, version: u32, auto_migrate: bool) -> Result<()> {
        let info = self.get_backup(version)?;
        let content = fs::read(&info.path)
            .with_context(|| format!("failed to read backup {}", info.path.display()))?;

        if let Err(err) = self.create_backup("Auto-backup before restore", true) {
            tracing::warn!(error = %err, "could not back up config before restore");
        }

        if auto_migrate
            && !info.schema_version.is_empty()
            && info.schema_version != CURRENT_SCHEMA_VERSION
        {
            let text = String::from_utf8_lossy(&content);
            let result = self
                .loader
                .load_hcl(&text, &info.path.display().to_string(), &LoadOptions::default())
                .context("failed to parse backup config")?;
            save_file(&result.config, &self.config_path).context("failed to save migrated config")?;
            tracing::info!(
                version,
                from = %info.schema_version,
                "restored backup with schema migration"
            );
            return Ok(());
        }

        fs::write(&self.config_path, &content).with_context(|| {
            format!("failed to restore config {}", self.config_path.display())
        })?;
        tracing::info!(version, "restored backup");
        Ok(())
    }

    /// Checks that a backup could be restored: known schema and a clean load.
    pub fn validate_backup(&self, version: u32) -> Result<()> {
        let info = self.get_backup(version)?;
        let schema = SchemaVersion::parse(&info.schema_version)
            .context("invalid schema version in backup")?;
        if !schema.is_supported() {
            bail!("backup uses unsupported schema version {schema}");
        }
        let content = fs::read(&info.path)
            .with_context(|| format!("failed to read backup {}", info.path.display()))?;
        self.loader
            .load_hcl(
                &String::from_utf8_lossy(&content),
                &info.path.display().to_string(),
                &LoadOptions::default(),
            )
            .context("backup config is invalid")?;
        Ok(())
    }

    pub fn pin_backup(&self, version: u32) -> Result<()> {
        self.set_pinned(version, true)
    }

    pub fn unpin_backup(&self, version: u32) -> Result<()> {
        self.set_pinned(version, false)
    }

    fn set_pinned(&self, version: u32, pinned: bool) -> Result<()> {
        let mut info = self.get_backup(version)?;
        info.pinned = pinned;
        write_sidecar(&info)
    }

    pub fn delete_backup(&self, version: u32) -> Result<()> {
        let info = self.get_backup(version)?;
        remove_backup_files(&info)
    }

    /// Removes the oldest unpinned backups beyond `max_backups`.
    pub fn prune(&self) -> Result<()> {
        let unpinned: Vec<BackupInfo> = self
            .list_backups()?
            .into_iter()
            .filter(|b| !b.pinned)
            .collect();
        for info in unpinned.iter().skip(self.max_backups) {
            tracing::debug!(version = info.version, "pruning config backup");
            remove_backup_files(info)?;
        }
        Ok(())
    }

    pub fn compare_with_current(&self, version: u32) -> Result<String> {
        let backup = self.get_backup_content(version)?;
        let current = fs::read(&self.config_path).with_context(|| {
            format!("failed to read current config {}", self.config_path.display())
        })?;
        if backup == current {
            return Ok("No differences".to_string());
        }

        let backup = String::from_utf8_lossy(&backup);
        let current = String::from_utf8_lossy(&current);
        let old: Vec<&str> = backup.split('\n').collect();
        let new: Vec<&str> = current.split('\n').collect();

        let mut out = format!("Backup v{version} vs Current:\n");
        for i in 0..old.len().max(new.len()) {
            let before = old.get(i).copied().unwrap_or_default();
            let after = new.get(i).copied().unwrap_or_default();
            if before == after {
                continue;
            }
            if !before.is_empty() {
                let _ = writeln!(out, "- {before}");
            }
            if !after.is_empty() {
                let _ = writeln!(out, "+ {after}");
            }
        }
        Ok(out)
    }

    pub fn stats(&self) -> Result<BackupStats> {
        let mut stats = BackupStats::default();
        for backup in self.list_backups()? {
            stats.total += 1;
            stats.total_size += backup.size;
            if backup.pinned {
                stats.pinned += 1;
            }
            if backup.is_auto {
                stats.auto += 1;
            }
        }
        Ok(stats)
    }
}

fn sidecar_path(backup: &Path) -> PathBuf {
    let mut name = backup.as_os_str().to_owned();
    name.push(META_SUFFIX);
    PathBuf::from(name)
}

fn write_sidecar(info: &BackupInfo) -> Result<()> {
    let path = sidecar_path(&info.path);
    let json = serde_json::to_vec_pretty(info).context("failed to serialize backup metadata")?;
    fs::write(&path, json)
        .with_context(|| format!("failed to update backup metadata {}", path.display()))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o644))
        .with_context(|| format!("failed to set permissions on {}", path.display()))
}

fn remove_backup_files(info: &BackupInfo) -> Result<()> {
    fs::remove_file(&info.path)
        .with_context(|| format!("failed to remove backup {}", info.path.display()))?;
    if let Err(err) = fs::remove_file(sidecar_path(&info.path))
        && err.kind() != std::io::ErrorKind::NotFound
    {
        return Err(err).context("failed to remove backup metadata");
    }
    Ok(())
}

/// `config.<n>.<...>` -> n; 0 when the name does not follow the pattern.
fn version_from_filename(name: &str) -> u32 {
    name.strip_prefix("config.")
        .and_then(|rest| rest.split('.').next())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "backup_tests.rs"]
mod tests;
