//! Strict config loading for both dialects.
//!
//! Config-syntax text goes through: pre-parse migrations, parse, version
//! check, decode, zone and policy normalization, post-load migrations and
//! optional auto-migration to the current schema. JSON skips the text
//! stage but shares everything after decode.

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result, bail};
use glacic_core::ConfigError;

use crate::decode::{LineIndex, decode_body, schema_version_of, value_to_config};
use crate::encode::encode_config;
use crate::migrate::{MigrationRegistry, default_registry};
use crate::migrate_legacy::detect_legacy_features;
use crate::model::Config;
use crate::normalize::{normalize_policies, normalize_zone_mappings};
use crate::paths;
use crate::safemode::SafeModeHints;
use crate::syntax;
use crate::version::{CURRENT_SCHEMA_VERSION, SchemaVersion, supported_versions_string};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Migrate older configs to the current schema version.
    pub auto_migrate: bool,
    /// Fail when the config's version differs from the current one.
    pub strict_version: bool,
    /// Skip unknown attributes and blocks instead of failing.
    pub allow_unknown_fields: bool,
    /// State directory receiving `safe_mode_hints.json` after a file load.
    /// Defaults to [`paths::state_dir`]; `None` skips the write.
    pub write_safe_mode_hints: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            auto_migrate: true,
            strict_version: false,
            allow_unknown_fields: false,
            write_safe_mode_hints: Some(paths::state_dir()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadResult {
    pub config: Config,
    pub original_version: SchemaVersion,
    pub current_version: SchemaVersion,
    pub was_migrated: bool,
    pub migration_path: Vec<String>,
    pub warnings: Vec<String>,
}

static DEFAULT_REGISTRY: LazyLock<Arc<MigrationRegistry>> =
    LazyLock::new(|| Arc::new(default_registry()));

/// Loader bound to a migration registry.
#[derive(Debug, Clone)]
pub struct Loader {
    registry: Arc<MigrationRegistry>,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(Arc::clone(&DEFAULT_REGISTRY))
    }
}

impl Loader {
    pub fn new(registry: Arc<MigrationRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Reads `path` and dispatches on its extension: `.hcl`, `.json`, or
    /// config syntax with a JSON fallback for anything else.
    pub fn load_file(&self, path: &Path, options: &LoadOptions) -> Result<LoadResult> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let filename = path.display().to_string();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let result = match ext.as_str() {
            "hcl" => self.load_hcl(&data, &filename, options)?,
            "json" => self.load_json(&data, options)?,
            _ => match self.load_hcl(&data, &filename, options) {
                Ok(result) => result,
                Err(hcl_err) => {
                    tracing::debug!(error = %hcl_err, "config syntax failed, trying JSON");
                    self.load_json(&data, options)?
                }
            },
        };

        if let Some(state_dir) = &options.write_safe_mode_hints
            && let Err(err) = SafeModeHints::from_config(&result.config).save(state_dir)
        {
            tracing::warn!(error = %err, "failed to write safe-mode hints");
        }
        Ok(result)
    }

    pub fn load_hcl(&self, data: &str, filename: &str, options: &LoadOptions) -> Result<LoadResult> {
        let (text, transforms) = self.registry.apply_pre_parse(data);
        let legacy = detect_legacy_features(&text);

        let body = syntax::parse(&text, filename).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut warnings: Vec<String> = transforms
            .iter()
            .map(|t| format!("Legacy syntax transformed: {t}"))
            .collect();
        warnings.extend(legacy.iter().map(|f| format!("Deprecated: {f}")));

        let version = parse_version(&schema_version_of(&body))?;
        check_supported(version)?;

        let mut config = match version.major {
            1 => decode_body(&body, &text, options.allow_unknown_fields)?,
            _ => bail!("no parser for schema version {version}"),
        };
        if config.schema_version.is_empty() {
            config.schema_version = "1.0".to_string();
        }
        self.finish(config, version, warnings, options)
    }

    pub fn load_json(&self, data: &str, options: &LoadOptions) -> Result<LoadResult> {
        let value: serde_json::Value =
            serde_json::from_str(data).map_err(|e| ConfigError::Decode {
                field: "json".to_string(),
                message: format!("JSON parse error: {e}"),
            })?;
        let config = value_to_config(&value, &LineIndex::default(), options.allow_unknown_fields)?;
        let version = parse_version(&config.schema_version)?;
        self.finish(config, version, Vec::new(), options)
    }

    fn finish(
        &self,
        mut config: Config,
        version: SchemaVersion,
        warnings: Vec<String>,
        options: &LoadOptions,
    ) -> Result<LoadResult> {
        normalize_zone_mappings(&mut config);
        normalize_policies(&mut config);
        self.registry
            .apply_post_load(&mut config)
            .map_err(|e| ConfigError::Migration(format!("{e:#}")))?;

        let current = SchemaVersion::current();
        let mut result = LoadResult {
            config,
            original_version: version,
            current_version: version,
            was_migrated: false,
            migration_path: Vec::new(),
            warnings,
        };

        if options.auto_migrate && version.needs_migration(&current) {
            result.migration_path = self
                .registry
                .migrate_config(&mut result.config, current)
                .map_err(|e| ConfigError::Migration(format!("{e:#}")))?;
            result.current_version = current;
            result.was_migrated = true;
        } else if options.strict_version && version != current {
            return Err(ConfigError::VersionMismatch {
                found: version.to_string(),
                current: current.to_string(),
            }
            .into());
        }

        for warning in &result.warnings {
            tracing::warn!(%warning, "config load warning");
        }
        Ok(result)
    }
}

fn parse_version(raw: &str) -> Result<SchemaVersion> {
    SchemaVersion::parse(raw).map_err(|e| {
        ConfigError::Decode {
            field: "schema_version".to_string(),
            message: format!("invalid schema version: {e}"),
        }
        .into()
    })
}

fn check_supported(version: SchemaVersion) -> Result<()> {
    if !version.is_supported() {
        return Err(ConfigError::UnsupportedVersion {
            version: version.to_string(),
            supported: supported_versions_string(),
        }
        .into());
    }
    Ok(())
}

/// Loads a file with the built-in migrations and default options.
pub fn load_file(path: &Path) -> Result<Config> {
    Ok(Loader::default()
        .load_file(path, &LoadOptions::default())?
        .config)
}

pub fn load_file_with_options(path: &Path, options: &LoadOptions) -> Result<LoadResult> {
    Loader::default().load_file(path, options)
}

pub fn load_hcl(data: &str, filename: &str) -> Result<Config> {
    Ok(Loader::default()
        .load_hcl(data, filename, &LoadOptions::default())?
        .config)
}

pub fn load_json(data: &str) -> Result<Config> {
    Ok(Loader::default()
        .load_json(data, &LoadOptions::default())?
        .config)
}

/// Config-syntax text for `config`.
pub fn generate_hcl(config: &Config) -> Result<String> {
    encode_config(config)
}

/// Writes `config` to `path`: config syntax for `.hcl`, indented JSON
/// otherwise. An empty `schema_version` is written as the current one.
pub fn save_file(config: &Config, path: &Path) -> Result<()> {
    let mut config = config.clone();
    if config.schema_version.is_empty() {
        config.schema_version = CURRENT_SCHEMA_VERSION.to_string();
    }
    let is_hcl = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("hcl"));
    let data = if is_hcl {
        generate_hcl(&config)?
    } else {
        serde_json::to_string_pretty(&config).context("failed to marshal config")?
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create config directory {}", parent.display()))?;
    }
    std::fs::write(path, data)
        .with_context(|| format!("failed to write config file {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
