//! Migration pipeline for config text and decoded configs.
//!
//! Three ordered lists live in one [`MigrationRegistry`]:
//! - pre-parse transforms rewrite raw text before the syntax tree is built;
//! - post-load migrations fix up a decoded [`Config`] in place;
//! - versioned migrations move a config (and, for the editor, its syntax
//!   tree) from one schema version to the next.
//!
//! The registry is a plain value built by [`default_registry`] and handed to
//! the loader; nothing is registered through globals.

use anyhow::{Context, Result, bail};

use crate::model::Config;
use crate::normalize;
use crate::syntax::{self, Body};
use crate::version::SchemaVersion;

pub type TransformFn = Box<dyn Fn(&str) -> (String, Vec<String>) + Send + Sync>;
pub type ConfigFn = Box<dyn Fn(&mut Config) -> Result<()> + Send + Sync>;
pub type TreeFn = Box<dyn Fn(&mut Body) -> Result<()> + Send + Sync>;

/// Text rewrite applied before parsing. Returns the new text and a
/// description for every rule that fired.
pub struct PreParseMigration {
    pub name: String,
    pub description: String,
    pub transform: TransformFn,
}

/// Semantic fix-up applied to every decoded config.
pub struct PostLoadMigration {
    pub name: String,
    pub description: String,
    pub migrate: ConfigFn,
}

/// One hop between schema versions.
pub struct Migration {
    pub id: String,
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    pub description: String,
    /// Applied to a decoded config.
    pub migrate: ConfigFn,
    /// Applied to the comment-preserving tree by the editor.
    pub migrate_tree: TreeFn,
}

macro_rules! debug_by_name {
    ($ty:ty, $($field:ident),+) => {
        impl std::fmt::Debug for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($ty))
                    $(.field(stringify!($field), &self.$field))+
                    .finish()
            }
        }
    };
}

debug_by_name!(PreParseMigration, name, description);
debug_by_name!(PostLoadMigration, name, description);
debug_by_name!(Migration, id, from_version, to_version, description);

#[derive(Debug, Default)]
pub struct MigrationRegistry {
    pre_parse: Vec<PreParseMigration>,
    post_load: Vec<PostLoadMigration>,
    migrations: Vec<Migration>,
}

impl MigrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_pre_parse(&mut self, migration: PreParseMigration) {
        self.pre_parse.push(migration);
    }

    pub fn register_post_load(&mut self, migration: PostLoadMigration) {
        self.post_load.push(migration);
    }

    /// Register a versioned migration. Keeps ordering by `from_version`.
    pub fn register(&mut self, migration: Migration) {
        self.migrations.push(migration);
        self.migrations
            .sort_by(|a, b| a.from_version.cmp(&b.from_version));
    }

    pub fn pre_parse(&self) -> &[PreParseMigration] {
        &self.pre_parse
    }

    pub fn post_load(&self) -> &[PostLoadMigration] {
        &self.post_load
    }

    pub fn all(&self) -> &[Migration] {
        &self.migrations
    }

    /// Runs every pre-parse transform in order, each on the previous output.
    pub fn apply_pre_parse(&self, text: &str) -> (String, Vec<String>) {
        let mut content = text.to_string();
        let mut applied = Vec::new();
        for migration in &self.pre_parse {
            let (next, descriptions) = (migration.transform)(&content);
            if !descriptions.is_empty() {
                tracing::debug!(
                    migration = %migration.name,
                    count = descriptions.len(),
                    "pre-parse migration rewrote config text"
                );
            }
            content = next;
            applied.extend(descriptions);
        }
        (content, applied)
    }

    pub fn apply_post_load(&self, config: &mut Config) -> Result<()> {
        for migration in &self.post_load {
            (migration.migrate)(config)
                .with_context(|| format!("post-load migration {} failed", migration.name))?;
        }
        Ok(())
    }

    /// Chain of migrations leading from `from` to `to`; empty when `from` is
    /// already at or past `to`.
    pub fn migration_path(&self, from: SchemaVersion, to: SchemaVersion) -> Result<Vec<&Migration>> {
        let mut path = Vec::new();
        let mut current = from;
        while current < to {
            let Some(next) = self
                .migrations
                .iter()
                .find(|m| m.from_version == current && m.to_version > current)
            else {
                bail!("no migration path from {from} to {to} (stuck at {current})");
            };
            path.push(next);
            current = next.to_version;
        }
        Ok(path)
    }

    /// Brings `config` up to `target`, bumping `schema_version` after each
    /// hop, then canonicalizes. Returns the hops applied.
    pub fn migrate_config(&self, config: &mut Config, target: SchemaVersion) -> Result<Vec<String>> {
        let current = SchemaVersion::parse(&config.schema_version)
            .context("invalid config schema version")?;
        if current >= target {
            return Ok(Vec::new());
        }
        let path = self.migration_path(current, target)?;
        let mut applied = Vec::with_capacity(path.len());
        for migration in path {
            (migration.migrate)(config).with_context(|| {
                format!(
                    "migration {} -> {} failed",
                    migration.from_version, migration.to_version
                )
            })?;
            config.schema_version = migration.to_version.to_string();
            tracing::info!(
                id = %migration.id,
                to = %migration.to_version,
                "applied config schema migration"
            );
            applied.push(format!("{} -> {}", migration.from_version, migration.to_version));
        }
        canonicalize(config);
        Ok(applied)
    }

    /// Tree counterpart of [`Self::migrate_config`]: rewrites `body` hop by
    /// hop and sets its `schema_version` attribute after each one, so
    /// comments and layout survive.
    pub fn migrate_tree(
        &self,
        body: &mut Body,
        from: SchemaVersion,
        target: SchemaVersion,
    ) -> Result<Vec<String>> {
        let path = self.migration_path(from, target)?;
        let mut applied = Vec::with_capacity(path.len());
        for migration in path {
            (migration.migrate_tree)(body).with_context(|| {
                format!(
                    "migration {} -> {} failed",
                    migration.from_version, migration.to_version
                )
            })?;
            let version = serde_json::Value::String(migration.to_version.to_string());
            syntax::set_attribute(body, "schema_version", &version, "")
                .map_err(anyhow::Error::msg)?;
            applied.push(format!("{} -> {}", migration.from_version, migration.to_version));
        }
        Ok(applied)
    }
}

/// Folds deprecated zone styles into explicit matches and fills default
/// policy names. Safe to run repeatedly.
pub fn canonicalize(config: &mut Config) {
    crate::migrate_post::canonicalize_zones(config);
    normalize::normalize_policies(config);
}

/// Build a registry pre-loaded with the built-in migrations.
pub fn default_registry() -> MigrationRegistry {
    let mut r = MigrationRegistry::new();
    r.register_pre_parse(crate::migrate_legacy::legacy_syntax_migration());
    r.register_post_load(crate::migrate_post::api_to_web_migration());
    r.register_post_load(crate::migrate_post::dns_server_migration());
    r.register_post_load(crate::migrate_post::zone_canonicalization_migration());
    // Schema 1.0 is the base version; versioned migrations register here.
    r
}

#[cfg(test)]
#[path = "migrate_tests.rs"]
mod tests;
