//! Firewall configuration: schema versions, model, loading, migration,
//! validation, round-trip editing and backups.

pub mod backup;
pub mod decode;
pub mod dhcp_options;
pub mod editor;
pub mod encode;
pub mod expand;
pub mod forgiving;
pub mod format;
pub mod inherit;
pub mod loader;
pub mod migrate;
mod migrate_legacy;
mod migrate_post;
pub mod model;
mod model_network;
mod model_policy;
mod model_services;
mod model_system;
mod normalize;
pub mod paths;
pub mod safemode;
pub mod syntax;
pub mod validate;
pub mod version;
pub mod zone_resolver;

pub use backup::{BackupInfo, BackupManager, BackupStats};
pub use editor::ConfigFile;
pub use forgiving::{ForgivingLoadResult, SkippedBlock, load_forgiving};
pub use loader::{LoadOptions, LoadResult, Loader, load_file, save_file};
pub use migrate::{MigrationRegistry, default_registry};
pub use model::Config;
pub use safemode::SafeModeHints;
pub use validate::{ValidationError, ValidationErrors, validate};
pub use version::{CURRENT_SCHEMA_VERSION, SchemaVersion};
pub use zone_resolver::ZoneResolver;
