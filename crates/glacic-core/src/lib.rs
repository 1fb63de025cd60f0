//! Shared error kinds and small value types for the glacic control plane.

pub mod error;
pub mod types;

pub use error::{ConfigError, UpgradeFailure};
pub use types::{Direction, OutputFormat, Severity};
