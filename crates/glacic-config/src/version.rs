//! Config schema versions (`Major.Minor`).
//!
//! Major bumps are breaking and need a registered migration; minor bumps
//! only add fields.

use std::cmp::Ordering;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const CURRENT_SCHEMA_VERSION: &str = "1.0";

/// Versions this build can decode.
pub const SUPPORTED_VERSIONS: &[SchemaVersion] = &[SchemaVersion::new(1, 0)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn current() -> Self {
        SUPPORTED_VERSIONS[SUPPORTED_VERSIONS.len() - 1]
    }

    /// Parses `"X.Y"`; the empty string means 1.0.
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    /// -1, 0 or +1 ordering on `(major, minor)`.
    pub fn compare(&self, other: &Self) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    /// Same major, and this minor not newer than `other`'s.
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major && self.minor <= other.minor
    }

    pub fn needs_migration(&self, target: &Self) -> bool {
        self.compare(target) < 0
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_VERSIONS.iter().any(|v| v.major == self.major)
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::new(1, 0)
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Ok(Self::default());
        }
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 2 {
            bail!("invalid version format: {s} (expected X.Y)");
        }
        let Ok(major) = parts[0].parse::<u32>() else {
            bail!("invalid major version: {}", parts[0]);
        };
        let Ok(minor) = parts[1].parse::<u32>() else {
            bail!("invalid minor version: {}", parts[1]);
        };
        Ok(Self { major, minor })
    }
}

pub fn is_supported_version(version: &str) -> bool {
    SchemaVersion::parse(version).is_ok_and(|v| v.is_supported())
}

pub fn supported_versions_string() -> String {
    SUPPORTED_VERSIONS
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_empty_defaults_to_one_zero() {
        assert_eq!(SchemaVersion::parse("").unwrap(), SchemaVersion::new(1, 0));
    }

    #[test]
    fn test_parse_valid() {
        assert_eq!(SchemaVersion::parse("2.13").unwrap(), SchemaVersion::new(2, 13));
    }

    #[test]
    fn test_parse_rejects_three_parts() {
        let err = SchemaVersion::parse("1.0.0").unwrap_err();
        assert_eq!(err.to_string(), "invalid version format: 1.0.0 (expected X.Y)");
    }

    #[test]
    fn test_parse_rejects_bad_halves() {
        assert_eq!(
            SchemaVersion::parse("a.1").unwrap_err().to_string(),
            "invalid major version: a"
        );
        assert_eq!(
            SchemaVersion::parse("1.-1").unwrap_err().to_string(),
            "invalid minor version: -1"
        );
    }

    #[test]
    fn test_compare_and_needs_migration() {
        let v10 = SchemaVersion::new(1, 0);
        let v11 = SchemaVersion::new(1, 1);
        let v20 = SchemaVersion::new(2, 0);
        assert_eq!(v10.compare(&v11), -1);
        assert_eq!(v20.compare(&v11), 1);
        assert_eq!(v11.compare(&v11), 0);
        assert!(v10.needs_migration(&v11));
        assert!(!v11.needs_migration(&v10));
        assert!(v10.is_compatible(&v11));
        assert!(!v11.is_compatible(&v10));
        assert!(!v10.is_compatible(&v20));
    }

    #[test]
    fn test_supported_checks_major_only() {
        assert!(is_supported_version("1.0"));
        assert!(is_supported_version("1.7"));
        assert!(is_supported_version(""));
        assert!(!is_supported_version("2.0"));
        assert!(!is_supported_version("garbage"));
        assert_eq!(supported_versions_string(), "1.0");
        assert_eq!(SchemaVersion::current().to_string(), CURRENT_SCHEMA_VERSION);
    }

    proptest! {
        #[test]
        fn test_display_parse_roundtrip(major in 0u32..1000, minor in 0u32..1000) {
            let v = SchemaVersion::new(major, minor);
            prop_assert_eq!(SchemaVersion::parse(&v.to_string()).unwrap(), v);
        }

        #[test]
        fn test_compare_is_antisymmetric(a in (0u32..5, 0u32..5), b in (0u32..5, 0u32..5)) {
            let va = SchemaVersion::new(a.0, a.1);
            let vb = SchemaVersion::new(b.0, b.1);
            prop_assert_eq!(va.compare(&vb), -vb.compare(&va));
        }
    }
}
