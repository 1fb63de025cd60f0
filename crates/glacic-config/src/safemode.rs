//! Topology hints cached for safe-mode boot.
//!
//! Written after a successful config load and read back when the full
//! config cannot be trusted, so recovery still knows which interfaces face
//! the WAN and where management access is allowed.

use std::collections::BTreeMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Config, ZoneManagement};

pub const HINTS_FILE_NAME: &str = "safe_mode_hints.json";

const WAN_ZONES: &[&str] = &["WAN", "wan", "Internet", "internet"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeModeHints {
    pub updated_at: DateTime<Utc>,
    pub interfaces: Vec<SafeModeInterface>,
    /// Interface name to zone name.
    pub zones: BTreeMap<String, String>,
    pub api_enabled: bool,
    pub api_listen: String,
    pub api_tls_listen: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafeModeInterface {
    pub name: String,
    pub dhcp: bool,
    pub static_ipv4: Vec<String>,
    pub gateway: String,
    pub zone: String,
    pub management: bool,
    pub description: String,
}

fn grants_management(mgmt: &Option<ZoneManagement>) -> bool {
    mgmt.as_ref()
        .is_some_and(|m| m.allows_web() || m.api || m.ssh)
}

impl SafeModeHints {
    pub fn from_config(config: &Config) -> Self {
        let mut zones = BTreeMap::new();
        for zone in &config.zones {
            let members = zone
                .interfaces
                .iter()
                .chain(std::iter::once(&zone.interface))
                .chain(zone.matches.iter().map(|m| &m.interface));
            for iface in members.filter(|i| !i.is_empty()) {
                zones.insert(iface.clone(), zone.name.clone());
            }
        }

        let interfaces = config
            .interfaces
            .iter()
            .map(|iface| {
                let zone = if iface.zone.is_empty() {
                    zones.get(&iface.name).cloned().unwrap_or_default()
                } else {
                    iface.zone.clone()
                };
                let zone_grants = config.zones.iter().any(|z| {
                    let member = z.interface == iface.name
                        || z.interfaces.contains(&iface.name)
                        || z.matches.iter().any(|m| m.interface == iface.name);
                    member && grants_management(&z.management)
                });
                SafeModeInterface {
                    name: iface.name.clone(),
                    dhcp: iface.dhcp,
                    static_ipv4: iface.ipv4.clone(),
                    gateway: iface.gateway.clone(),
                    zone,
                    management: grants_management(&iface.management) || zone_grants,
                    description: iface.description.clone(),
                }
            })
            .collect();

        let (api_enabled, api_listen, api_tls_listen) = match &config.api {
            Some(api) => (api.enabled, api.listen.clone(), api.tls_listen.clone()),
            None => (true, ":8080".to_string(), ":8443".to_string()),
        };

        Self {
            updated_at: Utc::now(),
            interfaces,
            zones,
            api_enabled,
            api_listen,
            api_tls_listen,
        }
    }

    pub fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(HINTS_FILE_NAME)
    }

    pub fn save(&self, state_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(state_dir)
            .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;
        std::fs::set_permissions(state_dir, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("failed to chmod {}", state_dir.display()))?;

        let path = Self::path(state_dir);
        let data = serde_json::to_string_pretty(self).context("failed to serialize hints")?;
        std::fs::write(&path, data)
            .with_context(|| format!("failed to write {}", path.display()))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644))
            .with_context(|| format!("failed to chmod {}", path.display()))?;
        tracing::debug!(path = %path.display(), "wrote safe-mode hints");
        Ok(())
    }

    /// `None` when the file is missing or unreadable.
    pub fn load(state_dir: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(Self::path(state_dir)).ok()?;
        serde_json::from_str(&data).ok()
    }

    pub fn dhcp_interfaces(&self) -> Vec<String> {
        self.names_where(|i| i.dhcp)
    }

    pub fn management_interfaces(&self) -> Vec<String> {
        self.names_where(|i| i.management)
    }

    pub fn wan_interfaces(&self) -> Vec<String> {
        self.names_where(|i| WAN_ZONES.contains(&i.zone.as_str()))
    }

    pub fn lan_interfaces(&self) -> Vec<String> {
        self.names_where(|i| !WAN_ZONES.contains(&i.zone.as_str()))
    }

    fn names_where(&self, pred: impl Fn(&SafeModeInterface) -> bool) -> Vec<String> {
        self.interfaces
            .iter()
            .filter(|i| pred(i))
            .map(|i| i.name.clone())
            .collect()
    }
}
