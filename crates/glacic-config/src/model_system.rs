use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub disable_sandbox: bool,
    /// Deprecated: moved to `web.listen`.
    pub listen: String,
    /// Deprecated: moved to `web.tls_listen`.
    pub tls_listen: String,
    pub tls_cert: String,
    pub tls_key: String,
    pub disable_http_redirect: bool,
    pub require_auth: bool,
    pub bootstrap_key: String,
    pub key_store_path: String,
    pub keys: Vec<ApiKey>,
    pub cors_origins: Vec<String>,
    pub letsencrypt: Option<LetsEncryptConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKey {
    pub name: String,
    pub key: String,
    pub permissions: Vec<String>,
    pub allowed_ips: Vec<String>,
    pub allowed_paths: Vec<String>,
    pub rate_limit: i64,
    pub enabled: bool,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LetsEncryptConfig {
    pub enabled: bool,
    pub email: String,
    pub domain: String,
    pub cache_dir: String,
    pub staging: bool,
}

/// Web server serving the UI and API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub listen: String,
    pub tls_listen: String,
    pub tls_cert: String,
    pub tls_key: String,
    pub disable_redirect: bool,
    pub serve_ui: bool,
    pub serve_api: bool,
    pub allow: Vec<AccessRule>,
    pub deny: Vec<AccessRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessRule {
    pub interfaces: Vec<String>,
    pub sources: Vec<String>,
    pub zones: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub threat_intel: bool,
    pub network_learning: bool,
    pub qos: bool,
    pub integrity_monitoring: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// "primary" or "replica".
    pub mode: String,
    pub listen_addr: String,
    pub primary_addr: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub ipset_refresh_hours: i64,
    pub dns_refresh_hours: i64,
    pub backup_enabled: bool,
    pub backup_schedule: String,
    pub backup_retention_days: i64,
    pub backup_dir: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    pub sysctl_profile: String,
    pub sysctl: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VpnConfig {
    pub tailscale: Vec<TailscaleConfig>,
    pub wireguard: Vec<WireGuardConfig>,
    #[serde(rename = "6to4")]
    pub six_to_four: Vec<SixToFourConfig>,
    /// Zone assigned to VPN interfaces by name prefix.
    pub interface_prefix_zones: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TailscaleConfig {
    pub name: String,
    pub enabled: bool,
    pub interface: String,
    pub auth_key: String,
    pub auth_key_env: String,
    pub control_url: String,
    pub management_access: bool,
    pub zone: String,
    pub advertise_routes: Vec<String>,
    pub accept_routes: bool,
    pub advertise_exit_node: bool,
    pub exit_node: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireGuardConfig {
    pub name: String,
    pub enabled: bool,
    pub interface: String,
    pub management_access: bool,
    pub zone: String,
    pub private_key: String,
    pub private_key_file: String,
    pub listen_port: i64,
    pub address: Vec<String>,
    pub dns: Vec<String>,
    pub mtu: i64,
    pub peers: Vec<WireGuardPeer>,
    pub fwmark: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireGuardPeer {
    pub name: String,
    pub public_key: String,
    pub preshared_key: String,
    pub endpoint: String,
    pub allowed_ips: Vec<String>,
    pub persistent_keepalive: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SixToFourConfig {
    pub name: String,
    pub enabled: bool,
    pub interface: String,
    pub local_ip: String,
    pub relay: String,
    pub zone: String,
    pub mtu: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub enabled: bool,
    pub channels: Vec<NotificationChannel>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationChannel {
    pub name: String,
    /// email, pushover, slack, discord, ntfy or webhook.
    #[serde(rename = "type")]
    pub kind: String,
    pub level: String,
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: i64,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from: String,
    pub to: Vec<String>,
    pub webhook_url: String,
    pub channel: String,
    pub username: String,
    pub api_token: String,
    pub user_key: String,
    pub priority: i64,
    pub sound: String,
    pub server: String,
    pub topic: String,
    pub password: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    pub db_path: String,
    pub retention_days: i64,
    pub log_config_changes: bool,
    pub log_api_requests: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoIpConfig {
    pub enabled: bool,
    pub database_path: String,
    pub auto_update: bool,
    pub license_key: String,
    pub update_interval: String,
}
