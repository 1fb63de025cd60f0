use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpServer {
    pub enabled: bool,
    pub scopes: Vec<DhcpScope>,
    /// "builtin", "external" or "import".
    pub mode: String,
    pub external_lease_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpScope {
    pub name: String,
    pub interface: String,
    pub range_start: String,
    pub range_end: String,
    pub router: String,
    pub dns: Vec<String>,
    pub lease_time: String,
    pub domain: String,
    /// Extra options keyed by alias or decimal code; see `dhcp_options`.
    pub options: BTreeMap<String, String>,
    pub reservations: Vec<DhcpReservation>,
    pub range_start_v6: String,
    pub range_end_v6: String,
    pub dns_v6: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DhcpReservation {
    pub mac: String,
    pub ip: String,
    pub hostname: String,
    pub description: String,
    pub options: BTreeMap<String, String>,
    pub register_dns: bool,
}

/// DNS resolver and per-zone serving configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    /// "forward" or "recursive".
    pub mode: String,
    pub forwarders: Vec<String>,
    pub conditional_forwarders: Vec<ConditionalForward>,
    pub upstream_timeout: i64,
    pub upstream_doh: Vec<UpstreamDoh>,
    pub upstream_dot: Vec<UpstreamDot>,
    pub upstream_dnscrypt: Vec<UpstreamDnsCrypt>,
    pub recursive: Option<RecursiveConfig>,
    pub dnssec: bool,
    pub egress_filter: bool,
    pub egress_filter_ttl: i64,
    pub serve: Vec<DnsServe>,
    pub inspect: Vec<DnsInspect>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionalForward {
    pub domain: String,
    pub servers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamDoh {
    pub name: String,
    pub url: String,
    pub bootstrap: String,
    pub server_name: String,
    pub enabled: bool,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamDot {
    pub name: String,
    pub server: String,
    pub server_name: String,
    pub enabled: bool,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamDnsCrypt {
    pub name: String,
    pub stamp: String,
    pub provider_name: String,
    pub server_addr: String,
    pub public_key: String,
    pub enabled: bool,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecursiveConfig {
    pub root_hints_file: String,
    pub auto_update_root_hints: bool,
    pub max_depth: i64,
    pub query_timeout: i64,
    pub max_concurrent: i64,
    pub harden_glue: bool,
    pub harden_dnssec_stripped: bool,
    pub harden_below_nxdomain: bool,
    pub harden_referral_path: bool,
    pub qname_minimisation: bool,
    pub aggressive_nsec: bool,
    pub prefetch: bool,
    pub prefetch_key: bool,
}

/// DNS service offered to one zone pattern (`*` for all zones).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsServe {
    pub zone: String,
    pub listen_port: i64,
    pub local_domain: String,
    pub expand_hosts: bool,
    pub dhcp_integration: bool,
    pub authoritative_for: String,
    pub rebind_protection: bool,
    pub query_logging: bool,
    pub rate_limit_per_sec: i64,
    pub blocklists: Vec<DnsBlocklist>,
    pub allowlist: Vec<String>,
    pub blocked_ttl: i64,
    pub blocked_address: String,
    pub cache_enabled: bool,
    pub cache_size: i64,
    pub cache_min_ttl: i64,
    pub cache_max_ttl: i64,
    pub negative_cache_ttl: i64,
    pub doh_server: Option<DohServer>,
    pub dot_server: Option<DotServer>,
    pub dnscrypt_server: Option<DnsCryptServer>,
    pub hosts: Vec<DnsHost>,
    pub zones: Vec<DnsZone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsBlocklist {
    pub name: String,
    pub url: String,
    pub file: String,
    pub format: String,
    pub enabled: bool,
    pub refresh_hours: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DohServer {
    pub enabled: bool,
    pub listen_addr: String,
    pub path: String,
    pub cert_file: String,
    pub key_file: String,
    pub use_letsencrypt: bool,
    pub domain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotServer {
    pub enabled: bool,
    pub listen_addr: String,
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsCryptServer {
    pub enabled: bool,
    pub listen_addr: String,
    pub provider_name: String,
    pub public_key_file: String,
    pub secret_key_file: String,
    pub cert_file: String,
    pub cert_ttl: i64,
    pub es_version: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsHost {
    pub ip: String,
    pub hostnames: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsZone {
    pub name: String,
    pub records: Vec<DnsRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
    pub ttl: i64,
    pub priority: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsInspect {
    pub zone: String,
    /// "redirect" or "passive".
    pub mode: String,
    pub exclude_router: bool,
}

/// Legacy single-block DNS server, folded into `dns` on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsServer {
    pub enabled: bool,
    pub listen_on: Vec<String>,
    pub listen_port: i64,
    pub local_domain: String,
    pub expand_hosts: bool,
    pub dhcp_integration: bool,
    pub authoritative_for: String,
    pub mode: String,
    pub forwarders: Vec<String>,
    pub conditional_forwarders: Vec<ConditionalForward>,
    pub upstream_timeout: i64,
    pub upstream_doh: Vec<UpstreamDoh>,
    pub upstream_dot: Vec<UpstreamDot>,
    pub upstream_dnscrypt: Vec<UpstreamDnsCrypt>,
    pub doh_server: Option<DohServer>,
    pub dot_server: Option<DotServer>,
    pub dnscrypt_server: Option<DnsCryptServer>,
    pub recursive: Option<RecursiveConfig>,
    pub dnssec: bool,
    pub rebind_protection: bool,
    pub query_logging: bool,
    pub rate_limit_per_sec: i64,
    pub blocklists: Vec<DnsBlocklist>,
    pub allowlist: Vec<String>,
    pub blocked_ttl: i64,
    pub blocked_address: String,
    pub cache_enabled: bool,
    pub cache_size: i64,
    pub cache_min_ttl: i64,
    pub cache_max_ttl: i64,
    pub negative_cache_ttl: i64,
    pub hosts: Vec<DnsHost>,
    pub zones: Vec<DnsZone>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MdnsConfig {
    pub enabled: bool,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpnpConfig {
    pub enabled: bool,
    pub external_interface: String,
    pub internal_interfaces: Vec<String>,
    pub secure_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NtpConfig {
    pub enabled: bool,
    pub servers: Vec<String>,
    pub interval: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogConfig {
    pub enabled: bool,
    pub host: String,
    pub port: i64,
    pub protocol: String,
    pub tag: String,
    pub facility: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DdnsConfig {
    pub enabled: bool,
    pub provider: String,
    pub hostname: String,
    pub token: String,
    pub username: String,
    pub zone_id: String,
    pub record_id: String,
    pub interface: String,
    pub interval: i64,
}
