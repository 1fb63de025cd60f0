use serde::{Deserialize, Serialize};

/// Traffic policy between two zones, labeled `(from, to)`.
///
/// Either label may be a zone name, `self`/`firewall`, or a glob such as
/// `*` that is expanded against the defined zones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub from: String,
    pub to: String,
    /// Filled with `<from>-to-<to>` on load when empty.
    pub name: String,
    pub description: String,
    /// Lower values are evaluated first.
    pub priority: i64,
    pub disabled: bool,
    /// Default action when no rule matches.
    pub action: String,
    /// Tri-state: unset means auto-detect from the destination zone.
    pub masquerade: Option<bool>,
    pub log: bool,
    pub log_prefix: String,
    pub rules: Vec<PolicyRule>,
    /// Name of the parent policy whose rules precede this one's.
    pub inherits: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRule {
    pub name: String,
    pub id: String,
    pub description: String,
    pub disabled: bool,
    pub order: i64,
    pub insert_after: String,

    pub proto: String,
    pub dest_port: i64,
    pub dest_ports: Vec<i64>,
    pub src_port: i64,
    pub src_ports: Vec<i64>,
    pub services: Vec<String>,
    pub src_ip: String,
    pub src_ipset: String,
    pub dest_ip: String,
    pub dest_ipset: String,
    pub src_zone: String,
    pub dest_zone: String,
    pub in_interface: String,
    pub out_interface: String,
    pub conn_state: String,
    pub source_country: String,
    pub dest_country: String,
    pub invert_src: bool,
    pub invert_dest: bool,
    pub tcp_flags: String,
    pub max_connections: i64,
    /// Time-of-day window, `HH:MM`.
    pub time_start: String,
    pub time_end: String,
    pub days: Vec<String>,

    /// One of accept, drop, reject, jump, return, log.
    pub action: String,
    pub jump_target: String,

    pub log: bool,
    pub log_prefix: String,
    pub log_level: String,
    pub limit: String,
    pub counter: String,
    pub comment: String,
    pub tags: Vec<String>,
    pub group: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatRule {
    pub name: String,
    pub description: String,
    /// masquerade, snat, dnat or redirect.
    #[serde(rename = "type")]
    pub kind: String,
    pub proto: String,
    pub out_interface: String,
    pub in_interface: String,
    pub src_ip: String,
    pub dest_ip: String,
    pub mark: i64,
    /// Single port or `start-end` range.
    pub dest_port: String,
    pub to_ip: String,
    pub to_port: String,
    pub snat_ip: String,
    pub hairpin: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpSet {
    pub name: String,
    pub description: String,
    /// ipv4_addr (default), ipv6_addr, inet_service or dns.
    #[serde(rename = "type")]
    pub kind: String,
    pub entries: Vec<String>,
    /// Domains resolved into the set when `type = "dns"`.
    pub domains: Vec<String>,
    pub refresh_interval: String,
    pub size: i64,
    pub firehol_list: String,
    pub url: String,
    pub refresh_hours: i64,
    pub auto_update: bool,
    pub action: String,
    pub apply_to: String,
    pub match_on_source: bool,
    pub match_on_dest: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterfaceProtection {
    pub name: String,
    /// Interface name, or `*` for every interface.
    pub interface: String,
    pub enabled: bool,
    pub anti_spoofing: bool,
    pub bogon_filtering: bool,
    pub private_filtering: bool,
    pub invalid_packets: bool,
    pub syn_flood_protection: bool,
    pub syn_flood_rate: i64,
    pub syn_flood_burst: i64,
    pub icmp_rate_limit: bool,
    pub icmp_rate: i64,
    pub icmp_burst: i64,
    pub new_conn_rate_limit: bool,
    pub new_conn_rate: i64,
    pub new_conn_burst: i64,
    pub port_scan_protection: bool,
    pub port_scan_threshold: i64,
    pub geo_blocking: bool,
    pub blocked_countries: Vec<String>,
    pub allowed_countries: Vec<String>,
}

/// A named grouping of traffic by interface, address and VLAN.
///
/// Membership is the OR of: the implicit match built from the top-level
/// `interface`/`src`/`dst`/`vlan` fields, each explicit `match` block (whose
/// unset fields default to the top-level ones), and the deprecated
/// `interfaces` list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub name: String,
    pub color: String,
    pub description: String,
    /// Exact name, or a prefix when ending in `+` or `*`.
    pub interface: String,
    pub src: String,
    pub dst: String,
    pub vlan: i64,
    pub matches: Vec<ZoneMatch>,
    /// Deprecated: canonicalized into `matches` on load.
    pub interfaces: Vec<String>,
    pub ipsets: Vec<String>,
    pub networks: Vec<String>,
    /// Intra-zone action: accept, drop or reject.
    pub action: String,
    pub external: Option<bool>,
    pub services: Option<ZoneServices>,
    pub management: Option<ZoneManagement>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub dhcp: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneMatch {
    pub interface: String,
    pub src: String,
    pub dst: String,
    pub vlan: i64,
}

/// Services the firewall offers to clients in a zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneServices {
    pub dhcp: bool,
    pub dns: bool,
    pub ntp: bool,
    pub captive_portal: bool,
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicePort {
    pub name: String,
    pub protocol: String,
    pub port: i64,
    pub port_end: i64,
}

/// Administrative channels permitted into the firewall.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneManagement {
    /// Legacy spelling of `web`.
    pub web_ui: bool,
    pub web: bool,
    pub ssh: bool,
    pub api: bool,
    pub icmp: bool,
    pub snmp: bool,
    pub syslog: bool,
}

impl ZoneManagement {
    pub fn allows_web(&self) -> bool {
        self.web || self.web_ui
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledRule {
    pub name: String,
    pub description: String,
    pub policy: String,
    pub rule: Option<PolicyRule>,
    /// Cron expression enabling the rule.
    pub schedule: String,
    pub end_schedule: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleLearningConfig {
    pub enabled: bool,
    pub log_group: i64,
    pub rate_limit: String,
    pub auto_approve: bool,
    pub ignore_networks: Vec<String>,
    pub retention_days: i64,
    pub cache_size: i64,
    pub learning_mode: bool,
    pub inline_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    pub enabled: bool,
    pub baseline_window: String,
    pub min_samples: i64,
    pub spike_stddev: f64,
    pub drop_stddev: f64,
    pub alert_cooldown: String,
    pub port_scan_threshold: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatIntel {
    pub enabled: bool,
    pub interval: String,
    pub sources: Vec<ThreatSource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreatSource {
    pub name: String,
    pub url: String,
    /// "taxii", "text" or "json".
    pub format: String,
    pub collection_id: String,
    pub username: String,
    pub password: String,
}
