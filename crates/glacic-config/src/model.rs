//! Typed in-memory representation of the firewall configuration.
//!
//! Serde field names are the JSON dialect names. The config-syntax block
//! keywords that map onto them (`interface` -> `interfaces`, ...) live in
//! the decoder's block table.

use serde::{Deserialize, Serialize};

pub use crate::model_network::{
    Bgp, BgpNeighbor, Bond, FrrConfig, HealthCheck, Interface, MarkRule, MultiWan, Ospf, OspfArea,
    PolicyRoute, QosClass, QosPolicy, QosRule, Route, RoutingTable, TlsConfig, UidRouting,
    UplinkDef, UplinkGroup, Vlan, WanLink,
};
pub use crate::model_policy::{
    AnomalyConfig, InterfaceProtection, IpSet, NatRule, Policy, PolicyRule, RuleLearningConfig,
    ScheduledRule, ServicePort, ThreatIntel, ThreatSource, Zone, ZoneManagement, ZoneMatch,
    ZoneServices,
};
pub use crate::model_services::{
    ConditionalForward, DdnsConfig, DhcpReservation, DhcpScope, DhcpServer, DnsBlocklist,
    DnsConfig, DnsCryptServer, DnsHost, DnsInspect, DnsRecord, DnsServe, DnsServer, DnsZone,
    DohServer, DotServer, MdnsConfig, NtpConfig, RecursiveConfig, SyslogConfig, UpnpConfig,
    UpstreamDnsCrypt, UpstreamDoh, UpstreamDot,
};
pub use crate::model_system::{
    AccessRule, ApiConfig, ApiKey, AuditConfig, Features, GeoIpConfig, LetsEncryptConfig,
    NotificationChannel, NotificationsConfig, ReplicationConfig, SchedulerConfig, SixToFourConfig,
    SystemConfig, TailscaleConfig, VpnConfig, WebConfig, WireGuardConfig, WireGuardPeer,
};

use crate::version::CURRENT_SCHEMA_VERSION;

/// Root of the declarative configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `Major.Minor`; empty means 1.0.
    pub schema_version: String,
    pub ip_forwarding: bool,
    pub mss_clamping: bool,
    pub enable_flow_offload: bool,
    pub state_dir: String,

    pub interfaces: Vec<Interface>,
    pub zones: Vec<Zone>,
    pub policies: Vec<Policy>,
    pub nat: Vec<NatRule>,
    pub ipsets: Vec<IpSet>,
    pub routes: Vec<Route>,
    pub routing_tables: Vec<RoutingTable>,
    pub policy_routes: Vec<PolicyRoute>,
    pub mark_rules: Vec<MarkRule>,
    pub uid_routing: Vec<UidRouting>,
    pub multi_wan: Option<MultiWan>,
    pub uplink_groups: Vec<UplinkGroup>,
    pub frr: Option<FrrConfig>,
    pub protections: Vec<InterfaceProtection>,
    pub qos_policies: Vec<QosPolicy>,
    pub scheduler: Option<SchedulerConfig>,
    pub scheduled_rules: Vec<ScheduledRule>,

    pub dhcp: Option<DhcpServer>,
    pub dns: Option<DnsConfig>,
    /// Legacy block; folded into `dns` by a post-load migration.
    pub dns_server: Option<DnsServer>,
    pub mdns: Option<MdnsConfig>,
    pub upnp: Option<UpnpConfig>,
    pub ntp: Option<NtpConfig>,
    pub syslog: Option<SyslogConfig>,
    pub ddns: Option<DdnsConfig>,

    pub api: Option<ApiConfig>,
    pub web: Option<WebConfig>,
    pub tls: Option<TlsConfig>,
    pub vpn: Option<VpnConfig>,
    pub audit: Option<AuditConfig>,
    pub geoip: Option<GeoIpConfig>,
    pub threat_intel: Option<ThreatIntel>,
    pub rule_learning: Option<RuleLearningConfig>,
    pub anomaly_detection: Option<AnomalyConfig>,
    pub notifications: Option<NotificationsConfig>,
    pub replication: Option<ReplicationConfig>,
    pub features: Option<Features>,
    pub system: Option<SystemConfig>,
}

impl Config {
    /// The config returned when nothing could be salvaged: forwarding on and
    /// the API reachable on its default ports.
    pub fn minimal() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION.to_string(),
            ip_forwarding: true,
            api: Some(ApiConfig {
                enabled: true,
                listen: ":8080".to_string(),
                tls_listen: ":8443".to_string(),
                ..ApiConfig::default()
            }),
            ..Self::default()
        }
    }

    pub fn find_zone(&self, name: &str) -> Option<&Zone> {
        self.zones.iter().find(|z| z.name.eq_ignore_ascii_case(name))
    }

    pub fn find_interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.name == name)
    }

    pub fn find_policy(&self, name: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.name == name)
    }

    pub fn find_ipset(&self, name: &str) -> Option<&IpSet> {
        self.ipsets.iter().find(|s| s.name == name)
    }

    /// Zone names plus every zone referenced from an interface or VLAN.
    pub fn defined_zone_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut push = |name: &str| {
            if !name.is_empty() && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        };
        for zone in &self.zones {
            push(&zone.name);
        }
        for iface in &self.interfaces {
            push(&iface.zone);
            for vlan in &iface.vlans {
                push(&vlan.zone);
            }
        }
        names
    }
}

/// Interface name of a VLAN sub-interface.
pub fn vlan_interface_name(parent: &str, vlan_id: &str) -> String {
    format!("{parent}.{vlan_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = Config::minimal();
        assert_eq!(cfg.schema_version, "1.0");
        assert!(cfg.ip_forwarding);
        let api = cfg.api.unwrap();
        assert!(api.enabled);
        assert_eq!(api.listen, ":8080");
        assert_eq!(api.tls_listen, ":8443");
    }

    #[test]
    fn test_find_zone_is_case_insensitive() {
        let cfg = Config {
            zones: vec![Zone {
                name: "LAN".into(),
                ..Zone::default()
            }],
            ..Config::default()
        };
        assert!(cfg.find_zone("lan").is_some());
        assert!(cfg.find_zone("wan").is_none());
    }

    #[test]
    fn test_defined_zone_names_include_interface_references() {
        let cfg = Config {
            zones: vec![Zone {
                name: "lan".into(),
                ..Zone::default()
            }],
            interfaces: vec![Interface {
                name: "eth0".into(),
                zone: "wan".into(),
                vlans: vec![Vlan {
                    id: "10".into(),
                    zone: "iot".into(),
                    ..Vlan::default()
                }],
                ..Interface::default()
            }],
            ..Config::default()
        };
        assert_eq!(cfg.defined_zone_names(), vec!["lan", "wan", "iot"]);
    }

    #[test]
    fn test_json_field_names() {
        let cfg = Config {
            vpn: Some(VpnConfig::default()),
            nat: vec![NatRule {
                name: "pf".into(),
                kind: "dnat".into(),
                ..NatRule::default()
            }],
            ..Config::default()
        };
        let value = serde_json::to_value(&cfg).unwrap();
        assert!(value["vpn"].get("6to4").is_some());
        assert_eq!(value["nat"][0]["type"], "dnat");
    }
}
