use serde::{Deserialize, Serialize};

use crate::model_policy::{Zone, ZoneManagement};

/// A physical, bonded or virtual network device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Interface {
    pub name: String,
    pub description: String,
    /// Bring the device down without removing its configuration.
    pub disabled: bool,
    /// Deprecated: zone membership now lives on the zone as a match.
    pub zone: String,
    /// Inline zone definition created together with the interface.
    pub new_zone: Option<Zone>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
    pub dhcp: bool,
    pub dhcp_v6: bool,
    pub ra: bool,
    /// DHCP client mode: "builtin", "external" or "monitor".
    pub dhcp_client: String,
    pub table: i64,
    pub gateway: String,
    pub gateway_v6: String,
    pub mtu: i64,
    pub bond: Option<Bond>,
    pub vlans: Vec<Vlan>,
    pub disable_anti_lockout: bool,
    /// Deprecated pair, folded into `web.allow` on load.
    pub access_web_ui: bool,
    pub web_ui_port: i64,
    pub management: Option<ZoneManagement>,
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bond {
    pub mode: String,
    pub interfaces: Vec<String>,
}

/// 802.1Q sub-interface, addressed as `<parent>.<id>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vlan {
    pub id: String,
    pub description: String,
    pub zone: String,
    pub new_zone: Option<Zone>,
    pub ipv4: Vec<String>,
    pub ipv6: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// "self-signed", "acme", "tailscale" or "manual".
    pub mode: String,
    pub hostname: String,
    pub email: String,
    pub domains: Vec<String>,
    pub cert_file: String,
    pub key_file: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub name: String,
    pub destination: String,
    pub gateway: String,
    pub interface: String,
    pub monitor_ip: String,
    pub table: i64,
    pub metric: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingTable {
    pub name: String,
    pub id: i64,
    pub routes: Vec<Route>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyRoute {
    pub name: String,
    pub priority: i64,
    pub mark: String,
    pub mark_mask: String,
    pub from: String,
    pub to: String,
    pub iif: String,
    pub oif: String,
    pub fwmark: String,
    pub table: i64,
    pub blackhole: bool,
    pub prohibit: bool,
    pub enabled: bool,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkRule {
    pub name: String,
    pub mark: String,
    pub mask: String,
    pub proto: String,
    pub src_ip: String,
    pub dst_ip: String,
    pub src_port: i64,
    pub dst_port: i64,
    pub dst_ports: Vec<i64>,
    pub in_interface: String,
    pub out_interface: String,
    pub src_zone: String,
    pub dst_zone: String,
    pub ipset: String,
    pub conn_state: Vec<String>,
    pub save_mark: bool,
    pub restore_mark: bool,
    pub enabled: bool,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiWan {
    pub enabled: bool,
    /// "failover", "loadbalance" or "both".
    pub mode: String,
    pub wans: Vec<WanLink>,
    pub health_check: Option<HealthCheck>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WanLink {
    pub name: String,
    pub interface: String,
    pub gateway: String,
    pub weight: i64,
    pub priority: i64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheck {
    pub interval: i64,
    pub timeout: i64,
    pub threshold: i64,
    pub targets: Vec<String>,
    pub http_check: String,
}

/// Group of uplinks (WAN, VPN) with failover and load balancing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkGroup {
    pub name: String,
    pub uplinks: Vec<UplinkDef>,
    pub source_networks: Vec<String>,
    pub source_interfaces: Vec<String>,
    pub source_zones: Vec<String>,
    pub failover_mode: String,
    pub failback_mode: String,
    pub failover_delay: i64,
    pub failback_delay: i64,
    pub load_balance_mode: String,
    pub sticky_connections: bool,
    pub health_check: Option<HealthCheck>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UplinkDef {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub interface: String,
    pub gateway: String,
    pub local_ip: String,
    pub tier: i64,
    pub weight: i64,
    pub enabled: bool,
    pub comment: String,
    pub health_check_cmd: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UidRouting {
    pub name: String,
    pub uid: i64,
    pub username: String,
    pub uplink: String,
    pub vpn_link: String,
    pub interface: String,
    pub snat_ip: String,
    pub enabled: bool,
    pub comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrrConfig {
    pub enabled: bool,
    pub ospf: Option<Ospf>,
    pub bgp: Option<Bgp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ospf {
    pub router_id: String,
    pub networks: Vec<String>,
    pub areas: Vec<OspfArea>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OspfArea {
    pub id: String,
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bgp {
    pub asn: i64,
    pub router_id: String,
    pub neighbors: Vec<BgpNeighbor>,
    pub networks: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BgpNeighbor {
    pub ip: String,
    pub remote_asn: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QosPolicy {
    pub name: String,
    pub interface: String,
    pub enabled: bool,
    pub direction: String,
    pub download_mbps: i64,
    pub upload_mbps: i64,
    pub classes: Vec<QosClass>,
    pub rules: Vec<QosRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QosClass {
    pub name: String,
    pub priority: i64,
    pub rate: String,
    pub ceil: String,
    pub burst: String,
    pub queue_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QosRule {
    pub name: String,
    pub class: String,
    pub proto: String,
    pub src_ip: String,
    pub dest_ip: String,
    pub src_port: i64,
    pub dest_port: i64,
    pub services: Vec<String>,
    pub threat_intel: bool,
    pub dscp: String,
    pub set_dscp: String,
}
