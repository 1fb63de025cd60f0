//! Semantic validation of a decoded config.
//!
//! Every rule appends to one [`ValidationErrors`] list instead of failing
//! fast, so a caller sees all problems at once and decides which severity
//! is fatal.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::LazyLock;

pub use glacic_core::Severity;
use glacic_core::ConfigError;
use ipnet::IpNet;
use regex::Regex;
use serde::Serialize;

use crate::expand::is_wildcard_zone;
use crate::inherit::find_cycle;
use crate::model::Config;

static INTERFACE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9._-]{0,14}$").expect("interface name regex is valid")
});
static SET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]{0,62}$").expect("set name regex is valid")
});

const IPSET_TYPES: &[&str] = &["", "ipv4_addr", "ipv6_addr", "inet_service", "dns"];
const FIREHOL_LISTS: &[&str] = &[
    "firehol_level1",
    "firehol_level2",
    "firehol_level3",
    "spamhaus_drop",
    "spamhaus_edrop",
    "dshield",
    "blocklist_de",
    "feodo",
    "tor_exits",
    "fullbogons",
];
const IPSET_ACTIONS: &[&str] = &["", "drop", "accept", "reject", "log"];
const IPSET_APPLY_TO: &[&str] = &["", "input", "forward", "both"];
const NAT_TYPES: &[&str] = &["masquerade", "snat", "dnat", "redirect"];
const RULE_ACTIONS: &[&str] = &["accept", "drop", "reject", "jump", "return", "log"];
const RULE_PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "any"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ValidationError> {
        self.0.iter()
    }

    /// True when any entry has error severity.
    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn errors(&self) -> Vec<&ValidationError> {
        self.0.iter().filter(|e| e.severity == Severity::Error).collect()
    }

    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.0
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .collect()
    }

    /// `Err(ConfigError::Validation)` carrying the error-severity entries.
    pub fn into_result(self) -> Result<(), ConfigError> {
        let errors: Vec<String> = self.errors().iter().map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: field.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: field.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&joined.join("; "))
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a ValidationError;
    type IntoIter = std::slice::Iter<'a, ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Parses `addr/prefix`; host bits may be set, as in `192.168.1.1/24`.
pub fn parse_cidr(s: &str) -> Option<IpNet> {
    s.parse().ok()
}

fn overlaps(a: &IpNet, b: &IpNet) -> bool {
    a.contains(b) || b.contains(a)
}

pub fn is_valid_cidr(s: &str) -> bool {
    parse_cidr(s).is_some()
}

pub fn is_valid_ip_or_cidr(s: &str) -> bool {
    if s.contains('/') {
        is_valid_cidr(s)
    } else {
        s.parse::<IpAddr>().is_ok()
    }
}

fn is_valid_port_or_range(s: &str) -> bool {
    let valid = |p: &str| p.trim().parse::<u16>().is_ok_and(|n| n >= 1);
    match s.split_once('-') {
        Some((lo, hi)) => {
            valid(lo) && valid(hi) && lo.trim().parse::<u16>().ok() <= hi.trim().parse::<u16>().ok()
        }
        None => valid(s),
    }
}

pub fn is_valid_interface_name(name: &str) -> bool {
    INTERFACE_NAME.is_match(name)
}

pub fn is_valid_set_name(name: &str) -> bool {
    SET_NAME.is_match(name)
}

/// Checks every invariant and returns all findings.
pub fn validate(config: &Config) -> ValidationErrors {
    let mut errs = ValidationErrors::default();
    validate_zones(config, &mut errs);
    validate_interfaces(config, &mut errs);
    validate_interface_overlaps(config, &mut errs);
    validate_ipsets(config, &mut errs);
    validate_policies(config, &mut errs);
    validate_nat(config, &mut errs);
    validate_routes(config, &mut errs);
    validate_dhcp_options(config, &mut errs);
    errs
}

fn check_vlan(errs: &mut ValidationErrors, field: &str, vlan: i64) {
    if vlan != 0 && !(1..=4094).contains(&vlan) {
        errs.error(field, format!("VLAN must be between 1 and 4094, got {vlan}"));
    }
}

fn check_address(errs: &mut ValidationErrors, field: String, value: &str) {
    if !value.is_empty() && !is_valid_ip_or_cidr(value) {
        errs.error(field, format!("invalid IP or CIDR: {value}"));
    }
}

fn validate_zones(config: &Config, errs: &mut ValidationErrors) {
    for (i, zone) in config.zones.iter().enumerate() {
        let field = if zone.name.is_empty() {
            format!("zones[{i}]")
        } else {
            format!("zones[{}]", zone.name)
        };
        check_address(errs, format!("{field}.src"), &zone.src);
        check_address(errs, format!("{field}.dst"), &zone.dst);
        check_vlan(errs, &format!("{field}.vlan"), zone.vlan);

        for (j, m) in zone.matches.iter().enumerate() {
            let match_field = format!("{field}.match[{j}]");
            check_address(errs, format!("{match_field}.src"), &m.src);
            check_address(errs, format!("{match_field}.dst"), &m.dst);
            check_vlan(errs, &format!("{match_field}.vlan"), m.vlan);
        }
    }
}

fn validate_interfaces(config: &Config, errs: &mut ValidationErrors) {
    let mut seen = HashSet::new();
    for (i, iface) in config.interfaces.iter().enumerate() {
        let field = format!("interfaces[{i}]");
        if !seen.insert(iface.name.as_str()) {
            errs.error(
                format!("{field}.name"),
                format!("duplicate interface name: {}", iface.name),
            );
        }
        if !is_valid_interface_name(&iface.name) {
            errs.error(
                format!("{field}.name"),
                format!("invalid interface name: {}", iface.name),
            );
        }
        for (j, addr) in iface.ipv4.iter().enumerate() {
            if !matches!(parse_cidr(addr), Some(IpNet::V4(_))) {
                errs.error(
                    format!("{field}.ipv4[{j}]"),
                    format!("invalid IPv4 CIDR: {addr}"),
                );
            }
        }
        if iface.mtu != 0 && !(576..=65535).contains(&iface.mtu) {
            errs.error(
                format!("{field}.mtu"),
                format!("MTU must be between 576 and 65535, got {}", iface.mtu),
            );
        }
        for (j, vlan) in iface.vlans.iter().enumerate() {
            let id_ok = vlan
                .id
                .trim()
                .parse::<i64>()
                .is_ok_and(|id| (1..=4094).contains(&id));
            if !id_ok {
                errs.error(
                    format!("{field}.vlans[{j}].id"),
                    format!("VLAN ID must be between 1 and 4094, got {}", vlan.id),
                );
            }
        }
    }
}

fn validate_interface_overlaps(config: &Config, errs: &mut ValidationErrors) {
    let mut networks: Vec<(String, IpNet, &str)> = Vec::new();
    for iface in &config.interfaces {
        for addr in &iface.ipv4 {
            if let Some(cidr) = parse_cidr(addr) {
                networks.push((iface.name.clone(), cidr, addr));
            }
        }
        for vlan in &iface.vlans {
            for addr in &vlan.ipv4 {
                if let Some(cidr) = parse_cidr(addr) {
                    networks.push((format!("{}.vlan{}", iface.name, vlan.id), cidr, addr));
                }
            }
        }
    }

    for (i, (name_a, net_a, cidr_a)) in networks.iter().enumerate() {
        for (name_b, net_b, cidr_b) in &networks[i + 1..] {
            if name_a == name_b {
                if net_a.trunc() == net_b.trunc() {
                    errs.error(
                        format!("interfaces[{name_a}]"),
                        format!("duplicate subnet {cidr_a} on same interface"),
                    );
                }
            } else if overlaps(net_a, net_b) {
                errs.error(
                    "interfaces",
                    format!(
                        "overlapping subnets detected: {name_a} ({cidr_a}) and {name_b} ({cidr_b})"
                    ),
                );
            }
        }
    }
}

fn validate_ipsets(config: &Config, errs: &mut ValidationErrors) {
    let mut seen = HashSet::new();
    for (i, set) in config.ipsets.iter().enumerate() {
        let field = format!("ipsets[{i}]");
        if !seen.insert(set.name.as_str()) {
            errs.error(
                format!("{field}.name"),
                format!("duplicate IPSet name: {}", set.name),
            );
        }
        if !is_valid_set_name(&set.name) {
            errs.error(
                format!("{field}.name"),
                format!(
                    "invalid IPSet name (use alphanumeric, underscore, hyphen): {}",
                    set.name
                ),
            );
        }
        if !IPSET_TYPES.contains(&set.kind.as_str()) {
            errs.error(
                format!("{field}.type"),
                format!(
                    "invalid IPSet type: {} (use ipv4_addr, ipv6_addr, inet_service, or dns)",
                    set.kind
                ),
            );
        }
        for (j, entry) in set.entries.iter().enumerate() {
            let entry_field = format!("{field}.entries[{j}]");
            if set.kind == "inet_service" {
                if !is_valid_port_or_range(entry) {
                    errs.error(entry_field, format!("invalid port or port range: {entry}"));
                }
            } else if !is_valid_ip_or_cidr(entry) {
                errs.error(entry_field, format!("invalid IP or CIDR: {entry}"));
            }
        }
        if !set.firehol_list.is_empty() && !FIREHOL_LISTS.contains(&set.firehol_list.as_str()) {
            errs.error(
                format!("{field}.firehol_list"),
                format!("unknown FireHOL list: {}", set.firehol_list),
            );
        }
        if !set.url.is_empty()
            && !(set.url.starts_with("http://") || set.url.starts_with("https://"))
        {
            errs.error(format!("{field}.url"), format!("invalid URL: {}", set.url));
        }
        if set.refresh_hours < 0 {
            errs.error(
                format!("{field}.refresh_hours"),
                "refresh_hours cannot be negative",
            );
        }
        if !IPSET_ACTIONS.contains(&set.action.as_str()) {
            errs.error(
                format!("{field}.action"),
                format!(
                    "invalid action: {} (use drop, accept, reject, or log)",
                    set.action
                ),
            );
        }
        if !IPSET_APPLY_TO.contains(&set.apply_to.as_str()) {
            errs.error(
                format!("{field}.apply_to"),
                format!(
                    "invalid apply_to: {} (use input, forward, or both)",
                    set.apply_to
                ),
            );
        }
    }
}

fn check_port(errs: &mut ValidationErrors, field: String, port: i64) {
    if port != 0 && !(1..=65535).contains(&port) {
        errs.error(field, format!("port must be between 1 and 65535, got {port}"));
    }
}

fn validate_policies(config: &Config, errs: &mut ValidationErrors) {
    let zones: HashSet<String> = config.defined_zone_names().into_iter().collect();
    let is_firewall = |z: &str| z.eq_ignore_ascii_case("self") || z.eq_ignore_ascii_case("firewall");

    for (i, policy) in config.policies.iter().enumerate() {
        let field = format!("policies[{i}]");
        if !policy.from.is_empty()
            && !is_wildcard_zone(&policy.from)
            && !is_firewall(&policy.from)
            && !zones.contains(&policy.from)
        {
            errs.error(
                format!("{field}.from"),
                format!("unknown zone: {}", policy.from),
            );
        }
        if !policy.to.is_empty()
            && !is_wildcard_zone(&policy.to)
            && !is_firewall(&policy.to)
            && !zones.contains(&policy.to)
        {
            errs.error(format!("{field}.to"), format!("unknown zone: {}", policy.to));
        }

        for (j, rule) in policy.rules.iter().enumerate() {
            let rule_field = format!("{field}.rules[{j}]");
            if !RULE_ACTIONS.contains(&rule.action.to_ascii_lowercase().as_str()) {
                errs.error(
                    format!("{rule_field}.action"),
                    format!("invalid action: {}", rule.action),
                );
            }
            if !rule.proto.is_empty()
                && !RULE_PROTOCOLS.contains(&rule.proto.to_ascii_lowercase().as_str())
            {
                errs.error(
                    format!("{rule_field}.proto"),
                    format!("invalid protocol: {}", rule.proto),
                );
            }
            check_port(errs, format!("{rule_field}.dest_port"), rule.dest_port);
            check_port(errs, format!("{rule_field}.src_port"), rule.src_port);
            for (k, port) in rule.dest_ports.iter().enumerate() {
                check_port(errs, format!("{rule_field}.dest_ports[{k}]"), *port);
            }
            for (k, port) in rule.src_ports.iter().enumerate() {
                check_port(errs, format!("{rule_field}.src_ports[{k}]"), *port);
            }
            for (attr, set) in [("src_ipset", &rule.src_ipset), ("dest_ipset", &rule.dest_ipset)] {
                if !set.is_empty() && config.find_ipset(set).is_none() {
                    errs.error(
                        format!("{rule_field}.{attr}"),
                        format!("unknown IPSet: {set}"),
                    );
                }
            }
        }

        if !policy.inherits.is_empty() {
            if policy.inherits == policy.name {
                errs.error(
                    format!("{field}.inherits"),
                    "policy cannot inherit from itself",
                );
            } else if config.find_policy(&policy.inherits).is_none() {
                errs.error(
                    format!("{field}.inherits"),
                    format!("unknown parent policy: {}", policy.inherits),
                );
            } else if let Some(name) = find_cycle(&config.policies, policy) {
                errs.error(
                    format!("{field}.inherits"),
                    format!("circular inheritance detected involving: {name}"),
                );
            }
        }
    }

    let mut combos: HashMap<(String, String), Vec<usize>> = HashMap::new();
    for (i, policy) in config.policies.iter().enumerate() {
        combos
            .entry((policy.from.clone(), policy.to.clone()))
            .or_default()
            .push(i);
    }
    let mut duplicated: Vec<(usize, String)> = Vec::new();
    for ((from, to), indices) in &combos {
        if indices.len() < 2 {
            continue;
        }
        for &idx in indices {
            let policy = &config.policies[idx];
            let related = indices.iter().any(|&other| {
                let other = &config.policies[other];
                other.name != policy.name
                    && (policy.inherits == other.name || other.inherits == policy.name)
            });
            if !related && policy.inherits.is_empty() {
                duplicated.push((idx, format!("{from}->{to}")));
            }
        }
    }
    duplicated.sort();
    for (idx, combo) in duplicated {
        errs.warning(
            format!("policies[{idx}]"),
            format!("duplicate zone combination {combo} without inheritance relationship"),
        );
    }
}

fn validate_nat(config: &Config, errs: &mut ValidationErrors) {
    for (i, nat) in config.nat.iter().enumerate() {
        if !NAT_TYPES.contains(&nat.kind.to_ascii_lowercase().as_str()) {
            errs.error(
                format!("nat[{i}].type"),
                format!("invalid NAT type: {}", nat.kind),
            );
        }
    }
}

fn validate_routes(config: &Config, errs: &mut ValidationErrors) {
    for (i, route) in config.routes.iter().enumerate() {
        let field = format!("routes[{i}]");
        if !route.destination.is_empty() && !is_valid_cidr(&route.destination) {
            errs.error(
                format!("{field}.destination"),
                format!("invalid destination CIDR: {}", route.destination),
            );
        }
        if !route.gateway.is_empty() && route.gateway.parse::<IpAddr>().is_err() {
            errs.error(
                format!("{field}.gateway"),
                format!("invalid gateway IP: {}", route.gateway),
            );
        }
    }
}

fn validate_dhcp_options(config: &Config, errs: &mut ValidationErrors) {
    let Some(dhcp) = &config.dhcp else {
        return;
    };
    for (i, scope) in dhcp.scopes.iter().enumerate() {
        for (key, value) in &scope.options {
            if let Err(err) = crate::dhcp_options::parse_option(key, value) {
                errs.error(format!("dhcp.scopes[{i}].options.{key}"), err.to_string());
            }
        }
        for (j, reservation) in scope.reservations.iter().enumerate() {
            for (key, value) in &reservation.options {
                if let Err(err) = crate::dhcp_options::parse_option(key, value) {
                    errs.error(
                        format!("dhcp.scopes[{i}].reservations[{j}].options.{key}"),
                        err.to_string(),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
