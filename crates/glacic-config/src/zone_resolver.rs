//! Compiles zone definitions into packet-filter match expressions.
//!
//! A zone is the OR of its effective matches; each effective match is the
//! AND of its interface, source, destination and VLAN criteria.

use std::fmt;

use glacic_core::Direction;

use crate::model::Zone;

/// One zone-membership criterion after top-level defaults are applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EffectiveMatch {
    /// Interface in filter form: `wg+` and `wg*` both become `wg*`.
    pub interface: String,
    pub is_prefix: bool,
    pub src: String,
    pub dst: String,
    pub vlan: i64,
}

impl EffectiveMatch {
    fn for_interface(iface: &str, src: &str, dst: &str, vlan: i64) -> Self {
        Self {
            interface: interface_to_filter(iface),
            is_prefix: is_interface_wildcard(iface),
            src: src.to_string(),
            dst: dst.to_string(),
            vlan,
        }
    }

    fn interface_only(&self) -> bool {
        self.src.is_empty() && self.dst.is_empty() && self.vlan <= 0
    }

    /// Whether `name` falls under this match's interface criterion.
    pub fn matches_interface(&self, name: &str) -> bool {
        if self.is_prefix {
            name.starts_with(self.interface.trim_end_matches('*'))
        } else {
            !self.interface.is_empty() && self.interface == name
        }
    }
}

/// Compiled match expression for a whole zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchExpr {
    /// The zone has no criteria.
    Empty,
    /// AND of the clauses of a single match.
    Single(Vec<String>),
    /// Interface-only matches collapsed into one set lookup.
    InterfaceSet {
        direction: Direction,
        interfaces: Vec<String>,
    },
    /// OR of per-match clause lists.
    AnyOf(Vec<Vec<String>>),
}

impl fmt::Display for MatchExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Single(clauses) => f.write_str(&clauses.join(" ")),
            Self::InterfaceSet {
                direction,
                interfaces,
            } => {
                let quoted: Vec<String> = interfaces.iter().map(|i| format!("\"{i}\"")).collect();
                write!(f, "{} {{ {} }}", interface_keyword(*direction), quoted.join(", "))
            }
            Self::AnyOf(alternatives) => {
                let rendered: Vec<String> = alternatives.iter().map(|c| c.join(" ")).collect();
                f.write_str(&rendered.join(" | "))
            }
        }
    }
}

/// True when the interface name ends in `+` or `*`.
pub fn is_interface_wildcard(iface: &str) -> bool {
    iface.ends_with('+') || iface.ends_with('*')
}

/// The interface name without its wildcard suffix.
pub fn interface_base(iface: &str) -> &str {
    if is_interface_wildcard(iface) {
        &iface[..iface.len() - 1]
    } else {
        iface
    }
}

/// `wg+` -> `wg*`; other names unchanged.
pub fn interface_to_filter(iface: &str) -> String {
    match iface.strip_suffix('+') {
        Some(base) => format!("{base}*"),
        None => iface.to_string(),
    }
}

fn interface_keyword(direction: Direction) -> &'static str {
    match direction {
        Direction::In => "iifname",
        Direction::Out => "oifname",
    }
}

fn or_default<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

#[derive(Debug, Clone, Copy)]
pub struct ZoneResolver<'a> {
    zones: &'a [Zone],
}

impl<'a> ZoneResolver<'a> {
    pub fn new(zones: &'a [Zone]) -> Self {
        Self { zones }
    }

    fn find_zone(&self, name: &str) -> Option<&'a Zone> {
        self.zones.iter().find(|z| z.name.eq_ignore_ascii_case(name))
    }

    /// Effective matches of `zone_name`, empty when the zone is unknown.
    pub fn effective_matches(&self, zone_name: &str) -> Vec<EffectiveMatch> {
        let Some(zone) = self.find_zone(zone_name) else {
            return Vec::new();
        };

        if !zone.matches.is_empty() {
            return zone
                .matches
                .iter()
                .map(|m| {
                    let vlan = if m.vlan != 0 { m.vlan } else { zone.vlan };
                    EffectiveMatch::for_interface(
                        or_default(&m.interface, &zone.interface),
                        or_default(&m.src, &zone.src),
                        or_default(&m.dst, &zone.dst),
                        vlan,
                    )
                })
                .collect();
        }

        if !zone.interface.is_empty() || !zone.src.is_empty() {
            return vec![EffectiveMatch::for_interface(
                &zone.interface,
                &zone.src,
                &zone.dst,
                zone.vlan,
            )];
        }

        if !zone.interfaces.is_empty() {
            return zone
                .interfaces
                .iter()
                .map(|iface| EffectiveMatch::for_interface(iface, &zone.src, &zone.dst, zone.vlan))
                .collect();
        }

        if !zone.networks.is_empty() {
            return vec![EffectiveMatch {
                src: zone.networks.join(","),
                ..EffectiveMatch::default()
            }];
        }

        Vec::new()
    }

    /// First zone, in definition order, containing interface `name`.
    pub fn resolve_interface(&self, name: &str) -> Option<&'a str> {
        self.zones
            .iter()
            .find(|zone| {
                self.effective_matches(&zone.name)
                    .iter()
                    .any(|m| m.matches_interface(name))
            })
            .map(|zone| zone.name.as_str())
    }

    /// Distinct interface terms of a zone in definition order.
    pub fn zone_interfaces(&self, zone_name: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in self.effective_matches(zone_name) {
            if !m.interface.is_empty() && !out.contains(&m.interface) {
                out.push(m.interface);
            }
        }
        out
    }

    /// AND-ed clauses of one match: interface, source, destination, VLAN.
    pub fn to_match_expression(&self, m: &EffectiveMatch, direction: Direction) -> Vec<String> {
        let mut clauses = Vec::new();
        if !m.interface.is_empty() {
            clauses.push(format!("{} \"{}\"", interface_keyword(direction), m.interface));
        }
        if !m.src.is_empty() {
            clauses.push(format!("ip saddr {}", m.src));
        }
        if !m.dst.is_empty() {
            clauses.push(format!("ip daddr {}", m.dst));
        }
        if m.vlan > 0 {
            clauses.push(format!("vlan id {}", m.vlan));
        }
        clauses
    }

    pub fn zone_match(&self, zone_name: &str, direction: Direction) -> MatchExpr {
        let matches = self.effective_matches(zone_name);
        match matches.as_slice() {
            [] => MatchExpr::Empty,
            [single] => MatchExpr::Single(self.to_match_expression(single, direction)),
            many if many.iter().all(EffectiveMatch::interface_only) => {
                let interfaces = self.zone_interfaces(zone_name);
                if interfaces.is_empty() {
                    MatchExpr::Empty
                } else {
                    MatchExpr::InterfaceSet {
                        direction,
                        interfaces,
                    }
                }
            }
            many => MatchExpr::AnyOf(
                many.iter()
                    .map(|m| self.to_match_expression(m, direction))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
#[path = "zone_resolver_tests.rs"]
mod tests;
