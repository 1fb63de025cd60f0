//! Load-time normalization shared by every loader path.

use crate::model::{Config, Zone, vlan_interface_name};

/// Reconciles the two ways of assigning interfaces to zones.
///
/// Interfaces listed in `zone.interfaces` get their `zone` field set when it
/// is empty; interfaces (and VLAN pseudo-interfaces `<iface>.<id>`) naming a
/// zone are added to that zone's `interfaces`, creating the zone if needed.
pub fn normalize_zone_mappings(config: &mut Config) {
    for zone_idx in 0..config.zones.len() {
        let zone_name = config.zones[zone_idx].name.clone();
        for member in config.zones[zone_idx].interfaces.clone() {
            if let Some(iface) = config.interfaces.iter_mut().find(|i| i.name == member)
                && iface.zone.is_empty()
            {
                iface.zone = zone_name.clone();
            }
        }
    }

    let mut references: Vec<(String, String)> = Vec::new();
    for iface in &config.interfaces {
        if !iface.zone.is_empty() {
            references.push((iface.zone.clone(), iface.name.clone()));
        }
        for vlan in &iface.vlans {
            if !vlan.zone.is_empty() {
                references.push((vlan.zone.clone(), vlan_interface_name(&iface.name, &vlan.id)));
            }
        }
    }

    for (zone_name, member) in references {
        match config.zones.iter_mut().find(|z| z.name == zone_name) {
            Some(zone) => {
                if !zone.interfaces.contains(&member) {
                    zone.interfaces.push(member);
                }
            }
            None => {
                tracing::debug!(zone = %zone_name, interface = %member, "creating implicit zone");
                config.zones.push(Zone {
                    name: zone_name,
                    interfaces: vec![member],
                    ..Zone::default()
                });
            }
        }
    }
}

/// Fills empty policy names with `<from>-to-<to>`.
pub fn normalize_policies(config: &mut Config) {
    for policy in &mut config.policies {
        if policy.name.is_empty() {
            policy.name = format!("{}-to-{}", policy.from, policy.to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Interface, Policy, Vlan};

    #[test]
    fn test_zone_list_sets_interface_zone_when_empty() {
        let mut cfg = Config {
            interfaces: vec![
                Interface {
                    name: "eth1".into(),
                    ..Interface::default()
                },
                Interface {
                    name: "eth2".into(),
                    zone: "dmz".into(),
                    ..Interface::default()
                },
            ],
            zones: vec![Zone {
                name: "lan".into(),
                interfaces: vec!["eth1".into(), "eth2".into()],
                ..Zone::default()
            }],
            ..Config::default()
        };
        normalize_zone_mappings(&mut cfg);
        assert_eq!(cfg.interfaces[0].zone, "lan");
        assert_eq!(cfg.interfaces[1].zone, "dmz");
        assert_eq!(cfg.zones[1].name, "dmz");
        assert_eq!(cfg.zones[1].interfaces, vec!["eth2"]);
    }

    #[test]
    fn test_interface_zone_and_vlan_zone_populate_zone_lists() {
        let mut cfg = Config {
            interfaces: vec![Interface {
                name: "eth0".into(),
                zone: "lan".into(),
                vlans: vec![Vlan {
                    id: "20".into(),
                    zone: "iot".into(),
                    ..Vlan::default()
                }],
                ..Interface::default()
            }],
            zones: vec![Zone {
                name: "lan".into(),
                interfaces: vec!["eth0".into()],
                ..Zone::default()
            }],
            ..Config::default()
        };
        normalize_zone_mappings(&mut cfg);
        assert_eq!(cfg.zones[0].interfaces, vec!["eth0"]);
        assert_eq!(cfg.zones[1].name, "iot");
        assert_eq!(cfg.zones[1].interfaces, vec!["eth0.20"]);
    }

    #[test]
    fn test_policy_default_names() {
        let mut cfg = Config {
            policies: vec![
                Policy {
                    from: "lan".into(),
                    to: "wan".into(),
                    ..Policy::default()
                },
                Policy {
                    from: "wan".into(),
                    to: "self".into(),
                    name: "inbound".into(),
                    ..Policy::default()
                },
            ],
            ..Config::default()
        };
        normalize_policies(&mut cfg);
        assert_eq!(cfg.policies[0].name, "lan-to-wan");
        assert_eq!(cfg.policies[1].name, "inbound");
    }
}
