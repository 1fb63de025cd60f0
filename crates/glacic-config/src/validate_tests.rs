use super::*;
use crate::model::{
    DhcpReservation, DhcpScope, DhcpServer, Interface, IpSet, NatRule, Policy, PolicyRule, Route, Vlan, Zone, ZoneMatch,
};

fn iface(name: &str, ipv4: &[&str]) -> Interface {
    Interface {
        name: name.into(),
        ipv4: ipv4.iter().map(|s| (*s).into()).collect(),
        ..Interface::default()
    }
}

fn zone(name: &str) -> Zone {
    Zone {
        name: name.into(),
        ..Zone::default()
    }
}

fn policy(from: &str, to: &str) -> Policy {
    Policy {
        from: from.into(),
        to: to.into(),
        ..Policy::default()
    }
}

fn fields(errs: &ValidationErrors) -> Vec<&str> {
    errs.iter().map(|e| e.field.as_str()).collect()
}

#[test]
fn test_valid_config_has_no_findings() {
    let cfg = Config {
        interfaces: vec![
            iface("eth0", &["203.0.113.2/24"]),
            iface("eth1", &["192.168.1.1/24"]),
        ],
        zones: vec![zone("wan"), zone("lan")],
        policies: vec![Policy {
            rules: vec![PolicyRule {
                action: "ACCEPT".into(),
                proto: "tcp".into(),
                dest_port: 443,
                ..PolicyRule::default()
            }],
            ..policy("lan", "wan")
        }],
        nat: vec![NatRule {
            kind: "redirect".into(),
            ..NatRule::default()
        }],
        routes: vec![Route {
            destination: "10.0.0.0/8".into(),
            gateway: "192.168.1.254".into(),
            ..Route::default()
        }],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert!(errs.is_empty(), "{errs}");
    assert!(!errs.has_errors());
    assert!(errs.into_result().is_ok());
}

#[test]
fn test_zone_addresses_and_vlans() {
    let cfg = Config {
        zones: vec![Zone {
            src: "10.0.0.0/33".into(),
            vlan: 0,
            matches: vec![ZoneMatch {
                dst: "not-an-ip".into(),
                vlan: 4095,
                ..ZoneMatch::default()
            }],
            ..zone("lan")
        }],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(fields(&errs), vec![
        "zones[lan].src",
        "zones[lan].match[0].dst",
        "zones[lan].match[0].vlan",
    ]);
    assert_eq!(
        errs.iter().last().unwrap().message,
        "VLAN must be between 1 and 4094, got 4095"
    );
}

#[test]
fn test_interface_rules() {
    let mut bad_mtu = iface("eth0", &["192.168.1.1"]);
    bad_mtu.mtu = 500;
    bad_mtu.vlans = vec![
        Vlan {
            id: "4095".into(),
            ..Vlan::default()
        },
        Vlan {
            id: "10".into(),
            ..Vlan::default()
        },
    ];
    let cfg = Config {
        interfaces: vec![
            bad_mtu,
            iface("eth0", &[]),
            iface("0bad", &[]),
            iface("averyveryverylongname", &[]),
        ],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(fields(&errs), vec![
        "interfaces[0].ipv4[0]",
        "interfaces[0].mtu",
        "interfaces[0].vlans[0].id",
        "interfaces[1].name",
        "interfaces[2].name",
        "interfaces[3].name",
    ]);
    assert_eq!(
        errs.iter().nth(3).unwrap().message,
        "duplicate interface name: eth0"
    );
}

#[test]
fn test_overlap_across_interfaces_is_one_error() {
    let cfg = Config {
        interfaces: vec![
            iface("eth0", &["192.168.1.1/24"]),
            iface("eth1", &["192.168.1.2/25"]),
        ],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(errs.len(), 1);
    assert_eq!(
        errs.to_string(),
        "interfaces: overlapping subnets detected: eth0 (192.168.1.1/24) and eth1 (192.168.1.2/25)"
    );
}

#[test]
fn test_duplicate_subnet_on_same_interface_is_one_error() {
    let cfg = Config {
        interfaces: vec![iface("eth0", &["10.0.0.1/24", "10.0.0.2/24"])],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(errs.len(), 1);
    assert_eq!(errs.iter().next().unwrap().field, "interfaces[eth0]");

    let single = Config {
        interfaces: vec![iface("eth0", &["10.0.0.1/24"])],
        ..Config::default()
    };
    assert!(validate(&single).is_empty());
}

#[test]
fn test_vlan_subnets_take_part_in_overlap() {
    let mut eth0 = iface("eth0", &["10.0.0.1/16"]);
    eth0.vlans = vec![Vlan {
        id: "10".into(),
        ipv4: vec!["10.0.10.1/24".into()],
        ..Vlan::default()
    }];
    let errs = validate(&Config {
        interfaces: vec![eth0],
        ..Config::default()
    });
    assert_eq!(errs.len(), 1);
    assert!(errs.to_string().contains("eth0.vlan10 (10.0.10.1/24)"));
}

#[test]
fn test_ipset_rules() {
    let cfg = Config {
        ipsets: vec![
            IpSet {
                name: "ports".into(),
                kind: "inet_service".into(),
                entries: vec!["22".into(), "8000-8080".into(), "70000".into()],
                ..IpSet::default()
            },
            IpSet {
                name: "ports".into(),
                kind: "mac_addr".into(),
                entries: vec!["10.0.0.0/8".into(), "bogus".into()],
                firehol_list: "firehol_level9".into(),
                url: "ftp://example.com/list".into(),
                refresh_hours: -1,
                action: "nuke".into(),
                apply_to: "output".into(),
                ..IpSet::default()
            },
            IpSet {
                name: "bad name".into(),
                kind: "dns".into(),
                firehol_list: "spamhaus_drop".into(),
                url: "https://example.com".into(),
                ..IpSet::default()
            },
        ],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(fields(&errs), vec![
        "ipsets[0].entries[2]",
        "ipsets[1].name",
        "ipsets[1].type",
        "ipsets[1].entries[1]",
        "ipsets[1].firehol_list",
        "ipsets[1].url",
        "ipsets[1].refresh_hours",
        "ipsets[1].action",
        "ipsets[1].apply_to",
        "ipsets[2].name",
    ]);
}

#[test]
fn test_policy_zone_references() {
    let cfg = Config {
        interfaces: vec![Interface {
            zone: "wan".into(),
            ..iface("eth0", &[])
        }],
        zones: vec![zone("lan")],
        policies: vec![
            policy("lan", "wan"),
            policy("lan", "Firewall"),
            policy("wan", "SELF"),
            policy("vpn*", "lan"),
            policy("dmz", "lan"),
            policy("lan", "nowhere"),
        ],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(fields(&errs), vec!["policies[4].from", "policies[5].to"]);
    assert_eq!(errs.iter().next().unwrap().message, "unknown zone: dmz");
}

#[test]
fn test_rule_checks() {
    let cfg = Config {
        zones: vec![zone("lan"), zone("wan")],
        ipsets: vec![IpSet {
            name: "known".into(),
            ..IpSet::default()
        }],
        policies: vec![Policy {
            rules: vec![
                PolicyRule {
                    action: "jump".into(),
                    src_ipset: "known".into(),
                    ..PolicyRule::default()
                },
                PolicyRule {
                    action: "allow".into(),
                    proto: "sctp".into(),
                    dest_port: 70000,
                    src_ports: vec![22, 65536],
                    dest_ipset: "missing".into(),
                    ..PolicyRule::default()
                },
            ],
            ..policy("lan", "wan")
        }],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(fields(&errs), vec![
        "policies[0].rules[1].action",
        "policies[0].rules[1].proto",
        "policies[0].rules[1].dest_port",
        "policies[0].rules[1].src_ports[1]",
        "policies[0].rules[1].dest_ipset",
    ]);
}

#[test]
fn test_inheritance_errors() {
    let named = |name: &str, inherits: &str| Policy {
        name: name.into(),
        inherits: inherits.into(),
        ..policy("lan", "wan")
    };
    let cfg = Config {
        zones: vec![zone("lan"), zone("wan")],
        policies: vec![
            named("a", "b"),
            named("b", "a"),
            named("c", "ghost"),
            named("d", "d"),
        ],
        ..Config::default()
    };
    let errs = validate(&cfg);
    let messages: Vec<String> = errs.errors().iter().map(|e| e.to_string()).collect();
    assert_eq!(messages, vec![
        "policies[0].inherits: circular inheritance detected involving: a",
        "policies[1].inherits: circular inheritance detected involving: b",
        "policies[2].inherits: unknown parent policy: ghost",
        "policies[3].inherits: policy cannot inherit from itself",
    ]);
    assert!(errs.warnings().is_empty());
}

#[test]
fn test_duplicate_pairs_warn_unless_related() {
    let cfg = Config {
        zones: vec![zone("lan"), zone("wan")],
        policies: vec![
            Policy {
                name: "one".into(),
                ..policy("lan", "wan")
            },
            Policy {
                name: "two".into(),
                ..policy("lan", "wan")
            },
            Policy {
                name: "base".into(),
                ..policy("wan", "lan")
            },
            Policy {
                name: "child".into(),
                inherits: "base".into(),
                ..policy("wan", "lan")
            },
        ],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert!(!errs.has_errors());
    let warnings: Vec<String> = errs.warnings().iter().map(|e| e.to_string()).collect();
    assert_eq!(warnings, vec![
        "policies[0]: duplicate zone combination lan->wan without inheritance relationship",
        "policies[1]: duplicate zone combination lan->wan without inheritance relationship",
    ]);
    assert!(errs.into_result().is_ok());
}

#[test]
fn test_nat_and_routes() {
    let cfg = Config {
        nat: vec![
            NatRule {
                kind: "SNAT".into(),
                ..NatRule::default()
            },
            NatRule {
                kind: "fullcone".into(),
                ..NatRule::default()
            },
        ],
        routes: vec![Route {
            destination: "10.0.0.1".into(),
            gateway: "gw".into(),
            ..Route::default()
        }],
        ..Config::default()
    };
    let errs = validate(&cfg);
    assert_eq!(fields(&errs), vec![
        "nat[1].type",
        "routes[0].destination",
        "routes[0].gateway",
    ]);
    match errs.into_result() {
        Err(ConfigError::Validation(list)) => assert_eq!(list.len(), 3),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_dhcp_option_values() {
    let mut options = std::collections::BTreeMap::new();
    options.insert("tftp_server".to_string(), "boot.lan".to_string());
    options.insert("66".to_string(), "boot.lan".to_string());
    options.insert("domain_search".to_string(), "lan".to_string());
    let cfg = Config {
        dhcp: Some(DhcpServer {
            enabled: true,
            scopes: vec![DhcpScope {
                name: "lan".into(),
                options,
                reservations: vec![DhcpReservation {
                    options: [("router".to_string(), "nope".to_string())].into(),
                    ..DhcpReservation::default()
                }],
                ..DhcpScope::default()
            }],
            ..DhcpServer::default()
        }),
        ..Config::default()
    };
    let messages: Vec<String> = validate(&cfg).iter().map(|e| e.to_string()).collect();
    assert_eq!(messages, vec![
        "dhcp.scopes[0].options.66: option 66 requires a type prefix (ip, str, text, hex, u8, u16, u32, bool)",
        "dhcp.scopes[0].options.domain_search: domain_search option not implemented; use domain option instead",
        "dhcp.scopes[0].reservations[0].options.router: invalid IP(s): nope",
    ]);
}

#[test]
fn test_cidr_overlap_math() {
    let a = parse_cidr("10.0.0.0/8").unwrap();
    let b = parse_cidr("10.20.0.0/16").unwrap();
    let c = parse_cidr("11.0.0.0/8").unwrap();
    let v6 = parse_cidr("2001:db8::/32").unwrap();
    assert!(overlaps(&a, &b) && overlaps(&b, &a));
    assert!(!overlaps(&a, &c));
    assert!(!overlaps(&a, &v6));
    assert!(overlaps(&parse_cidr("0.0.0.0/0").unwrap(), &c));
    assert!(overlaps(&parse_cidr("2001:db8:1::/48").unwrap(), &v6));
    assert!(parse_cidr("10.0.0.0/40").is_none());
    assert!(is_valid_ip_or_cidr("fe80::1"));
    assert!(!is_valid_ip_or_cidr("fe80::1/200"));
}

#[test]
fn test_ipv4_list_rejects_ipv6_networks() {
    let cfg = Config {
        interfaces: vec![iface("eth1", &["192.168.1.1/24", "2001:db8::1/64"])],
        ..Config::default()
    };
    let messages: Vec<String> = validate(&cfg).iter().map(|e| e.to_string()).collect();
    assert_eq!(messages, vec!["interfaces[0].ipv4[1]: invalid IPv4 CIDR: 2001:db8::1/64"]);
}
