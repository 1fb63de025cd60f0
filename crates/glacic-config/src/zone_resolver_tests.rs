use super::*;
use crate::model::ZoneMatch;

fn zone(name: &str) -> Zone {
    Zone {
        name: name.into(),
        ..Zone::default()
    }
}

fn iface_match(iface: &str) -> ZoneMatch {
    ZoneMatch {
        interface: iface.into(),
        ..ZoneMatch::default()
    }
}

fn sample() -> Vec<Zone> {
    vec![
        Zone {
            interface: "eth0".into(),
            ..zone("WAN")
        },
        Zone {
            matches: vec![iface_match("eth1"), iface_match("eth2"), iface_match("eth1")],
            ..zone("lan")
        },
        Zone {
            interface: "wg+".into(),
            ..zone("vpn")
        },
        Zone {
            interface: "eth3".into(),
            src: "10.0.0.0/8".into(),
            matches: vec![
                ZoneMatch {
                    vlan: 20,
                    ..ZoneMatch::default()
                },
                ZoneMatch {
                    interface: "eth4".into(),
                    dst: "192.168.9.0/24".into(),
                    ..ZoneMatch::default()
                },
            ],
            ..zone("mixed")
        },
        Zone {
            networks: vec!["10.1.0.0/16".into(), "10.2.0.0/16".into()],
            ..zone("legacy")
        },
        Zone {
            interfaces: vec!["eth5".into(), "eth6+".into()],
            ..zone("old")
        },
    ]
}

#[test]
fn test_interface_helpers() {
    assert!(is_interface_wildcard("wg+"));
    assert!(is_interface_wildcard("tun*"));
    assert!(!is_interface_wildcard("eth0"));
    assert_eq!(interface_base("wg+"), "wg");
    assert_eq!(interface_base("eth0"), "eth0");
    assert_eq!(interface_to_filter("wg+"), "wg*");
    assert_eq!(interface_to_filter("tun*"), "tun*");
}

#[test]
fn test_effective_matches_apply_top_level_defaults() {
    let zones = sample();
    let resolver = ZoneResolver::new(&zones);
    let mixed = resolver.effective_matches("mixed");
    assert_eq!(mixed, vec![
        EffectiveMatch {
            interface: "eth3".into(),
            is_prefix: false,
            src: "10.0.0.0/8".into(),
            dst: String::new(),
            vlan: 20,
        },
        EffectiveMatch {
            interface: "eth4".into(),
            is_prefix: false,
            src: "10.0.0.0/8".into(),
            dst: "192.168.9.0/24".into(),
            vlan: 0,
        },
    ]);

    let vpn = resolver.effective_matches("VPN");
    assert_eq!(vpn[0].interface, "wg*");
    assert!(vpn[0].is_prefix);

    let legacy = resolver.effective_matches("legacy");
    assert_eq!(legacy[0].src, "10.1.0.0/16,10.2.0.0/16");
    assert!(legacy[0].interface.is_empty());

    assert!(resolver.effective_matches("missing").is_empty());
}

#[test]
fn test_resolve_interface() {
    let zones = sample();
    let resolver = ZoneResolver::new(&zones);
    assert_eq!(resolver.resolve_interface("eth0"), Some("WAN"));
    assert_eq!(resolver.resolve_interface("eth2"), Some("lan"));
    assert_eq!(resolver.resolve_interface("wg0"), Some("vpn"));
    assert_eq!(resolver.resolve_interface("eth61"), Some("old"));
    assert_eq!(resolver.resolve_interface("ppp0"), None);
}

#[test]
fn test_zone_interfaces_are_distinct() {
    let zones = sample();
    let resolver = ZoneResolver::new(&zones);
    assert_eq!(resolver.zone_interfaces("lan"), vec!["eth1", "eth2"]);
    assert!(resolver.zone_interfaces("legacy").is_empty());
}

#[test]
fn test_interface_only_zone_collapses_to_set() {
    let zones = sample();
    let resolver = ZoneResolver::new(&zones);
    let expr = resolver.zone_match("lan", Direction::In);
    assert_eq!(expr.to_string(), r#"iifname { "eth1", "eth2" }"#);
    assert_eq!(
        resolver.zone_match("old", Direction::Out).to_string(),
        r#"oifname { "eth5", "eth6*" }"#
    );
}

#[test]
fn test_single_match_clauses_in_order() {
    let zones = vec![Zone {
        interface: "eth0".into(),
        src: "10.0.0.0/8".into(),
        dst: "10.0.0.1".into(),
        vlan: 100,
        ..zone("dmz")
    }];
    let resolver = ZoneResolver::new(&zones);
    assert_eq!(
        resolver.zone_match("dmz", Direction::Out),
        MatchExpr::Single(vec![
            r#"oifname "eth0""#.to_string(),
            "ip saddr 10.0.0.0/8".to_string(),
            "ip daddr 10.0.0.1".to_string(),
            "vlan id 100".to_string(),
        ])
    );
    assert_eq!(
        ZoneResolver::new(&sample())
            .zone_match("wan", Direction::In)
            .to_string(),
        r#"iifname "eth0""#
    );
}

#[test]
fn test_mixed_matches_become_alternatives() {
    let zones = sample();
    let resolver = ZoneResolver::new(&zones);
    let expr = resolver.zone_match("mixed", Direction::In);
    assert_eq!(
        expr,
        MatchExpr::AnyOf(vec![
            vec![
                r#"iifname "eth3""#.to_string(),
                "ip saddr 10.0.0.0/8".to_string(),
                "vlan id 20".to_string(),
            ],
            vec![
                r#"iifname "eth4""#.to_string(),
                "ip saddr 10.0.0.0/8".to_string(),
                "ip daddr 192.168.9.0/24".to_string(),
            ],
        ])
    );
    assert_eq!(
        expr.to_string(),
        r#"iifname "eth3" ip saddr 10.0.0.0/8 vlan id 20 | iifname "eth4" ip saddr 10.0.0.0/8 ip daddr 192.168.9.0/24"#
    );
    assert_eq!(resolver.zone_match("nope", Direction::In), MatchExpr::Empty);
}
