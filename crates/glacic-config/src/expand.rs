//! Wildcard policy expansion into concrete zone pairs.

use glob::Pattern;

use crate::model::{Policy, Zone};

/// `*` alone, or any label containing glob metacharacters.
pub fn is_wildcard_zone(zone: &str) -> bool {
    zone.contains(['*', '?', '[', ']'])
}

/// Glob match of a zone pattern; a malformed pattern matches nothing.
pub fn matches_zone(pattern: &str, zone: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match Pattern::new(pattern) {
        Ok(p) => p.matches(zone),
        Err(err) => {
            tracing::warn!(pattern, error = %err, "malformed zone pattern");
            false
        }
    }
}

fn candidates<'a>(label: &'a str, zone_names: &'a [&'a str]) -> Vec<&'a str> {
    if is_wildcard_zone(label) {
        zone_names
            .iter()
            .copied()
            .filter(|z| matches_zone(label, z))
            .collect()
    } else {
        vec![label]
    }
}

/// Replaces each wildcard policy by one policy per matching zone pair.
///
/// Candidates are the defined zones plus `self`. Pairs with `from == to`
/// produced by a wildcard are skipped. Expanded policies are named
/// `<from>-<to>`, or `<name>_<from>_<to>` when the source policy had a name.
pub fn expand_policies(policies: &[Policy], zones: &[Zone]) -> Vec<Policy> {
    let zone_names: Vec<&str> = zones
        .iter()
        .map(|z| z.name.as_str())
        .chain(std::iter::once("self"))
        .collect();

    let mut expanded = Vec::new();
    for policy in policies {
        if !is_wildcard_zone(&policy.from) && !is_wildcard_zone(&policy.to) {
            expanded.push(policy.clone());
            continue;
        }
        for from in candidates(&policy.from, &zone_names) {
            for to in candidates(&policy.to, &zone_names) {
                if from == to {
                    continue;
                }
                let name = if policy.name.is_empty() {
                    format!("{from}-{to}")
                } else {
                    format!("{}_{from}_{to}", policy.name)
                };
                expanded.push(Policy {
                    from: from.to_string(),
                    to: to.to_string(),
                    name,
                    ..policy.clone()
                });
            }
        }
    }
    expanded
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones(names: &[&str]) -> Vec<Zone> {
        names
            .iter()
            .map(|n| Zone {
                name: (*n).into(),
                ..Zone::default()
            })
            .collect()
    }

    fn pairs(policies: &[Policy]) -> Vec<(String, String, String)> {
        policies
            .iter()
            .map(|p| (p.from.clone(), p.to.clone(), p.name.clone()))
            .collect()
    }

    #[test]
    fn test_star_source_expands_to_every_other_zone_and_self() {
        let zones = zones(&["wan", "lan", "vpn_office", "vpn_home", "guest"]);
        let policy = Policy {
            from: "*".into(),
            to: "wan".into(),
            action: "accept".into(),
            ..Policy::default()
        };
        let expanded = expand_policies(&[policy], &zones);
        let got: Vec<(&str, &str)> = expanded
            .iter()
            .map(|p| (p.from.as_str(), p.to.as_str()))
            .collect();
        assert_eq!(got, vec![
            ("lan", "wan"),
            ("vpn_office", "wan"),
            ("vpn_home", "wan"),
            ("guest", "wan"),
            ("self", "wan"),
        ]);
        assert_eq!(expanded[0].name, "lan-wan");
        assert!(expanded.iter().all(|p| p.action == "accept"));
    }

    #[test]
    fn test_glob_pattern_and_named_policy() {
        let zones = zones(&["wan", "vpn_office", "vpn_home"]);
        let policy = Policy {
            name: "vpn_out".into(),
            from: "vpn_*".into(),
            to: "wan".into(),
            ..Policy::default()
        };
        assert_eq!(pairs(&expand_policies(&[policy], &zones)), vec![
            ("vpn_office".into(), "wan".into(), "vpn_out_vpn_office_wan".into()),
            ("vpn_home".into(), "wan".into(), "vpn_out_vpn_home_wan".into()),
        ]);
    }

    #[test]
    fn test_concrete_policies_pass_through() {
        let zones = zones(&["lan"]);
        let policy = Policy {
            from: "lan".into(),
            to: "lan".into(),
            ..Policy::default()
        };
        assert_eq!(expand_policies(&[policy.clone()], &zones), vec![policy]);
    }

    #[test]
    fn test_wildcard_detection() {
        assert!(is_wildcard_zone("*"));
        assert!(is_wildcard_zone("vpn?"));
        assert!(is_wildcard_zone("[ab]"));
        assert!(!is_wildcard_zone("lan"));
        assert!(matches_zone("*", "anything"));
        assert!(!matches_zone("[", "x"));
    }
}
