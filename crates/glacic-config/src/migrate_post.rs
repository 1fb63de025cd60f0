//! Post-load migrations: semantic fix-ups of decoded configs.
//!
//! Each migration is idempotent; running it on its own output changes
//! nothing.

use anyhow::Result;

use crate::migrate::PostLoadMigration;
use crate::model::{
    AccessRule, Config, DnsConfig, DnsServe, WebConfig, Zone, ZoneMatch, vlan_interface_name,
};

pub(crate) fn api_to_web_migration() -> PostLoadMigration {
    PostLoadMigration {
        name: "api_to_web".to_string(),
        description: "Move legacy API listener/TLS fields and interface web access into web {}"
            .to_string(),
        migrate: Box::new(migrate_api_to_web),
    }
}

pub(crate) fn dns_server_migration() -> PostLoadMigration {
    PostLoadMigration {
        name: "dns_server".to_string(),
        description: "Fold legacy dns_server {} into dns {}".to_string(),
        migrate: Box::new(migrate_dns_server),
    }
}

pub(crate) fn zone_canonicalization_migration() -> PostLoadMigration {
    PostLoadMigration {
        name: "zone_matches".to_string(),
        description: "Express interface zone references as zone match blocks".to_string(),
        migrate: Box::new(|config| {
            canonicalize_zones(config);
            Ok(())
        }),
    }
}

/// Copies `api` listener settings into `web` where `web` leaves them unset,
/// and turns per-interface web access flags into a `web.allow` rule when no
/// access rules exist yet.
pub fn migrate_api_to_web(config: &mut Config) -> Result<()> {
    let web = config.web.get_or_insert_with(|| WebConfig {
        serve_ui: true,
        serve_api: true,
        ..WebConfig::default()
    });

    if let Some(api) = &config.api {
        fill_if_empty(&mut web.listen, &api.listen);
        fill_if_empty(&mut web.tls_listen, &api.tls_listen);
        fill_if_empty(&mut web.tls_cert, &api.tls_cert);
        fill_if_empty(&mut web.tls_key, &api.tls_key);
        if api.disable_http_redirect {
            web.disable_redirect = true;
        }
    }

    if web.allow.is_empty() && web.deny.is_empty() {
        let mut interfaces: Vec<String> = Vec::new();
        for iface in &config.interfaces {
            let via_management = iface.management.as_ref().is_some_and(|m| m.allows_web());
            if (iface.access_web_ui || via_management) && !interfaces.contains(&iface.name) {
                interfaces.push(iface.name.clone());
            }
        }
        if !interfaces.is_empty() {
            web.allow.push(AccessRule {
                interfaces,
                ..AccessRule::default()
            });
        }
    }
    Ok(())
}

fn fill_if_empty(target: &mut String, source: &str) {
    if target.is_empty() && !source.is_empty() {
        *target = source.to_string();
    }
}

/// Folds the legacy `dns_server` block into `dns`. A `dns` block that already
/// serves zones or names forwarders wins and is left untouched.
pub fn migrate_dns_server(config: &mut Config) -> Result<()> {
    let Some(legacy) = &config.dns_server else {
        return Ok(());
    };
    if let Some(dns) = &config.dns
        && (!dns.serve.is_empty() || !dns.forwarders.is_empty())
    {
        return Ok(());
    }

    let dns = config.dns.get_or_insert_with(DnsConfig::default);
    dns.mode = legacy.mode.clone();
    dns.forwarders = legacy.forwarders.clone();
    dns.conditional_forwarders = legacy.conditional_forwarders.clone();
    dns.upstream_timeout = legacy.upstream_timeout;
    dns.upstream_doh = legacy.upstream_doh.clone();
    dns.upstream_dot = legacy.upstream_dot.clone();
    dns.upstream_dnscrypt = legacy.upstream_dnscrypt.clone();
    dns.recursive = legacy.recursive.clone();
    dns.dnssec = legacy.dnssec;

    if legacy.enabled {
        dns.serve.push(DnsServe {
            zone: "*".to_string(),
            listen_port: legacy.listen_port,
            local_domain: legacy.local_domain.clone(),
            expand_hosts: legacy.expand_hosts,
            dhcp_integration: legacy.dhcp_integration,
            authoritative_for: legacy.authoritative_for.clone(),
            rebind_protection: legacy.rebind_protection,
            query_logging: legacy.query_logging,
            rate_limit_per_sec: legacy.rate_limit_per_sec,
            blocklists: legacy.blocklists.clone(),
            allowlist: legacy.allowlist.clone(),
            blocked_ttl: legacy.blocked_ttl,
            blocked_address: legacy.blocked_address.clone(),
            cache_enabled: legacy.cache_enabled,
            cache_size: legacy.cache_size,
            cache_min_ttl: legacy.cache_min_ttl,
            cache_max_ttl: legacy.cache_max_ttl,
            negative_cache_ttl: legacy.negative_cache_ttl,
            doh_server: legacy.doh_server.clone(),
            dot_server: legacy.dot_server.clone(),
            dnscrypt_server: legacy.dnscrypt_server.clone(),
            hosts: legacy.hosts.clone(),
            zones: legacy.zones.clone(),
        });
    }
    Ok(())
}

fn zone_index(zones: &mut Vec<Zone>, name: &str) -> usize {
    if let Some(idx) = zones.iter().position(|z| z.name == name) {
        return idx;
    }
    zones.push(Zone {
        name: name.to_string(),
        ..Zone::default()
    });
    zones.len() - 1
}

fn push_interface_match(zone: &mut Zone, interface: &str) {
    // Explicit matches replace the implicit top-level one, so carry it over.
    if zone.matches.is_empty() && !zone.interface.is_empty() && zone.interface != interface {
        zone.matches.push(ZoneMatch {
            interface: zone.interface.clone(),
            ..ZoneMatch::default()
        });
    }
    if zone.matches.is_empty() && zone.interface == interface {
        return;
    }
    let exists = zone
        .matches
        .iter()
        .any(|m| m.interface == interface && m.src.is_empty() && m.dst.is_empty() && m.vlan == 0);
    if !exists {
        zone.matches.push(ZoneMatch {
            interface: interface.to_string(),
            ..ZoneMatch::default()
        });
    }
}

/// Rewrites `interface.zone`, `vlan.zone` and `zone.interfaces` into zone
/// match blocks and clears the deprecated fields.
pub fn canonicalize_zones(config: &mut Config) {
    let mut memberships: Vec<(String, String)> = Vec::new();
    for iface in &mut config.interfaces {
        if !iface.zone.is_empty() {
            memberships.push((std::mem::take(&mut iface.zone), iface.name.clone()));
        }
        for vlan in &mut iface.vlans {
            if !vlan.zone.is_empty() {
                memberships.push((
                    std::mem::take(&mut vlan.zone),
                    vlan_interface_name(&iface.name, &vlan.id),
                ));
            }
        }
    }
    for (zone_name, interface) in memberships {
        let idx = zone_index(&mut config.zones, &zone_name);
        push_interface_match(&mut config.zones[idx], &interface);
    }

    for zone in &mut config.zones {
        for interface in std::mem::take(&mut zone.interfaces) {
            push_interface_match(zone, &interface);
        }
    }
}

#[cfg(test)]
#[path = "migrate_post_tests.rs"]
mod tests;
