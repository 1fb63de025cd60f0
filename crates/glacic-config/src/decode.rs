//! Decoding from the syntax tree into the typed model.
//!
//! Attribute values are evaluated by `hcl-rs`. Blocks are mapped onto JSON
//! values through a static table (keyword, JSON field, label names,
//! repeated or single, nested blocks), then the value goes through serde.
//! Both dialects share the serde half, so the JSON loader and the
//! config-syntax loader produce identical models.

use std::collections::BTreeMap;

use glacic_core::ConfigError;
use serde_json::{Map, Value};

use crate::model::Config;
use crate::syntax::{self, Attribute, Block, Body, Structure};

/// One block keyword and where it lands in the JSON model.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BlockSpec {
    pub ident: &'static str,
    pub field: &'static str,
    pub labels: &'static [&'static str],
    pub repeated: bool,
    pub children: &'static [BlockSpec],
}

const fn many(
    ident: &'static str,
    field: &'static str,
    labels: &'static [&'static str],
    children: &'static [BlockSpec],
) -> BlockSpec {
    BlockSpec {
        ident,
        field,
        labels,
        repeated: true,
        children,
    }
}

const fn one(ident: &'static str, children: &'static [BlockSpec]) -> BlockSpec {
    BlockSpec {
        ident,
        field: ident,
        labels: &[],
        repeated: false,
        children,
    }
}

const NAME: &[&str] = &["name"];
const LEAF: &[BlockSpec] = &[];

const ZONE_BLOCKS: &[BlockSpec] = &[
    many("match", "matches", &[], LEAF),
    one("services", &[many("port", "ports", NAME, LEAF)]),
    one("management", LEAF),
];

const INTERFACE_BLOCKS: &[BlockSpec] = &[
    one("new_zone", ZONE_BLOCKS),
    one("bond", LEAF),
    many("vlan", "vlans", &["id"], &[one("new_zone", ZONE_BLOCKS)]),
    one("management", LEAF),
    one("tls", LEAF),
];

const HEALTH_CHECK: BlockSpec = one("health_check", LEAF);

const DNS_SERVE_BLOCKS: &[BlockSpec] = &[
    many("blocklist", "blocklists", NAME, LEAF),
    one("doh_server", LEAF),
    one("dot_server", LEAF),
    one("dnscrypt_server", LEAF),
    many("host", "hosts", &["ip"], LEAF),
    many("zone", "zones", NAME, &[many("record", "records", NAME, LEAF)]),
];

const UPSTREAM_BLOCKS: [BlockSpec; 4] = [
    many("conditional_forward", "conditional_forwarders", &["domain"], LEAF),
    many("upstream_doh", "upstream_doh", NAME, LEAF),
    many("upstream_dot", "upstream_dot", NAME, LEAF),
    many("upstream_dnscrypt", "upstream_dnscrypt", NAME, LEAF),
];

const DNS_BLOCKS: &[BlockSpec] = &[
    UPSTREAM_BLOCKS[0],
    UPSTREAM_BLOCKS[1],
    UPSTREAM_BLOCKS[2],
    UPSTREAM_BLOCKS[3],
    one("recursive", LEAF),
    many("serve", "serve", &["zone"], DNS_SERVE_BLOCKS),
    many("inspect", "inspect", &["zone"], LEAF),
];

const DNS_SERVER_BLOCKS: &[BlockSpec] = &[
    UPSTREAM_BLOCKS[0],
    UPSTREAM_BLOCKS[1],
    UPSTREAM_BLOCKS[2],
    UPSTREAM_BLOCKS[3],
    one("recursive", LEAF),
    one("doh_server", LEAF),
    one("dot_server", LEAF),
    one("dnscrypt_server", LEAF),
    many("blocklist", "blocklists", NAME, LEAF),
    many("host", "hosts", &["ip"], LEAF),
    many("zone", "zones", NAME, &[many("record", "records", NAME, LEAF)]),
];

pub(crate) const ROOT_BLOCKS: &[BlockSpec] = &[
    many("interface", "interfaces", NAME, INTERFACE_BLOCKS),
    many("zone", "zones", NAME, ZONE_BLOCKS),
    many(
        "policy",
        "policies",
        &["from", "to"],
        &[many("rule", "rules", NAME, LEAF)],
    ),
    many("nat", "nat", NAME, LEAF),
    many("ipset", "ipsets", NAME, LEAF),
    many("route", "routes", NAME, LEAF),
    many(
        "routing_table",
        "routing_tables",
        NAME,
        &[many("route", "routes", NAME, LEAF)],
    ),
    many("policy_route", "policy_routes", NAME, LEAF),
    many("mark_rule", "mark_rules", NAME, LEAF),
    many("uid_routing", "uid_routing", NAME, LEAF),
    one(
        "multi_wan",
        &[many("wan", "wans", NAME, LEAF), HEALTH_CHECK],
    ),
    many(
        "uplink_group",
        "uplink_groups",
        NAME,
        &[many("uplink", "uplinks", NAME, LEAF), HEALTH_CHECK],
    ),
    one(
        "frr",
        &[
            one("ospf", &[many("area", "areas", &["id"], LEAF)]),
            one("bgp", &[many("neighbor", "neighbors", &["ip"], LEAF)]),
        ],
    ),
    many("protection", "protections", NAME, LEAF),
    many(
        "qos_policy",
        "qos_policies",
        NAME,
        &[
            many("class", "classes", NAME, LEAF),
            many("rule", "rules", NAME, LEAF),
        ],
    ),
    one("scheduler", LEAF),
    many(
        "scheduled_rule",
        "scheduled_rules",
        NAME,
        &[one("rule", LEAF)],
    ),
    one(
        "dhcp",
        &[many(
            "scope",
            "scopes",
            NAME,
            &[many("reservation", "reservations", &["mac"], LEAF)],
        )],
    ),
    one("dns", DNS_BLOCKS),
    one("dns_server", DNS_SERVER_BLOCKS),
    one("mdns", LEAF),
    one("upnp", LEAF),
    one("ntp", LEAF),
    one("syslog", LEAF),
    one("ddns", LEAF),
    one(
        "api",
        &[many("key", "keys", NAME, LEAF), one("letsencrypt", LEAF)],
    ),
    one(
        "web",
        &[many("allow", "allow", &[], LEAF), many("deny", "deny", &[], LEAF)],
    ),
    one("tls", LEAF),
    one(
        "vpn",
        &[
            many("tailscale", "tailscale", NAME, LEAF),
            many(
                "wireguard",
                "wireguard",
                NAME,
                &[many("peer", "peers", NAME, LEAF)],
            ),
            many("six_to_four", "6to4", NAME, LEAF),
        ],
    ),
    one("audit", LEAF),
    one("geoip", LEAF),
    one("threat_intel", &[many("source", "sources", NAME, LEAF)]),
    one("rule_learning", LEAF),
    one("anomaly_detection", LEAF),
    one(
        "notifications",
        &[many("channel", "channels", NAME, LEAF)],
    ),
    one("replication", LEAF),
    one("features", LEAF),
    one("system", LEAF),
];

/// Source line for each decoded field path (`interfaces[0].mtu`).
#[derive(Debug, Default, Clone)]
pub struct LineIndex {
    lines: BTreeMap<String, usize>,
}

impl LineIndex {
    pub fn line(&self, path: &str) -> Option<usize> {
        if let Some(line) = self.lines.get(path) {
            return Some(*line);
        }
        // Fall back to the closest enclosing node.
        let mut cut = path.len();
        while let Some(idx) = path[..cut].rfind(['.', '[']) {
            if let Some(line) = self.lines.get(&path[..idx]) {
                return Some(*line);
            }
            cut = idx;
        }
        None
    }

    fn record(&mut self, path: String, line: usize) {
        self.lines.insert(path, line);
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn decode_error(field: impl Into<String>, message: impl Into<String>, line: Option<usize>) -> ConfigError {
    let message = message.into();
    ConfigError::Decode {
        field: field.into(),
        message: match line {
            Some(line) => format!("{message} (line {line})"),
            None => message,
        },
    }
}

/// Converts a parsed body into the JSON shape of [`Config`]. `src` is the
/// text `body` was parsed from and only feeds line numbers.
pub fn body_to_value(
    body: &Body,
    src: &str,
    allow_unknown_fields: bool,
) -> Result<(Value, LineIndex), ConfigError> {
    let mut walk = Walk {
        src,
        allow_unknown: allow_unknown_fields,
        index: LineIndex::default(),
    };
    let map = walk.body_to_map(body, ROOT_BLOCKS, "")?;
    Ok((Value::Object(map), walk.index))
}

struct Walk<'a> {
    src: &'a str,
    allow_unknown: bool,
    index: LineIndex,
}

impl Walk<'_> {
    fn body_to_map(
        &mut self,
        body: &Body,
        specs: &[BlockSpec],
        path: &str,
    ) -> Result<Map<String, Value>, ConfigError> {
        let mut map = Map::new();
        for structure in body.iter() {
            match structure {
                Structure::Attribute(attr) => self.attribute(&mut map, attr, path)?,
                Structure::Block(block) => self.block(&mut map, block, specs, path)?,
            }
        }
        Ok(map)
    }

    fn attribute(
        &mut self,
        map: &mut Map<String, Value>,
        attr: &Attribute,
        path: &str,
    ) -> Result<(), ConfigError> {
        let key = attr.key.as_str();
        let field_path = join(path, key);
        let line = syntax::line_of(self.src, attr);
        if map.contains_key(key) {
            return Err(decode_error(
                field_path,
                format!("attribute \"{key}\" is defined more than once"),
                line,
            ));
        }
        let value = syntax::expr_value(&attr.value).map_err(|e| {
            decode_error(field_path.clone(), format!("invalid value for \"{key}\": {e}"), line)
        })?;
        if let Some(line) = line {
            self.index.record(field_path, line);
        }
        map.insert(key.to_string(), value);
        Ok(())
    }

    fn block(
        &mut self,
        map: &mut Map<String, Value>,
        block: &Block,
        specs: &[BlockSpec],
        path: &str,
    ) -> Result<(), ConfigError> {
        let ident = block.ident.as_str();
        let line = syntax::line_of(self.src, block);
        let Some(spec) = specs.iter().find(|s| s.ident == ident) else {
            if self.allow_unknown {
                return Ok(());
            }
            return Err(decode_error(
                join(path, ident),
                format!("unsupported block type \"{ident}\""),
                line,
            ));
        };
        if block.labels.len() != spec.labels.len() {
            return Err(decode_error(
                join(path, ident),
                format!(
                    "block \"{ident}\" expects {} label(s) ({}), got {}",
                    spec.labels.len(),
                    spec.labels.join(", "),
                    block.labels.len()
                ),
                line,
            ));
        }

        let child_path = if spec.repeated {
            let count = match map.get(spec.field) {
                Some(Value::Array(items)) => items.len(),
                Some(_) => {
                    return Err(decode_error(
                        join(path, spec.field),
                        format!("block \"{ident}\" conflicts with an attribute"),
                        line,
                    ));
                }
                None => 0,
            };
            format!("{}[{count}]", join(path, spec.field))
        } else {
            if map.contains_key(spec.field) {
                return Err(decode_error(
                    join(path, spec.field),
                    format!("duplicate \"{ident}\" block"),
                    line,
                ));
            }
            join(path, spec.field)
        };
        if let Some(line) = line {
            self.index.record(child_path.clone(), line);
        }

        let mut obj = self.body_to_map(&block.body, spec.children, &child_path)?;
        for (name, label) in spec.labels.iter().zip(&block.labels) {
            obj.insert((*name).to_string(), Value::String(label.as_str().to_string()));
        }

        if spec.repeated {
            if let Value::Array(items) = map
                .entry(spec.field.to_string())
                .or_insert_with(|| Value::Array(Vec::new()))
            {
                items.push(Value::Object(obj));
            }
        } else {
            map.insert(spec.field.to_string(), Value::Object(obj));
        }
        Ok(())
    }
}

/// Deserializes a JSON-shaped config, reporting the offending field and
/// line when it does not fit the model.
pub fn value_to_config(
    value: &Value,
    index: &LineIndex,
    allow_unknown_fields: bool,
) -> Result<Config, ConfigError> {
    let config: Config = match serde_json::from_value(value.clone()) {
        Ok(config) => config,
        Err(err) => return Err(locate_error(value, index, err)),
    };
    if !allow_unknown_fields {
        let known = serde_json::to_value(&config)
            .map_err(|e| decode_error("config", e.to_string(), None))?;
        if let Some(path) = first_unknown_field(value, &known, "") {
            let key = path.rsplit(['.', ']']).next().unwrap_or(&path).to_string();
            return Err(decode_error(
                path.clone(),
                format!("unsupported argument \"{key}\""),
                index.line(&path),
            ));
        }
    }
    Ok(config)
}

/// Narrows a serde failure to the first top-level entry that fails alone.
fn locate_error(value: &Value, index: &LineIndex, err: serde_json::Error) -> ConfigError {
    let Value::Object(root) = value else {
        return decode_error("config", err.to_string(), None);
    };
    for (key, entry) in root {
        let candidates: Vec<(String, Value)> = match entry {
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| (format!("{key}[{i}]"), Value::Array(vec![item.clone()])))
                .collect(),
            other => vec![(key.clone(), other.clone())],
        };
        for (path, candidate) in candidates {
            let mut alone = Map::new();
            alone.insert(key.clone(), candidate);
            if let Err(entry_err) = serde_json::from_value::<Config>(Value::Object(alone)) {
                return decode_error(path.clone(), entry_err.to_string(), index.line(&path));
            }
        }
    }
    decode_error("config", err.to_string(), None)
}

fn first_unknown_field(input: &Value, known: &Value, path: &str) -> Option<String> {
    match (input, known) {
        (Value::Object(input), Value::Object(known)) => {
            for (key, value) in input {
                let child = join(path, key);
                match known.get(key) {
                    None => return Some(child),
                    Some(known_value) => {
                        if let Some(found) = first_unknown_field(value, known_value, &child) {
                            return Some(found);
                        }
                    }
                }
            }
            None
        }
        (Value::Array(input), Value::Array(known)) => input
            .iter()
            .zip(known)
            .enumerate()
            .find_map(|(i, (a, b))| first_unknown_field(a, b, &format!("{path}[{i}]"))),
        _ => None,
    }
}

/// Reads `schema_version` without decoding the rest of the body.
pub fn schema_version_of(body: &Body) -> String {
    match syntax::attribute_value(body, "schema_version") {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

pub fn decode_body(body: &Body, src: &str, allow_unknown_fields: bool) -> Result<Config, ConfigError> {
    let (value, index) = body_to_value(body, src, allow_unknown_fields)?;
    value_to_config(&value, &index, allow_unknown_fields)
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
