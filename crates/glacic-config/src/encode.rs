//! Renders a typed [`Config`] as config-syntax text.
//!
//! The body is assembled with `hcl-rs` builders and printed by its
//! formatter: `schema_version` first, remaining attributes in name order,
//! then blocks in keyword-table order. Unset scalars (empty strings, zero,
//! `false`, empty lists) are omitted; tri-state flags keep an explicit
//! `false`.

use anyhow::{Context, Result};
use serde_json::{Map, Value};

use crate::decode::{BlockSpec, ROOT_BLOCKS};
use crate::model::Config;

/// Fields where `false` differs from "unset".
const TRI_STATE_FIELDS: &[&str] = &["masquerade", "external"];

#[derive(Default)]
struct Contents {
    attributes: Vec<(String, hcl::Value)>,
    blocks: Vec<hcl::Block>,
}

pub fn encode_config(config: &Config) -> Result<String> {
    let value = serde_json::to_value(config).context("failed to serialize config")?;
    let Value::Object(root) = value else {
        anyhow::bail!("config did not serialize to an object");
    };
    let mut builder = hcl::Body::builder();
    if let Some(Value::String(version)) = root.get("schema_version")
        && !version.is_empty()
    {
        builder = builder.add_attribute(("schema_version", version.as_str()));
    }
    let contents = contents(&root, ROOT_BLOCKS, &[], &["schema_version"])?;
    for (key, value) in contents.attributes {
        builder = builder.add_attribute((key.as_str(), value));
    }
    let body = builder.add_blocks(contents.blocks).build();
    hcl::format::to_string(&body).context("failed to format config")
}

fn is_unset(key: &str, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b && !TRI_STATE_FIELDS.contains(&key),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn contents(
    obj: &Map<String, Value>,
    specs: &[BlockSpec],
    labels: &[&str],
    skip: &[&str],
) -> Result<Contents> {
    let mut out = Contents::default();
    for (key, value) in obj {
        if skip.contains(&key.as_str())
            || labels.contains(&key.as_str())
            || specs.iter().any(|s| s.field == key)
            || is_unset(key, value)
        {
            continue;
        }
        let value = hcl::to_value(value).with_context(|| format!("cannot encode {key}"))?;
        out.attributes.push((key.clone(), value));
    }

    for spec in specs {
        let entries: Vec<&Map<String, Value>> = match obj.get(spec.field) {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(map)) => vec![map],
            _ => continue,
        };
        for entry in entries {
            out.blocks.push(block(spec, entry)?);
        }
    }
    Ok(out)
}

fn block(spec: &BlockSpec, obj: &Map<String, Value>) -> Result<hcl::Block> {
    let mut builder = hcl::Block::builder(spec.ident);
    for label in spec.labels {
        let text = match obj.get(*label) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        builder = builder.add_label(text);
    }
    let inner = contents(obj, spec.children, spec.labels, &[])
        .with_context(|| format!("in {} block", spec.ident))?;
    for (key, value) in inner.attributes {
        builder = builder.add_attribute((key.as_str(), value));
    }
    Ok(builder.add_blocks(inner.blocks).build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_body;
    use crate::model::{Interface, Policy, Zone, ZoneMatch};
    use crate::syntax::parse;

    fn sample() -> Config {
        Config {
            schema_version: "1.0".into(),
            ip_forwarding: true,
            interfaces: vec![Interface {
                name: "eth0".into(),
                description: "uplink \"primary\"".into(),
                dhcp: true,
                ipv4: vec!["192.0.2.1/24".into()],
                ..Interface::default()
            }],
            zones: vec![Zone {
                name: "wan".into(),
                matches: vec![ZoneMatch {
                    interface: "eth0".into(),
                    ..ZoneMatch::default()
                }],
                ..Zone::default()
            }],
            policies: vec![Policy {
                from: "lan".into(),
                to: "wan".into(),
                name: "lan-to-wan".into(),
                masquerade: Some(false),
                ..Policy::default()
            }],
            ..Config::default()
        }
    }

    fn decode(text: &str) -> Config {
        let body = parse(text, "gen.hcl").unwrap();
        decode_body(&body, text, false).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let text = encode_config(&sample()).unwrap();
        assert!(text.starts_with("schema_version = \"1.0\"\n"), "{text}");
        assert!(text.contains("interface \"eth0\" {"), "{text}");
        assert!(text.contains("policy \"lan\" \"wan\" {"), "{text}");
        assert!(text.contains("masquerade = false"), "{text}");
        assert!(!text.contains("mtu"), "{text}");
        let ip_forwarding = text.find("ip_forwarding").unwrap();
        let first_block = text.find("interface \"eth0\"").unwrap();
        assert!(ip_forwarding < first_block);
    }

    #[test]
    fn test_encoded_text_decodes_to_same_config() {
        let cfg = sample();
        assert_eq!(decode(&encode_config(&cfg).unwrap()), cfg);
    }

    #[test]
    fn test_empty_option_block_is_kept() {
        let cfg = Config {
            api: Some(Default::default()),
            ..Config::default()
        };
        let text = encode_config(&cfg).unwrap();
        assert!(text.starts_with("api {"), "{text}");
        assert_eq!(decode(&text), cfg);
    }
}
