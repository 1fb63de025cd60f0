use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Result, bail};
use glacic_config::zone_resolver::MatchExpr;
use glacic_config::{LoadOptions, ZoneResolver, dhcp_options, validate};
use glacic_core::{Direction, OutputFormat};
use serde_json::json;

pub(crate) fn handle_check(config_path: &Path, format: OutputFormat) -> Result<()> {
    let loaded = glacic_config::loader::load_file_with_options(config_path, &LoadOptions::default())?;
    let findings = validate(&loaded.config);

    match format {
        OutputFormat::Json => {
            let report = json!({
                "path": config_path,
                "valid": !findings.has_errors(),
                "schema_version": loaded.current_version.to_string(),
                "original_version": loaded.original_version.to_string(),
                "was_migrated": loaded.was_migrated,
                "warnings": loaded.warnings,
                "findings": findings,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            for warning in &loaded.warnings {
                println!("warning: {warning}");
            }
            for finding in findings.iter() {
                println!("{}: {finding}", finding.severity);
            }
            if !findings.has_errors() {
                println!(
                    "{}: ok (schema {})",
                    config_path.display(),
                    loaded.current_version
                );
            }
        }
    }

    if findings.has_errors() {
        bail!(
            "{} has {} validation error(s)",
            config_path.display(),
            findings.errors().len()
        );
    }
    Ok(())
}

pub(crate) fn handle_zones(
    config_path: &Path,
    direction: Direction,
    format: OutputFormat,
) -> Result<()> {
    let config = glacic_config::load_file(config_path)?;
    let resolver = ZoneResolver::new(&config.zones);
    let rows: Vec<(String, String)> = config
        .zones
        .iter()
        .map(|zone| {
            let expr = resolver.zone_match(&zone.name, direction);
            let rendered = match expr {
                MatchExpr::Empty => String::new(),
                other => other.to_string(),
            };
            (zone.name.clone(), rendered)
        })
        .collect();

    match format {
        OutputFormat::Json => {
            let zones: Vec<_> = rows
                .iter()
                .map(|(zone, expr)| json!({ "zone": zone, "match": expr }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&zones)?);
        }
        OutputFormat::Text => {
            for (zone, expr) in rows {
                if expr.is_empty() {
                    println!("{zone}: (no criteria)");
                } else {
                    println!("{zone}: {expr}");
                }
            }
        }
    }
    Ok(())
}

pub(crate) fn handle_dhcp_option(key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let (code, bytes) = dhcp_options::parse_option(key, value)?;
    let hex = to_hex(&bytes);
    match format {
        OutputFormat::Json => {
            println!("{}", json!({ "code": code, "length": bytes.len(), "hex": hex }));
        }
        OutputFormat::Text => println!("option {code} ({} bytes): {hex}", bytes.len()),
    }
    Ok(())
}

fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[]), "");
        assert_eq!(to_hex(&[192, 168, 1, 1]), "c0a80101");
        assert_eq!(to_hex(&[0x0a, 0xff]), "0aff");
    }
}
