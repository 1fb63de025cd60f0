//! Encoding of extra DHCPv4 options from `scope.options`.
//!
//! Keys are an alias (`dns_server`, `tftp_server`, ...) or a decimal code.
//! Values may carry a `type:` prefix; aliases infer the type when it is
//! absent, decimal codes must always give one.

use std::collections::BTreeMap;
use std::net::IpAddr;

use anyhow::Context;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DhcpOptionError {
    #[error("domain_search option not implemented; use domain option instead")]
    DomainSearch,
    #[error("unknown DHCP option code: {0}")]
    UnknownOption(String),
    #[error("option {0} requires a type prefix (ip, str, text, hex, u8, u16, u32, bool)")]
    MissingType(u8),
    #[error("invalid IP(s): {0}")]
    InvalidIp(String),
    #[error("DHCPv4 option requires IPv4 address: {0}")]
    NotIpv4(String),
    #[error("invalid hex string: {0}")]
    InvalidHex(String),
    #[error("invalid {kind} value: {value}")]
    InvalidInteger { kind: &'static str, value: String },
    #[error("invalid boolean value: {0}")]
    InvalidBool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Ip,
    Str,
    Hex,
    U8,
    U16,
    U32,
    Bool,
}

impl ValueKind {
    fn from_prefix(prefix: &str) -> Option<Self> {
        Some(match prefix.to_ascii_lowercase().as_str() {
            "ip" => Self::Ip,
            "str" | "text" => Self::Str,
            "hex" => Self::Hex,
            "u8" => Self::U8,
            "u16" => Self::U16,
            "u32" => Self::U32,
            "bool" => Self::Bool,
            _ => return None,
        })
    }
}

use ValueKind::{Hex, Ip, Str, U8, U16, U32};

/// Aliases, option code and the value type used without a prefix.
const NAMED_OPTIONS: &[(&[&str], u8, ValueKind)] = &[
    (&["subnet_mask", "subnet"], 1, Ip),
    (&["time_offset"], 2, U32),
    (&["router", "gateway", "default_gateway"], 3, Ip),
    (&["time_server"], 4, Ip),
    (&["name_server", "ien116_name_server"], 5, Ip),
    (&["dns_server", "dns", "domain_name_server"], 6, Ip),
    (&["log_server"], 7, Ip),
    (&["quote_server", "cookie_server"], 8, Ip),
    (&["lpr_server", "print_server"], 9, Ip),
    (&["hostname", "host_name"], 12, Str),
    (&["domain_name", "domain"], 15, Str),
    (&["swap_server"], 16, Ip),
    (&["root_path"], 17, Str),
    (&["extensions_path"], 18, Str),
    (&["ip_forwarding"], 19, U8),
    (&["non_local_source_routing"], 20, U8),
    (&["mtu", "interface_mtu"], 26, U16),
    (&["broadcast_address"], 28, Ip),
    (&["arp_cache_timeout"], 35, U32),
    (&["tcp_ttl"], 37, U8),
    (&["tcp_keepalive_interval"], 38, U32),
    (&["ntp_server", "ntp_servers", "ntp"], 42, Ip),
    (&["vendor_specific", "vendor_specific_info"], 43, Hex),
    (&["netbios_name_server", "wins_server"], 44, Ip),
    (&["netbios_datagram_distribution_server"], 45, Ip),
    (&["netbios_node_type"], 46, U8),
    (&["netbios_scope"], 47, Str),
    (&["x_window_font_server"], 48, Ip),
    (&["x_window_display_manager"], 49, Ip),
    (&["requested_ip", "requested_ip_address"], 50, Ip),
    (&["lease_time", "ip_address_lease_time"], 51, U32),
    (&["option_overload"], 52, U8),
    (&["dhcp_message_type"], 53, U8),
    (&["server_identifier", "dhcp_server_id"], 54, Ip),
    (&["parameter_request_list"], 55, Hex),
    (&["message"], 56, Str),
    (&["max_dhcp_message_size"], 57, U16),
    (&["renewal_time", "t1"], 58, U32),
    (&["rebinding_time", "t2"], 59, U32),
    (&["vendor_class", "vendor_class_identifier"], 60, Hex),
    (&["client_identifier", "client_id"], 61, Hex),
    (&["tftp_server", "tftp_server_name"], 66, Str),
    (&["bootfile", "bootfile_name", "boot_file"], 67, Str),
    (&["classless_static_route", "static_route"], 121, Hex),
    (&["tftp_server_ip", "tftp_server_address"], 150, Ip),
    (&["classless_static_route_ms", "ms_classless_static_route"], 249, Hex),
    (&["wpad", "proxy_autodiscovery", "auto_proxy_config"], 252, Str),
];

/// Code and default value type for an option alias.
pub fn lookup_alias(key: &str) -> Option<(u8, ValueKind)> {
    let key = key.to_ascii_lowercase().replace('-', "_");
    NAMED_OPTIONS
        .iter()
        .find(|(aliases, _, _)| aliases.contains(&key.as_str()))
        .map(|&(_, code, kind)| (code, kind))
}

/// Encodes one option into its code and payload bytes.
pub fn parse_option(key: &str, value: &str) -> Result<(u8, Vec<u8>), DhcpOptionError> {
    let normalized = key.to_ascii_lowercase().replace('-', "_");
    if normalized == "domain_search" {
        return Err(DhcpOptionError::DomainSearch);
    }

    let (code, inferred) = match lookup_alias(&normalized) {
        Some((code, kind)) => (code, Some(kind)),
        None => match key.trim().parse::<u8>() {
            Ok(code) if code > 0 => (code, None),
            _ => return Err(DhcpOptionError::UnknownOption(key.to_string())),
        },
    };

    let (kind, raw) = match split_prefix(value) {
        Some((kind, rest)) => (kind, rest),
        None => match inferred {
            Some(kind) => (kind, value),
            None => return Err(DhcpOptionError::MissingType(code)),
        },
    };

    Ok((code, encode_value(kind, raw)?))
}

/// Encodes every entry of a scope's `options` table.
pub fn encode_options(options: &BTreeMap<String, String>) -> anyhow::Result<BTreeMap<u8, Vec<u8>>> {
    let mut encoded = BTreeMap::new();
    for (key, value) in options {
        let (code, bytes) =
            parse_option(key, value).with_context(|| format!("invalid DHCP option \"{key}\""))?;
        if encoded.insert(code, bytes).is_some() {
            tracing::warn!(key, code, "DHCP option given more than once; last entry wins");
        }
    }
    Ok(encoded)
}

fn split_prefix(value: &str) -> Option<(ValueKind, &str)> {
    let idx = value.find(':').filter(|&i| i > 0)?;
    let kind = ValueKind::from_prefix(&value[..idx])?;
    Some((kind, &value[idx + 1..]))
}

fn encode_value(kind: ValueKind, raw: &str) -> Result<Vec<u8>, DhcpOptionError> {
    match kind {
        ValueKind::Ip => encode_ipv4_list(raw),
        ValueKind::Str => Ok(raw.as_bytes().to_vec()),
        ValueKind::Hex => decode_hex(raw),
        ValueKind::U8 => parse_int::<u8>(raw, "u8").map(|v| vec![v]),
        ValueKind::U16 => parse_int::<u16>(raw, "u16").map(|v| v.to_be_bytes().to_vec()),
        ValueKind::U32 => parse_int::<u32>(raw, "u32").map(|v| v.to_be_bytes().to_vec()),
        ValueKind::Bool => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(vec![1]),
            "false" | "0" => Ok(vec![0]),
            _ => Err(DhcpOptionError::InvalidBool(raw.to_string())),
        },
    }
}

fn parse_int<T: std::str::FromStr>(raw: &str, kind: &'static str) -> Result<T, DhcpOptionError> {
    raw.trim()
        .parse()
        .map_err(|_| DhcpOptionError::InvalidInteger {
            kind,
            value: raw.to_string(),
        })
}

fn encode_ipv4_list(raw: &str) -> Result<Vec<u8>, DhcpOptionError> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => out.extend_from_slice(&ip.octets()),
            Ok(IpAddr::V6(ip)) => return Err(DhcpOptionError::NotIpv4(ip.to_string())),
            Err(_) => return Err(DhcpOptionError::InvalidIp(raw.to_string())),
        }
    }
    if out.is_empty() {
        return Err(DhcpOptionError::InvalidIp(raw.to_string()));
    }
    Ok(out)
}

/// Hex with an optional `0x` prefix; `:` and spaces are ignored.
fn decode_hex(raw: &str) -> Result<Vec<u8>, DhcpOptionError> {
    let digits: String = raw
        .strip_prefix("0x")
        .unwrap_or(raw)
        .chars()
        .filter(|c| *c != ':' && *c != ' ')
        .collect();
    if digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DhcpOptionError::InvalidHex(raw.to_string()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .map_err(|_| DhcpOptionError::InvalidHex(raw.to_string()))
}
