use super::*;
use crate::syntax::parse;

fn decode(src: &str) -> Result<Config, ConfigError> {
    let body = parse(src, "test.hcl").unwrap();
    decode_body(&body, src, false)
}

#[test]
fn test_labels_become_fields() {
    let cfg = decode(
        r#"
schema_version = "1.0"
interface "eth0" {
  ipv4 = ["10.0.0.1/24"]
  vlan "10" { zone = "iot" }
}
policy "lan" "wan" {
  action = "accept"
  rule "web" {
    proto     = "tcp"
    dest_port = 443
  }
}
"#,
    )
    .unwrap();
    assert_eq!(cfg.interfaces[0].name, "eth0");
    assert_eq!(cfg.interfaces[0].vlans[0].id, "10");
    assert_eq!(cfg.interfaces[0].vlans[0].zone, "iot");
    assert_eq!(cfg.policies[0].from, "lan");
    assert_eq!(cfg.policies[0].to, "wan");
    assert_eq!(cfg.policies[0].rules[0].name, "web");
    assert_eq!(cfg.policies[0].rules[0].dest_port, 443);
}

#[test]
fn test_repeated_blocks_keep_order() {
    let cfg = decode("zone \"wan\" {}\nzone \"lan\" {}\nzone \"dmz\" {}\n").unwrap();
    let names: Vec<&str> = cfg.zones.iter().map(|z| z.name.as_str()).collect();
    assert_eq!(names, vec!["wan", "lan", "dmz"]);
}

#[test]
fn test_unlabeled_repeated_match_blocks() {
    let cfg = decode(
        "zone \"lan\" {\n  match { interface = \"eth1\" }\n  match { src = \"10.0.0.0/8\" }\n}\n",
    )
    .unwrap();
    assert_eq!(cfg.zones[0].matches.len(), 2);
    assert_eq!(cfg.zones[0].matches[1].src, "10.0.0.0/8");
}

#[test]
fn test_six_to_four_block_maps_to_json_name() {
    let cfg = decode("vpn {\n  six_to_four \"he\" { relay = \"192.88.99.1\" }\n}\n").unwrap();
    assert_eq!(cfg.vpn.unwrap().six_to_four[0].name, "he");
}

#[test]
fn test_unknown_block_is_rejected_with_line() {
    let err = decode("schema_version = \"1.0\"\nfrobnicate {}\n").unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("unsupported block type \"frobnicate\""), "{msg}");
    assert!(msg.contains("(line 2)"), "{msg}");
}

#[test]
fn test_unknown_attribute_is_rejected_with_path_and_line() {
    let err = decode("interface \"eth0\" {\n  dhcp = true\n  colour = \"red\"\n}\n").unwrap_err();
    match err {
        ConfigError::Decode { field, message } => {
            assert_eq!(field, "interfaces[0].colour");
            assert!(message.contains("unsupported argument \"colour\""));
            assert!(message.contains("(line 3)"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_fields_allowed_when_requested() {
    let src = "interface \"eth0\" { colour = \"red\" }\nfrobnicate {}\n";
    let body = parse(src, "t.hcl").unwrap();
    let cfg = decode_body(&body, src, true).unwrap();
    assert_eq!(cfg.interfaces.len(), 1);
}

#[test]
fn test_type_mismatch_is_localized() {
    let err = decode("zone \"lan\" {}\ninterface \"eth0\" {\n  mtu = \"big\"\n}\n").unwrap_err();
    match err {
        ConfigError::Decode { field, message } => {
            assert_eq!(field, "interfaces[0]");
            assert!(message.contains("(line 2)"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_label_count_mismatch() {
    let err = decode("policy \"lan\" {}\n").unwrap_err();
    assert!(err.to_string().contains("expects 2 label(s)"), "{err}");
}

#[test]
fn test_duplicate_single_block() {
    let err = decode("api {}\napi {}\n").unwrap_err();
    assert!(err.to_string().contains("duplicate \"api\" block"), "{err}");
}

#[test]
fn test_duplicate_attribute() {
    let err = decode("ip_forwarding = true\nip_forwarding = false\n").unwrap_err();
    assert!(err.to_string().contains("defined more than once"), "{err}");
}

#[test]
fn test_schema_version_of() {
    let body = parse("schema_version = \"1.0\"\n", "t.hcl").unwrap();
    assert_eq!(schema_version_of(&body), "1.0");
    let body = parse("ip_forwarding = true\n", "t.hcl").unwrap();
    assert_eq!(schema_version_of(&body), "");
}

#[test]
fn test_unevaluable_value_names_attribute_and_line() {
    let err = decode("schema_version = \"1.0\"\nip_forwarding = yes\n").unwrap_err();
    match err {
        ConfigError::Decode { field, message } => {
            assert_eq!(field, "ip_forwarding");
            assert!(message.starts_with("invalid value for \"ip_forwarding\""), "{message}");
            assert!(message.ends_with("(line 2)"), "{message}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_heredoc_value_decodes_to_string() {
    let cfg = decode(
        "interface \"eth0\" {\n  description = <<-EOT\n    uplink\n    EOT\n  mtu = 1400\n}\n",
    )
    .unwrap();
    assert_eq!(cfg.interfaces[0].description, "uplink\n");
    assert_eq!(cfg.interfaces[0].mtu, 1400);
}

#[test]
fn test_line_index_falls_back_to_parent() {
    let src = "\n\ninterface \"eth0\" {\n}\n";
    let body = parse(src, "t.hcl").unwrap();
    let (_, index) = body_to_value(&body, src, false).unwrap();
    assert_eq!(index.line("interfaces[0]"), Some(3));
    assert_eq!(index.line("interfaces[0].mtu"), Some(3));
    assert_eq!(index.line("zones[0]"), None);
}
