use super::*;

const BROKEN_ZONE: &str = r#"schema_version = "1.0"

interface "eth0" {
  dhcp = true
}

zone "lan" {
  interfaces = ["eth1"]
  color = = "blue"
}

interface "eth1" {
  ipv4 = ["192.168.1.1/24"]
}
"#;

#[test]
fn test_clean_config_loads_without_recovery() {
    let text = "schema_version = \"1.0\"\ninterface \"eth0\" {\n  dhcp = true\n}\n";
    let result = load_forgiving(text, "clean.hcl");
    assert!(!result.had_errors);
    assert!(result.fatal_error.is_none());
    assert!(result.skipped_blocks.is_empty());
    assert_eq!(result.salvaged_text, text);
    assert_eq!(result.salvage_diff(), "");
    assert!(result.config.find_interface("eth0").is_some());
}

#[test]
fn test_malformed_block_is_skipped_and_rest_survives() {
    let result = load_forgiving(BROKEN_ZONE, "t.hcl");
    assert!(result.had_errors);
    assert!(result.fatal_error.is_none());
    assert_eq!(result.skipped_blocks.len(), 1);

    let skipped = &result.skipped_blocks[0];
    assert_eq!((skipped.start_line, skipped.end_line), (7, 10));
    assert!(skipped.reason.starts_with("HCL parse error: t.hcl:9:"), "{}", skipped.reason);
    assert!(skipped.content.starts_with("zone \"lan\" {"));

    assert!(result.config.find_interface("eth0").is_some());
    assert!(result.config.find_interface("eth1").is_some());
    assert!(result.config.find_zone("lan").is_none());

    assert!(result.salvaged_text.contains("# [SKIPPED - "));
    assert_eq!(result.original_text, BROKEN_ZONE);
    let lines: Vec<&str> = result.salvaged_text.lines().collect();
    assert!(lines[6].starts_with("# [SKIPPED - ") && lines[6].ends_with("] zone \"lan\" {"));
    assert_eq!(lines[11], "interface \"eth1\" {");
}

#[test]
fn test_salvage_diff_lists_removed_lines() {
    let result = load_forgiving(BROKEN_ZONE, "t.hcl");
    let diff = result.salvage_diff();
    assert!(diff.starts_with("--- original\n+++ salvaged\n"));
    assert!(diff.contains("@@ -7,4 +7,4 @@ HCL parse error"));
    assert!(diff.contains("\n-  color = = \"blue\"\n"));
    assert!(diff.contains("\n+# [SKIPPED - HCL parse error"));
}

#[test]
fn test_decode_error_skips_the_offending_block() {
    let text = "schema_version = \"1.0\"\ninterface \"eth0\" {\n  colour = \"red\"\n}\ninterface \"eth1\" {\n  dhcp = true\n}\n";
    let result = Loader::default().load_forgiving(text, "t.hcl");
    assert!(result.had_errors);
    assert!(result.fatal_error.is_none());
    assert_eq!(result.skipped_blocks.len(), 1);
    assert_eq!(result.skipped_blocks[0].start_line, 2);
    assert_eq!(result.skipped_blocks[0].end_line, 4);
    assert!(result.skipped_blocks[0].reason.contains("unsupported argument \"colour\""));
    assert!(result.config.find_interface("eth0").is_none());
    assert!(result.config.find_interface("eth1").is_some());
}

#[test]
fn test_unclosed_trailing_block_is_skipped() {
    let text = "schema_version = \"1.0\"\nzone \"lan\" {\n";
    let result = load_forgiving(text, "t.hcl");
    assert!(result.fatal_error.is_none());
    assert_eq!(result.skipped_blocks.len(), 1);
    assert_eq!(result.skipped_blocks[0].start_line, 2);
    assert!(result.config.zones.is_empty());
    assert_eq!(result.config.schema_version, "1.0");
}

#[test]
fn test_already_skipped_span_cannot_make_progress() {
    let text = "# [SKIPPED - earlier] zone \"x\" {\n# [SKIPPED - earlier] }";
    assert!(comment_out_block(text, 1, "again").is_none());

    let (rewritten, block) = comment_out_block("a = 1\nb = = 2\n", 2, "boom").unwrap();
    assert_eq!(block.start_line, 1);
    assert!(rewritten.starts_with("# [SKIPPED - boom] a = 1\n# [SKIPPED - boom] b = = 2"));
}

#[test]
fn test_extract_error_line() {
    assert_eq!(extract_error_line("HCL parse error: t.hcl:9:11: oops"), Some(9));
    assert_eq!(extract_error_line("unsupported argument \"x\" (line 42)"), Some(42));
    assert_eq!(extract_error_line("Line 7: bad"), Some(7));
    assert_eq!(extract_error_line("line 0"), None);
    assert_eq!(extract_error_line("no position here"), None);
}

#[test]
fn test_block_start_detection() {
    assert!(is_block_start("zone \"lan\" {"));
    assert!(is_block_start("  dns {"));
    assert!(is_block_start("features {"));
    assert!(is_block_start("custom \"label\" {"));
    assert!(!is_block_start("dns = 1"));
    assert!(!is_block_start("  name = \"x\""));
}

#[test]
fn test_reason_is_first_line_and_bounded() {
    assert_eq!(truncate_reason("first\nsecond"), "first");
    let long = "x".repeat(150);
    let cut = truncate_reason(&long);
    assert_eq!(cut.len(), 100);
    assert!(cut.ends_with("..."));
    assert_eq!(truncate_reason(&"y".repeat(100)), "y".repeat(100));
}

#[test]
fn test_brace_counting_ignores_strings_and_comments() {
    assert_eq!(count_braces(r#"name = "{" # }"#), (0, 0));
    assert_eq!(count_braces("a { // }"), (1, 0));
    assert_eq!(count_braces(r#"x = "\"{" }"#), (0, 1));
    assert_eq!(count_braces("zone \"a\" { b { } }"), (2, 2));
}
