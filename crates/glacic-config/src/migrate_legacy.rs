//! Text-level rewrites of retired config syntax, run before parsing.

use std::sync::LazyLock;

use regex::Regex;

use crate::migrate::PreParseMigration;

struct LegacyRule {
    pattern: Regex,
    replacement: &'static str,
    description: &'static str,
}

fn rule(pattern: &str, replacement: &'static str, description: &'static str) -> Option<LegacyRule> {
    match Regex::new(pattern) {
        Ok(pattern) => Some(LegacyRule {
            pattern,
            replacement,
            description,
        }),
        Err(err) => {
            tracing::error!(%err, pattern, "invalid legacy syntax pattern");
            None
        }
    }
}

// Block bodies must start on a new line, so the wildcard interface goes on
// a line of its own and the rewritten text is one line longer per block.
static LEGACY_RULES: LazyLock<Vec<LegacyRule>> = LazyLock::new(|| {
    [
        rule(
            r"(?m)^([ \t]*)protection\s*\{",
            "${1}protection \"legacy_global\" {\n${1}  interface = \"*\"",
            "Convert global 'protection' block to wildcard 'protection' block",
        ),
        rule(
            r"(?m)^([ \t]*)global_protection\s*\{",
            "${1}protection \"legacy_global\" {\n${1}  interface = \"*\"",
            "Convert 'global_protection' block to wildcard 'protection' block",
        ),
        rule(
            r"\bvpn_link_group\b",
            "uplink_group",
            "Deprecated: 'vpn_link_group' renamed to 'uplink_group'",
        ),
        rule(
            r#"(?m)(^|[\s{])vpn_link\s*""#,
            r#"${1}uplink ""#,
            "Deprecated: 'vpn_link' renamed to 'uplink'",
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// Applies every legacy rule that matches, in order.
pub fn transform_legacy_syntax(text: &str) -> (String, Vec<String>) {
    let mut content = text.to_string();
    let mut applied = Vec::new();
    for rule in LEGACY_RULES.iter() {
        if rule.pattern.is_match(&content) {
            content = rule
                .pattern
                .replace_all(&content, rule.replacement)
                .into_owned();
            applied.push(rule.description.to_string());
        }
    }
    (content, applied)
}

static UNLABELED_PROTECTION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*protection\s*\{").ok());
static VPN_LINK_BLOCK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"\bvpn_link\s*""#).ok());
static ZONE_INTERFACES_LIST: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*interfaces\s*=\s*\[").ok());

fn matches(pattern: &LazyLock<Option<Regex>>, text: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(text))
}

/// Lists the retired constructs present in `text`, without rewriting it.
pub fn detect_legacy_features(text: &str) -> Vec<String> {
    let mut features = Vec::new();
    if matches(&UNLABELED_PROTECTION, text) {
        features.push("unlabeled 'protection' block".to_string());
    }
    if text.contains("vpn_link_group") {
        features.push("deprecated 'vpn_link_group' block".to_string());
    }
    if matches(&VPN_LINK_BLOCK, text) {
        features.push("deprecated 'vpn_link' block".to_string());
    }
    if !text.contains("schema_version") {
        features.push("missing 'schema_version' field".to_string());
    }
    if matches(&ZONE_INTERFACES_LIST, text) {
        features.push("deprecated 'interfaces' field in zone".to_string());
    }
    features
}

pub fn is_legacy_config(text: &str) -> bool {
    !detect_legacy_features(text).is_empty()
}

pub(crate) fn legacy_syntax_migration() -> PreParseMigration {
    PreParseMigration {
        name: "legacy_syntax".to_string(),
        description: "Transform legacy config syntax to the current schema".to_string(),
        transform: Box::new(transform_legacy_syntax),
    }
}
