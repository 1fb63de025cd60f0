//! Best-effort loading for boot recovery.
//!
//! When the strict loader rejects a file, the block around the reported
//! error line is commented out and the load retried, until the text loads
//! or no further progress is possible. The caller always gets a config
//! back: the salvaged one, or [`Config::minimal`].

use std::fmt::Write as _;
use std::sync::LazyLock;

use regex::Regex;

use crate::loader::{LoadOptions, Loader};
use crate::model::Config;

pub const MAX_RECOVERY_ITERATIONS: usize = 50;

const SKIP_MARKER: &str = "# [SKIPPED";

static ERROR_LINE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [r":(\d+):", r"line (\d+)", r"Line (\d+)"]
        .iter()
        .map(|p| Regex::new(p).expect("error line regex is valid"))
        .collect()
});

static BLOCK_START_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^\s*(interface|zone|policy|dhcp|dns|api|nat|ipset|route|vpn|features)\s+[^=\s]",
        r#"^\s*\w+\s*"[^"]*"\s*\{"#,
        r"^\s*\w+\s*\{",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("block start regex is valid"))
    .collect()
});

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedBlock {
    /// 1-based, inclusive.
    pub start_line: usize,
    pub end_line: usize,
    pub reason: String,
    /// The lines as they were before being commented out.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForgivingLoadResult {
    pub config: Config,
    pub original_text: String,
    pub salvaged_text: String,
    pub skipped_blocks: Vec<SkippedBlock>,
    /// The strict load failed and recovery ran.
    pub had_errors: bool,
    /// Set when nothing could be salvaged and `config` is the minimal one.
    pub fatal_error: Option<String>,
}

impl ForgivingLoadResult {
    /// Unified-diff-like view of the commented-out spans.
    pub fn salvage_diff(&self) -> String {
        if !self.had_errors {
            return String::new();
        }
        let mut out = String::from("--- original\n+++ salvaged\n");
        for block in &self.skipped_blocks {
            let count = block.end_line - block.start_line + 1;
            let _ = writeln!(
                out,
                "@@ -{start},{count} +{start},{count} @@ {reason}",
                start = block.start_line,
                reason = block.reason
            );
            for line in block.content.split('\n') {
                let _ = writeln!(out, "-{line}");
            }
            let _ = writeln!(out, "+{SKIP_MARKER} - {}]", block.reason);
        }
        out
    }
}

impl Loader {
    pub fn load_forgiving(&self, data: &str, filename: &str) -> ForgivingLoadResult {
        let options = LoadOptions::default();
        let mut result = ForgivingLoadResult {
            config: Config::default(),
            original_text: data.to_string(),
            salvaged_text: data.to_string(),
            skipped_blocks: Vec::new(),
            had_errors: false,
            fatal_error: None,
        };

        match self.load_hcl(data, filename, &options) {
            Ok(loaded) => {
                result.config = loaded.config;
                return result;
            }
            Err(err) => {
                tracing::warn!(error = %err, "strict config load failed, salvaging");
            }
        }

        result.had_errors = true;
        // Error lines refer to the rewritten text, so recovery edits that.
        let (mut working, _) = self.registry().apply_pre_parse(data);

        for _ in 0..MAX_RECOVERY_ITERATIONS {
            let err = match self.load_hcl(&working, filename, &options) {
                Ok(loaded) => {
                    result.config = loaded.config;
                    result.salvaged_text = working;
                    return result;
                }
                Err(err) => format!("{err:#}"),
            };

            let line = extract_error_line(&err).unwrap_or(1);
            match comment_out_block(&working, line, &err) {
                Some((text, skipped)) => {
                    tracing::warn!(
                        start = skipped.start_line,
                        end = skipped.end_line,
                        reason = %skipped.reason,
                        "skipped config block"
                    );
                    result.skipped_blocks.push(skipped);
                    working = text;
                }
                None => {
                    result.fatal_error = Some(format!("could not recover from parse errors: {err}"));
                    result.config = Config::minimal();
                    result.salvaged_text = working;
                    return result;
                }
            }
        }

        result.fatal_error = Some("exceeded maximum recovery iterations".to_string());
        result.config = Config::minimal();
        result.salvaged_text = working;
        result
    }
}

/// Forgiving load with the built-in migrations.
pub fn load_forgiving(data: &str, filename: &str) -> ForgivingLoadResult {
    Loader::default().load_forgiving(data, filename)
}

/// 1-based line number mentioned in an error message.
pub fn extract_error_line(message: &str) -> Option<usize> {
    ERROR_LINE_PATTERNS.iter().find_map(|re| {
        re.captures(message)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .filter(|&n| n > 0)
    })
}

pub fn is_block_start(line: &str) -> bool {
    BLOCK_START_PATTERNS.iter().any(|re| re.is_match(line))
}

/// First line of `reason`, at most 100 characters.
pub fn truncate_reason(reason: &str) -> String {
    let first = reason.lines().next().unwrap_or_default();
    if first.chars().count() > 100 {
        let head: String = first.chars().take(97).collect();
        format!("{head}...")
    } else {
        first.to_string()
    }
}

/// Opening and closing braces outside string literals and comments.
fn count_braces(line: &str) -> (i64, i64) {
    let (mut open, mut close) = (0, 0);
    let mut in_string = false;
    let mut escaped = false;
    let mut prev = '\0';
    for c in line.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '#' => break,
            '/' if prev == '/' => break,
            '{' => open += 1,
            '}' => close += 1,
            _ => {}
        }
        prev = c;
    }
    (open, close)
}

/// Comments out the block around `error_line`. `None` when the span is
/// already commented out, which means the error cannot be skipped.
fn comment_out_block(text: &str, error_line: usize, reason: &str) -> Option<(String, SkippedBlock)> {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let error_idx = error_line.clamp(1, lines.len()) - 1;

    let mut start = error_idx;
    while start > 0 {
        let prev = lines[start - 1].trim();
        if is_block_start(prev) {
            start -= 1;
            break;
        }
        if prev.is_empty() || prev == "}" {
            break;
        }
        start -= 1;
    }

    let mut end = error_idx;
    let mut depth = 0;
    while end < lines.len() {
        let (open, close) = count_braces(&lines[end]);
        depth += open - close;
        if depth <= 0 && close > 0 {
            break;
        }
        end += 1;
    }
    let end = end.min(lines.len() - 1);

    if lines[start..=end]
        .iter()
        .all(|l| l.trim_start().starts_with(SKIP_MARKER))
    {
        return None;
    }

    let reason = truncate_reason(reason);
    let content = lines[start..=end].join("\n");
    let prefix = format!("{SKIP_MARKER} - {reason}] ");
    for line in &mut lines[start..=end] {
        line.insert_str(0, &prefix);
    }

    Some((lines.join("\n"), SkippedBlock {
        start_line: start + 1,
        end_line: end + 1,
        reason,
        content,
    }))
}

#[cfg(test)]
#[path = "forgiving_tests.rs"]
mod tests;
