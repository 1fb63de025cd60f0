//! Canonical whitespace for config-syntax text.
//!
//! The text goes through the `hcl-edit` tree and only node decor is
//! rewritten, so comments survive. Indentation becomes two spaces per
//! level, `=` gets one space on each side, runs of blank lines collapse to
//! one and trailing whitespace goes away. One-line blocks are left as
//! written.

use hcl_edit::{Decorate, Span};

use crate::syntax::{self, Block, Body, ParseError, Structure};

pub fn format_source(src: &str, filename: &str) -> Result<String, ParseError> {
    let mut body = syntax::parse(src, filename)?;
    format_body(&mut body, src, 0);
    Ok(syntax::render(&body))
}

fn format_body(body: &mut Body, src: &str, depth: usize) {
    let indent = "  ".repeat(depth);
    for idx in 0..body.len() {
        let mut structure = body.remove(idx);
        match &mut structure {
            Structure::Attribute(attr) => {
                let lead = leading(&syntax::prefix(attr), &indent, idx == 0);
                let tail = trailing(&syntax::suffix(attr));
                attr.decor_mut().set_prefix(lead);
                attr.decor_mut().set_suffix(tail);
                attr.key.decor_mut().set_suffix(" ");
                let value_tail = trailing(&syntax::suffix(&attr.value));
                attr.value.decor_mut().set_prefix(" ");
                attr.value.decor_mut().set_suffix(value_tail);
            }
            Structure::Block(block) => {
                let lead = leading(&syntax::prefix(block), &indent, idx == 0);
                let tail = trailing(&syntax::suffix(block));
                block.decor_mut().set_prefix(lead);
                block.decor_mut().set_suffix(tail);
                if !is_one_line(src, block) {
                    format_body(&mut block.body, src, depth + 1);
                    let inner = "  ".repeat(depth + 1);
                    let end = closing(&syntax::suffix(&block.body), &inner, &indent);
                    block.body.decor_mut().set_suffix(end);
                }
            }
        }
        body.insert(idx, structure);
    }
    if depth == 0 {
        let end = closing(&syntax::suffix(body), "", "");
        body.decor_mut().set_suffix(end);
    }
}

fn is_one_line(src: &str, block: &Block) -> bool {
    block
        .span()
        .and_then(|range| src.get(range))
        .is_some_and(|text| !text.contains('\n'))
}

/// Lines in `decor` before a node: comments re-indented, blank runs
/// collapsed, blanks at the start of a body dropped.
fn leading(decor: &str, indent: &str, first: bool) -> String {
    let mut lines: Vec<&str> = decor.split('\n').collect();
    let inline = lines.pop().unwrap_or_default().trim();
    let mut out = comment_lines(&lines, indent, first);
    out.push_str(indent);
    if !inline.is_empty() {
        out.push_str(inline);
        out.push(' ');
    }
    out
}

/// Decor between the last node of a body and its closing brace (or end of
/// file). Trailing blank lines are dropped.
fn closing(decor: &str, inner_indent: &str, indent: &str) -> String {
    let mut lines: Vec<&str> = decor.split('\n').collect();
    let last = lines.pop().unwrap_or_default().trim();
    if !last.is_empty() {
        lines.push(last);
    }
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let mut out = comment_lines(&lines, inner_indent, false);
    if !indent.is_empty() || !out.is_empty() {
        out.push_str(indent);
    }
    out
}

fn comment_lines(lines: &[&str], indent: &str, drop_leading_blanks: bool) -> String {
    let mut out = String::new();
    let mut blank = false;
    let mut wrote_any = !drop_leading_blanks;
    for line in lines {
        let text = line.trim();
        if text.is_empty() {
            blank = wrote_any;
            continue;
        }
        if blank {
            out.push('\n');
            blank = false;
        }
        out.push_str(indent);
        out.push_str(text);
        out.push('\n');
        wrote_any = true;
    }
    if blank {
        out.push('\n');
    }
    out
}

/// Same-line decor after a node: a comment keeps one leading space,
/// bare whitespace goes away.
fn trailing(decor: &str) -> String {
    let text = decor.trim_matches([' ', '\t']);
    if text.is_empty() || text.starts_with('\n') {
        text.to_string()
    } else {
        format!(" {text}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_normalizes_whitespace() {
        let src = "# header\n\n\n\nschema_version=\"1.0\"\ninterface   \"eth0\" {\n      dhcp=true   # uplink\n\tmtu    =  1500\n}\n";
        let out = format_source(src, "t.hcl").unwrap();
        assert!(out.starts_with("# header\n\nschema_version = \"1.0\"\n"), "{out}");
        assert!(out.contains("\n  dhcp = true # uplink\n  mtu = 1500\n}"), "{out}");
    }

    #[test]
    fn test_format_keeps_comments_and_one_line_blocks() {
        let src = "zone \"lan\" {\n    # inner\n    match { interface = \"eth1\" }\n\n\n    // tail\n}\n";
        let out = format_source(src, "t.hcl").unwrap();
        assert!(out.contains("  # inner\n  match { interface = \"eth1\" }\n"), "{out}");
        assert!(out.contains("\n\n  // tail\n}"), "{out}");
        assert!(!out.contains("\n\n\n"), "{out}");
    }

    #[test]
    fn test_format_is_idempotent() {
        let src = "a = 1\n\n# c\nzone \"lan\" {\n  # inner\n  match { interface = \"eth1\" }\n}\napi {}\n";
        let once = format_source(src, "t.hcl").unwrap();
        let twice = format_source(&once, "t.hcl").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_formatted_text_parses_to_same_values() {
        let src = "a=1\nlist = [ \"x\",\n\"y\" ]\nb   {\nc=\"d\"\n}\n";
        let out = format_source(src, "t.hcl").unwrap();
        let body = syntax::parse(&out, "t.hcl").unwrap();
        assert_eq!(syntax::attribute_value(&body, "a"), Some(serde_json::json!(1)));
        assert_eq!(
            syntax::attribute_value(&body, "list"),
            Some(serde_json::json!(["x", "y"]))
        );
        let block = syntax::blocks(&body).next().unwrap();
        assert_eq!(syntax::attribute_value(&block.body, "c"), Some(serde_json::json!("d")));
    }

    #[test]
    fn test_format_rejects_invalid_text() {
        assert!(format_source("a = \n", "t.hcl").is_err());
    }

    #[test]
    fn test_trailing_decor() {
        assert_eq!(trailing("   # note  "), " # note");
        assert_eq!(trailing("  \t"), "");
        assert_eq!(trailing(""), "");
    }
}
