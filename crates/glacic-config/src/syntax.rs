//! Comment-preserving syntax tree for config text.
//!
//! Parsing and rendering go through `hcl-edit`, which keeps whitespace and
//! comments as decor on every node, so an unedited tree renders back to the
//! input byte-for-byte. Expression values are evaluated through `hcl-rs`
//! and handed to the rest of the crate as JSON values.

use hcl::eval::{Context, Evaluate};
use hcl_edit::{Decorate, Span};
use serde_json::Value;

pub use hcl_edit::expr::Expression;
pub use hcl_edit::structure::{Attribute, Block, Body, Structure};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{filename}:{line}:{column}: {message}")]
pub struct ParseError {
    pub filename: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

pub fn parse(src: &str, filename: &str) -> Result<Body, ParseError> {
    hcl_edit::parser::parse_body(src).map_err(|err| ParseError {
        filename: filename.to_string(),
        line: err.location().line(),
        column: err.location().column(),
        message: err.message().to_string(),
    })
}

/// 1-based line where `node` starts in `src`. Nodes built by edits have
/// no span and report `None`.
pub fn line_of(src: &str, node: &impl Span) -> Option<usize> {
    let start = node.span()?.start;
    let before = src.get(..start)?;
    Some(before.matches('\n').count() + 1)
}

/// Evaluates a literal expression. Variables and function calls have no
/// context to resolve against and fail.
pub fn expr_value(expr: &Expression) -> Result<Value, String> {
    let expr = hcl::Expression::from(expr.clone());
    let value = expr.evaluate(&Context::new()).map_err(|e| e.to_string())?;
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Literal expression for a JSON value.
pub fn value_expr(value: &Value) -> Result<Expression, String> {
    let value = hcl::to_value(value).map_err(|e| e.to_string())?;
    Ok(Expression::from(hcl::Expression::from(value)))
}

pub fn prefix(node: &impl Decorate) -> String {
    node.decor().prefix().map(|p| p.to_string()).unwrap_or_default()
}

pub fn suffix(node: &impl Decorate) -> String {
    node.decor().suffix().map(|s| s.to_string()).unwrap_or_default()
}

pub fn attribute<'a>(body: &'a Body, key: &str) -> Option<&'a Attribute> {
    body.iter().find_map(|s| match s {
        Structure::Attribute(attr) if attr.key.as_str() == key => Some(attr),
        _ => None,
    })
}

pub fn attribute_value(body: &Body, key: &str) -> Option<Value> {
    attribute(body, key).and_then(|a| expr_value(&a.value).ok())
}

pub fn blocks(body: &Body) -> impl Iterator<Item = &Block> {
    body.iter().filter_map(|s| match s {
        Structure::Block(block) => Some(block),
        Structure::Attribute(_) => None,
    })
}

fn attribute_position(body: &Body, key: &str) -> Option<usize> {
    body.iter()
        .position(|s| matches!(s, Structure::Attribute(a) if a.key.as_str() == key))
}

pub fn label_values(block: &Block) -> Vec<String> {
    block.labels.iter().map(|l| l.as_str().to_string()).collect()
}

/// Sets `key` to `value`. An existing attribute keeps its position and its
/// trailing comment; a new one is appended with `indent`. Returns false
/// when the attribute already held `value`.
pub fn set_attribute(body: &mut Body, key: &str, value: &Value, indent: &str) -> Result<bool, String> {
    let mut expr = value_expr(value)?;
    let Some(idx) = attribute_position(body, key) else {
        let ident = hcl_edit::Ident::try_new(key).map_err(|e| e.to_string())?;
        let mut attr = Attribute::new(ident, expr);
        attr.decor_mut().set_prefix(indent);
        body.push(attr);
        return Ok(true);
    };
    match body.remove(idx) {
        Structure::Attribute(mut attr) => {
            let unchanged = expr_value(&attr.value).ok().as_ref() == Some(value);
            if !unchanged {
                *expr.decor_mut() = attr.value.decor().clone();
                attr.value = expr;
            }
            body.insert(idx, attr);
            Ok(!unchanged)
        }
        other => {
            body.insert(idx, other);
            Ok(false)
        }
    }
}

/// Returns false when `key` was not set.
pub fn remove_attribute(body: &mut Body, key: &str) -> bool {
    match attribute_position(body, key) {
        Some(idx) => {
            body.remove(idx);
            true
        }
        None => false,
    }
}

/// Indentation used by the body's first item, or `fallback` when empty.
pub fn indent_of(body: &Body, fallback: &str) -> String {
    let Some(first) = body.iter().next() else {
        return fallback.to_string();
    };
    let lead = match first {
        Structure::Attribute(attr) => prefix(attr),
        Structure::Block(block) => prefix(block),
    };
    let last = lead.rsplit('\n').next().unwrap_or_default();
    if last.chars().all(|c| c == ' ' || c == '\t') {
        last.to_string()
    } else {
        fallback.to_string()
    }
}

pub fn render(body: &Body) -> String {
    body.to_string()
}

/// Renders a single block on its own, without its surrounding decor.
pub fn render_block(block: &Block) -> String {
    let mut block = block.clone();
    *block.decor_mut() = hcl_edit::Decor::default();
    let mut body = Body::new();
    body.push(block);
    body.to_string()
}

#[cfg(test)]
#[path = "syntax_tests.rs"]
mod tests;
