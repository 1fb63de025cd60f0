//! Round-trip editing of a config file.
//!
//! [`ConfigFile`] keeps the lossless `hcl-edit` tree next to the decoded
//! [`Config`]. Edits are applied to a copy of the tree, the result is
//! re-loaded, and only then does the copy replace the current state, so a
//! rejected edit leaves the file untouched. Comments and layout outside
//! the edited block survive byte-for-byte.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use glacic_core::Severity;
use serde::Serialize;
use serde_json::Value;

use hcl_edit::Decorate;

use crate::decode::decode_body;
use crate::format::format_source;
use crate::loader::{LoadOptions, Loader};
use crate::model::Config;
use crate::syntax::{self, Block, Body, Structure};
use crate::version::SchemaVersion;

/// A top-level block as reported by [`ConfigFile::list_sections`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    /// Labels joined by a space.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigMetadata {
    pub path: Option<PathBuf>,
    pub last_modified: Option<DateTime<Utc>>,
    pub size: u64,
    pub sections: Vec<SectionInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
    pub line: usize,
    pub column: usize,
}

/// Values accepted by [`ConfigFile::set_attribute`].
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl AttrValue {
    fn into_json(self) -> Option<Value> {
        Some(match self {
            Self::Bool(b) => Value::Bool(b),
            Self::Int(i) => Value::from(i),
            Self::Float(f) => Value::Number(serde_json::Number::from_f64(f)?),
            Self::Str(s) => Value::String(s),
            Self::List(items) => Value::Array(items.into_iter().map(Value::String).collect()),
        })
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        Self::List(v)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    filename: String,
    original: String,
    body: Body,
    config: Config,
    loader: Loader,
}

impl ConfigFile {
    pub fn load_file(path: &Path) -> Result<Self> {
        let data = fs::read(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut file = Self::load_bytes(&data, &path.display().to_string())?;
        file.path = Some(path.to_path_buf());
        Ok(file)
    }

    /// Parses in-memory bytes. The result has no backing file until
    /// [`Self::save_to`] is called.
    pub fn load_bytes(data: &[u8], filename: &str) -> Result<Self> {
        Self::load_bytes_with(Loader::default(), data, filename)
    }

    pub fn load_bytes_with(loader: Loader, data: &[u8], filename: &str) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .with_context(|| format!("config {filename} is not valid UTF-8"))?
            .to_string();
        let body = syntax::parse(&text, filename).context("failed to parse config for editing")?;
        let config = load_text(&loader, &text, filename).context("failed to decode config")?;
        Ok(Self {
            path: None,
            filename: filename.to_string(),
            original: text,
            body,
            config,
            loader,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    pub fn save(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            bail!("config has no backing file; use save_to");
        };
        self.save_to(&path)
    }

    /// Writes the current text to `path`. An existing file is first moved
    /// to `<path>.bak`.
    pub fn save_to(&mut self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }

        let data = syntax::render(&self.body);
        let tmp_path = sibling(path, ".tmp");
        fs::write(&tmp_path, &data)
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;

        if path.exists() {
            let backup = sibling(path, ".bak");
            fs::rename(path, &backup).with_context(|| {
                format!(
                    "failed to back up {} to {}",
                    path.display(),
                    backup.display()
                )
            })?;
        }
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "failed to replace {} from {}",
                path.display(),
                tmp_path.display()
            )
        })?;

        tracing::info!(path = %path.display(), "saved config");
        self.path = Some(path.to_path_buf());
        self.original = data;
        Ok(())
    }

    pub fn get_raw(&self) -> String {
        syntax::render(&self.body)
    }

    /// Replaces the whole document. The text must parse and load.
    pub fn set_raw(&mut self, text: &str) -> Result<()> {
        let body = syntax::parse(text, &self.filename).context("invalid config syntax")?;
        let config = load_text(&self.loader, text, &self.filename)
            .context("config does not match schema")?;
        self.body = body;
        self.config = config;
        Ok(())
    }

    /// Text of the first top-level block of type `kind`.
    pub fn get_section(&self, kind: &str) -> Result<String> {
        syntax::blocks(&self.body)
            .find(|b| b.ident.as_str() == kind)
            .map(section_text)
            .ok_or_else(|| anyhow::anyhow!("section \"{kind}\" not found"))
    }

    pub fn get_section_by_label(&self, kind: &str, labels: &[&str]) -> Result<String> {
        syntax::blocks(&self.body)
            .find(|b| block_matches(b, kind, labels))
            .map(section_text)
            .ok_or_else(|| not_found(kind, labels))
    }

    /// Replaces the first block of type `kind` with `text`, or appends it
    /// when there is none.
    pub fn set_section(&mut self, kind: &str, text: &str) -> Result<()> {
        let block = self.parse_section(kind, text)?;
        self.edit(|body| {
            let idx = block_position(body, |b| b.ident.as_str() == kind);
            place_block(body, idx, block);
            Ok(())
        })
    }

    pub fn set_section_by_label(&mut self, kind: &str, labels: &[&str], text: &str) -> Result<()> {
        let block = self.parse_section(kind, text)?;
        self.edit(|body| {
            let idx = block_position(body, |b| block_matches(b, kind, labels));
            place_block(body, idx, block);
            Ok(())
        })
    }

    pub fn add_section(&mut self, text: &str) -> Result<()> {
        let block = parse_block(text, &self.filename).context("invalid section")?;
        self.edit(|body| {
            place_block(body, None, block);
            Ok(())
        })
    }

    pub fn remove_section(&mut self, kind: &str) -> Result<()> {
        self.edit(|body| {
            let Some(idx) = block_position(body, |b| b.ident.as_str() == kind) else {
                bail!("section \"{kind}\" not found");
            };
            body.remove(idx);
            Ok(())
        })
    }

    pub fn remove_section_by_label(&mut self, kind: &str, labels: &[&str]) -> Result<()> {
        self.edit(|body| {
            let Some(idx) = block_position(body, |b| block_matches(b, kind, labels)) else {
                return Err(not_found(kind, labels));
            };
            body.remove(idx);
            Ok(())
        })
    }

    pub fn list_sections(&self) -> Vec<SectionInfo> {
        syntax::blocks(&self.body)
            .map(|b| {
                let labels = syntax::label_values(b);
                SectionInfo {
                    kind: b.ident.as_str().to_string(),
                    label: labels.join(" "),
                    labels,
                }
            })
            .collect()
    }

    /// Sets an attribute at the top level (`block_path` empty) or inside the
    /// top-level block addressed by `[type, labels..]`.
    pub fn set_attribute(
        &mut self,
        block_path: &[&str],
        name: &str,
        value: impl Into<AttrValue>,
    ) -> Result<()> {
        let Some(value) = value.into().into_json() else {
            bail!("invalid value for {name}: not a finite number");
        };
        let set = |body: &mut Body, indent: &str| {
            syntax::set_attribute(body, name, &value, indent)
                .map(|_| ())
                .map_err(|e| anyhow::anyhow!("cannot set {name}: {e}"))
        };
        self.edit(|body| match block_path.split_first() {
            None => set(body, ""),
            Some((kind, labels)) => with_block_mut(body, kind, labels, |block| {
                let indent = syntax::indent_of(&block.body, "  ");
                set(&mut block.body, &indent)
            }),
        })
    }

    /// Returns false when the attribute was not present.
    pub fn remove_attribute(&mut self, block_path: &[&str], name: &str) -> Result<bool> {
        let mut removed = false;
        self.edit(|body| {
            removed = match block_path.split_first() {
                None => syntax::remove_attribute(body, name),
                Some((kind, labels)) => with_block_mut(body, kind, labels, |block| {
                    Ok(syntax::remove_attribute(&mut block.body, name))
                })?,
            };
            Ok(())
        })?;
        Ok(removed)
    }

    pub fn metadata(&self) -> ConfigMetadata {
        let mut meta = ConfigMetadata {
            path: self.path.clone(),
            last_modified: None,
            size: 0,
            sections: self.list_sections(),
        };
        if let Some(path) = &self.path
            && let Ok(info) = fs::metadata(path)
        {
            meta.size = info.len();
            meta.last_modified = info.modified().ok().map(DateTime::<Utc>::from);
        }
        meta
    }

    /// Discards in-memory changes and re-reads the backing file.
    pub fn reload(&mut self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            bail!("config has no backing file to reload");
        };
        let data = fs::read(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut fresh = Self::load_bytes_with(self.loader.clone(), &data, &self.filename)?;
        fresh.path = Some(path);
        *self = fresh;
        Ok(())
    }

    /// Line-by-line comparison of the loaded text with the current text.
    pub fn diff(&self) -> String {
        let current = syntax::render(&self.body);
        if current == self.original {
            return String::new();
        }
        let before: Vec<&str> = self.original.split('\n').collect();
        let after: Vec<&str> = current.split('\n').collect();

        let mut out = String::from("--- original\n+++ modified\n");
        for i in 0..before.len().max(after.len()) {
            let old = before.get(i).copied().unwrap_or_default();
            let new = after.get(i).copied().unwrap_or_default();
            if old == new {
                continue;
            }
            if !old.is_empty() {
                let _ = writeln!(out, "-{old}");
            }
            if !new.is_empty() {
                let _ = writeln!(out, "+{new}");
            }
        }
        out
    }

    pub fn has_changes(&self) -> bool {
        syntax::render(&self.body) != self.original
    }

    /// Replays tree migrations from the config's version up to `target`,
    /// returning the hops applied.
    pub fn migrate_to(&mut self, target: SchemaVersion) -> Result<Vec<String>> {
        let current = SchemaVersion::parse(&self.config.schema_version)
            .context("invalid config schema version")?;
        if current >= target {
            return Ok(Vec::new());
        }
        let mut applied = Vec::new();
        let registry = self.loader.clone();
        self.edit(|body| {
            applied = registry.registry().migrate_tree(body, current, target)?;
            Ok(())
        })?;
        tracing::info!(from = %current, to = %target, hops = applied.len(), "migrated config file");
        Ok(applied)
    }

    pub fn migrate_to_latest(&mut self) -> Result<Vec<String>> {
        self.migrate_to(SchemaVersion::current())
    }

    fn parse_section(&self, kind: &str, text: &str) -> Result<Block> {
        let block = parse_block(text, &self.filename).context("invalid section")?;
        if block.ident.as_str() != kind {
            bail!(
                "section type mismatch: expected \"{kind}\", got \"{}\"",
                block.ident.as_str()
            );
        }
        Ok(block)
    }

    /// Applies `f` to a copy of the tree and commits it once the result
    /// loads.
    fn edit<F>(&mut self, f: F) -> Result<()>
    where
        F: FnOnce(&mut Body) -> Result<()>,
    {
        let mut body = self.body.clone();
        f(&mut body)?;
        let text = syntax::render(&body);
        let config = load_text(&self.loader, &text, &self.filename)
            .context("edited config failed to load")?;
        self.body = body;
        self.config = config;
        Ok(())
    }
}

/// Syntax and schema check without touching any file.
pub fn validate_hcl(text: &str) -> Result<()> {
    let body =
        syntax::parse(text, "validate.hcl").map_err(|e| anyhow::anyhow!("syntax error: {e}"))?;
    decode_body(&body, text, false).map_err(|e| anyhow::anyhow!("schema error: {e}"))?;
    Ok(())
}

/// Checks that `text` is exactly one block of type `kind` that decodes.
pub fn validate_section(kind: &str, text: &str) -> Result<()> {
    let block = parse_block(text, "validate.hcl")?;
    if block.ident.as_str() != kind {
        bail!(
            "section type mismatch: expected \"{kind}\", got \"{}\"",
            block.ident.as_str()
        );
    }
    let mut body = Body::new();
    body.push(block);
    decode_body(&body, text, false).map_err(|e| anyhow::anyhow!("schema error: {e}"))?;
    Ok(())
}

pub fn format(text: &str) -> Result<String> {
    format_source(text, "format.hcl").map_err(|e| anyhow::anyhow!("invalid config syntax: {e}"))
}

/// Syntax diagnostics for `text`; empty when it parses.
pub fn parse_with_diagnostics(text: &str) -> Vec<Diagnostic> {
    match syntax::parse(text, "input.hcl") {
        Ok(_) => Vec::new(),
        Err(err) => vec![Diagnostic {
            severity: Severity::Error,
            summary: err.message.clone(),
            detail: err.to_string(),
            line: err.line,
            column: err.column,
        }],
    }
}

fn load_text(loader: &Loader, text: &str, filename: &str) -> Result<Config> {
    Ok(loader
        .load_hcl(text, filename, &LoadOptions::default())?
        .config)
}

fn parse_block(text: &str, filename: &str) -> Result<Block> {
    let body = syntax::parse(text, filename).map_err(|e| anyhow::anyhow!("parse error: {e}"))?;
    let mut blocks: Vec<Block> = syntax::blocks(&body).cloned().collect();
    match blocks.len() {
        0 => bail!("no block found in config text"),
        1 => Ok(blocks.remove(0)),
        n => bail!("expected single block, got {n}"),
    }
}

/// Exact label match when the counts agree; otherwise a single label may
/// match the block's `name` attribute.
fn block_matches(block: &Block, kind: &str, labels: &[&str]) -> bool {
    if block.ident.as_str() != kind {
        return false;
    }
    if !labels.is_empty() && syntax::label_values(block) == labels {
        return true;
    }
    labels.len() == 1
        && syntax::attribute_value(&block.body, "name")
            .is_some_and(|name| name.as_str() == Some(labels[0]))
}

fn block_position(body: &Body, pred: impl Fn(&Block) -> bool) -> Option<usize> {
    body.iter()
        .position(|s| matches!(s, Structure::Block(b) if pred(b)))
}

/// Runs `f` on the top-level block addressed by `kind` and `labels`.
fn with_block_mut<T>(
    body: &mut Body,
    kind: &str,
    labels: &[&str],
    f: impl FnOnce(&mut Block) -> Result<T>,
) -> Result<T> {
    let idx = block_position(body, |b| {
        if labels.is_empty() {
            b.ident.as_str() == kind
        } else {
            block_matches(b, kind, labels)
        }
    });
    let missing = || {
        if labels.is_empty() {
            anyhow::anyhow!("section \"{kind}\" not found")
        } else {
            not_found(kind, labels)
        }
    };
    let Some(idx) = idx else {
        return Err(missing());
    };
    let Structure::Block(mut block) = body.remove(idx) else {
        return Err(missing());
    };
    let result = f(&mut block);
    body.insert(idx, block);
    result
}

fn not_found(kind: &str, labels: &[&str]) -> anyhow::Error {
    anyhow::anyhow!("section {kind} with labels [{}] not found", labels.join(" "))
}

fn section_text(block: &Block) -> String {
    let mut out = syntax::render_block(block);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Puts `block` at `idx`, taking over the replaced block's surrounding
/// decor, or appends it after a blank line.
fn place_block(body: &mut Body, idx: Option<usize>, mut block: Block) {
    let own_comments = syntax::prefix(&block).trim_start().to_string();
    match idx {
        Some(idx) => {
            let (lead, tail) = match body.remove(idx) {
                Structure::Block(old) => (syntax::prefix(&old), syntax::suffix(&old)),
                Structure::Attribute(old) => (syntax::prefix(&old), syntax::suffix(&old)),
            };
            block.decor_mut().set_prefix(format!("{lead}{own_comments}"));
            block.decor_mut().set_suffix(tail);
            body.insert(idx, block);
        }
        None => {
            let lead = if body.is_empty() {
                own_comments
            } else {
                format!("\n{own_comments}")
            };
            block.decor_mut().set_prefix(lead);
            block.decor_mut().set_suffix("");
            body.push(block);
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[cfg(test)]
#[path = "editor_tests.rs"]
mod tests;
