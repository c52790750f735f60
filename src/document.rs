use crate::extractor::CodeBlocks;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Front matter keys every tutorial page is expected to carry.
pub const KNOWN_KEYS: [&str; 4] = ["section", "layout", "title", "redirect_from"];

/// Ordered front matter of a document.
///
/// Keys keep the order they appear in the file. Keys outside [`KNOWN_KEYS`]
/// are kept as-is. A list value is stored as its items joined by `\n`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Inserts a value, replacing an existing key in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Keys that are not part of [`KNOWN_KEYS`].
    pub fn unknown_keys(&self) -> impl Iterator<Item = &str> {
        self.keys().filter(|k| !KNOWN_KEYS.contains(k))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A fenced code block.
///
/// ````markdown
/// ```elixir,propagate
/// map = %{a: 1}
/// ```
/// ````
///
/// The first token of the info string is the language tag, the remaining
/// comma-separated tokens are attributes:
///
/// - `ignore` - never validate this block
/// - `propagate` - prepend this block to later blocks of the same language
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CodeBlock {
    pub language: String,
    pub attributes: Vec<String>,
    /// Text between the fences, without the final newline
    pub source: String,
    /// Line of the opening fence (1-based)
    pub line: usize,
}

impl CodeBlock {
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }

    pub fn is_ignored(&self) -> bool {
        self.has_attribute("ignore")
    }

    pub fn propagates(&self) -> bool {
        self.has_attribute("propagate")
    }

    /// The fence info string as it would appear after the opening fence.
    pub fn info_string(&self) -> String {
        let mut info = self.language.clone();
        for attr in &self.attributes {
            info.push(',');
            info.push_str(attr);
        }
        info
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "kind", content = "content", rename_all = "snake_case")]
pub enum Block {
    Prose(String),
    Code(CodeBlock),
}

/// A loaded page: front matter plus body blocks in reading order.
///
/// Built once by the loader and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Document {
    path: PathBuf,
    metadata: Metadata,
    body: Vec<Block>,
}

impl Document {
    pub(crate) fn new(path: PathBuf, metadata: Metadata, body: Vec<Block>) -> Self {
        Self {
            path,
            metadata,
            body,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn body(&self) -> &[Block] {
        &self.body
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title")
    }

    pub fn section(&self) -> Option<&str> {
        self.metadata.get("section")
    }

    pub fn layout(&self) -> Option<&str> {
        self.metadata.get("layout")
    }

    /// Redirect aliases from `redirect_from`, one per list item.
    pub fn redirects(&self) -> Vec<&str> {
        self.metadata
            .get("redirect_from")
            .map(|value| {
                value
                    .lines()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Code blocks in source order. Each call starts a fresh sequence.
    pub fn code_blocks(&self) -> CodeBlocks<'_> {
        CodeBlocks::new(&self.body)
    }

    /// Re-serializes the document into front matter and fenced body text.
    ///
    /// Loading the result yields the same metadata and block sequence.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        let body_starts_with_marker = match self.body.first() {
            Some(Block::Prose(text)) => text.lines().next().is_some_and(|l| l.trim_end() == "---"),
            _ => false,
        };

        if !self.metadata.is_empty() || body_starts_with_marker {
            out.push_str("---\n");
            for (key, value) in self.metadata.iter() {
                write_metadata_entry(&mut out, key, value);
            }
            out.push_str("---\n");
        }

        for block in &self.body {
            match block {
                Block::Prose(text) => {
                    out.push_str(text);
                    out.push('\n');
                }
                Block::Code(code) => {
                    let fence = "`".repeat(fence_len_for(&code.source));
                    let _ = writeln!(out, "{}{}", fence, code.info_string());
                    if !code.source.is_empty() {
                        out.push_str(&code.source);
                        out.push('\n');
                    }
                    out.push_str(&fence);
                    out.push('\n');
                }
            }
        }
        out
    }
}

fn write_metadata_entry(out: &mut String, key: &str, value: &str) {
    if value.contains('\n') {
        let _ = writeln!(out, "{}:", yaml_scalar(key));
        for item in value.lines() {
            let _ = writeln!(out, "  - {}", yaml_scalar(item));
        }
    } else {
        let _ = writeln!(out, "{}: {}", yaml_scalar(key), yaml_scalar(value));
    }
}

/// A string as a YAML scalar that reads back as the same string.
fn yaml_scalar(value: &str) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().to_string())
        .unwrap_or_else(|_| format!("{:?}", value))
}

/// Shortest backtick fence that no line of `source` can close.
fn fence_len_for(source: &str) -> usize {
    let longest_run = source
        .lines()
        .map(|l| l.trim_start().chars().take_while(|c| *c == '`').count())
        .max()
        .unwrap_or(0);
    (longest_run + 1).max(3)
}
