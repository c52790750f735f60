use crate::document::{Block, CodeBlock, Document};
use std::collections::HashMap;
use std::iter::FusedIterator;
use std::slice;

/// Lazy iterator over the code blocks of a document, in source order.
///
/// Obtained from [`Document::code_blocks`]. The iterator is `Clone`, so a
/// sequence can be restarted either by cloning it before consuming or by
/// calling `code_blocks()` again.
#[derive(Debug, Clone)]
pub struct CodeBlocks<'a> {
    blocks: slice::Iter<'a, Block>,
}

impl<'a> CodeBlocks<'a> {
    pub(crate) fn new(blocks: &'a [Block]) -> Self {
        Self {
            blocks: blocks.iter(),
        }
    }
}

impl<'a> Iterator for CodeBlocks<'a> {
    type Item = &'a CodeBlock;

    fn next(&mut self) -> Option<Self::Item> {
        self.blocks.find_map(|block| match block {
            Block::Code(code) => Some(code),
            Block::Prose(_) => None,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.blocks.size_hint().1)
    }
}

impl FusedIterator for CodeBlocks<'_> {}

/// Parse fence info string into language and attributes.
///
/// Examples:
/// - "elixir" -> ("elixir", [])
/// - "json,ignore" -> ("json", ["ignore"])
/// - "python propagate" -> ("python", ["propagate"])
/// - "" -> ("", [])
pub fn parse_fence_info(info: &str) -> (String, Vec<String>) {
    let mut parts = info
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty());

    let language = parts.next().unwrap_or_default().to_string();
    let attributes = parts.map(str::to_string).collect();

    (language, attributes)
}

/// A code block ready for checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedBlock<'a> {
    /// Ordinal of the block among all code blocks of its document
    pub index: usize,
    /// Source to check, with propagated code prepended
    pub code: String,
    pub block: &'a CodeBlock,
}

/// Extracts code blocks with propagation support.
///
/// - Blocks marked `ignore` are left out entirely
/// - Blocks marked `propagate` are returned as-is and their code is
///   accumulated for their language
/// - Other blocks receive the accumulated code of their language as a
///   preamble
///
/// Propagation never leaks between documents or languages.
///
/// ````markdown
/// ```elixir,propagate
/// defmodule Point do
///   defstruct x: 0, y: 0
/// end
/// ```
///
/// ```elixir
/// %Point{x: 1}
/// ```
/// ````
///
/// The second block is checked with the `Point` definition in front of it.
pub fn extract_with_propagation(document: &Document) -> Vec<ExtractedBlock<'_>> {
    let mut result = Vec::new();
    let mut propagated: HashMap<&str, String> = HashMap::new();

    for (index, block) in document.code_blocks().enumerate() {
        if block.is_ignored() {
            continue;
        }

        let mut code = String::new();

        if !block.propagates() {
            if let Some(preamble) = propagated.get(block.language.as_str()) {
                code.push_str(preamble);
                code.push('\n');
            }
        }

        code.push_str(&block.source);

        if block.propagates() {
            let acc = propagated.entry(block.language.as_str()).or_default();
            acc.push_str(&block.source);
            acc.push('\n');
        }

        result.push(ExtractedBlock { index, code, block });
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_document;

    #[test]
    fn test_extract_in_source_order() {
        let markdown = r#"
# Maps

```elixir
map = %{:a => 1, 2 => :b}
```

Keyword lists:

```elixir
[a: 1, b: 2]
```

```json
{"a": 1}
```
"#;
        let doc = parse_document("maps.md", markdown).unwrap();
        let blocks: Vec<_> = doc.code_blocks().collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].language, "elixir");
        assert!(blocks[0].source.contains("%{:a => 1"));
        assert_eq!(blocks[1].source, "[a: 1, b: 2]");
        assert_eq!(blocks[2].language, "json");
    }

    #[test]
    fn test_code_blocks_restartable() {
        let doc = parse_document("a.md", "```a\n1\n```\n```b\n2\n```\n").unwrap();

        let mut first = doc.code_blocks();
        let saved = first.clone();
        assert_eq!(first.next().map(|b| b.language.as_str()), Some("a"));
        assert_eq!(first.next().map(|b| b.language.as_str()), Some("b"));
        assert!(first.next().is_none());
        assert!(first.next().is_none());

        assert_eq!(saved.count(), 2);
        assert_eq!(doc.code_blocks().count(), 2);
    }

    #[test]
    fn test_parse_fence_info() {
        let (lang, attrs) = parse_fence_info("elixir");
        assert_eq!(lang, "elixir");
        assert!(attrs.is_empty());

        let (lang, attrs) = parse_fence_info("json,ignore");
        assert_eq!(lang, "json");
        assert_eq!(attrs, vec!["ignore"]);

        let (lang, attrs) = parse_fence_info(" python , propagate ");
        assert_eq!(lang, "python");
        assert_eq!(attrs, vec!["propagate"]);

        let (lang, attrs) = parse_fence_info("");
        assert_eq!(lang, "");
        assert!(attrs.is_empty());
    }

    #[test]
    fn test_propagation_per_language() {
        let markdown = r#"
```toml,propagate
[package]
```

```json
{}
```

```toml
name = "x"
```

```toml,ignore
not checked
```
"#;
        let doc = parse_document("a.md", markdown).unwrap();
        let blocks = extract_with_propagation(&doc);

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].code, "[package]");
        assert_eq!(blocks[1].code, "{}");
        assert_eq!(blocks[2].code, "[package]\n\nname = \"x\"");
        assert_eq!(blocks[2].index, 2);
    }
}
