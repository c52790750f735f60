use crate::document::{Block, CodeBlock, Document, Metadata};
use crate::error::{LoadError, ParseError};
use crate::extractor::parse_fence_info;
use pulldown_cmark::{CodeBlockKind, Event, Parser, Tag, TagEnd};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Reads and parses a document from disk.
pub fn load_document(path: &Path) -> Result<Document, LoadError> {
    let raw = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_document(path, &raw).map_err(|source| LoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses raw file content into a [`Document`].
///
/// The content may start with a YAML front matter block delimited by `---`
/// lines. The rest is split into prose and fenced code blocks, including
/// fences nested in list items and block quotes. A prose block is emitted
/// before every code block even when no lines precede it, and after the last
/// code block only if any lines remain.
///
/// # Errors
///
/// - [`ParseError::UnterminatedMetadata`] if the front matter is never closed
/// - [`ParseError::MalformedMetadata`] if the front matter is not a YAML
///   mapping of scalars and lists of scalars
/// - [`ParseError::UnterminatedBlock`] if a fence is never closed
pub fn parse_document(path: impl Into<PathBuf>, raw: &str) -> Result<Document, ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);
    let text = raw.replace("\r\n", "\n");

    let (metadata, body_offset, body_line) = match split_front_matter(&text)? {
        Some(front) => (parse_metadata(front.yaml)?, front.body_offset, front.body_line),
        None => (Metadata::default(), 0, 0),
    };
    let blocks = parse_body(&text[body_offset..], body_line)?;

    Ok(Document::new(path.into(), metadata, blocks))
}

/// Location of the front matter and of the body that follows it.
struct FrontMatter<'a> {
    yaml: &'a str,
    /// Byte offset of the first body line
    body_offset: usize,
    /// Number of lines before the body
    body_line: usize,
}

fn split_front_matter(text: &str) -> Result<Option<FrontMatter<'_>>, ParseError> {
    let mut lines = text.split_inclusive('\n');
    let yaml_start = match lines.next() {
        Some(first) if first.trim_end() == "---" => first.len(),
        _ => return Ok(None),
    };

    let mut offset = yaml_start;
    for (idx, line) in lines.enumerate() {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Ok(Some(FrontMatter {
                yaml: &text[yaml_start..offset],
                body_offset: offset + line.len(),
                body_line: idx + 2,
            }));
        }
        offset += line.len();
    }

    Err(ParseError::UnterminatedMetadata { line: 1 })
}

/// Parses the front matter into ordered string values.
///
/// Scalars keep their text (`null` becomes empty). A list of scalars is
/// stored as its items joined by `\n`. Nested mappings are rejected.
fn parse_metadata(yaml: &str) -> Result<Metadata, ParseError> {
    let mut metadata = Metadata::default();
    let blank = yaml.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    });
    if blank {
        return Ok(metadata);
    }

    let mapping = match serde_yaml::from_str::<Value>(yaml) {
        Ok(Value::Mapping(mapping)) => mapping,
        Ok(Value::Null) => return Ok(metadata),
        Ok(_) => return Err(malformed(yaml, 1, "front matter must be a mapping")),
        Err(err) => {
            let line = err.location().map_or(1, |loc| loc.line());
            return Err(malformed(yaml, line, &err.to_string()));
        }
    };

    for (key, value) in &mapping {
        let key = scalar_text(key)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| malformed(yaml, 1, "keys must be non-empty scalars"))?;
        let value = metadata_value(value).ok_or_else(|| {
            malformed(yaml, key_line(yaml, &key), "nested mappings are not supported")
        })?;
        metadata.insert(key, value);
    }

    Ok(metadata)
}

/// Builds a [`ParseError::MalformedMetadata`] for a 1-based line of the
/// front matter text. The opening marker is line 1 of the file.
fn malformed(yaml: &str, yaml_line: usize, reason: &str) -> ParseError {
    let yaml_line = yaml_line.max(1);
    ParseError::MalformedMetadata {
        line: yaml_line + 1,
        text: yaml
            .lines()
            .nth(yaml_line - 1)
            .unwrap_or_default()
            .trim_end()
            .to_string(),
        reason: reason.to_string(),
    }
}

/// 1-based front matter line holding `key`, or 1 if it is written in a
/// form that can't be found by prefix.
fn key_line(yaml: &str, key: &str) -> usize {
    yaml.lines()
        .position(|l| {
            l.strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with(':'))
        })
        .map_or(1, |idx| idx + 1)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.trim_end_matches('\n').to_string()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}

fn metadata_value(value: &Value) -> Option<String> {
    match value {
        Value::Sequence(items) => items
            .iter()
            .map(scalar_text)
            .collect::<Option<Vec<_>>>()
            .map(|items| items.join("\n")),
        other => scalar_text(other),
    }
}

/// Splits the body into prose and code blocks.
///
/// Fences are found by the CommonMark parser. It closes a fence left open at
/// the end of its container silently, so each fenced range is checked for a
/// closing fence line of its own.
fn parse_body(body: &str, line_offset: usize) -> Result<Vec<Block>, ParseError> {
    let mut blocks = Vec::new();
    let mut prose_start = 0;
    let mut current: Option<CodeBlock> = None;

    for (event, range) in Parser::new(body).into_offset_iter() {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let start = line_start(body, range.start);
                blocks.push(Block::Prose(prose_text(&body[prose_start..start])));

                let (language, attributes) = parse_fence_info(&info);
                let line = line_offset + body[..range.start].matches('\n').count() + 1;
                let fenced = &body[range.clone()];
                if !is_closed(fenced) {
                    return Err(ParseError::UnterminatedBlock {
                        line,
                        fence: opening_fence(fenced),
                        language,
                    });
                }

                prose_start = line_end(body, range.end);
                current = Some(CodeBlock {
                    language,
                    attributes,
                    source: String::new(),
                    line,
                });
            }
            Event::Text(text) => {
                if let Some(block) = current.as_mut() {
                    block.source.push_str(&text);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    if block.source.ends_with('\n') {
                        block.source.pop();
                    }
                    blocks.push(Block::Code(block));
                }
            }
            _ => {}
        }
    }

    if prose_start < body.len() {
        blocks.push(Block::Prose(prose_text(&body[prose_start..])));
    }

    Ok(blocks)
}

fn prose_text(text: &str) -> String {
    text.strip_suffix('\n').unwrap_or(text).to_string()
}

/// Byte offset of the start of the line containing `pos`.
fn line_start(text: &str, pos: usize) -> usize {
    text[..pos].rfind('\n').map_or(0, |idx| idx + 1)
}

/// Byte offset just past the line that `end` falls in.
fn line_end(text: &str, end: usize) -> usize {
    if end == 0 || text[..end].ends_with('\n') {
        return end;
    }
    text[end..].find('\n').map_or(text.len(), |idx| end + idx + 1)
}

/// Marker character and length of the fence opening `line`.
fn fence_run(line: &str) -> Option<(char, usize)> {
    let pos = line.find(|c: char| c == '`' || c == '~')?;
    let rest = &line[pos..];
    let marker = rest.chars().next()?;
    Some((marker, rest.chars().take_while(|c| *c == marker).count()))
}

fn opening_fence(fenced: &str) -> String {
    fenced
        .lines()
        .next()
        .and_then(fence_run)
        .map_or_else(|| "```".to_string(), |(marker, len)| marker.to_string().repeat(len))
}

/// Whether the last line of a fenced range is a closing fence at least as
/// long as the opening one. Block quote markers and indentation are ignored.
fn is_closed(fenced: &str) -> bool {
    let mut lines = fenced.trim_end_matches('\n').lines();
    let (Some(first), Some(last)) = (lines.next(), lines.last()) else {
        return false;
    };
    let Some((marker, len)) = fence_run(first) else {
        return false;
    };
    let rest = last.trim_start_matches(|c: char| c == '>' || c.is_whitespace());
    let run = rest.chars().take_while(|c| *c == marker).count();
    run >= len && rest[run..].trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn code(block: &Block) -> &CodeBlock {
        match block {
            Block::Code(c) => c,
            other => panic!("Expected code block, got {:?}", other),
        }
    }

    /// Block sequence without source line numbers, which shift when empty
    /// prose is written back out.
    fn shape(doc: &Document) -> Vec<String> {
        doc.body()
            .iter()
            .map(|b| match b {
                Block::Prose(text) => format!("prose:{}", text),
                Block::Code(c) => format!("code:{}:{}", c.info_string(), c.source),
            })
            .collect()
    }

    #[test]
    fn test_front_matter_and_single_block() {
        let raw = "---\nlang: python\n---\n```python\nprint(1)\n```\n";
        let doc = parse_document("a.md", raw).unwrap();

        assert_eq!(doc.metadata().get("lang"), Some("python"));
        assert_eq!(doc.body().len(), 2);
        assert_eq!(doc.body()[0], Block::Prose(String::new()));
        let block = code(&doc.body()[1]);
        assert_eq!(block.language, "python");
        assert_eq!(block.source, "print(1)");
        assert_eq!(block.line, 4);
    }

    #[test]
    fn test_known_and_unknown_keys() {
        let raw = r#"---
section: getting-started
layout: getting_started
title: "Keyword lists and maps"
redirect_from:
  - /getting-started/maps-and-dicts.html
  - /getting-started/maps.html
difficulty: 'easy'
---

Associative data structures.
"#;
        let doc = parse_document("maps.md", raw).unwrap();

        assert_eq!(doc.section(), Some("getting-started"));
        assert_eq!(doc.layout(), Some("getting_started"));
        assert_eq!(doc.title(), Some("Keyword lists and maps"));
        assert_eq!(
            doc.redirects(),
            vec![
                "/getting-started/maps-and-dicts.html",
                "/getting-started/maps.html"
            ]
        );
        assert_eq!(doc.metadata().get("difficulty"), Some("easy"));
        assert_eq!(
            doc.metadata().keys().collect::<Vec<_>>(),
            vec!["section", "layout", "title", "redirect_from", "difficulty"]
        );
        assert_eq!(
            doc.body(),
            &[Block::Prose("\nAssociative data structures.".to_string())]
        );
    }

    #[test]
    fn test_no_front_matter() {
        let raw = "lang: python\n```python\nprint(1)\n```\n";
        let doc = parse_document("a.md", raw).unwrap();

        assert!(doc.metadata().is_empty());
        assert_eq!(doc.body()[0], Block::Prose("lang: python".to_string()));
        assert_eq!(doc.code_blocks().count(), 1);
    }

    #[test]
    fn test_unterminated_front_matter() {
        let err = parse_document("a.md", "---\ntitle: Maps\nlayout: page\n").unwrap_err();
        assert_eq!(err, ParseError::UnterminatedMetadata { line: 1 });
    }

    #[test]
    fn test_yaml_scalars_are_decoded() {
        let raw = r#"---
title: "Keyword \"lists\""
section: getting-started # draft
note: 'It''s'
summary: >
  folded text
order: 3
draft: false
tags: [maps, keyword-lists]
---
"#;
        let doc = parse_document("a.md", raw).unwrap();
        let metadata = doc.metadata();

        assert_eq!(doc.title(), Some("Keyword \"lists\""));
        assert_eq!(doc.section(), Some("getting-started"));
        assert_eq!(metadata.get("note"), Some("It's"));
        assert_eq!(metadata.get("summary"), Some("folded text"));
        assert_eq!(metadata.get("order"), Some("3"));
        assert_eq!(metadata.get("draft"), Some("false"));
        assert_eq!(metadata.get("tags"), Some("maps\nkeyword-lists"));
        assert_eq!(
            metadata.keys().collect::<Vec<_>>(),
            vec!["title", "section", "note", "summary", "order", "draft", "tags"]
        );
    }

    #[test]
    fn test_comment_only_front_matter() {
        let doc = parse_document("a.md", "---\n# nothing yet\n---\nBody\n").unwrap();
        assert!(doc.metadata().is_empty());
        assert_eq!(doc.body(), &[Block::Prose("Body".to_string())]);
    }

    #[test]
    fn test_malformed_front_matter() {
        let err = parse_document("a.md", "---\ntitle: Maps\nauthor:\n  name: Jo\n---\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::MalformedMetadata {
                line: 3,
                text: "author:".to_string(),
                reason: "nested mappings are not supported".to_string(),
            }
        );

        let err = parse_document("a.md", "---\n- a\n- b\n---\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedMetadata { line: 2, .. }));

        let err = parse_document("a.md", "---\ntitle: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedMetadata { .. }));
    }

    #[test]
    fn test_unterminated_block() {
        let raw = "---\ntitle: Maps\n---\nText\n\n```elixir\nmap = %{}\n";
        let err = parse_document("a.md", raw).unwrap_err();
        assert_eq!(
            err,
            ParseError::UnterminatedBlock {
                line: 6,
                fence: "```".to_string(),
                language: "elixir".to_string(),
            }
        );
    }

    #[test]
    fn test_fence_variants() {
        let raw = "~~~ruby\nputs 1\n```\nstill ruby\n~~~\n\n````md\n```elixir\ninner\n```\n````\n  ```\n  indented\n    deeper\n  ```\n";
        let doc = parse_document("a.md", raw).unwrap();
        let blocks: Vec<_> = doc.code_blocks().collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].language, "ruby");
        assert_eq!(blocks[0].source, "puts 1\n```\nstill ruby");
        assert_eq!(blocks[1].language, "md");
        assert_eq!(blocks[1].source, "```elixir\ninner\n```");
        assert_eq!(blocks[2].language, "");
        assert_eq!(blocks[2].source, "indented\n  deeper");
    }

    #[test]
    fn test_fences_in_lists_and_quotes() {
        let raw = r#"Steps:

1. Start iex:

   ```elixir
   iex> 1 + 1
   ```

> ```json
> {"a": 1}
> ```

```toml
a = 1
```
"#;
        let doc = parse_document("a.md", raw).unwrap();
        let blocks: Vec<_> = doc.code_blocks().collect();

        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks.iter().map(|b| b.language.as_str()).collect::<Vec<_>>(),
            vec!["elixir", "json", "toml"]
        );
        assert_eq!(blocks[0].source, "iex> 1 + 1");
        assert_eq!(blocks[1].source, "{\"a\": 1}");
        assert_eq!(blocks[2].source, "a = 1");
        assert_eq!(
            blocks.iter().map(|b| b.line).collect::<Vec<_>>(),
            vec![5, 9, 13]
        );
    }

    #[test]
    fn test_unterminated_block_in_quote() {
        let err = parse_document("a.md", "> ```json\n> {}\n\nafter\n").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnterminatedBlock {
                line: 1,
                fence: "```".to_string(),
                language: "json".to_string(),
            }
        );
    }

    #[test]
    fn test_indented_code_is_prose() {
        let raw = "Text\n\n    not fenced\n";
        let doc = parse_document("a.md", raw).unwrap();
        assert_eq!(doc.code_blocks().count(), 0);
        assert_eq!(doc.body(), &[Block::Prose("Text\n\n    not fenced".to_string())]);
    }

    #[test]
    fn test_prose_between_blocks_is_kept_in_order() {
        let raw = "Intro\n```json\n{}\n```\n```toml\na = 1\n```\nMiddle\n```json\n[]\n```\nOutro\n";
        let doc = parse_document("a.md", raw).unwrap();

        let kinds: Vec<String> = doc
            .body()
            .iter()
            .map(|b| match b {
                Block::Prose(text) => format!("prose:{}", text),
                Block::Code(c) => format!("code:{}", c.language),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                "prose:Intro",
                "code:json",
                "prose:",
                "code:toml",
                "prose:Middle",
                "code:json",
                "prose:Outro"
            ]
        );
    }

    #[test]
    fn test_crlf_and_bom() {
        let raw = "\u{feff}---\r\ntitle: Maps\r\n---\r\n```json\r\n{}\r\n```\r\n";
        let doc = parse_document("a.md", raw).unwrap();
        assert_eq!(doc.title(), Some("Maps"));
        assert_eq!(doc.code_blocks().next().map(|b| b.source.as_str()), Some("{}"));
    }

    #[test]
    fn test_to_source_round_trip() {
        let raw = r#"---
title: Maps
redirect_from:
  - /a/
  - /b/
extra: "  spaced  "
---
Some prose

```elixir,propagate
defmodule A do
end
```

```
untagged
```
Outro
"#;
        let doc = parse_document("a.md", raw).unwrap();
        let reparsed = parse_document("a.md", &doc.to_source()).unwrap();
        assert_eq!(doc.metadata(), reparsed.metadata());
        assert_eq!(shape(&doc), shape(&reparsed));
    }

    #[test]
    fn test_to_source_protects_leading_marker() {
        let doc = Document::new(
            PathBuf::from("a.md"),
            Metadata::default(),
            vec![Block::Prose("---\nnot front matter".to_string())],
        );
        let reparsed = parse_document("a.md", &doc.to_source()).unwrap();
        assert!(reparsed.metadata().is_empty());
        assert_eq!(reparsed.body(), doc.body());
    }

    fn arb_metadata_value() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9/ _.-]{0,15}"
    }

    fn arb_block() -> impl Strategy<Value = (bool, String)> {
        prop_oneof![
            "[a-zA-Z ,.!?]{0,30}".prop_map(|s| (false, s)),
            "[a-z]{1,8}\n[a-z0-9 =(){}]{0,20}".prop_map(|s| (true, s)),
        ]
    }

    proptest! {
        #[test]
        fn prop_round_trip_preserves_keys_and_blocks(
            values in prop::collection::vec(arb_metadata_value(), 0..4),
            parts in prop::collection::vec(arb_block(), 0..6),
        ) {
            let mut raw = String::new();
            if !values.is_empty() {
                raw.push_str("---\n");
                for (i, value) in values.iter().enumerate() {
                    raw.push_str(&format!("key{}: {}\n", i, value));
                }
                raw.push_str("---\n");
            }
            let mut fenced = 0;
            for (is_code, text) in &parts {
                if *is_code {
                    let (lang, src) = text.split_once('\n').unwrap();
                    raw.push_str(&format!("```{}\n{}\n```\n", lang, src));
                    fenced += 1;
                } else {
                    raw.push_str(text);
                    raw.push('\n');
                }
            }

            let doc = parse_document("p.md", &raw).unwrap();
            prop_assert_eq!(doc.code_blocks().count(), fenced);

            let reparsed = parse_document("p.md", &doc.to_source()).unwrap();
            prop_assert_eq!(
                doc.metadata().keys().collect::<Vec<_>>(),
                reparsed.metadata().keys().collect::<Vec<_>>()
            );
            prop_assert_eq!(shape(&doc), shape(&reparsed));
        }
    }
}
