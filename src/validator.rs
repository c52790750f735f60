use crate::checker::CheckerRegistry;
use crate::document::Document;
use crate::error::SyntaxError;
use crate::extractor::extract_with_propagation;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;

/// Maximum size of a single code block in bytes (1MB)
pub const MAX_CODE_BLOCK_SIZE: usize = 1_000_000;

/// Result of checking one code block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed(SyntaxError),
}

/// Report entry for a code block that had a checker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockReport {
    pub block_index: usize,
    pub language: String,
    pub line: usize,
    pub outcome: Outcome,
}

/// Per-document validation report.
///
/// Only blocks that were actually checked get an entry; blocks without a
/// registered checker or marked `ignore` are counted in `skipped`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub path: PathBuf,
    pub entries: Vec<BlockReport>,
    pub skipped: usize,
}

impl ValidationReport {
    pub fn failures(&self) -> impl Iterator<Item = &SyntaxError> {
        self.entries.iter().filter_map(|entry| match &entry.outcome {
            Outcome::Failed(err) => Some(err),
            Outcome::Passed => None,
        })
    }

    pub fn passed(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome == Outcome::Passed)
            .count()
    }

    pub fn is_ok(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Checks the code blocks of a document against a [`CheckerRegistry`].
///
/// Validation never executes snippets as part of the run and never stops
/// early: every block with a checker gets an entry, in source order.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    registry: CheckerRegistry,
}

impl Validator {
    pub fn new(registry: CheckerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CheckerRegistry {
        &self.registry
    }

    pub fn validate(&self, document: &Document) -> ValidationReport {
        let total = document.code_blocks().count();
        let mut entries = Vec::new();

        for extracted in extract_with_propagation(document) {
            let block = extracted.block;
            let Some(checker) = self.registry.get(&block.language) else {
                log::debug!(
                    "No checker for '{}' block #{} in {}, skipping",
                    block.language,
                    extracted.index,
                    document.path().display()
                );
                continue;
            };

            let failure = |message: String| {
                Outcome::Failed(SyntaxError {
                    path: document.path().to_path_buf(),
                    block_index: extracted.index,
                    language: block.language.clone(),
                    line: block.line,
                    message,
                    code: extracted.code.clone(),
                })
            };

            let outcome = if extracted.code.len() > MAX_CODE_BLOCK_SIZE {
                failure(format!(
                    "Code block exceeds size limit of {} bytes ({} bytes)",
                    MAX_CODE_BLOCK_SIZE,
                    extracted.code.len()
                ))
            } else {
                let start = Instant::now();
                let result = checker.check(&extracted.code);
                log::debug!(
                    "[SNIPPET_CHECK_TIME] [{}] {} block #{}: {}ms",
                    checker.name(),
                    document.path().display(),
                    extracted.index,
                    start.elapsed().as_millis()
                );
                match result {
                    Ok(()) => Outcome::Passed,
                    Err(message) => failure(message),
                }
            };

            entries.push(BlockReport {
                block_index: extracted.index,
                language: block.language.clone(),
                line: block.line,
                outcome,
            });
        }

        ValidationReport {
            path: document.path().to_path_buf(),
            skipped: total - entries.len(),
            entries,
        }
    }
}
