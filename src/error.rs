//! Error types for loading documents and checking their code blocks.

use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while parsing the raw text of a single document.
///
/// Line numbers are 1-based and refer to the original file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The front matter was opened with `---` but never closed
    #[error("front matter opened at line {line} is never closed")]
    UnterminatedMetadata { line: usize },

    /// The front matter is not a mapping of scalars and lists of scalars
    #[error("malformed front matter at line {line}: {reason}")]
    MalformedMetadata {
        line: usize,
        text: String,
        reason: String,
    },

    /// A fenced code block was opened but never closed
    #[error("code fence {fence}{language} opened at line {line} is never closed")]
    UnterminatedBlock {
        line: usize,
        fence: String,
        language: String,
    },
}

/// A document that could not be loaded.
///
/// Both variants carry the path so a multi-document run can report which
/// file failed and move on.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

impl LoadError {
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. } | LoadError::Parse { path, .. } => path,
        }
    }
}

/// A code block rejected by its syntax checker.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{language} block #{block_index} at {}:{line}: {message}", .path.display())]
pub struct SyntaxError {
    pub path: PathBuf,
    /// Ordinal of the block among the document's code blocks, starting at 0
    pub block_index: usize,
    pub language: String,
    /// Line of the opening fence
    pub line: usize,
    pub message: String,
    /// Source handed to the checker, including propagated code
    #[serde(skip)]
    pub code: String,
}
