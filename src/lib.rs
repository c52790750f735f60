//! snipcheck library
//!
//! Loads documentation pages (front matter followed by prose and fenced code
//! blocks) and checks the syntax of their code blocks. The primary interface
//! is the `snipcheck` binary, but the library can be used programmatically
//! for testing or custom integrations.
//!
//! ## Public API
//!
//! - [`parse_document`] / [`load_document`] - build a [`Document`]
//! - [`Document::code_blocks`] - iterate its code blocks in order
//! - [`Validator`] - check blocks with the [`SyntaxChecker`]s of a
//!   [`CheckerRegistry`]
//! - [`check_files`] - load and validate many files concurrently
//!
//! ```
//! use snipcheck::{parse_document, CheckerRegistry, SnipcheckConfig, Validator};
//!
//! let doc = parse_document("page.md", "---\ntitle: Data\n---\n```json\n{\"a\": 1}\n```\n")?;
//! assert_eq!(doc.title(), Some("Data"));
//!
//! let validator = Validator::new(CheckerRegistry::from_config(&SnipcheckConfig::default()));
//! assert!(validator.validate(&doc).is_ok());
//! # Ok::<(), snipcheck::ParseError>(())
//! ```

pub mod approval;
mod checker;
mod config;
mod corpus;
mod document;
mod error;
mod extractor;
mod language;
mod loader;
pub mod reporting;
mod validator;

pub use checker::{CheckerRegistry, CommandChecker, JsonChecker, SyntaxChecker, TomlChecker};
pub use config::{
    BuiltinChecker, CheckSettings, LanguageConfig, SnipcheckConfig, CONFIG_FILE_NAME,
};
pub use corpus::{check_files, discover, DocumentResult, RunSummary};
pub use document::{Block, CodeBlock, Document, Metadata, KNOWN_KEYS};
pub use error::{LoadError, ParseError, SyntaxError};
pub use extractor::{extract_with_propagation, parse_fence_info, CodeBlocks, ExtractedBlock};
pub use language::{get_language_metadata, LanguageMetadata};
pub use loader::{load_document, parse_document};
pub use validator::{BlockReport, Outcome, ValidationReport, Validator, MAX_CODE_BLOCK_SIZE};
