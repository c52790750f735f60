use crate::config::{BuiltinChecker, LanguageConfig, SnipcheckConfig};
use crate::language::get_language_metadata;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::process::Command;
use std::sync::Arc;

/// A syntax check for one language.
///
/// Implementations must not have observable side effects beyond scratch
/// files they clean up themselves, so checking the same source twice gives
/// the same answer.
pub trait SyntaxChecker: Send + Sync {
    /// Name used in reports (e.g. "json", "python")
    fn name(&self) -> &str;

    /// Returns a human-readable message if `source` is not well-formed.
    fn check(&self, source: &str) -> Result<(), String>;
}

/// Checks that a snippet parses as JSON.
pub struct JsonChecker;

impl SyntaxChecker for JsonChecker {
    fn name(&self) -> &str {
        "json"
    }

    fn check(&self, source: &str) -> Result<(), String> {
        serde_json::from_str::<serde_json::Value>(source)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Checks that a snippet parses as a TOML document.
pub struct TomlChecker;

impl SyntaxChecker for TomlChecker {
    fn name(&self) -> &str {
        "toml"
    }

    fn check(&self, source: &str) -> Result<(), String> {
        toml::from_str::<toml::Table>(source)
            .map(|_| ())
            .map_err(|e| e.to_string().trim_end().to_string())
    }
}

/// Checks snippets by running an external command on them.
///
/// The snippet (with the optional preamble) is written to a temporary file
/// carrying the language's file extension, and the command is invoked as
/// `command [flags...] <file>`. A non-zero exit status is a syntax error.
pub struct CommandChecker {
    name: String,
    command: String,
    flags: Vec<String>,
    preamble: Option<String>,
    file_extension: String,
}

impl CommandChecker {
    pub fn new(name: impl Into<String>, command: impl Into<String>, flags: Vec<String>) -> Self {
        let name = name.into();
        let file_extension = get_language_metadata(&name).file_extension.into_owned();
        Self {
            name,
            command: command.into(),
            flags,
            preamble: None,
            file_extension,
        }
    }

    pub fn with_preamble(mut self, preamble: Option<String>) -> Self {
        self.preamble = preamble;
        self
    }

    fn write_source_file(&self, source: &str) -> std::io::Result<tempfile::NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("snipcheck-")
            .suffix(&self.file_extension)
            .tempfile()?;

        if let Some(ref preamble) = self.preamble {
            file.write_all(preamble.as_bytes())?;
            file.write_all(b"\n\n")?;
        }
        file.write_all(source.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

impl SyntaxChecker for CommandChecker {
    fn name(&self) -> &str {
        &self.name
    }

    fn check(&self, source: &str) -> Result<(), String> {
        let file = self
            .write_source_file(source)
            .map_err(|e| format!("Failed to create temporary file: {}", e))?;

        let output = Command::new(&self.command)
            .args(&self.flags)
            .arg(file.path())
            .output()
            .map_err(|e| {
                format!(
                    "Failed to execute '{}' for language '{}': {}\nFlags: {:?}",
                    self.command, self.name, e, self.flags
                )
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if !stderr.trim().is_empty() {
            stderr
        } else {
            stdout
        };
        Err(format!(
            "{} exited with {}\n{}",
            self.command,
            output.status,
            message.trim_end()
        ))
    }
}

/// Syntax checkers keyed by fence marker.
///
/// Blocks whose language tag has no registered checker are skipped by the
/// validator.
///
/// # Example
///
/// ```
/// use snipcheck::{CheckerRegistry, SnipcheckConfig};
///
/// let registry = CheckerRegistry::from_config(&SnipcheckConfig::default());
/// assert!(registry.get("json").is_some());
/// assert!(registry.get("elixir").is_none());
/// ```
#[derive(Clone, Default)]
pub struct CheckerRegistry {
    checkers: HashMap<String, Arc<dyn SyntaxChecker>>,
}

impl CheckerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry from every enabled language in the configuration.
    ///
    /// Languages are registered in name order; when two languages claim the
    /// same fence marker the first one keeps it.
    pub fn from_config(config: &SnipcheckConfig) -> Self {
        let mut registry = Self::new();

        for (name, lang_config) in &config.languages {
            if !lang_config.enabled {
                log::debug!("Language '{}' is disabled", name);
                continue;
            }
            let Some(checker) = build_checker(name, lang_config) else {
                continue;
            };
            for marker in lang_config.get_fence_markers(name) {
                if registry.checkers.contains_key(&marker) {
                    log::warn!(
                        "Fence marker '{}' of language '{}' is already registered, ignoring",
                        marker,
                        name
                    );
                    continue;
                }
                registry.checkers.insert(marker, Arc::clone(&checker));
            }
        }

        registry
    }

    /// Registers a checker for a fence marker, replacing any previous one.
    pub fn register(&mut self, marker: impl Into<String>, checker: Arc<dyn SyntaxChecker>) {
        self.checkers.insert(marker.into(), checker);
    }

    pub fn get(&self, marker: &str) -> Option<&Arc<dyn SyntaxChecker>> {
        self.checkers.get(marker)
    }

    pub fn len(&self) -> usize {
        self.checkers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkers.is_empty()
    }
}

impl fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut markers: Vec<_> = self
            .checkers
            .iter()
            .map(|(marker, checker)| (marker.as_str(), checker.name()))
            .collect();
        markers.sort();
        f.debug_struct("CheckerRegistry")
            .field("checkers", &markers)
            .finish()
    }
}

fn build_checker(name: &str, config: &LanguageConfig) -> Option<Arc<dyn SyntaxChecker>> {
    match (&config.builtin, &config.command) {
        (Some(BuiltinChecker::Json), _) => Some(Arc::new(JsonChecker)),
        (Some(BuiltinChecker::Toml), _) => Some(Arc::new(TomlChecker)),
        (None, Some(command)) => Some(Arc::new(
            CommandChecker::new(name, command.clone(), config.flags.clone())
                .with_preamble(config.preamble.clone()),
        )),
        (None, None) => None,
    }
}
