use crate::language::get_language_metadata;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

/// Default name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "snipcheck.toml";

/// Configuration for snipcheck, read from `snipcheck.toml`.
///
/// When the `languages` table is absent the built-in `json` and `toml`
/// checkers are enabled.
///
/// # Example
///
/// ```toml
/// [check]
/// extensions = ["md"]
/// jobs = 4
///
/// [languages.json]
/// builtin = "json"
///
/// [languages.python]
/// command = "python3"
/// flags = ["-m", "py_compile"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnipcheckConfig {
    pub check: CheckSettings,

    /// Language-specific configurations indexed by language name
    pub languages: BTreeMap<String, LanguageConfig>,
}

impl Default for SnipcheckConfig {
    fn default() -> Self {
        let mut languages = BTreeMap::new();
        languages.insert("json".to_string(), LanguageConfig::builtin(BuiltinChecker::Json));
        languages.insert("toml".to_string(), LanguageConfig::builtin(BuiltinChecker::Toml));
        Self {
            check: CheckSettings::default(),
            languages,
        }
    }
}

/// Settings for discovering and checking documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckSettings {
    /// File extensions picked up when walking directories
    pub extensions: Vec<String>,

    /// Maximum number of documents checked concurrently
    pub jobs: Option<usize>,
}

impl Default for CheckSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["md".to_string(), "markdown".to_string()],
            jobs: None,
        }
    }
}

/// Checkers implemented in-process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinChecker {
    Json,
    Toml,
}

/// Configuration for a specific language.
///
/// A language is checked either by a built-in checker or by an external
/// command, never both. `command` and `flags` support `${VAR_NAME}`
/// environment variable expansion.
///
/// # Security
///
/// Command paths are validated to prevent command injection. Paths cannot
/// contain shell metacharacters or use parent directory traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageConfig {
    /// Whether this language is enabled for checking
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub builtin: Option<BuiltinChecker>,

    /// External checker executable
    #[serde(default)]
    pub command: Option<String>,

    /// Arguments passed before the snippet file
    #[serde(default)]
    pub flags: Vec<String>,

    /// Optional preamble written before every snippet (commands only)
    #[serde(default)]
    pub preamble: Option<String>,

    /// Fence markers that identify this language. Defaults to the known
    /// aliases of the language name.
    #[serde(default)]
    pub fence_markers: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl LanguageConfig {
    pub fn builtin(checker: BuiltinChecker) -> Self {
        Self {
            enabled: true,
            builtin: Some(checker),
            command: None,
            flags: Vec::new(),
            preamble: None,
            fence_markers: None,
        }
    }

    /// Fence markers for this language, falling back to the known aliases.
    pub fn get_fence_markers(&self, lang_name: &str) -> Vec<String> {
        match &self.fence_markers {
            Some(markers) => markers.clone(),
            None => get_language_metadata(lang_name).fence_markers,
        }
    }

    /// Validate the configuration for security and correctness
    pub fn validate(&self) -> Result<()> {
        match (&self.builtin, &self.command) {
            (Some(_), Some(_)) => {
                anyhow::bail!("Language configuration cannot set both 'builtin' and 'command'")
            }
            (None, None) => {
                anyhow::bail!("Language configuration must set either 'builtin' or 'command'")
            }
            (Some(_), None) => {
                if !self.flags.is_empty() || self.preamble.is_some() {
                    anyhow::bail!("'flags' and 'preamble' only apply to 'command' checkers");
                }
            }
            (None, Some(command)) => validate_command(command)?,
        }

        if matches!(&self.fence_markers, Some(markers) if markers.is_empty()) {
            anyhow::bail!("Language configuration must have at least one fence marker");
        }

        Ok(())
    }
}

fn validate_command(command: &str) -> Result<()> {
    if command.is_empty() {
        anyhow::bail!("Command path cannot be empty");
    }

    // Ensure the command doesn't contain shell metacharacters
    let dangerous_chars = [';', '|', '&', '`', '\n', '\r'];
    for ch in dangerous_chars {
        if command.contains(ch) {
            anyhow::bail!(
                "Command path contains invalid character '{}': {}",
                ch.escape_default(),
                command
            );
        }
    }

    for component in Path::new(command).components() {
        if matches!(component, std::path::Component::ParentDir) {
            anyhow::bail!("Command path cannot contain '..': {}", command);
        }
    }

    Ok(())
}

impl SnipcheckConfig {
    /// Parse configuration from TOML, expanding environment variables and
    /// validating every language.
    pub fn parse(content: &str) -> Result<Self> {
        let mut config: SnipcheckConfig =
            toml::from_str(content).context("Failed to parse configuration")?;

        for (name, lang_config) in config.languages.iter_mut() {
            if let Some(command) = lang_config.command.as_mut() {
                *command = expand_env_vars(command);
            }
            for flag in lang_config.flags.iter_mut() {
                *flag = expand_env_vars(flag);
            }

            lang_config
                .validate()
                .with_context(|| format!("Invalid configuration for language '{}'", name))?;
        }

        if config.check.jobs == Some(0) {
            anyhow::bail!("'check.jobs' must be at least 1");
        }

        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Whether any enabled language runs an external command.
    pub fn has_commands(&self) -> bool {
        self.languages
            .values()
            .any(|lang| lang.enabled && lang.command.is_some())
    }

    /// Concurrency limit, defaulting to the number of CPUs.
    pub fn jobs(&self) -> usize {
        self.check.jobs.unwrap_or_else(num_cpus::get).max(1)
    }
}

/// Expand environment variables in a string
/// Supports ${VAR_NAME} syntax
/// Single pass, so expanded values are never expanded again
fn expand_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '$' || chars.peek() != Some(&'{') {
            result.push(ch);
            continue;
        }
        chars.next(); // consume '{'

        let mut var_name = String::new();
        let mut found_close = false;
        for ch in chars.by_ref() {
            if ch == '}' {
                found_close = true;
                break;
            }
            var_name.push(ch);
        }

        if !found_close {
            result.push_str("${");
            result.push_str(&var_name);
            continue;
        }

        match env::var(&var_name) {
            Ok(value) => result.push_str(&value),
            Err(_) => {
                log::warn!(
                    "Environment variable '{}' not found, leaving unexpanded",
                    var_name
                );
                result.push_str("${");
                result.push_str(&var_name);
                result.push('}');
            }
        }
    }

    result
}
