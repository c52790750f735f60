use std::borrow::Cow;

/// Fence markers and file extension for a language.
///
/// Uses `Cow<'static, str>` for the file extension so known languages don't
/// allocate while unknown ones still get a derived extension.
#[derive(Debug, Clone)]
pub struct LanguageMetadata {
    pub fence_markers: Vec<String>,
    pub file_extension: Cow<'static, str>,
}

/// Get language metadata (fence markers and file extension) for a language.
///
/// Known languages map to their common highlight.js aliases and their usual
/// file extension. Anything else uses its own name as the only fence marker
/// and as the extension.
///
/// # Examples
///
/// ```
/// use snipcheck::get_language_metadata;
///
/// let metadata = get_language_metadata("elixir");
/// assert_eq!(metadata.fence_markers, vec!["elixir", "ex", "exs"]);
/// assert_eq!(metadata.file_extension, ".exs");
///
/// let metadata = get_language_metadata("gleam");
/// assert_eq!(metadata.fence_markers, vec!["gleam"]);
/// assert_eq!(metadata.file_extension, ".gleam");
/// ```
pub fn get_language_metadata(lang_name: &str) -> LanguageMetadata {
    let (markers, ext): (Vec<&str>, &'static str) = match lang_name {
        "bash" => (vec!["bash", "sh", "zsh"], ".sh"),
        "c" => (vec!["c", "h"], ".c"),
        "clojure" => (vec!["clojure", "clj"], ".clj"),
        "cpp" => (vec!["cpp", "hpp", "cc", "c++", "cxx"], ".cpp"),
        "csharp" => (vec!["csharp", "cs"], ".cs"),
        "elixir" => (vec!["elixir", "ex", "exs"], ".exs"),
        "erlang" => (vec!["erlang", "erl"], ".erl"),
        "go" => (vec!["go", "golang"], ".go"),
        "haskell" => (vec!["haskell", "hs"], ".hs"),
        "java" => (vec!["java"], ".java"),
        "javascript" => (vec!["javascript", "js", "jsx"], ".js"),
        "json" => (vec!["json", "jsonc"], ".json"),
        "kotlin" => (vec!["kotlin", "kt"], ".kt"),
        "lua" => (vec!["lua"], ".lua"),
        "ocaml" => (vec!["ocaml", "ml"], ".ml"),
        "perl" => (vec!["perl", "pl", "pm"], ".pl"),
        "php" => (vec!["php"], ".php"),
        "python" => (vec!["python", "py"], ".py"),
        "ruby" => (vec!["ruby", "rb"], ".rb"),
        "rust" => (vec!["rust", "rs"], ".rs"),
        "scala" => (vec!["scala"], ".scala"),
        "shell" => (vec!["shell", "console"], ".sh"),
        "sql" => (vec!["sql"], ".sql"),
        "swift" => (vec!["swift"], ".swift"),
        "toml" => (vec!["toml"], ".toml"),
        "typescript" => (vec!["typescript", "ts", "tsx"], ".ts"),
        "xml" => (vec!["xml", "svg"], ".xml"),
        "yaml" => (vec!["yaml", "yml"], ".yaml"),
        _ => {
            return LanguageMetadata {
                fence_markers: vec![lang_name.to_string()],
                file_extension: Cow::Owned(format!(".{}", lang_name)),
            }
        }
    };

    LanguageMetadata {
        fence_markers: markers.iter().map(|s| s.to_string()).collect(),
        file_extension: Cow::Borrowed(ext),
    }
}
