//! Static lookup tables: file extensions, display names, the popular
//! language set used to bias auto-detection, and control icons.

/// Languages tried first during auto-detection, in tie-break order.
///
/// Restricting the first pass to common languages keeps obscure grammars from
/// claiming short snippets.
pub const POPULAR_LANGUAGES: &[&str] = &[
    "python",
    "javascript",
    "typescript",
    "rust",
    "go",
    "java",
    "c",
    "cpp",
    "csharp",
    "ruby",
    "php",
    "bash",
    "sql",
    "html",
    "xml",
    "css",
    "json",
    "yaml",
    "markdown",
    "kotlin",
    "swift",
];

/// Extension → language id.
static EXTENSIONS: &[(&str, &str)] = &[
    ("rs", "rust"),
    ("py", "python"),
    ("pyw", "python"),
    ("js", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("mts", "typescript"),
    ("cts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("java", "java"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("swift", "swift"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("hh", "cpp"),
    ("cs", "csharp"),
    ("rb", "ruby"),
    ("php", "php"),
    ("sh", "bash"),
    ("bash", "bash"),
    ("zsh", "bash"),
    ("ps1", "powershell"),
    ("sql", "sql"),
    ("html", "html"),
    ("htm", "html"),
    ("xml", "xml"),
    ("svg", "xml"),
    ("css", "css"),
    ("scss", "scss"),
    ("less", "less"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("toml", "toml"),
    ("ini", "ini"),
    ("md", "markdown"),
    ("markdown", "markdown"),
    ("lua", "lua"),
    ("pl", "perl"),
    ("r", "r"),
    ("scala", "scala"),
    ("hs", "haskell"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("erl", "erlang"),
    ("clj", "clojure"),
    ("dart", "dart"),
    ("diff", "diff"),
    ("patch", "diff"),
    ("tex", "latex"),
    ("dockerfile", "dockerfile"),
    ("makefile", "makefile"),
    ("txt", "plaintext"),
];

/// Language id → preferred download extension.
static PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("rust", "rs"),
    ("python", "py"),
    ("javascript", "js"),
    ("typescript", "ts"),
    ("go", "go"),
    ("java", "java"),
    ("kotlin", "kt"),
    ("swift", "swift"),
    ("c", "c"),
    ("cpp", "cpp"),
    ("csharp", "cs"),
    ("ruby", "rb"),
    ("php", "php"),
    ("bash", "sh"),
    ("shell", "sh"),
    ("powershell", "ps1"),
    ("sql", "sql"),
    ("html", "html"),
    ("xml", "xml"),
    ("css", "css"),
    ("scss", "scss"),
    ("less", "less"),
    ("json", "json"),
    ("yaml", "yml"),
    ("toml", "toml"),
    ("ini", "ini"),
    ("markdown", "md"),
    ("lua", "lua"),
    ("perl", "pl"),
    ("r", "r"),
    ("scala", "scala"),
    ("haskell", "hs"),
    ("elixir", "ex"),
    ("erlang", "erl"),
    ("clojure", "clj"),
    ("dart", "dart"),
    ("diff", "diff"),
    ("latex", "tex"),
    ("dockerfile", "dockerfile"),
    ("makefile", "mk"),
];

static DISPLAY_NAMES: &[(&str, &str)] = &[
    ("rust", "Rust"),
    ("python", "Python"),
    ("javascript", "JavaScript"),
    ("typescript", "TypeScript"),
    ("go", "Go"),
    ("java", "Java"),
    ("kotlin", "Kotlin"),
    ("swift", "Swift"),
    ("c", "C"),
    ("cpp", "C++"),
    ("csharp", "C#"),
    ("ruby", "Ruby"),
    ("php", "PHP"),
    ("bash", "Bash"),
    ("powershell", "PowerShell"),
    ("sql", "SQL"),
    ("html", "HTML"),
    ("xml", "XML"),
    ("css", "CSS"),
    ("json", "JSON"),
    ("yaml", "YAML"),
    ("toml", "TOML"),
    ("markdown", "Markdown"),
    ("plaintext", "Plain text"),
];

fn lookup(table: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| *v)
}

/// Language for a file extension (without the dot), case-insensitive.
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    lookup(EXTENSIONS, ext)
}

/// Language for a filename, by extension or by well-known bare names.
pub fn language_for_filename(filename: &str) -> Option<&'static str> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => language_for_extension(ext),
        _ => language_for_extension(base),
    }
}

/// Extension used when downloading a block, `txt` when unrecognized.
pub fn extension_for_language(language: &str) -> &'static str {
    lookup(PREFERRED_EXTENSIONS, language).unwrap_or("txt")
}

/// Human-readable name for a language id, falling back to the id itself.
pub fn display_name(language: &str) -> &str {
    lookup(DISPLAY_NAMES, language).unwrap_or(language)
}

/// Inline SVG markup for the block controls.
pub mod icons {
    pub const COPY: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="16" height="16" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><rect x="9" y="9" width="13" height="13" rx="2"/><path d="M5 15H4a2 2 0 0 1-2-2V4a2 2 0 0 1 2-2h9a2 2 0 0 1 2 2v1"/></svg>"#;
    pub const CHECK: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="16" height="16" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><polyline points="20 6 9 17 4 12"/></svg>"#;
    pub const DOWNLOAD: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="16" height="16" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><path d="M21 15v4a2 2 0 0 1-2 2H5a2 2 0 0 1-2-2v-4"/><polyline points="7 10 12 15 17 10"/><line x1="12" y1="15" x2="12" y2="3"/></svg>"#;
    pub const SHARE: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="16" height="16" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><circle cx="18" cy="5" r="3"/><circle cx="6" cy="12" r="3"/><circle cx="18" cy="19" r="3"/><line x1="8.59" y1="13.51" x2="15.42" y2="17.49"/><line x1="15.41" y1="6.51" x2="8.59" y2="10.49"/></svg>"#;
    pub const LINK: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24" width="12" height="12" fill="none" stroke="currentColor" stroke-width="2" aria-hidden="true"><path d="M10 13a5 5 0 0 0 7.54.54l3-3a5 5 0 0 0-7.07-7.07l-1.72 1.71"/><path d="M14 11a5 5 0 0 0-7.54-.54l-3 3a5 5 0 0 0 7.07 7.07l1.71-1.71"/></svg>"#;
}
