//! [`HighlightEngine`] backed by syntect's bundled grammars.

use std::sync::LazyLock;

use smol_str::SmolStr;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::{ParseState, ScopeStackOp, SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use crate::error::EngineError;
use crate::escape::escape_html;
use crate::highlight::{Detection, HighlightEngine};

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);

/// Class prefix for highlighted spans; theme stylesheets target `.hl-*`.
pub const CLASS_STYLE: ClassStyle = ClassStyle::SpacedPrefixed { prefix: "hl-" };

/// Score bonus when a grammar claims the first line (shebangs, modelines).
const FIRST_LINE_BONUS: i64 = 25;

/// Syntect-backed engine using the default newline syntax set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntectEngine;

impl SyntectEngine {
    pub fn new() -> Self {
        Self
    }

    fn syntax_set(&self) -> &'static SyntaxSet {
        &SYNTAX_SET
    }

    /// Syntect lookup token for a language id.
    fn token_for(language: &str) -> &str {
        match language {
            "javascript" | "jsx" => "js",
            "typescript" => "ts",
            "python" => "py",
            "shell" | "sh" | "zsh" | "console" => "bash",
            "c++" => "cpp",
            "csharp" | "c#" => "cs",
            "golang" => "go",
            "markdown" => "md",
            "yml" => "yaml",
            "objectivec" | "objective-c" => "m",
            "plaintext" | "text" => "txt",
            other => other,
        }
    }

    fn find(&self, language: &str) -> Option<&'static SyntaxReference> {
        let ss = self.syntax_set();
        let token = Self::token_for(language);
        ss.find_syntax_by_token(token)
            .or_else(|| ss.find_syntax_by_token(language))
    }

    /// glint language id for a syntect grammar.
    fn language_id(syntax: &SyntaxReference) -> SmolStr {
        match syntax.name.as_str() {
            "Bourne Again Shell (bash)" => SmolStr::new_static("bash"),
            "C++" => SmolStr::new_static("cpp"),
            "C#" => SmolStr::new_static("csharp"),
            "Plain Text" => SmolStr::new_static("plaintext"),
            "Objective-C" => SmolStr::new_static("objectivec"),
            name => SmolStr::new(name.to_ascii_lowercase().replace(' ', "-")),
        }
    }

    fn render(&self, syntax: &SyntaxReference, text: &str) -> Result<String, EngineError> {
        let mut generator =
            ClassedHTMLGenerator::new_with_class_style(syntax, self.syntax_set(), CLASS_STYLE);
        for line in LinesWithEndings::from(text) {
            generator
                .parse_html_for_line_which_includes_newline(line)
                .map_err(|e| EngineError::Parse(e.to_string()))?;
        }
        Ok(generator.finalize())
    }

    /// How strongly `syntax` recognizes `text`.
    ///
    /// Counts the meaningful scopes the grammar pushes while parsing and
    /// penalizes `invalid.*` ones. Grammars that fail to parse score zero.
    fn relevance(&self, syntax: &SyntaxReference, text: &str, first_line: Option<&str>) -> i64 {
        let ss = self.syntax_set();
        let mut state = ParseState::new(syntax);
        let mut score = 0i64;
        for line in LinesWithEndings::from(text) {
            let Ok(ops) = state.parse_line(line, ss) else {
                return 0;
            };
            for (_, op) in ops {
                if let ScopeStackOp::Push(scope) = op {
                    score += scope_weight(&scope.build_string());
                }
            }
        }
        if first_line.is_some_and(|name| name == syntax.name) {
            score += FIRST_LINE_BONUS;
        }
        score
    }
}

fn scope_weight(scope: &str) -> i64 {
    const STRONG: &[&str] = &["keyword.", "storage."];
    const WEAK: &[&str] = &[
        "entity.name.function",
        "entity.name.class",
        "entity.name.type",
        "support.function",
        "support.type",
        "constant.language",
        "variable.language",
        "meta.interpolation",
        "string.interpolated",
        "punctuation.definition.string",
    ];
    if scope.starts_with("invalid") {
        -3
    } else if STRONG.iter().any(|p| scope.starts_with(p)) {
        2
    } else if WEAK.iter().any(|p| scope.starts_with(p)) {
        1
    } else {
        0
    }
}

impl HighlightEngine for SyntectEngine {
    fn highlight(&self, text: &str, language: &str) -> Result<String, EngineError> {
        let syntax = self
            .find(language)
            .ok_or_else(|| EngineError::UnknownLanguage(language.to_string()))?;
        self.render(syntax, text)
    }

    fn highlight_auto(&self, text: &str, subset: Option<&[&str]>) -> Result<Detection, EngineError> {
        let ss = self.syntax_set();
        let plain = ss.find_syntax_plain_text();
        let candidates: Vec<&SyntaxReference> = match subset {
            Some(names) => {
                let mut found: Vec<&SyntaxReference> = Vec::new();
                for syntax in names.iter().filter_map(|name| self.find(name)) {
                    if !std::ptr::eq(syntax, plain) && !found.iter().any(|s| std::ptr::eq(*s, syntax)) {
                        found.push(syntax);
                    }
                }
                found
            }
            None => ss
                .syntaxes()
                .iter()
                .filter(|s| !s.hidden && !std::ptr::eq(*s, plain))
                .collect(),
        };

        let first_line = ss
            .find_syntax_by_first_line(text)
            .map(|s| s.name.as_str());
        let mut best: Option<(&SyntaxReference, i64)> = None;
        for syntax in candidates {
            let score = self.relevance(syntax, text, first_line);
            if score > 0 && best.is_none_or(|(_, s)| score > s) {
                best = Some((syntax, score));
            }
        }

        match best {
            Some((syntax, score)) => Ok(Detection {
                html: self.render(syntax, text)?,
                language: Some(Self::language_id(syntax)),
                relevance: u32::try_from(score).unwrap_or(u32::MAX),
            }),
            None => Ok(Detection {
                html: escape_html(text),
                language: None,
                relevance: 0,
            }),
        }
    }
}
