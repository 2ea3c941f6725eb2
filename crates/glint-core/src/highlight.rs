//! Highlighting adapter.
//!
//! Lexical analysis is delegated to a [`HighlightEngine`]. [`Highlighter`]
//! wraps an engine with glint's recovery rules so callers always get markup
//! back: unsupported languages and engine failures degrade to escaped plain
//! text, auto-detection prefers the popular-language set, and trivial input
//! skips detection entirely.

use smol_str::SmolStr;

use crate::error::EngineError;
use crate::escape::escape_html;
use crate::tables::POPULAR_LANGUAGES;

/// Language id reported for unhighlighted text.
pub const PLAINTEXT: &str = "plaintext";
/// Language id reported when no engine could run at all.
pub const UNKNOWN: &str = "unknown";
/// Inputs shorter than this (after trimming) are not auto-detected.
pub const MIN_DETECT_LEN: usize = 3;

/// Markup produced for a snippet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlighted {
    pub html: String,
    pub language: SmolStr,
}

impl Highlighted {
    /// Escaped, unstyled text.
    pub fn plain(code: &str, language: impl Into<SmolStr>) -> Self {
        Self {
            html: escape_html(code),
            language: language.into(),
        }
    }

    /// Whether this carries a real language rather than a fallback marker.
    pub fn is_detected(&self) -> bool {
        self.language != PLAINTEXT && self.language != UNKNOWN
    }
}

/// Result of an engine's auto-detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub html: String,
    /// `None` when no candidate matched.
    pub language: Option<SmolStr>,
    pub relevance: u32,
}

/// External lexical highlighter.
///
/// Implementations must be deterministic: the same text and subset always
/// produce the same detection.
pub trait HighlightEngine {
    /// Highlight `text` as `language`.
    fn highlight(&self, text: &str, language: &str) -> Result<String, EngineError>;

    /// Detect the language of `text`, restricted to `subset` when given.
    fn highlight_auto(&self, text: &str, subset: Option<&[&str]>) -> Result<Detection, EngineError>;
}

impl<E: HighlightEngine + ?Sized> HighlightEngine for std::rc::Rc<E> {
    fn highlight(&self, text: &str, language: &str) -> Result<String, EngineError> {
        (**self).highlight(text, language)
    }

    fn highlight_auto(&self, text: &str, subset: Option<&[&str]>) -> Result<Detection, EngineError> {
        (**self).highlight_auto(text, subset)
    }
}

/// Engine wrapper that never fails.
#[derive(Debug, Clone)]
pub struct Highlighter<E> {
    engine: E,
}

impl<E: HighlightEngine> Highlighter<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Highlight with an explicit language.
    ///
    /// On engine failure the code comes back escaped, still labelled with the
    /// requested language.
    pub fn highlight(&self, code: &str, language: &str) -> Highlighted {
        if language == PLAINTEXT {
            return Highlighted::plain(code, PLAINTEXT);
        }
        match self.engine.highlight(code, language) {
            Ok(html) => Highlighted {
                html,
                language: language.into(),
            },
            Err(e) => {
                tracing::warn!(language, error = %e, "highlighting failed, using plain text");
                Highlighted::plain(code, language)
            }
        }
    }

    /// Highlight with an explicit language, falling back to detected markup
    /// when the engine can't handle it and detection is allowed.
    ///
    /// The block keeps the language it asked for; only the markup comes from
    /// the detected grammar.
    pub fn highlight_or_detect(&self, code: &str, language: &str, auto_detect: bool) -> Highlighted {
        if language == PLAINTEXT {
            return Highlighted::plain(code, PLAINTEXT);
        }
        match self.engine.highlight(code, language) {
            Ok(html) => Highlighted {
                html,
                language: language.into(),
            },
            Err(e) if auto_detect => {
                tracing::warn!(language, error = %e, "highlighting failed, falling back to detection");
                let detected = self.auto_detect(code);
                Highlighted {
                    html: detected.html,
                    language: language.into(),
                }
            }
            Err(e) => {
                tracing::warn!(language, error = %e, "highlighting failed, using plain text");
                Highlighted::plain(code, language)
            }
        }
    }

    /// Detect the language and highlight.
    ///
    /// Trivial input is plain text. Otherwise the popular set is tried first
    /// and the engine-wide detector only when that finds nothing. A missing
    /// engine yields `unknown`.
    pub fn auto_detect(&self, code: &str) -> Highlighted {
        if code.trim().chars().count() < MIN_DETECT_LEN {
            return Highlighted::plain(code, PLAINTEXT);
        }

        let popular = match self.engine.highlight_auto(code, Some(POPULAR_LANGUAGES)) {
            Ok(detection) => detection,
            Err(EngineError::Unavailable) => {
                tracing::warn!("highlighting engine unavailable");
                return Highlighted::plain(code, UNKNOWN);
            }
            Err(e) => {
                tracing::debug!(error = %e, "restricted detection failed");
                Detection {
                    html: String::new(),
                    language: None,
                    relevance: 0,
                }
            }
        };
        if let Some(language) = popular.language {
            return Highlighted {
                html: popular.html,
                language,
            };
        }

        match self.engine.highlight_auto(code, None) {
            Ok(Detection {
                html,
                language: Some(language),
                ..
            }) => Highlighted { html, language },
            Ok(_) => Highlighted::plain(code, PLAINTEXT),
            Err(EngineError::Unavailable) => {
                tracing::warn!("highlighting engine unavailable");
                Highlighted::plain(code, UNKNOWN)
            }
            Err(e) => {
                tracing::warn!(error = %e, "detection failed, using plain text");
                Highlighted::plain(code, PLAINTEXT)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubEngine;

    #[test]
    fn test_highlight_known_language() {
        let hl = Highlighter::new(StubEngine::new());
        let out = hl.highlight("fn main() {}", "rust");
        assert_eq!(out.language, "rust");
        assert!(out.html.contains("<span class=\"hl-keyword\">fn</span>"));
    }

    #[test]
    fn test_highlight_unknown_language_falls_back_to_escaped_text() {
        let hl = Highlighter::new(StubEngine::new());
        let out = hl.highlight("a < b", "cobol");
        assert_eq!(out.language, "cobol");
        assert_eq!(out.html, "a &lt; b");
    }

    #[test]
    fn test_highlight_or_detect_keeps_requested_language() {
        let hl = Highlighter::new(StubEngine::new());
        let out = hl.highlight_or_detect("def f():\n    return 1", "typescript", true);
        assert_eq!(out.language, "typescript");
        assert!(out.html.contains("hl-keyword"));

        let plain = hl.highlight_or_detect("def f():\n    return 1", "typescript", false);
        assert!(!plain.html.contains("hl-keyword"));
    }

    #[test]
    fn test_auto_detect_short_input_is_plaintext() {
        let engine = StubEngine::new();
        let hl = Highlighter::new(engine);
        let out = hl.auto_detect("  x ");
        assert_eq!(out.language, PLAINTEXT);
        assert_eq!(hl.engine().detect_calls(), 0);
    }

    #[test]
    fn test_auto_detect_python() {
        let hl = Highlighter::new(StubEngine::new());
        let out = hl.auto_detect("def greet(name):\n    return f'hi {name}'");
        assert_eq!(out.language, "python");
    }

    #[test]
    fn test_auto_detect_is_deterministic() {
        let hl = Highlighter::new(StubEngine::new());
        let code = "const x = () => console.log('hi');";
        let first = hl.auto_detect(code);
        for _ in 0..10 {
            assert_eq!(hl.auto_detect(code), first);
        }
    }

    #[test]
    fn test_auto_detect_tries_popular_set_first() {
        let hl = Highlighter::new(StubEngine::new());
        // "fortran" is only reachable through the unrestricted pass.
        let out = hl.auto_detect("program hello\nend program");
        assert_eq!(out.language, "fortran");
        assert_eq!(hl.engine().detect_calls(), 2);

        let popular = hl.auto_detect("fn main() { let x = 1; }");
        assert_eq!(popular.language, "rust");
        assert_eq!(hl.engine().detect_calls(), 3);
    }

    #[test]
    fn test_auto_detect_without_match_is_plaintext() {
        let hl = Highlighter::new(StubEngine::new());
        let out = hl.auto_detect("lorem ipsum dolor");
        assert_eq!(out.language, PLAINTEXT);
        assert_eq!(out.html, "lorem ipsum dolor");
    }

    #[test]
    fn test_unavailable_engine_is_unknown() {
        let hl = Highlighter::new(StubEngine::unavailable());
        let out = hl.auto_detect("def f(): pass");
        assert_eq!(out.language, UNKNOWN);
        assert_eq!(out.html, "def f(): pass");
        let explicit = hl.highlight("<b>", "rust");
        assert_eq!(explicit.html, "&lt;b&gt;");
    }
}
