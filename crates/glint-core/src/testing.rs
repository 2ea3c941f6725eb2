//! Test doubles: a deterministic keyword engine and recording capabilities.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, ready};
use smol_str::SmolStr;

use crate::capabilities::{Capabilities, Clipboard, FileSaver, Sha256Digest, StaticLocation};
use crate::error::{CapabilityError, EngineError};
use crate::escape::escape_html;
use crate::highlight::{Detection, HighlightEngine};

/// Keyword tables, in detection tie-break order.
const GRAMMARS: &[(&str, &[&str])] = &[
    ("python", &["def", "return", "import", "lambda", "elif", "self", "pass"]),
    ("javascript", &["function", "const", "console", "var"]),
    ("rust", &["fn", "let", "mut", "impl", "pub", "struct"]),
    ("bash", &["echo", "fi", "then", "export"]),
    ("fortran", &["program", "end", "subroutine"]),
];

/// Engine that highlights a handful of keywords per language.
#[derive(Debug, Default)]
pub struct StubEngine {
    unavailable: bool,
    detect_calls: Cell<usize>,
    highlight_calls: Cell<usize>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that fails every call with [`EngineError::Unavailable`].
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.get()
    }

    pub fn highlight_calls(&self) -> usize {
        self.highlight_calls.get()
    }

    fn keywords(language: &str) -> Option<&'static [&'static str]> {
        GRAMMARS
            .iter()
            .find(|(name, _)| *name == language)
            .map(|(_, kws)| *kws)
    }

    fn render(text: &str, keywords: &[&str]) -> String {
        let mut out = String::new();
        let mut word = String::new();
        let flush = |word: &mut String, out: &mut String| {
            if word.is_empty() {
                return;
            }
            if keywords.contains(&word.as_str()) {
                out.push_str("<span class=\"hl-keyword\">");
                out.push_str(word);
                out.push_str("</span>");
            } else {
                out.push_str(&escape_html(word));
            }
            word.clear();
        };
        for c in text.chars() {
            if c.is_alphanumeric() || c == '_' {
                word.push(c);
            } else {
                flush(&mut word, &mut out);
                out.push_str(&escape_html(&c.to_string()));
            }
        }
        flush(&mut word, &mut out);
        out
    }

    fn score(text: &str, keywords: &[&str]) -> u32 {
        text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
            .filter(|w| keywords.contains(w))
            .count() as u32
    }
}

impl HighlightEngine for StubEngine {
    fn highlight(&self, text: &str, language: &str) -> Result<String, EngineError> {
        if self.unavailable {
            return Err(EngineError::Unavailable);
        }
        self.highlight_calls.set(self.highlight_calls.get() + 1);
        let keywords =
            Self::keywords(language).ok_or_else(|| EngineError::UnknownLanguage(language.into()))?;
        Ok(Self::render(text, keywords))
    }

    fn highlight_auto(&self, text: &str, subset: Option<&[&str]>) -> Result<Detection, EngineError> {
        if self.unavailable {
            return Err(EngineError::Unavailable);
        }
        self.detect_calls.set(self.detect_calls.get() + 1);
        let candidates: Vec<(&str, &[&str])> = match subset {
            Some(subset) => subset
                .iter()
                .filter_map(|name| Self::keywords(name).map(|kws| (*name, kws)))
                .collect(),
            None => GRAMMARS.to_vec(),
        };
        let mut best: Option<(&str, &[&str], u32)> = None;
        for (name, keywords) in candidates {
            let score = Self::score(text, keywords);
            if score > 0 && best.is_none_or(|(_, _, s)| score > s) {
                best = Some((name, keywords, score));
            }
        }
        Ok(match best {
            Some((name, keywords, relevance)) => Detection {
                html: Self::render(text, keywords),
                language: Some(SmolStr::new(name)),
                relevance,
            },
            None => Detection {
                html: escape_html(text),
                language: None,
                relevance: 0,
            },
        })
    }
}

/// Clipboard that records writes and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingClipboard {
    writes: RefCell<Vec<String>>,
    fail: Cell<bool>,
}

impl RecordingClipboard {
    pub fn writes(&self) -> Vec<String> {
        self.writes.borrow().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.set(fail);
    }
}

impl Clipboard for RecordingClipboard {
    fn write_text(&self, text: &str) -> LocalBoxFuture<'static, Result<(), CapabilityError>> {
        if self.fail.get() {
            return ready(Err(CapabilityError::Rejected {
                capability: "clipboard",
                reason: "permission denied".into(),
            }))
            .boxed_local();
        }
        self.writes.borrow_mut().push(text.to_string());
        ready(Ok(())).boxed_local()
    }
}

/// File saver that records saves.
#[derive(Debug, Default)]
pub struct RecordingFiles {
    saves: RefCell<Vec<(String, String)>>,
}

impl RecordingFiles {
    pub fn saves(&self) -> Vec<(String, String)> {
        self.saves.borrow().clone()
    }
}

impl FileSaver for RecordingFiles {
    fn save(&self, filename: &str, content: &str) -> Result<(), CapabilityError> {
        self.saves
            .borrow_mut()
            .push((filename.to_string(), content.to_string()));
        Ok(())
    }
}

/// Capabilities wired to recording doubles.
pub struct TestCapabilities {
    pub clipboard: Rc<RecordingClipboard>,
    pub files: Rc<RecordingFiles>,
    pub capabilities: Capabilities,
}

impl TestCapabilities {
    pub fn new(base_url: &str) -> Self {
        let clipboard = Rc::new(RecordingClipboard::default());
        let files = Rc::new(RecordingFiles::default());
        let capabilities = Capabilities {
            clipboard: clipboard.clone(),
            files: files.clone(),
            digest: Rc::new(Sha256Digest),
            location: Rc::new(StaticLocation(base_url.to_string())),
            touch: false,
        };
        Self {
            clipboard,
            files,
            capabilities,
        }
    }
}
