//! Error types for glint.
//!
//! None of these escape the public entry points: the orchestrator logs them
//! and falls back to a degraded rendering instead.

use miette::Diagnostic;

/// Failures reported by a highlighting engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum EngineError {
    /// The engine has no grammar for the requested language.
    #[error("unsupported language: {0}")]
    #[diagnostic(code(glint::engine::unknown_language))]
    UnknownLanguage(String),

    /// The grammar exists but failed while tokenizing.
    #[error("highlighting failed: {0}")]
    #[diagnostic(code(glint::engine::parse))]
    Parse(String),

    /// No engine is loaded at all.
    #[error("highlighting engine unavailable")]
    #[diagnostic(code(glint::engine::unavailable))]
    Unavailable,
}

/// Failures of browser capabilities (clipboard, downloads, digests).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum CapabilityError {
    /// Neither the native primitive nor its fallback exists.
    #[error("{0} is not available")]
    #[diagnostic(code(glint::capability::unavailable))]
    Unavailable(&'static str),

    /// The primitive exists but refused the request.
    #[error("{capability} rejected the request: {reason}")]
    #[diagnostic(code(glint::capability::rejected))]
    Rejected {
        capability: &'static str,
        reason: String,
    },
}

/// Main error type for glint operations.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum GlintError {
    /// The element already lives inside a decorated container.
    #[error("element is already part of a decorated code block")]
    #[diagnostic(
        code(glint::structure::already_decorated),
        help("call highlight on the original source element only once")
    )]
    AlreadyDecorated,

    /// The element is the hidden mirror of a live block.
    #[error("element is the hidden mirror of a live code block")]
    #[diagnostic(
        code(glint::structure::hidden_mirror),
        help("write streamed text into the mirror; it is re-highlighted automatically")
    )]
    HiddenMirror,

    /// The element is not in the document, so there is no place to put a
    /// decorated container.
    #[error("element is not attached to the document")]
    #[diagnostic(
        code(glint::structure::detached),
        help("insert the element into the page before highlighting it")
    )]
    Detached,
}
