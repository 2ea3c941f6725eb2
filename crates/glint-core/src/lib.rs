//! glint-core: code block decoration and live re-highlighting, generic over
//! the document.
//!
//! This crate provides:
//! - `Dom` and `Scheduler` traits, with `MemoryDom` and `TokioScheduler` for
//!   native use
//! - `Highlighter` wrapping a `HighlightEngine` (syntect-backed by default)
//! - normalization, decoration and line-number gutters for code blocks
//! - content-addressed block identities and fragment navigation
//! - `BlockHandle`, the debounced live-update reconciler
//! - `Glint`, the bulk and on-demand entry points

pub mod capabilities;
pub mod config;
pub mod decorate;
pub mod dom;
pub mod error;
pub mod escape;
pub mod gutter;
pub mod highlight;
pub mod identity;
pub mod memory;
pub mod navigate;
pub mod normalize;
pub mod orchestrate;
pub mod reconcile;
pub mod schedule;
#[cfg(feature = "syntect-engine")]
pub mod syntect_engine;
pub mod tables;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(test)]
mod tests;

pub use capabilities::{
    Capabilities, Clipboard, ContentDigest, FallbackDigest, FileSaver, PageLocation, Sha256Digest,
    pad_start,
};
pub use config::{BlockConfig, HighlightOptions, InitOptions, Theme};
pub use dom::{Callback, Dom, NodeRole, Rect};
pub use error::{CapabilityError, EngineError, GlintError};
pub use escape::escape_html;
pub use highlight::{Detection, HighlightEngine, Highlighted, Highlighter};
pub use identity::{BlockIdentity, IdentitySource, content_hash, parse_fragment};
pub use memory::{MemNode, MemoryDom, MemoryObservation};
pub use navigate::{Navigator, Target};
pub use normalize::{BlockNodes, Normalized};
pub use orchestrate::Glint;
pub use reconcile::{BlockContext, BlockHandle, ReconcileState, ReconcileStats};
#[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
pub use schedule::TokioScheduler;
pub use schedule::{FRAME, Scheduler};
pub use smol_str::SmolStr;
#[cfg(feature = "syntect-engine")]
pub use syntect_engine::SyntectEngine;
