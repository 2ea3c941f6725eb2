//! Browser layer for glint.
//!
//! Implements the core platform traits on top of `web-sys`. It assumes a
//! `wasm32-unknown-unknown` target environment.
//!
//! # Architecture
//!
//! - `dom`: [`WebDom`], the live document, with mutation and resize
//!   observation (polling and window-resize fallbacks where the observers
//!   are missing)
//! - `scheduler`: [`BrowserScheduler`], local tasks, timers and frame ticks
//! - `capabilities`: clipboard, downloads, digests and page URL, detected once
//! - `hash`: `hashchange` wiring for fragment navigation
//!
//! # Re-exports
//!
//! This crate re-exports `glint-core` for convenience, so consumers only need
//! to depend on `glint-browser`.

// Re-export core crate
pub use glint_core;
pub use glint_core::*;

pub mod capabilities;
pub mod dom;
pub mod hash;
pub mod scheduler;

pub use capabilities::{detect as detect_capabilities, is_touch_device};
pub use dom::{WebDom, WebObservation};
pub use hash::{current_fragment, on_hash_change};
pub use scheduler::BrowserScheduler;

/// Highlighter bound to the live page.
pub type WebGlint<E> = Glint<WebDom, BrowserScheduler, E>;

/// Page highlighter with the bundled syntect engine.
#[cfg(feature = "syntect-engine")]
pub fn page_highlighter(options: InitOptions) -> Option<WebGlint<SyntectEngine>> {
    let dom = WebDom::new()?;
    Some(Glint::new(
        dom,
        BrowserScheduler,
        SyntectEngine::new(),
        detect_capabilities(),
        options,
    ))
}
