//! WASM bindings for glint.
//!
//! Provides code block highlighting for plain web pages:
//!
//! - `initHighlighting(options?)` decorates every matching element
//! - `highlightElement(element, options?)` decorates one element
//! - `navigateTo(fragment)` scrolls to a block or one of its lines
//!
//! Fragment navigation is also wired to `hashchange` once
//! `initHighlighting` has run.

mod page;
mod types;

pub use page::*;
pub use types::*;

use wasm_bindgen::prelude::*;

/// Install the panic hook and the console tracing layer.
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();

    use tracing::Level;
    use tracing::subscriber::set_global_default;
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::SubscriberExt;

    let console_level = if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let wasm_layer = tracing_wasm::WASMLayer::new(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(console_level)
            .build(),
    );

    // Host page may already have installed one.
    let _ = set_global_default(Registry::default().with(wasm_layer));
}
