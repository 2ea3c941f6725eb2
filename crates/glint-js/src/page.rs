//! The page-wide highlighter behind the exported functions.

use std::cell::RefCell;

use gloo_events::EventListener;
use glint_browser::{
    Dom, HighlightOptions, InitOptions, SyntectEngine, WebGlint, current_fragment, on_hash_change,
    page_highlighter,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::Element;

use crate::types::{JsBlockInfo, JsHighlightOptions, JsInitOptions, state_name};

type PageGlint = WebGlint<SyntectEngine>;

struct Page {
    glint: PageGlint,
    hash_listener: Option<EventListener>,
}

thread_local! {
    static PAGE: RefCell<Option<Page>> = const { RefCell::new(None) };
}

/// The page highlighter, created with `options` on first use.
///
/// Later calls reuse the first instance; their options are ignored.
fn page(options: impl FnOnce() -> InitOptions) -> Option<PageGlint> {
    PAGE.with(|cell| {
        let mut page = cell.borrow_mut();
        if let Some(page) = page.as_ref() {
            return Some(page.glint.clone());
        }
        let Some(glint) = page_highlighter(options()) else {
            tracing::warn!("no document available, highlighting disabled");
            return None;
        };
        *page = Some(Page {
            glint: glint.clone(),
            hash_listener: None,
        });
        Some(glint)
    })
}

fn listen_for_fragments(glint: &PageGlint) {
    PAGE.with(|cell| {
        let mut page = cell.borrow_mut();
        let Some(page) = page.as_mut() else {
            return;
        };
        if page.hash_listener.is_some() {
            return;
        }
        let glint = glint.clone();
        page.hash_listener = on_hash_change(move |fragment| {
            let glint = glint.clone();
            wasm_bindgen_futures::spawn_local(async move {
                glint.navigate(&fragment).await;
            });
        });
    });
}

/// Read optional options from JS. `undefined`, `null` and malformed objects
/// yield the defaults.
fn options_from<T: Default + serde::de::DeserializeOwned>(value: JsValue) -> T {
    if value.is_undefined() || value.is_null() {
        return T::default();
    }
    serde_wasm_bindgen::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring malformed options");
        T::default()
    })
}

/// Highlight every element matching `options.selector`.
///
/// Resolves to the number of blocks created. Navigates to the page's
/// fragment afterwards, if it has one.
#[wasm_bindgen(js_name = initHighlighting)]
pub async fn init_highlighting(options: JsValue) -> u32 {
    let Some(glint) = page(|| options_from::<JsInitOptions>(options).into()) else {
        return 0;
    };
    listen_for_fragments(&glint);
    let created = glint.init().await;
    if let Some(fragment) = current_fragment() {
        glint.navigate(&fragment).await;
    }
    u32::try_from(created).unwrap_or(u32::MAX)
}

/// Highlight one element.
///
/// Returns the decorated container, or `element` itself when it was already
/// decorated or could not be highlighted.
///
/// The container replaces `element` on the page. To stream into a live
/// block, write to the hidden mirror, which carries `element`'s id from then
/// on; `element` itself is no longer watched.
#[wasm_bindgen(js_name = highlightElement)]
pub fn highlight_element(element: Element, options: JsValue) -> Element {
    let Some(glint) = page(InitOptions::default) else {
        return element;
    };
    let overrides: HighlightOptions = options_from::<JsHighlightOptions>(options).into();
    let container = glint.highlight_element(element.as_ref(), &overrides);
    container.dyn_into::<Element>().unwrap_or(element)
}

/// Scroll to the block (and line) named by `fragment`.
///
/// Retries while the block is not on the page yet; resolves to whether a
/// target was found.
#[wasm_bindgen(js_name = navigateTo)]
pub async fn navigate_to(fragment: String) -> bool {
    let Some(glint) = page(InitOptions::default) else {
        return false;
    };
    glint.navigate(&fragment).await.is_some()
}

/// Diagnostics for every block on the page.
#[wasm_bindgen(js_name = blockInfo)]
pub fn block_info() -> Result<JsValue, JsError> {
    let Some(glint) = PAGE.with(|cell| cell.borrow().as_ref().map(|p| p.glint.clone())) else {
        return Ok(js_sys::Array::new().into());
    };
    let dom = glint.dom();
    let info: Vec<JsBlockInfo> = glint
        .blocks()
        .iter()
        .map(|block| {
            let stats = block.stats();
            let code = block.nodes().code;
            JsBlockInfo {
                state: state_name(block.state()).to_string(),
                language: block.language().map(|l| l.to_string()),
                identity: block.identity(),
                lines: glint_browser::gutter::line_count(&dom.text_content(&code)) as u32,
                passes: stats.passes as u32,
                skipped: stats.skipped as u32,
                markup_writes: stats.markup_writes as u32,
            }
        })
        .collect();
    serde_wasm_bindgen::to_value(&info)
        .map_err(|e| JsError::new(&format!("Serialization error: {}", e)))
}
