//! Types exposed to JavaScript via wasm-bindgen.

use glint_browser::{HighlightOptions, InitOptions, ReconcileState, Theme};
use serde::{Deserialize, Serialize};
use tsify_next::Tsify;
use wasm_bindgen::prelude::*;

/// Options for `initHighlighting`. Missing fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsInitOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_detect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_header: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_copy_button: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_language_label: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_line_numbers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_number_start: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shareable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloadable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_update: Option<bool>,
    /// `"light"`, `"dark"` or `"auto"`; anything else is `"auto"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
}

impl From<JsInitOptions> for InitOptions {
    fn from(js: JsInitOptions) -> Self {
        let defaults = InitOptions::default();
        InitOptions {
            selector: js.selector.unwrap_or(defaults.selector),
            auto_detect: js.auto_detect.unwrap_or(defaults.auto_detect),
            show_header: js.show_header.unwrap_or(defaults.show_header),
            show_copy_button: js.show_copy_button.unwrap_or(defaults.show_copy_button),
            show_language_label: js.show_language_label.unwrap_or(defaults.show_language_label),
            show_line_numbers: js.show_line_numbers.unwrap_or(defaults.show_line_numbers),
            line_number_start: js.line_number_start.unwrap_or(defaults.line_number_start),
            shareable: js.shareable.unwrap_or(defaults.shareable),
            downloadable: js.downloadable.unwrap_or(defaults.downloadable),
            live_update: js.live_update.unwrap_or(defaults.live_update),
            theme: js
                .theme
                .as_deref()
                .and_then(Theme::parse)
                .unwrap_or(defaults.theme),
            debounce_ms: js.debounce_ms.unwrap_or(defaults.debounce_ms),
            batch_size: js
                .batch_size
                .map(|n| n as usize)
                .unwrap_or(defaults.batch_size),
        }
    }
}

/// Per-call options for `highlightElement`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsHighlightOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_detect: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_header: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_copy_button: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_language_label: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_line_numbers: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shareable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloadable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_update: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_start: Option<i64>,
}

impl From<JsHighlightOptions> for HighlightOptions {
    fn from(js: JsHighlightOptions) -> Self {
        HighlightOptions {
            auto_detect: js.auto_detect,
            show_header: js.show_header,
            show_copy_button: js.show_copy_button,
            show_language_label: js.show_language_label,
            show_line_numbers: js.show_line_numbers,
            shareable: js.shareable,
            downloadable: js.downloadable,
            live_update: js.live_update,
            filename: js.filename,
            language: js.language,
            theme: js.theme,
            line_start: js.line_start,
        }
    }
}

/// Snapshot of one block, for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Tsify)]
#[tsify(into_wasm_abi, from_wasm_abi)]
#[serde(rename_all = "camelCase")]
pub struct JsBlockInfo {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<String>,
    pub lines: u32,
    pub passes: u32,
    pub skipped: u32,
    pub markup_writes: u32,
}

pub fn state_name(state: ReconcileState) -> &'static str {
    match state {
        ReconcileState::Uninitialized => "uninitialized",
        ReconcileState::Static => "static",
        ReconcileState::Watching => "watching",
        ReconcileState::Pending => "pending",
        ReconcileState::Reconciling => "reconciling",
        ReconcileState::Detached => "detached",
    }
}
