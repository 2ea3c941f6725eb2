//! Browser implementations of the capability traits.
//!
//! Each primitive is feature-detected once in [`detect`]; when the native
//! API is missing the matching fallback is installed instead.

use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, ready};
use glint_core::{
    Capabilities, CapabilityError, Clipboard, ContentDigest, FileSaver, NoClipboard, NoFileSaver,
    PageLocation, Sha256Digest, StaticLocation,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, HtmlDocument, HtmlTextAreaElement, Url};

fn rejected(capability: &'static str, error: JsValue) -> CapabilityError {
    CapabilityError::Rejected {
        capability,
        reason: error
            .as_string()
            .or_else(|| {
                error
                    .dyn_ref::<js_sys::Error>()
                    .map(|e| String::from(e.message()))
            })
            .unwrap_or_else(|| format!("{error:?}")),
    }
}

/// `navigator.clipboard.writeText`.
#[derive(Debug, Clone)]
pub struct AsyncClipboard {
    clipboard: web_sys::Clipboard,
}

impl Clipboard for AsyncClipboard {
    fn write_text(&self, text: &str) -> LocalBoxFuture<'static, Result<(), CapabilityError>> {
        let promise = self.clipboard.write_text(text);
        async move {
            JsFuture::from(promise)
                .await
                .map(|_| ())
                .map_err(|e| rejected("clipboard", e))
        }
        .boxed_local()
    }
}

/// Legacy copy through a hidden textarea and `execCommand("copy")`.
///
/// Used outside secure contexts, where `navigator.clipboard` is undefined.
#[derive(Debug, Clone)]
pub struct ExecCommandClipboard {
    document: HtmlDocument,
}

impl ExecCommandClipboard {
    fn copy(&self, text: &str) -> Result<(), CapabilityError> {
        let body = self
            .document
            .body()
            .ok_or(CapabilityError::Unavailable("clipboard"))?;
        let area: HtmlTextAreaElement = self
            .document
            .create_element("textarea")
            .map_err(|e| rejected("clipboard", e))?
            .unchecked_into();
        area.set_value(text);
        let _ = area.set_attribute("readonly", "");
        let style = area.style();
        let _ = style.set_property("position", "fixed");
        let _ = style.set_property("opacity", "0");
        let _ = style.set_property("pointer-events", "none");
        body.append_child(&area).map_err(|e| rejected("clipboard", e))?;
        area.select();
        let copied = self.document.exec_command("copy");
        area.remove();
        match copied {
            Ok(true) => Ok(()),
            Ok(false) => Err(CapabilityError::Rejected {
                capability: "clipboard",
                reason: "execCommand(\"copy\") returned false".into(),
            }),
            Err(e) => Err(rejected("clipboard", e)),
        }
    }
}

impl Clipboard for ExecCommandClipboard {
    fn write_text(&self, text: &str) -> LocalBoxFuture<'static, Result<(), CapabilityError>> {
        ready(self.copy(text)).boxed_local()
    }
}

/// Saves through a temporary object URL and an `<a download>` click.
#[derive(Debug, Clone)]
pub struct BlobSaver {
    document: web_sys::Document,
}

impl FileSaver for BlobSaver {
    fn save(&self, filename: &str, content: &str) -> Result<(), CapabilityError> {
        let parts = js_sys::Array::of1(&JsValue::from_str(content));
        let options = BlobPropertyBag::new();
        options.set_type("text/plain;charset=utf-8");
        let blob = Blob::new_with_str_sequence_and_options(&parts, &options)
            .map_err(|e| rejected("file download", e))?;
        let url = Url::create_object_url_with_blob(&blob).map_err(|e| rejected("file download", e))?;

        let result = (|| {
            let anchor: HtmlAnchorElement = self.document.create_element("a")?.unchecked_into();
            anchor.set_href(&url);
            anchor.set_download(filename);
            let _ = anchor.style().set_property("display", "none");
            let body = self
                .document
                .body()
                .ok_or_else(|| JsValue::from_str("document has no body"))?;
            body.append_child(&anchor)?;
            anchor.click();
            anchor.remove();
            Ok::<_, JsValue>(())
        })();

        if let Err(e) = Url::revoke_object_url(&url) {
            tracing::debug!(error = ?e, "revokeObjectURL failed");
        }
        result.map_err(|e| rejected("file download", e))
    }
}

/// SHA-256 through `crypto.subtle.digest`.
#[derive(Debug, Clone)]
pub struct SubtleDigest {
    subtle: web_sys::SubtleCrypto,
}

impl ContentDigest for SubtleDigest {
    fn is_secure(&self) -> bool {
        true
    }

    fn digest(&self, data: &[u8]) -> LocalBoxFuture<'static, Result<Vec<u8>, CapabilityError>> {
        let bytes = js_sys::Uint8Array::from(data);
        let promise = self.subtle.digest_with_str_and_buffer_source("SHA-256", &bytes);
        async move {
            let promise = promise.map_err(|e| rejected("digest", e))?;
            let buffer = JsFuture::from(promise)
                .await
                .map_err(|e| rejected("digest", e))?;
            Ok(js_sys::Uint8Array::new(&buffer).to_vec())
        }
        .boxed_local()
    }
}

/// `window.location` without its fragment.
#[derive(Debug, Clone)]
pub struct WindowLocation {
    location: web_sys::Location,
}

impl PageLocation for WindowLocation {
    fn base_url(&self) -> String {
        let href = self.location.href().unwrap_or_default();
        match href.split_once('#') {
            Some((base, _)) => base.to_string(),
            None => href,
        }
    }
}

/// Whether the primary pointer is coarse (touch screens).
pub fn is_touch_device() -> bool {
    web_sys::window()
        .and_then(|w| w.match_media("(pointer: coarse)").ok().flatten())
        .is_some_and(|query| query.matches())
}

fn has_property(target: &JsValue, name: &str) -> bool {
    js_sys::Reflect::get(target, &JsValue::from_str(name)).is_ok_and(|v| !v.is_undefined())
}

/// Detect what the page offers and install fallbacks for the rest.
///
/// Without a window (workers, tests on a bare runtime) this is
/// [`Capabilities::headless`].
pub fn detect() -> Capabilities {
    let Some(window) = web_sys::window() else {
        return Capabilities::headless();
    };
    let document = window.document();
    let secure = window.is_secure_context();

    let navigator = window.navigator();
    let clipboard: Rc<dyn Clipboard> = if secure && has_property(&navigator, "clipboard") {
        Rc::new(AsyncClipboard {
            clipboard: navigator.clipboard(),
        })
    } else if let Some(document) = document.clone().and_then(|d| d.dyn_into::<HtmlDocument>().ok()) {
        Rc::new(ExecCommandClipboard { document })
    } else {
        Rc::new(NoClipboard)
    };

    let files: Rc<dyn FileSaver> = match document {
        Some(document) if has_property(&js_sys::global(), "Blob") => Rc::new(BlobSaver { document }),
        _ => Rc::new(NoFileSaver),
    };

    // crypto.subtle only exists in secure contexts; ring covers the rest.
    let digest: Rc<dyn ContentDigest> = match window.crypto() {
        Ok(crypto) if secure && has_property(&crypto, "subtle") => Rc::new(SubtleDigest {
            subtle: crypto.subtle(),
        }),
        _ => Rc::new(Sha256Digest),
    };

    let location: Rc<dyn PageLocation> = Rc::new(WindowLocation {
        location: window.location(),
    });

    let capabilities = Capabilities {
        clipboard,
        files,
        digest,
        location,
        touch: is_touch_device(),
    };
    tracing::debug!(?capabilities, secure, "detected browser capabilities");
    capabilities
}

/// Capabilities for a fixed URL with nothing else available.
pub fn offline(base_url: impl Into<String>) -> Capabilities {
    Capabilities {
        location: Rc::new(StaticLocation(base_url.into())),
        ..Capabilities::headless()
    }
}
