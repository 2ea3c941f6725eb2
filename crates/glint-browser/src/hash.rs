//! URL fragment plumbing.

use gloo_events::EventListener;

/// The current fragment without its `#`, if non-empty.
pub fn current_fragment() -> Option<String> {
    let hash = web_sys::window()?.location().hash().ok()?;
    let fragment = hash.strip_prefix('#').unwrap_or(&hash);
    (!fragment.is_empty()).then(|| fragment.to_string())
}

/// Call `handler` with the new fragment on every `hashchange`.
///
/// The listener is removed when the returned guard is dropped.
pub fn on_hash_change(handler: impl Fn(String) + 'static) -> Option<EventListener> {
    let window = web_sys::window()?;
    Some(EventListener::new(&window, "hashchange", move |_event| {
        if let Some(fragment) = current_fragment() {
            handler(fragment);
        }
    }))
}
