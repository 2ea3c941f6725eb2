//! `Dom` over the live browser document.
//!
//! Node handles are `web_sys::Node`, so handle equality is JS identity.
//! DOM exceptions are logged and swallowed; a failed write leaves the block
//! in a degraded but consistent state and the next pass tries again.

use std::cell::RefCell;
use std::rc::Rc;

use gloo_events::EventListener;
use gloo_timers::callback::Interval;
use glint_core::{Callback, Dom, Rect};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{
    Document, Element, HtmlElement, MutationObserver, MutationObserverInit, Node, NodeList,
    ResizeObserver, ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition,
};

/// Poll period used where `MutationObserver` is missing.
pub const POLL_INTERVAL_MS: u32 = 250;

type ObserverCallback<O> = Closure<dyn FnMut(js_sys::Array, O)>;

/// Log a failed DOM call and turn it into an `Option`.
pub(crate) fn check<T>(op: &'static str, result: Result<T, JsValue>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(op, error = ?e, "DOM operation failed");
            None
        }
    }
}

/// Whether `name` exists on the global object.
pub fn has_global(name: &str) -> bool {
    js_sys::Reflect::has(&js_sys::global(), &JsValue::from_str(name)).unwrap_or(false)
}

fn node_vec(list: NodeList) -> Vec<Node> {
    (0..list.length()).filter_map(|i| list.get(i)).collect()
}

/// The browser document.
#[derive(Debug, Clone)]
pub struct WebDom {
    document: Document,
}

impl WebDom {
    /// The current window's document, if there is one.
    pub fn new() -> Option<Self> {
        let document = web_sys::window()?.document()?;
        Some(Self { document })
    }

    pub fn from_document(document: Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn poll_text(&self, node: &Node, slot: CallbackSlot) -> WebObservation {
        let target = node.clone();
        let mut last = target.text_content().unwrap_or_default();
        let interval = Interval::new(POLL_INTERVAL_MS, move || {
            if !target.is_connected() {
                slot.release();
                return;
            }
            let text = target.text_content().unwrap_or_default();
            if text != last {
                last = text;
                slot.fire();
            }
        });
        WebObservation::single(Watch::Interval(interval))
    }
}

/// Shared callback that can be released from inside an observer.
///
/// Releasing drops the page-side callback, which is how a watcher learns its
/// node has left the document.
#[derive(Clone)]
struct CallbackSlot(Rc<RefCell<Option<Callback>>>);

impl CallbackSlot {
    fn new(callback: Callback) -> Self {
        Self(Rc::new(RefCell::new(Some(callback))))
    }

    fn fire(&self) {
        let callback = self.0.borrow().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn release(&self) {
        if self.0.borrow_mut().take().is_some() {
            tracing::trace!("observed node left the document");
        }
    }
}

enum Watch {
    Mutation {
        observer: MutationObserver,
        _callback: ObserverCallback<MutationObserver>,
    },
    Resize {
        observer: ResizeObserver,
        _callback: ObserverCallback<ResizeObserver>,
    },
    Interval(Interval),
    Listener(EventListener),
}

impl Drop for Watch {
    fn drop(&mut self) {
        match self {
            Watch::Mutation { observer, .. } => observer.disconnect(),
            Watch::Resize { observer, .. } => observer.disconnect(),
            Watch::Interval(_) | Watch::Listener(_) => {}
        }
    }
}

/// Registered observers for one node. Dropping it disconnects them.
#[derive(Default)]
pub struct WebObservation {
    watches: Vec<Watch>,
}

impl WebObservation {
    fn single(watch: Watch) -> Self {
        Self {
            watches: vec![watch],
        }
    }

    /// Number of live observers and timers held.
    pub fn len(&self) -> usize {
        self.watches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.is_empty()
    }
}

impl std::fmt::Debug for WebObservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebObservation")
            .field("watches", &self.watches.len())
            .finish()
    }
}

fn mutation_observer(
    node: &Node,
    init: &MutationObserverInit,
    mut on_records: impl FnMut() + 'static,
) -> Option<Watch> {
    let callback: ObserverCallback<MutationObserver> =
        Closure::new(move |_records: js_sys::Array, _observer: MutationObserver| on_records());
    let observer = check(
        "MutationObserver::new",
        MutationObserver::new(callback.as_ref().unchecked_ref()),
    )?;
    check("MutationObserver::observe", observer.observe_with_options(node, init))?;
    Some(Watch::Mutation {
        observer,
        _callback: callback,
    })
}

impl Dom for WebDom {
    type Node = Node;
    type Observation = WebObservation;

    fn create_element(&self, tag: &str) -> Node {
        match self.document.create_element(tag) {
            Ok(element) => element.into(),
            Err(e) => {
                // Only invalid tag names throw, and glint only creates known tags.
                tracing::error!(tag, error = ?e, "createElement failed");
                self.document.create_text_node("").into()
            }
        }
    }

    fn create_text(&self, text: &str) -> Node {
        self.document.create_text_node(text).into()
    }

    fn tag_name(&self, node: &Node) -> Option<String> {
        node.dyn_ref::<Element>().map(|e| e.tag_name().to_ascii_lowercase())
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn children(&self, node: &Node) -> Vec<Node> {
        node_vec(node.child_nodes())
    }

    fn append_child(&self, parent: &Node, child: &Node) {
        check("appendChild", parent.append_child(child));
    }

    fn insert_before(&self, parent: &Node, child: &Node, reference: Option<&Node>) {
        check("insertBefore", parent.insert_before(child, reference));
    }

    fn replace_with(&self, old: &Node, new: &Node) {
        if let Some(parent) = old.parent_node() {
            check("replaceChild", parent.replace_child(new, old));
        }
    }

    fn remove(&self, node: &Node) {
        if let Some(parent) = node.parent_node() {
            check("removeChild", parent.remove_child(node));
        }
    }

    fn is_connected(&self, node: &Node) -> bool {
        node.is_connected()
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn set_attribute(&self, node: &Node, name: &str, value: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            check("setAttribute", element.set_attribute(name, value));
        }
    }

    fn remove_attribute(&self, node: &Node, name: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            check("removeAttribute", element.remove_attribute(name));
        }
    }

    fn attribute_names(&self, node: &Node) -> Vec<String> {
        let Some(element) = node.dyn_ref::<Element>() else {
            return Vec::new();
        };
        element
            .get_attribute_names()
            .iter()
            .filter_map(|name| name.as_string())
            .collect()
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn set_text_content(&self, node: &Node, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_inner_html(&self, node: &Node, html: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            element.set_inner_html(html);
        }
    }

    fn set_style(&self, node: &Node, property: &str, value: &str) {
        let Some(element) = node.dyn_ref::<HtmlElement>() else {
            return;
        };
        let style = element.style();
        if value.is_empty() {
            check("removeProperty", style.remove_property(property));
        } else {
            check("setProperty", style.set_property(property, value));
        }
    }

    fn query_selector_all(&self, selector: &str) -> Vec<Node> {
        check("querySelectorAll", self.document.query_selector_all(selector))
            .map(node_vec)
            .unwrap_or_default()
    }

    fn element_by_id(&self, id: &str) -> Option<Node> {
        self.document.get_element_by_id(id).map(Into::into)
    }

    fn on_click(&self, node: &Node, handler: Callback) {
        // Lives as long as the page; buttons are never rebound.
        EventListener::new(node, "click", move |_event| handler()).forget();
    }

    fn observe_mutations(&self, node: &Node, callback: Callback) -> WebObservation {
        let slot = CallbackSlot::new(callback);
        if !has_global("MutationObserver") {
            tracing::debug!("MutationObserver unavailable, polling text content");
            return self.poll_text(node, slot);
        }

        let mut observation = WebObservation::default();
        let content = MutationObserverInit::new();
        content.set_child_list(true);
        content.set_subtree(true);
        content.set_character_data(true);
        let fire = slot.clone();
        observation
            .watches
            .extend(mutation_observer(node, &content, move || fire.fire()));

        // Observers keep reporting for removed nodes, so watch the document
        // for the node's removal separately.
        let tree = MutationObserverInit::new();
        tree.set_child_list(true);
        tree.set_subtree(true);
        let target = node.clone();
        let root: Node = self.document.clone().into();
        observation.watches.extend(mutation_observer(&root, &tree, move || {
            if !target.is_connected() {
                slot.release();
            }
        }));
        observation
    }

    fn observe_resize(&self, node: &Node, callback: Callback) -> WebObservation {
        let element = node.dyn_ref::<Element>();
        if let Some(element) = element.filter(|_| has_global("ResizeObserver")) {
            let handler = callback.clone();
            let closure: ObserverCallback<ResizeObserver> =
                Closure::new(move |_entries: js_sys::Array, _observer: ResizeObserver| handler());
            if let Some(observer) = check(
                "ResizeObserver::new",
                ResizeObserver::new(closure.as_ref().unchecked_ref()),
            ) {
                observer.observe(element);
                return WebObservation::single(Watch::Resize {
                    observer,
                    _callback: closure,
                });
            }
        }

        tracing::debug!("ResizeObserver unavailable, listening for window resize");
        let Some(window) = web_sys::window() else {
            return WebObservation::default();
        };
        let listener = EventListener::new(&window, "resize", move |_event| callback());
        WebObservation::single(Watch::Listener(listener))
    }

    fn scroll_into_view(&self, node: &Node) {
        let Some(element) = node.dyn_ref::<Element>() else {
            return;
        };
        let options = ScrollIntoViewOptions::new();
        options.set_behavior(ScrollBehavior::Smooth);
        options.set_block(ScrollLogicalPosition::Center);
        element.scroll_into_view_with_scroll_into_view_options(&options);
    }

    fn bounding_rect(&self, node: &Node) -> Rect {
        let Some(element) = node.dyn_ref::<Element>() else {
            return Rect::default();
        };
        let rect = element.get_bounding_client_rect();
        Rect {
            top: rect.top(),
            left: rect.left(),
            width: rect.width(),
            height: rect.height(),
        }
    }

    fn has_class(&self, node: &Node, class: &str) -> bool {
        node.dyn_ref::<Element>()
            .is_some_and(|e| e.class_list().contains(class))
    }

    fn add_class(&self, node: &Node, class: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            check("classList.add", element.class_list().add_1(class));
        }
    }

    fn remove_class(&self, node: &Node, class: &str) {
        if let Some(element) = node.dyn_ref::<Element>() {
            check("classList.remove", element.class_list().remove_1(class));
        }
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn first_child(&self, node: &Node) -> Option<Node> {
        node.first_child()
    }
}
