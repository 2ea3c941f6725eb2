//! In-memory document.
//!
//! `MemoryDom` implements [`Dom`] over an arena of nodes. It backs native
//! (non-browser) rendering through [`MemoryDom::outer_html`] and gives tests
//! direct access to things a browser hides: write counters, listener counts,
//! programmatic clicks and resizes, and a log of scroll targets.
//!
//! Mutation observers are notified synchronously, after the mutation has been
//! applied. Removing a node releases observers registered inside the removed
//! subtree, which is when a browser would stop reporting for it too.

mod selector;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::dom::{Callback, Dom, Rect};
use crate::escape::markup_to_text;

pub use selector::{Selector, SelectorParseError};

/// Handle to a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemNode(usize);

#[derive(Debug)]
enum Kind {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        style: Vec<(String, String)>,
    },
    Text(String),
    /// Opaque markup written through `set_inner_html`.
    Raw(String),
}

struct NodeData {
    kind: Kind,
    parent: Option<usize>,
    children: Vec<usize>,
    listeners: Vec<Callback>,
    rect: Rect,
    html_writes: usize,
}

struct Watcher {
    id: u64,
    target: usize,
    callback: Callback,
}

#[derive(Default)]
struct Arena {
    nodes: Vec<NodeData>,
    root: usize,
    mutation_watchers: Vec<Watcher>,
    resize_watchers: Vec<Watcher>,
    next_watcher: u64,
    scrolled: Vec<MemNode>,
}

impl Arena {
    fn push(&mut self, kind: Kind) -> usize {
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
            listeners: Vec::new(),
            rect: Rect::default(),
            html_writes: 0,
        });
        self.nodes.len() - 1
    }

    fn is_inclusive_ancestor(&self, ancestor: usize, mut node: usize) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.nodes[node].parent {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    fn detach(&mut self, node: usize) -> Option<usize> {
        let parent = self.nodes[node].parent.take()?;
        self.nodes[parent].children.retain(|&c| c != node);
        Some(parent)
    }

    fn descendants(&self, node: usize, out: &mut Vec<usize>) {
        for &child in &self.nodes[node].children {
            out.push(child);
            self.descendants(child, out);
        }
    }

    fn text_of(&self, node: usize, out: &mut String) {
        match &self.nodes[node].kind {
            Kind::Text(t) => out.push_str(t),
            Kind::Raw(html) => out.push_str(&markup_to_text(html)),
            Kind::Element { .. } => {
                for &child in &self.nodes[node].children {
                    self.text_of(child, out);
                }
            }
        }
    }

    fn replace_children(&mut self, node: usize, kind: Option<Kind>) {
        for child in std::mem::take(&mut self.nodes[node].children) {
            self.nodes[child].parent = None;
        }
        if let Some(kind) = kind {
            let child = self.push(kind);
            self.nodes[child].parent = Some(node);
            self.nodes[node].children.push(child);
        }
    }

    fn attrs(&self, node: usize) -> Option<&Vec<(String, String)>> {
        match &self.nodes[node].kind {
            Kind::Element { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    fn attr(&self, node: usize, name: &str) -> Option<&str> {
        self.attrs(node)?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn tag(&self, node: usize) -> Option<&str> {
        match &self.nodes[node].kind {
            Kind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn write_html(&self, node: usize, out: &mut String) {
        match &self.nodes[node].kind {
            Kind::Text(t) => escape_text(t, out),
            Kind::Raw(html) => out.push_str(html),
            Kind::Element { tag, attrs, style } => {
                out.push('<');
                out.push_str(tag);
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    escape_attr(v, out);
                    out.push('"');
                }
                if !style.is_empty() {
                    out.push_str(" style=\"");
                    let css: Vec<_> = style.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                    escape_attr(&css.join("; "), out);
                    out.push('"');
                }
                out.push('>');
                for &child in &self.nodes[node].children {
                    self.write_html(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Arena-backed [`Dom`] implementation.
#[derive(Clone)]
pub struct MemoryDom {
    arena: Rc<RefCell<Arena>>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryDom")
            .field("nodes", &self.arena.borrow().nodes.len())
            .finish()
    }
}

/// Keeps a [`MemoryDom`] observer registered until dropped.
pub struct MemoryObservation {
    id: u64,
    arena: Weak<RefCell<Arena>>,
}

impl Drop for MemoryObservation {
    fn drop(&mut self) {
        let Some(arena) = self.arena.upgrade() else {
            return;
        };
        let released = match arena.try_borrow_mut() {
            Ok(mut arena) => {
                let arena = &mut *arena;
                let mut released = Vec::new();
                for list in [&mut arena.mutation_watchers, &mut arena.resize_watchers] {
                    let (gone, kept): (Vec<Watcher>, Vec<Watcher>) =
                        std::mem::take(list).into_iter().partition(|w| w.id == self.id);
                    *list = kept;
                    released.extend(gone);
                }
                released
            }
            Err(_) => Vec::new(),
        };
        drop(released);
    }
}

impl MemoryDom {
    /// New document with an empty `body` root.
    pub fn new() -> Self {
        let mut arena = Arena::default();
        arena.root = arena.push(Kind::Element {
            tag: "body".into(),
            attrs: Vec::new(),
            style: Vec::new(),
        });
        Self {
            arena: Rc::new(RefCell::new(arena)),
        }
    }

    pub fn body(&self) -> MemNode {
        MemNode(self.arena.borrow().root)
    }

    /// Serialize a node and its subtree.
    pub fn outer_html(&self, node: &MemNode) -> String {
        let mut out = String::new();
        self.arena.borrow().write_html(node.0, &mut out);
        out
    }

    /// Serialize a node's children.
    pub fn inner_html(&self, node: &MemNode) -> String {
        let arena = self.arena.borrow();
        let mut out = String::new();
        for &child in &arena.nodes[node.0].children {
            arena.write_html(child, &mut out);
        }
        out
    }

    /// Append a text node, as a streaming writer would.
    pub fn append_text(&self, node: &MemNode, text: &str) {
        let child = self.create_text(text);
        self.append_child(node, &child);
    }

    /// Invoke every click listener registered on `node`.
    pub fn click(&self, node: &MemNode) {
        let listeners = self.arena.borrow().nodes[node.0].listeners.clone();
        for listener in listeners {
            listener();
        }
    }

    pub fn listener_count(&self, node: &MemNode) -> usize {
        self.arena.borrow().nodes[node.0].listeners.len()
    }

    /// Number of `set_inner_html` writes applied to `node`.
    pub fn html_writes(&self, node: &MemNode) -> usize {
        self.arena.borrow().nodes[node.0].html_writes
    }

    /// Set the box reported by `bounding_rect`.
    pub fn set_rect(&self, node: &MemNode, rect: Rect) {
        self.arena.borrow_mut().nodes[node.0].rect = rect;
    }

    /// Change a node's box and notify its resize observers.
    pub fn resize(&self, node: &MemNode, rect: Rect) {
        self.set_rect(node, rect);
        let callbacks: Vec<Callback> = {
            let arena = self.arena.borrow();
            arena
                .resize_watchers
                .iter()
                .filter(|w| w.target == node.0)
                .map(|w| w.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    pub fn style(&self, node: &MemNode, property: &str) -> Option<String> {
        match &self.arena.borrow().nodes[node.0].kind {
            Kind::Element { style, .. } => style
                .iter()
                .find(|(k, _)| k == property)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Nodes passed to `scroll_into_view`, oldest first.
    pub fn scrolled(&self) -> Vec<MemNode> {
        self.arena.borrow().scrolled.clone()
    }

    pub fn observer_count(&self) -> usize {
        self.arena.borrow().mutation_watchers.len()
    }

    /// Elements matching a parsed selector, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<MemNode> {
        let arena = self.arena.borrow();
        let mut all = vec![arena.root];
        arena.descendants(arena.root, &mut all);
        selector.filter(&arena, all).into_iter().map(MemNode).collect()
    }

    fn notify(&self, target: usize) {
        let callbacks: Vec<Callback> = {
            let arena = self.arena.borrow();
            arena
                .mutation_watchers
                .iter()
                .filter(|w| arena.is_inclusive_ancestor(w.target, target))
                .map(|w| w.callback.clone())
                .collect()
        };
        for callback in callbacks {
            callback();
        }
    }

    fn watch(&self, node: &MemNode, callback: Callback, resize: bool) -> MemoryObservation {
        let mut arena = self.arena.borrow_mut();
        arena.next_watcher += 1;
        let watcher = Watcher {
            id: arena.next_watcher,
            target: node.0,
            callback,
        };
        let id = watcher.id;
        if resize {
            arena.resize_watchers.push(watcher);
        } else {
            arena.mutation_watchers.push(watcher);
        }
        MemoryObservation {
            id,
            arena: Rc::downgrade(&self.arena),
        }
    }

    fn with_element<R>(
        &self,
        node: &MemNode,
        f: impl FnOnce(&mut Vec<(String, String)>, &mut Vec<(String, String)>) -> R,
    ) -> Option<R> {
        match &mut self.arena.borrow_mut().nodes[node.0].kind {
            Kind::Element { attrs, style, .. } => Some(f(attrs, style)),
            _ => None,
        }
    }
}

impl Dom for MemoryDom {
    type Node = MemNode;
    type Observation = MemoryObservation;

    fn create_element(&self, tag: &str) -> MemNode {
        MemNode(self.arena.borrow_mut().push(Kind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            style: Vec::new(),
        }))
    }

    fn create_text(&self, text: &str) -> MemNode {
        MemNode(self.arena.borrow_mut().push(Kind::Text(text.to_string())))
    }

    fn tag_name(&self, node: &MemNode) -> Option<String> {
        self.arena.borrow().tag(node.0).map(str::to_string)
    }

    fn parent(&self, node: &MemNode) -> Option<MemNode> {
        self.arena.borrow().nodes[node.0].parent.map(MemNode)
    }

    fn children(&self, node: &MemNode) -> Vec<MemNode> {
        self.arena.borrow().nodes[node.0]
            .children
            .iter()
            .copied()
            .map(MemNode)
            .collect()
    }

    fn append_child(&self, parent: &MemNode, child: &MemNode) {
        self.insert_before(parent, child, None);
    }

    fn insert_before(&self, parent: &MemNode, child: &MemNode, reference: Option<&MemNode>) {
        let old_parent = {
            let mut arena = self.arena.borrow_mut();
            let old_parent = arena.detach(child.0);
            let index = reference
                .and_then(|r| arena.nodes[parent.0].children.iter().position(|&c| c == r.0));
            let children = &mut arena.nodes[parent.0].children;
            match index {
                Some(i) => children.insert(i, child.0),
                None => children.push(child.0),
            }
            arena.nodes[child.0].parent = Some(parent.0);
            old_parent
        };
        if let Some(old) = old_parent.filter(|&p| p != parent.0) {
            self.notify(old);
        }
        self.notify(parent.0);
    }

    fn replace_with(&self, old: &MemNode, new: &MemNode) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.insert_before(&parent, new, Some(old));
        self.remove(old);
    }

    fn remove(&self, node: &MemNode) {
        let (parent, released) = {
            let mut arena = self.arena.borrow_mut();
            let parent = arena.detach(node.0);
            let mut subtree = vec![node.0];
            arena.descendants(node.0, &mut subtree);
            let (released, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut arena.mutation_watchers)
                .into_iter()
                .partition(|w| subtree.contains(&w.target));
            arena.mutation_watchers = kept;
            (parent, released)
        };
        drop(released);
        if let Some(parent) = parent {
            self.notify(parent);
        }
    }

    fn is_connected(&self, node: &MemNode) -> bool {
        let arena = self.arena.borrow();
        arena.is_inclusive_ancestor(arena.root, node.0)
    }

    fn attribute(&self, node: &MemNode, name: &str) -> Option<String> {
        self.arena.borrow().attr(node.0, name).map(str::to_string)
    }

    fn set_attribute(&self, node: &MemNode, name: &str, value: &str) {
        self.with_element(node, |attrs, _| {
            match attrs.iter_mut().find(|(k, _)| k == name) {
                Some((_, v)) => *v = value.to_string(),
                None => attrs.push((name.to_string(), value.to_string())),
            }
        });
    }

    fn remove_attribute(&self, node: &MemNode, name: &str) {
        self.with_element(node, |attrs, _| attrs.retain(|(k, _)| k != name));
    }

    fn attribute_names(&self, node: &MemNode) -> Vec<String> {
        self.arena
            .borrow()
            .attrs(node.0)
            .map(|attrs| attrs.iter().map(|(k, _)| k.clone()).collect())
            .unwrap_or_default()
    }

    fn text_content(&self, node: &MemNode) -> String {
        let mut out = String::new();
        self.arena.borrow().text_of(node.0, &mut out);
        out
    }

    fn set_text_content(&self, node: &MemNode, text: &str) {
        {
            let mut arena = self.arena.borrow_mut();
            if let Kind::Text(t) = &mut arena.nodes[node.0].kind {
                *t = text.to_string();
            } else {
                let child = (!text.is_empty()).then(|| Kind::Text(text.to_string()));
                arena.replace_children(node.0, child);
            }
        }
        self.notify(node.0);
    }

    fn set_inner_html(&self, node: &MemNode, html: &str) {
        {
            let mut arena = self.arena.borrow_mut();
            let child = (!html.is_empty()).then(|| Kind::Raw(html.to_string()));
            arena.replace_children(node.0, child);
            arena.nodes[node.0].html_writes += 1;
        }
        self.notify(node.0);
    }

    fn set_style(&self, node: &MemNode, property: &str, value: &str) {
        self.with_element(node, |_, style| {
            style.retain(|(k, _)| k != property);
            if !value.is_empty() {
                style.push((property.to_string(), value.to_string()));
            }
        });
    }

    fn query_selector_all(&self, selector: &str) -> Vec<MemNode> {
        match Selector::parse(selector) {
            Ok(selector) => self.select(&selector),
            Err(e) => {
                tracing::warn!(selector, error = %e, "invalid selector");
                Vec::new()
            }
        }
    }

    fn element_by_id(&self, id: &str) -> Option<MemNode> {
        let arena = self.arena.borrow();
        let mut all = vec![arena.root];
        arena.descendants(arena.root, &mut all);
        all.into_iter()
            .find(|&n| arena.attr(n, "id") == Some(id))
            .map(MemNode)
    }

    fn on_click(&self, node: &MemNode, handler: Callback) {
        self.arena.borrow_mut().nodes[node.0].listeners.push(handler);
    }

    fn observe_mutations(&self, node: &MemNode, callback: Callback) -> MemoryObservation {
        self.watch(node, callback, false)
    }

    fn observe_resize(&self, node: &MemNode, callback: Callback) -> MemoryObservation {
        self.watch(node, callback, true)
    }

    fn scroll_into_view(&self, node: &MemNode) {
        self.arena.borrow_mut().scrolled.push(*node);
    }

    fn bounding_rect(&self, node: &MemNode) -> Rect {
        self.arena.borrow().nodes[node.0].rect
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::dom::attribute_selector;

    #[test]
    fn test_build_and_serialize() {
        let dom = MemoryDom::new();
        let pre = dom.create_element("PRE");
        let code = dom.create_element("code");
        dom.set_attribute(&code, "class", "language-rust");
        dom.set_text_content(&code, "a < b");
        dom.append_child(&pre, &code);
        dom.append_child(&dom.body(), &pre);

        assert_eq!(
            dom.outer_html(&pre),
            r#"<pre><code class="language-rust">a &lt; b</code></pre>"#
        );
        assert_eq!(dom.text_content(&pre), "a < b");
        assert!(dom.is_connected(&code));
    }

    #[test]
    fn test_inner_html_counts_writes_and_decodes_text() {
        let dom = MemoryDom::new();
        let code = dom.create_element("code");
        dom.set_inner_html(&code, "<span class=\"k\">fn</span> x&amp;y");
        assert_eq!(dom.html_writes(&code), 1);
        assert_eq!(dom.text_content(&code), "fn x&y");
    }

    #[test]
    fn test_replace_with_keeps_position() {
        let dom = MemoryDom::new();
        let a = dom.create_element("p");
        let b = dom.create_element("div");
        let c = dom.create_element("p");
        dom.append_child(&dom.body(), &a);
        dom.append_child(&dom.body(), &b);
        dom.append_child(&dom.body(), &c);

        let replacement = dom.create_element("section");
        dom.replace_with(&b, &replacement);
        assert_eq!(dom.children(&dom.body()), vec![a, replacement, c]);
        assert!(!dom.is_connected(&b));
    }

    #[test]
    fn test_mutation_observer_sees_subtree_changes() {
        let dom = MemoryDom::new();
        let host = dom.create_element("div");
        dom.append_child(&dom.body(), &host);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let observation = dom.observe_mutations(&host, Rc::new(move || counter.set(counter.get() + 1)));

        dom.append_text(&host, "hello");
        let text = dom.first_child(&host).unwrap();
        dom.set_text_content(&text, "hello world");
        assert_eq!(hits.get(), 2);
        assert_eq!(dom.text_content(&host), "hello world");

        drop(observation);
        dom.append_text(&host, "!");
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn test_remove_releases_observers() {
        let dom = MemoryDom::new();
        let host = dom.create_element("div");
        dom.append_child(&dom.body(), &host);
        let _observation = dom.observe_mutations(&host, Rc::new(|| {}));
        assert_eq!(dom.observer_count(), 1);
        dom.remove(&host);
        assert_eq!(dom.observer_count(), 0);
    }

    #[test]
    fn test_query_selector_all_in_document_order() {
        let dom = MemoryDom::new();
        let pre = dom.create_element("pre");
        let code = dom.create_element("code");
        let other = dom.create_element("div");
        dom.set_attribute(&other, "class", "glint");
        dom.append_child(&pre, &code);
        dom.append_child(&dom.body(), &other);
        dom.append_child(&dom.body(), &pre);

        assert_eq!(dom.query_selector_all("pre code, .glint"), vec![other, code]);
        assert_eq!(dom.query_selector_all("div code"), Vec::<MemNode>::new());
        assert_eq!(dom.query_selector_all("body > pre > code"), vec![code]);
    }

    #[test]
    fn test_quoted_attribute_values_match_exactly() {
        let dom = MemoryDom::new();
        let listed = dom.create_element("div");
        dom.set_attribute(&listed, "data-x", "a, b");
        let quoted = dom.create_element("div");
        dom.set_attribute(&quoted, "data-x", r#"say "hi", then \ leave"#);
        dom.append_child(&dom.body(), &listed);
        dom.append_child(&dom.body(), &quoted);

        assert_eq!(dom.query_selector_all(r#"[data-x="a, b"]"#), vec![listed]);
        assert_eq!(dom.query_selector_all("[data-x='a, b'], span"), vec![listed]);
        assert_eq!(
            dom.query_selector_all(r#"[data-x="say \"hi\", then \\ leave"]"#),
            vec![quoted]
        );
        assert_eq!(
            dom.query_selector_all(&attribute_selector("data-x", r#"say "hi", then \ leave"#)),
            vec![quoted]
        );
        assert_eq!(dom.query_selector_all(r#"[data-x="a"]"#), Vec::<MemNode>::new());
        assert_eq!(dom.query_selector_all("[data-x]").len(), 2);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let dom = MemoryDom::new();
        dom.append_child(&dom.body(), &dom.create_element("div"));
        assert_eq!(dom.query_selector_all("div["), Vec::<MemNode>::new());
        assert_eq!(dom.query_selector_all("div:hover"), Vec::<MemNode>::new());
    }

    #[test]
    fn test_click_runs_listeners() {
        let dom = MemoryDom::new();
        let button = dom.create_element("button");
        let clicked = Rc::new(Cell::new(false));
        let flag = clicked.clone();
        dom.on_click(&button, Rc::new(move || flag.set(true)));
        dom.click(&button);
        assert!(clicked.get());
        assert_eq!(dom.listener_count(&button), 1);
    }
}
