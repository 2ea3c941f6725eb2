//! Markup normalization.
//!
//! Source elements arrive in two shapes: a `code` already inside a `pre`, or
//! any other element whose text is the snippet. Both end up as the canonical
//! `container > pre > code` structure described by [`BlockNodes`]. Live blocks
//! additionally get a hidden mirror sibling that receives streamed text.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::attrs;
use crate::dom::{Dom, NodeRole, attribute_selector};
use crate::error::GlintError;

/// Attributes glint writes on the nodes it owns.
pub mod marks {
    /// Opaque token pairing a mirror with its container.
    pub const TOKEN: &str = "data-glint-token";
    /// DOM id the source element carried before normalization.
    pub const ORIGINAL_ID: &str = "data-glint-original-id";
    /// Resolved block identity.
    pub const IDENTITY: &str = "data-glint-id";
}

/// Typed handles to one block's canonical nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockNodes<N> {
    pub container: N,
    pub pre: N,
    pub code: N,
    /// Hidden raw-text node, live blocks only.
    pub mirror: Option<N>,
}

impl<N> BlockNodes<N> {
    /// The node whose text is authoritative.
    pub fn source(&self) -> &N {
        self.mirror.as_ref().unwrap_or(&self.code)
    }
}

/// Result of normalizing one source element.
#[derive(Debug, Clone)]
pub struct Normalized<N> {
    pub nodes: BlockNodes<N>,
    pub original_id: Option<String>,
    /// Trimmed snippet text at normalization time.
    pub text: String,
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn correlation_token() -> String {
    format!("glint-{:x}", NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
}

/// Reject elements glint already owns or that are not on the page.
pub fn check_source<D: Dom>(dom: &D, source: &D::Node) -> Result<(), GlintError> {
    match NodeRole::of(dom, source) {
        Some(NodeRole::Mirror) => return Err(GlintError::HiddenMirror),
        Some(NodeRole::Container) => return Err(GlintError::AlreadyDecorated),
        _ => {}
    }
    let inside = dom.closest(source, |n| {
        NodeRole::of(dom, n).is_some_and(|r| matches!(r, NodeRole::Container | NodeRole::Mirror))
    });
    match inside.and_then(|n| NodeRole::of(dom, &n)) {
        Some(NodeRole::Mirror) => Err(GlintError::HiddenMirror),
        Some(_) => Err(GlintError::AlreadyDecorated),
        None if !dom.is_connected(source) => Err(GlintError::Detached),
        None => Ok(()),
    }
}

/// A `code` element directly inside a `pre`.
pub fn is_pre_normalized<D: Dom>(dom: &D, source: &D::Node) -> bool {
    dom.is_element(source, "code")
        && dom
            .parent(source)
            .is_some_and(|p| dom.is_element(&p, "pre"))
}

/// Elements whose attributes configure `source`, most specific first.
pub fn config_sources<D: Dom>(dom: &D, source: &D::Node) -> Vec<D::Node> {
    let mut sources = vec![source.clone()];
    if is_pre_normalized(dom, source) {
        sources.extend(dom.parent(source));
    }
    sources
}

/// First value of `name` across `sources`.
pub fn lookup_attribute<D: Dom>(dom: &D, sources: &[D::Node], name: &str) -> Option<String> {
    sources.iter().find_map(|n| dom.attribute(n, name))
}

/// Canonicalize `source` and, for live blocks, create its mirror.
///
/// Callers are expected to have run [`check_source`] first.
pub fn normalize<D: Dom>(dom: &D, source: &D::Node, live: bool) -> Normalized<D::Node> {
    let sources = config_sources(dom, source);
    let text = dom.text_content(source).trim().to_string();
    let original_id = lookup_attribute(dom, &sources, "id").filter(|id| !id.is_empty());

    let container = NodeRole::Container.create(dom, "div");
    for name in attrs::ALL {
        if let Some(value) = lookup_attribute(dom, &sources, name) {
            dom.set_attribute(&container, name, &value);
        }
    }

    let existing_pre = is_pre_normalized(dom, source)
        .then(|| dom.parent(source))
        .flatten();
    let (pre, code) = if let Some(pre) = existing_pre {
        if let Some(parent) = dom.parent(&pre) {
            dom.insert_before(&parent, &container, Some(&pre));
        }
        dom.append_child(&container, &pre);
        for node in &sources {
            dom.remove_attribute(node, "id");
        }
        NodeRole::Pre.mark(dom, &pre);
        NodeRole::Code.mark(dom, source);
        (pre, source.clone())
    } else {
        let pre = NodeRole::Pre.create(dom, "pre");
        let code = NodeRole::Code.create(dom, "code");
        dom.set_text_content(&code, &text);
        dom.append_child(&pre, &code);
        dom.append_child(&container, &pre);
        dom.replace_with(source, &container);
        (pre, code)
    };

    let mirror = if live {
        Some(create_mirror(dom, &container, &text, original_id.as_deref()))
    } else {
        if let Some(id) = &original_id {
            dom.set_attribute(&container, "id", id);
        }
        None
    };
    if let Some(id) = &original_id {
        dom.set_attribute(&container, marks::ORIGINAL_ID, id);
    }

    tracing::debug!(
        live,
        original_id = original_id.as_deref(),
        len = text.len(),
        "normalized code block"
    );

    Normalized {
        nodes: BlockNodes {
            container,
            pre,
            code,
            mirror,
        },
        original_id,
        text,
    }
}

fn create_mirror<D: Dom>(dom: &D, container: &D::Node, text: &str, id: Option<&str>) -> D::Node {
    let mirror = NodeRole::Mirror.create(dom, "div");
    dom.set_attribute(&mirror, "hidden", "");
    dom.set_attribute(&mirror, "aria-hidden", "true");
    dom.set_style(&mirror, "display", "none");
    dom.set_text_content(&mirror, text);
    if let Some(id) = id {
        dom.set_attribute(&mirror, "id", id);
    }

    let token = correlation_token();
    dom.set_attribute(&mirror, marks::TOKEN, &token);
    dom.set_attribute(container, marks::TOKEN, &token);

    if let Some(parent) = dom.parent(container) {
        dom.insert_before(&parent, &mirror, Some(container));
    }
    mirror
}

/// Container paired with `mirror`.
pub fn container_for_mirror<D: Dom>(dom: &D, mirror: &D::Node) -> Option<D::Node> {
    let token = dom.attribute(mirror, marks::TOKEN)?;
    dom.query_selector_all(&attribute_selector(marks::TOKEN, &token))
        .into_iter()
        .find(|n| NodeRole::of(dom, n) == Some(NodeRole::Container))
}
