//! Platform abstraction over the document.
//!
//! Everything in glint that touches markup goes through [`Dom`], so the same
//! normalization, decoration and reconciliation logic runs against the real
//! browser DOM (`glint-browser`) and against [`MemoryDom`](crate::MemoryDom)
//! natively.

use std::rc::Rc;

/// Selector matching elements whose `name` attribute is exactly `value`.
///
/// The value is written as a CSS string, so quotes, backslashes and
/// newlines in it are escaped.
pub fn attribute_selector(name: &str, value: &str) -> String {
    let mut selector = format!("[{name}=");
    // Writing into a String cannot fail.
    let _ = cssparser::serialize_string(value, &mut selector);
    selector.push(']');
    selector
}

/// Callback invoked by click listeners and observers.
pub type Callback = Rc<dyn Fn()>;

/// Border box of a node, in CSS pixels relative to the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

/// Document operations needed to build and maintain code blocks.
///
/// `Node` handles compare equal when they refer to the same underlying node,
/// which is what identity-preservation guarantees are stated in terms of.
pub trait Dom: Clone + 'static {
    type Node: Clone + PartialEq + std::fmt::Debug + 'static;
    /// Keeps an observer registered. Dropping it stops observation.
    type Observation: 'static;

    fn create_element(&self, tag: &str) -> Self::Node;
    fn create_text(&self, text: &str) -> Self::Node;

    /// Lowercase tag name, `None` for non-element nodes.
    fn tag_name(&self, node: &Self::Node) -> Option<String>;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn children(&self, node: &Self::Node) -> Vec<Self::Node>;
    fn append_child(&self, parent: &Self::Node, child: &Self::Node);
    /// Insert `child` before `reference`, or append when `reference` is `None`.
    fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>);
    /// Put `new` in `old`'s place in the tree.
    fn replace_with(&self, old: &Self::Node, new: &Self::Node);
    fn remove(&self, node: &Self::Node);
    fn is_connected(&self, node: &Self::Node) -> bool;

    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;
    fn set_attribute(&self, node: &Self::Node, name: &str, value: &str);
    fn remove_attribute(&self, node: &Self::Node, name: &str);
    fn attribute_names(&self, node: &Self::Node) -> Vec<String>;

    fn text_content(&self, node: &Self::Node) -> String;
    fn set_text_content(&self, node: &Self::Node, text: &str);
    /// Replace the node's children with already-escaped markup.
    fn set_inner_html(&self, node: &Self::Node, html: &str);
    /// Set an inline style property; an empty value clears it.
    fn set_style(&self, node: &Self::Node, property: &str, value: &str);

    fn query_selector_all(&self, selector: &str) -> Vec<Self::Node>;
    fn element_by_id(&self, id: &str) -> Option<Self::Node>;

    /// Register a click listener for the lifetime of the node.
    fn on_click(&self, node: &Self::Node, handler: Callback);
    /// Report character-data and child-list changes anywhere under `node`.
    fn observe_mutations(&self, node: &Self::Node, callback: Callback) -> Self::Observation;
    /// Report size changes of `node`.
    fn observe_resize(&self, node: &Self::Node, callback: Callback) -> Self::Observation;

    fn scroll_into_view(&self, node: &Self::Node);
    fn bounding_rect(&self, node: &Self::Node) -> Rect;

    fn classes(&self, node: &Self::Node) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    fn add_class(&self, node: &Self::Node, class: &str) {
        let mut classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    fn remove_class(&self, node: &Self::Node, class: &str) {
        let classes = self.classes(node);
        if classes.iter().any(|c| c == class) {
            let kept: Vec<_> = classes.into_iter().filter(|c| c != class).collect();
            self.set_attribute(node, "class", &kept.join(" "));
        }
    }

    /// Set an attribute only if its value differs, returning whether it changed.
    fn update_attribute(&self, node: &Self::Node, name: &str, value: &str) -> bool {
        if self.attribute(node, name).as_deref() == Some(value) {
            return false;
        }
        self.set_attribute(node, name, value);
        true
    }

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node> {
        self.children(node).into_iter().next()
    }

    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node> {
        let parent = self.parent(node)?;
        let siblings = self.children(&parent);
        let index = siblings.iter().position(|s| s == node)?;
        siblings.into_iter().nth(index + 1)
    }

    /// Closest inclusive ancestor matching `pred`.
    fn closest(&self, node: &Self::Node, pred: impl Fn(&Self::Node) -> bool) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if pred(&n) {
                return Some(n);
            }
            current = self.parent(&n);
        }
        None
    }

    fn is_element(&self, node: &Self::Node, tag: &str) -> bool {
        self.tag_name(node).is_some_and(|t| t == tag)
    }
}

/// Structural role of a glint-owned node.
///
/// Roles are recorded in the `data-glint-role` attribute so stylesheets and
/// lookups can find them, but code holds typed handles in
/// [`BlockNodes`](crate::normalize::BlockNodes) rather than re-deriving roles
/// from class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Container,
    Pre,
    Code,
    Mirror,
    Header,
    Label,
    Buttons,
    CopyButton,
    DownloadButton,
    ShareButton,
    Gutter,
    Line,
    LineShare,
    Overlay,
}

impl NodeRole {
    pub const ATTR: &'static str = "data-glint-role";

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRole::Container => "container",
            NodeRole::Pre => "pre",
            NodeRole::Code => "code",
            NodeRole::Mirror => "mirror",
            NodeRole::Header => "header",
            NodeRole::Label => "label",
            NodeRole::Buttons => "buttons",
            NodeRole::CopyButton => "copy",
            NodeRole::DownloadButton => "download",
            NodeRole::ShareButton => "share",
            NodeRole::Gutter => "gutter",
            NodeRole::Line => "line",
            NodeRole::LineShare => "line-share",
            NodeRole::Overlay => "overlay",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "container" => NodeRole::Container,
            "pre" => NodeRole::Pre,
            "code" => NodeRole::Code,
            "mirror" => NodeRole::Mirror,
            "header" => NodeRole::Header,
            "label" => NodeRole::Label,
            "buttons" => NodeRole::Buttons,
            "copy" => NodeRole::CopyButton,
            "download" => NodeRole::DownloadButton,
            "share" => NodeRole::ShareButton,
            "gutter" => NodeRole::Gutter,
            "line" => NodeRole::Line,
            "line-share" => NodeRole::LineShare,
            "overlay" => NodeRole::Overlay,
            _ => return None,
        })
    }

    /// CSS class carried alongside the role attribute.
    pub fn class(&self) -> String {
        format!("glint-{}", self.as_str())
    }

    pub fn of<D: Dom>(dom: &D, node: &D::Node) -> Option<Self> {
        dom.attribute(node, Self::ATTR).and_then(|r| Self::parse(&r))
    }

    pub fn mark<D: Dom>(&self, dom: &D, node: &D::Node) {
        dom.set_attribute(node, Self::ATTR, self.as_str());
        dom.add_class(node, &self.class());
    }

    /// Create an element already marked with this role.
    pub fn create<D: Dom>(&self, dom: &D, tag: &str) -> D::Node {
        let node = dom.create_element(tag);
        self.mark(dom, &node);
        node
    }
}
