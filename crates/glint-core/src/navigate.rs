//! Fragment navigation.
//!
//! `#id` scrolls to a block, `#id_line` additionally lays a transient overlay
//! over that line. Blocks may be rendered after the fragment is handled, so
//! lookups retry with exponential backoff for a bounded number of attempts.

use std::time::Duration;

use futures_util::FutureExt;

use crate::dom::{Dom, NodeRole, Rect, attribute_selector};
use crate::gutter::line_count;
use crate::identity::parse_fragment;
use crate::normalize::{container_for_mirror, marks};
use crate::schedule::Scheduler;

/// How long the line overlay and target class stay.
pub const HIGHLIGHT_DURATION: Duration = Duration::from_millis(2500);
/// Lookup attempts before giving up.
pub const MAX_ATTEMPTS: u32 = 5;
/// Delay before the second attempt; doubles every attempt after that.
pub const BASE_DELAY: Duration = Duration::from_millis(100);

/// Class set on a block while it is the navigation target.
pub const TARGET_CLASS: &str = "glint-target";

/// Resolved navigation target.
#[derive(Debug, Clone, PartialEq)]
pub struct Target<N> {
    pub container: N,
    pub line: Option<i64>,
}

/// Find the container with identity `id`, via mirror or visible node.
pub fn locate<D: Dom>(dom: &D, id: &str) -> Option<D::Node> {
    if let Some(node) = dom.element_by_id(id) {
        let found = match NodeRole::of(dom, &node) {
            Some(NodeRole::Mirror) => container_for_mirror(dom, &node),
            _ => dom.closest(&node, |n| NodeRole::of(dom, n) == Some(NodeRole::Container)),
        };
        if found.is_some() {
            return found;
        }
    }
    [marks::IDENTITY, marks::ORIGINAL_ID].iter().find_map(|attr| {
        dom.query_selector_all(&attribute_selector(attr, id))
            .into_iter()
            .find(|n| NodeRole::of(dom, n) == Some(NodeRole::Container))
    })
}

/// Resolve a fragment, trying the literal id before an `id_line` split.
pub fn resolve<D: Dom>(dom: &D, fragment: &str) -> Option<Target<D::Node>> {
    parse_fragment(fragment).into_iter().find_map(|candidate| {
        locate(dom, &candidate.id).map(|container| Target {
            container,
            line: candidate.line,
        })
    })
}

fn find_descendant<D: Dom>(dom: &D, root: &D::Node, pred: &impl Fn(&D::Node) -> bool) -> Option<D::Node> {
    for child in dom.children(root) {
        if pred(&child) {
            return Some(child);
        }
        if let Some(found) = find_descendant(dom, &child, pred) {
            return Some(found);
        }
    }
    None
}

fn child_with_role<D: Dom>(dom: &D, root: &D::Node, role: NodeRole) -> Option<D::Node> {
    find_descendant(dom, root, &|n| NodeRole::of(dom, n) == Some(role))
}

/// Box of line `line` relative to the container, full width.
///
/// Uses the gutter entry when there is one, otherwise divides the code box
/// evenly by its line count.
pub fn line_box<D: Dom>(dom: &D, container: &D::Node, line: i64) -> Option<Rect> {
    let outer = dom.bounding_rect(container);
    let value = line.to_string();
    let entry = find_descendant(dom, container, &|n| {
        NodeRole::of(dom, n) == Some(NodeRole::Line)
            && dom.attribute(n, "data-line").as_deref() == Some(value.as_str())
    });
    let row = match entry {
        Some(entry) => dom.bounding_rect(&entry),
        None => {
            let code = child_with_role(dom, container, NodeRole::Code)?;
            let count = line_count(&dom.text_content(&code));
            let start = dom
                .attribute(container, "data-line-start")
                .and_then(|s| s.parse::<i64>().ok())
                .unwrap_or(1);
            let index = usize::try_from(line.checked_sub(start)?).ok()?;
            if index >= count {
                return None;
            }
            let code_box = dom.bounding_rect(&code);
            let height = code_box.height / count as f64;
            Rect {
                top: code_box.top + height * index as f64,
                left: code_box.left,
                width: code_box.width,
                height,
            }
        }
    };
    Some(Rect {
        top: row.top - outer.top,
        left: 0.0,
        width: outer.width,
        height: row.height,
    })
}

/// Scrolls to fragment targets and highlights them.
#[derive(Debug, Clone)]
pub struct Navigator<D, S> {
    dom: D,
    scheduler: S,
    attempts: u32,
}

impl<D: Dom, S: Scheduler> Navigator<D, S> {
    pub fn new(dom: D, scheduler: S) -> Self {
        Self {
            dom,
            scheduler,
            attempts: MAX_ATTEMPTS,
        }
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    /// Navigate to `fragment`, retrying while the block doesn't exist yet.
    ///
    /// Resolves to the revealed target, or `None` after the last attempt.
    pub async fn navigate(&self, fragment: &str) -> Option<Target<D::Node>> {
        if parse_fragment(fragment).is_empty() {
            return None;
        }
        for attempt in 0..self.attempts {
            if let Some(target) = resolve(&self.dom, fragment) {
                self.reveal(&target);
                return Some(target);
            }
            if attempt + 1 < self.attempts {
                let delay = BASE_DELAY * 2u32.saturating_pow(attempt);
                tracing::debug!(fragment, attempt, ?delay, "navigation target not found, retrying");
                self.scheduler.sleep(delay).await;
            }
        }
        tracing::warn!(fragment, attempts = self.attempts, "navigation target not found");
        None
    }

    /// Scroll to the target and mark it, with an overlay for a line target.
    pub fn reveal(&self, target: &Target<D::Node>) {
        let dom = &self.dom;
        let container = &target.container;
        dom.scroll_into_view(container);
        dom.add_class(container, TARGET_CLASS);

        let overlay = target.line.and_then(|line| {
            let Some(row) = line_box(dom, container, line) else {
                tracing::debug!(line, "line not present in block");
                return None;
            };
            let overlay = NodeRole::Overlay.create(dom, "div");
            dom.set_attribute(&overlay, "aria-hidden", "true");
            dom.set_attribute(&overlay, "data-line", &line.to_string());
            dom.set_style(&overlay, "position", "absolute");
            dom.set_style(&overlay, "pointer-events", "none");
            dom.set_style(&overlay, "top", &format!("{}px", row.top));
            dom.set_style(&overlay, "left", "0");
            dom.set_style(&overlay, "width", "100%");
            dom.set_style(&overlay, "height", &format!("{}px", row.height));
            dom.append_child(container, &overlay);
            Some(overlay)
        });

        let dom = self.dom.clone();
        let container = container.clone();
        let sleep = self.scheduler.sleep(HIGHLIGHT_DURATION);
        self.scheduler.spawn(
            async move {
                sleep.await;
                if let Some(overlay) = overlay {
                    dom.remove(&overlay);
                }
                dom.remove_class(&container, TARGET_CLASS);
            }
            .boxed_local(),
        );
    }
}
