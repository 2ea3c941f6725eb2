//! Line-number gutter.
//!
//! The gutter is built once and then diffed: a count change appends or
//! removes only the trailing entries, so entries for lines that survive an
//! edit keep their DOM nodes and listeners.

use std::cell::Cell;
use std::rc::Rc;

use crate::decorate::Actions;
use crate::dom::{Dom, NodeRole};
use crate::identity::line_fragment;
use crate::schedule::Scheduler;
use crate::tables::icons;

/// Number of newline-delimited lines in trimmed `text`. Empty text has none.
pub fn line_count(text: &str) -> usize {
    let text = text.trim();
    if text.is_empty() {
        0
    } else {
        text.split('\n').count()
    }
}

/// Nodes created and removed by one gutter update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GutterDiff {
    pub created: usize,
    pub removed: usize,
}

struct LineEntry<N> {
    node: N,
    number_node: N,
    share: Option<N>,
    /// Line number read by the share handler at click time.
    line: Rc<Cell<i64>>,
}

/// Gutter of one block.
pub struct Gutter<D: Dom, S: Scheduler> {
    dom: D,
    node: D::Node,
    entries: Vec<LineEntry<D::Node>>,
    start: i64,
    /// Present when lines carry share controls.
    share: Option<Actions<D, S>>,
    identity: Option<String>,
    line_height: Option<f64>,
}

impl<D: Dom, S: Scheduler> std::fmt::Debug for Gutter<D, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gutter")
            .field("lines", &self.entries.len())
            .field("start", &self.start)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl<D: Dom, S: Scheduler> Gutter<D, S> {
    /// Build a gutter of `count` entries as the first child of `pre`.
    pub fn add_line_numbers(
        dom: &D,
        pre: &D::Node,
        count: usize,
        start: i64,
        share: Option<Actions<D, S>>,
        identity: Option<&str>,
    ) -> Self {
        let node = NodeRole::Gutter.create(dom, "div");
        dom.set_attribute(&node, "aria-hidden", "true");
        let first = dom.first_child(pre);
        dom.insert_before(pre, &node, first.as_ref());
        dom.add_class(pre, "glint-numbered");

        let mut gutter = Self {
            dom: dom.clone(),
            node,
            entries: Vec::with_capacity(count),
            start,
            share,
            identity: identity.map(str::to_string),
            line_height: None,
        };
        gutter.append(count);
        gutter
    }

    pub fn node(&self) -> &D::Node {
        &self.node
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry nodes, top to bottom.
    pub fn lines(&self) -> impl Iterator<Item = &D::Node> {
        self.entries.iter().map(|e| &e.node)
    }

    /// Per-line share controls, top to bottom.
    pub fn share_controls(&self) -> impl Iterator<Item = &D::Node> {
        self.entries.iter().filter_map(|e| e.share.as_ref())
    }

    /// Entry for line `number`, if the gutter shows it.
    pub fn line(&self, number: i64) -> Option<&D::Node> {
        let index = usize::try_from(number.checked_sub(self.start)?).ok()?;
        self.entries.get(index).map(|e| &e.node)
    }

    /// Bring the gutter to `count` lines.
    ///
    /// Equal counts only renumber and refresh share fragments whose identity
    /// went stale; otherwise the trailing delta is appended or removed.
    pub fn update(&mut self, count: usize, identity: Option<&str>) -> GutterDiff {
        let stale = self.identity.as_deref() != identity;
        if stale {
            self.identity = identity.map(str::to_string);
        }

        let old = self.entries.len();
        let kept = old.min(count);
        for index in 0..kept {
            self.renumber(index, stale);
        }

        let diff = if count > old {
            self.append(count - old);
            GutterDiff {
                created: count - old,
                removed: 0,
            }
        } else {
            for entry in self.entries.drain(count..) {
                self.dom.remove(&entry.node);
            }
            GutterDiff {
                created: 0,
                removed: old - count,
            }
        };
        if diff != GutterDiff::default() {
            tracing::trace!(old, new = count, ?diff, "gutter updated");
        }
        diff
    }

    /// Spread the code box height evenly over the lines.
    ///
    /// Returns the applied line height, `None` when nothing could be measured.
    pub fn sync_line_height(&mut self, code: &D::Node) -> Option<f64> {
        let count = self.entries.len();
        let height = self.dom.bounding_rect(code).height;
        if count == 0 || height <= 0.0 {
            return None;
        }
        let per_line = height / count as f64;
        if self.line_height.is_none_or(|h| (h - per_line).abs() > 0.01) {
            self.dom
                .set_style(&self.node, "line-height", &format!("{per_line:.2}px"));
            self.line_height = Some(per_line);
        }
        self.line_height
    }

    fn number(&self, index: usize) -> i64 {
        self.start + index as i64
    }

    fn append(&mut self, count: usize) {
        for _ in 0..count {
            let index = self.entries.len();
            let entry = self.create_entry(self.number(index));
            self.dom.append_child(&self.node, &entry.node);
            self.entries.push(entry);
        }
    }

    fn create_entry(&self, number: i64) -> LineEntry<D::Node> {
        let dom = &self.dom;
        let node = NodeRole::Line.create(dom, "span");
        dom.set_attribute(&node, "data-line", &number.to_string());
        let number_node = dom.create_element("span");
        dom.add_class(&number_node, "glint-line-number");
        dom.set_text_content(&number_node, &number.to_string());
        dom.append_child(&node, &number_node);

        let line = Rc::new(Cell::new(number));
        let share = self.share.as_ref().map(|actions| {
            let button = NodeRole::LineShare.create(dom, "button");
            dom.set_attribute(&button, "type", "button");
            dom.set_attribute(&button, "title", "Copy link to line");
            dom.set_inner_html(&button, icons::LINK);
            self.bind_fragment(&button, number);

            let confirm = Rc::new(Cell::new(0));
            let target = button.clone();
            let actions = actions.clone();
            let line = line.clone();
            dom.on_click(
                &button,
                Rc::new(move || actions.share(&target, Some(line.get()), icons::LINK, &confirm)),
            );
            dom.append_child(&node, &button);
            button
        });

        LineEntry {
            node,
            number_node,
            share,
            line,
        }
    }

    fn renumber(&self, index: usize, identity_changed: bool) {
        let number = self.number(index);
        let entry = &self.entries[index];
        let moved = entry.line.get() != number;
        if moved {
            entry.line.set(number);
            self.dom.set_attribute(&entry.node, "data-line", &number.to_string());
            self.dom.set_text_content(&entry.number_node, &number.to_string());
        }
        if moved || identity_changed {
            if let Some(button) = &entry.share {
                self.bind_fragment(button, number);
            }
        }
    }

    fn bind_fragment(&self, button: &D::Node, number: i64) {
        match &self.identity {
            Some(identity) => {
                self.dom
                    .update_attribute(button, "data-fragment", &line_fragment(identity, number));
                self.dom.remove_attribute(button, "disabled");
            }
            None => {
                self.dom.remove_attribute(button, "data-fragment");
                self.dom.set_attribute(button, "disabled", "");
            }
        }
    }
}
