//! Public entry points.
//!
//! [`Glint`] ties the pieces together per element: config resolution,
//! normalization, decoration and the reconciler. Nothing here returns an error
//! to page code; failures are logged and degrade to a no-op or plain text.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use web_time::Instant;

use crate::capabilities::Capabilities;
use crate::config::{BlockConfig, HighlightOptions, InitOptions, language_from_classes};
use crate::dom::{Callback, Dom};
use crate::error::GlintError;
use crate::highlight::{HighlightEngine, Highlighter};
use crate::navigate::{Navigator, Target};
use crate::normalize::{check_source, config_sources, lookup_attribute, normalize};
use crate::reconcile::{BlockContext, BlockHandle};
use crate::schedule::{Scheduler, millis};

type Registry<D, S, E> = RefCell<Vec<BlockHandle<D, S, E>>>;

/// Highlighter bound to a document.
///
/// Blocks are registered while their nodes are in the document. A live
/// block drops out as soon as it detaches; a static one the next time the
/// registry is read after its container was removed.
pub struct Glint<D: Dom, S: Scheduler, E> {
    ctx: BlockContext<D, S, E>,
    options: Rc<InitOptions>,
    blocks: Rc<Registry<D, S, E>>,
}

fn prune<D, S, E>(blocks: &Registry<D, S, E>)
where
    D: Dom,
    S: Scheduler,
    E: HighlightEngine + 'static,
{
    // Busy means a caller up the stack is already walking the registry.
    let Ok(mut blocks) = blocks.try_borrow_mut() else {
        return;
    };
    let before = blocks.len();
    blocks.retain(BlockHandle::is_attached);
    let released = before - blocks.len();
    if released > 0 {
        tracing::debug!(released, remaining = blocks.len(), "released detached blocks");
    }
}

impl<D: Dom, S: Scheduler, E> Clone for Glint<D, S, E> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            options: self.options.clone(),
            blocks: self.blocks.clone(),
        }
    }
}

impl<D: Dom, S: Scheduler, E> std::fmt::Debug for Glint<D, S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Glint")
            .field("options", &self.options)
            .field("blocks", &self.blocks.borrow().len())
            .finish_non_exhaustive()
    }
}

impl<D, S, E> Glint<D, S, E>
where
    D: Dom,
    S: Scheduler,
    E: HighlightEngine + 'static,
{
    pub fn new(dom: D, scheduler: S, engine: E, capabilities: Capabilities, options: InitOptions) -> Self {
        let blocks: Rc<Registry<D, S, E>> = Rc::new(RefCell::new(Vec::new()));
        let registry: Weak<Registry<D, S, E>> = Rc::downgrade(&blocks);
        let on_detach: Callback = Rc::new(move || {
            if let Some(blocks) = registry.upgrade() {
                prune(&blocks);
            }
        });
        let ctx = BlockContext {
            dom,
            scheduler,
            highlighter: Rc::new(Highlighter::new(engine)),
            capabilities: Rc::new(capabilities),
            debounce: millis(options.debounce_ms),
            on_detach: Some(on_detach),
        };
        Self {
            ctx,
            options: Rc::new(options),
            blocks,
        }
    }

    pub fn options(&self) -> &InitOptions {
        &self.options
    }

    pub fn dom(&self) -> &D {
        &self.ctx.dom
    }

    /// Blocks still in the document, in creation order.
    pub fn blocks(&self) -> Vec<BlockHandle<D, S, E>> {
        prune(&self.blocks);
        self.blocks.borrow().clone()
    }

    /// Block owning `container`.
    pub fn block_for(&self, container: &D::Node) -> Option<BlockHandle<D, S, E>> {
        prune(&self.blocks);
        self.blocks
            .borrow()
            .iter()
            .find(|b| b.container() == *container)
            .cloned()
    }

    /// Highlight every element matching the configured selector.
    ///
    /// Elements are processed `batch_size` at a time with a frame yield in
    /// between. Resolves to the number of blocks created.
    pub async fn init(&self) -> usize {
        let started = Instant::now();
        let dom = &self.ctx.dom;
        let elements = dom.query_selector_all(&self.options.selector);
        let batch = self.options.batch_size.max(1);
        let mut created = 0;

        for (index, chunk) in elements.chunks(batch).enumerate() {
            if index > 0 {
                self.ctx.scheduler.next_frame().await;
            }
            for element in chunk {
                // Replaced by an earlier element of the same pass.
                if !dom.is_connected(element) {
                    continue;
                }
                match self.try_highlight(element, &HighlightOptions::default()) {
                    Ok(_) => created += 1,
                    Err(e) => tracing::debug!(error = %e, "skipping element"),
                }
            }
        }

        tracing::debug!(
            found = elements.len(),
            created,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "initialized code blocks"
        );
        created
    }

    /// Highlight one element on demand.
    ///
    /// Returns the block's container, or `element` unchanged when it already
    /// belongs to a block or is not in the document.
    ///
    /// `element` is replaced by, or moved into, the container. For a live
    /// block, streamed text must go to the hidden mirror, which takes over
    /// `element`'s id (see [`BlockNodes::mirror`](crate::normalize::BlockNodes));
    /// writes to `element` itself are not observed.
    pub fn highlight_element(&self, element: &D::Node, overrides: &HighlightOptions) -> D::Node {
        match self.try_highlight(element, overrides) {
            Ok(block) => block.container(),
            Err(e) => {
                tracing::warn!(error = %e, "element not highlighted");
                element.clone()
            }
        }
    }

    /// Like [`highlight_element`](Self::highlight_element), but reports why
    /// nothing happened.
    pub fn try_highlight(
        &self,
        element: &D::Node,
        overrides: &HighlightOptions,
    ) -> Result<BlockHandle<D, S, E>, GlintError> {
        let dom = &self.ctx.dom;
        check_source(dom, element)?;

        let sources = config_sources(dom, element);
        let classes: Vec<String> = sources.iter().flat_map(|n| dom.classes(n)).collect();
        let config = BlockConfig::resolve(
            &self.options,
            overrides,
            |name| lookup_attribute(dom, &sources, name),
            language_from_classes(classes.iter().map(String::as_str)),
        );

        let normalized = normalize(dom, element, config.live_update);
        let block = BlockHandle::create(self.ctx.clone(), Rc::new(config), normalized);
        prune(&self.blocks);
        self.blocks.borrow_mut().push(block.clone());
        Ok(block)
    }

    /// Scroll to and highlight the block named by a URL fragment.
    pub async fn navigate(&self, fragment: &str) -> Option<Target<D::Node>> {
        let navigator = Navigator::new(self.ctx.dom.clone(), self.ctx.scheduler.clone());
        let target = navigator.navigate(fragment).await?;
        if let Some(block) = self.block_for(&target.container) {
            block.sync_line_height();
        }
        Some(target)
    }
}
