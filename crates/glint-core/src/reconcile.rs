//! Live-update reconciliation.
//!
//! Every decorated block is a [`BlockHandle`]. Static blocks render once.
//! Live blocks watch their hidden mirror: each mutation is forwarded over a
//! channel to a per-block task that waits for a quiet period (restarting the
//! timer on every further mutation) and then runs a single reconciliation
//! pass. A pass re-derives markup, language, identity, gutter and control
//! payloads from the mirror's text, touching only what changed.
//!
//! ```text
//! Uninitialized -> Watching -> Pending -> Reconciling -> Watching ...
//!                                                     \-> Detached
//! ```

use std::cell::RefCell;
use std::pin::pin;
use std::rc::{Rc, Weak};
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{Either, select};
use smol_str::SmolStr;
use tokio::sync::mpsc;
use web_time::Instant;

use crate::capabilities::Capabilities;
use crate::config::BlockConfig;
use crate::decorate::{Actions, Controls, Payload, PayloadCell, decorate};
use crate::dom::{Callback, Dom};
use crate::gutter::{Gutter, line_count};
use crate::highlight::{HighlightEngine, Highlighted, Highlighter, PLAINTEXT};
use crate::identity::{BlockIdentity, IdentitySource, content_hash};
use crate::normalize::{BlockNodes, Normalized, marks};
use crate::schedule::Scheduler;

/// Reconciler state of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
    Uninitialized,
    /// Rendered once, not observed.
    Static,
    /// Waiting for the mirror to change.
    Watching,
    /// Debounce timer running.
    Pending,
    Reconciling,
    /// The mirror left the document. Terminal.
    Detached,
}

/// Counters for one block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Passes that rendered new content.
    pub passes: usize,
    /// Passes skipped because the text had not changed.
    pub skipped: usize,
    pub markup_writes: usize,
    pub lines_created: usize,
    pub lines_removed: usize,
}

/// Collaborators shared by every block created from one init call.
pub struct BlockContext<D, S, E> {
    pub dom: D,
    pub scheduler: S,
    pub highlighter: Rc<Highlighter<E>>,
    pub capabilities: Rc<Capabilities>,
    pub debounce: Duration,
    /// Run after a live block detaches.
    pub on_detach: Option<Callback>,
}

impl<D: Clone, S: Clone, E> Clone for BlockContext<D, S, E> {
    fn clone(&self) -> Self {
        Self {
            dom: self.dom.clone(),
            scheduler: self.scheduler.clone(),
            highlighter: self.highlighter.clone(),
            capabilities: self.capabilities.clone(),
            debounce: self.debounce,
            on_detach: self.on_detach.clone(),
        }
    }
}

struct Block<D: Dom, S: Scheduler, E> {
    ctx: BlockContext<D, S, E>,
    config: Rc<BlockConfig>,
    nodes: BlockNodes<D::Node>,
    controls: Controls<D::Node>,
    gutter: Option<Gutter<D, S>>,
    payload: PayloadCell,
    identity: BlockIdentity,
    /// Last text a pass rendered.
    snapshot: Option<String>,
    markup: Option<String>,
    /// Language currently applied to the code node.
    language: Option<SmolStr>,
    /// Detected language adopted for the rest of the session.
    locked: Option<SmolStr>,
    state: ReconcileState,
    stats: ReconcileStats,
    observations: Vec<D::Observation>,
}

impl<D: Dom, S: Scheduler, E: HighlightEngine> Block<D, S, E> {
    fn set_state(&mut self, state: ReconcileState) {
        if self.state != state {
            tracing::trace!(from = ?self.state, to = ?state, "block state");
            self.state = state;
        }
    }

    fn source_text(&self) -> String {
        self.ctx
            .dom
            .text_content(self.nodes.source())
            .trim()
            .to_string()
    }

    /// Render `text`. Returns `false` when the pass was skipped.
    fn pass(&mut self, text: String) -> bool {
        if self.snapshot.as_deref() == Some(text.as_str()) {
            self.stats.skipped += 1;
            self.sync_line_height();
            tracing::debug!("content unchanged, skipping pass");
            return false;
        }
        let started = Instant::now();
        let previous = self.state;
        self.set_state(ReconcileState::Reconciling);

        let Highlighted { html, language } = self.resolve(&text);
        if self.markup.as_deref() != Some(html.as_str()) {
            self.ctx.dom.set_inner_html(&self.nodes.code, &html);
            self.markup = Some(html);
            self.stats.markup_writes += 1;
        }
        self.apply_language(&language);
        self.adopt_dom_id();

        if let Some(gutter) = &mut self.gutter {
            let diff = gutter.update(line_count(&text), self.identity.value());
            self.stats.lines_created += diff.created;
            self.stats.lines_removed += diff.removed;
        }
        self.sync_line_height();

        {
            let mut payload = self.payload.borrow_mut();
            if payload.code != text {
                payload.code = text.clone();
            }
            if payload.language != language {
                payload.language = language.clone();
            }
        }

        self.snapshot = Some(text);
        self.stats.passes += 1;
        self.set_state(previous);
        tracing::trace!(
            elapsed_us = started.elapsed().as_micros() as u64,
            %language,
            pass = self.stats.passes,
            "reconciled block"
        );
        true
    }

    /// Pick the language for this pass and highlight with it.
    ///
    /// An explicit language never changes. Without one, detection runs until
    /// it finds a real language, which is then kept so the label doesn't
    /// flicker as more text streams in.
    fn resolve(&mut self, text: &str) -> Highlighted {
        let highlighter = self.ctx.highlighter.clone();
        if let Some(language) = &self.config.language {
            return highlighter.highlight_or_detect(text, language, self.config.auto_detect);
        }
        if let Some(language) = &self.locked {
            return highlighter.highlight(text, language);
        }
        if !self.config.auto_detect {
            return Highlighted::plain(text, PLAINTEXT);
        }
        let detected = highlighter.auto_detect(text);
        if detected.is_detected() {
            tracing::debug!(language = %detected.language, "language locked");
            self.locked = Some(detected.language.clone());
        }
        detected
    }

    fn apply_language(&mut self, language: &SmolStr) {
        if self.language.as_ref() == Some(language) {
            return;
        }
        let dom = &self.ctx.dom;
        if let Some(old) = &self.language {
            dom.remove_class(&self.nodes.code, &format!("language-{old}"));
        }
        dom.add_class(&self.nodes.code, &format!("language-{language}"));
        dom.set_attribute(&self.nodes.container, "data-glint-language", language);
        self.controls.set_label(dom, &self.config, language);
        self.language = Some(language.clone());
    }

    /// Pick up an id set on the container after creation.
    fn adopt_dom_id(&mut self) {
        let id = self
            .ctx
            .dom
            .attribute(&self.nodes.container, "id")
            .filter(|id| !id.trim().is_empty());
        if let Some(id) = id {
            if self.identity.assign(IdentitySource::DomId(id)) {
                self.publish_identity();
            }
        }
    }

    /// Push the current identity to the container and every control.
    fn publish_identity(&mut self) {
        let value = self.identity.value().map(str::to_string);
        let dom = &self.ctx.dom;
        match &value {
            Some(v) => {
                dom.update_attribute(&self.nodes.container, marks::IDENTITY, v);
            }
            None => dom.remove_attribute(&self.nodes.container, marks::IDENTITY),
        }
        self.payload.borrow_mut().identity = value.clone();
        self.controls.set_identity(dom, value.as_deref());
        if let Some(gutter) = &mut self.gutter {
            let len = gutter.len();
            gutter.update(len, value.as_deref());
        }
    }

    fn sync_line_height(&mut self) {
        if let Some(gutter) = &mut self.gutter {
            gutter.sync_line_height(&self.nodes.code);
        }
    }
}

/// Shared handle to a decorated block.
pub struct BlockHandle<D: Dom, S: Scheduler, E>(Rc<RefCell<Block<D, S, E>>>);

impl<D: Dom, S: Scheduler, E> Clone for BlockHandle<D, S, E> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<D: Dom, S: Scheduler, E> std::fmt::Debug for BlockHandle<D, S, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.try_borrow() {
            Ok(block) => f
                .debug_struct("BlockHandle")
                .field("container", &block.nodes.container)
                .field("state", &block.state)
                .field("identity", &block.identity.value())
                .finish(),
            Err(_) => f.write_str("BlockHandle(<busy>)"),
        }
    }
}

impl<D, S, E> BlockHandle<D, S, E>
where
    D: Dom,
    S: Scheduler,
    E: HighlightEngine + 'static,
{
    /// Decorate a normalized block, render it and, for live blocks, start
    /// watching its mirror.
    pub fn create(
        ctx: BlockContext<D, S, E>,
        config: Rc<BlockConfig>,
        normalized: Normalized<D::Node>,
    ) -> Self {
        let Normalized {
            nodes,
            original_id,
            text,
        } = normalized;
        let dom = ctx.dom.clone();

        let payload = Rc::new(RefCell::new(Payload {
            code: text.clone(),
            ..Default::default()
        }));
        let actions = Actions::new(
            dom.clone(),
            ctx.scheduler.clone(),
            ctx.capabilities.clone(),
            payload.clone(),
            config.filename.clone(),
        );
        let controls = decorate(&actions, &nodes, &config);

        let mut identity = BlockIdentity::default();
        let container_id = dom.attribute(&nodes.container, "id");
        if let Some(source) = IdentitySource::preferred(original_id.as_deref(), container_id.as_deref()) {
            identity.assign(source);
        }

        let gutter = config.show_line_numbers.then(|| {
            Gutter::add_line_numbers(
                &dom,
                &nodes.pre,
                line_count(&text),
                config.line_number_start,
                config.shareable.then(|| actions.clone()),
                identity.value(),
            )
        });

        let live = config.live_update && nodes.mirror.is_some();
        let handle = Self(Rc::new(RefCell::new(Block {
            ctx,
            config,
            nodes,
            controls,
            gutter,
            payload,
            identity,
            snapshot: None,
            markup: None,
            language: None,
            locked: None,
            state: ReconcileState::Uninitialized,
            stats: ReconcileStats::default(),
            observations: Vec::new(),
        })));

        handle.0.borrow_mut().publish_identity();
        handle.observe_layout();
        handle.reconcile();
        if live {
            handle.watch();
        } else {
            handle.0.borrow_mut().set_state(ReconcileState::Static);
        }
        handle
    }

    /// Run a pass against the current source text right away.
    ///
    /// Returns whether anything was rendered.
    pub fn reconcile(&self) -> bool {
        let (text, rendered) = {
            let mut block = self.0.borrow_mut();
            let text = block.source_text();
            let rendered = block.pass(text.clone());
            (text, rendered)
        };
        if rendered {
            self.request_hash(text);
        }
        rendered
    }

    /// Whether the block still has nodes in the document.
    ///
    /// A live block stays attached while its mirror is, even when the
    /// container has been moved out.
    pub fn is_attached(&self) -> bool {
        let Ok(block) = self.0.try_borrow() else {
            // Mid-pass, so still in use.
            return true;
        };
        if block.state == ReconcileState::Detached {
            return false;
        }
        let dom = &block.ctx.dom;
        dom.is_connected(&block.nodes.container)
            || block.nodes.mirror.as_ref().is_some_and(|m| dom.is_connected(m))
    }

    /// Re-measure the gutter line height.
    pub fn sync_line_height(&self) {
        if let Ok(mut block) = self.0.try_borrow_mut() {
            block.sync_line_height();
        }
    }

    pub fn container(&self) -> D::Node {
        self.0.borrow().nodes.container.clone()
    }

    pub fn nodes(&self) -> BlockNodes<D::Node> {
        self.0.borrow().nodes.clone()
    }

    pub fn controls(&self) -> Controls<D::Node> {
        self.0.borrow().controls.clone()
    }

    pub fn config(&self) -> Rc<BlockConfig> {
        self.0.borrow().config.clone()
    }

    pub fn state(&self) -> ReconcileState {
        self.0.borrow().state
    }

    pub fn stats(&self) -> ReconcileStats {
        self.0.borrow().stats
    }

    pub fn identity(&self) -> Option<String> {
        self.0.borrow().identity.value().map(str::to_string)
    }

    pub fn identity_source(&self) -> Option<IdentitySource> {
        self.0.borrow().identity.current().cloned()
    }

    /// Language applied by the last pass.
    pub fn language(&self) -> Option<SmolStr> {
        self.0.borrow().language.clone()
    }

    pub fn payload(&self) -> Payload {
        self.0.borrow().payload.borrow().clone()
    }

    /// Gutter entry nodes, top to bottom. Empty without line numbers.
    pub fn gutter_lines(&self) -> Vec<D::Node> {
        let block = self.0.borrow();
        block
            .gutter
            .as_ref()
            .map(|g| g.lines().cloned().collect())
            .unwrap_or_default()
    }

    /// Per-line share controls, top to bottom.
    pub fn line_share_controls(&self) -> Vec<D::Node> {
        let block = self.0.borrow();
        block
            .gutter
            .as_ref()
            .map(|g| g.share_controls().cloned().collect())
            .unwrap_or_default()
    }

    /// Gutter entry for line `number`.
    pub fn line_node(&self, number: i64) -> Option<D::Node> {
        let block = self.0.borrow();
        block.gutter.as_ref()?.line(number).cloned()
    }

    fn set_state(&self, state: ReconcileState) {
        self.0.borrow_mut().set_state(state);
    }

    /// Hash the text in the background and adopt the result unless a newer
    /// identity lands first.
    fn request_hash(&self, text: String) {
        let (ticket, digest, scheduler) = {
            let mut block = self.0.borrow_mut();
            if !block.config.shareable {
                return;
            }
            let Some(ticket) = block.identity.begin_hash() else {
                return;
            };
            (
                ticket,
                block.ctx.capabilities.digest.clone(),
                block.ctx.scheduler.clone(),
            )
        };
        let weak: Weak<RefCell<Block<D, S, E>>> = Rc::downgrade(&self.0);
        scheduler.spawn(
            async move {
                let hash = content_hash(&text, &*digest).await;
                let Some(cell) = weak.upgrade() else {
                    return;
                };
                let mut block = cell.borrow_mut();
                if block.identity.complete_hash(ticket, hash) {
                    tracing::debug!(identity = block.identity.value(), "content identity assigned");
                    block.publish_identity();
                }
            }
            .boxed_local(),
        );
    }

    fn observe_layout(&self) {
        let (dom, code) = {
            let block = self.0.borrow();
            if block.gutter.is_none() {
                return;
            }
            (block.ctx.dom.clone(), block.nodes.code.clone())
        };
        let weak = Rc::downgrade(&self.0);
        let observation = dom.observe_resize(
            &code,
            Rc::new(move || {
                if let Some(cell) = weak.upgrade() {
                    BlockHandle(cell).sync_line_height();
                }
            }),
        );
        self.0.borrow_mut().observations.push(observation);
    }

    /// Start the debounced watch task over the mirror.
    fn watch(&self) {
        let (dom, scheduler, mirror, debounce) = {
            let block = self.0.borrow();
            let Some(mirror) = block.nodes.mirror.clone() else {
                return;
            };
            (
                block.ctx.dom.clone(),
                block.ctx.scheduler.clone(),
                mirror,
                block.ctx.debounce,
            )
        };

        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        let observation = dom.observe_mutations(
            &mirror,
            Rc::new(move || {
                let _ = tx.send(());
            }),
        );
        {
            let mut block = self.0.borrow_mut();
            block.observations.push(observation);
            block.set_state(ReconcileState::Watching);
        }

        let handle = self.clone();
        let timers = scheduler.clone();
        scheduler.spawn(
            async move {
                while rx.recv().await.is_some() {
                    handle.set_state(ReconcileState::Pending);
                    // Last write wins: every mutation restarts the quiet period.
                    let closed = loop {
                        match select(pin!(rx.recv()), timers.sleep(debounce)).await {
                            Either::Left((Some(()), _)) => continue,
                            Either::Left((None, _)) => break true,
                            Either::Right(((), _)) => break false,
                        }
                    };
                    if closed || !dom.is_connected(&mirror) {
                        break;
                    }
                    handle.reconcile();
                    handle.set_state(ReconcileState::Watching);
                }
                handle.detach();
            }
            .boxed_local(),
        );
    }

    fn detach(&self) {
        let on_detach = {
            let mut block = self.0.borrow_mut();
            block.observations.clear();
            block.set_state(ReconcileState::Detached);
            tracing::debug!(passes = block.stats.passes, "live block detached");
            block.ctx.on_detach.clone()
        };
        if let Some(on_detach) = on_detach {
            on_detach();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemNode;
    use crate::config::{HighlightOptions, InitOptions};
    use crate::memory::MemoryDom;
    use crate::normalize::normalize;
    use crate::schedule::TokioScheduler;
    use crate::testing::{StubEngine, TestCapabilities};

    type Handle = BlockHandle<MemoryDom, TokioScheduler, Rc<StubEngine>>;

    struct Fixture {
        dom: MemoryDom,
        engine: Rc<StubEngine>,
        ctx: BlockContext<MemoryDom, TokioScheduler, Rc<StubEngine>>,
    }

    fn fixture() -> Fixture {
        let dom = MemoryDom::new();
        let engine = Rc::new(StubEngine::new());
        let caps = TestCapabilities::new("https://example.com/");
        let ctx = BlockContext {
            dom: dom.clone(),
            scheduler: TokioScheduler,
            highlighter: Rc::new(Highlighter::new(engine.clone())),
            capabilities: Rc::new(caps.capabilities),
            debounce: Duration::from_millis(50),
            on_detach: None,
        };
        Fixture { dom, engine, ctx }
    }

    impl Fixture {
        fn block(&self, text: &str, attrs: &[(&str, &str)], overrides: HighlightOptions) -> Handle {
            let source = self.dom.create_element("div");
            for (k, v) in attrs {
                self.dom.set_attribute(&source, k, v);
            }
            self.dom.append_text(&source, text);
            self.dom.append_child(&self.dom.body(), &source);
            let lookup = |name: &str| self.dom.attribute(&source, name);
            let config = BlockConfig::resolve(&InitOptions::default(), &overrides, lookup, None);
            let normalized = normalize(&self.dom, &source, config.live_update);
            BlockHandle::create(self.ctx.clone(), Rc::new(config), normalized)
        }

        fn mirror(&self, block: &Handle) -> MemNode {
            block.nodes().mirror.unwrap()
        }
    }

    fn live() -> HighlightOptions {
        HighlightOptions {
            live_update: Some(true),
            ..Default::default()
        }
    }

    async fn run_local<F: std::future::Future>(f: F) -> F::Output {
        tokio::task::LocalSet::new().run_until(f).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_block_renders_once() {
        run_local(async {
            let f = fixture();
            let block = f.block("fn main() {}", &[("data-language", "rust")], HighlightOptions::default());
            assert_eq!(block.state(), ReconcileState::Static);
            assert_eq!(block.language().as_deref(), Some("rust"));
            let code = block.nodes().code;
            assert!(f.dom.has_class(&code, "language-rust"));
            assert!(f.dom.inner_html(&code).contains("hl-keyword"));
            assert_eq!(block.stats().passes, 1);
            assert_eq!(f.dom.observer_count(), 0);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_rapid_mutations() {
        run_local(async {
            let f = fixture();
            let block = f.block("def a():", &[], live());
            let mirror = f.mirror(&block);
            let code = block.nodes().code;
            assert_eq!(block.state(), ReconcileState::Watching);
            let writes = f.dom.html_writes(&code);

            for chunk in ["\n    x = 1", "\n    y = 2", "\n    return x"] {
                f.dom.append_text(&mirror, chunk);
                tokio::time::sleep(Duration::from_millis(20)).await;
                assert_eq!(block.state(), ReconcileState::Pending);
            }
            assert_eq!(f.dom.html_writes(&code), writes);

            tokio::time::sleep(Duration::from_millis(40)).await;
            assert_eq!(block.state(), ReconcileState::Watching);
            assert_eq!(f.dom.html_writes(&code), writes + 1);
            assert_eq!(block.stats().passes, 2);
            assert!(f.dom.text_content(&code).ends_with("return x"));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_unchanged_text_skips_pass() {
        run_local(async {
            let f = fixture();
            let block = f.block("let x = 1;", &[("data-language", "rust")], live());
            let mirror = f.mirror(&block);
            let code = block.nodes().code;
            let writes = f.dom.html_writes(&code);

            // Same trimmed text, different raw text.
            f.dom.append_text(&mirror, "   ");
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(f.dom.html_writes(&code), writes);
            assert_eq!(block.stats().skipped, 1);
            assert_eq!(block.stats().passes, 1);
            assert!(!block.reconcile());
            assert_eq!(block.stats().skipped, 2);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_detected_language_is_locked() {
        run_local(async {
            let f = fixture();
            let block = f.block("def greet(name):", &[], live());
            assert_eq!(block.language().as_deref(), Some("python"));
            let detections = f.engine.detect_calls();

            let mirror = f.mirror(&block);
            f.dom.append_text(&mirror, "\n    function const console var let fn");
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(block.stats().passes, 2);
            assert_eq!(block.language().as_deref(), Some("python"));
            assert_eq!(f.engine.detect_calls(), detections);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_retries_until_language_found() {
        run_local(async {
            let f = fixture();
            let block = f.block("", &[], live());
            assert_eq!(block.language().as_deref(), Some(PLAINTEXT));

            let mirror = f.mirror(&block);
            f.dom.append_text(&mirror, "fn main() { let x = 1; }");
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(block.language().as_deref(), Some("rust"));
            let code = block.nodes().code;
            assert!(f.dom.has_class(&code, "language-rust"));
            assert!(!f.dom.has_class(&code, "language-plaintext"));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_mirror_detaches() {
        run_local(async {
            let f = fixture();
            let block = f.block("a", &[], live());
            let mirror = f.mirror(&block);
            f.dom.remove(&mirror);
            tokio::task::yield_now().await;
            assert_eq!(block.state(), ReconcileState::Detached);
            assert_eq!(f.dom.observer_count(), 0);
            assert!(!block.is_attached());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_detach_runs_callback_once() {
        run_local(async {
            let mut f = fixture();
            let detached = Rc::new(std::cell::Cell::new(0));
            let count = detached.clone();
            f.ctx.on_detach = Some(Rc::new(move || count.set(count.get() + 1)));

            let block = f.block("a", &[], live());
            let mirror = f.mirror(&block);
            assert!(block.is_attached());
            f.dom.remove(&block.container());
            assert!(block.is_attached(), "mirror still in the document");
            assert_eq!(detached.get(), 0);

            f.dom.remove(&mirror);
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(detached.get(), 1);
            assert!(!block.is_attached());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_static_block_attachment_follows_container() {
        run_local(async {
            let f = fixture();
            let block = f.block("a", &[], HighlightOptions::default());
            assert!(block.is_attached());
            f.dom.remove(&block.container());
            assert!(!block.is_attached());
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_removal_during_debounce_detaches_without_pass() {
        run_local(async {
            let f = fixture();
            let block = f.block("a", &[], live());
            let mirror = f.mirror(&block);
            f.dom.append_text(&mirror, "bcd");
            tokio::time::sleep(Duration::from_millis(10)).await;
            f.dom.remove(&mirror);
            tokio::time::sleep(Duration::from_millis(100)).await;
            assert_eq!(block.state(), ReconcileState::Detached);
            assert_eq!(block.stats().passes, 1);
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_content_identity_follows_text() {
        run_local(async {
            let f = fixture();
            let share = HighlightOptions {
                shareable: Some(true),
                live_update: Some(true),
                ..Default::default()
            };
            let block = f.block("x = 1", &[], share);
            assert_eq!(block.identity(), None);
            tokio::task::yield_now().await;
            let first = block.identity().unwrap();
            assert!(matches!(block.identity_source(), Some(IdentitySource::ContentHash(_))));
            let container = block.container();
            assert_eq!(f.dom.attribute(&container, marks::IDENTITY), Some(first.clone()));
            let share_button = block.controls().share.unwrap();
            assert!(f.dom.attribute(&share_button, "disabled").is_none());

            f.dom.append_text(&block.nodes().mirror.unwrap(), "\ny = 2");
            tokio::time::sleep(Duration::from_millis(60)).await;
            let second = block.identity().unwrap();
            assert_ne!(first, second);
            assert_eq!(block.payload().identity, Some(second));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_container_id_set_later_wins_over_hash() {
        run_local(async {
            let f = fixture();
            let share = HighlightOptions {
                shareable: Some(true),
                live_update: Some(true),
                ..Default::default()
            };
            let block = f.block("x = 1", &[], share);
            tokio::task::yield_now().await;
            assert!(matches!(block.identity_source(), Some(IdentitySource::ContentHash(_))));

            f.dom.set_attribute(&block.container(), "id", "named");
            f.dom.append_text(&block.nodes().mirror.unwrap(), "\nmore");
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(block.identity().as_deref(), Some("named"));
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_tracks_text_without_rebinding() {
        run_local(async {
            let f = fixture();
            let block = f.block("a = 1", &[], live());
            let copy = block.controls().copy.unwrap();
            f.dom.append_text(&f.mirror(&block), "\nb = 2");
            tokio::time::sleep(Duration::from_millis(60)).await;
            assert_eq!(block.payload().code, "a = 1\nb = 2");
            assert_eq!(f.dom.listener_count(&copy), 1);
        })
        .await;
    }
}
