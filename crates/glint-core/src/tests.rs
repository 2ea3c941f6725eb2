//! End-to-end behaviour of `Glint` over `MemoryDom` and the stub engine.

use std::rc::Rc;
use std::time::Duration;

use crate::config::{HighlightOptions, InitOptions};
use crate::dom::{Dom, NodeRole, Rect};
use crate::error::GlintError;
use crate::identity::{IDENTITY_LEN, IdentitySource};
use crate::memory::{MemNode, MemoryDom};
use crate::normalize::marks;
use crate::reconcile::ReconcileState;
use crate::schedule::TokioScheduler;
use crate::tables::icons;
use crate::testing::{StubEngine, TestCapabilities};
use crate::{Glint, Highlighter};

type TestGlint = Glint<MemoryDom, TokioScheduler, Rc<StubEngine>>;

struct Page {
    dom: MemoryDom,
    caps: TestCapabilities,
    engine: Rc<StubEngine>,
    glint: TestGlint,
}

fn page(options: InitOptions) -> Page {
    let dom = MemoryDom::new();
    let caps = TestCapabilities::new("https://example.com/post");
    let engine = Rc::new(StubEngine::new());
    let glint = Glint::new(
        dom.clone(),
        TokioScheduler,
        engine.clone(),
        caps.capabilities.clone(),
        options,
    );
    Page {
        dom,
        caps,
        engine,
        glint,
    }
}

impl Page {
    fn add(&self, tag: &str, attrs: &[(&str, &str)], text: &str) -> MemNode {
        let node = self.dom.create_element(tag);
        for (k, v) in attrs {
            self.dom.set_attribute(&node, k, v);
        }
        self.dom.append_text(&node, text);
        self.dom.append_child(&self.dom.body(), &node);
        node
    }

    fn add_pre_code(&self, code_attrs: &[(&str, &str)], text: &str) -> MemNode {
        let pre = self.dom.create_element("pre");
        let code = self.dom.create_element("code");
        for (k, v) in code_attrs {
            self.dom.set_attribute(&code, k, v);
        }
        self.dom.append_text(&code, text);
        self.dom.append_child(&pre, &code);
        self.dom.append_child(&self.dom.body(), &pre);
        code
    }

    fn numbers(&self, lines: &[MemNode]) -> Vec<String> {
        lines
            .iter()
            .map(|l| self.dom.attribute(l, "data-line").unwrap())
            .collect()
    }
}

async fn run_local<F: std::future::Future>(f: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(f).await
}

async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_auto_detects_python() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[], "def greet(name):\n    return f'hi {name}'");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();

        assert_eq!(block.language().as_deref(), Some("python"));
        assert!(p.dom.has_class(&block.nodes().code, "language-python"));
        let label = block.controls().label.unwrap();
        assert_eq!(p.dom.text_content(&label), "Python");

        // Same input, same answer.
        let again = p.add("div", &[], "def greet(name):\n    return f'hi {name}'");
        let again = p.glint.highlight_element(&again, &HighlightOptions::default());
        assert_eq!(
            p.glint.block_for(&again).unwrap().language().as_deref(),
            Some("python")
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_filename_drives_language_and_label() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-filename", "app.ts")], "const x: number = 1;");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();

        assert_eq!(block.config().language.as_deref(), Some("typescript"));
        assert_eq!(block.language().as_deref(), Some("typescript"));
        let label = block.controls().label.unwrap();
        assert_eq!(p.dom.text_content(&label), "app.ts");
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_explicit_line_start() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add(
            "div",
            &[("data-line-numbers", ""), ("data-line-start", "10")],
            "a\nb\nc",
        );
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        let lines = block.gutter_lines();
        assert_eq!(p.numbers(&lines), ["10", "11", "12"]);
        let texts: Vec<_> = lines.iter().map(|l| p.dom.text_content(l)).collect();
        assert_eq!(texts, ["10", "11", "12"]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_negative_start_with_live_growth_and_shrink() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[], "a\nb");
        let opts = HighlightOptions {
            live_update: Some(true),
            show_line_numbers: Some(true),
            line_start: Some(-1),
            ..Default::default()
        };
        let container = p.glint.highlight_element(&source, &opts);
        let block = p.glint.block_for(&container).unwrap();
        assert_eq!(p.numbers(&block.gutter_lines()), ["-1", "0"]);

        let mirror = block.nodes().mirror.unwrap();
        p.dom.append_text(&mirror, "\nc\nd");
        settle(60).await;
        assert_eq!(p.numbers(&block.gutter_lines()), ["-1", "0", "1", "2"]);

        p.dom.set_text_content(&mirror, "a");
        settle(60).await;
        assert_eq!(p.numbers(&block.gutter_lines()), ["-1"]);
        assert_eq!(block.stats().lines_created, 2);
        assert_eq!(block.stats().lines_removed, 3);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_live_growth_preserves_lines_and_shares_current_identity() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-live", ""), ("data-share", ""), ("data-line-numbers", "")], "x = 1\ny = 2");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        tokio::task::yield_now().await;

        let before = block.gutter_lines();
        assert_eq!(before.len(), 2);
        let first_identity = block.identity().unwrap();
        assert_eq!(first_identity.len(), IDENTITY_LEN);

        let mirror = block.nodes().mirror.unwrap();
        p.dom.append_text(&mirror, "\nz = 3");
        p.dom.append_text(&mirror, "\nw = 4\nv = 5");
        settle(60).await;

        let after = block.gutter_lines();
        assert_eq!(after.len(), 5);
        assert_eq!(after[..2], before[..]);

        let identity = block.identity().unwrap();
        assert_ne!(identity, first_identity);
        assert_eq!(p.dom.attribute(&container, marks::IDENTITY), Some(identity.clone()));
        let controls = block.line_share_controls();
        assert_eq!(controls.len(), 5);
        for (index, control) in controls.iter().enumerate() {
            let expected = format!("{identity}_{}", index + 1);
            assert_eq!(p.dom.attribute(control, "data-fragment"), Some(expected));
            assert_eq!(p.dom.listener_count(control), 1);
        }

        p.dom.click(&controls[3]);
        tokio::task::yield_now().await;
        assert_eq!(
            p.caps.clipboard.writes(),
            vec![format!("https://example.com/post#{identity}_4")]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_original_id_survives_mutations() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add(
            "div",
            &[("id", "foo"), ("data-live", ""), ("data-share", ""), ("data-line-numbers", "")],
            "print(1)",
        );
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        let mirror = block.nodes().mirror.unwrap();
        assert_eq!(p.dom.element_by_id("foo"), Some(mirror));

        for chunk in ["\nprint(2)", "\nprint(3)", "\nprint(4)"] {
            p.dom.append_text(&mirror, chunk);
            settle(60).await;
            tokio::task::yield_now().await;
            assert_eq!(block.identity().as_deref(), Some("foo"));
        }
        assert_eq!(block.identity_source(), Some(IdentitySource::Original("foo".into())));
        assert_eq!(block.stats().passes, 4);
        let fragments: Vec<_> = block
            .line_share_controls()
            .iter()
            .map(|c| p.dom.attribute(c, "data-fragment").unwrap())
            .collect();
        assert_eq!(fragments, ["foo_1", "foo_2", "foo_3", "foo_4"]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_identical_text_causes_no_markup_writes() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-live", "")], "fn main() {}");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        let code = block.nodes().code;
        let mirror = block.nodes().mirror.unwrap();

        p.dom.append_text(&mirror, "\nlet x = 1;");
        settle(60).await;
        let writes = p.dom.html_writes(&code);

        // Replace with the very same text.
        p.dom.set_text_content(&mirror, "fn main() {}\nlet x = 1;");
        settle(60).await;
        assert_eq!(p.dom.html_writes(&code), writes);
        assert_eq!(block.stats().skipped, 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_copy_confirms_for_two_seconds() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[], "  echo hi  ");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let copy = p.glint.block_for(&container).unwrap().controls().copy.unwrap();

        p.dom.click(&copy);
        tokio::task::yield_now().await;
        assert_eq!(p.caps.clipboard.writes(), vec!["echo hi".to_string()]);
        assert_eq!(p.dom.attribute(&copy, "data-state").as_deref(), Some("copied"));
        settle(2001).await;
        assert_eq!(p.dom.inner_html(&copy), icons::COPY);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_clipboard_failure_is_silent() {
    run_local(async {
        let p = page(InitOptions::default());
        p.caps.clipboard.set_failing(true);
        let source = p.add("div", &[], "echo hi");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let copy = p.glint.block_for(&container).unwrap().controls().copy.unwrap();

        p.dom.click(&copy);
        tokio::task::yield_now().await;
        assert!(p.dom.attribute(&copy, "data-state").is_none());
        assert_eq!(p.dom.inner_html(&copy), icons::COPY);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_precondition_violations_return_element() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-live", "")], "x");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        let before = p.dom.outer_html(&p.dom.body());

        let code = block.nodes().code;
        assert_eq!(p.glint.highlight_element(&code, &HighlightOptions::default()), code);
        let mirror = block.nodes().mirror.unwrap();
        assert_eq!(p.glint.highlight_element(&mirror, &HighlightOptions::default()), mirror);
        assert_eq!(
            p.glint.highlight_element(&container, &HighlightOptions::default()),
            container
        );
        assert_eq!(p.dom.outer_html(&p.dom.body()), before);
        assert_eq!(p.glint.blocks().len(), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_init_processes_in_frame_chunks() {
    run_local(async {
        let p = page(InitOptions {
            batch_size: 2,
            ..Default::default()
        });
        for i in 0..5 {
            p.add_pre_code(&[], &format!("let v{i} = {i};"));
        }
        p.add("div", &[("class", "glint")], "x = 1");
        p.add("div", &[], "not a code block");

        let glint = p.glint.clone();
        let init = tokio::task::spawn_local(async move { glint.init().await });
        tokio::task::yield_now().await;
        assert_eq!(p.glint.blocks().len(), 2);

        assert_eq!(init.await.unwrap(), 6);
        assert_eq!(p.glint.blocks().len(), 6);

        // A second pass finds only owned nodes.
        assert_eq!(p.glint.init().await, 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_pre_code_attributes_migrate_to_container() {
    run_local(async {
        let p = page(InitOptions::default());
        let code = p.add_pre_code(&[("class", "language-rust"), ("data-theme", "dark")], "fn a() {}");
        let container = p.glint.highlight_element(&code, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        assert_eq!(block.nodes().code, code);
        assert_eq!(block.language().as_deref(), Some("rust"));
        assert!(p.dom.has_class(&container, "glint-theme-dark"));
        assert_eq!(p.dom.attribute(&container, "data-theme").as_deref(), Some("dark"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_overrides_beat_attributes() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-theme", "light"), ("data-no-header", "")], "x");
        let opts = HighlightOptions {
            theme: Some("dark".into()),
            show_header: Some(true),
            language: Some("bash".into()),
            ..Default::default()
        };
        let container = p.glint.highlight_element(&source, &opts);
        let block = p.glint.block_for(&container).unwrap();
        assert!(p.dom.has_class(&container, "glint-theme-dark"));
        assert!(!p.dom.has_class(&container, "glint-theme-light"));
        assert!(block.controls().header.is_some());
        assert_eq!(block.language().as_deref(), Some("bash"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_unknown_language_falls_back_to_detection_markup() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-language", "cobol")], "def f():\n    pass");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        assert_eq!(block.language().as_deref(), Some("cobol"));
        assert!(p.dom.inner_html(&block.nodes().code).contains("hl-keyword"));
        assert!(p.engine.detect_calls() > 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_engine_renders_escaped_text() {
    run_local(async {
        let dom = MemoryDom::new();
        let caps = TestCapabilities::new("");
        let glint = Glint::new(
            dom.clone(),
            TokioScheduler,
            StubEngine::unavailable(),
            caps.capabilities,
            InitOptions::default(),
        );
        let source = dom.create_element("div");
        dom.append_text(&source, "a < b && c");
        dom.append_child(&dom.body(), &source);
        let container = glint.highlight_element(&source, &HighlightOptions::default());
        let block = glint.block_for(&container).unwrap();
        assert_eq!(block.language().as_deref(), Some("unknown"));
        assert_eq!(dom.inner_html(&block.nodes().code), "a &lt; b &amp;&amp; c");
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_navigation_to_line_of_live_block() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add(
            "div",
            &[("id", "demo"), ("data-live", ""), ("data-line-numbers", "")],
            "a\nb\nc",
        );
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        p.dom.set_rect(&container, Rect { top: 40.0, left: 0.0, width: 300.0, height: 90.0 });
        let line = block.line_node(2).unwrap();
        p.dom.set_rect(&line, Rect { top: 70.0, left: 0.0, width: 20.0, height: 18.0 });

        let target = p.glint.navigate("#demo_2").await.unwrap();
        assert_eq!(target.container, container);
        assert_eq!(target.line, Some(2));
        let overlay = p
            .dom
            .children(&container)
            .into_iter()
            .find(|n| NodeRole::of(&p.dom, n) == Some(NodeRole::Overlay))
            .unwrap();
        assert_eq!(p.dom.style(&overlay, "top").as_deref(), Some("30px"));
        assert_eq!(p.dom.style(&overlay, "height").as_deref(), Some("18px"));

        settle(2600).await;
        assert!(!p.dom.is_connected(&overlay));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_resize_refreshes_line_height() {
    run_local(async {
        let p = page(InitOptions {
            show_line_numbers: true,
            ..Default::default()
        });
        let source = p.add("div", &[], "a\nb");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        let code = block.nodes().code;
        let gutter = p.dom.first_child(&block.nodes().pre).unwrap();
        assert_eq!(NodeRole::of(&p.dom, &gutter), Some(NodeRole::Gutter));

        p.dom.resize(&code, Rect { height: 50.0, ..Default::default() });
        assert_eq!(p.dom.style(&gutter, "line-height").as_deref(), Some("25.00px"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_detached_block_stops_reconciling() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("data-live", "")], "a = 1");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();
        let mirror = block.nodes().mirror.unwrap();

        p.dom.remove(&mirror);
        p.dom.remove(&container);
        tokio::task::yield_now().await;
        assert_eq!(block.state(), ReconcileState::Detached);

        p.dom.append_text(&mirror, "\nb = 2");
        settle(100).await;
        assert_eq!(block.stats().passes, 1);
        assert_eq!(p.dom.observer_count(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_registry_releases_removed_blocks() {
    run_local(async {
        let p = page(InitOptions::default());
        let mut removed = Vec::new();
        for i in 0..50 {
            let source = p.add("div", &[("data-live", "")], &format!("x = {i}"));
            let container = p.glint.highlight_element(&source, &HighlightOptions::default());
            removed.push(p.glint.block_for(&container).unwrap());
        }
        let kept = p.add("div", &[("data-live", "")], "kept = 1");
        let kept = p.glint.highlight_element(&kept, &HighlightOptions::default());
        let gone = p.add("div", &[], "static = 1");
        let gone = p.glint.highlight_element(&gone, &HighlightOptions::default());
        assert_eq!(p.glint.blocks().len(), 52);

        for block in &removed {
            let nodes = block.nodes();
            p.dom.remove(&nodes.mirror.unwrap());
            p.dom.remove(&nodes.container);
        }
        p.dom.remove(&gone);
        settle(100).await;

        assert!(removed.iter().all(|b| b.state() == ReconcileState::Detached));
        // Detaching pruned the registry without anyone reading it.
        assert!(format!("{:?}", p.glint).contains("blocks: 1"));
        let remaining: Vec<MemNode> = p.glint.blocks().iter().map(|b| b.container()).collect();
        assert_eq!(remaining, vec![kept]);
        assert!(p.glint.block_for(&gone).is_none());
        assert!(p.glint.block_for(&kept).is_some());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_detached_element_is_returned_unchanged() {
    run_local(async {
        let p = page(InitOptions::default());
        let loose = p.dom.create_element("div");
        p.dom.append_text(&loose, "x = 1");

        assert_eq!(p.glint.highlight_element(&loose, &HighlightOptions::default()), loose);
        assert!(matches!(
            p.glint.try_highlight(&loose, &HighlightOptions::default()),
            Err(GlintError::Detached)
        ));
        assert!(p.glint.blocks().is_empty());
        assert_eq!(p.dom.text_content(&loose), "x = 1");
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_streaming_reaches_block_through_mirror() {
    run_local(async {
        let p = page(InitOptions::default());
        let source = p.add("div", &[("id", "reply"), ("data-live", "")], "a = 1");
        let container = p.glint.highlight_element(&source, &HighlightOptions::default());
        let block = p.glint.block_for(&container).unwrap();

        // The source element left the page; writes to it go nowhere.
        assert!(!p.dom.is_connected(&source));
        p.dom.append_text(&source, "\nlost = 2");
        settle(60).await;
        assert_eq!(p.dom.text_content(&block.nodes().code), "a = 1");

        // The mirror carries the source's id.
        let mirror = p.dom.element_by_id("reply").unwrap();
        assert_eq!(block.nodes().mirror, Some(mirror));
        p.dom.append_text(&mirror, "\nb = 2");
        settle(60).await;
        assert_eq!(p.dom.text_content(&block.nodes().code), "a = 1\nb = 2");
    })
    .await;
}

#[test]
fn test_highlighter_is_deterministic_across_instances() {
    let code = "fn main() { let mut x = 1; }";
    let a = Highlighter::new(StubEngine::new()).auto_detect(code);
    let b = Highlighter::new(StubEngine::new()).auto_detect(code);
    assert_eq!(a, b);
    assert_eq!(a.language, "rust");
}
