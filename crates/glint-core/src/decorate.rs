//! Decoration: header, label, action buttons and theme.
//!
//! Controls never capture the code they act on. Every handler reads the
//! block's shared [`Payload`] at click time, so reconciliation only has to
//! update the payload cell and never re-registers listeners.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use futures_util::FutureExt;
use smol_str::SmolStr;

use crate::capabilities::Capabilities;
use crate::config::{BlockConfig, Theme};
use crate::dom::{Dom, NodeRole};
use crate::identity::line_fragment;
use crate::normalize::BlockNodes;
use crate::schedule::Scheduler;
use crate::tables::{display_name, extension_for_language, icons};

/// How long a button shows its confirmation icon.
pub const CONFIRM_DURATION: Duration = Duration::from_secs(2);

/// What a block's controls act on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Trimmed raw text.
    pub code: String,
    pub language: SmolStr,
    pub identity: Option<String>,
}

pub type PayloadCell = Rc<RefCell<Payload>>;

/// Label shown in the header: the filename when there is one.
pub fn display_label(config: &BlockConfig, language: &str) -> String {
    match &config.filename {
        Some(filename) => filename.clone(),
        None => display_name(language).to_string(),
    }
}

/// Download name for a block.
pub fn download_filename(filename: Option<&str>, language: &str) -> String {
    match filename {
        Some(name) => name.to_string(),
        None => format!("code.{}", extension_for_language(language)),
    }
}

/// Click behaviour shared by a block's controls.
#[derive(Clone)]
pub struct Actions<D: Dom, S: Scheduler> {
    dom: D,
    scheduler: S,
    capabilities: Rc<Capabilities>,
    payload: PayloadCell,
    filename: Option<String>,
}

impl<D: Dom, S: Scheduler> Actions<D, S> {
    pub fn new(
        dom: D,
        scheduler: S,
        capabilities: Rc<Capabilities>,
        payload: PayloadCell,
        filename: Option<String>,
    ) -> Self {
        Self {
            dom,
            scheduler,
            capabilities,
            payload,
            filename,
        }
    }

    pub fn payload(&self) -> &PayloadCell {
        &self.payload
    }

    /// Copy the current code, confirming on `button`.
    pub fn copy(&self, button: &D::Node, confirm: &Rc<Cell<u64>>) {
        let code = self.payload.borrow().code.trim().to_string();
        self.write_clipboard(code, button, icons::COPY, confirm);
    }

    /// Save the current code to a file.
    pub fn download(&self) {
        let (code, language) = {
            let payload = self.payload.borrow();
            (payload.code.trim().to_string(), payload.language.clone())
        };
        let filename = download_filename(self.filename.as_deref(), &language);
        match self.capabilities.files.save(&filename, &code) {
            Ok(()) => tracing::debug!(%filename, "download triggered"),
            Err(e) => tracing::warn!(%filename, error = %e, "download failed"),
        }
    }

    /// Copy a link to the block, or to one of its lines.
    ///
    /// Does nothing until the block has an identity.
    pub fn share(&self, button: &D::Node, line: Option<i64>, icon: &'static str, confirm: &Rc<Cell<u64>>) {
        let Some(identity) = self.payload.borrow().identity.clone() else {
            tracing::debug!("share requested before identity resolved");
            return;
        };
        let fragment = match line {
            Some(line) => line_fragment(&identity, line),
            None => identity,
        };
        let url = format!("{}#{}", self.capabilities.location.base_url(), fragment);
        self.write_clipboard(url, button, icon, confirm);
    }

    fn write_clipboard(&self, text: String, button: &D::Node, icon: &'static str, confirm: &Rc<Cell<u64>>) {
        let write = self.capabilities.clipboard.write_text(&text);
        let dom = self.dom.clone();
        let scheduler = self.scheduler.clone();
        let button = button.clone();
        let confirm = confirm.clone();
        self.scheduler.spawn(
            async move {
                if let Err(e) = write.await {
                    tracing::warn!(error = %e, "clipboard write failed");
                    return;
                }
                let generation = confirm.get() + 1;
                confirm.set(generation);
                dom.set_inner_html(&button, icons::CHECK);
                dom.set_attribute(&button, "data-state", "copied");
                scheduler.sleep(CONFIRM_DURATION).await;
                // A later confirmation owns the revert.
                if confirm.get() == generation {
                    dom.set_inner_html(&button, icon);
                    dom.remove_attribute(&button, "data-state");
                }
            }
            .boxed_local(),
        );
    }
}

/// Handles to the controls of one block.
#[derive(Debug, Clone)]
pub struct Controls<N> {
    pub header: Option<N>,
    pub label: Option<N>,
    /// Button row, inside the header or floating over the block.
    pub buttons: Option<N>,
    pub copy: Option<N>,
    pub download: Option<N>,
    pub share: Option<N>,
}

impl<N> Default for Controls<N> {
    fn default() -> Self {
        Self {
            header: None,
            label: None,
            buttons: None,
            copy: None,
            download: None,
            share: None,
        }
    }
}

fn button<D: Dom>(dom: &D, role: NodeRole, icon: &str, title: &str) -> D::Node {
    let node = role.create(dom, "button");
    dom.set_attribute(&node, "type", "button");
    dom.set_attribute(&node, "title", title);
    dom.set_attribute(&node, "aria-label", title);
    dom.set_inner_html(&node, icon);
    node
}

/// Apply theme, header or floating buttons to a normalized block.
pub fn decorate<D: Dom, S: Scheduler>(
    actions: &Actions<D, S>,
    nodes: &BlockNodes<D::Node>,
    config: &BlockConfig,
) -> Controls<D::Node> {
    let dom = &actions.dom;
    let container = &nodes.container;

    apply_theme(dom, container, config.theme);
    if config.shareable {
        dom.set_attribute(container, "data-shareable", "");
    }
    if config.downloadable {
        dom.set_attribute(container, "data-downloadable", "");
    }
    dom.set_attribute(container, "data-line-start", &config.line_number_start.to_string());

    let mut controls = Controls::default();
    let row = NodeRole::Buttons.create(dom, "div");

    if config.show_copy_button {
        let node = button(dom, NodeRole::CopyButton, icons::COPY, "Copy code");
        let confirm = Rc::new(Cell::new(0));
        let target = node.clone();
        let a = actions.clone();
        dom.on_click(&node, Rc::new(move || a.copy(&target, &confirm)));
        dom.append_child(&row, &node);
        controls.copy = Some(node);
    }
    if config.downloadable {
        let node = button(dom, NodeRole::DownloadButton, icons::DOWNLOAD, "Download code");
        let a = actions.clone();
        dom.on_click(&node, Rc::new(move || a.download()));
        dom.append_child(&row, &node);
        controls.download = Some(node);
    }
    if config.shareable {
        let node = button(dom, NodeRole::ShareButton, icons::SHARE, "Copy link");
        set_enabled(dom, &node, false);
        let confirm = Rc::new(Cell::new(0));
        let target = node.clone();
        let a = actions.clone();
        dom.on_click(
            &node,
            Rc::new(move || a.share(&target, None, icons::SHARE, &confirm)),
        );
        dom.append_child(&row, &node);
        controls.share = Some(node);
    }
    let has_buttons = controls.copy.is_some() || controls.download.is_some() || controls.share.is_some();

    if config.show_header {
        let header = NodeRole::Header.create(dom, "div");
        if config.show_language_label {
            let label = NodeRole::Label.create(dom, "span");
            if let Some(filename) = &config.filename {
                dom.set_text_content(&label, filename);
            }
            dom.append_child(&header, &label);
            controls.label = Some(label);
        }
        dom.append_child(&header, &row);
        dom.insert_before(container, &header, Some(&nodes.pre));
        controls.header = Some(header);
        controls.buttons = Some(row);
    } else if has_buttons {
        dom.add_class(&row, "glint-floating");
        if actions.capabilities.touch {
            dom.add_class(&row, "glint-touch");
        }
        dom.append_child(container, &row);
        controls.buttons = Some(row);
    }

    controls
}

/// Replace any theme class on `container` with `theme`'s.
pub fn apply_theme<D: Dom>(dom: &D, container: &D::Node, theme: Theme) {
    for other in [Theme::Light, Theme::Dark, Theme::Auto] {
        if other != theme {
            dom.remove_class(container, other.class());
        }
    }
    dom.add_class(container, theme.class());
}

/// Toggle a control's interactivity.
pub fn set_enabled<D: Dom>(dom: &D, node: &D::Node, enabled: bool) {
    if enabled {
        dom.remove_attribute(node, "disabled");
        dom.remove_attribute(node, "aria-disabled");
    } else {
        dom.set_attribute(node, "disabled", "");
        dom.set_attribute(node, "aria-disabled", "true");
    }
}

impl<N: Clone + PartialEq + std::fmt::Debug + 'static> Controls<N> {
    /// Update the header label. Returns whether it was written.
    pub fn set_label<D: Dom<Node = N>>(&self, dom: &D, config: &BlockConfig, language: &str) -> bool {
        let Some(label) = &self.label else {
            return false;
        };
        let text = display_label(config, language);
        if dom.text_content(label) == text {
            return false;
        }
        dom.set_text_content(label, &text);
        dom.update_attribute(label, "data-language", language);
        true
    }

    /// Enable the share button once an identity exists.
    pub fn set_identity<D: Dom<Node = N>>(&self, dom: &D, identity: Option<&str>) {
        if let Some(share) = &self.share {
            set_enabled(dom, share, identity.is_some());
        }
    }
}
