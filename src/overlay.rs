//! Injection control overlay.
//!
//! Mounts one memory control into the host page. Placement is tried in order:
//!
//! 1. Platform strategies (beside a known action button, into the derived toolbar)
//! 2. Floating wrapper over the editor when the page has no anchor at all
//! 3. Generic strategies (before the send action, appended to the anchor)
//!
//! The floating wrapper is the only placement that registers window listeners.
//! Those are owned by the wrapper through the cleanup side-table and released
//! by [`Overlay::remove`] before the wrapper leaves the page.

use crate::dom::{is_visible, HostDocument, ListenerId, NodeId, WindowEventKind};
use crate::locator;
use crate::types::{Platform, Rect, SurfaceKind};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, info, trace, warn};

pub const WRAPPER_ID: &str = "letta-memory-wrapper";
pub const CONTROL_ID: &str = "letta-memory-control";
pub const NOTICE_ID: &str = "letta-memory-notice";

const CONTROL_SELECTOR: &str = "#letta-memory-control";
const WRAPPER_SELECTOR: &str = "#letta-memory-wrapper";

/// Floating control edge length and inset from the editor's top-right corner
const FLOATING_SIZE: f64 = 32.0;
const FLOATING_INSET: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayState {
    #[default]
    Unmounted,
    Mounted { control: NodeId, wrapper: NodeId },
}

/// Window listeners registered on behalf of a wrapper
#[derive(Debug, Default)]
pub struct CleanupHandle {
    listeners: Vec<ListenerId>,
}

impl CleanupHandle {
    fn discharge<D: HostDocument + ?Sized>(self, doc: &mut D) {
        for listener in self.listeners {
            doc.remove_listener(listener);
        }
    }
}

/// Where the wrapper ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    BesideControl,
    Toolbar,
    BeforeSend,
    Anchor,
    Floating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountOutcome {
    AlreadyMounted,
    Mounted(Placement),
    Failed,
}

impl MountOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, MountOutcome::Failed)
    }
}

#[derive(Debug, Clone, Copy)]
enum Strategy {
    /// Insert in front of an existing host control
    BesideControl(&'static str),
    /// Append into the toolbar derived from the editor
    AppendToToolbar,
    BeforeSend,
    AppendToAnchor,
}

impl Strategy {
    fn placement(&self) -> Placement {
        match self {
            Strategy::BesideControl(_) => Placement::BesideControl,
            Strategy::AppendToToolbar => Placement::Toolbar,
            Strategy::BeforeSend => Placement::BeforeSend,
            Strategy::AppendToAnchor => Placement::Anchor,
        }
    }
}

fn platform_strategies(platform: Platform) -> &'static [Strategy] {
    match platform {
        Platform::ChatGpt => &[
            Strategy::BesideControl("button[data-testid=\"composer-speech-button\"]"),
            Strategy::AppendToToolbar,
        ],
        Platform::Claude => &[Strategy::AppendToToolbar],
        Platform::Gemini => &[
            Strategy::BesideControl("button[aria-label=\"Microphone\"]"),
            Strategy::AppendToToolbar,
        ],
        Platform::Perplexity => &[],
    }
}

const GENERIC_STRATEGIES: &[Strategy] = &[Strategy::BeforeSend, Strategy::AppendToAnchor];

/// The overlay and everything it owns on the page
#[derive(Debug, Default)]
pub struct Overlay {
    state: OverlayState,
    placement: Option<Placement>,
    cleanup: HashMap<NodeId, CleanupHandle>,
    frame_pending: bool,
    notice: Option<NodeId>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn placement(&self) -> Option<Placement> {
        self.placement
    }

    pub fn control(&self) -> Option<NodeId> {
        match self.state {
            OverlayState::Mounted { control, .. } => Some(control),
            OverlayState::Unmounted => None,
        }
    }

    /// Whether a control is currently in the document
    pub fn is_present<D: HostDocument + ?Sized>(&self, doc: &D) -> bool {
        doc.query_selector(CONTROL_SELECTOR).is_some()
    }

    /// Mount the control; a no-op when one is already in the document
    pub fn mount<D: HostDocument + ?Sized>(&mut self, doc: &mut D, platform: Platform) -> MountOutcome {
        if self.is_present(&*doc) {
            trace!("Control already present, skipping mount");
            return MountOutcome::AlreadyMounted;
        }

        if let OverlayState::Mounted { wrapper, .. } = self.state {
            if !doc.is_connected(wrapper) {
                debug!("Tracked wrapper {:?} left the document, cleaning up", wrapper);
            }
            self.remove(doc);
        }

        let editor = locator::locate(&*doc, platform, SurfaceKind::Editor);

        for strategy in platform_strategies(platform) {
            if let Some(outcome) = self.try_strategy(doc, platform, editor, *strategy) {
                return outcome;
            }
        }

        if locator::locate_anchor(&*doc, platform, editor).is_none() {
            if let Some(editor) = editor {
                return self.mount_floating(doc, platform, editor);
            }
        }

        for strategy in GENERIC_STRATEGIES {
            if let Some(outcome) = self.try_strategy(doc, platform, editor, *strategy) {
                return outcome;
            }
        }

        debug!("No placement available for {}", platform);
        MountOutcome::Failed
    }

    fn try_strategy<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        platform: Platform,
        editor: Option<NodeId>,
        strategy: Strategy,
    ) -> Option<MountOutcome> {
        let (parent, before) = insertion_point(&*doc, platform, editor, strategy)?;
        let (wrapper, control) = build_wrapper(doc, platform);
        doc.insert_before(parent, wrapper, before);
        Some(self.record(wrapper, control, strategy.placement(), platform))
    }

    fn mount_floating<D: HostDocument + ?Sized>(
        &mut self,
        doc: &mut D,
        platform: Platform,
        editor: NodeId,
    ) -> MountOutcome {
        let (wrapper, control) = build_wrapper(doc, platform);
        doc.set_style(wrapper, "position", "fixed");
        doc.set_style(wrapper, "z-index", "2147483000");
        let rect = doc.bounding_rect(editor);
        position_floating(doc, wrapper, rect);
        let body = doc.body();
        doc.append_child(body, wrapper);

        let listeners = vec![
            doc.add_window_listener(WindowEventKind::Scroll),
            doc.add_window_listener(WindowEventKind::Resize),
        ];
        self.cleanup.insert(wrapper, CleanupHandle { listeners });
        self.record(wrapper, control, Placement::Floating, platform)
    }

    fn record(
        &mut self,
        wrapper: NodeId,
        control: NodeId,
        placement: Placement,
        platform: Platform,
    ) -> MountOutcome {
        info!("Mounted memory control on {} ({:?})", platform, placement);
        self.state = OverlayState::Mounted { control, wrapper };
        self.placement = Some(placement);
        MountOutcome::Mounted(placement)
    }

    /// Release every cleanup handle, then take the wrapper (and any strays) off the page
    pub fn remove<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        for (_, handle) in self.cleanup.drain() {
            handle.discharge(doc);
        }

        if let OverlayState::Mounted { wrapper, .. } = self.state {
            doc.remove(wrapper);
        }
        for stray in doc.query_selector_all(WRAPPER_SELECTOR) {
            warn!("Removing untracked wrapper {:?}", stray);
            doc.remove(stray);
        }

        if self.state != OverlayState::Unmounted {
            debug!("Overlay removed");
        }
        self.state = OverlayState::Unmounted;
        self.placement = None;
        self.frame_pending = false;
    }

    /// Scroll or resize: batch repositioning into the next animation frame
    pub fn on_viewport_change<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if self.placement != Some(Placement::Floating) || self.frame_pending {
            return;
        }
        self.frame_pending = true;
        doc.request_animation_frame();
    }

    pub fn on_animation_frame<D: HostDocument + ?Sized>(&mut self, doc: &mut D, platform: Platform) {
        if !std::mem::take(&mut self.frame_pending) {
            return;
        }
        let OverlayState::Mounted { wrapper, .. } = self.state else {
            return;
        };
        match locator::locate(&*doc, platform, SurfaceKind::Editor) {
            Some(editor) => {
                let rect = doc.bounding_rect(editor);
                doc.set_style(wrapper, "display", "block");
                position_floating(doc, wrapper, rect);
            }
            None => doc.set_style(wrapper, "display", "none"),
        }
    }

    /// Whether `node` is the control or inside it
    pub fn is_control_target<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        self.control()
            .is_some_and(|control| is_inclusive_descendant(doc, node, control))
    }

    /// Show a transient message, replacing any previous one
    pub fn show_notice<D: HostDocument + ?Sized>(&mut self, doc: &mut D, message: &str) -> NodeId {
        self.dismiss_current_notice(doc);
        let notice = doc.create_element("div");
        doc.set_attribute(notice, "id", NOTICE_ID);
        doc.set_attribute(notice, "role", "status");
        doc.set_text_content(notice, message);
        let body = doc.body();
        doc.append_child(body, notice);
        self.notice = Some(notice);
        notice
    }

    /// Remove `notice` if it is still the one on screen
    pub fn dismiss_notice<D: HostDocument + ?Sized>(&mut self, doc: &mut D, notice: NodeId) {
        if self.notice == Some(notice) {
            self.dismiss_current_notice(doc);
        }
    }

    pub fn dismiss_current_notice<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        if let Some(notice) = self.notice.take() {
            doc.remove(notice);
        }
    }

    pub fn notice(&self) -> Option<NodeId> {
        self.notice
    }

    pub fn cleanup_handles(&self) -> usize {
        self.cleanup.len()
    }
}

fn insertion_point<D: HostDocument + ?Sized>(
    doc: &D,
    platform: Platform,
    editor: Option<NodeId>,
    strategy: Strategy,
) -> Option<(NodeId, Option<NodeId>)> {
    match strategy {
        Strategy::BesideControl(selector) => {
            let control = doc.query_selector(selector).filter(|n| is_visible(doc, *n))?;
            Some((doc.parent(control)?, Some(control)))
        }
        Strategy::AppendToToolbar => Some((locator::derive_anchor(doc, platform, editor?)?, None)),
        Strategy::BeforeSend => {
            let send = locator::locate(doc, platform, SurfaceKind::SendAction)?;
            Some((doc.parent(send)?, Some(send)))
        }
        Strategy::AppendToAnchor => Some((locator::locate_anchor(doc, platform, editor)?, None)),
    }
}

fn build_wrapper<D: HostDocument + ?Sized>(doc: &mut D, platform: Platform) -> (NodeId, NodeId) {
    let wrapper = doc.create_element("div");
    doc.set_attribute(wrapper, "id", WRAPPER_ID);
    doc.set_attribute(wrapper, "data-platform", platform.as_str());

    let control = doc.create_element("button");
    doc.set_attribute(control, "id", CONTROL_ID);
    doc.set_attribute(control, "type", "button");
    doc.set_attribute(control, "aria-label", "Add memories");
    doc.set_text_content(control, "Memory");
    doc.append_child(wrapper, control);
    (wrapper, control)
}

fn position_floating<D: HostDocument + ?Sized>(doc: &mut D, wrapper: NodeId, editor: Rect) {
    let left = (editor.right() - FLOATING_SIZE - FLOATING_INSET).max(0.0);
    let top = (editor.y + FLOATING_INSET).max(0.0);
    doc.set_style(wrapper, "left", &format!("{:.0}px", left));
    doc.set_style(wrapper, "top", &format!("{:.0}px", top));
}

pub(crate) fn is_inclusive_descendant<D: HostDocument + ?Sized>(
    doc: &D,
    node: NodeId,
    ancestor: NodeId,
) -> bool {
    let mut current = Some(node);
    while let Some(candidate) = current {
        if candidate == ancestor {
            return true;
        }
        current = doc.parent(candidate);
    }
    false
}
