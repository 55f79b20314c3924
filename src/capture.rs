//! Outgoing message capture.
//!
//! Listens for the send button and Enter-to-send on the editor, recovers the
//! user's own text by stripping any injected memory block, and attaches the
//! last few rendered turns as context.

use crate::config::CaptureConfig;
use crate::dom::{HostDocument, ListenerId, NodeEventKind, NodeId};
use crate::editor;
use crate::locator;
use crate::markers;
use crate::overlay::is_inclusive_descendant;
use crate::types::{CaptureEvent, ConversationTurn, Platform, Role, SurfaceKind};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// A keydown as reported by the host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    pub shift: bool,
    /// IME composition in progress
    pub composing: bool,
}

impl KeyPress {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn while_composing(mut self) -> Self {
        self.composing = true;
        self
    }
}

/// Plain Enter sends; Shift+Enter inserts a newline and composition Enter confirms a candidate
pub fn is_send_key(key: &KeyPress) -> bool {
    key.key == "Enter" && !key.shift && !key.composing
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Attachment {
    node: NodeId,
    listener: ListenerId,
}

/// Capture listeners currently registered on the page
#[derive(Debug, Default)]
pub struct CaptureListeners {
    editor: Option<Attachment>,
    send: Option<Attachment>,
}

impl CaptureListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure the live editor and send action carry a listener.
    ///
    /// Returns how many listeners had to be (re)registered. Missing surfaces
    /// are skipped silently; the next watchdog tick tries again.
    pub fn attach<D: HostDocument + ?Sized>(&mut self, doc: &mut D, platform: Platform) -> usize {
        let mut attached = 0;
        if let Some(node) = locator::locate(&*doc, platform, SurfaceKind::Editor) {
            if ensure(doc, &mut self.editor, node, NodeEventKind::KeyDown) {
                attached += 1;
            }
        }
        if let Some(node) = locator::locate(&*doc, platform, SurfaceKind::SendAction) {
            if ensure(doc, &mut self.send, node, NodeEventKind::Click) {
                attached += 1;
            }
        }
        if attached > 0 {
            debug!("Attached {} capture listener(s) on {}", attached, platform);
        }
        attached
    }

    /// Whether the editor listener is registered on a live node
    pub fn is_attached<D: HostDocument + ?Sized>(&self, doc: &D) -> bool {
        self.editor.is_some_and(|a| doc.has_listener(a.listener))
    }

    pub fn is_editor_target<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        self.editor
            .is_some_and(|a| is_inclusive_descendant(doc, node, a.node))
    }

    pub fn is_send_target<D: HostDocument + ?Sized>(&self, doc: &D, node: NodeId) -> bool {
        self.send
            .is_some_and(|a| is_inclusive_descendant(doc, node, a.node))
    }

    pub fn detach_all<D: HostDocument + ?Sized>(&mut self, doc: &mut D) {
        for attachment in [self.editor.take(), self.send.take()].into_iter().flatten() {
            doc.remove_listener(attachment.listener);
        }
    }
}

fn ensure<D: HostDocument + ?Sized>(
    doc: &mut D,
    slot: &mut Option<Attachment>,
    node: NodeId,
    kind: NodeEventKind,
) -> bool {
    if let Some(current) = *slot {
        if current.node == node && doc.has_listener(current.listener) {
            return false;
        }
        trace!("Capture target {:?} replaced by {:?}", current.node, node);
        doc.remove_listener(current.listener);
    }
    let listener = doc.add_listener(node, kind);
    *slot = Some(Attachment { node, listener });
    true
}

/// Collapse runs of whitespace into single spaces
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// The last `count` non-empty rendered turns, most recent last
pub fn read_recent_context<D: HostDocument + ?Sized>(
    doc: &D,
    platform: Platform,
    count: usize,
    char_cap: usize,
) -> Vec<ConversationTurn> {
    if count == 0 {
        return Vec::new();
    }
    let selectors = locator::turn_selectors(platform);
    let combined = format!("{}, {}", selectors.user, selectors.assistant);

    let mut turns: Vec<ConversationTurn> = doc
        .query_selector_all(&combined)
        .into_iter()
        .rev()
        .filter_map(|node| {
            let content = collapse_whitespace(&doc.inner_text(node));
            if content.is_empty() {
                return None;
            }
            let role = if doc.matches(node, selectors.user) {
                Role::User
            } else {
                Role::Assistant
            };
            Some(ConversationTurn {
                role,
                content: content.chars().take(char_cap).collect(),
            })
        })
        .take(count)
        .collect();
    turns.reverse();
    turns
}

/// Build the capture for the message currently in the editor.
///
/// `None` when there is no editor or nothing left after stripping memories.
pub fn build_event<D: HostDocument + ?Sized>(
    doc: &D,
    platform: Platform,
    config: &CaptureConfig,
) -> Option<CaptureEvent> {
    let handle = editor::resolve(doc, platform)?;
    let message = markers::strip_out(&editor::read(doc, &handle));
    if message.is_empty() {
        trace!("Nothing to capture on {}", platform);
        return None;
    }
    Some(CaptureEvent {
        user_message: message,
        recent_context: read_recent_context(doc, platform, config.recent_turns, config.turn_char_cap),
        timestamp: chrono::Utc::now().timestamp_millis(),
        address: doc.address(),
        platform,
    })
}

/// First 12 hex chars of the SHA-256 of `content`
pub fn compute_short_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let hash = hasher.finalize();
    hash[..6].iter().map(|b| format!("{:02x}", b)).collect()
}

/// Drops repeat captures of the same message within a time window
#[derive(Debug, Default)]
pub struct CaptureDedup {
    seen: HashMap<String, Instant>,
}

impl CaptureDedup {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `message` should be emitted, recording it as seen
    pub fn check(&mut self, message: &str, now: Instant, window: Duration) -> bool {
        self.seen
            .retain(|_, at| now.saturating_duration_since(*at) < window);

        let hash = compute_short_hash(message);
        if self.seen.contains_key(&hash) {
            debug!("Duplicate capture {} suppressed", hash);
            return false;
        }
        self.seen.insert(hash, now);
        true
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::MemoryDocument;
    use crate::markers::splice_in;
    use crate::types::MemoryBlock;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn claude_page() -> MemoryDocument {
        MemoryDocument::from_json(json!({
            "address": "https://claude.ai/chat/42",
            "body": [
                { "tag": "div", "attrs": { "data-testid": "user-message" }, "children": ["first   question"] },
                { "tag": "div", "attrs": { "class": "font-claude-message" }, "children": ["first\n\nanswer"] },
                { "tag": "div", "attrs": { "data-testid": "user-message" }, "children": ["second question"] },
                { "tag": "div", "attrs": { "class": "font-claude-message" }, "children": ["second answer that runs long"] },
                { "tag": "fieldset", "children": [
                    { "tag": "div", "attrs": { "id": "editor", "class": "ProseMirror", "contenteditable": "true" },
                      "children": [{ "tag": "p", "children": ["new message"] }] },
                    { "tag": "button", "attrs": { "id": "send", "aria-label": "Send message" } }
                ] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_send_key() {
        assert!(is_send_key(&KeyPress::new("Enter")));
        assert!(!is_send_key(&KeyPress::new("Enter").with_shift()));
        assert!(!is_send_key(&KeyPress::new("Enter").while_composing()));
        assert!(!is_send_key(&KeyPress::new("a")));
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut doc = claude_page();
        let mut listeners = CaptureListeners::new();
        assert_eq!(listeners.attach(&mut doc, Platform::Claude), 2);
        assert_eq!(listeners.attach(&mut doc, Platform::Claude), 0);
        assert!(listeners.is_attached(&doc));

        let editor = doc.query_selector("#editor").unwrap();
        assert_eq!(doc.node_listener_count(editor, NodeEventKind::KeyDown), 1);
    }

    #[test]
    fn test_reattach_after_editor_replaced() {
        let mut doc = claude_page();
        let mut listeners = CaptureListeners::new();
        listeners.attach(&mut doc, Platform::Claude);

        let old = doc.query_selector("#editor").unwrap();
        let fieldset = doc.parent(old).unwrap();
        doc.remove(old);
        assert!(!listeners.is_attached(&doc));

        let new = doc
            .load_json_fragment(
                fieldset,
                json!({ "tag": "div", "attrs": { "class": "ProseMirror", "contenteditable": "true" } }),
            )
            .unwrap();
        assert_eq!(listeners.attach(&mut doc, Platform::Claude), 1);
        assert!(listeners.is_attached(&doc));
        assert_eq!(doc.node_listener_count(old, NodeEventKind::KeyDown), 0);
        assert_eq!(doc.node_listener_count(new, NodeEventKind::KeyDown), 1);
        assert!(listeners.is_editor_target(&doc, new));
        assert!(!listeners.is_editor_target(&doc, old));
    }

    #[test]
    fn test_detach_all() {
        let mut doc = claude_page();
        let mut listeners = CaptureListeners::new();
        listeners.attach(&mut doc, Platform::Claude);
        listeners.detach_all(&mut doc);
        let send = doc.query_selector("#send").unwrap();
        assert_eq!(doc.node_listener_count(send, NodeEventKind::Click), 0);
        assert!(!listeners.is_send_target(&doc, send));
    }

    #[test]
    fn test_recent_context_last_turns_in_order() {
        let doc = claude_page();
        let turns = read_recent_context(&doc, Platform::Claude, 2, 12);
        assert_eq!(
            turns,
            vec![
                ConversationTurn {
                    role: Role::User,
                    content: "second quest".to_string(),
                },
                ConversationTurn {
                    role: Role::Assistant,
                    content: "second answe".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_recent_context_collapses_whitespace() {
        let doc = claude_page();
        let turns = read_recent_context(&doc, Platform::Claude, 4, 500);
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].content, "first question");
        assert_eq!(turns[1].content, "first answer");
        assert!(read_recent_context(&doc, Platform::Claude, 0, 500).is_empty());
    }

    #[test]
    fn test_build_event_strips_injected_memories() {
        let mut doc = claude_page();
        let handle = editor::resolve(&doc, Platform::Claude).unwrap();
        let content = splice_in("new message", &[MemoryBlock::new("b1", "human", "Sam")]).unwrap();
        editor::write(&mut doc, &handle, &content);

        let event = build_event(&doc, Platform::Claude, &CaptureConfig::default()).unwrap();
        assert_eq!(event.user_message, "new message");
        assert_eq!(event.address, "https://claude.ai/chat/42");
        assert_eq!(event.recent_context.len(), 2);
        assert!(event.timestamp > 0);
    }

    #[test]
    fn test_build_event_skips_memory_only_content() {
        let mut doc = claude_page();
        let handle = editor::resolve(&doc, Platform::Claude).unwrap();
        let content = splice_in("", &[MemoryBlock::new("b1", "human", "Sam")]).unwrap();
        editor::write(&mut doc, &handle, &content);
        assert!(build_event(&doc, Platform::Claude, &CaptureConfig::default()).is_none());
    }

    #[test]
    fn test_short_hash() {
        let a = compute_short_hash("hello world");
        assert_eq!(a, compute_short_hash("hello world"));
        assert_ne!(a, compute_short_hash("different content"));
        assert_eq!(a.len(), 12);
        assert_eq!(a, "b94d27b9934d");
    }

    #[test]
    fn test_dedup_window() {
        let mut dedup = CaptureDedup::new();
        let window = Duration::from_millis(1500);
        let t0 = Instant::now();

        assert!(dedup.check("hi", t0, window));
        assert!(!dedup.check("hi", t0 + Duration::from_millis(200), window));
        assert!(dedup.check("other", t0 + Duration::from_millis(300), window));
        assert!(dedup.check("hi", t0 + Duration::from_millis(1600), window));
    }
}
