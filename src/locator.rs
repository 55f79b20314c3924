//! Surface location with ordered fallback strategies.
//!
//! Each (platform, surface kind) pair has an ordered list of selectors.
//! Semantically labelled hooks (`data-testid`, `aria-label`, ids) come first;
//! structural selectors are kept only as a last resort. Lookup stops at the
//! first rule that yields a visible element.
//!
//! Nothing here is cached: host re-renders replace nodes without notice, so
//! every caller re-resolves against the live page.

use crate::dom::{is_visible, HostDocument, NodeId};
use crate::types::{Platform, SurfaceKind};
use serde::Serialize;
use tracing::trace;

const CHATGPT_EDITOR: &[&str] = &[
    "#prompt-textarea",
    "div.ProseMirror[contenteditable=\"true\"]",
    "textarea[data-id=\"root\"]",
    "form textarea",
];
const CHATGPT_SEND: &[&str] = &[
    "button[data-testid=\"send-button\"]",
    "button[aria-label=\"Send prompt\"]",
    "form button[type=\"submit\"]",
];
const CHATGPT_ANCHOR: &[&str] = &[
    "div[data-testid=\"composer-footer-actions\"]",
    "form div.flex.items-center",
];

const CLAUDE_EDITOR: &[&str] = &[
    "div.ProseMirror[contenteditable=\"true\"]",
    "div[contenteditable=\"true\"][aria-label*=\"prompt\"]",
    "fieldset div[contenteditable=\"true\"]",
];
const CLAUDE_SEND: &[&str] = &[
    "button[aria-label=\"Send message\"]",
    "button[aria-label*=\"Send\"]",
    "fieldset button[type=\"submit\"]",
];
const CLAUDE_ANCHOR: &[&str] = &["fieldset div.flex.items-center.gap-2", "fieldset"];

const GEMINI_EDITOR: &[&str] = &[
    "rich-textarea div.ql-editor[contenteditable=\"true\"]",
    "div.ql-editor",
    "div[contenteditable=\"true\"][role=\"textbox\"]",
    "rich-textarea p",
];
const GEMINI_SEND: &[&str] = &[
    "button[aria-label=\"Send message\"]",
    "button.send-button",
    "div.send-button-container button",
];
const GEMINI_ANCHOR: &[&str] = &[
    "div.leading-actions-wrapper",
    "div.input-buttons-wrapper-bottom",
];

const PERPLEXITY_EDITOR: &[&str] = &[
    "#ask-input",
    "textarea[placeholder*=\"Ask\"]",
    "div[contenteditable=\"true\"][role=\"textbox\"]",
    "main textarea",
];
const PERPLEXITY_SEND: &[&str] = &[
    "button[aria-label=\"Submit\"]",
    "button[data-testid=\"submit-button\"]",
];
/// No stable layout container exists near the Perplexity editor
const PERPLEXITY_ANCHOR: &[&str] = &[];

/// Ordered lookup rules for a platform's surface
pub fn strategy(platform: Platform, surface: SurfaceKind) -> &'static [&'static str] {
    match (platform, surface) {
        (Platform::ChatGpt, SurfaceKind::Editor) => CHATGPT_EDITOR,
        (Platform::ChatGpt, SurfaceKind::SendAction) => CHATGPT_SEND,
        (Platform::ChatGpt, SurfaceKind::Anchor) => CHATGPT_ANCHOR,
        (Platform::Claude, SurfaceKind::Editor) => CLAUDE_EDITOR,
        (Platform::Claude, SurfaceKind::SendAction) => CLAUDE_SEND,
        (Platform::Claude, SurfaceKind::Anchor) => CLAUDE_ANCHOR,
        (Platform::Gemini, SurfaceKind::Editor) => GEMINI_EDITOR,
        (Platform::Gemini, SurfaceKind::SendAction) => GEMINI_SEND,
        (Platform::Gemini, SurfaceKind::Anchor) => GEMINI_ANCHOR,
        (Platform::Perplexity, SurfaceKind::Editor) => PERPLEXITY_EDITOR,
        (Platform::Perplexity, SurfaceKind::SendAction) => PERPLEXITY_SEND,
        (Platform::Perplexity, SurfaceKind::Anchor) => PERPLEXITY_ANCHOR,
    }
}

/// First visible element produced by the platform's rules for `surface`
pub fn locate<D: HostDocument + ?Sized>(
    doc: &D,
    platform: Platform,
    surface: SurfaceKind,
) -> Option<NodeId> {
    let found = strategy(platform, surface).iter().find_map(|selector| {
        let candidate = doc.query_selector(selector)?;
        if is_visible(doc, candidate) {
            trace!("{} {} matched '{}'", platform, surface.as_str(), selector);
            Some(candidate)
        } else {
            trace!("{} {} '{}' matched an invisible element", platform, surface.as_str(), selector);
            None
        }
    });
    if found.is_none() {
        trace!("{} {} not found", platform, surface.as_str());
    }
    found
}

/// Walk from the editor to a nearby toolbar suited for the control
pub fn derive_anchor<D: HostDocument + ?Sized>(
    doc: &D,
    platform: Platform,
    editor: NodeId,
) -> Option<NodeId> {
    let anchor = match platform {
        Platform::ChatGpt => {
            let form = doc.closest(editor, "form")?;
            doc.query_within(form, "div[data-testid=\"composer-footer-actions\"]")
                .or_else(|| doc.query_within(form, "div.flex.items-center"))
        }
        Platform::Claude => {
            let fieldset = doc.closest(editor, "fieldset")?;
            doc.query_within(fieldset, "div.flex.items-center.gap-2")
        }
        Platform::Gemini => {
            let area = doc
                .closest(editor, "input-area-v2")
                .or_else(|| doc.closest(editor, "div.input-area"))?;
            doc.query_within(area, "div.leading-actions-wrapper")
                .or_else(|| doc.query_within(area, "div.input-buttons-wrapper-bottom"))
        }
        Platform::Perplexity => None,
    };
    anchor.filter(|node| is_visible(doc, *node))
}

/// Derived anchor when possible, otherwise the platform's generic anchor rules
pub fn locate_anchor<D: HostDocument + ?Sized>(
    doc: &D,
    platform: Platform,
    editor: Option<NodeId>,
) -> Option<NodeId> {
    editor
        .and_then(|editor| derive_anchor(doc, platform, editor))
        .or_else(|| locate(doc, platform, SurfaceKind::Anchor))
}

/// Selectors for rendered conversation turns
#[derive(Debug, Clone, Copy)]
pub struct TurnSelectors {
    pub user: &'static str,
    pub assistant: &'static str,
}

pub fn turn_selectors(platform: Platform) -> TurnSelectors {
    match platform {
        Platform::ChatGpt => TurnSelectors {
            user: "div[data-message-author-role=\"user\"]",
            assistant: "div[data-message-author-role=\"assistant\"]",
        },
        Platform::Claude => TurnSelectors {
            user: "div[data-testid=\"user-message\"]",
            assistant: "div.font-claude-message",
        },
        Platform::Gemini => TurnSelectors {
            user: "user-query",
            assistant: "model-response",
        },
        Platform::Perplexity => TurnSelectors {
            user: "div.group\\/query",
            assistant: "div.prose",
        },
    }
}

/// All surfaces of the current page, for diagnostics
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Surfaces {
    pub editor: Option<NodeId>,
    pub send_action: Option<NodeId>,
    pub anchor: Option<NodeId>,
}

pub fn locate_all<D: HostDocument + ?Sized>(doc: &D, platform: Platform) -> Surfaces {
    let editor = locate(doc, platform, SurfaceKind::Editor);
    Surfaces {
        editor,
        send_action: locate(doc, platform, SurfaceKind::SendAction),
        anchor: locate_anchor(doc, platform, editor),
    }
}
