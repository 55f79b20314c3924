//! Core types used throughout the injection engine.
//!
//! This module defines the platform identities, surface kinds, memory blocks
//! and capture payloads shared by the locator, editor adapter, overlay and
//! capture path.

use serde::{Deserialize, Serialize};

/// A supported chat site.
///
/// "No platform" is expressed as `Option<Platform>::None` everywhere; every
/// component treats it as "do nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    ChatGpt,
    Claude,
    Gemini,
    Perplexity,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::ChatGpt,
        Platform::Claude,
        Platform::Gemini,
        Platform::Perplexity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ChatGpt => "chatgpt",
            Platform::Claude => "claude",
            Platform::Gemini => "gemini",
            Platform::Perplexity => "perplexity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of page element a selector strategy resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    /// The text-input surface the user types into
    Editor,
    /// The button that submits the message
    SendAction,
    /// A layout container the overlay control can be placed in
    Anchor,
}

impl SurfaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurfaceKind::Editor => "editor",
            SurfaceKind::SendAction => "send_action",
            SurfaceKind::Anchor => "anchor",
        }
    }
}

/// The editing model behind a located editor surface.
///
/// Decides which write strategy the editor adapter uses. Re-inferred on
/// every access, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKind {
    /// `<textarea>` or `<input>`
    PlainField,
    /// Any other `contenteditable` region
    RichText,
    /// ProseMirror editor view (rich-text model A)
    ProseMirror,
    /// Quill editor (rich-text model B)
    Quill,
}

impl EditorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorKind::PlainField => "plain_field",
            EditorKind::RichText => "rich_text",
            EditorKind::ProseMirror => "prosemirror",
            EditorKind::Quill => "quill",
        }
    }
}

/// A context block supplied by the memory service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub id: String,
    pub label: String,
    #[serde(alias = "value")]
    pub text: String,
    /// Maximum number of characters of `text` that get injected
    #[serde(default, alias = "limit", skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<usize>,
}

impl MemoryBlock {
    pub fn new(id: impl Into<String>, label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            text: text.into(),
            size_limit: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Author of a rendered conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn read from the host page's message list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

/// Payload emitted when the user sends a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureEvent {
    /// The message with any injected memory block stripped out
    pub user_message: String,
    /// Previous turns, most recent last
    pub recent_context: Vec<ConversationTurn>,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Page address at capture time
    #[serde(rename = "url")]
    pub address: String,
    pub platform: Platform,
}

/// On-screen rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn has_area(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}

/// Errors surfaced by engine operations.
///
/// Locator misses are modelled as `Option` by the locator itself; they only
/// become errors at the action boundary where the user asked for something.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No supported platform for this page")]
    NoPlatform,

    #[error("Could not locate {} surface", .0.as_str())]
    SurfaceNotFound(SurfaceKind),

    #[error("Memory block not found: {0}")]
    BlockNotFound(String),

    #[error(transparent)]
    Marker(#[from] crate::markers::MarkerError),

    #[error(transparent)]
    Service(#[from] crate::service::ServiceError),
}
