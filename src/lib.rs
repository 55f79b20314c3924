//! Memory Injector - Self-healing context injection for chat web apps
//!
//! This crate mounts a memory control into third-party chat pages, splices
//! externally supplied context into their editors and captures outgoing
//! messages, without any cooperation from the host page:
//!
//! - **Platform resolution**: maps the page address to a supported site
//! - **Surface location**: ordered selector strategies with a visibility check
//! - **Editor adapter**: one read/write contract over plain fields and rich-text editors
//! - **Overlay**: idempotent control mounting with a floating fallback
//! - **Watchdog / navigation**: re-mounts after re-renders and client-side navigation
//! - **Markers**: header/footer delimited memory blocks that can be stripped again
//!
//! # Architecture
//!
//! All page access goes through the [`dom::HostDocument`] trait. The
//! [`Engine`] owns the per-page state and is driven by explicit events and
//! timestamps; [`EngineRuntime`] runs it on tokio timers and forwards captures
//! to a [`MemoryService`].

pub mod capture;
pub mod config;
pub mod dom;
pub mod editor;
pub mod engine;
pub mod locator;
pub mod markers;
pub mod navigation;
pub mod overlay;
pub mod platform;
pub mod runtime;
pub mod service;
pub mod types;
pub mod watchdog;

// Re-export commonly used types
pub use capture::{CaptureDedup, CaptureListeners, KeyPress};
pub use config::{Config, FileSettings, SettingsSource, SharedSettings};
pub use dom::{HostDocument, MemoryDocument, NodeId};
pub use editor::EditorHandle;
pub use engine::{Engine, EngineAction, EngineContext, EngineEvent, EngineStatus};
pub use locator::Surfaces;
pub use markers::{MarkerError, MEMORY_FOOTER, MEMORY_HEADER};
pub use navigation::{NavigationChange, NavigationMonitor};
pub use overlay::{MountOutcome, Overlay, OverlayState, Placement};
pub use runtime::EngineRuntime;
pub use service::{MemoryService, ServiceError, StaticMemoryService};
pub use types::{
    CaptureEvent, ConversationTurn, EditorKind, EngineError, MemoryBlock, Platform, Rect, Role,
    SurfaceKind,
};
pub use watchdog::{HealTrigger, Watchdog, WatchdogState};
