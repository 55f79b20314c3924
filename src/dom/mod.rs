//! Host page abstraction.
//!
//! The engine never talks to a concrete browser binding. Everything it needs
//! from the page goes through [`HostDocument`]:
//!
//! - **Queries**: selector lookup, scoped lookup, `closest`, parent walks
//! - **Reads**: attributes, computed style, bounding rect, value and text
//! - **Writes**: node creation and insertion, text and value replacement
//! - **Events**: synthetic dispatch, node and window listeners, animation frames
//!
//! [`MemoryDocument`] is a complete in-memory implementation used by the
//! test-suite and the `surface-probe` binary.

pub mod memory;
pub mod selector;

pub use memory::{FixtureError, FixtureNode, FixturePage, MemoryDocument};
pub use selector::{SelectorError, SelectorList};

use crate::types::Rect;
use serde::Serialize;

/// Opaque handle to a page node. Only meaningful for the document that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub usize);

/// Handle to a registered event listener (node or window scoped)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ListenerId(pub u64);

/// Handle to a structural mutation observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObserverId(pub u64);

/// Events listened for on a single node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeEventKind {
    Click,
    KeyDown,
}

/// Events listened for on the window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowEventKind {
    Scroll,
    Resize,
}

/// Synthetic notifications the engine dispatches at editor surfaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Bubbling `input` event
    Input,
    /// Bubbling `change` event
    Change,
    /// `beforeinput` carrying the edit intent, read by ProseMirror's input handling
    BeforeInput { input_type: String, data: String },
    /// Quill's editor `text-change` notification
    TextChange,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::Input => "input",
            HostEvent::Change => "change",
            HostEvent::BeforeInput { .. } => "beforeinput",
            HostEvent::TextChange => "text-change",
        }
    }
}

/// The subset of computed style the engine cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
        }
    }
}

/// Read/write access to the live host page
pub trait HostDocument {
    /// Current page address
    fn address(&self) -> String;

    fn body(&self) -> NodeId;

    /// All connected elements matching `selector`, in document order
    fn query_selector_all(&self, selector: &str) -> Vec<NodeId>;

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        self.query_selector_all(selector).into_iter().next()
    }

    /// First descendant of `root` matching `selector`
    fn query_within(&self, root: NodeId, selector: &str) -> Option<NodeId>;

    fn matches(&self, node: NodeId, selector: &str) -> bool;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Nearest inclusive ancestor matching `selector`
    fn closest(&self, node: NodeId, selector: &str) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.matches(candidate, selector) {
                return Some(candidate);
            }
            current = self.parent(candidate);
        }
        None
    }

    /// Whether the node is still attached to the document
    fn is_connected(&self, node: NodeId) -> bool;

    /// Lowercase tag name, empty for text nodes
    fn tag_name(&self, node: NodeId) -> String;

    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map(|classes| classes.split_whitespace().any(|c| c == class))
            .unwrap_or(false)
    }

    /// Effective `contenteditable` state, including inheritance
    fn is_content_editable(&self, node: NodeId) -> bool;

    fn computed_style(&self, node: NodeId) -> ComputedStyle;

    fn bounding_rect(&self, node: NodeId) -> Rect;

    fn set_style(&mut self, node: NodeId, property: &str, value: &str);

    /// Value of a form field, `None` for anything else
    fn value(&self, node: NodeId) -> Option<String>;

    fn set_value(&mut self, node: NodeId, value: &str);

    /// Raw concatenated text of all descendants
    fn text_content(&self, node: NodeId) -> String;

    /// Rendered text, block boundaries as line breaks
    fn inner_text(&self, node: NodeId) -> String;

    fn set_text_content(&mut self, node: NodeId, text: &str);

    fn create_element(&mut self, tag: &str) -> NodeId;

    fn create_text(&mut self, text: &str) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Insert `child` before `reference`, or append when `reference` is `None`
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>);

    /// Detach a node from its parent
    fn remove(&mut self, node: NodeId);

    fn clear_children(&mut self, node: NodeId);

    fn dispatch_event(&mut self, node: NodeId, event: HostEvent);

    fn focus(&mut self, node: NodeId);

    fn place_caret_at_end(&mut self, node: NodeId);

    fn add_listener(&mut self, node: NodeId, kind: NodeEventKind) -> ListenerId;

    /// Whether a listener is registered and its target still live
    fn has_listener(&self, id: ListenerId) -> bool;

    fn remove_listener(&mut self, id: ListenerId);

    fn add_window_listener(&mut self, kind: WindowEventKind) -> ListenerId;

    fn request_animation_frame(&mut self);

    fn observe_mutations(&mut self, root: NodeId) -> ObserverId;

    fn disconnect_observer(&mut self, id: ObserverId);
}

/// Non-zero rendered area, not display-suppressed, not visibility-suppressed
pub fn is_visible<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> bool {
    if !doc.is_connected(node) {
        return false;
    }
    let style = doc.computed_style(node);
    if style.display == "none" || style.visibility == "hidden" {
        return false;
    }
    doc.bounding_rect(node).has_area()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn page(body: serde_json::Value) -> MemoryDocument {
        MemoryDocument::from_json(json!({ "address": "https://example.com/", "body": body }))
            .unwrap()
    }

    #[test]
    fn test_visible_element() {
        let doc = page(json!([{ "tag": "div", "attrs": { "id": "a" } }]));
        let node = doc.query_selector("#a").unwrap();
        assert!(is_visible(&doc, node));
    }

    #[test]
    fn test_zero_area_is_invisible() {
        let doc = page(json!([{ "tag": "div", "attrs": { "id": "a" }, "rect": [0, 0, 0, 0] }]));
        let node = doc.query_selector("#a").unwrap();
        assert!(!is_visible(&doc, node));
    }

    #[test]
    fn test_display_none_ancestor_is_invisible() {
        let doc = page(json!([{
            "tag": "div",
            "style": { "display": "none" },
            "children": [{ "tag": "textarea", "attrs": { "id": "t" } }]
        }]));
        let node = doc.query_selector("#t").unwrap();
        assert!(!is_visible(&doc, node));
    }

    #[test]
    fn test_visibility_hidden_is_inherited() {
        let doc = page(json!([{
            "tag": "div",
            "style": { "visibility": "hidden" },
            "children": [{ "tag": "button", "attrs": { "id": "b" } }]
        }]));
        let node = doc.query_selector("#b").unwrap();
        assert!(!is_visible(&doc, node));
    }

    #[test]
    fn test_detached_node_is_invisible() {
        let mut doc = page(json!([{ "tag": "div", "attrs": { "id": "a" } }]));
        let node = doc.query_selector("#a").unwrap();
        doc.remove(node);
        assert!(!is_visible(&doc, node));
    }

    #[test]
    fn test_closest_default_walks_ancestors() {
        let doc = page(json!([{
            "tag": "form",
            "children": [{ "tag": "div", "children": [{ "tag": "textarea", "attrs": { "id": "t" } }] }]
        }]));
        let node = doc.query_selector("#t").unwrap();
        let form = doc.closest(node, "form").unwrap();
        assert_eq!(doc.tag_name(form), "form");
        assert!(doc.closest(node, "fieldset").is_none());
    }
}
