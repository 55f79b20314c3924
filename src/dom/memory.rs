//! In-memory host document.
//!
//! An arena-backed element tree that implements [`HostDocument`] closely
//! enough to exercise locators, editor writes and overlay mounting without a
//! browser. Pages are loaded from JSON fixtures:
//!
//! ```json
//! {
//!   "address": "https://claude.ai/new",
//!   "body": [
//!     { "tag": "fieldset", "children": [
//!       { "tag": "div", "attrs": { "class": "ProseMirror", "contenteditable": "true" },
//!         "children": [{ "tag": "p", "children": ["hello"] }] }
//!     ] }
//!   ]
//! }
//! ```
//!
//! Besides the tree it records dispatched events, listener registrations,
//! selector query counts and structural mutations so callers can assert on
//! how the engine interacted with the page.

use super::selector::{SelectorList, SelectorTarget};
use super::{
    ComputedStyle, HostDocument, HostEvent, ListenerId, NodeEventKind, NodeId, ObserverId,
    WindowEventKind,
};
use crate::types::Rect;
use serde::Deserialize;
use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{trace, warn};

/// Rect given to elements that do not specify one
const DEFAULT_RECT: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 120.0,
    height: 32.0,
};

/// Tags rendered as their own line by `inner_text`
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "li", "ul", "ol", "pre", "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
    "section", "article", "form", "fieldset",
];

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("Invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A page snapshot: address plus the children of `<body>`
#[derive(Debug, Clone, Deserialize)]
pub struct FixturePage {
    pub address: String,
    #[serde(default)]
    pub body: Vec<FixtureNode>,
}

/// Either a bare string (text node) or an element description
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FixtureNode {
    Text(String),
    Element(FixtureElement),
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureElement {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default)]
    pub style: BTreeMap<String, String>,
    /// `[x, y, width, height]`
    #[serde(default)]
    pub rect: Option<[f64; 4]>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub children: Vec<FixtureNode>,
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attrs: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    rect: Option<Rect>,
    value: Option<String>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerTarget {
    Node(NodeId, NodeEventKind),
    Window(WindowEventKind),
}

/// An event the engine dispatched at a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchedEvent {
    pub target: NodeId,
    pub event: HostEvent,
}

/// In-memory implementation of [`HostDocument`]
#[derive(Debug)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    root: NodeId,
    body: NodeId,
    address: String,
    focused: Option<NodeId>,
    caret: Option<NodeId>,
    next_handle: u64,
    listeners: BTreeMap<ListenerId, ListenerTarget>,
    observers: BTreeSet<ObserverId>,
    events: Vec<DispatchedEvent>,
    pending_frames: usize,
    mutations: u64,
    queries: Cell<usize>,
}

impl MemoryDocument {
    /// Create an empty page at `address`
    pub fn new(address: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            address: address.to_string(),
            focused: None,
            caret: None,
            next_handle: 1,
            listeners: BTreeMap::new(),
            observers: BTreeSet::new(),
            events: Vec::new(),
            pending_frames: 0,
            mutations: 0,
            queries: Cell::new(0),
        };
        let root = doc.push_element("html", None);
        let body = doc.push_element("body", None);
        doc.attach(root, body, None);
        doc.root = root;
        doc.body = body;
        doc.mutations = 0;
        doc
    }

    pub fn from_page(page: &FixturePage) -> Self {
        let mut doc = Self::new(&page.address);
        let body = doc.body;
        for node in &page.body {
            doc.load_fragment(body, node);
        }
        doc.mutations = 0;
        doc
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, FixtureError> {
        let page: FixturePage = serde_json::from_value(value)?;
        Ok(Self::from_page(&page))
    }

    pub fn from_fixture_str(json: &str) -> Result<Self, FixtureError> {
        let page: FixturePage = serde_json::from_str(json)?;
        Ok(Self::from_page(&page))
    }

    pub fn load_fixture(path: &Path) -> Result<Self, FixtureError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_fixture_str(&contents)
    }

    /// Build `fixture` and append it to `parent`
    pub fn load_fragment(&mut self, parent: NodeId, fixture: &FixtureNode) -> NodeId {
        let node = self.build(fixture);
        self.append_child(parent, node);
        node
    }

    /// Parse a JSON fragment and append it to `parent`
    pub fn load_json_fragment(
        &mut self,
        parent: NodeId,
        value: serde_json::Value,
    ) -> Result<NodeId, FixtureError> {
        let fixture: FixtureNode = serde_json::from_value(value)?;
        Ok(self.load_fragment(parent, &fixture))
    }

    fn build(&mut self, fixture: &FixtureNode) -> NodeId {
        match fixture {
            FixtureNode::Text(text) => self.create_text(text),
            FixtureNode::Element(element) => {
                let node = self.push_element(&element.tag, element.rect.map(|r| Rect::new(r[0], r[1], r[2], r[3])));
                if let NodeKind::Element(data) = &mut self.nodes[node.0].kind {
                    data.attrs = element
                        .attrs
                        .iter()
                        .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
                        .collect();
                    data.style = element.style.clone();
                    data.value = element.value.clone();
                }
                for child in &element.children {
                    let child = self.build(child);
                    self.attach(node, child, None);
                }
                node
            }
        }
    }

    fn push_element(&mut self, tag: &str, rect: Option<Rect>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind: NodeKind::Element(ElementData {
                tag: tag.to_ascii_lowercase(),
                attrs: BTreeMap::new(),
                style: BTreeMap::new(),
                rect,
                value: None,
            }),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn element(&self, node: NodeId) -> Option<&ElementData> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(node.0)?.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
            if self.is_connected(parent) {
                self.mutations += 1;
            }
        }
        if self.focused.is_some_and(|f| !self.is_connected(f)) {
            self.focused = None;
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if child == parent || self.is_inclusive_ancestor(child, parent) {
            warn!("Refusing to insert node {:?} into its own subtree", child);
            return;
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = reference
            .and_then(|r| siblings.iter().position(|c| *c == r))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        if self.is_connected(parent) {
            self.mutations += 1;
        }
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.nodes[candidate.0].parent;
        }
        false
    }

    /// Connected nodes under `root` (exclusive) in document order
    fn descendants(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[root.0].children.iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        out
    }

    fn parse(&self, selector: &str) -> Option<SelectorList> {
        self.queries.set(self.queries.get() + 1);
        match SelectorList::parse(selector) {
            Ok(list) => Some(list),
            Err(e) => {
                warn!("Invalid selector '{}': {}", selector, e);
                None
            }
        }
    }

    fn inline_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element(data) if data.tag == "br" => out.push('\n'),
            NodeKind::Element(_) => {
                for child in &self.nodes[node.0].children {
                    self.inline_text(*child, out);
                }
            }
        }
    }

    fn is_block(&self, node: NodeId) -> bool {
        self.element(node)
            .map(|e| BLOCK_TAGS.contains(&e.tag.as_str()))
            .unwrap_or(false)
    }

    fn effective_style(&self, node: NodeId, property: &str) -> Option<String> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if let Some(value) = self.element(candidate).and_then(|e| e.style.get(property)) {
                return Some(value.clone());
            }
            current = self.nodes[candidate.0].parent;
        }
        None
    }

    fn next_handle(&mut self) -> u64 {
        let handle = self.next_handle;
        self.next_handle += 1;
        handle
    }

    /// Simulate a same-document navigation
    pub fn navigate(&mut self, address: &str) {
        trace!("Navigating to {}", address);
        self.address = address.to_string();
    }

    /// Set the rect of an element, e.g. to simulate layout changes
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        if let Some(element) = self.element_mut(node) {
            element.rect = Some(rect);
        }
    }

    /// Structural mutations since the last call
    pub fn take_mutations(&mut self) -> u64 {
        std::mem::take(&mut self.mutations)
    }

    /// Animation frames requested since the last call
    pub fn take_animation_frames(&mut self) -> usize {
        std::mem::take(&mut self.pending_frames)
    }

    pub fn events(&self) -> &[DispatchedEvent] {
        &self.events
    }

    /// Names of events dispatched at `node`, in order
    pub fn event_names(&self, node: NodeId) -> Vec<&'static str> {
        self.events
            .iter()
            .filter(|e| e.target == node)
            .map(|e| e.event.name())
            .collect()
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn caret(&self) -> Option<NodeId> {
        self.caret
    }

    pub fn query_count(&self) -> usize {
        self.queries.get()
    }

    pub fn reset_query_count(&self) {
        self.queries.set(0);
    }

    pub fn window_listener_count(&self) -> usize {
        self.listeners
            .values()
            .filter(|t| matches!(t, ListenerTarget::Window(_)))
            .count()
    }

    /// Live node listeners of `kind` attached to `node`
    pub fn node_listener_count(&self, node: NodeId, kind: NodeEventKind) -> usize {
        self.listeners
            .values()
            .filter(|t| **t == ListenerTarget::Node(node, kind))
            .count()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Child nodes of `node`, including text nodes
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<&str> {
        self.element(node)
            .and_then(|e| e.style.get(property))
            .map(String::as_str)
    }
}

impl SelectorTarget for MemoryDocument {
    type Node = NodeId;

    fn element_tag(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|e| e.tag.as_str())
    }

    fn element_attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .and_then(|e| e.attrs.get(name))
            .map(String::as_str)
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node.0].parent
    }
}

impl HostDocument for MemoryDocument {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn body(&self) -> NodeId {
        self.body
    }

    fn query_selector_all(&self, selector: &str) -> Vec<NodeId> {
        let Some(list) = self.parse(selector) else {
            return Vec::new();
        };
        self.descendants(self.root)
            .into_iter()
            .filter(|n| list.matches(self, *n))
            .collect()
    }

    fn query_within(&self, root: NodeId, selector: &str) -> Option<NodeId> {
        let list = self.parse(selector)?;
        self.descendants(root)
            .into_iter()
            .find(|n| list.matches(self, *n))
    }

    fn matches(&self, node: NodeId, selector: &str) -> bool {
        self.parse(selector)
            .map(|list| list.matches(self, node))
            .unwrap_or(false)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len() && self.is_inclusive_ancestor(self.root, node)
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.element(node).map(|e| e.tag.clone()).unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.element_attr(node, &name.to_ascii_lowercase())
            .map(str::to_string)
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element
                .attrs
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    fn is_content_editable(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if let Some(value) = self.element_attr(candidate, "contenteditable") {
                return matches!(value, "" | "true" | "plaintext-only");
            }
            current = self.nodes[candidate.0].parent;
        }
        false
    }

    fn computed_style(&self, node: NodeId) -> ComputedStyle {
        let mut style = ComputedStyle::default();
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.style(candidate, "display") == Some("none") {
                style.display = "none".to_string();
                break;
            }
            current = self.nodes[candidate.0].parent;
        }
        if let Some(visibility) = self.effective_style(node, "visibility") {
            style.visibility = visibility;
        }
        style
    }

    fn bounding_rect(&self, node: NodeId) -> Rect {
        if !self.is_connected(node) || self.computed_style(node).display == "none" {
            return Rect::default();
        }
        match self.element(node) {
            Some(element) => element.rect.unwrap_or(DEFAULT_RECT),
            None => Rect::default(),
        }
    }

    fn set_style(&mut self, node: NodeId, property: &str, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element
                .style
                .insert(property.to_string(), value.to_string());
        }
    }

    fn value(&self, node: NodeId) -> Option<String> {
        let element = self.element(node)?;
        match element.tag.as_str() {
            "textarea" | "input" => Some(element.value.clone().unwrap_or_default()),
            _ => None,
        }
    }

    fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(element) = self.element_mut(node) {
            element.value = Some(value.to_string());
        }
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        for n in std::iter::once(node).chain(self.descendants(node)) {
            if let NodeKind::Text(text) = &self.nodes[n.0].kind {
                out.push_str(text);
            }
        }
        out
    }

    fn inner_text(&self, node: NodeId) -> String {
        let children = &self.nodes[node.0].children;
        if !children.iter().any(|c| self.is_block(*c)) {
            let mut line = String::new();
            self.inline_text(node, &mut line);
            // A trailing <br> only keeps an otherwise empty line open
            if self.is_block(node) && line.ends_with('\n') {
                line.pop();
            }
            return line;
        }

        let mut lines = Vec::new();
        let mut inline = String::new();
        for child in children {
            if self.is_block(*child) {
                if !inline.is_empty() {
                    lines.push(std::mem::take(&mut inline));
                }
                lines.push(self.inner_text(*child));
            } else {
                self.inline_text(*child, &mut inline);
            }
        }
        if !inline.is_empty() {
            lines.push(inline);
        }
        lines.join("\n")
    }

    fn set_text_content(&mut self, node: NodeId, text: &str) {
        self.clear_children(node);
        if !text.is_empty() {
            let text_node = self.create_text(text);
            self.attach(node, text_node, None);
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_element(tag, None)
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind: NodeKind::Text(text.to_string()),
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.attach(parent, child, None);
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        self.attach(parent, child, reference);
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
    }

    fn clear_children(&mut self, node: NodeId) {
        let children = std::mem::take(&mut self.nodes[node.0].children);
        let had_children = !children.is_empty();
        for child in children {
            self.nodes[child.0].parent = None;
        }
        if had_children && self.is_connected(node) {
            self.mutations += 1;
        }
    }

    fn dispatch_event(&mut self, node: NodeId, event: HostEvent) {
        trace!("Dispatching {} at {:?}", event.name(), node);
        self.events.push(DispatchedEvent {
            target: node,
            event,
        });
    }

    fn focus(&mut self, node: NodeId) {
        if self.is_connected(node) {
            self.focused = Some(node);
        }
    }

    fn place_caret_at_end(&mut self, node: NodeId) {
        self.caret = Some(node);
    }

    fn add_listener(&mut self, node: NodeId, kind: NodeEventKind) -> ListenerId {
        let id = ListenerId(self.next_handle());
        self.listeners.insert(id, ListenerTarget::Node(node, kind));
        id
    }

    fn has_listener(&self, id: ListenerId) -> bool {
        match self.listeners.get(&id) {
            Some(ListenerTarget::Node(node, _)) => self.is_connected(*node),
            Some(ListenerTarget::Window(_)) => true,
            None => false,
        }
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn add_window_listener(&mut self, kind: WindowEventKind) -> ListenerId {
        let id = ListenerId(self.next_handle());
        self.listeners.insert(id, ListenerTarget::Window(kind));
        id
    }

    fn request_animation_frame(&mut self) {
        self.pending_frames += 1;
    }

    fn observe_mutations(&mut self, _root: NodeId) -> ObserverId {
        let id = ObserverId(self.next_handle());
        self.observers.insert(id);
        id
    }

    fn disconnect_observer(&mut self, id: ObserverId) {
        self.observers.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(body: serde_json::Value) -> MemoryDocument {
        MemoryDocument::from_json(json!({ "address": "https://example.com/", "body": body }))
            .unwrap()
    }

    #[test]
    fn test_query_returns_document_order() {
        let doc = doc(json!([
            { "tag": "div", "attrs": { "class": "turn", "id": "a" },
              "children": [{ "tag": "div", "attrs": { "class": "turn", "id": "b" } }] },
            { "tag": "div", "attrs": { "class": "turn", "id": "c" } }
        ]));
        let ids: Vec<_> = doc
            .query_selector_all(".turn")
            .into_iter()
            .map(|n| doc.attribute(n, "id").unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_removed_nodes_are_not_queried() {
        let mut doc = doc(json!([{ "tag": "button", "attrs": { "id": "send" } }]));
        let node = doc.query_selector("#send").unwrap();
        doc.remove(node);
        assert!(doc.query_selector("#send").is_none());
        assert!(!doc.is_connected(node));
    }

    #[test]
    fn test_query_within_is_scoped() {
        let doc = doc(json!([
            { "tag": "span", "attrs": { "id": "outside", "class": "x" } },
            { "tag": "form", "children": [{ "tag": "span", "attrs": { "id": "inside", "class": "x" } }] }
        ]));
        let form = doc.query_selector("form").unwrap();
        let found = doc.query_within(form, ".x").unwrap();
        assert_eq!(doc.attribute(found, "id").as_deref(), Some("inside"));
    }

    #[test]
    fn test_inner_text_paragraphs() {
        let doc = doc(json!([{
            "tag": "div",
            "attrs": { "id": "ed", "contenteditable": "true" },
            "children": [
                { "tag": "p", "children": ["first"] },
                { "tag": "p", "children": [{ "tag": "br" }] },
                { "tag": "p", "children": ["third ", { "tag": "strong", "children": ["bold"] }] }
            ]
        }]));
        let editor = doc.query_selector("#ed").unwrap();
        assert_eq!(doc.inner_text(editor), "first\n\nthird bold");
        assert_eq!(doc.text_content(editor), "firstthird bold");
    }

    #[test]
    fn test_content_editable_is_inherited() {
        let doc = doc(json!([{
            "tag": "div",
            "attrs": { "contenteditable": "true" },
            "children": [{ "tag": "p", "attrs": { "id": "p" } },
                         { "tag": "span", "attrs": { "id": "s", "contenteditable": "false" } }]
        }]));
        assert!(doc.is_content_editable(doc.query_selector("#p").unwrap()));
        assert!(!doc.is_content_editable(doc.query_selector("#s").unwrap()));
    }

    #[test]
    fn test_insert_before_and_mutation_count() {
        let mut doc = doc(json!([{ "tag": "div", "attrs": { "id": "row" },
            "children": [{ "tag": "button", "attrs": { "id": "send" } }] }]));
        let row = doc.query_selector("#row").unwrap();
        let send = doc.query_selector("#send").unwrap();
        let control = doc.create_element("button");
        doc.set_attribute(control, "id", "control");
        doc.insert_before(row, control, Some(send));
        assert_eq!(doc.children(row), &[control, send]);
        assert_eq!(doc.take_mutations(), 1);
        assert_eq!(doc.take_mutations(), 0);
    }

    #[test]
    fn test_listeners_die_with_their_node() {
        let mut doc = doc(json!([{ "tag": "button", "attrs": { "id": "send" } }]));
        let send = doc.query_selector("#send").unwrap();
        let listener = doc.add_listener(send, NodeEventKind::Click);
        assert!(doc.has_listener(listener));
        doc.remove(send);
        assert!(!doc.has_listener(listener));

        let scroll = doc.add_window_listener(WindowEventKind::Scroll);
        assert_eq!(doc.window_listener_count(), 1);
        doc.remove_listener(scroll);
        assert_eq!(doc.window_listener_count(), 0);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let doc = doc(json!([{ "tag": "div" }]));
        assert!(doc.query_selector_all("div[").is_empty());
        assert_eq!(doc.query_count(), 1);
    }

    #[test]
    fn test_fixture_value_and_navigation() {
        let mut doc = doc(json!([{ "tag": "textarea", "value": "draft" }]));
        let field = doc.query_selector("textarea").unwrap();
        assert_eq!(doc.value(field).as_deref(), Some("draft"));
        assert_eq!(doc.value(doc.body()), None);
        doc.navigate("https://example.com/other");
        assert_eq!(doc.address(), "https://example.com/other");
    }
}
