//! Editor adapter.
//!
//! One read/write contract over four kinds of editing surface. Plain fields
//! take a value; rich surfaces are rebuilt as one paragraph per line. The two
//! named rich-text models keep their own document state, so a write also has
//! to emit the notification each of them listens for, or the host will drop
//! or overwrite the new content on its next render.

use crate::dom::{HostDocument, HostEvent, NodeId};
use crate::locator;
use crate::types::{EditorKind, Platform, SurfaceKind};
use tracing::{debug, trace};

/// A located editor surface and the kind inferred for it at lookup time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditorHandle {
    pub node: NodeId,
    pub kind: EditorKind,
}

/// Infer the editing model behind `node`
pub fn infer_kind<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> EditorKind {
    match doc.tag_name(node).as_str() {
        "textarea" | "input" => return EditorKind::PlainField,
        _ => {}
    }
    if doc.closest(node, ".ProseMirror").is_some() {
        EditorKind::ProseMirror
    } else if doc.closest(node, ".ql-editor").is_some() {
        EditorKind::Quill
    } else {
        EditorKind::RichText
    }
}

/// Locate the platform's editor and infer its kind
pub fn resolve<D: HostDocument + ?Sized>(doc: &D, platform: Platform) -> Option<EditorHandle> {
    let node = locator::locate(doc, platform, SurfaceKind::Editor)?;
    Some(EditorHandle {
        node,
        kind: infer_kind(doc, node),
    })
}

/// Current text of the surface
pub fn read<D: HostDocument + ?Sized>(doc: &D, handle: &EditorHandle) -> String {
    match handle.kind {
        EditorKind::PlainField => doc.value(handle.node).unwrap_or_default(),
        _ => doc.inner_text(handle.node),
    }
}

/// Replace the surface's content with `text`, notify the host, focus, and
/// move the caret to the end
pub fn write<D: HostDocument + ?Sized>(doc: &mut D, handle: &EditorHandle, text: &str) {
    debug!(
        "Writing {} chars to {} editor",
        text.len(),
        handle.kind.as_str()
    );

    if handle.kind == EditorKind::PlainField {
        doc.set_value(handle.node, text);
        doc.dispatch_event(handle.node, HostEvent::Input);
        doc.dispatch_event(handle.node, HostEvent::Change);
        finish(doc, handle.node);
        return;
    }

    let target = match retarget(doc, handle.node) {
        Some(target) => target,
        None => {
            // Lone placeholder paragraph outside an editable root
            trace!("Writing placeholder text content directly");
            doc.set_text_content(handle.node, text);
            doc.dispatch_event(handle.node, HostEvent::Input);
            finish(doc, handle.node);
            return;
        }
    };

    render_paragraphs(doc, target, handle.kind, text);

    match handle.kind {
        EditorKind::ProseMirror => {
            doc.dispatch_event(
                target,
                HostEvent::BeforeInput {
                    input_type: "insertReplacementText".to_string(),
                    data: text.to_string(),
                },
            );
            doc.dispatch_event(target, HostEvent::Input);
        }
        EditorKind::Quill => {
            doc.dispatch_event(target, HostEvent::Input);
            doc.dispatch_event(target, HostEvent::TextChange);
        }
        _ => doc.dispatch_event(target, HostEvent::Input),
    }
    finish(doc, target);
}

/// The node a paragraph write should rebuild.
///
/// Some editors hand out a single `<p>` placeholder instead of their root.
/// Its editable parent is the real target; a placeholder without one can only
/// take plain text, signalled by `None`.
fn retarget<D: HostDocument + ?Sized>(doc: &D, node: NodeId) -> Option<NodeId> {
    if doc.tag_name(node) != "p" {
        return Some(node);
    }
    match doc.parent(node) {
        Some(parent) if doc.is_content_editable(parent) => {
            trace!("Retargeting placeholder paragraph to its editable parent");
            Some(parent)
        }
        _ => None,
    }
}

/// One `<p>` per line; empty lines keep an explicit `<br>` so blank lines survive
fn render_paragraphs<D: HostDocument + ?Sized>(
    doc: &mut D,
    target: NodeId,
    kind: EditorKind,
    text: &str,
) {
    doc.clear_children(target);
    for line in text.split('\n') {
        let paragraph = doc.create_element("p");
        if line.is_empty() {
            let br = doc.create_element("br");
            if kind == EditorKind::ProseMirror {
                doc.set_attribute(br, "class", "ProseMirror-trailingBreak");
            }
            doc.append_child(paragraph, br);
        } else {
            let text_node = doc.create_text(line);
            doc.append_child(paragraph, text_node);
        }
        doc.append_child(target, paragraph);
    }
}

fn finish<D: HostDocument + ?Sized>(doc: &mut D, node: NodeId) {
    doc.focus(node);
    doc.place_caret_at_end(node);
}
