//! WASM API for the dual-tree editing core
//!
//! This module provides the JavaScript-facing API over a single open
//! document. The document lives on the Rust side; JavaScript addresses
//! nodes by path strings and receives the updated document plus undo
//! availability after every edit.

use wasm_bindgen::prelude::*;
use std::sync::Mutex;
use lazy_static::lazy_static;

use crate::api::helpers::{edit_error, serialize, validation_error};
use crate::editor::Editor;
use crate::location::PathTarget;
use crate::models::{NodeId, NodeKind, Snapshot};
use crate::serializer;
use crate::{wasm_info, wasm_log};

// WASM-owned editor storage (canonical source of truth)
lazy_static! {
    static ref EDITOR: Mutex<Option<Editor>> = Mutex::new(None);
}

// ============================================================================
// Result structures for edit operations
// ============================================================================

/// Result of an edit operation
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct EditResult {
    /// The whole document serialized to XML
    pub document: String,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// Result of a path query
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug)]
pub struct NodeInfo {
    pub path: String,
    /// "element" or "text"
    pub kind: String,
    /// Tag name for elements, empty for text nodes
    pub name: String,
    /// Text value for text nodes, empty for elements
    pub value: String,
    pub child_count: usize,
}

fn with_editor<T>(f: impl FnOnce(&mut Editor) -> Result<T, JsValue>) -> Result<T, JsValue> {
    let mut guard = EDITOR
        .lock()
        .map_err(|_| validation_error("editor lock poisoned"))?;
    match guard.as_mut() {
        Some(editor) => f(editor),
        None => Err(validation_error("no document loaded")),
    }
}

fn edit_result(editor: &Editor) -> Result<JsValue, JsValue> {
    let document = serializer::to_xml(editor.tree(), editor.root())
        .map_err(|e| validation_error(e.to_string()))?;
    serialize(
        &EditResult {
            document,
            can_undo: editor.can_undo(),
            can_redo: editor.can_redo(),
        },
        "Failed to serialize edit result",
    )
}

fn resolve_node(editor: &Editor, path: &str) -> Result<NodeId, JsValue> {
    editor.resolve(path).map_err(edit_error)
}

// ============================================================================
// Document lifecycle
// ============================================================================

/// Create a fresh document with an empty root element
#[wasm_bindgen(js_name = newDocument)]
pub fn new_document(root_name: &str) -> Result<JsValue, JsValue> {
    wasm_info!("newDocument called: root={}", root_name);
    if root_name.is_empty() {
        return Err(validation_error("root element name must not be empty"));
    }
    let editor = Editor::new(&Snapshot::element(root_name));
    let result = edit_result(&editor)?;
    *EDITOR
        .lock()
        .map_err(|_| validation_error("editor lock poisoned"))? = Some(editor);
    Ok(result)
}

/// Load a document from XML
#[wasm_bindgen(js_name = loadDocument)]
pub fn load_document(xml: &str) -> Result<JsValue, JsValue> {
    wasm_info!("loadDocument called: {} bytes", xml.len());
    let snapshot = serializer::from_xml(xml).map_err(|e| validation_error(e.to_string()))?;
    let editor = Editor::new(&snapshot);
    let result = edit_result(&editor)?;
    *EDITOR
        .lock()
        .map_err(|_| validation_error("editor lock poisoned"))? = Some(editor);
    Ok(result)
}

/// Export the current document as XML
#[wasm_bindgen(js_name = exportXml)]
pub fn export_xml() -> Result<String, JsValue> {
    with_editor(|editor| {
        serializer::to_xml(editor.tree(), editor.root())
            .map_err(|e| validation_error(e.to_string()))
    })
}

// ============================================================================
// Edit operations
// ============================================================================

/// Insert a new empty element under the node at `parent_path`
#[wasm_bindgen(js_name = insertElement)]
pub fn insert_element(parent_path: &str, index: usize, name: &str) -> Result<JsValue, JsValue> {
    wasm_log!("insertElement: parent={} index={} name={}", parent_path, index, name);
    with_editor(|editor| {
        let parent = resolve_node(editor, parent_path)?;
        editor
            .insert_at(parent, index, &[Snapshot::element(name)])
            .map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Insert text at a char offset in the node at `path`
#[wasm_bindgen(js_name = insertText)]
pub fn insert_text(path: &str, offset: usize, text: &str) -> Result<JsValue, JsValue> {
    wasm_log!("insertText: path={} offset={} len={}", path, offset, text.len());
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        editor.insert_text(node, offset, text).map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Delete the node at `path`
#[wasm_bindgen(js_name = deleteNode)]
pub fn delete_node(path: &str) -> Result<JsValue, JsValue> {
    wasm_log!("deleteNode: path={}", path);
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        editor.delete_node(node).map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Delete a char range from the text node at `path`
#[wasm_bindgen(js_name = deleteText)]
pub fn delete_text(path: &str, offset: usize, length: usize) -> Result<JsValue, JsValue> {
    wasm_log!("deleteText: path={} offset={} length={}", path, offset, length);
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        editor
            .delete_text(node, offset, length)
            .map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Replace the value of the text node at `path`; empty deletes it
#[wasm_bindgen(js_name = setText)]
pub fn set_text(path: &str, value: &str) -> Result<JsValue, JsValue> {
    wasm_log!("setText: path={} len={}", path, value.len());
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        editor.set_text(node, value).map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Set or remove (`value = None`) an attribute on the element at `path`
#[wasm_bindgen(js_name = setAttribute)]
pub fn set_attribute(path: &str, name: &str, value: Option<String>) -> Result<JsValue, JsValue> {
    wasm_log!("setAttribute: path={} name={} present={}", path, name, value.is_some());
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        let (ns, local) = match name.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, name),
        };
        editor
            .set_attribute(node, ns, local, value.as_deref())
            .map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Split the ancestor at `top_path` in two at a point inside it
#[wasm_bindgen(js_name = splitAt)]
pub fn split_at(top_path: &str, path: &str, offset: usize) -> Result<JsValue, JsValue> {
    wasm_log!("splitAt: top={} path={} offset={}", top_path, path, offset);
    with_editor(|editor| {
        let top = resolve_node(editor, top_path)?;
        let node = resolve_node(editor, path)?;
        editor.split_at(top, node, offset).map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Merge the text node at `path` with a following text sibling
#[wasm_bindgen(js_name = mergeTextNodes)]
pub fn merge_text_nodes(path: &str) -> Result<JsValue, JsValue> {
    wasm_log!("mergeTextNodes: path={}", path);
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        editor.merge_text_nodes(node).map_err(edit_error)?;
        edit_result(editor)
    })
}

// ============================================================================
// Undo
// ============================================================================

#[wasm_bindgen(js_name = undo)]
pub fn undo() -> Result<JsValue, JsValue> {
    wasm_log!("undo called");
    with_editor(|editor| {
        editor.undo().map_err(edit_error)?;
        edit_result(editor)
    })
}

#[wasm_bindgen(js_name = redo)]
pub fn redo() -> Result<JsValue, JsValue> {
    wasm_log!("redo called");
    with_editor(|editor| {
        editor.redo().map_err(edit_error)?;
        edit_result(editor)
    })
}

/// Open an undo group; edits until `endUndoGroup` undo as one step
#[wasm_bindgen(js_name = startUndoGroup)]
pub fn start_undo_group(desc: &str) -> Result<(), JsValue> {
    wasm_log!("startUndoGroup: {}", desc);
    with_editor(|editor| {
        editor.start_group(desc);
        Ok(())
    })
}

/// Open a group that rolls over after `limit` recorded changes
#[wasm_bindgen(js_name = startLimitedUndoGroup)]
pub fn start_limited_undo_group(desc: &str, limit: usize) -> Result<(), JsValue> {
    wasm_log!("startLimitedUndoGroup: {} limit={}", desc, limit);
    if limit == 0 {
        return Err(validation_error("group limit must be at least 1"));
    }
    with_editor(|editor| {
        editor.start_limited_group(desc, limit);
        Ok(())
    })
}

#[wasm_bindgen(js_name = endUndoGroup)]
pub fn end_undo_group() -> Result<(), JsValue> {
    wasm_log!("endUndoGroup called");
    with_editor(|editor| {
        editor.end_group();
        Ok(())
    })
}

#[wasm_bindgen(js_name = endAllUndoGroups)]
pub fn end_all_undo_groups() -> Result<(), JsValue> {
    with_editor(|editor| {
        editor.end_all_groups();
        Ok(())
    })
}

// ============================================================================
// Queries
// ============================================================================

/// Describe the node at a path
#[wasm_bindgen(js_name = nodeAt)]
pub fn node_at(path: &str) -> Result<JsValue, JsValue> {
    with_editor(|editor| {
        let node = resolve_node(editor, path)?;
        let tree = editor.tree();
        let info = NodeInfo {
            path: path.to_string(),
            kind: match tree.kind(node) {
                NodeKind::Element => "element".to_string(),
                NodeKind::Text => "text".to_string(),
            },
            name: tree.name(node).to_string(),
            value: tree.value(node).to_string(),
            child_count: tree.child_count(node),
        };
        serialize(&info, "Failed to serialize node info")
    })
}

/// Value of the attribute addressed by a path ending in `@name`
#[wasm_bindgen(js_name = attributeAt)]
pub fn attribute_at(path: &str) -> Result<Option<String>, JsValue> {
    with_editor(|editor| {
        let parsed = path
            .parse()
            .map_err(|e: crate::errors::LocationError| edit_error(e.into()))?;
        match editor.node_at(&parsed).map_err(|e| edit_error(e.into()))? {
            Some(PathTarget::Attribute(node, name)) => Ok(crate::location::qualified_attribute(
                editor.tree(),
                node,
                &name,
            )
            .map(str::to_string)),
            _ => Err(validation_error(format!("no attribute at {}", path))),
        }
    })
}

/// Whether the editor entered the inconsistent state
#[wasm_bindgen(js_name = isInconsistent)]
pub fn is_inconsistent() -> Result<bool, JsValue> {
    with_editor(|editor| Ok(editor.is_inconsistent()))
}

// ============================================================================
// Refresh gate and save boundary
// ============================================================================

#[wasm_bindgen(js_name = suspendRefresh)]
pub fn suspend_refresh() -> Result<(), JsValue> {
    with_editor(|editor| {
        editor.suspend_refresh();
        Ok(())
    })
}

#[wasm_bindgen(js_name = resumeRefresh)]
pub fn resume_refresh() -> Result<(), JsValue> {
    with_editor(|editor| editor.resume_refresh().map_err(edit_error))
}

#[wasm_bindgen(js_name = markSaved)]
pub fn mark_saved() -> Result<(), JsValue> {
    with_editor(|editor| {
        editor.mark_saved();
        Ok(())
    })
}

#[wasm_bindgen(js_name = markSaveFailed)]
pub fn mark_save_failed(reason: &str) -> Result<(), JsValue> {
    with_editor(|editor| {
        editor.mark_save_failed(reason);
        Ok(())
    })
}

#[wasm_bindgen(js_name = hasUnsavedChanges)]
pub fn has_unsaved_changes() -> Result<bool, JsValue> {
    with_editor(|editor| Ok(editor.has_unsaved_changes()))
}
