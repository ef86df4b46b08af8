//! Mutation gateway for the semantic tree
//!
//! The `Mutator` is the sole point of modification for the tree it
//! owns. Methods are divided into primitive and complex operations:
//! primitives perform exactly one structural change and emit one typed
//! event describing it (deletion emits a before/after pair), while
//! complex operations are compositions of primitives. Events signaling
//! removal are emitted **before** the node is detached, so subscribers
//! can still compute its path; events signaling additions and value
//! changes are emitted after the tree has changed.
//!
//! Every operation is atomic: all precondition checks run before any
//! mutation takes place.

use crate::errors::{EditorError, LocationError, MutationError};
use crate::location::{self, Path, PathTarget};
use crate::models::{NodeId, NodeKind, Snapshot, Tree};
use crate::utils::chars::{char_len, char_range_remove, char_splice};

/// One primitive change to the semantic tree. Each event carries
/// enough data to construct its own inverse.
#[derive(Clone, Debug, PartialEq)]
pub enum ChangeEvent {
    /// A node was inserted under `parent` at `index`
    NodeInserted {
        parent: NodeId,
        index: usize,
        node: NodeId,
    },
    /// `node` is about to be detached; it is still in the tree
    BeforeDeleteNode {
        node: NodeId,
        parent: NodeId,
        index: usize,
    },
    /// `node` has been detached
    NodeDeleted {
        node: NodeId,
        former_parent: NodeId,
        former_index: usize,
    },
    /// A text node's value changed
    TextValueSet {
        node: NodeId,
        old_value: String,
        new_value: String,
    },
    /// An attribute changed; `None` values mean absent
    AttributeSet {
        node: NodeId,
        ns: Option<String>,
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

/// Receiver for committed mutation events.
///
/// Sinks run synchronously, inside the mutation call stack, before the
/// primitive returns. A sink error aborts the operation and is treated
/// by the editor as fatal.
pub trait EventSink {
    fn on_change(&mut self, tree: &Tree, ev: &ChangeEvent) -> Result<(), EditorError>;
}

/// Sink that drops every event; used by standalone mutator callers
pub struct NullSink;

impl EventSink for NullSink {
    fn on_change(&mut self, _tree: &Tree, _ev: &ChangeEvent) -> Result<(), EditorError> {
        Ok(())
    }
}

/// The sole channel for structural edits to one semantic tree
#[derive(Debug)]
pub struct Mutator {
    tree: Tree,
    root: NodeId,
}

impl Mutator {
    /// Wrap a tree, marking `root` for location purposes
    pub fn new(mut tree: Tree, root: NodeId) -> Self {
        tree.mark_root(root);
        Self { tree, root }
    }

    /// Build a fresh semantic tree from a document snapshot
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut tree = Tree::new();
        let root = tree.build(snapshot);
        Self::new(tree, root)
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocate a detached element for later insertion
    pub fn new_element(&mut self, name: &str) -> NodeId {
        self.tree.new_element(name)
    }

    /// Allocate a detached text node for later insertion
    pub fn new_text(&mut self, value: &str) -> NodeId {
        self.tree.new_text(value)
    }

    /// Build a detached subtree from a snapshot
    pub fn build(&mut self, snapshot: &Snapshot) -> NodeId {
        self.tree.build(snapshot)
    }

    /// Path of a node relative to the tree root
    pub fn node_to_path(&self, node: NodeId) -> Result<Path, LocationError> {
        location::node_to_path(&self.tree, self.root, node)
    }

    /// Node (or attribute) addressed by a path relative to the root
    pub fn path_to_node(&self, path: &Path) -> Result<Option<PathTarget>, LocationError> {
        location::path_to_node(&self.tree, self.root, path)
    }

    fn check_under_root(&self, node: NodeId) -> Result<(), MutationError> {
        if self.tree.is_ancestor_or_self(self.root, node) {
            Ok(())
        } else {
            Err(MutationError::NotUnderRoot)
        }
    }

    // ------------------------------------------------------------------
    // Primitives
    // ------------------------------------------------------------------

    /// A primitive. Inserts a detached node under `parent` at `index`.
    pub fn insert_node_at(
        &mut self,
        parent: NodeId,
        index: usize,
        node: NodeId,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        self.check_under_root(parent)?;
        if self.tree.kind(parent) != NodeKind::Element {
            return Err(MutationError::NotAnElement.into());
        }
        if self.tree.parent(node).is_some() {
            return Err(MutationError::AlreadyAttached.into());
        }
        let len = self.tree.child_count(parent);
        if index > len {
            return Err(MutationError::IndexOutOfBounds { index, len }.into());
        }

        self.tree.attach(parent, index, node);
        log::debug!("insert_node_at: parent={:?} index={}", parent, index);
        sink.on_change(
            &self.tree,
            &ChangeEvent::NodeInserted {
                parent,
                index,
                node,
            },
        )
    }

    /// A primitive. Detaches a node, emitting the before-delete event
    /// while the node is still attached.
    pub fn delete_node(
        &mut self,
        node: NodeId,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        self.check_under_root(node)?;
        let parent = self.tree.parent(node).ok_or(MutationError::NoParent)?;
        let index = self
            .tree
            .index_in_parent(node)
            .ok_or(MutationError::NoParent)?;

        sink.on_change(
            &self.tree,
            &ChangeEvent::BeforeDeleteNode {
                node,
                parent,
                index,
            },
        )?;
        self.tree.detach(node);
        log::debug!("delete_node: node={:?} from parent={:?}", node, parent);
        sink.on_change(
            &self.tree,
            &ChangeEvent::NodeDeleted {
                node,
                former_parent: parent,
                former_index: index,
            },
        )
    }

    /// A primitive. Sets a text node's value. Callers editing at a
    /// high level should use [`set_text`](Self::set_text), which keeps
    /// text nodes from becoming empty.
    pub fn set_text_value(
        &mut self,
        node: NodeId,
        value: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        self.check_under_root(node)?;
        if self.tree.kind(node) != NodeKind::Text {
            return Err(MutationError::NotAText.into());
        }
        let old_value = self.tree.set_value_raw(node, value);
        sink.on_change(
            &self.tree,
            &ChangeEvent::TextValueSet {
                node,
                old_value,
                new_value: value.to_string(),
            },
        )
    }

    /// A primitive. Sets or removes (`value = None`) an attribute.
    pub fn set_attribute(
        &mut self,
        node: NodeId,
        ns: Option<&str>,
        name: &str,
        value: Option<&str>,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        self.check_under_root(node)?;
        if self.tree.kind(node) != NodeKind::Element {
            return Err(MutationError::NotAnElement.into());
        }
        let old_value = self.tree.set_attribute_raw(node, ns, name, value);
        sink.on_change(
            &self.tree,
            &ChangeEvent::AttributeSet {
                node,
                ns: ns.map(str::to_string),
                name: name.to_string(),
                old_value,
                new_value: value.map(str::to_string),
            },
        )
    }

    // ------------------------------------------------------------------
    // Complex operations
    // ------------------------------------------------------------------

    /// A complex method. Builds each snapshot and inserts them in order
    /// at the given position.
    pub fn insert_at(
        &mut self,
        parent: NodeId,
        index: usize,
        what: &[Snapshot],
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        for (i, snap) in what.iter().enumerate() {
            let node = self.tree.build(snap);
            self.insert_node_at(parent, index + i, node, sink)?;
        }
        Ok(())
    }

    /// A complex method. Inserts before a sibling; `None` appends.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        node: NodeId,
        before_this: Option<NodeId>,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        let index = match before_this {
            None => self.tree.child_count(parent),
            Some(sibling) => match self.tree.index_in_parent(sibling) {
                Some(ix) if self.tree.parent(sibling) == Some(parent) => ix,
                _ => {
                    return Err(MutationError::IndexOutOfBounds {
                        index: usize::MAX,
                        len: self.tree.child_count(parent),
                    }
                    .into())
                }
            },
        };
        self.insert_node_at(parent, index, node, sink)
    }

    /// A complex method. Inserts text, reusing an existing adjacent
    /// text node whenever possible rather than creating a new one.
    ///
    /// Returns `(modified, text_node)`: `modified` is the node whose
    /// value changed (absent when a fresh node was created), and
    /// `text_node` is the node now holding the inserted text. Both are
    /// absent when `text` is empty.
    pub fn insert_text(
        &mut self,
        node: NodeId,
        offset: usize,
        text: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(Option<NodeId>, Option<NodeId>), EditorError> {
        if text.is_empty() {
            return Ok((None, None));
        }
        self.check_under_root(node)?;
        match self.tree.kind(node) {
            NodeKind::Text => {
                let value = char_splice(self.tree.value(node), offset, text)
                    .ok_or(MutationError::IndexOutOfBounds {
                        index: offset,
                        len: char_len(self.tree.value(node)),
                    })?;
                self.set_text_value(node, &value, sink)?;
                Ok((Some(node), Some(node)))
            }
            NodeKind::Element => {
                let children = self.tree.children(node);
                // prefer the text node that ends at the caret
                if offset > 0 {
                    if let Some(&prev) = children.get(offset - 1) {
                        if self.tree.kind(prev) == NodeKind::Text {
                            let value = format!("{}{}", self.tree.value(prev), text);
                            self.set_text_value(prev, &value, sink)?;
                            return Ok((Some(prev), Some(prev)));
                        }
                    }
                }
                if let Some(&next) = children.get(offset) {
                    if self.tree.kind(next) == NodeKind::Text {
                        let value = format!("{}{}", text, self.tree.value(next));
                        self.set_text_value(next, &value, sink)?;
                        return Ok((Some(next), Some(next)));
                    }
                }
                let fresh = self.tree.new_text(text);
                self.insert_node_at(node, offset, fresh, sink)?;
                Ok((None, Some(fresh)))
            }
        }
    }

    /// A complex method. Sets a text node, deleting it when the value
    /// is empty so the tree never holds empty text nodes.
    pub fn set_text(
        &mut self,
        node: NodeId,
        value: &str,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        if value.is_empty() {
            self.delete_node(node, sink)
        } else {
            self.set_text_value(node, value, sink)
        }
    }

    /// A complex method. Deletes `length` chars of text at `offset`.
    /// The node is deleted outright if it becomes empty.
    pub fn delete_text(
        &mut self,
        node: NodeId,
        offset: usize,
        length: usize,
        sink: &mut dyn EventSink,
    ) -> Result<(), EditorError> {
        self.check_under_root(node)?;
        if self.tree.kind(node) != NodeKind::Text {
            return Err(MutationError::NotAText.into());
        }
        let value = char_range_remove(self.tree.value(node), offset, length).ok_or(
            MutationError::IndexOutOfBounds {
                index: offset + length,
                len: char_len(self.tree.value(node)),
            },
        )?;
        self.set_text(node, &value, sink)
    }

    /// A complex method. Splits the tree in two halves from `node` up
    /// to and including `top`, replacing `top` with the halves.
    ///
    /// Returns the two halves. Fails with `BadSplit` when asked to
    /// split a text node against itself, which would merely produce two
    /// adjacent text siblings.
    pub fn split_at(
        &mut self,
        top: NodeId,
        node: NodeId,
        offset: usize,
        sink: &mut dyn EventSink,
    ) -> Result<(NodeId, NodeId), EditorError> {
        self.check_under_root(top)?;
        if node == top && self.tree.kind(node) == NodeKind::Text {
            return Err(MutationError::BadSplit.into());
        }
        if !self.tree.is_ancestor_or_self(top, node) {
            return Err(MutationError::NotUnderRoot.into());
        }
        let parent = self.tree.parent(top).ok_or(MutationError::NoParent)?;
        let at = self
            .tree
            .index_in_parent(top)
            .ok_or(MutationError::NoParent)?;

        // operate on a snapshot, then swap the halves in for the top
        let snap = self.tree.snapshot(top);
        let inner = location::node_to_path(&self.tree, top, node)
            .map_err(|e| EditorError::Location(e))?;
        let (left, right) = split_snapshot(&snap, inner.segments(), offset);

        self.delete_node(top, sink)?;
        let left_id = self.tree.build(&left);
        let right_id = self.tree.build(&right);
        self.insert_node_at(parent, at, left_id, sink)?;
        self.insert_node_at(parent, at + 1, right_id, sink)?;
        Ok((left_id, right_id))
    }

    /// A complex method. Combines a text node with a following text
    /// sibling. Returns a caret between the merged parts, or between
    /// the two nodes when no merge happened.
    pub fn merge_text_nodes(
        &mut self,
        node: NodeId,
        sink: &mut dyn EventSink,
    ) -> Result<(NodeId, usize), EditorError> {
        self.check_under_root(node)?;
        if let Some(next) = self.tree.next_sibling(node) {
            if self.tree.kind(node) == NodeKind::Text && self.tree.kind(next) == NodeKind::Text {
                let offset = char_len(self.tree.value(node));
                let merged = format!("{}{}", self.tree.value(node), self.tree.value(next));
                self.set_text_value(node, &merged, sink)?;
                self.delete_node(next, sink)?;
                return Ok((node, offset));
            }
        }
        let parent = self.tree.parent(node).ok_or(MutationError::NoParent)?;
        let ix = self
            .tree
            .index_in_parent(node)
            .ok_or(MutationError::NoParent)?;
        Ok((parent, ix + 1))
    }

    /// A complex method. Removes a node and merges text nodes that
    /// become adjacent. Returns the caret of the removal point.
    pub fn remove_node(
        &mut self,
        node: NodeId,
        sink: &mut dyn EventSink,
    ) -> Result<(NodeId, usize), EditorError> {
        self.check_under_root(node)?;
        let prev = self.tree.prev_sibling(node);
        let parent = self.tree.parent(node).ok_or(MutationError::NoParent)?;
        let ix = self
            .tree
            .index_in_parent(node)
            .ok_or(MutationError::NoParent)?;
        self.delete_node(node, sink)?;
        match prev {
            None => Ok((parent, ix)),
            Some(prev) => self.merge_text_nodes(prev, sink),
        }
    }

    /// A complex method. Removes contiguous siblings, then merges text
    /// around the gap. Returns the caret, absent for an empty list.
    pub fn remove_nodes(
        &mut self,
        nodes: &[NodeId],
        sink: &mut dyn EventSink,
    ) -> Result<Option<(NodeId, usize)>, EditorError> {
        let Some(&first) = nodes.first() else {
            return Ok(None);
        };
        for pair in nodes.windows(2) {
            if self.tree.next_sibling(pair[0]) != Some(pair[1]) {
                return Err(MutationError::NotContiguous.into());
            }
        }
        let prev = self.tree.prev_sibling(first);
        let parent = self.tree.parent(first).ok_or(MutationError::NoParent)?;
        let ix = self
            .tree
            .index_in_parent(first)
            .ok_or(MutationError::NoParent)?;
        for &node in nodes {
            self.delete_node(node, sink)?;
        }
        match prev {
            None => Ok(Some((parent, ix))),
            Some(prev) => self.merge_text_nodes(prev, sink).map(Some),
        }
    }

    /// A complex method. Removes the contents between two carets that
    /// share a parent element. Returns the cut point and the removed
    /// content as snapshots, in document order.
    pub fn cut(
        &mut self,
        start: (NodeId, usize),
        end: (NodeId, usize),
        sink: &mut dyn EventSink,
    ) -> Result<((NodeId, usize), Vec<Snapshot>), EditorError> {
        let (start_node, start_offset) = start;
        let (end_node, end_offset) = end;
        self.check_under_root(start_node)?;
        self.check_under_root(end_node)?;

        // whole range inside one text node
        if start_node == end_node && self.tree.kind(start_node) == NodeKind::Text {
            let len = end_offset.saturating_sub(start_offset);
            let removed = Snapshot::text(
                &self
                    .tree
                    .value(start_node)
                    .chars()
                    .skip(start_offset)
                    .take(len)
                    .collect::<String>(),
            );
            let parent = self.tree.parent(start_node).ok_or(MutationError::NoParent)?;
            let ix = self
                .tree
                .index_in_parent(start_node)
                .ok_or(MutationError::NoParent)?;
            self.delete_text(start_node, start_offset, len, sink)?;
            // an emptied text node is deleted outright; the caret falls
            // back to the slot it occupied
            let caret = if self.tree.parent(start_node).is_some() {
                (start_node, start_offset)
            } else {
                (parent, ix)
            };
            return Ok((caret, vec![removed]));
        }

        let (parent, first_gap) = self.caret_boundary(start_node, start_offset, true)?;
        let (end_parent, last_gap) = self.caret_boundary(end_node, end_offset, false)?;
        if parent != end_parent || last_gap < first_gap {
            return Err(MutationError::NotContiguous.into());
        }

        let middle: Vec<NodeId> = self.tree.children(parent)[first_gap..last_gap].to_vec();
        let mut removed = Vec::new();

        // trim tail of the start text node
        if self.tree.kind(start_node) == NodeKind::Text && start_node != parent {
            let tail: String = self.tree.value(start_node).chars().skip(start_offset).collect();
            if !tail.is_empty() {
                removed.push(Snapshot::text(&tail));
                self.delete_text(start_node, start_offset, char_len(&tail), sink)?;
            }
        }
        for &node in &middle {
            removed.push(self.tree.snapshot(node));
            self.delete_node(node, sink)?;
        }
        // trim head of the end text node
        if self.tree.kind(end_node) == NodeKind::Text && end_node != parent && end_offset > 0 {
            let head: String = self.tree.value(end_node).chars().take(end_offset).collect();
            removed.push(Snapshot::text(&head));
            self.delete_text(end_node, 0, end_offset, sink)?;
        }

        let caret = if self.tree.kind(start_node) == NodeKind::Text && start_node != parent {
            if self.tree.parent(start_node).is_some() {
                (start_node, start_offset)
            } else {
                // the trim emptied the start text node; its slot was the
                // child gap just before it
                (parent, first_gap - 1)
            }
        } else {
            (parent, start_offset)
        };
        Ok((caret, removed))
    }

    /// Child-gap index of a caret under its parent element. For a text
    /// node caret the gap sits after (start) or before (end) the node.
    fn caret_boundary(
        &self,
        node: NodeId,
        offset: usize,
        is_start: bool,
    ) -> Result<(NodeId, usize), EditorError> {
        match self.tree.kind(node) {
            NodeKind::Element => Ok((node, offset)),
            NodeKind::Text => {
                let parent = self.tree.parent(node).ok_or(MutationError::NoParent)?;
                let ix = self
                    .tree
                    .index_in_parent(node)
                    .ok_or(MutationError::NoParent)?;
                Ok((parent, if is_start { ix + 1 } else { ix }))
            }
        }
    }
}

/// Splits a snapshot along a descendant path. `path` is the ordinal
/// path of the split node inside `snap`; `offset` is a child index for
/// elements or a char offset for text. Empty text halves are dropped.
fn split_snapshot(snap: &Snapshot, path: &[usize], offset: usize) -> (Snapshot, Snapshot) {
    match path.split_first() {
        None => match snap.kind {
            NodeKind::Text => {
                let left: String = snap.value.chars().take(offset).collect();
                let right: String = snap.value.chars().skip(offset).collect();
                (Snapshot::text(&left), Snapshot::text(&right))
            }
            NodeKind::Element => {
                let at = offset.min(snap.children.len());
                let mut left = shell(snap);
                let mut right = shell(snap);
                left.children = snap.children[..at].to_vec();
                right.children = snap.children[at..].to_vec();
                (left, right)
            }
        },
        Some((&ix, rest)) => {
            let (child_left, child_right) = split_snapshot(&snap.children[ix], rest, offset);
            let mut left = shell(snap);
            let mut right = shell(snap);
            left.children = snap.children[..ix].to_vec();
            if !is_empty_text(&child_left) {
                left.children.push(child_left);
            }
            if !is_empty_text(&child_right) {
                right.children.push(child_right);
            }
            right.children.extend_from_slice(&snap.children[ix + 1..]);
            (left, right)
        }
    }
}

fn shell(snap: &Snapshot) -> Snapshot {
    Snapshot {
        kind: snap.kind,
        name: snap.name.clone(),
        value: String::new(),
        attrs: snap.attrs.clone(),
        presence: snap.presence,
        children: Vec::new(),
    }
}

fn is_empty_text(snap: &Snapshot) -> bool {
    snap.kind == NodeKind::Text && snap.value.is_empty()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Sink that keeps every event for inspection
    pub(crate) struct RecordingSink(pub Vec<ChangeEvent>);

    impl EventSink for RecordingSink {
        fn on_change(&mut self, _tree: &Tree, ev: &ChangeEvent) -> Result<(), EditorError> {
            self.0.push(ev.clone());
            Ok(())
        }
    }

    fn note_doc() -> Mutator {
        Mutator::from_snapshot(
            &Snapshot::element("doc")
                .with_child(Snapshot::element("note").with_child(Snapshot::text("hi"))),
        )
    }

    #[test]
    fn test_insert_emits_after_mutation() {
        let mut m = note_doc();
        let root = m.root();
        let para = m.new_element("para");
        let mut sink = RecordingSink(Vec::new());
        m.insert_node_at(root, 1, para, &mut sink).unwrap();
        assert_eq!(
            sink.0,
            vec![ChangeEvent::NodeInserted {
                parent: root,
                index: 1,
                node: para
            }]
        );
        assert_eq!(m.tree().children(root)[1], para);
    }

    #[test]
    fn test_insert_bad_index_mutates_nothing() {
        let mut m = note_doc();
        let root = m.root();
        let para = m.new_element("para");
        let mut sink = RecordingSink(Vec::new());
        let err = m.insert_node_at(root, 5, para, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Mutation(MutationError::IndexOutOfBounds { .. })
        ));
        assert!(sink.0.is_empty());
        assert_eq!(m.tree().child_count(root), 1);
    }

    #[test]
    fn test_delete_emits_before_and_after() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let mut sink = RecordingSink(Vec::new());
        m.delete_node(note, &mut sink).unwrap();
        assert_eq!(
            sink.0,
            vec![
                ChangeEvent::BeforeDeleteNode {
                    node: note,
                    parent: root,
                    index: 0
                },
                ChangeEvent::NodeDeleted {
                    node: note,
                    former_parent: root,
                    former_index: 0
                },
            ]
        );
        assert_eq!(m.tree().child_count(root), 0);
    }

    #[test]
    fn test_delete_detached_fails() {
        let mut m = note_doc();
        let stray = m.new_element("stray");
        let err = m.delete_node(stray, &mut NullSink).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Mutation(MutationError::NotUnderRoot)
        ));
    }

    #[test]
    fn test_set_text_value_carries_old_and_new() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        let mut sink = RecordingSink(Vec::new());
        m.set_text_value(text, "ho", &mut sink).unwrap();
        assert_eq!(
            sink.0,
            vec![ChangeEvent::TextValueSet {
                node: text,
                old_value: "hi".to_string(),
                new_value: "ho".to_string(),
            }]
        );
    }

    #[test]
    fn test_set_attribute_old_and_new() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let mut sink = RecordingSink(Vec::new());
        m.set_attribute(note, None, "id", Some("n1"), &mut sink).unwrap();
        m.set_attribute(note, None, "id", None, &mut sink).unwrap();
        assert_eq!(sink.0.len(), 2);
        assert_eq!(
            sink.0[1],
            ChangeEvent::AttributeSet {
                node: note,
                ns: None,
                name: "id".to_string(),
                old_value: Some("n1".to_string()),
                new_value: None,
            }
        );
    }

    #[test]
    fn test_insert_text_reuses_preceding_text_node() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];

        let (modified, holder) = m.insert_text(note, 1, "!", &mut NullSink).unwrap();
        assert_eq!(modified, Some(text));
        assert_eq!(holder, Some(text));
        assert_eq!(m.tree().value(text), "hi!");
    }

    #[test]
    fn test_insert_text_creates_node_when_needed() {
        let mut m = note_doc();
        let root = m.root();
        let (modified, holder) = m.insert_text(root, 0, "abc", &mut NullSink).unwrap();
        assert_eq!(modified, None);
        let holder = holder.unwrap();
        assert_eq!(m.tree().value(holder), "abc");
        assert_eq!(m.tree().children(root)[0], holder);

        // empty insert does nothing
        assert_eq!(m.insert_text(root, 0, "", &mut NullSink).unwrap(), (None, None));
    }

    #[test]
    fn test_insert_text_mid_text_node() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        m.insert_text(text, 1, "XY", &mut NullSink).unwrap();
        assert_eq!(m.tree().value(text), "hXYi");
    }

    #[test]
    fn test_delete_text_removes_emptied_node() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        m.delete_text(text, 0, 2, &mut NullSink).unwrap();
        assert_eq!(m.tree().child_count(note), 0);
    }

    #[test]
    fn test_split_at_element() {
        // <doc><note>hi</note></doc> split inside "hi" up to note
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        let (left, right) = m.split_at(note, text, 1, &mut NullSink).unwrap();
        assert_eq!(m.tree().children(root), &[left, right]);
        let left_text = m.tree().children(left)[0];
        let right_text = m.tree().children(right)[0];
        assert_eq!(m.tree().value(left_text), "h");
        assert_eq!(m.tree().value(right_text), "i");
    }

    #[test]
    fn test_split_text_against_itself_rejected() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        let err = m.split_at(text, text, 1, &mut NullSink).unwrap_err();
        assert!(matches!(err, EditorError::Mutation(MutationError::BadSplit)));
    }

    #[test]
    fn test_merge_text_nodes() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        let extra = m.new_text(" there");
        m.insert_node_at(note, 1, extra, &mut NullSink).unwrap();

        let (caret_node, caret_offset) = m.merge_text_nodes(text, &mut NullSink).unwrap();
        assert_eq!((caret_node, caret_offset), (text, 2));
        assert_eq!(m.tree().value(text), "hi there");
        assert_eq!(m.tree().child_count(note), 1);
    }

    #[test]
    fn test_remove_node_merges_neighbours() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        // note -> ["hi", <b/>, "yo"]
        let b = m.new_element("b");
        m.insert_node_at(note, 1, b, &mut NullSink).unwrap();
        let yo = m.new_text("yo");
        m.insert_node_at(note, 2, yo, &mut NullSink).unwrap();

        let caret = m.remove_node(b, &mut NullSink).unwrap();
        let text = m.tree().children(note)[0];
        assert_eq!(caret, (text, 2));
        assert_eq!(m.tree().value(text), "hiyo");
    }

    #[test]
    fn test_remove_nodes_requires_contiguity() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let a = m.new_element("a");
        let b = m.new_element("b");
        let c = m.new_element("c");
        for (i, n) in [a, b, c].into_iter().enumerate() {
            m.insert_node_at(root, 1 + i, n, &mut NullSink).unwrap();
        }
        let err = m.remove_nodes(&[a, c], &mut NullSink).unwrap_err();
        assert!(matches!(
            err,
            EditorError::Mutation(MutationError::NotContiguous)
        ));
        // nothing was removed
        assert_eq!(m.tree().children(root), &[note, a, b, c]);

        m.remove_nodes(&[a, b, c], &mut NullSink).unwrap();
        assert_eq!(m.tree().children(root), &[note]);
    }

    #[test]
    fn test_cut_within_one_text_node() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];
        m.set_text_value(text, "abcd", &mut NullSink).unwrap();

        let ((node, offset), removed) = m.cut((text, 1), (text, 3), &mut NullSink).unwrap();
        assert_eq!((node, offset), (text, 1));
        assert_eq!(removed, vec![Snapshot::text("bc")]);
        assert_eq!(m.tree().value(text), "ad");
    }

    #[test]
    fn test_cut_across_siblings() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let start = m.tree().children(note)[0]; // "hi"
        let b = m.new_element("b");
        m.insert_node_at(note, 1, b, &mut NullSink).unwrap();
        let end = m.new_text("world");
        m.insert_node_at(note, 2, end, &mut NullSink).unwrap();

        let (caret, removed) = m.cut((start, 1), (end, 3), &mut NullSink).unwrap();
        assert_eq!(caret, (start, 1));
        assert_eq!(
            removed,
            vec![
                Snapshot::text("i"),
                Snapshot::element("b"),
                Snapshot::text("wor"),
            ]
        );
        assert_eq!(m.tree().value(start), "h");
        assert_eq!(m.tree().value(m.tree().children(note)[1]), "ld");
    }

    #[test]
    fn test_cut_whole_text_value_moves_caret_to_parent() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let text = m.tree().children(note)[0];

        let (caret, removed) = m.cut((text, 0), (text, 2), &mut NullSink).unwrap();
        assert_eq!(removed, vec![Snapshot::text("hi")]);
        // the emptied text node was deleted; the caret sits in its slot
        assert_eq!(caret, (note, 0));
        assert_eq!(m.tree().child_count(note), 0);
    }

    #[test]
    fn test_cut_consuming_start_sibling_moves_caret_to_parent() {
        let mut m = note_doc();
        let root = m.root();
        let note = m.tree().children(root)[0];
        let start = m.tree().children(note)[0]; // "hi"
        let b = m.new_element("b");
        m.insert_node_at(note, 1, b, &mut NullSink).unwrap();
        let end = m.new_text("world");
        m.insert_node_at(note, 2, end, &mut NullSink).unwrap();

        let (caret, removed) = m.cut((start, 0), (end, 3), &mut NullSink).unwrap();
        assert_eq!(
            removed,
            vec![
                Snapshot::text("hi"),
                Snapshot::element("b"),
                Snapshot::text("wor"),
            ]
        );
        assert_eq!(caret, (note, 0));
        assert_eq!(m.tree().value(m.tree().children(note)[0]), "ld");
    }
}
