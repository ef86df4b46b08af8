//! Arena tree storage
//!
//! A `Tree` owns every node of one document tree (semantic or
//! presentation). It only provides raw structural operations; all
//! semantic-tree edits must go through the mutator, and all
//! presentation-tree edits through the mirror updater.

use std::collections::HashSet;

use super::node::{Attribute, NodeData, NodeId, NodeKind, Presence, Snapshot};

/// One document tree. Nodes are arena-allocated and never freed;
/// deletion detaches, which keeps ids stable for undo snapshots.
#[derive(Clone, Debug, Default)]
pub struct Tree {
    nodes: Vec<NodeData>,
    marked_roots: HashSet<NodeId>,
}

impl Tree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a detached element node
    pub fn new_element(&mut self, name: &str) -> NodeId {
        self.alloc(NodeData::element(name, Presence::Real))
    }

    /// Allocate a detached text node
    pub fn new_text(&mut self, value: &str) -> NodeId {
        self.alloc(NodeData::text(value, Presence::Real))
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(data);
        id
    }

    /// Marks a node as a root for purposes of creating locations
    pub fn mark_root(&mut self, node: NodeId) {
        self.marked_roots.insert(node);
    }

    pub fn is_marked_root(&self, node: NodeId) -> bool {
        self.marked_roots.contains(&node)
    }

    /// Finds the marked root under which a node resides, if any
    pub fn find_root(&self, node: NodeId) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if self.is_marked_root(id) {
                return Some(id);
            }
            cur = self.parent(id);
        }
        None
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    fn data(&self, node: NodeId) -> &NodeData {
        &self.nodes[node.0]
    }

    fn data_mut(&mut self, node: NodeId) -> &mut NodeData {
        &mut self.nodes[node.0]
    }

    pub fn kind(&self, node: NodeId) -> NodeKind {
        self.data(node).kind
    }

    pub fn name(&self, node: NodeId) -> &str {
        &self.data(node).name
    }

    pub fn value(&self, node: NodeId) -> &str {
        &self.data(node).value
    }

    pub fn presence(&self, node: NodeId) -> Presence {
        self.data(node).presence
    }

    pub fn set_presence(&mut self, node: NodeId, presence: Presence) {
        self.data_mut(node).presence = presence;
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.data(node).parent
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.data(node).children
    }

    pub fn child_count(&self, node: NodeId) -> usize {
        self.data(node).children.len()
    }

    pub fn attrs(&self, node: NodeId) -> &[Attribute] {
        &self.data(node).attrs
    }

    /// Position of a node among its parent's children
    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.data(parent).children.iter().position(|&c| c == node)
    }

    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let ix = self.index_in_parent(node)?;
        if ix == 0 {
            None
        } else {
            Some(self.data(parent).children[ix - 1])
        }
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let ix = self.index_in_parent(node)?;
        self.data(parent).children.get(ix + 1).copied()
    }

    /// True if `node` is `ancestor` or a descendant of it
    pub fn is_ancestor_or_self(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.parent(id);
        }
        false
    }

    /// Node length in the location-model sense: child count for
    /// elements, char count for text nodes.
    pub fn node_len(&self, node: NodeId) -> usize {
        match self.kind(node) {
            NodeKind::Element => self.child_count(node),
            NodeKind::Text => self.value(node).chars().count(),
        }
    }

    pub fn attribute(&self, node: NodeId, ns: Option<&str>, name: &str) -> Option<&str> {
        self.data(node)
            .attrs
            .iter()
            .find(|a| a.ns.as_deref() == ns && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Raw attribute write. `None` removes the attribute. Returns the
    /// previous value.
    pub(crate) fn set_attribute_raw(
        &mut self,
        node: NodeId,
        ns: Option<&str>,
        name: &str,
        value: Option<&str>,
    ) -> Option<String> {
        let attrs = &mut self.data_mut(node).attrs;
        let pos = attrs
            .iter()
            .position(|a| a.ns.as_deref() == ns && a.name == name);
        match (pos, value) {
            (Some(i), Some(v)) => {
                let old = std::mem::replace(&mut attrs[i].value, v.to_string());
                Some(old)
            }
            (Some(i), None) => Some(attrs.remove(i).value),
            (None, Some(v)) => {
                attrs.push(Attribute {
                    ns: ns.map(str::to_string),
                    name: name.to_string(),
                    value: v.to_string(),
                });
                None
            }
            (None, None) => None,
        }
    }

    /// Raw text-value write. Returns the previous value.
    pub(crate) fn set_value_raw(&mut self, node: NodeId, value: &str) -> String {
        std::mem::replace(&mut self.data_mut(node).value, value.to_string())
    }

    /// Raw attach of a detached node. The caller has already validated
    /// the index and the detachment.
    pub(crate) fn attach(&mut self, parent: NodeId, index: usize, node: NodeId) {
        debug_assert!(self.data(node).parent.is_none());
        self.data_mut(parent).children.insert(index, node);
        self.data_mut(node).parent = Some(parent);
    }

    /// Raw detach. Returns the former parent and index.
    pub(crate) fn detach(&mut self, node: NodeId) -> (NodeId, usize) {
        let parent = self.data(node).parent.expect("detach of detached node");
        let ix = self
            .index_in_parent(node)
            .expect("child missing from parent list");
        self.data_mut(parent).children.remove(ix);
        self.data_mut(node).parent = None;
        (parent, ix)
    }

    /// Copy a subtree out into its owned value form
    pub fn snapshot(&self, node: NodeId) -> Snapshot {
        let data = self.data(node);
        Snapshot {
            kind: data.kind,
            name: data.name.clone(),
            value: data.value.clone(),
            attrs: data.attrs.clone(),
            presence: data.presence,
            children: data.children.iter().map(|&c| self.snapshot(c)).collect(),
        }
    }

    /// Build a detached subtree from a snapshot, returning its root
    pub fn build(&mut self, snapshot: &Snapshot) -> NodeId {
        let id = self.alloc(NodeData {
            kind: snapshot.kind,
            name: snapshot.name.clone(),
            value: snapshot.value.clone(),
            attrs: snapshot.attrs.clone(),
            presence: snapshot.presence,
            parent: None,
            children: Vec::new(),
        });
        for child in &snapshot.children {
            let c = self.build(child);
            let ix = self.child_count(id);
            self.attach(id, ix, c);
        }
        id
    }

    /// Depth-first walk of a subtree, self first
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            out.push(id);
            for &c in self.children(id).iter().rev() {
                stack.push(c);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_tree() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.new_element("doc");
        tree.mark_root(root);
        let note = tree.new_element("note");
        let text = tree.new_text("hi");
        tree.attach(root, 0, note);
        tree.attach(note, 0, text);
        (tree, root, note, text)
    }

    #[test]
    fn test_attach_detach() {
        let (mut tree, root, note, text) = small_tree();
        assert_eq!(tree.parent(note), Some(root));
        assert_eq!(tree.index_in_parent(text), Some(0));

        let (parent, ix) = tree.detach(note);
        assert_eq!((parent, ix), (root, 0));
        assert_eq!(tree.parent(note), None);
        assert_eq!(tree.child_count(root), 0);
        // the subtree under the detached node is intact
        assert_eq!(tree.children(note), &[text]);
    }

    #[test]
    fn test_find_root_stops_at_mark() {
        let (tree, root, _, text) = small_tree();
        assert_eq!(tree.find_root(text), Some(root));
        let mut tree = tree;
        let stray = tree.new_text("stray");
        assert_eq!(tree.find_root(stray), None);
    }

    #[test]
    fn test_node_len() {
        let (tree, root, _, text) = small_tree();
        assert_eq!(tree.node_len(root), 1);
        assert_eq!(tree.node_len(text), 2);
    }

    #[test]
    fn test_attribute_raw_set_and_remove() {
        let (mut tree, _, note, _) = small_tree();
        assert_eq!(tree.set_attribute_raw(note, None, "id", Some("n1")), None);
        assert_eq!(tree.attribute(note, None, "id"), Some("n1"));
        assert_eq!(
            tree.set_attribute_raw(note, None, "id", Some("n2")),
            Some("n1".to_string())
        );
        assert_eq!(
            tree.set_attribute_raw(note, None, "id", None),
            Some("n2".to_string())
        );
        assert_eq!(tree.attribute(note, None, "id"), None);
    }

    #[test]
    fn test_snapshot_build_round_trip() {
        let (mut tree, _, note, _) = small_tree();
        tree.set_attribute_raw(note, None, "id", Some("n1"));
        let snap = tree.snapshot(note);
        let copy = tree.build(&snap);
        assert_eq!(tree.snapshot(copy), snap);
        assert_eq!(tree.parent(copy), None);
    }

    #[test]
    fn test_descendants_order() {
        let (tree, root, note, text) = small_tree();
        assert_eq!(tree.descendants(root), vec![root, note, text]);
    }
}
