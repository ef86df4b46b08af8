//! Node-level types shared by both trees
//!
//! A node is an element or a text node. Presentation nodes additionally
//! carry a presence tag that decides whether path computation counts them
//! (see the location module).

use serde::{Deserialize, Serialize};

/// Handle to a node inside a [`Tree`](super::tree::Tree) arena.
///
/// Ids are stable for the lifetime of the tree: deletion detaches a node
/// but never reuses its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Structural kind of a node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    Element,
    Text,
}

/// How a node participates in path computation.
///
/// Semantic-tree nodes are always `Real`. The presentation tree also
/// carries decorative structure, which paths must skip over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Presence {
    /// Has a direct counterpart in the semantic tree; counts as 1
    Real,
    /// Decorative node with no counterpart; counts as 0
    Phantom,
    /// Decorative wrapper whose real descendants count through it
    PhantomWrap,
    /// Transient placeholder; not addressable at all
    Placeholder,
}

/// One attribute on an element node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Namespace prefix, if any
    pub ns: Option<String>,
    pub name: String,
    pub value: String,
}

/// Per-node storage inside a tree arena
#[derive(Clone, Debug, PartialEq)]
pub struct NodeData {
    pub kind: NodeKind,
    /// Element tag name; empty for text nodes
    pub name: String,
    /// Text value; empty for elements
    pub value: String,
    pub attrs: Vec<Attribute>,
    pub presence: Presence,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn element(name: &str, presence: Presence) -> Self {
        Self {
            kind: NodeKind::Element,
            name: name.to_string(),
            value: String::new(),
            attrs: Vec::new(),
            presence,
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn text(value: &str, presence: Presence) -> Self {
        Self {
            kind: NodeKind::Text,
            name: String::new(),
            value: value.to_string(),
            attrs: Vec::new(),
            presence,
            parent: None,
            children: Vec::new(),
        }
    }
}

/// Owned value form of a subtree.
///
/// Snapshots are how subtrees cross trees (mirror cloning) and time
/// (undo records): an arena cannot share live node references, so the
/// content is copied out into this serde-friendly shape and rebuilt
/// where needed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub kind: NodeKind,
    pub name: String,
    pub value: String,
    pub attrs: Vec<Attribute>,
    pub presence: Presence,
    pub children: Vec<Snapshot>,
}

impl Snapshot {
    /// Snapshot of a new element with no attributes or children
    pub fn element(name: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            name: name.to_string(),
            value: String::new(),
            attrs: Vec::new(),
            presence: Presence::Real,
            children: Vec::new(),
        }
    }

    /// Snapshot of a text node
    pub fn text(value: &str) -> Self {
        Self {
            kind: NodeKind::Text,
            name: String::new(),
            value: value.to_string(),
            attrs: Vec::new(),
            presence: Presence::Real,
            children: Vec::new(),
        }
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: Snapshot) -> Self {
        self.children.push(child);
        self
    }

    /// Builder-style attribute append
    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push(Attribute {
            ns: None,
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    /// Same content with a different presence tag on the whole subtree
    pub fn with_presence(mut self, presence: Presence) -> Self {
        self.presence = presence;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_builders() {
        let snap = Snapshot::element("note")
            .with_attr("id", "n1")
            .with_child(Snapshot::text("hi"));
        assert_eq!(snap.kind, NodeKind::Element);
        assert_eq!(snap.attrs.len(), 1);
        assert_eq!(snap.children[0].value, "hi");
        assert_eq!(snap.presence, Presence::Real);
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snap = Snapshot::element("p").with_child(Snapshot::text("x"));
        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap, back);
    }
}
