//! Mirror updater for the presentation tree
//!
//! The presentation tree is a clone of the semantic tree, decorated
//! by the host with additional phantom structure. The `MirrorUpdater`
//! consumes the mutator's events and keeps the mirrored (real) portion of the
//! presentation tree isomorphic to the semantic tree at all times.
//! Nothing else writes to the presentation tree's real nodes.
//!
//! Correspondence between the trees is kept in an explicit two-way
//! index; nodes never hold references into the other tree. A lookup
//! that comes up empty means the trees have diverged, which is fatal.

use std::collections::HashMap;

use crate::errors::{EditorError, FatalError};
use crate::location::real_weight;
use crate::models::{NodeId, NodeKind, Presence, Snapshot, Tree};
use crate::mutator::{ChangeEvent, EventSink};

/// Two-way semantic/presentation node correspondence
#[derive(Debug, Default)]
struct MirrorIndex {
    to_pres: HashMap<NodeId, NodeId>,
    to_sem: HashMap<NodeId, NodeId>,
}

impl MirrorIndex {
    fn insert(&mut self, sem: NodeId, pres: NodeId) {
        self.to_pres.insert(sem, pres);
        self.to_sem.insert(pres, sem);
    }

    fn remove_pres(&mut self, pres: NodeId) {
        if let Some(sem) = self.to_sem.remove(&pres) {
            self.to_pres.remove(&sem);
        }
    }
}

/// Owns the presentation tree and keeps it synchronized
#[derive(Debug)]
pub struct MirrorUpdater {
    tree: Tree,
    root: NodeId,
    index: MirrorIndex,
}

impl MirrorUpdater {
    /// Clone the semantic tree into a fresh presentation tree
    pub fn new(semantic: &Tree, semantic_root: NodeId) -> Self {
        let mut updater = Self {
            tree: Tree::new(),
            root: NodeId(0),
            index: MirrorIndex::default(),
        };
        let root = updater.clone_subtree(semantic, semantic_root);
        updater.tree.mark_root(root);
        updater.root = root;
        updater
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Presentation counterpart of a semantic node
    pub fn counterpart_of(&self, sem: NodeId) -> Option<NodeId> {
        self.index.to_pres.get(&sem).copied()
    }

    /// Semantic counterpart of a presentation node; absent for phantoms
    pub fn semantic_of(&self, pres: NodeId) -> Option<NodeId> {
        self.index.to_sem.get(&pres).copied()
    }

    /// Apply one semantic change to the presentation tree
    pub fn apply(&mut self, semantic: &Tree, ev: &ChangeEvent) -> Result<(), FatalError> {
        match ev {
            ChangeEvent::NodeInserted {
                parent,
                index,
                node,
            } => {
                let pres_parent = self.must_find(*parent)?;
                let (target, at) = self.insertion_point(pres_parent, *index)?;
                let pres = self.clone_subtree(semantic, *node);
                self.tree.attach(target, at, pres);
                Ok(())
            }
            // the pre-deletion notice carries no work for the mirror
            ChangeEvent::BeforeDeleteNode { .. } => Ok(()),
            ChangeEvent::NodeDeleted { node, .. } => {
                let pres = self.must_find(*node)?;
                self.tree.detach(pres);
                for id in self.tree.descendants(pres) {
                    self.index.remove_pres(id);
                }
                Ok(())
            }
            ChangeEvent::TextValueSet {
                node, new_value, ..
            } => {
                let pres = self.must_find(*node)?;
                self.tree.set_value_raw(pres, new_value);
                Ok(())
            }
            ChangeEvent::AttributeSet {
                node,
                ns,
                name,
                new_value,
                ..
            } => {
                let pres = self.must_find(*node)?;
                self.tree
                    .set_attribute_raw(pres, ns.as_deref(), name, new_value.as_deref());
                Ok(())
            }
        }
    }

    /// Translate a semantic caret into a presentation caret.
    ///
    /// When the caret node has no counterpart, falls back to the
    /// closest mapped ancestor, placing the caret at its end.
    pub fn from_semantic_caret(
        &self,
        semantic: &Tree,
        caret: (NodeId, usize),
    ) -> Result<(NodeId, usize), FatalError> {
        let (node, offset) = caret;
        if let Some(pres) = self.counterpart_of(node) {
            return match semantic.kind(node) {
                NodeKind::Text => Ok((pres, offset)),
                // transiently out-of-range offsets degrade to the end
                // of the counterpart
                NodeKind::Element => match self.insertion_point(pres, offset) {
                    Ok(point) => Ok(point),
                    Err(_) => Ok((pres, self.tree.child_count(pres))),
                },
            };
        }
        let mut cur = semantic.parent(node);
        while let Some(anc) = cur {
            if let Some(pres) = self.counterpart_of(anc) {
                return Ok((pres, self.tree.child_count(pres)));
            }
            cur = semantic.parent(anc);
        }
        Err(FatalError::CannotLocate(format!(
            "no presentation counterpart on the ancestor chain of {:?}",
            node
        )))
    }

    /// Insert a decorative node at a raw presentation position. The
    /// subtree is forced to phantom presence so paths skip it.
    pub fn insert_phantom(
        &mut self,
        pres_parent: NodeId,
        index: usize,
        snapshot: &Snapshot,
    ) -> NodeId {
        let node = self.tree.build(snapshot);
        for id in self.tree.descendants(node) {
            if self.tree.presence(id) == Presence::Real {
                self.tree.set_presence(id, Presence::Phantom);
            }
        }
        self.tree.attach(pres_parent, index, node);
        node
    }

    /// Wrap an existing presentation child in a transparent wrapper
    /// element. Path ordinals pass through the wrapper unchanged.
    pub fn wrap_child(&mut self, child: NodeId, wrapper_name: &str) -> Result<NodeId, FatalError> {
        let parent = self.tree.parent(child).ok_or_else(|| {
            FatalError::Internal("cannot wrap a detached presentation node".to_string())
        })?;
        let ix = self
            .tree
            .index_in_parent(child)
            .ok_or_else(|| FatalError::Internal("child missing from parent".to_string()))?;
        let wrapper = self.tree.new_element(wrapper_name);
        self.tree.set_presence(wrapper, Presence::PhantomWrap);
        self.tree.detach(child);
        self.tree.attach(parent, ix, wrapper);
        self.tree.attach(wrapper, 0, child);
        Ok(wrapper)
    }

    /// Remove a phantom or wrapper node, hoisting a wrapper's children
    /// back into its place.
    pub fn remove_phantom(&mut self, node: NodeId) -> Result<(), FatalError> {
        match self.tree.presence(node) {
            Presence::Phantom | Presence::Placeholder => {
                self.tree.detach(node);
                Ok(())
            }
            Presence::PhantomWrap => {
                let (parent, ix) = self.tree.detach(node);
                let children: Vec<NodeId> = self.tree.children(node).to_vec();
                for (i, child) in children.into_iter().enumerate() {
                    self.tree.detach(child);
                    self.tree.attach(parent, ix + i, child);
                }
                Ok(())
            }
            Presence::Real => Err(FatalError::Internal(
                "refusing to remove a real presentation node".to_string(),
            )),
        }
    }

    /// The real content of the presentation tree, with phantoms dropped
    /// and wrappers flattened away. Equal to the semantic snapshot
    /// whenever the mirror is consistent.
    pub fn real_projection(&self) -> Snapshot {
        self.project(self.root)
    }

    fn project(&self, node: NodeId) -> Snapshot {
        let mut snap = Snapshot {
            kind: self.tree.kind(node),
            name: self.tree.name(node).to_string(),
            value: self.tree.value(node).to_string(),
            attrs: self.tree.attrs(node).to_vec(),
            presence: Presence::Real,
            children: Vec::new(),
        };
        self.project_children(node, &mut snap.children);
        snap
    }

    fn project_children(&self, node: NodeId, out: &mut Vec<Snapshot>) {
        for &child in self.tree.children(node) {
            match self.tree.presence(child) {
                Presence::Real => out.push(self.project(child)),
                Presence::PhantomWrap => self.project_children(child, out),
                Presence::Phantom | Presence::Placeholder => {}
            }
        }
    }

    fn must_find(&self, sem: NodeId) -> Result<NodeId, FatalError> {
        self.counterpart_of(sem).ok_or_else(|| {
            FatalError::CannotLocate(format!("no presentation counterpart for {:?}", sem))
        })
    }

    /// Raw child position for ordinal `index` under a presentation
    /// element, descending into wrappers when the ordinal falls inside
    /// one.
    fn insertion_point(
        &self,
        pres_parent: NodeId,
        index: usize,
    ) -> Result<(NodeId, usize), FatalError> {
        let mut remaining = index;
        for (i, &child) in self.tree.children(pres_parent).iter().enumerate() {
            if remaining == 0 {
                return Ok((pres_parent, i));
            }
            let w = real_weight(&self.tree, child);
            if remaining < w {
                return self.insertion_point(child, remaining);
            }
            remaining -= w;
        }
        if remaining == 0 {
            Ok((pres_parent, self.tree.child_count(pres_parent)))
        } else {
            Err(FatalError::CannotLocate(format!(
                "ordinal {} exceeds the real children of {:?}",
                index, pres_parent
            )))
        }
    }

    fn clone_subtree(&mut self, semantic: &Tree, node: NodeId) -> NodeId {
        let pres = match semantic.kind(node) {
            NodeKind::Element => {
                let p = self.tree.new_element(semantic.name(node));
                for attr in semantic.attrs(node) {
                    self.tree
                        .set_attribute_raw(p, attr.ns.as_deref(), &attr.name, Some(&attr.value));
                }
                p
            }
            NodeKind::Text => self.tree.new_text(semantic.value(node)),
        };
        self.index.insert(node, pres);
        for &child in semantic.children(node) {
            let pc = self.clone_subtree(semantic, child);
            let ix = self.tree.child_count(pres);
            self.tree.attach(pres, ix, pc);
        }
        pres
    }
}

impl EventSink for MirrorUpdater {
    fn on_change(&mut self, tree: &Tree, ev: &ChangeEvent) -> Result<(), EditorError> {
        self.apply(tree, ev).map_err(EditorError::from)
    }
}
