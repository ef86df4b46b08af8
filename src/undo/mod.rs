//! Undo engine
//!
//! History is recorded as inverse-carrying records built at event time:
//! each record stores paths and [`Snapshot`]s, never live `NodeId`s, so
//! a record stays valid no matter how the arena ids evolve between its
//! creation and its replay.
//!
//! Records are grouped: a group undoes and redoes as one step. Groups
//! nest, and a group may carry a size limit; when the limit is reached
//! the group closes itself and a fresh group with the same description
//! opens transparently, so very long typing runs break into bounded
//! undo steps without the host doing anything.
//!
//! Replay drives the ordinary mutator primitives through a sink that
//! does not include the recorder, so replayed changes update the mirror
//! and listeners but are never re-recorded.

use crate::errors::{EditorError, FatalError};
use crate::location::{Path, PathTarget};
use crate::models::{NodeId, Snapshot, Tree};
use crate::mutator::{ChangeEvent, EventSink, Mutator};

/// A caret expressed in path form, stable across replays
pub type CaretPath = (Path, usize);

/// One invertible primitive change
#[derive(Clone, Debug, PartialEq)]
pub enum UndoRecord {
    InsertNodeAt {
        parent: Path,
        index: usize,
        node: Snapshot,
    },
    DeleteNode {
        parent: Path,
        index: usize,
        node: Snapshot,
    },
    SetTextValue {
        node: Path,
        old_value: String,
        new_value: String,
    },
    SetAttribute {
        node: Path,
        ns: Option<String>,
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    },
}

impl UndoRecord {
    /// Build a record from a mutation event. Paths are computed now,
    /// while the event's nodes are still in place; deletion records
    /// come from the pre-deletion notice for that reason.
    pub fn from_event(
        tree: &Tree,
        root: NodeId,
        ev: &ChangeEvent,
    ) -> Result<Option<Self>, EditorError> {
        let rec = match ev {
            ChangeEvent::NodeInserted {
                parent,
                index,
                node,
            } => Some(UndoRecord::InsertNodeAt {
                parent: crate::location::node_to_path(tree, root, *parent)?,
                index: *index,
                node: tree.snapshot(*node),
            }),
            ChangeEvent::BeforeDeleteNode {
                node,
                parent,
                index,
            } => Some(UndoRecord::DeleteNode {
                parent: crate::location::node_to_path(tree, root, *parent)?,
                index: *index,
                node: tree.snapshot(*node),
            }),
            // the deletion record was built from the notice above
            ChangeEvent::NodeDeleted { .. } => None,
            ChangeEvent::TextValueSet {
                node,
                old_value,
                new_value,
            } => Some(UndoRecord::SetTextValue {
                node: crate::location::node_to_path(tree, root, *node)?,
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            }),
            ChangeEvent::AttributeSet {
                node,
                ns,
                name,
                old_value,
                new_value,
            } => Some(UndoRecord::SetAttribute {
                node: crate::location::node_to_path(tree, root, *node)?,
                ns: ns.clone(),
                name: name.clone(),
                old_value: old_value.clone(),
                new_value: new_value.clone(),
            }),
        };
        Ok(rec)
    }

    fn apply_undo(&self, m: &mut Mutator, sink: &mut dyn EventSink) -> Result<(), EditorError> {
        match self {
            UndoRecord::InsertNodeAt { parent, index, .. } => {
                let node = child_at(m, parent, *index)?;
                m.delete_node(node, sink)
            }
            UndoRecord::DeleteNode {
                parent,
                index,
                node,
            } => {
                let parent = resolve_node(m, parent)?;
                let built = m.build(node);
                m.insert_node_at(parent, *index, built, sink)
            }
            UndoRecord::SetTextValue {
                node, old_value, ..
            } => {
                let node = resolve_node(m, node)?;
                m.set_text_value(node, old_value, sink)
            }
            UndoRecord::SetAttribute {
                node,
                ns,
                name,
                old_value,
                ..
            } => {
                let node = resolve_node(m, node)?;
                m.set_attribute(node, ns.as_deref(), name, old_value.as_deref(), sink)
            }
        }
    }

    fn apply_redo(&self, m: &mut Mutator, sink: &mut dyn EventSink) -> Result<(), EditorError> {
        match self {
            UndoRecord::InsertNodeAt {
                parent,
                index,
                node,
            } => {
                let parent = resolve_node(m, parent)?;
                let built = m.build(node);
                m.insert_node_at(parent, *index, built, sink)
            }
            UndoRecord::DeleteNode { parent, index, .. } => {
                let node = child_at(m, parent, *index)?;
                m.delete_node(node, sink)
            }
            UndoRecord::SetTextValue {
                node, new_value, ..
            } => {
                let node = resolve_node(m, node)?;
                m.set_text_value(node, new_value, sink)
            }
            UndoRecord::SetAttribute {
                node,
                ns,
                name,
                new_value,
                ..
            } => {
                let node = resolve_node(m, node)?;
                m.set_attribute(node, ns.as_deref(), name, new_value.as_deref(), sink)
            }
        }
    }
}

fn resolve_node(m: &Mutator, path: &Path) -> Result<NodeId, EditorError> {
    match m.path_to_node(path)? {
        Some(PathTarget::Node(node)) => Ok(node),
        _ => Err(FatalError::CannotLocate(format!("no node at path {}", path)).into()),
    }
}

fn child_at(m: &Mutator, parent: &Path, index: usize) -> Result<NodeId, EditorError> {
    let parent = resolve_node(m, parent)?;
    m.tree()
        .children(parent)
        .get(index)
        .copied()
        .ok_or_else(|| {
            EditorError::from(FatalError::CannotLocate(format!(
                "no child {} under {:?}",
                index, parent
            )))
        })
}

/// A named batch of records undone and redone as one step
#[derive(Debug)]
pub struct UndoGroup {
    desc: String,
    entries: Vec<UndoEntry>,
    limit: Option<usize>,
    caret_before: Option<CaretPath>,
    caret_after: Option<CaretPath>,
}

impl UndoGroup {
    fn new(desc: &str, limit: Option<usize>, caret_before: Option<CaretPath>) -> Self {
        Self {
            desc: desc.to_string(),
            entries: Vec::new(),
            limit,
            caret_before,
            caret_after: None,
        }
    }

    pub fn desc(&self) -> &str {
        &self.desc
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn undo(&self, m: &mut Mutator, sink: &mut dyn EventSink) -> Result<(), EditorError> {
        for entry in self.entries.iter().rev() {
            entry.undo(m, sink)?;
        }
        Ok(())
    }

    fn redo(&self, m: &mut Mutator, sink: &mut dyn EventSink) -> Result<(), EditorError> {
        for entry in &self.entries {
            entry.redo(m, sink)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub enum UndoEntry {
    Record(UndoRecord),
    Group(UndoGroup),
}

impl UndoEntry {
    fn undo(&self, m: &mut Mutator, sink: &mut dyn EventSink) -> Result<(), EditorError> {
        match self {
            UndoEntry::Record(rec) => rec.apply_undo(m, sink),
            UndoEntry::Group(g) => g.undo(m, sink),
        }
    }

    fn redo(&self, m: &mut Mutator, sink: &mut dyn EventSink) -> Result<(), EditorError> {
        match self {
            UndoEntry::Record(rec) => rec.apply_redo(m, sink),
            UndoEntry::Group(g) => g.redo(m, sink),
        }
    }

    fn caret_before(&self) -> Option<CaretPath> {
        match self {
            UndoEntry::Record(_) => None,
            UndoEntry::Group(g) => g.caret_before.clone(),
        }
    }

    fn caret_after(&self) -> Option<CaretPath> {
        match self {
            UndoEntry::Record(_) => None,
            UndoEntry::Group(g) => g.caret_after.clone(),
        }
    }
}

/// Linear undo history with nested group support
#[derive(Debug, Default)]
pub struct UndoEngine {
    list: Vec<UndoEntry>,
    /// Number of entries currently "done"; the redo tail starts here
    index: usize,
    open: Vec<UndoGroup>,
    undoing_or_redoing: bool,
}

impl UndoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn can_undo(&self) -> bool {
        self.index > 0 || self.open.iter().any(|g| !g.is_empty())
    }

    pub fn can_redo(&self) -> bool {
        self.index < self.list.len()
    }

    pub fn undoing_or_redoing(&self) -> bool {
        self.undoing_or_redoing
    }

    /// Append a record, truncating any redo tail. Recording during a
    /// replay is ignored.
    pub fn record(&mut self, rec: UndoRecord) {
        if self.undoing_or_redoing {
            return;
        }
        // size-limited groups roll over transparently; the finished
        // group nests into an enclosing open group just as end_group
        // would close it
        if let Some(group) = self.open.last() {
            if group.limit.is_some_and(|l| group.entries.len() >= l) {
                let finished = self.open.pop().expect("group stack checked non-empty");
                let desc = finished.desc.clone();
                let limit = finished.limit;
                match self.open.last_mut() {
                    Some(outer) => outer.entries.push(UndoEntry::Group(finished)),
                    None => self.push_closed(UndoEntry::Group(finished)),
                }
                self.open.push(UndoGroup::new(&desc, limit, None));
            }
        }
        match self.open.last_mut() {
            Some(group) => group.entries.push(UndoEntry::Record(rec)),
            None => self.push_closed(UndoEntry::Record(rec)),
        }
    }

    /// Open a group; further records land inside it until it ends
    pub fn start_group(&mut self, desc: &str, caret_before: Option<CaretPath>) {
        self.open.push(UndoGroup::new(desc, None, caret_before));
    }

    /// Open a group that rolls over after `limit` entries
    pub fn start_limited_group(
        &mut self,
        desc: &str,
        limit: usize,
        caret_before: Option<CaretPath>,
    ) {
        self.open.push(UndoGroup::new(desc, Some(limit), caret_before));
    }

    /// Close the innermost group. Empty groups are discarded rather
    /// than recorded as no-op undo steps.
    pub fn end_group(&mut self, caret_after: Option<CaretPath>) {
        let Some(mut group) = self.open.pop() else {
            return;
        };
        group.caret_after = caret_after;
        if group.is_empty() {
            return;
        }
        match self.open.last_mut() {
            Some(outer) => outer.entries.push(UndoEntry::Group(group)),
            None => self.push_closed(UndoEntry::Group(group)),
        }
    }

    pub fn end_all_groups(&mut self) {
        while !self.open.is_empty() {
            self.end_group(None);
        }
    }

    pub fn in_group(&self) -> bool {
        !self.open.is_empty()
    }

    fn push_closed(&mut self, entry: UndoEntry) {
        self.list.truncate(self.index);
        self.list.push(entry);
        self.index = self.list.len();
    }

    /// Undo one step. Returns the caret to restore, when the step
    /// captured one.
    pub fn undo(
        &mut self,
        m: &mut Mutator,
        sink: &mut dyn EventSink,
    ) -> Result<Option<CaretPath>, EditorError> {
        if self.undoing_or_redoing {
            return Err(FatalError::ConcurrentUndoRedo.into());
        }
        self.end_all_groups();
        if self.index == 0 {
            return Ok(None);
        }
        self.undoing_or_redoing = true;
        let entry = &self.list[self.index - 1];
        let result = entry.undo(m, sink);
        let caret = entry.caret_before();
        self.undoing_or_redoing = false;
        result?;
        self.index -= 1;
        log::debug!("undo: history index now {}", self.index);
        Ok(caret)
    }

    /// Redo one step. Returns the caret to restore, when the step
    /// captured one.
    pub fn redo(
        &mut self,
        m: &mut Mutator,
        sink: &mut dyn EventSink,
    ) -> Result<Option<CaretPath>, EditorError> {
        if self.undoing_or_redoing {
            return Err(FatalError::ConcurrentUndoRedo.into());
        }
        self.end_all_groups();
        if self.index >= self.list.len() {
            return Ok(None);
        }
        self.undoing_or_redoing = true;
        let entry = &self.list[self.index];
        let result = entry.redo(m, sink);
        let caret = entry.caret_after();
        self.undoing_or_redoing = false;
        result?;
        self.index += 1;
        log::debug!("redo: history index now {}", self.index);
        Ok(caret)
    }
}
