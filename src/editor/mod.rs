//! Editor coordinator
//!
//! Owns the mutator, the mirror updater, the listener and the undo
//! engine, and fans every mutation event out to them in a fixed order:
//! mirror first (so any handler observing the presentation tree sees it
//! already consistent), then the undo recorder (paths are computed
//! while both trees agree), then the listener, and finally the
//! document-event subscribers. Undo and redo replay through the same
//! fan-out minus the recorder, so a replay refreshes the mirror and
//! listeners without re-recording itself.
//!
//! A counting refresh gate lets hosts batch edits: refresh requests
//! made while suspended coalesce and fire once on the final resume.
//! Unbalanced resumes, like any fatal error, flag the editor as
//! inconsistent and structural operations are refused from then on.

use crate::errors::{EditorError, FatalError, LocationError};
use crate::listener::Listener;
use crate::location::{self, Path, PathTarget};
use crate::mirror::MirrorUpdater;
use crate::models::{NodeId, Snapshot, Tree};
use crate::mutator::{ChangeEvent, EventSink, Mutator};
use crate::undo::{CaretPath, UndoEngine, UndoRecord};

/// Coarse notifications for savers and other external observers
#[derive(Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    /// The semantic tree changed
    Changed,
    /// The host reported a successful save
    Saved,
    /// The host reported a failed save
    Failed { reason: String },
}

pub type DocumentCallback = Box<dyn FnMut(&DocumentEvent) + Send>;

/// Fan-out sink for ordinary edits: mirror, recorder, listener.
/// Replays use the same sink with `undo` absent.
struct Dispatch<'a> {
    mirror: &'a mut MirrorUpdater,
    undo: Option<&'a mut UndoEngine>,
    listener: &'a mut Listener,
    root: NodeId,
    changed: &'a mut bool,
}

impl EventSink for Dispatch<'_> {
    fn on_change(&mut self, tree: &Tree, ev: &ChangeEvent) -> Result<(), EditorError> {
        self.mirror.apply(tree, ev)?;
        if let Some(undo) = self.undo.as_deref_mut() {
            if let Some(rec) = UndoRecord::from_event(tree, self.root, ev)? {
                undo.record(rec);
            }
        }
        self.listener.dispatch(tree, ev);
        *self.changed = true;
        Ok(())
    }
}

/// The synchronization core behind one open document
pub struct Editor {
    mutator: Mutator,
    mirror: MirrorUpdater,
    listener: Listener,
    undo: UndoEngine,
    caret: Option<(NodeId, usize)>,
    suspend_count: usize,
    refresh_pending: bool,
    inconsistent: bool,
    unsaved: bool,
    subscribers: Vec<DocumentCallback>,
}

impl Editor {
    pub fn new(document: &Snapshot) -> Self {
        let mutator = Mutator::from_snapshot(document);
        let mirror = MirrorUpdater::new(mutator.tree(), mutator.root());
        let mut listener = Listener::new();
        listener.start_listening();
        Self {
            mutator,
            mirror,
            listener,
            undo: UndoEngine::new(),
            caret: None,
            suspend_count: 0,
            refresh_pending: false,
            inconsistent: false,
            unsaved: false,
            subscribers: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    pub fn tree(&self) -> &Tree {
        self.mutator.tree()
    }

    pub fn root(&self) -> NodeId {
        self.mutator.root()
    }

    pub fn mirror(&self) -> &MirrorUpdater {
        &self.mirror
    }

    pub fn mirror_mut(&mut self) -> &mut MirrorUpdater {
        &mut self.mirror
    }

    pub fn listener_mut(&mut self) -> &mut Listener {
        &mut self.listener
    }

    pub fn is_inconsistent(&self) -> bool {
        self.inconsistent
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    /// Path of a semantic node relative to the document root
    pub fn node_path(&self, node: NodeId) -> Result<Path, LocationError> {
        self.mutator.node_to_path(node)
    }

    /// Semantic node (or attribute) addressed by a path
    pub fn node_at(&self, path: &Path) -> Result<Option<PathTarget>, LocationError> {
        self.mutator.path_to_node(path)
    }

    /// Resolve a path string to an existing semantic node
    pub fn resolve(&self, path: &str) -> Result<NodeId, EditorError> {
        match location::resolve_path_str(self.tree(), self.root(), path)? {
            Some(PathTarget::Node(node)) => Ok(node),
            _ => Err(LocationError::InvalidLocation(format!("no node at {}", path)).into()),
        }
    }

    /// The same path resolved against the presentation tree. Paths
    /// skip phantom structure, so a semantic path is directly valid on
    /// the mirror.
    pub fn presentation_node_at(&self, path: &Path) -> Result<Option<PathTarget>, LocationError> {
        location::path_to_node(self.mirror.tree(), self.mirror.root(), path)
    }

    // ------------------------------------------------------------------
    // Caret
    // ------------------------------------------------------------------

    pub fn caret(&self) -> Option<(NodeId, usize)> {
        self.caret
    }

    pub fn set_caret(&mut self, node: NodeId, offset: usize) -> Result<(), EditorError> {
        // make_location validates the node and clamps nothing
        location::make_location(self.tree(), self.root(), node, offset)?;
        self.caret = Some((node, offset));
        Ok(())
    }

    pub fn clear_caret(&mut self) {
        self.caret = None;
    }

    /// Caret in path form, stable across undo replays
    pub fn caret_path(&self) -> Option<CaretPath> {
        let (node, offset) = self.caret?;
        let path = self.mutator.node_to_path(node).ok()?;
        Some((path, offset))
    }

    /// Caret translated onto the presentation tree
    pub fn presentation_caret(&self) -> Result<Option<(NodeId, usize)>, FatalError> {
        match self.caret {
            None => Ok(None),
            Some(caret) => self
                .mirror
                .from_semantic_caret(self.tree(), caret)
                .map(Some),
        }
    }

    fn restore_caret(&mut self, caret: Option<CaretPath>) {
        self.caret = caret.and_then(|(path, offset)| {
            match self.mutator.path_to_node(&path) {
                Ok(Some(PathTarget::Node(node))) => Some((node, offset)),
                _ => None,
            }
        });
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    /// Insert built snapshots under a parent. Multiple snapshots are
    /// grouped so they undo as one step.
    pub fn insert_at(
        &mut self,
        parent: NodeId,
        index: usize,
        what: &[Snapshot],
    ) -> Result<(), EditorError> {
        self.check_consistent()?;
        let grouped = what.len() > 1;
        if grouped {
            self.start_group("insert");
        }
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.insert_at(parent, index, what, &mut sink)
        };
        if grouped {
            self.end_group();
        }
        self.finish(changed, result)
    }

    /// Insert text at a caret, reusing adjacent text nodes; returns the
    /// node now holding the text, when any text was inserted
    pub fn insert_text(
        &mut self,
        node: NodeId,
        offset: usize,
        text: &str,
    ) -> Result<Option<NodeId>, EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.insert_text(node, offset, text, &mut sink)
        };
        self.finish(changed, result.map(|(_, holder)| holder))
    }

    pub fn delete_node(&mut self, node: NodeId) -> Result<(), EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.delete_node(node, &mut sink)
        };
        self.finish(changed, result)
    }

    pub fn delete_text(
        &mut self,
        node: NodeId,
        offset: usize,
        length: usize,
    ) -> Result<(), EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.delete_text(node, offset, length, &mut sink)
        };
        self.finish(changed, result)
    }

    pub fn set_text(&mut self, node: NodeId, value: &str) -> Result<(), EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.set_text(node, value, &mut sink)
        };
        self.finish(changed, result)
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        ns: Option<&str>,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.set_attribute(node, ns, name, value, &mut sink)
        };
        self.finish(changed, result)
    }

    /// Split an ancestor in two; the primitive sequence undoes as one
    /// step
    pub fn split_at(
        &mut self,
        top: NodeId,
        node: NodeId,
        offset: usize,
    ) -> Result<(NodeId, NodeId), EditorError> {
        self.check_consistent()?;
        self.start_group("split");
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.split_at(top, node, offset, &mut sink)
        };
        self.end_group();
        self.finish(changed, result)
    }

    pub fn merge_text_nodes(&mut self, node: NodeId) -> Result<(NodeId, usize), EditorError> {
        self.check_consistent()?;
        self.start_group("merge");
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.merge_text_nodes(node, &mut sink)
        };
        self.end_group();
        self.finish(changed, result)
    }

    pub fn remove_nodes(&mut self, nodes: &[NodeId]) -> Result<(), EditorError> {
        self.check_consistent()?;
        self.start_group("remove");
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.remove_nodes(nodes, &mut sink)
        };
        self.end_group();
        self.finish(changed, result.map(|_| ()))
    }

    pub fn cut(
        &mut self,
        start: (NodeId, usize),
        end: (NodeId, usize),
    ) -> Result<((NodeId, usize), Vec<Snapshot>), EditorError> {
        self.check_consistent()?;
        self.start_group("cut");
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: Some(undo),
                listener,
                root,
                changed: &mut changed,
            };
            mutator.cut(start, end, &mut sink)
        };
        self.end_group();
        self.finish(changed, result)
    }

    // ------------------------------------------------------------------
    // Undo
    // ------------------------------------------------------------------

    /// Open an undo group; the current caret is captured for restore
    pub fn start_group(&mut self, desc: &str) {
        let caret = self.caret_path();
        self.undo.start_group(desc, caret);
    }

    /// Open a group that rolls over into a fresh one after `limit`
    /// recorded changes
    pub fn start_limited_group(&mut self, desc: &str, limit: usize) {
        let caret = self.caret_path();
        self.undo.start_limited_group(desc, limit, caret);
    }

    pub fn end_group(&mut self) {
        let caret = self.caret_path();
        self.undo.end_group(caret);
    }

    pub fn end_all_groups(&mut self) {
        while self.undo.in_group() {
            self.end_group();
        }
    }

    pub fn undo(&mut self) -> Result<(), EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            // replay sink: no recorder, so replays are not re-recorded
            let mut sink = Dispatch {
                mirror,
                undo: None,
                listener,
                root,
                changed: &mut changed,
            };
            undo.undo(mutator, &mut sink)
        };
        let caret = self.finish(changed, result)?;
        if caret.is_some() {
            self.restore_caret(caret);
        }
        Ok(())
    }

    pub fn redo(&mut self) -> Result<(), EditorError> {
        self.check_consistent()?;
        let mut changed = false;
        let result = {
            let Editor {
                mutator,
                mirror,
                listener,
                undo,
                ..
            } = self;
            let root = mutator.root();
            let mut sink = Dispatch {
                mirror,
                undo: None,
                listener,
                root,
                changed: &mut changed,
            };
            undo.redo(mutator, &mut sink)
        };
        let caret = self.finish(changed, result)?;
        if caret.is_some() {
            self.restore_caret(caret);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Refresh gate and trigger pass
    // ------------------------------------------------------------------

    pub fn suspend_refresh(&mut self) {
        self.suspend_count += 1;
    }

    pub fn resume_refresh(&mut self) -> Result<(), EditorError> {
        if self.suspend_count == 0 {
            self.inconsistent = true;
            return Err(FatalError::ImbalancedSuspendResume.into());
        }
        self.suspend_count -= 1;
        if self.suspend_count == 0 && self.refresh_pending {
            self.refresh_pending = false;
            self.refresh();
        }
        Ok(())
    }

    pub fn is_refresh_suspended(&self) -> bool {
        self.suspend_count > 0
    }

    /// Run the deferred trigger pass and tell subscribers the document
    /// changed. Coalesces while refresh is suspended.
    fn request_refresh(&mut self) {
        if self.suspend_count > 0 {
            self.refresh_pending = true;
        } else {
            self.refresh();
        }
    }

    fn refresh(&mut self) {
        self.listener.run_pending_pass(self.mutator.tree());
        self.notify(&DocumentEvent::Changed);
    }

    // ------------------------------------------------------------------
    // Document-event stream
    // ------------------------------------------------------------------

    pub fn subscribe(&mut self, cb: DocumentCallback) {
        self.subscribers.push(cb);
    }

    pub fn mark_saved(&mut self) {
        self.unsaved = false;
        self.notify(&DocumentEvent::Saved);
    }

    pub fn mark_save_failed(&mut self, reason: &str) {
        self.notify(&DocumentEvent::Failed {
            reason: reason.to_string(),
        });
    }

    fn notify(&mut self, ev: &DocumentEvent) {
        for cb in &mut self.subscribers {
            cb(ev);
        }
    }

    // ------------------------------------------------------------------

    fn check_consistent(&self) -> Result<(), EditorError> {
        if self.inconsistent {
            Err(FatalError::Internal(
                "editor is inconsistent after a fatal error".to_string(),
            )
            .into())
        } else {
            Ok(())
        }
    }

    /// Common completion for every edit: flag fatal failures, mark the
    /// document dirty and refresh on success.
    fn finish<T>(&mut self, changed: bool, result: Result<T, EditorError>) -> Result<T, EditorError> {
        match result {
            Ok(value) => {
                if changed {
                    self.unsaved = true;
                    self.request_refresh();
                }
                Ok(value)
            }
            Err(err) => {
                if matches!(err, EditorError::Fatal(_)) {
                    log::error!("fatal editing error: {}", err);
                    self.inconsistent = true;
                }
                Err(err)
            }
        }
    }
}
