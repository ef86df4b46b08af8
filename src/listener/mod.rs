//! Change listener and trigger scheduler
//!
//! The listener turns low-level mutation events into the structural
//! events hosts care about: elements entering or leaving the tree,
//! child lists changing, text changing. Handlers register against a
//! selector; selectors are interned so registering the same pattern
//! twice shares one entry.
//!
//! Immediate events fire synchronously, inside the mutation call
//! stack. Named triggers are coalesced instead: `trigger` only marks a
//! pass as pending, and the host drains it at a quiet point with
//! `run_pending_pass` (or forces it with `process_immediately`).
//! Handlers receive a [`TriggerQueue`] so a trigger pass can fan out
//! into further triggers without re-entering the listener.

use std::collections::{HashMap, VecDeque};

use crate::errors::EditorError;
use crate::models::{NodeId, NodeKind, Tree};
use crate::mutator::{ChangeEvent, EventSink};
use crate::utils::performance::{now_ms, PerformanceMonitor};

/// The structural event classes handlers can subscribe to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A matching element became part of the tree, directly or inside
    /// an inserted subtree
    IncludedElement,
    /// A matching element is about to leave the tree; it is still
    /// attached when the handler runs
    ExcludedElement,
    /// A matching element was itself the inserted node
    AddedElement,
    /// A matching element was itself the removed node
    RemovedElement,
    /// The child list of a matching element changed
    ChildrenChanged,
    /// A text node under a matching element changed value
    TextChanged,
}

/// Interned selector handle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SelectorId(usize);

/// What a handler is told about one structural change
#[derive(Clone, Debug, PartialEq)]
pub enum ListenerEvent {
    IncludedElement {
        node: NodeId,
        /// Root of the subtree whose insertion carried the node in
        subtree_root: NodeId,
        parent: NodeId,
    },
    ExcludedElement {
        node: NodeId,
        subtree_root: NodeId,
        parent: NodeId,
    },
    AddedElement {
        node: NodeId,
        parent: NodeId,
    },
    RemovedElement {
        node: NodeId,
        former_parent: NodeId,
    },
    ChildrenChanged {
        node: NodeId,
    },
    TextChanged {
        node: NodeId,
        old_value: String,
    },
}

/// Outlet for raising triggers from inside a handler
#[derive(Debug, Default)]
pub struct TriggerQueue {
    names: Vec<String>,
}

impl TriggerQueue {
    pub fn trigger(&mut self, name: &str) {
        self.names.push(name.to_string());
    }
}

pub type Handler = Box<dyn FnMut(&Tree, &ListenerEvent, &mut TriggerQueue) + Send>;
pub type TriggerHandler = Box<dyn FnMut(&Tree, &mut TriggerQueue) + Send>;

struct Registration {
    kind: EventKind,
    selector: SelectorId,
    handler: Handler,
}

/// Selector pattern: an element name chain, outermost ancestor first.
/// `"*"` matches any element; `"sense subsense"` matches a `subsense`
/// with a `sense` ancestor.
#[derive(Debug, PartialEq)]
struct Selector {
    source: String,
    chain: Vec<String>,
}

impl Selector {
    fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            chain: source.split_whitespace().map(str::to_string).collect(),
        }
    }

    fn matches(&self, tree: &Tree, node: NodeId) -> bool {
        let Some((last, ancestors)) = self.chain.split_last() else {
            return false;
        };
        if tree.kind(node) != NodeKind::Element {
            return false;
        }
        if last != "*" && tree.name(node) != last {
            return false;
        }
        chain_matches(tree, tree.parent(node), ancestors)
    }

    /// Match with the ancestor chain supplied separately; used for
    /// nodes already detached from their parent.
    fn matches_detached(&self, tree: &Tree, node: NodeId, former_parent: NodeId) -> bool {
        let Some((last, ancestors)) = self.chain.split_last() else {
            return false;
        };
        if last != "*" && tree.name(node) != last {
            return false;
        }
        chain_matches(tree, Some(former_parent), ancestors)
    }
}

/// True when `ancestors` (outermost first) appear in order on the chain
/// starting at `cur` and walking up. `cur` itself is a candidate.
fn chain_matches(tree: &Tree, mut cur: Option<NodeId>, ancestors: &[String]) -> bool {
    for want in ancestors.iter().rev() {
        let mut found = false;
        while let Some(anc) = cur {
            cur = tree.parent(anc);
            if want == "*" || tree.name(anc) == want {
                found = true;
                break;
            }
        }
        if !found {
            return false;
        }
    }
    true
}

/// Dispatches structural events to registered handlers
#[derive(Default)]
pub struct Listener {
    selectors: Vec<Selector>,
    registrations: Vec<Registration>,
    trigger_handlers: HashMap<String, Vec<TriggerHandler>>,
    pending_triggers: VecDeque<String>,
    pending_pass: bool,
    listening: bool,
    perf: PerformanceMonitor,
}

impl Listener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin delivering events. Events seen while stopped are dropped,
    /// not queued.
    pub fn start_listening(&mut self) {
        self.listening = true;
    }

    pub fn stop(&mut self) {
        self.listening = false;
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    /// Intern a selector pattern
    pub fn selector(&mut self, source: &str) -> SelectorId {
        if let Some(ix) = self.selectors.iter().position(|s| s.source == source) {
            return SelectorId(ix);
        }
        self.selectors.push(Selector::parse(source));
        SelectorId(self.selectors.len() - 1)
    }

    pub fn add_handler(&mut self, kind: EventKind, selector: SelectorId, handler: Handler) {
        self.registrations.push(Registration {
            kind,
            selector,
            handler,
        });
    }

    pub fn add_trigger_handler(&mut self, name: &str, handler: TriggerHandler) {
        self.trigger_handlers
            .entry(name.to_string())
            .or_default()
            .push(handler);
    }

    /// Mark a named trigger as pending; duplicates coalesce
    pub fn trigger(&mut self, name: &str) {
        if !self.pending_triggers.iter().any(|n| n == name) {
            self.pending_triggers.push_back(name.to_string());
        }
        self.pending_pass = true;
    }

    /// True when a trigger pass is waiting for the host to drain it
    pub fn has_pending_pass(&self) -> bool {
        self.pending_pass && !self.pending_triggers.is_empty()
    }

    /// Drop everything queued without running it
    pub fn cancel_pending_pass(&mut self) {
        self.pending_triggers.clear();
        self.pending_pass = false;
    }

    /// Drain pending triggers until the queue stays empty. Trigger
    /// handlers may raise further triggers; those run in the same pass.
    pub fn run_pending_pass(&mut self, tree: &Tree) {
        let started = now_ms();
        self.pending_pass = false;
        while let Some(name) = self.pending_triggers.pop_front() {
            let mut queue = TriggerQueue::default();
            if let Some(handlers) = self.trigger_handlers.get_mut(&name) {
                for handler in handlers {
                    handler(tree, &mut queue);
                }
            }
            for raised in queue.names {
                if !self.pending_triggers.iter().any(|n| n == &raised) {
                    self.pending_triggers.push_back(raised);
                }
            }
        }
        let elapsed = now_ms() - started;
        self.perf.record_measurement("trigger_pass", elapsed);
        log::debug!("trigger pass drained in {:.2}ms", elapsed);
    }

    /// Mean duration of trigger passes run so far, in milliseconds
    pub fn average_pass_ms(&self) -> Option<f64> {
        self.perf.get_average_time("trigger_pass")
    }

    /// Run the pending pass right now, whether or not one was scheduled
    pub fn process_immediately(&mut self, tree: &Tree) {
        if self.has_pending_pass() {
            self.run_pending_pass(tree);
        }
    }

    /// Translate one mutation event into listener events
    pub fn dispatch(&mut self, tree: &Tree, ev: &ChangeEvent) {
        if !self.listening {
            return;
        }
        match ev {
            ChangeEvent::NodeInserted {
                parent,
                index: _,
                node,
            } => {
                if tree.kind(*node) == NodeKind::Element {
                    self.fire(
                        tree,
                        EventKind::AddedElement,
                        *node,
                        &ListenerEvent::AddedElement {
                            node: *node,
                            parent: *parent,
                        },
                    );
                    for desc in tree.descendants(*node) {
                        if tree.kind(desc) == NodeKind::Element {
                            self.fire(
                                tree,
                                EventKind::IncludedElement,
                                desc,
                                &ListenerEvent::IncludedElement {
                                    node: desc,
                                    subtree_root: *node,
                                    parent: *parent,
                                },
                            );
                        }
                    }
                }
                self.fire(
                    tree,
                    EventKind::ChildrenChanged,
                    *parent,
                    &ListenerEvent::ChildrenChanged { node: *parent },
                );
            }
            ChangeEvent::BeforeDeleteNode {
                node,
                parent,
                index: _,
            } => {
                if tree.kind(*node) == NodeKind::Element {
                    for desc in tree.descendants(*node) {
                        if tree.kind(desc) == NodeKind::Element {
                            self.fire(
                                tree,
                                EventKind::ExcludedElement,
                                desc,
                                &ListenerEvent::ExcludedElement {
                                    node: desc,
                                    subtree_root: *node,
                                    parent: *parent,
                                },
                            );
                        }
                    }
                }
            }
            ChangeEvent::NodeDeleted {
                node,
                former_parent,
                former_index: _,
            } => {
                if tree.kind(*node) == NodeKind::Element {
                    self.fire_detached(
                        tree,
                        EventKind::RemovedElement,
                        *node,
                        *former_parent,
                        &ListenerEvent::RemovedElement {
                            node: *node,
                            former_parent: *former_parent,
                        },
                    );
                }
                self.fire(
                    tree,
                    EventKind::ChildrenChanged,
                    *former_parent,
                    &ListenerEvent::ChildrenChanged { node: *former_parent },
                );
            }
            ChangeEvent::TextValueSet {
                node, old_value, ..
            } => {
                if let Some(parent) = tree.parent(*node) {
                    self.fire(
                        tree,
                        EventKind::TextChanged,
                        parent,
                        &ListenerEvent::TextChanged {
                            node: *node,
                            old_value: old_value.clone(),
                        },
                    );
                }
            }
            // attribute changes carry no structural consequence here
            ChangeEvent::AttributeSet { .. } => {}
        }
    }

    fn fire(&mut self, tree: &Tree, kind: EventKind, subject: NodeId, ev: &ListenerEvent) {
        let mut queue = TriggerQueue::default();
        for reg in &mut self.registrations {
            if reg.kind == kind && self.selectors[reg.selector.0].matches(tree, subject) {
                (reg.handler)(tree, ev, &mut queue);
            }
        }
        for name in queue.names {
            self.trigger(&name);
        }
    }

    /// Like `fire`, but the subject is already detached: its name is
    /// matched and the ancestor chain is taken from the former parent.
    fn fire_detached(
        &mut self,
        tree: &Tree,
        kind: EventKind,
        subject: NodeId,
        former_parent: NodeId,
        ev: &ListenerEvent,
    ) {
        let mut queue = TriggerQueue::default();
        for reg in &mut self.registrations {
            if reg.kind == kind
                && self.selectors[reg.selector.0].matches_detached(tree, subject, former_parent)
            {
                (reg.handler)(tree, ev, &mut queue);
            }
        }
        for name in queue.names {
            self.trigger(&name);
        }
    }
}

impl EventSink for Listener {
    fn on_change(&mut self, tree: &Tree, ev: &ChangeEvent) -> Result<(), EditorError> {
        self.dispatch(tree, ev);
        Ok(())
    }
}
