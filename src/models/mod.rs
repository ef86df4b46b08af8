//! Models module for the structured document editor
//!
//! This module contains the generic node wrapper and the arena trees
//! that the dual-tree synchronization core operates on.

pub mod node;
pub mod tree;

// Re-export commonly used types
pub use node::{Attribute, NodeId, NodeKind, Presence, Snapshot};
pub use tree::Tree;
