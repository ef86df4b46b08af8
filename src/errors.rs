//! Error types for the dual-tree editing core
//!
//! Defines the error hierarchy for editing failures, split between
//! recoverable location/mutation errors and fatal errors that leave the
//! editor in a potentially inconsistent state.

use thiserror::Error;

/// Top-level editing error type
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EditorError {
    /// Location or path resolution failure (recoverable by the caller)
    #[error(transparent)]
    Location(#[from] LocationError),

    /// A structural edit was rejected before any mutation took place
    #[error(transparent)]
    Mutation(#[from] MutationError),

    /// Internal-consistency failure; the editor must be flagged inconsistent
    #[error(transparent)]
    Fatal(#[from] FatalError),
}

/// Errors raised while building locations or translating paths
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LocationError {
    /// The node is not under the given root, or the root is not marked
    #[error("invalid location: {0}")]
    InvalidLocation(String),

    /// The node has no walk up to a marked root
    #[error("node is detached from any marked root")]
    DetachedNode,

    /// The node lies inside a transient placeholder and is not addressable
    #[error("placeholder nodes have no path")]
    PlaceholderNode,

    /// The path string does not match the path grammar
    #[error("malformed path expression: {0}")]
    MalformedPath(String),

    /// An `@name` segment named an attribute the element does not carry
    #[error("attribute not found: @{0}")]
    AttributeNotFound(String),
}

/// Structural preconditions checked by the mutator before touching the tree
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MutationError {
    /// The operand node does not live under the mutator's root
    #[error("node is not under the tree root")]
    NotUnderRoot,

    /// Deletion was requested for a node with no parent
    #[error("cannot delete a node that has no parent")]
    NoParent,

    /// A text-only operation was invoked on a non-text node
    #[error("operation requires a text node")]
    NotAText,

    /// An element-only operation was invoked on a non-element node
    #[error("operation requires an element node")]
    NotAnElement,

    /// Insertion was requested for a node that is still attached
    #[error("node to insert is already attached")]
    AlreadyAttached,

    /// A child index or text offset was out of bounds
    #[error("index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// `remove_nodes` was called with nodes that are not contiguous siblings
    #[error("nodes are not immediately contiguous in document order")]
    NotContiguous,

    /// A split that would produce two adjacent text siblings at the top
    #[error("split would result in two adjacent text nodes")]
    BadSplit,
}

/// Unrecoverable internal failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FatalError {
    /// Path translation between the trees yielded no presentation node
    #[error("cannot locate presentation counterpart: {0}")]
    CannotLocate(String),

    /// `undo()` or `redo()` was called while one was already in progress
    #[error("calling undo or redo while undoing or redoing")]
    ConcurrentUndoRedo,

    /// `resume()` was called more times than `suspend()`
    #[error("refresh resumed more times than suspended")]
    ImbalancedSuspendResume,

    /// Invariant violation that indicates a bug in the core
    #[error("internal error: {0}")]
    Internal(String),
}
