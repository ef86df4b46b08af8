//! Utility modules for the structured document editor
//!
//! This module contains utility functions and helpers for
//! various aspects of the editing core.

pub mod chars;
pub mod performance;

// Re-export commonly used types
pub use performance::*;
