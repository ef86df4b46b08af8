//! Structured Document Editor WASM API
//!
//! This module provides the JavaScript-facing API for the editing core.
//! It includes shared utilities for serialization, validation, and error
//! handling, as well as the API functions themselves.
//!
//! # Module Structure
//!
//! - `helpers`: Shared utilities for serialization, error handling, and logging
//! - `core`: Document lifecycle, edit, undo, query and save endpoints

pub mod helpers;
pub mod core;

// Re-export all public functions to keep a flat public API
pub use core::*;
