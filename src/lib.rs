//! Structured Document Editor WASM Module
//!
//! Synchronization core for a structured-document editor: a semantic
//! tree holding the canonical document and a presentation tree mirroring
//! it for display, kept in lockstep through a single mutation gateway
//! with undo, change listeners and location translation between the two.

pub mod models;
pub mod errors;
pub mod location;
pub mod mutator;
pub mod mirror;
pub mod listener;
pub mod undo;
pub mod editor;
pub mod serializer;
pub mod utils;
pub mod api;

// Re-export commonly used types
pub use editor::{DocumentEvent, Editor};
pub use errors::{EditorError, FatalError, LocationError, MutationError};
pub use location::{Location, Path, PathTarget};
pub use models::{Attribute, NodeId, NodeKind, Presence, Snapshot, Tree};
pub use mutator::{ChangeEvent, EventSink, Mutator};

use wasm_bindgen::prelude::*;

// This is like the `main` function, but for WASM modules.
#[wasm_bindgen(start)]
pub fn main() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).expect("failed to initialize logger");

    log::info!("Structured Document Editor WASM module initialized");
}
