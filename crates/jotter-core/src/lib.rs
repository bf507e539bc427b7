//! # jotter-core
//!
//! Local document persistence for Jotter, the journal / todo / notes app.
//!
//! This crate is framework-agnostic: the UI layer owns threads and rendering
//! and calls into the stores here with plain blocking calls.
//!
//! ## Key Concepts
//!
//! - **Data root**: The user-chosen directory holding journals, notes and todos
//! - **Config dir**: App-private directory with settings and the data-root pointer
//! - **Store**: One type per document family, all sharing a file layer and lock registry
//! - **JotterContext**: Builds and owns every store for a process

pub mod context;
pub mod paths;
pub mod persistence;
pub mod time;

// Re-export commonly used types
pub use context::{JotterContext, JotterContextBuilder, StorageInfo};
pub use paths::DataRoot;
pub use persistence::{
    JournalStore, Note, NoteStore, SettingsStore, StoreError, TagStore, Todo, TodoStore,
};
