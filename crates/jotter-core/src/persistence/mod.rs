//! Persistence layer for todos, journals, notes, tags and settings.
//!
//! # Overview
//!
//! Every piece of user data is a plain file under the data root:
//!
//! - **Todos** - Active list plus per-year archives ([`TodoStore`])
//! - **Journals** - One markdown file per day ([`JournalStore`])
//! - **Notes** - Markdown content plus a JSON index ([`NoteStore`])
//! - **Tags** - User-defined todo tags ([`TagStore`])
//! - **Settings** - Preferences and app state in the config dir ([`SettingsStore`])
//!
//! See [`types`] for the on-disk layout.
//!
//! # Design Principles
//!
//! ## Atomic Writes
//!
//! All save operations use write-then-rename to prevent corruption:
//!
//! 1. Write to `file.json.tmp`
//! 2. Rename to `file.json` (atomic on Unix)
//!
//! ## Load, Mutate, Store
//!
//! Stores keep no documents in memory. Each operation reads the file, changes
//! it and writes it back whole while holding the document's lock from
//! [`DocumentLocks`].
//!
//! ## Reads Never Fail
//!
//! A missing or unreadable document reads as empty (or default) and logs a
//! warning. Writes that would replace an unreadable document move it aside to
//! `<file>.corrupt-<epoch-ms>` first.
//!
//! # Usage
//!
//! ```ignore
//! use jotter_core::persistence::{FileStore, DocumentLocks, TodoStore};
//! use jotter_core::paths::DataRoot;
//!
//! let todos = TodoStore::new(FileStore::new(), DataRoot::new("/data"), Default::default());
//! todos.save(Todo::new("Buy milk"))?;
//! ```

pub mod data_dir;
mod document;
pub mod error;
pub mod file_store;
pub mod journal;
pub mod locks;
pub mod notes;
pub mod settings;
pub mod tags;
pub mod todos;
pub mod types;

// Re-export commonly used items for convenience
pub use data_dir::{DataDirectoryManager, DataStats};
pub use error::{DecodeError, StoreError};
pub use file_store::FileStore;
pub use journal::JournalStore;
pub use locks::DocumentLocks;
pub use notes::{NoteStore, ReconcileReport};
pub use settings::SettingsStore;
pub use tags::TagStore;
pub use todos::{TodoStore, DEFAULT_RETENTION_DAYS};
pub use types::{
    AppSettings, AppState, Journal, JournalMetadata, Note, NoteMetadata, Priority, Theme, Todo,
};
