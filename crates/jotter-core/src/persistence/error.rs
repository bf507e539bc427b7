//! Error types for the persistence layer.
//!
//! Write paths return [`StoreError`]. Read paths produce [`DecodeError`]
//! internally; the public store API turns those into empty/default values
//! at the boundary and logs a warning, so a damaged file never blocks a read.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error returned by store operations that write to disk.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Home directory not set")]
    HomeDirUnavailable,
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Error produced while reading a document back from disk.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
