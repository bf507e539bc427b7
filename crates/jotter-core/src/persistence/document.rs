//! JSON document helpers shared by the stores.
//!
//! Reads come in two flavours:
//!
//! - [`load_or_default`] for plain reads: any decode failure is logged and
//!   replaced by the default value, so the caller sees "no data yet".
//! - [`load_for_update`] for load-mutate-store cycles: a document that fails
//!   to decode is renamed to `<file>.corrupt-<epoch-ms>` first, so the
//!   rewrite that follows can't destroy the unreadable original.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{DecodeError, StoreError};
use super::file_store::FileStore;
use crate::time;

/// Decode a JSON document. `Ok(None)` means the file doesn't exist.
pub(crate) fn read_json<T: DeserializeOwned>(
    files: &FileStore,
    path: &Path,
) -> Result<Option<T>, DecodeError> {
    let Some(contents) = files.read_text(path)? else {
        return Ok(None);
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| DecodeError::Json {
            path: path.to_path_buf(),
            source,
        })
}

/// Decode a JSON document, substituting the default on absence or failure.
pub(crate) fn load_or_default<T: DeserializeOwned + Default>(files: &FileStore, path: &Path) -> T {
    match read_json(files, path) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("Ignoring unreadable document: {e}");
            T::default()
        }
    }
}

/// Decode a JSON document that is about to be rewritten.
///
/// A corrupt document is quarantined before the default is returned. If the
/// quarantine itself fails, the error is returned so nothing gets overwritten.
pub(crate) fn load_for_update<T: DeserializeOwned + Default>(
    files: &FileStore,
    path: &Path,
) -> Result<T, StoreError> {
    match read_json(files, path) {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(T::default()),
        Err(e) => {
            let moved_to = quarantine(files, path)?;
            log::warn!(
                "Unreadable document moved aside to {} before rewrite: {e}",
                moved_to.display()
            );
            Ok(T::default())
        }
    }
}

/// Serialize `value` as pretty JSON and write it atomically.
pub(crate) fn write_json<T: Serialize>(
    files: &FileStore,
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_string_pretty(value)?;
    files.write_text(path, &json)
}

/// Rename a document to `<file>.corrupt-<epoch-ms>` and return the new path.
pub(crate) fn quarantine(files: &FileStore, path: &Path) -> Result<PathBuf, StoreError> {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".corrupt-{}", time::now_millis()));
    let target = path.with_file_name(name);

    files.rename(path, &target)?;
    Ok(target)
}
