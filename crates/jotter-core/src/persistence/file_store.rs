//! Thin file-system wrapper shared by every store.
//!
//! # Atomic Writes
//!
//! `write_text` never writes the target in place:
//!
//! 1. Write to `file.ext.tmp`
//! 2. Rename to `file.ext` (atomic on Unix)
//!
//! A crash mid-write leaves at most a stray `.tmp` file; the previous
//! version of the document stays intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::error::{DecodeError, StoreError};

/// Whole-file text I/O and directory plumbing. Holds no business logic.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStore;

impl FileStore {
    pub fn new() -> Self {
        Self
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    /// Create a directory and all missing parents.
    pub fn create_dirs(&self, path: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(path).map_err(|e| StoreError::io(path, e))
    }

    /// Read a whole file as UTF-8.
    ///
    /// Returns `Ok(None)` if the file doesn't exist.
    pub fn read_text(&self, path: &Path) -> Result<Option<String>, DecodeError> {
        match fs::read_to_string(path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(DecodeError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Replace a file's contents via write-then-rename, creating parents as needed.
    pub fn write_text(&self, path: &Path, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            self.create_dirs(parent)?;
        }

        let temp_path = temp_path_for(path);
        fs::write(&temp_path, contents).map_err(|e| StoreError::io(&temp_path, e))?;
        fs::rename(&temp_path, path).map_err(|e| StoreError::io(path, e))?;

        log::debug!("wrote {} ({} bytes)", path.display(), contents.len());
        Ok(())
    }

    /// Delete a file.
    ///
    /// Returns `Ok(false)` if there was nothing to delete.
    pub fn delete(&self, path: &Path) -> Result<bool, StoreError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    /// List the direct children of a directory, sorted by path.
    ///
    /// A missing path or a plain file yields an empty list.
    pub fn list(&self, path: &Path) -> Result<Vec<PathBuf>, StoreError> {
        if !path.is_dir() {
            return Ok(Vec::new());
        }

        let mut children = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| StoreError::io(path, e))? {
            let entry = entry.map_err(|e| StoreError::io(path, e))?;
            children.push(entry.path());
        }
        children.sort();
        Ok(children)
    }

    /// Copy a single file, creating the destination's parents.
    pub fn copy(&self, source: &Path, destination: &Path) -> Result<(), StoreError> {
        if let Some(parent) = destination.parent() {
            self.create_dirs(parent)?;
        }
        fs::copy(source, destination).map_err(|e| StoreError::io(source, e))?;
        Ok(())
    }

    /// Copy a directory tree. A plain-file source is copied as a file.
    pub fn copy_dir(&self, source: &Path, destination: &Path) -> Result<(), StoreError> {
        if !source.is_dir() {
            return self.copy(source, destination);
        }

        self.create_dirs(destination)?;
        for child in self.list(source)? {
            let Some(name) = child.file_name() else {
                continue;
            };
            let target = destination.join(name);
            if child.is_dir() {
                self.copy_dir(&child, &target)?;
            } else {
                self.copy(&child, &target)?;
            }
        }
        Ok(())
    }

    /// Move a file or directory, creating the destination's parents.
    pub fn rename(&self, source: &Path, destination: &Path) -> Result<(), StoreError> {
        if let Some(parent) = destination.parent() {
            self.create_dirs(parent)?;
        }
        fs::rename(source, destination).map_err(|e| StoreError::io(source, e))
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
