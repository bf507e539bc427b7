//! User-defined todo tags, stored in `todos/tags.json`.
//!
//! Writes share the `todos/` lock with [`TodoStore`](super::TodoStore).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::document::{load_for_update, load_or_default, write_json};
use super::error::StoreError;
use super::file_store::FileStore;
use super::locks::DocumentLocks;
use super::types::TagList;
use crate::paths::DataRoot;

#[derive(Debug, Clone)]
pub struct TagStore {
    files: FileStore,
    root: DataRoot,
    locks: Arc<DocumentLocks>,
}

impl TagStore {
    pub fn new(files: FileStore, root: DataRoot, locks: Arc<DocumentLocks>) -> Self {
        Self { files, root, locks }
    }

    /// All tags in insertion order: trimmed, non-empty and unique.
    pub fn list(&self) -> Vec<String> {
        let path = tags_path(&self.root.todos_dir());
        normalize(load_or_default::<TagList>(&self.files, &path).tags)
    }

    /// Add a tag. Returns `false` if it was blank or already present.
    pub fn add(&self, tag: &str) -> Result<bool, StoreError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Ok(false);
        }

        self.locks.with_dir(|| self.root.todos_dir(), |dir| {
            let path = tags_path(dir);
            let mut tags = normalize(load_for_update::<TagList>(&self.files, &path)?.tags);
            if tags.iter().any(|t| t == tag) {
                return Ok(false);
            }

            tags.push(tag.to_string());
            write_json(&self.files, &path, &TagList { tags })?;
            Ok(true)
        })
    }

    /// Remove a tag. Returns `false` if it wasn't there.
    pub fn delete(&self, tag: &str) -> Result<bool, StoreError> {
        self.locks.with_dir(|| self.root.todos_dir(), |dir| {
            let path = tags_path(dir);
            let mut tags = normalize(load_for_update::<TagList>(&self.files, &path)?.tags);
            let before = tags.len();
            tags.retain(|t| t != tag);
            if tags.len() == before {
                return Ok(false);
            }

            write_json(&self.files, &path, &TagList { tags })?;
            Ok(true)
        })
    }
}

fn tags_path(todos_dir: &Path) -> PathBuf {
    todos_dir.join("tags.json")
}

fn normalize(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn make_store(dir: &TempDir) -> TagStore {
        TagStore::new(
            FileStore::new(),
            DataRoot::new(dir.path()),
            Arc::new(DocumentLocks::new()),
        )
    }

    #[test]
    fn add_trims_and_dedupes() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir);

        assert!(store.add("  work ").unwrap());
        assert!(!store.add("work").unwrap());
        assert!(!store.add("   ").unwrap());
        assert!(store.add("home").unwrap());

        assert_eq!(store.list(), vec!["work", "home"]);
        assert!(dir.path().join("todos/tags.json").exists());
    }

    #[test]
    fn delete_removes_tag() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir);
        store.add("a").unwrap();
        store.add("b").unwrap();

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.list(), vec!["b"]);
    }

    #[test]
    fn list_cleans_hand_edited_file() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir);
        fs::create_dir_all(dir.path().join("todos")).unwrap();
        fs::write(
            dir.path().join("todos/tags.json"),
            r#"{"tags": ["x", " x ", "", "y"], "extra": true}"#,
        )
        .unwrap();

        assert_eq!(store.list(), vec!["x", "y"]);
    }

    #[test]
    fn corrupt_file_lists_empty() {
        let dir = tempdir().unwrap();
        let store = make_store(&dir);
        fs::create_dir_all(dir.path().join("todos")).unwrap();
        fs::write(dir.path().join("todos/tags.json"), "not json").unwrap();

        assert!(store.list().is_empty());
        assert!(store.add("fresh").unwrap());
        assert_eq!(store.list(), vec!["fresh"]);
    }
}
