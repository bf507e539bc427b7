//! Data-root bootstrap, validation, statistics and migration.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::document::load_or_default;
use super::error::StoreError;
use super::file_store::FileStore;
use super::types::TodoList;
use crate::paths::{ARCHIVE_DIR, CONFIG_DIR, JOURNALS_DIR, NOTES_DIR, TODOS_DIR};

/// Probe file written by [`DataDirectoryManager::validate`].
const PROBE_FILE: &str = ".jotter_test";

/// Subtrees copied by [`DataDirectoryManager::migrate`].
const DATA_DIRS: [&str; 3] = [JOURNALS_DIR, NOTES_DIR, TODOS_DIR];

/// Entity counts for a data root.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStats {
    pub journal_count: usize,
    pub note_count: usize,
    pub todo_count: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DataDirectoryManager {
    files: FileStore,
}

impl DataDirectoryManager {
    pub fn new(files: FileStore) -> Self {
        Self { files }
    }

    /// Create the directory skeleton under `root`. Safe to call repeatedly.
    pub fn initialize(&self, root: &Path) -> Result<(), StoreError> {
        for dir in [
            root.join(CONFIG_DIR),
            root.join(JOURNALS_DIR),
            root.join(NOTES_DIR),
            root.join(TODOS_DIR),
            root.join(TODOS_DIR).join(ARCHIVE_DIR),
        ] {
            self.files.create_dirs(&dir)?;
        }
        Ok(())
    }

    /// True if `path` is an existing directory we can write to.
    pub fn validate(&self, path: &Path) -> bool {
        if !self.files.is_dir(path) {
            return false;
        }

        let probe = path.join(PROBE_FILE);
        let writable = self
            .files
            .write_text(&probe, "test")
            .and_then(|()| self.files.delete(&probe));

        match writable {
            Ok(_) => true,
            Err(e) => {
                log::debug!("{} is not writable: {e}", path.display());
                false
            }
        }
    }

    /// Copy all user data from `old` to `new`.
    ///
    /// `old` is never modified. On failure `false` is returned and whatever
    /// was already copied stays in `new`. A `new` whose data directories
    /// would overlap those of `old` (one root nested in the other's
    /// `notes/`, say) is refused before anything is written.
    pub fn migrate(&self, old: &Path, new: &Path) -> bool {
        let (old_real, new_real) = (resolve(old), resolve(new));
        if old_real == new_real {
            return true;
        }

        if let Some((source, target)) = overlapping_data_dirs(&old_real, &new_real) {
            log::error!(
                "Refusing to migrate data from {} to {}: {} and {} overlap",
                old.display(),
                new.display(),
                source.display(),
                target.display()
            );
            return false;
        }

        match self.copy_tree(old, new) {
            Ok(()) => {
                log::info!("Migrated data from {} to {}", old.display(), new.display());
                true
            }
            Err(e) => {
                log::error!(
                    "Failed to migrate data from {} to {}: {e}",
                    old.display(),
                    new.display()
                );
                false
            }
        }
    }

    fn copy_tree(&self, old: &Path, new: &Path) -> Result<(), StoreError> {
        self.initialize(new)?;
        for dir in DATA_DIRS {
            let source = old.join(dir);
            if self.files.exists(&source) {
                self.files.copy_dir(&source, &new.join(dir))?;
            }
        }
        Ok(())
    }

    /// Count journals, notes and todos under `root`.
    ///
    /// Listing errors count as zero.
    pub fn data_stats(&self, root: &Path) -> DataStats {
        DataStats {
            journal_count: self.count_journals(&root.join(JOURNALS_DIR)),
            note_count: self.count_markdown(&root.join(NOTES_DIR)),
            todo_count: self.count_todos(&root.join(TODOS_DIR)),
        }
    }

    fn list_or_empty(&self, dir: &Path) -> Vec<PathBuf> {
        self.files.list(dir).unwrap_or_else(|e| {
            log::warn!("Failed to list {}: {e}", dir.display());
            Vec::new()
        })
    }

    fn count_markdown(&self, dir: &Path) -> usize {
        self.list_or_empty(dir)
            .iter()
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("md"))
            .count()
    }

    fn count_journals(&self, journals_dir: &Path) -> usize {
        self.list_or_empty(journals_dir)
            .iter()
            .filter(|year| self.files.is_dir(year))
            .flat_map(|year| self.list_or_empty(year))
            .filter(|month| self.files.is_dir(month))
            .map(|month| self.count_markdown(&month))
            .sum()
    }

    fn count_todos(&self, todos_dir: &Path) -> usize {
        let active = load_or_default::<TodoList>(&self.files, &todos_dir.join("active.json"));
        let archived: usize = self
            .list_or_empty(&todos_dir.join(ARCHIVE_DIR))
            .iter()
            .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("json"))
            .map(|path| load_or_default::<TodoList>(&self.files, path).todos.len())
            .sum();

        active.todos.len() + archived
    }
}

/// `path` with its longest existing prefix canonicalized, so roots that
/// don't exist yet still compare correctly against ones that do.
fn resolve(path: &Path) -> PathBuf {
    let mut existing = path;
    let mut missing = Vec::new();

    loop {
        let probe = if existing.as_os_str().is_empty() {
            Path::new(".")
        } else {
            existing
        };
        if let Ok(real) = probe.canonicalize() {
            return missing.iter().rev().fold(real, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name);
                existing = parent;
            }
            _ => return path.to_path_buf(),
        }
    }
}

/// First pair of source and target data directories where one contains the other.
fn overlapping_data_dirs(old: &Path, new: &Path) -> Option<(PathBuf, PathBuf)> {
    DATA_DIRS.iter().find_map(|source| {
        let source = old.join(source);
        DATA_DIRS
            .iter()
            .map(|target| new.join(target))
            .find(|target| target.starts_with(&source) || source.starts_with(target))
            .map(|target| (source, target))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn manager() -> DataDirectoryManager {
        DataDirectoryManager::new(FileStore::new())
    }

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    /// Relative path -> bytes for every file under `root`.
    fn snapshot(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    let relative = path.strip_prefix(root).unwrap().to_path_buf();
                    out.push((relative, fs::read(&path).unwrap()));
                }
            }
        }

        let mut out = Vec::new();
        walk(root, root, &mut out);
        out.sort();
        out
    }

    #[test]
    fn initialize_creates_skeleton_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data");

        manager().initialize(&root).unwrap();
        write(&root, "todos/active.json", "{}");
        manager().initialize(&root).unwrap();

        for sub in ["config", "journals", "notes", "todos", "todos/archive"] {
            assert!(root.join(sub).is_dir(), "{sub} missing");
        }
        assert_eq!(fs::read_to_string(root.join("todos/active.json")).unwrap(), "{}");
    }

    #[test]
    fn validate_checks_existence_and_cleans_probe() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();

        assert!(manager().validate(dir.path()));
        assert!(!dir.path().join(PROBE_FILE).exists());
        assert!(!manager().validate(&dir.path().join("missing")));
        assert!(!manager().validate(&file));
    }

    #[test]
    fn validate_fails_when_probe_cannot_be_written() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join(".jotter_test.tmp")).unwrap();

        assert!(!manager().validate(dir.path()));
    }

    #[test]
    fn migrate_copies_byte_identical_content() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old");
        let new = dir.path().join("new");
        manager().initialize(&old).unwrap();
        write(&old, "journals/2025/12/2025-12-21.md", "---\ndate: 2025-12-21\n---\n\n# Hi\n\nbody");
        write(&old, "notes/n1.md", "note body \u{1F600}");
        write(&old, "notes/.metadata.json", r#"{"notes": []}"#);
        write(&old, "todos/active.json", r#"{"todos": []}"#);
        write(&old, "todos/archive/2024.json", r#"{"todos": []}"#);
        let before = snapshot(&old);

        assert!(manager().migrate(&old, &new));

        assert_eq!(snapshot(&new), before);
        assert_eq!(snapshot(&old), before);
        assert!(new.join("config").is_dir());
    }

    #[test]
    fn migrate_to_same_root_is_noop() {
        let dir = tempdir().unwrap();
        assert!(manager().migrate(dir.path(), dir.path()));
    }

    #[test]
    fn migrate_into_own_data_dir_is_refused_untouched() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old");
        manager().initialize(&old).unwrap();
        write(&old, "notes/n1.md", "content");
        write(&old, "journals/2025/01/2025-01-01.md", "# Day");
        let before = snapshot(&old);

        assert!(!manager().migrate(&old, &old.join("notes").join("backup")));
        assert!(!manager().migrate(&old, &old.join("journals").join("2025")));

        assert_eq!(snapshot(&old), before);
        assert!(!old.join("notes/backup").exists());
    }

    #[test]
    fn migrate_to_parent_of_data_dir_is_refused() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("notes");
        write(&old, "todos/active.json", r#"{"todos": []}"#);
        let before = snapshot(&old);

        assert!(!manager().migrate(&old, dir.path()));
        assert_eq!(snapshot(&old), before);
    }

    #[test]
    fn migrate_to_subdirectory_outside_data_dirs_works() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old");
        write(&old, "notes/n1.md", "content");
        let new = old.join("moved");

        assert!(manager().migrate(&old, &new));

        assert_eq!(fs::read_to_string(new.join("notes/n1.md")).unwrap(), "content");
        assert_eq!(fs::read_to_string(old.join("notes/n1.md")).unwrap(), "content");
        assert!(!old.join("notes/moved").exists());
    }

    #[test]
    fn resolve_handles_missing_tail() {
        let dir = tempdir().unwrap();
        let real = dir.path().canonicalize().unwrap();

        assert_eq!(resolve(&dir.path().join("a").join("b")), real.join("a").join("b"));
    }

    #[test]
    fn migrate_failure_returns_false_and_keeps_old() {
        let dir = tempdir().unwrap();
        let old = dir.path().join("old");
        write(&old, "notes/n1.md", "content");
        // A plain file where the new root should be makes initialization fail.
        let new = dir.path().join("blocked");
        fs::write(&new, "not a directory").unwrap();

        assert!(!manager().migrate(&old, &new));
        assert_eq!(fs::read_to_string(old.join("notes/n1.md")).unwrap(), "content");
    }

    #[test]
    fn data_stats_counts_each_kind() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(root, "journals/2025/01/2025-01-01.md", "");
        write(root, "journals/2025/02/2025-02-03.md", "");
        write(root, "journals/2024/12/2024-12-31.md", "");
        write(root, "journals/2024/12/notes.txt", "");
        write(root, "notes/a.md", "");
        write(root, "notes/b.md", "");
        write(root, "notes/.metadata.json", "{}");
        write(root, "todos/active.json", r#"{"todos": [{"id": "1"}, {"id": "2"}]}"#);
        write(root, "todos/archive/2024.json", r#"{"todos": [{"id": "3"}]}"#);

        assert_eq!(
            manager().data_stats(root),
            DataStats {
                journal_count: 3,
                note_count: 2,
                todo_count: 3,
            }
        );
    }

    #[test]
    fn data_stats_on_empty_root_is_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(manager().data_stats(dir.path()), DataStats::default());
    }
}
