//! JotterContext - the shared entry point to every store.
//!
//! The host app builds one context at startup and hands clones to whatever
//! needs persistence. All stores inside share one [`FileStore`], one
//! [`DocumentLocks`] registry and one [`DataRoot`].
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │      JotterContext      │
//!                    ├─────────────────────────┤
//!                    │  - SettingsStore        │──▶ <config dir>/
//!                    │  - DataRoot (shared)    │
//!                    │  - DocumentLocks        │
//!                    └───────────┬─────────────┘
//!                                │
//!        ┌──────────────┬────────┴─────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!   ┌─────────┐   ┌──────────┐   ┌─────────┐   ┌─────────┐
//!   │  Todos  │   │ Journals │   │  Notes  │   │  Tags   │
//!   └─────────┘   └──────────┘   └─────────┘   └─────────┘
//! ```
//!
//! Relocating the data root flips the shared [`DataRoot`], so every store
//! follows without being rebuilt. The copy and the flip happen while holding
//! the old root's `todos/`, `notes/` and `journals/` locks; writers queued on
//! those locks notice the flip and retry against the new root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;

use crate::paths::{self, DataRoot, JOURNALS_DIR, NOTES_DIR, TODOS_DIR};
use crate::persistence::{
    DataDirectoryManager, DataStats, DocumentLocks, FileStore, JournalStore, NoteStore,
    SettingsStore, StoreError, TagStore, TodoStore, DEFAULT_RETENTION_DAYS,
};

/// Where the data lives and what it holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageInfo {
    pub data_path: String,
    #[serde(flatten)]
    pub stats: DataStats,
}

/// Configuration for building a JotterContext.
#[derive(Debug, Default)]
pub struct JotterContextBuilder {
    config_dir: Option<PathBuf>,
    data_root: Option<PathBuf>,
    default_data_dir: Option<PathBuf>,
    files: Option<FileStore>,
    locks: Option<Arc<DocumentLocks>>,
}

impl JotterContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory holding `settings.json` and `app_state.json`.
    ///
    /// Defaults to `<app home>/config`.
    pub fn config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Force the data root, ignoring what app state says.
    pub fn data_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_root = Some(dir.into());
        self
    }

    /// Data root to use when nothing is configured. Defaults to `<app home>/data`.
    pub fn default_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.default_data_dir = Some(dir.into());
        self
    }

    pub fn file_store(mut self, files: FileStore) -> Self {
        self.files = Some(files);
        self
    }

    /// Share a lock registry with another context over the same data.
    pub fn locks(mut self, locks: Arc<DocumentLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Build the context.
    ///
    /// Fails only if a directory was left unset and no home directory can be
    /// found to derive it from.
    pub fn build(self) -> Result<JotterContext, StoreError> {
        let config_dir = match self.config_dir {
            Some(dir) => dir,
            None => paths::default_config_dir()?,
        };
        let default_data_dir = match self.default_data_dir {
            Some(dir) => dir,
            None => paths::default_data_dir()?,
        };
        let files = self.files.unwrap_or_default();
        let locks = self.locks.unwrap_or_default();

        let settings = SettingsStore::new(files, config_dir, default_data_dir, Arc::clone(&locks));
        let root = DataRoot::new(self.data_root.unwrap_or_else(|| settings.data_path()));
        log::debug!("Using data root {}", root.path().display());

        Ok(JotterContext {
            todos: TodoStore::new(files, root.clone(), Arc::clone(&locks)),
            journals: JournalStore::new(files, root.clone(), Arc::clone(&locks)),
            notes: NoteStore::new(files, root.clone(), Arc::clone(&locks)),
            tags: TagStore::new(files, root.clone(), Arc::clone(&locks)),
            settings,
            data_dirs: DataDirectoryManager::new(files),
            root,
            locks,
        })
    }
}

/// Central shared state for all Jotter persistence.
///
/// All fields use `Arc` for cheap cloning - cloning the context just
/// clones the pointers, not the underlying data.
#[derive(Debug, Clone)]
pub struct JotterContext {
    pub todos: TodoStore,
    pub journals: JournalStore,
    pub notes: NoteStore,
    pub tags: TagStore,
    pub settings: SettingsStore,
    pub data_dirs: DataDirectoryManager,
    root: DataRoot,
    locks: Arc<DocumentLocks>,
}

impl JotterContext {
    pub fn builder() -> JotterContextBuilder {
        JotterContextBuilder::new()
    }

    /// Current data root.
    pub fn data_root(&self) -> PathBuf {
        self.root.path()
    }

    pub fn locks(&self) -> &Arc<DocumentLocks> {
        &self.locks
    }

    /// Startup housekeeping: create the directory skeleton, archive todos
    /// completed over a week ago and repair the note index.
    pub fn initialize(&self) -> Result<(), StoreError> {
        let root = self.root.path();
        self.data_dirs.initialize(&root)?;

        let archived = self.todos.archive_completed(DEFAULT_RETENTION_DAYS)?;
        let report = self.notes.reconcile()?;

        log::info!(
            "Initialized data root {} (archived {archived} todos, note index {})",
            root.display(),
            if report.is_clean() { "clean" } else { "repaired" }
        );
        Ok(())
    }

    pub fn is_first_launch(&self) -> bool {
        self.settings.is_first_launch()
    }

    /// True if the data root is usable, or doesn't exist yet and can be created.
    pub fn is_data_path_valid(&self) -> bool {
        let root = self.root.path();
        !root.exists() || self.data_dirs.validate(&root)
    }

    /// Finish onboarding with `path` as the data root.
    pub fn complete_setup(&self, path: &Path) -> Result<(), StoreError> {
        self.with_data_locked(|_| -> Result<(), StoreError> {
            self.data_dirs.initialize(path)?;
            self.settings.update_data_path(path)?;
            self.root.set(path);
            Ok(())
        })?;

        log::info!("Setup complete, data root is {}", path.display());
        Ok(())
    }

    /// Switch to a new data root, optionally copying the current data over.
    ///
    /// Returns `Ok(false)` if the copy failed; nothing is switched then.
    pub fn relocate_data_root(&self, new_root: &Path, migrate: bool) -> Result<bool, StoreError> {
        self.with_data_locked(|old_root| -> Result<bool, StoreError> {
            if migrate {
                if !self.data_dirs.migrate(old_root, new_root) {
                    return Ok(false);
                }
            } else {
                self.data_dirs.initialize(new_root)?;
            }

            self.settings.update_data_path(new_root)?;
            self.root.set(new_root);

            log::info!(
                "Data root moved from {} to {}",
                old_root.display(),
                new_root.display()
            );
            Ok(true)
        })
    }

    /// Run `f` with the current root and every store lock under it held.
    ///
    /// The root's own path is locked first so two relocations can't
    /// interleave. Stores only ever take one lock each, so the nesting
    /// order here can't deadlock against them.
    fn with_data_locked<T>(&self, f: impl FnOnce(&Path) -> T) -> T {
        self.locks.with_dir(
            || self.root.path(),
            |root| {
                self.locks.with(&root.join(TODOS_DIR), || {
                    self.locks.with(&root.join(NOTES_DIR), || {
                        self.locks.with(&root.join(JOURNALS_DIR), || f(root))
                    })
                })
            },
        )
    }

    pub fn storage_info(&self) -> StorageInfo {
        let root = self.root.path();
        StorageInfo {
            data_path: root.to_string_lossy().into_owned(),
            stats: self.data_dirs.data_stats(&root),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::{AppState, Note, Todo};
    use crate::time::{self, MILLIS_PER_DAY};
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn build(dir: &TempDir) -> JotterContext {
        JotterContext::builder()
            .config_dir(dir.path().join("config"))
            .default_data_dir(dir.path().join("default"))
            .build()
            .unwrap()
    }

    #[test]
    fn builder_uses_default_data_dir_without_state() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);

        assert_eq!(ctx.data_root(), dir.path().join("default"));
        assert!(ctx.is_first_launch());
    }

    #[test]
    fn builder_reads_data_root_from_app_state() {
        let dir = tempdir().unwrap();
        let configured = dir.path().join("configured");
        build(&dir)
            .settings
            .save_app_state(&AppState::new(configured.to_string_lossy()))
            .unwrap();

        assert_eq!(build(&dir).data_root(), configured);
    }

    #[test]
    fn explicit_data_root_wins() {
        let dir = tempdir().unwrap();
        build(&dir)
            .settings
            .update_data_path(&dir.path().join("configured"))
            .unwrap();

        let ctx = JotterContext::builder()
            .config_dir(dir.path().join("config"))
            .default_data_dir(dir.path().join("default"))
            .data_root(dir.path().join("override"))
            .build()
            .unwrap();

        assert_eq!(ctx.data_root(), dir.path().join("override"));
    }

    #[test]
    fn builder_shares_provided_locks() {
        let dir = tempdir().unwrap();
        let locks = Arc::new(DocumentLocks::new());
        let ctx = JotterContext::builder()
            .config_dir(dir.path().join("config"))
            .default_data_dir(dir.path().join("default"))
            .locks(Arc::clone(&locks))
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(ctx.locks(), &locks));
        assert!(Arc::ptr_eq(ctx.clone().locks(), &locks));
    }

    #[test]
    fn complete_setup_initializes_and_persists() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        let chosen = dir.path().join("chosen");

        ctx.complete_setup(&chosen).unwrap();

        assert!(!ctx.is_first_launch());
        assert_eq!(ctx.data_root(), chosen);
        assert!(chosen.join("todos/archive").is_dir());
        assert_eq!(build(&dir).data_root(), chosen);
    }

    #[test]
    fn initialize_archives_and_reconciles() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        let mut old = Todo::new("old");
        old.mark_completed(time::now_millis() - 30 * MILLIS_PER_DAY);
        ctx.todos.save(old.clone()).unwrap();
        fs::create_dir_all(ctx.data_root().join("notes")).unwrap();
        fs::write(ctx.data_root().join("notes/orphan.md"), "# Orphan").unwrap();

        ctx.initialize().unwrap();

        assert!(ctx.todos.list_active().is_empty());
        assert_eq!(ctx.todos.all_archived()[0].id, old.id);
        assert_eq!(ctx.notes.get("orphan").unwrap().title, "Orphan");
        assert!(ctx.data_root().join("config").is_dir());
    }

    #[test]
    fn data_path_validity() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        // Not created yet, but creatable.
        assert!(ctx.is_data_path_valid());

        fs::write(dir.path().join("default"), "file in the way").unwrap();
        assert!(!ctx.is_data_path_valid());
    }

    #[test]
    fn relocate_with_migration_moves_every_store() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        ctx.initialize().unwrap();
        let todo = Todo::new("carry me");
        ctx.todos.save(todo.clone()).unwrap();
        ctx.tags.add("work").unwrap();
        let note = ctx.notes.create("Idea", "body", Vec::new()).unwrap();
        let handle = ctx.clone();

        let new_root = dir.path().join("moved");
        assert!(ctx.relocate_data_root(&new_root, true).unwrap());

        assert_eq!(handle.data_root(), new_root);
        assert!(new_root.join("todos/active.json").exists());
        assert_eq!(handle.todos.list_active()[0].id, todo.id);
        assert_eq!(handle.tags.list(), vec!["work"]);
        assert_eq!(handle.notes.get(&note.id).unwrap().content, "body");
        assert_eq!(ctx.settings.data_path(), new_root);
    }

    #[test]
    fn relocate_keeps_writes_made_while_copying() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        ctx.initialize().unwrap();
        let writer_ctx = ctx.clone();

        let writer = std::thread::spawn(move || {
            let mut ids = Vec::new();
            for i in 0..50 {
                let todo = Todo::new(format!("todo {i}"));
                ids.push(todo.id.clone());
                writer_ctx.todos.save(todo).unwrap();
                writer_ctx.notes.create(&format!("note {i}"), "", Vec::new()).unwrap();
            }
            ids
        });

        let new_root = dir.path().join("moved");
        assert!(ctx.relocate_data_root(&new_root, true).unwrap());
        let mut saved = writer.join().unwrap();

        let mut active: Vec<_> = ctx.todos.list_active().into_iter().map(|t| t.id).collect();
        active.sort();
        saved.sort();
        assert_eq!(active, saved);
        assert_eq!(ctx.notes.all_notes().len(), 50);
        assert!(new_root.join("todos/active.json").exists());
    }

    #[test]
    fn relocate_without_migration_starts_empty() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        ctx.todos.save(Todo::new("stays behind")).unwrap();

        let new_root = dir.path().join("fresh");
        assert!(ctx.relocate_data_root(&new_root, false).unwrap());

        assert!(ctx.todos.list_active().is_empty());
        assert!(new_root.join("notes").is_dir());
        assert!(dir.path().join("default/todos/active.json").exists());
    }

    #[test]
    fn failed_migration_keeps_old_root() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        ctx.todos.save(Todo::new("x")).unwrap();
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, "not a directory").unwrap();

        assert!(!ctx.relocate_data_root(&blocked, true).unwrap());

        assert_eq!(ctx.data_root(), dir.path().join("default"));
        assert_eq!(ctx.todos.list_active().len(), 1);
    }

    #[test]
    fn storage_info_reports_counts() {
        let dir = tempdir().unwrap();
        let ctx = build(&dir);
        ctx.todos.save(Todo::new("a")).unwrap();
        ctx.notes
            .save(&Note {
                id: "n1".to_string(),
                title: "t".to_string(),
                content: "c".to_string(),
                tags: Vec::new(),
                created_at: 0,
                updated_at: 0,
            })
            .unwrap();
        ctx.journals.save_today("Today", "", None, None).unwrap();

        let info = ctx.storage_info();

        assert_eq!(info.data_path, dir.path().join("default").to_string_lossy());
        assert_eq!(
            info.stats,
            DataStats {
                journal_count: 1,
                note_count: 1,
                todo_count: 1,
            }
        );
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["noteCount"], 1);
    }
}
