//! Todo persistence: one active document plus per-year archives.
//!
//! # Files
//!
//! - `todos/active.json` - Unfinished and recently completed todos
//! - `todos/archive/{year}.json` - Todos retired by [`TodoStore::archive_completed`],
//!   grouped by the local year they were completed in
//!
//! # Moves
//!
//! A todo lives in exactly one of these files. Moving it between files is a
//! two-phase write: the destination is written first, then the source. If
//! the second write fails, the first is rolled back and the error returned,
//! so the todo ends up where it started. A crash between the two writes can
//! leave it in both files; readers de-duplicate by id.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use super::document::{load_for_update, load_or_default, read_json, write_json};
use super::error::StoreError;
use super::file_store::FileStore;
use super::locks::DocumentLocks;
use super::types::{Todo, TodoList};
use crate::paths::{DataRoot, ARCHIVE_DIR};
use crate::time::{self, MILLIS_PER_DAY};

/// How long completed todos stay in the active document by default.
pub const DEFAULT_RETENTION_DAYS: u32 = 7;

/// Store for todos under `<data root>/todos`.
#[derive(Debug, Clone)]
pub struct TodoStore {
    files: FileStore,
    root: DataRoot,
    locks: Arc<DocumentLocks>,
}

impl TodoStore {
    pub fn new(files: FileStore, root: DataRoot, locks: Arc<DocumentLocks>) -> Self {
        Self { files, root, locks }
    }

    /// Run `f` holding the `todos/` lock, with the directory it covers.
    fn with_todos_dir<T>(&self, f: impl FnOnce(&Path) -> T) -> T {
        self.locks.with_dir(|| self.root.todos_dir(), f)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// All todos in the active document. Empty if the file is missing or corrupt.
    pub fn list_active(&self) -> Vec<Todo> {
        load_or_default::<TodoList>(&self.files, &active_path(&self.root.todos_dir())).todos
    }

    /// Active todos due on `date` (local calendar).
    pub fn list_by_date(&self, date: NaiveDate) -> Vec<Todo> {
        self.list_active()
            .into_iter()
            .filter(|todo| todo.due_date() == Some(date))
            .collect()
    }

    /// Todos for the "today" view.
    pub fn list_today(&self) -> Vec<Todo> {
        self.list_today_on(time::today())
    }

    /// Todos for the "today" view as of `today`.
    ///
    /// - incomplete without a due date: always shown
    /// - incomplete with a due date: shown once due (today or overdue)
    /// - completed: shown only if completed on `today`
    pub fn list_today_on(&self, today: NaiveDate) -> Vec<Todo> {
        self.list_active()
            .into_iter()
            .filter(|todo| {
                if todo.completed {
                    todo.completed_date() == Some(today)
                } else {
                    match todo.due_at {
                        None => true,
                        Some(_) => todo.due_date().is_some_and(|due| due <= today),
                    }
                }
            })
            .collect()
    }

    /// Years that have an archive document, ascending.
    pub fn archive_years(&self) -> Vec<i32> {
        self.archive_years_in(&self.root.todos_dir())
    }

    fn archive_years_in(&self, todos_dir: &Path) -> Vec<i32> {
        let entries = match self.files.list(&todos_dir.join(ARCHIVE_DIR)) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list todo archives: {e}");
                return Vec::new();
            }
        };

        let mut years: Vec<i32> = entries
            .iter()
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| path.file_stem()?.to_str()?.parse().ok())
            .collect();
        years.sort_unstable();
        years
    }

    /// Todos archived under `year`.
    pub fn archived(&self, year: i32) -> Vec<Todo> {
        load_or_default::<TodoList>(&self.files, &archive_path(&self.root.todos_dir(), year)).todos
    }

    /// Every archived todo, oldest year first.
    pub fn all_archived(&self) -> Vec<Todo> {
        self.archive_years()
            .into_iter()
            .flat_map(|year| self.archived(year))
            .collect()
    }

    /// Completed todos from the active document and all archives, most
    /// recently completed first.
    pub fn all_completed(&self) -> Vec<Todo> {
        let active_completed = self.list_active().into_iter().filter(|t| t.completed);
        let mut todos = distinct_by_id(active_completed.chain(self.all_archived()));
        todos.sort_by_key(|t| std::cmp::Reverse(t.completed_at.unwrap_or(0)));
        todos
    }

    /// Pending active todos followed by [`all_completed`](Self::all_completed).
    pub fn all_todos(&self) -> Vec<Todo> {
        let pending = self.list_active().into_iter().filter(|t| !t.completed);
        distinct_by_id(pending.chain(self.all_completed()))
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Insert or replace a todo in the active document.
    ///
    /// Replacing refreshes `updated_at`; new todos are appended as given.
    pub fn save(&self, todo: Todo) -> Result<(), StoreError> {
        self.with_todos_dir(|dir| {
            let mut todos = self.load_for_update(&active_path(dir))?;

            match todos.iter_mut().find(|t| t.id == todo.id) {
                Some(existing) => {
                    *existing = Todo {
                        updated_at: time::now_millis(),
                        ..todo
                    };
                }
                None => todos.push(todo),
            }

            self.write(&active_path(dir), &todos)
        })
    }

    /// Mark an active todo as completed. Returns `false` if no active todo has `id`.
    pub fn complete(&self, id: &str) -> Result<bool, StoreError> {
        self.with_todos_dir(|dir| {
            let mut todos = self.load_for_update(&active_path(dir))?;
            let Some(todo) = todos.iter_mut().find(|t| t.id == id) else {
                return Ok(false);
            };

            todo.mark_completed(time::now_millis());
            self.write(&active_path(dir), &todos)?;
            Ok(true)
        })
    }

    /// Mark a todo as not completed, pulling it back out of the archive if needed.
    ///
    /// Returns `false` if `id` is neither active nor archived.
    pub fn uncomplete(&self, id: &str) -> Result<bool, StoreError> {
        self.with_todos_dir(|dir| {
            let now = time::now_millis();
            let active_path = active_path(dir);
            let mut active = self.load_for_update(&active_path)?;

            if let Some(todo) = active.iter_mut().find(|t| t.id == id) {
                todo.mark_uncompleted(now);
                self.write(&active_path, &active)?;
                return Ok(true);
            }

            let Some(year) = self.archive_year_holding(dir, id) else {
                return Ok(false);
            };
            let archive_path = archive_path(dir, year);
            let mut archived = self.load_for_update(&archive_path)?;
            let Some(pos) = archived.iter().position(|t| t.id == id) else {
                return Ok(false);
            };

            let mut todo = archived.remove(pos);
            todo.mark_uncompleted(now);

            // Phase 1: stage the todo in the active document.
            let previous_active = active.clone();
            active.push(todo);
            self.write(&active_path, &active)?;

            // Phase 2: drop it from the archive, or roll phase 1 back.
            if let Err(e) = self.write(&archive_path, &archived) {
                if let Err(undo) = self.write(&active_path, &previous_active) {
                    log::warn!("Failed to roll back active todos after archive write error: {undo}");
                }
                return Err(e);
            }

            log::info!("Restored todo {id} from the {year} archive");
            Ok(true)
        })
    }

    /// Delete a todo wherever it lives. Returns `false` if nothing matched.
    ///
    /// Only the document that actually contained the todo is rewritten.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.with_todos_dir(|dir| {
            let active_path = active_path(dir);
            let mut active = self.load_for_update(&active_path)?;
            let before = active.len();
            active.retain(|t| t.id != id);
            if active.len() < before {
                self.write(&active_path, &active)?;
                return Ok(true);
            }

            let Some(year) = self.archive_year_holding(dir, id) else {
                return Ok(false);
            };
            let archive_path = archive_path(dir, year);
            let mut archived = self.load_for_update(&archive_path)?;
            archived.retain(|t| t.id != id);
            self.write(&archive_path, &archived)?;
            Ok(true)
        })
    }

    /// Move todos completed more than `days_old` days ago into their year's archive.
    ///
    /// Returns how many todos were moved. Running it again right away moves
    /// nothing and rewrites nothing.
    pub fn archive_completed(&self, days_old: u32) -> Result<usize, StoreError> {
        self.archive_completed_at(days_old, time::now_millis())
    }

    /// [`archive_completed`](Self::archive_completed) with an explicit "now".
    pub fn archive_completed_at(&self, days_old: u32, now: i64) -> Result<usize, StoreError> {
        let cutoff = now - i64::from(days_old) * MILLIS_PER_DAY;

        self.with_todos_dir(|dir| {
            let active_path = active_path(dir);
            let active = self.load_for_update(&active_path)?;
            let (to_archive, to_keep): (Vec<Todo>, Vec<Todo>) =
                active.into_iter().partition(|todo| {
                    todo.completed && todo.completed_at.is_some_and(|at| at < cutoff)
                });

            if to_archive.is_empty() {
                return Ok(0);
            }

            let moved = to_archive.len();
            let current_year = time::current_year();
            let mut by_year: BTreeMap<i32, Vec<Todo>> = BTreeMap::new();
            for todo in to_archive {
                let year = todo
                    .completed_date()
                    .map(|date| date.year())
                    .unwrap_or(current_year);
                by_year.entry(year).or_default().push(todo);
            }

            // Archive documents as they were before this call, for rollback.
            let mut touched: Vec<(PathBuf, Option<Vec<Todo>>)> = Vec::new();

            for (year, year_todos) in by_year {
                let path = archive_path(dir, year);
                let existed = self.files.exists(&path);
                let existing = self.load_for_update(&path)?;

                // Existing archived copies win over the incoming ones.
                let merged = distinct_by_id(existing.iter().cloned().chain(year_todos));

                if let Err(e) = self.write(&path, &merged) {
                    self.restore_archives(&touched);
                    return Err(e);
                }
                touched.push((path, existed.then_some(existing)));
            }

            if let Err(e) = self.write(&active_path, &to_keep) {
                self.restore_archives(&touched);
                return Err(e);
            }

            log::info!("Archived {moved} completed todos");
            Ok(moved)
        })
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn load_for_update(&self, path: &Path) -> Result<Vec<Todo>, StoreError> {
        Ok(load_for_update::<TodoList>(&self.files, path)?.todos)
    }

    fn write(&self, path: &Path, todos: &[Todo]) -> Result<(), StoreError> {
        write_todo_list(&self.files, path, todos)
    }

    /// First archive year whose document contains `id`.
    ///
    /// Read-only: unreadable archives are skipped, not quarantined, since
    /// they won't be rewritten.
    fn archive_year_holding(&self, todos_dir: &Path, id: &str) -> Option<i32> {
        self.archive_years_in(todos_dir).into_iter().find(|&year| {
            let path = archive_path(todos_dir, year);
            match read_json::<TodoList>(&self.files, &path) {
                Ok(list) => list.is_some_and(|list| list.todos.iter().any(|t| t.id == id)),
                Err(e) => {
                    log::warn!("Skipping unreadable todo archive: {e}");
                    false
                }
            }
        })
    }

    /// Best-effort rollback of archive documents written by a failed archival.
    fn restore_archives(&self, touched: &[(PathBuf, Option<Vec<Todo>>)]) {
        for (path, previous) in touched {
            let result = match previous {
                Some(todos) => self.write(path, todos),
                None => self.files.delete(path).map(|_| ()),
            };
            if let Err(e) = result {
                log::warn!("Failed to roll back {}: {e}", path.display());
            }
        }
    }
}

fn active_path(todos_dir: &Path) -> PathBuf {
    todos_dir.join("active.json")
}

fn archive_path(todos_dir: &Path, year: i32) -> PathBuf {
    todos_dir.join(ARCHIVE_DIR).join(format!("{year}.json"))
}

fn write_todo_list(files: &FileStore, path: &Path, todos: &[Todo]) -> Result<(), StoreError> {
    let list = TodoList {
        todos: todos.to_vec(),
    };
    write_json(files, path, &list)
}

/// Keep the first todo seen for each id, preserving order.
fn distinct_by_id(todos: impl IntoIterator<Item = Todo>) -> Vec<Todo> {
    let mut seen = HashSet::new();
    todos
        .into_iter()
        .filter(|todo| seen.insert(todo.id.clone()))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================
