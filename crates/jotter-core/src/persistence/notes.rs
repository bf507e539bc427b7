//! Note persistence: markdown content files plus a JSON index.
//!
//! # Files
//!
//! - `notes/{id}.md` - Note content, verbatim
//! - `notes/.metadata.json` - [`NoteIndex`] with title, tags and timestamps
//!   for every note, so listing and tag queries never open content files
//!
//! The index is authoritative: a content file without an index entry is
//! invisible until [`NoteStore::reconcile`] adopts it.
//!
//! # Keeping the pair consistent
//!
//! Every mutation holds the `notes/` lock and runs as a small saga: the
//! content file is changed first, then the index. If the index write fails,
//! the content file is put back the way it was before the error is returned.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::Rng;

use super::document::{load_for_update, load_or_default, write_json};
use super::error::{DecodeError, StoreError};
use super::file_store::FileStore;
use super::locks::DocumentLocks;
use super::types::{Note, NoteIndex, NoteMetadata};
use crate::paths::{validate_path_component, DataRoot};
use crate::time;

const INDEX_FILE: &str = ".metadata.json";
const UNTITLED: &str = "Untitled";

/// What [`NoteStore::reconcile`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Index entries removed because their content file is gone.
    pub dropped: Vec<String>,
    /// Content files added to the index.
    pub adopted: Vec<String>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.dropped.is_empty() && self.adopted.is_empty()
    }
}

/// Store for notes under `<data root>/notes`.
#[derive(Debug, Clone)]
pub struct NoteStore {
    files: FileStore,
    root: DataRoot,
    locks: Arc<DocumentLocks>,
}

impl NoteStore {
    pub fn new(files: FileStore, root: DataRoot, locks: Arc<DocumentLocks>) -> Self {
        Self { files, root, locks }
    }

    /// Run `f` holding the `notes/` lock, with the directory it covers.
    fn with_notes_dir<T>(&self, f: impl FnOnce(&Path) -> T) -> T {
        self.locks.with_dir(|| self.root.notes_dir(), f)
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Metadata for every note, in index order.
    pub fn all_notes(&self) -> Vec<NoteMetadata> {
        load_or_default::<NoteIndex>(&self.files, &index_path(&self.root.notes_dir())).notes
    }

    /// Load a note with its content.
    ///
    /// `None` if the id isn't indexed, its content file is missing, or the id
    /// isn't a valid file name.
    pub fn get(&self, id: &str) -> Option<Note> {
        let path = note_path(&self.root.notes_dir(), id).ok()?;
        let metadata = self.all_notes().into_iter().find(|n| n.id == id)?;

        match self.files.read_text(&path) {
            Ok(content) => content.map(|content| metadata.into_note(content)),
            Err(e) => {
                log::warn!("Failed to read note {id}: {e}");
                None
            }
        }
    }

    pub fn list_by_tag(&self, tag: &str) -> Vec<NoteMetadata> {
        self.all_notes()
            .into_iter()
            .filter(|n| n.tags.iter().any(|t| t == tag))
            .collect()
    }

    /// Case-insensitive search over title, tags and content.
    ///
    /// Content files are only opened for notes whose title and tags don't match.
    pub fn search(&self, query: &str) -> Vec<NoteMetadata> {
        let needle = query.to_lowercase();
        let dir = self.root.notes_dir();

        self.all_notes()
            .into_iter()
            .filter(|n| {
                n.title.to_lowercase().contains(&needle)
                    || n.tags.iter().any(|t| t.to_lowercase().contains(&needle))
                    || self.content_matches(&dir, &n.id, &needle)
            })
            .collect()
    }

    fn content_matches(&self, dir: &Path, id: &str, needle: &str) -> bool {
        let Ok(path) = note_path(dir, id) else {
            return false;
        };
        match self.files.read_text(&path) {
            Ok(Some(content)) => content.to_lowercase().contains(needle),
            Ok(None) => false,
            Err(e) => {
                log::warn!("Failed to read note {id} while searching: {e}");
                false
            }
        }
    }

    /// Every tag used by any note, de-duplicated and sorted.
    pub fn all_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self
            .all_notes()
            .into_iter()
            .flat_map(|n| n.tags)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        tags.sort();
        tags
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Write a note's content and index entry.
    ///
    /// An existing entry keeps its `created_at`; `updated_at` becomes now.
    /// Returns the note as stored.
    pub fn save(&self, note: &Note) -> Result<Note, StoreError> {
        validate_path_component(&note.id)?;
        self.with_notes_dir(|dir| self.save_locked(dir, note))
    }

    /// Create a note with a fresh `{epoch-ms}-{random}` id.
    pub fn create(
        &self,
        title: &str,
        content: &str,
        tags: Vec<String>,
    ) -> Result<Note, StoreError> {
        self.with_notes_dir(|dir| {
            let now = time::now_millis();
            let id = self.unused_id(dir);
            let note = Note {
                id,
                title: title.to_string(),
                content: content.to_string(),
                tags,
                created_at: now,
                updated_at: now,
            };
            self.save_locked(dir, &note)
        })
    }

    /// Delete a note's content file and index entry.
    ///
    /// Returns whether the content file existed. The index is rewritten
    /// either way, so a dangling entry is cleaned up too.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        validate_path_component(id)?;

        self.with_notes_dir(|dir| {
            let path = note_path(dir, id)?;
            let index_path = index_path(dir);
            let mut index = load_for_update::<NoteIndex>(&self.files, &index_path)?;
            let previous = self.files.read_text(&path);

            let existed = self.files.delete(&path)?;
            index.notes.retain(|n| n.id != id);

            if let Err(e) = write_json(&self.files, &index_path, &index) {
                self.restore_content(id, &path, previous);
                return Err(e);
            }

            log::debug!("Deleted note {id}");
            Ok(existed)
        })
    }

    /// Bring the index and the content files back in line.
    ///
    /// Index entries whose content file is missing are dropped. Content files
    /// without an index entry are adopted, titled after their first heading
    /// (or first non-blank line).
    pub fn reconcile(&self) -> Result<ReconcileReport, StoreError> {
        self.with_notes_dir(|notes_dir| {
            let index_path = index_path(notes_dir);
            let mut index = load_for_update::<NoteIndex>(&self.files, &index_path)?;
            let mut report = ReconcileReport::default();

            index.notes.retain(|n| {
                let present =
                    note_path(notes_dir, &n.id).is_ok_and(|path| self.files.exists(&path));
                if !present {
                    report.dropped.push(n.id.clone());
                }
                present
            });

            let indexed: HashSet<String> = index.notes.iter().map(|n| n.id.clone()).collect();
            let now = time::now_millis();

            for path in self.files.list(notes_dir)? {
                if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                    continue;
                }
                let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if indexed.contains(id) {
                    continue;
                }

                let content = match self.files.read_text(&path) {
                    Ok(Some(content)) => content,
                    Ok(None) => continue,
                    Err(e) => {
                        log::warn!("Not adopting unreadable note file: {e}");
                        continue;
                    }
                };

                index.notes.push(NoteMetadata {
                    id: id.to_string(),
                    title: title_from_content(&content),
                    tags: Vec::new(),
                    created_at: now,
                    updated_at: now,
                });
                report.adopted.push(id.to_string());
            }

            if !report.is_clean() {
                write_json(&self.files, &index_path, &index)?;
                log::info!(
                    "Reconciled note index: dropped {:?}, adopted {:?}",
                    report.dropped,
                    report.adopted
                );
            }

            Ok(report)
        })
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Must be called with the lock on `dir` held.
    fn save_locked(&self, dir: &Path, note: &Note) -> Result<Note, StoreError> {
        let path = note_path(dir, &note.id)?;
        let index_path = index_path(dir);
        let mut index = load_for_update::<NoteIndex>(&self.files, &index_path)?;
        let previous = self.files.read_text(&path);

        self.files.write_text(&path, &note.content)?;

        let now = time::now_millis();
        let existing = index.notes.iter().position(|n| n.id == note.id);
        let metadata = NoteMetadata {
            id: note.id.clone(),
            title: note.title.clone(),
            tags: normalize_tags(&note.tags),
            created_at: existing.map_or(now, |pos| index.notes[pos].created_at),
            updated_at: now,
        };

        match existing {
            Some(pos) => index.notes[pos] = metadata.clone(),
            None => index.notes.push(metadata.clone()),
        }

        if let Err(e) = write_json(&self.files, &index_path, &index) {
            self.restore_content(&note.id, &path, previous);
            return Err(e);
        }

        log::debug!("Saved note {}", note.id);
        Ok(metadata.into_note(note.content.clone()))
    }

    /// Put a content file back to what it held before a failed index write.
    fn restore_content(
        &self,
        id: &str,
        path: &Path,
        previous: Result<Option<String>, DecodeError>,
    ) {
        let result = match previous {
            Ok(Some(content)) => self.files.write_text(path, &content),
            Ok(None) => self.files.delete(path).map(|_| ()),
            Err(e) => {
                log::warn!("Cannot restore note {id}: previous content was unreadable ({e})");
                return;
            }
        };
        if let Err(e) = result {
            log::warn!("Failed to restore note {id} after index write error: {e}");
        }
    }

    /// Must be called with the lock on `dir` held.
    fn unused_id(&self, dir: &Path) -> String {
        let taken: HashSet<String> = load_or_default::<NoteIndex>(&self.files, &index_path(dir))
            .notes
            .into_iter()
            .map(|n| n.id)
            .collect();
        let mut rng = rand::thread_rng();

        loop {
            let id = format!("{}-{}", time::now_millis(), rng.gen_range(0..=999_999));
            let on_disk = note_path(dir, &id).is_ok_and(|path| self.files.exists(&path));
            if !taken.contains(&id) && !on_disk {
                return id;
            }
        }
    }
}

fn index_path(notes_dir: &Path) -> PathBuf {
    notes_dir.join(INDEX_FILE)
}

fn note_path(notes_dir: &Path, id: &str) -> Result<PathBuf, StoreError> {
    validate_path_component(id)?;
    Ok(notes_dir.join(format!("{id}.md")))
}

/// De-duplicate tags, keeping the first occurrence of each.
fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter(|tag| seen.insert(tag.as_str()))
        .cloned()
        .collect()
}

/// Title for an adopted note: first markdown heading, else first non-blank line.
fn title_from_content(content: &str) -> String {
    let heading = content
        .lines()
        .map(str::trim)
        .find(|line| line.starts_with('#'))
        .map(|line| line.trim_start_matches('#').trim());

    let title = heading.or_else(|| content.lines().map(str::trim).find(|line| !line.is_empty()));

    match title {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => UNTITLED.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
