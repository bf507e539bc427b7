//! Journal persistence: one markdown file per day.
//!
//! Files live at `journals/{year}/{month:02}/{yyyy-MM-dd}.md` and start with a
//! small front-matter block:
//!
//! ```text
//! ---
//! date: 2025-12-21
//! createdAt: 1734764400000
//! updatedAt: 1734764400000
//! mood: happy
//! weather: sunny
//! ---
//!
//! # Title
//!
//! Body
//! ```
//!
//! Title, mood and weather are single-line fields; line breaks in them are
//! folded into spaces when written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};

use super::error::{DecodeError, StoreError};
use super::file_store::FileStore;
use super::locks::DocumentLocks;
use super::types::{Journal, JournalMetadata};
use crate::paths::DataRoot;
use crate::time;

const FRONT_MATTER_FENCE: &str = "---";
const UNTITLED: &str = "Untitled";

/// Store for journal entries under `<data root>/journals`.
#[derive(Debug, Clone)]
pub struct JournalStore {
    files: FileStore,
    root: DataRoot,
    locks: Arc<DocumentLocks>,
}

impl JournalStore {
    pub fn new(files: FileStore, root: DataRoot, locks: Arc<DocumentLocks>) -> Self {
        Self { files, root, locks }
    }

    fn month_dir(&self, year: i32, month: u32) -> PathBuf {
        month_dir(&self.root.journals_dir(), year, month)
    }

    fn journal_path(&self, date: NaiveDate) -> PathBuf {
        journal_path(&self.root.journals_dir(), date)
    }

    /// Run `f` holding the `journals/` lock, with the directory it covers.
    fn with_journals_dir<T>(&self, f: impl FnOnce(&Path) -> T) -> T {
        self.locks.with_dir(|| self.root.journals_dir(), f)
    }

    /// The entry for `date`, or `None` if it is missing or unreadable.
    pub fn get(&self, date: NaiveDate) -> Option<Journal> {
        match self.read_journal(date, &self.journal_path(date)) {
            Ok(journal) => journal,
            Err(e) => {
                log::warn!("Skipping unreadable journal for {date}: {e}");
                None
            }
        }
    }

    pub fn get_today(&self) -> Option<Journal> {
        self.get(time::today())
    }

    pub fn exists(&self, date: NaiveDate) -> bool {
        self.files.exists(&self.journal_path(date))
    }

    /// Write `journal`, replacing any entry for the same date.
    pub fn save(&self, journal: &Journal) -> Result<(), StoreError> {
        self.with_journals_dir(|dir| {
            let path = journal_path(dir, journal.date);
            self.files.write_text(&path, &to_markdown(journal))
        })
    }

    /// Create or replace today's entry, keeping the original `created_at`.
    pub fn save_today(
        &self,
        title: &str,
        content: &str,
        mood: Option<String>,
        weather: Option<String>,
    ) -> Result<Journal, StoreError> {
        let today = time::today();

        self.with_journals_dir(|dir| {
            let path = journal_path(dir, today);
            let now = time::now_millis();
            let created_at = match self.read_journal(today, &path) {
                Ok(Some(existing)) => existing.created_at,
                Ok(None) => now,
                Err(e) => {
                    log::warn!("Replacing unreadable journal for {today}: {e}");
                    now
                }
            };
            let journal = Journal {
                date: today,
                title: single_line(title),
                content: content.to_string(),
                mood: mood.as_deref().map(single_line),
                weather: weather.as_deref().map(single_line),
                created_at,
                updated_at: now,
            };

            self.files.write_text(&path, &to_markdown(&journal))?;
            Ok(journal)
        })
    }

    /// Delete the entry for `date`. Returns `false` if there was none.
    pub fn delete(&self, date: NaiveDate) -> Result<bool, StoreError> {
        self.with_journals_dir(|dir| self.files.delete(&journal_path(dir, date)))
    }

    /// Entries in one month, newest first. Unreadable files are skipped.
    pub fn list(&self, year: i32, month: u32) -> Vec<JournalMetadata> {
        self.load_month(year, month)
            .iter()
            .map(JournalMetadata::from)
            .collect()
    }

    /// Years that have a journal directory, newest first.
    pub fn years(&self) -> Vec<i32> {
        let entries = match self.files.list(&self.root.journals_dir()) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list journal years: {e}");
                return Vec::new();
            }
        };

        let mut years: Vec<i32> = entries
            .iter()
            .filter(|path| self.files.is_dir(path))
            .filter_map(|path| path.file_name()?.to_str()?.parse().ok())
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years
    }

    /// Case-insensitive search over titles and bodies of every entry.
    ///
    /// This is a full scan; there is no index.
    pub fn search(&self, query: &str) -> Vec<JournalMetadata> {
        let needle = query.to_lowercase();
        let mut results: Vec<JournalMetadata> = self
            .years()
            .into_iter()
            .flat_map(|year| (1..=12).map(move |month| (year, month)))
            .flat_map(|(year, month)| self.load_month(year, month))
            .filter(|journal| {
                journal.title.to_lowercase().contains(&needle)
                    || journal.content.to_lowercase().contains(&needle)
            })
            .map(|journal| JournalMetadata::from(&journal))
            .collect();

        results.sort_by(|a, b| b.date.cmp(&a.date));
        results
    }

    fn load_month(&self, year: i32, month: u32) -> Vec<Journal> {
        let dir = self.month_dir(year, month);
        let entries = match self.files.list(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Failed to list journals in {}: {e}", dir.display());
                return Vec::new();
            }
        };

        let mut journals: Vec<Journal> = entries
            .iter()
            .filter_map(|path| {
                if path.extension().and_then(|ext| ext.to_str()) != Some("md") {
                    return None;
                }
                let date: NaiveDate = path.file_stem()?.to_str()?.parse().ok()?;
                match self.read_journal(date, path) {
                    Ok(journal) => journal,
                    Err(e) => {
                        log::warn!("Skipping unreadable journal: {e}");
                        None
                    }
                }
            })
            .collect();

        journals.sort_by(|a, b| b.date.cmp(&a.date));
        journals
    }

    fn read_journal(&self, date: NaiveDate, path: &Path) -> Result<Option<Journal>, DecodeError> {
        let Some(text) = self.files.read_text(path)? else {
            return Ok(None);
        };
        Ok(Some(parse_markdown(date, &text, time::now_millis())))
    }
}

fn month_dir(journals_dir: &Path, year: i32, month: u32) -> PathBuf {
    journals_dir.join(year.to_string()).join(format!("{month:02}"))
}

fn journal_path(journals_dir: &Path, date: NaiveDate) -> PathBuf {
    month_dir(journals_dir, date.year(), date.month()).join(format!("{date}.md"))
}

// ============================================================================
// Markdown codec
// ============================================================================

/// Fold `\r\n`, `\r` and `\n` into single spaces.
fn single_line(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Render a journal in its on-disk form.
pub fn to_markdown(journal: &Journal) -> String {
    let mut out = String::new();

    out.push_str("---\n");
    out.push_str(&format!("date: {}\n", journal.date));
    out.push_str(&format!("createdAt: {}\n", journal.created_at));
    out.push_str(&format!("updatedAt: {}\n", journal.updated_at));
    if let Some(mood) = &journal.mood {
        out.push_str(&format!("mood: {}\n", single_line(mood)));
    }
    if let Some(weather) = &journal.weather {
        out.push_str(&format!("weather: {}\n", single_line(weather)));
    }
    out.push_str("---\n\n");

    out.push_str(&format!("# {}\n\n", single_line(&journal.title)));
    out.push_str(&journal.content);
    out
}

/// Parse the on-disk form back into a journal for `date`.
///
/// Missing timestamps fall back to `now`. Front matter is only recognized
/// when it opens on the first non-blank line. If it never closes, the whole
/// text is read as title plus body, so a plain markdown file with a `---`
/// rule still parses.
pub fn parse_markdown(date: NaiveDate, text: &str, now: i64) -> Journal {
    let lines: Vec<&str> = text.split('\n').collect();
    let (front_matter, body_start) = split_front_matter(&lines).unwrap_or_default();

    let mut body = lines[body_start..]
        .iter()
        .copied()
        .skip_while(|line| line.trim().is_empty());

    let title = body.next().map_or_else(
        || UNTITLED.to_string(),
        |line| line.strip_prefix('#').unwrap_or(line).trim().to_string(),
    );

    let content = body
        .skip_while(|line| line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let timestamp = |key: &str| {
        front_matter
            .get(key)
            .and_then(|value| value.parse::<i64>().ok())
            .unwrap_or(now)
    };

    Journal {
        date,
        title,
        content,
        mood: front_matter.get("mood").map(|s| s.to_string()),
        weather: front_matter.get("weather").map(|s| s.to_string()),
        created_at: timestamp("createdAt"),
        updated_at: timestamp("updatedAt"),
    }
}

/// Front-matter keys and the index of the first body line, or `None` if the
/// text has no closed front-matter block at its top.
fn split_front_matter<'a>(lines: &[&'a str]) -> Option<(HashMap<&'a str, &'a str>, usize)> {
    let open = lines.iter().position(|line| !line.trim().is_empty())?;
    if lines[open].trim() != FRONT_MATTER_FENCE {
        return None;
    }

    let mut front_matter = HashMap::new();
    for (index, line) in lines.iter().enumerate().skip(open + 1) {
        if line.trim() == FRONT_MATTER_FENCE {
            return Some((front_matter, index + 1));
        }
        if let Some((key, value)) = line.split_once(':') {
            front_matter.insert(key.trim(), value.trim());
        }
    }
    None
}

// ============================================================================
// TESTS
// ============================================================================
