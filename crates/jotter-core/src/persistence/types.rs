//! Persistence data types.
//!
//! # Data Model Overview
//!
//! ```text
//! <config dir>/
//! ├── settings.json              # AppSettings
//! └── app_state.json             # AppState (data root, first launch)
//!
//! <data root>/
//! ├── journals/{year}/{month}/{date}.md
//! ├── notes/
//! │   ├── .metadata.json         # NoteIndex
//! │   └── {id}.md                # Note content
//! └── todos/
//!     ├── active.json            # TodoList
//!     ├── tags.json              # TagList
//!     └── archive/{year}.json    # TodoList
//! ```
//!
//! # Compatibility
//!
//! All JSON documents are read leniently: unknown fields are ignored, and
//! missing or `null` fields fall back to defaults. Older files are accepted
//! too, so legacy field names and the three-level priority enum still load.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::time;

/// Deserialize `null` as the type's default instead of failing.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Todo Types
// ============================================================================

/// Todo priority on a 1..=5 scale, 1 being the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u8);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    pub const LOWEST: Priority = Priority(5);

    /// Build a priority, rejecting values outside 1..=5.
    pub fn new(level: u8) -> Option<Self> {
        (1..=5).contains(&level).then_some(Priority(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// Map a pre-migration `LOW`/`NORMAL`/`HIGH` value onto the numeric scale.
    pub fn from_legacy(name: &str) -> Self {
        match name {
            "HIGH" => Priority(2),
            "LOW" => Priority(4),
            _ => Priority::default(),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_u64()
                .and_then(|level| u8::try_from(level).ok())
                .and_then(Priority::new)
                .unwrap_or_default(),
            Value::String(name) => Priority::from_legacy(name),
            _ => Priority::default(),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::LOWEST
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.0)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Priority::from_json(&value))
    }
}

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Todo {
    /// Unique across the active file and every archive file.
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,

    /// User tag (older files call this `category`).
    #[serde(default, alias = "category", skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default)]
    pub priority: Priority,

    /// Due time in epoch ms (older files call this `dueDateTime`).
    #[serde(default, alias = "dueDateTime", skip_serializing_if = "Option::is_none")]
    pub due_at: Option<i64>,

    /// Set iff `completed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
}

impl Todo {
    /// A fresh, incomplete todo with a random id.
    pub fn new(title: impl Into<String>) -> Self {
        let now = time::now_millis();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: String::new(),
            completed: false,
            tag: None,
            priority: Priority::default(),
            due_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Local calendar date the todo is due on.
    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_at.and_then(time::local_date)
    }

    /// Local calendar date the todo was completed on.
    pub fn completed_date(&self) -> Option<NaiveDate> {
        self.completed_at.and_then(time::local_date)
    }

    pub(crate) fn mark_completed(&mut self, now: i64) {
        self.completed = true;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    pub(crate) fn mark_uncompleted(&mut self, now: i64) {
        self.completed = false;
        self.completed_at = None;
        self.updated_at = now;
    }
}

/// Contents of `active.json` and of each `archive/{year}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub todos: Vec<Todo>,
}

/// Contents of `todos/tags.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

// ============================================================================
// Journal Types
// ============================================================================

/// One journal entry. The date is the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub date: NaiveDate,
    pub title: String,
    /// Markdown body.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Journal listing entry (everything but the body).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalMetadata {
    pub date: NaiveDate,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    pub updated_at: i64,
}

impl From<&Journal> for JournalMetadata {
    fn from(journal: &Journal) -> Self {
        Self {
            date: journal.date,
            title: journal.title.clone(),
            mood: journal.mood.clone(),
            weather: journal.weather.clone(),
            updated_at: journal.updated_at,
        }
    }
}

// ============================================================================
// Note Types
// ============================================================================

/// A note with its full markdown content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Index entry for a note, stored in `notes/.metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteMetadata {
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub created_at: i64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub updated_at: i64,
}

impl NoteMetadata {
    pub(crate) fn into_note(self, content: String) -> Note {
        Note {
            id: self.id,
            title: self.title,
            content,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// The note index: metadata for every note, so listing never opens content files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteIndex {
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: Vec<NoteMetadata>,
}

// ============================================================================
// Settings Types
// ============================================================================

/// UI theme preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl<'de> Deserialize<'de> for Theme {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value.as_str() {
            Some("LIGHT") => Theme::Light,
            Some("DARK") => Theme::Dark,
            _ => Theme::System,
        })
    }
}

fn default_language() -> String {
    "zh-CN".to_string()
}

/// User preferences saved to `settings.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub theme: Theme,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_true")]
    pub show_completed_todos: bool,

    #[serde(default)]
    pub default_todo_category: Option<String>,

    /// `HH:mm`
    #[serde(default)]
    pub daily_reminder_time: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: default_language(),
            show_completed_todos: true,
            default_todo_category: None,
            daily_reminder_time: None,
        }
    }
}

fn default_app_version() -> String {
    "1.0.0".to_string()
}

/// Runtime state saved to `app_state.json`, kept apart from user settings.
///
/// This is the root of trust for locating every other document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Data root chosen by the user.
    pub data_path: String,

    #[serde(default)]
    pub last_opened_route: Option<String>,

    #[serde(default = "default_true")]
    pub is_first_launch: bool,

    /// Used for data migrations.
    #[serde(default = "default_app_version")]
    pub app_version: String,

    #[serde(default)]
    pub is_developer_mode_enabled: bool,
}

impl AppState {
    pub fn new(data_path: impl Into<String>) -> Self {
        Self {
            data_path: data_path.into(),
            last_opened_route: None,
            is_first_launch: true,
            app_version: default_app_version(),
            is_developer_mode_enabled: false,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn priority_of(json: &str) -> u8 {
        let todo: Todo = serde_json::from_str(json).unwrap();
        todo.priority.level()
    }

    #[test]
    fn legacy_priority_strings_map_to_numeric_scale() {
        assert_eq!(priority_of(r#"{"id": "a", "priority": "HIGH"}"#), 2);
        assert_eq!(priority_of(r#"{"id": "a", "priority": "NORMAL"}"#), 5);
        assert_eq!(priority_of(r#"{"id": "a", "priority": "LOW"}"#), 4);
        assert_eq!(priority_of(r#"{"id": "a", "priority": "URGENT"}"#), 5);
        assert_eq!(priority_of(r#"{"id": "a", "priority": "high"}"#), 5);
    }

    #[test]
    fn numeric_priority_is_kept() {
        assert_eq!(priority_of(r#"{"id": "a", "priority": 3}"#), 3);
        assert_eq!(priority_of(r#"{"id": "a", "priority": 1}"#), 1);
    }

    #[test]
    fn invalid_priority_falls_back_to_default() {
        assert_eq!(priority_of(r#"{"id": "a", "priority": 9}"#), 5);
        assert_eq!(priority_of(r#"{"id": "a", "priority": 0}"#), 5);
        assert_eq!(priority_of(r#"{"id": "a", "priority": -2}"#), 5);
        assert_eq!(priority_of(r#"{"id": "a", "priority": null}"#), 5);
        assert_eq!(priority_of(r#"{"id": "a"}"#), 5);
    }

    #[test]
    fn priority_serializes_as_number() {
        let mut todo = Todo::new("x");
        todo.priority = Priority::new(2).unwrap();
        let json = serde_json::to_value(&todo).unwrap();
        assert_eq!(json["priority"], 2);
    }

    #[test]
    fn todo_accepts_legacy_field_names() {
        let todo: Todo = serde_json::from_str(
            r#"{"id": "a", "title": "t", "category": "work", "dueDateTime": 1700000000000}"#,
        )
        .unwrap();

        assert_eq!(todo.tag.as_deref(), Some("work"));
        assert_eq!(todo.due_at, Some(1_700_000_000_000));
    }

    #[test]
    fn todo_ignores_unknown_and_null_fields() {
        let todo: Todo = serde_json::from_str(
            r#"{"id": "a", "title": null, "completed": null, "someFutureField": [1, 2]}"#,
        )
        .unwrap();

        assert_eq!(todo.title, "");
        assert!(!todo.completed);
    }

    #[test]
    fn todo_uses_camel_case() {
        let mut todo = Todo::new("x");
        todo.due_at = Some(1);
        let json = serde_json::to_string(&todo).unwrap();

        assert!(json.contains("dueAt"));
        assert!(json.contains("createdAt"));
        assert!(!json.contains("due_at"));
        assert!(!json.contains("dueDateTime"));
    }

    #[test]
    fn new_todos_get_distinct_ids() {
        assert_ne!(Todo::new("a").id, Todo::new("a").id);
    }

    #[test]
    fn completion_helpers_keep_completed_at_in_sync() {
        let mut todo = Todo::new("x");

        todo.mark_completed(100);
        assert!(todo.completed);
        assert_eq!(todo.completed_at, Some(100));

        todo.mark_uncompleted(200);
        assert!(!todo.completed);
        assert_eq!(todo.completed_at, None);
        assert_eq!(todo.updated_at, 200);
    }

    #[test]
    fn todo_list_tolerates_missing_todos() {
        let list: TodoList = serde_json::from_str("{}").unwrap();
        assert!(list.todos.is_empty());
    }

    #[test]
    fn unknown_theme_falls_back_to_system() {
        let settings: AppSettings = serde_json::from_str(r#"{"theme": "SEPIA"}"#).unwrap();
        assert_eq!(settings.theme, Theme::System);

        let settings: AppSettings = serde_json::from_str(r#"{"theme": "DARK"}"#).unwrap();
        assert_eq!(settings.theme, Theme::Dark);
    }

    #[test]
    fn settings_defaults_fill_missing_fields() {
        let settings: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, AppSettings::default());
        assert_eq!(settings.language, "zh-CN");
        assert!(settings.show_completed_todos);
    }

    #[test]
    fn theme_serializes_uppercase() {
        let json = serde_json::to_string(&AppSettings::default()).unwrap();
        assert!(json.contains("\"SYSTEM\""));
    }

    #[test]
    fn app_state_defaults() {
        let state: AppState = serde_json::from_str(r#"{"dataPath": "/data"}"#).unwrap();
        assert_eq!(state.data_path, "/data");
        assert!(state.is_first_launch);
        assert_eq!(state.app_version, "1.0.0");
        assert!(!state.is_developer_mode_enabled);
    }

    #[test]
    fn app_state_requires_data_path() {
        assert!(serde_json::from_str::<AppState>(r#"{"isFirstLaunch": false}"#).is_err());
    }

    #[test]
    fn note_index_roundtrip_keeps_tag_order() {
        let index = NoteIndex {
            notes: vec![NoteMetadata {
                id: "n1".to_string(),
                title: "Title".to_string(),
                tags: vec!["b".to_string(), "a".to_string()],
                created_at: 1,
                updated_at: 2,
            }],
        };

        let json = serde_json::to_string(&index).unwrap();
        let parsed: NoteIndex = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, index);
    }
}
