//! Directory resolution and the shared data-root handle.

use std::env;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use crate::persistence::StoreError;

pub const CONFIG_DIR: &str = "config";
pub const JOURNALS_DIR: &str = "journals";
pub const NOTES_DIR: &str = "notes";
pub const TODOS_DIR: &str = "todos";
pub const ARCHIVE_DIR: &str = "archive";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Ok(home);
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Ok(profile);
        }
    }

    Err("Home directory not set".to_string())
}

/// Base directory for everything Jotter keeps on this machine.
///
/// `JOTTER_HOME` wins; otherwise `<home>/.jotter`.
pub fn app_home_dir() -> Result<PathBuf, StoreError> {
    if let Ok(dir) = env::var("JOTTER_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }

    get_home_dir()
        .map(|home| PathBuf::from(home).join(".jotter"))
        .map_err(|_| StoreError::HomeDirUnavailable)
}

/// App-private config directory (holds `settings.json` and `app_state.json`).
pub fn default_config_dir() -> Result<PathBuf, StoreError> {
    Ok(app_home_dir()?.join(CONFIG_DIR))
}

/// Data root used until the user picks one.
pub fn default_data_dir() -> Result<PathBuf, StoreError> {
    Ok(app_home_dir()?.join("data"))
}

/// Check that `component` is a single plain path segment (no separators, `..`, etc).
pub fn validate_path_component(component: &str) -> Result<(), StoreError> {
    if component.is_empty() {
        return Err(StoreError::InvalidId("identifier cannot be empty".to_string()));
    }

    let mut components = Path::new(component).components();
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => Ok(()),
        _ => Err(StoreError::InvalidId(component.to_string())),
    }
}

/// Shared, relocatable data root.
///
/// Every store holds a clone, so switching the root here redirects all of
/// them without rebuilding anything.
#[derive(Debug, Clone)]
pub struct DataRoot(Arc<RwLock<PathBuf>>);

impl DataRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(RwLock::new(path.into())))
    }

    pub fn path(&self) -> PathBuf {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set(&self, path: impl Into<PathBuf>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = path.into();
    }

    pub fn journals_dir(&self) -> PathBuf {
        self.path().join(JOURNALS_DIR)
    }

    pub fn notes_dir(&self) -> PathBuf {
        self.path().join(NOTES_DIR)
    }

    pub fn todos_dir(&self) -> PathBuf {
        self.path().join(TODOS_DIR)
    }
}
