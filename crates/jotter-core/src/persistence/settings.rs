//! Settings and app-state documents in the app's config directory.
//!
//! - `settings.json` - [`AppSettings`], user preferences
//! - `app_state.json` - [`AppState`], the data root and first-launch flag
//!
//! These live outside the data root because they are what locates it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::document::{load_or_default, quarantine, read_json, write_json};
use super::error::StoreError;
use super::file_store::FileStore;
use super::locks::DocumentLocks;
use super::types::{AppSettings, AppState};

const SETTINGS_FILE: &str = "settings.json";
const APP_STATE_FILE: &str = "app_state.json";

#[derive(Debug, Clone)]
pub struct SettingsStore {
    files: FileStore,
    config_dir: PathBuf,
    default_data_dir: PathBuf,
    locks: Arc<DocumentLocks>,
}

impl SettingsStore {
    /// `default_data_dir` is used as the data root until one is configured.
    pub fn new(
        files: FileStore,
        config_dir: impl Into<PathBuf>,
        default_data_dir: impl Into<PathBuf>,
        locks: Arc<DocumentLocks>,
    ) -> Self {
        Self {
            files,
            config_dir: config_dir.into(),
            default_data_dir: default_data_dir.into(),
            locks,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    fn app_state_path(&self) -> PathBuf {
        self.config_dir.join(APP_STATE_FILE)
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    /// Saved settings, or defaults if the file is missing or unreadable.
    pub fn load_settings(&self) -> AppSettings {
        load_or_default(&self.files, &self.settings_path())
    }

    pub fn save_settings(&self, settings: &AppSettings) -> Result<(), StoreError> {
        let path = self.settings_path();
        self.locks
            .with(&path, || write_json(&self.files, &path, settings))
    }

    pub fn reset_all_settings(&self) -> Result<(), StoreError> {
        self.save_settings(&AppSettings::default())
    }

    // ------------------------------------------------------------------------
    // App state
    // ------------------------------------------------------------------------

    /// Saved app state, or `None` if the file is missing or unreadable.
    pub fn load_app_state(&self) -> Option<AppState> {
        match read_json(&self.files, &self.app_state_path()) {
            Ok(state) => state,
            Err(e) => {
                log::warn!("Ignoring unreadable app state: {e}");
                None
            }
        }
    }

    pub fn save_app_state(&self, state: &AppState) -> Result<(), StoreError> {
        let path = self.app_state_path();
        self.locks
            .with(&path, || write_json(&self.files, &path, state))
    }

    /// True until a first launch has been completed.
    pub fn is_first_launch(&self) -> bool {
        self.load_app_state().map_or(true, |state| state.is_first_launch)
    }

    pub fn mark_first_launch_complete(&self) -> Result<(), StoreError> {
        self.update_app_state(|state| {
            let mut state = state.unwrap_or_else(|| self.default_state());
            state.is_first_launch = false;
            Some(state)
        })
    }

    /// Show onboarding again on next launch. No-op without saved state.
    pub fn reset_to_first_launch(&self) -> Result<(), StoreError> {
        self.update_app_state(|state| {
            state.map(|mut state| {
                state.is_first_launch = true;
                state
            })
        })
    }

    /// Configured data root, or the default one.
    pub fn data_path(&self) -> PathBuf {
        self.load_app_state()
            .map(|state| PathBuf::from(state.data_path))
            .unwrap_or_else(|| self.default_data_dir.clone())
    }

    /// Point the app at a new data root. This also ends the first launch.
    pub fn update_data_path(&self, path: &Path) -> Result<(), StoreError> {
        let data_path = path.to_string_lossy().into_owned();
        self.update_app_state(|state| {
            let mut state = state.unwrap_or_else(|| AppState::new(data_path.clone()));
            state.data_path = data_path;
            state.is_first_launch = false;
            Some(state)
        })
    }

    pub fn is_developer_mode_enabled(&self) -> bool {
        self.load_app_state()
            .is_some_and(|state| state.is_developer_mode_enabled)
    }

    /// No-op without saved state.
    pub fn set_developer_mode_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.update_app_state(|state| {
            state.map(|mut state| {
                state.is_developer_mode_enabled = enabled;
                state
            })
        })
    }

    fn default_state(&self) -> AppState {
        AppState::new(self.default_data_dir.to_string_lossy().into_owned())
    }

    /// Load-mutate-store on `app_state.json`. Returning `None` skips the write.
    fn update_app_state(
        &self,
        f: impl FnOnce(Option<AppState>) -> Option<AppState>,
    ) -> Result<(), StoreError> {
        let path = self.app_state_path();
        self.locks.with(&path, || {
            let current = match read_json::<AppState>(&self.files, &path) {
                Ok(state) => state,
                Err(e) => {
                    let moved_to = quarantine(&self.files, &path)?;
                    log::warn!(
                        "Unreadable app state moved aside to {}: {e}",
                        moved_to.display()
                    );
                    None
                }
            };

            match f(current) {
                Some(state) => write_json(&self.files, &path, &state),
                None => Ok(()),
            }
        })
    }
}
