use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

use crate::{
    error::SessionError,
    timer::{
        state::{DEFAULT_DURATION_MINUTES, MAX_DURATION_MINUTES, MIN_DURATION_MINUTES},
        TimerState,
    },
};

pub const DATA_DIR_ENV: &str = "ZENDO_DATA_DIR";
pub const DEBUG_ENV: &str = "ZENDO_DEBUG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BellSettings {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for BellSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSettings {
    pub default_duration_minutes: u32,
    pub bells: BellSettings,
    /// Where recorded bell sounds live; `<data dir>/sounds` when unset.
    pub assets_dir: Option<PathBuf>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            default_duration_minutes: DEFAULT_DURATION_MINUTES,
            bells: BellSettings::default(),
            assets_dir: None,
        }
    }
}

/// `ZENDO_DATA_DIR`, else the platform data directory.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(dir);
    }
    dirs::data_dir()
        .map(|dir| dir.join("zendo"))
        .unwrap_or_else(|| PathBuf::from(".zendo"))
}

pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    /// A missing or unreadable file yields defaults; nothing is written until
    /// the first update.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!("Ignoring malformed settings in {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(sanitize(data)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self) -> UserSettings {
        self.data
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn assets_dir(&self, data_dir: &Path) -> PathBuf {
        self.get()
            .assets_dir
            .unwrap_or_else(|| data_dir.join("sounds"))
    }

    pub fn update_default_duration(&self, minutes: u32) -> Result<()> {
        if !TimerState::is_valid_duration(minutes) {
            return Err(SessionError::InvalidDuration {
                got: minutes,
                min: MIN_DURATION_MINUTES,
                max: MAX_DURATION_MINUTES,
            }
            .into());
        }
        self.update(|settings| settings.default_duration_minutes = minutes)
    }

    pub fn update_bells(&self, bells: BellSettings) -> Result<()> {
        self.update(|settings| settings.bells = bells)
    }

    fn update(&self, change: impl FnOnce(&mut UserSettings)) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        change(&mut *guard);
        *guard = sanitize(guard.clone());
        self.persist(&*guard)
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

fn sanitize(mut settings: UserSettings) -> UserSettings {
    if !TimerState::is_valid_duration(settings.default_duration_minutes) {
        warn!(
            "Default duration {} is out of range; using {}",
            settings.default_duration_minutes, DEFAULT_DURATION_MINUTES
        );
        settings.default_duration_minutes = DEFAULT_DURATION_MINUTES;
    }
    settings.bells.volume = settings.bells.volume.clamp(0.0, 1.0);
    settings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), UserSettings::default());
        assert!(!store.path().exists());
        assert_eq!(store.assets_dir(dir.path()), dir.path().join("sounds"));
    }

    #[test]
    fn updates_persist_across_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        store.update_default_duration(45).unwrap();
        store
            .update_bells(BellSettings {
                enabled: false,
                volume: 3.0,
            })
            .unwrap();

        let reloaded = SettingsStore::new(path).unwrap().get();
        assert_eq!(reloaded.default_duration_minutes, 45);
        assert!(!reloaded.bells.enabled);
        assert_eq!(reloaded.bells.volume, 1.0);
    }

    #[test]
    fn rejects_out_of_range_default_duration() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert!(store.update_default_duration(200).is_err());
        assert_eq!(store.get().default_duration_minutes, DEFAULT_DURATION_MINUTES);
    }

    #[test]
    fn malformed_or_partial_files_fall_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(
            SettingsStore::new(path.clone()).unwrap().get(),
            UserSettings::default()
        );

        fs::write(&path, r#"{ "defaultDurationMinutes": 1000, "bells": { "enabled": false } }"#)
            .unwrap();
        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.default_duration_minutes, DEFAULT_DURATION_MINUTES);
        assert!(!settings.bells.enabled);
        assert_eq!(settings.bells.volume, BellSettings::default().volume);
    }
}
