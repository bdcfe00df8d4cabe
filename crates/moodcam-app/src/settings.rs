//! Persisted user settings.
//!
//! Stored as TOML; missing keys take their defaults. Every successful change
//! bumps a revision counter that consumers poll to notice updates.

use moodcam_core::DetectionQuality;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const CAMERA_INDEX_RANGE: RangeInclusive<u32> = 0..=10;
pub const DETECTION_INTERVAL_RANGE: RangeInclusive<u64> = 10..=100;
pub const MIN_FACE_SIZE_RANGE: RangeInclusive<u32> = 0..=1024;

/// Every recognised key, in display order.
pub const KEYS: [&str; 7] = [
    "theme",
    "camera_index",
    "detection_interval",
    "show_fps",
    "detection_quality",
    "save_screenshots",
    "min_face_size",
];

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize: {0}")]
    Serialize(#[from] toml::ser::Error),
}

fn invalid(key: &str, reason: impl Into<String>) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

/// A setting value as read or written by key.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Text(s) => f.write_str(s),
        }
    }
}

impl SettingValue {
    fn as_bool(&self, key: &str) -> Result<bool, SettingsError> {
        match self {
            SettingValue::Bool(b) => Ok(*b),
            other => Err(invalid(key, format!("expected true or false, got {other}"))),
        }
    }

    fn as_int<T: TryFrom<i64>>(&self, key: &str) -> Result<T, SettingsError> {
        match self {
            SettingValue::Int(i) => {
                T::try_from(*i).map_err(|_| invalid(key, format!("{i} is out of range")))
            }
            other => Err(invalid(key, format!("expected an integer, got {other}"))),
        }
    }

    fn as_text(&self, key: &str) -> Result<&str, SettingsError> {
        match self {
            SettingValue::Text(s) => Ok(s),
            other => Err(invalid(key, format!("expected text, got {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub theme: Theme,
    pub camera_index: u32,
    /// Milliseconds between detection ticks.
    pub detection_interval: u64,
    pub show_fps: bool,
    pub detection_quality: DetectionQuality,
    pub save_screenshots: bool,
    /// Faces with a side shorter than this (pixels) are ignored.
    pub min_face_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            camera_index: 0,
            detection_interval: 30,
            show_fps: true,
            detection_quality: DetectionQuality::Balanced,
            save_screenshots: true,
            min_face_size: 30,
        }
    }
}

impl Settings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.detection_interval)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !CAMERA_INDEX_RANGE.contains(&self.camera_index) {
            return Err(invalid(
                "camera_index",
                format!("{} not in {CAMERA_INDEX_RANGE:?}", self.camera_index),
            ));
        }
        if !DETECTION_INTERVAL_RANGE.contains(&self.detection_interval) {
            return Err(invalid(
                "detection_interval",
                format!("{} ms not in {DETECTION_INTERVAL_RANGE:?}", self.detection_interval),
            ));
        }
        if !MIN_FACE_SIZE_RANGE.contains(&self.min_face_size) {
            return Err(invalid(
                "min_face_size",
                format!("{} px not in {MIN_FACE_SIZE_RANGE:?}", self.min_face_size),
            ));
        }
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<SettingValue, SettingsError> {
        Ok(match key {
            "theme" => SettingValue::Text(self.theme.as_str().to_string()),
            "camera_index" => SettingValue::Int(self.camera_index.into()),
            "detection_interval" => SettingValue::Int(self.detection_interval as i64),
            "show_fps" => SettingValue::Bool(self.show_fps),
            "detection_quality" => SettingValue::Text(self.detection_quality.as_str().to_string()),
            "save_screenshots" => SettingValue::Bool(self.save_screenshots),
            "min_face_size" => SettingValue::Int(self.min_face_size.into()),
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        })
    }

    /// Set one key. The settings are left unchanged on error.
    pub fn set(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        let mut next = self.clone();
        match key {
            "theme" => {
                next.theme = match value.as_text(key)? {
                    "dark" => Theme::Dark,
                    "light" => Theme::Light,
                    other => return Err(invalid(key, format!("{other} (expected dark or light)"))),
                }
            }
            "camera_index" => next.camera_index = value.as_int(key)?,
            "detection_interval" => next.detection_interval = value.as_int(key)?,
            "show_fps" => next.show_fps = value.as_bool(key)?,
            "detection_quality" => {
                next.detection_quality = value.as_text(key)?.parse().map_err(|e| invalid(key, e))?
            }
            "save_screenshots" => next.save_screenshots = value.as_bool(key)?,
            "min_face_size" => next.min_face_size = value.as_int(key)?,
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    /// Parse a command-line string into the type `key` expects, then set it.
    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let value = match self.get(key)? {
            SettingValue::Bool(_) => SettingValue::Bool(
                raw.parse()
                    .map_err(|_| invalid(key, format!("{raw} (expected true or false)")))?,
            ),
            SettingValue::Int(_) => SettingValue::Int(
                raw.parse()
                    .map_err(|_| invalid(key, format!("{raw} (expected an integer)")))?,
            ),
            SettingValue::Text(_) => SettingValue::Text(raw.to_string()),
        };
        self.set(key, value)
    }
}

/// Settings bound to their file, with a change revision.
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
    revision: u64,
}

impl SettingsStore {
    /// Read settings from `path`. A missing file yields defaults.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let current = match std::fs::read_to_string(&path) {
            Ok(text) => {
                let settings: Settings = toml::from_str(&text)?;
                settings.validate()?;
                settings
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "settings loaded");
        Ok(Self {
            path,
            current,
            revision: 0,
        })
    }

    /// A store holding defaults, not yet written.
    pub fn with_defaults(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: Settings::default(),
            revision: 0,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Incremented on every successful change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn set(&mut self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        let mut next = self.current.clone();
        next.set(key, value)?;
        self.commit(next)
    }

    pub fn set_from_str(&mut self, key: &str, raw: &str) -> Result<(), SettingsError> {
        let mut next = self.current.clone();
        next.set_from_str(key, raw)?;
        self.commit(next)
    }

    /// Replace all settings at once (settings dialog "Save").
    pub fn replace(&mut self, settings: Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.commit(settings)
    }

    pub fn reset(&mut self) -> Result<(), SettingsError> {
        self.commit(Settings::default())
    }

    fn commit(&mut self, next: Settings) -> Result<(), SettingsError> {
        self.write(&next)?;
        self.current = next;
        self.revision += 1;
        tracing::info!(path = %self.path.display(), revision = self.revision, "settings saved");
        Ok(())
    }

    fn write(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, toml::to_string_pretty(settings)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("moodcam-settings-{}-{name}", std::process::id()))
            .join("settings.toml")
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.theme, Theme::Dark);
        assert_eq!(s.camera_index, 0);
        assert_eq!(s.detection_interval, 30);
        assert!(s.show_fps);
        assert_eq!(s.detection_quality, DetectionQuality::Balanced);
        assert!(s.save_screenshots);
        assert_eq!(s.min_face_size, 30);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_get_every_key() {
        let s = Settings::default();
        for key in KEYS {
            assert!(s.get(key).is_ok(), "{key}");
        }
        assert_eq!(s.get("theme").unwrap(), SettingValue::Text("dark".into()));
        assert_eq!(s.get("detection_interval").unwrap(), SettingValue::Int(30));
    }

    #[test]
    fn test_unknown_key() {
        let mut s = Settings::default();
        assert!(matches!(s.get("emotion_smoothing"), Err(SettingsError::UnknownKey(_))));
        assert!(matches!(
            s.set("volume", SettingValue::Int(3)),
            Err(SettingsError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_interval_range_enforced() {
        let mut s = Settings::default();
        assert!(s.set("detection_interval", SettingValue::Int(9)).is_err());
        assert!(s.set("detection_interval", SettingValue::Int(101)).is_err());
        assert_eq!(s.detection_interval, 30);
        s.set("detection_interval", SettingValue::Int(100)).unwrap();
        assert_eq!(s.interval(), Duration::from_millis(100));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let mut s = Settings::default();
        assert!(s.set("show_fps", SettingValue::Text("yes".into())).is_err());
        assert!(s.set("camera_index", SettingValue::Int(-1)).is_err());
        assert!(s.set("theme", SettingValue::Text("solarized".into())).is_err());
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_set_from_str() {
        let mut s = Settings::default();
        s.set_from_str("detection_quality", "performance").unwrap();
        s.set_from_str("show_fps", "false").unwrap();
        s.set_from_str("camera_index", "2").unwrap();
        assert_eq!(s.detection_quality, DetectionQuality::Performance);
        assert!(!s.show_fps);
        assert_eq!(s.camera_index, 2);
        assert!(s.set_from_str("camera_index", "two").is_err());
        assert!(s.set_from_str("detection_quality", "ultra").is_err());
    }

    #[test]
    fn test_store_persists_and_bumps_revision() {
        let path = temp_path("persist");
        let _ = std::fs::remove_file(&path);

        let mut store = SettingsStore::load(&path).unwrap();
        assert_eq!(store.revision(), 0);
        assert_eq!(store.settings(), &Settings::default());

        store.set("theme", SettingValue::Text("light".into())).unwrap();
        store.set_from_str("min_face_size", "48").unwrap();
        assert_eq!(store.revision(), 2);

        let reloaded = SettingsStore::load(&path).unwrap();
        assert_eq!(reloaded.settings().theme, Theme::Light);
        assert_eq!(reloaded.settings().min_face_size, 48);

        store.reset().unwrap();
        assert_eq!(store.revision(), 3);
        assert_eq!(SettingsStore::load(&path).unwrap().settings(), &Settings::default());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_failed_set_keeps_revision() {
        let path = temp_path("failed");
        let mut store = SettingsStore::with_defaults(&path);
        assert!(store.set("detection_interval", SettingValue::Int(5)).is_err());
        assert_eq!(store.revision(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "theme = \"light\"\n").unwrap();

        let store = SettingsStore::load(&path).unwrap();
        assert_eq!(store.settings().theme, Theme::Light);
        assert_eq!(store.settings().detection_interval, 30);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_out_of_range_file_rejected() {
        let path = temp_path("range");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "detection_interval = 5000\n").unwrap();

        assert!(matches!(
            SettingsStore::load(&path),
            Err(SettingsError::InvalidValue { .. })
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
