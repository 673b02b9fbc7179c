//! Configuration loading and management
//!
//! Runtime paths and tunables come from the environment and defaults. The
//! hotkey settings live in a small JSON key/value file; each key falls back
//! to its default on its own.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gesture::GestureTiming;
use crate::interceptor::RetryPolicy;
use crate::selection::DEFAULT_SETTLE_DELAY;
use crate::shortcut::{KeyboardShortcut, ModifierSet, PressMode};

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SELECTION_HOTKEYD_DATA_DIR";
/// Environment variable overriding the clipboard settle delay (milliseconds)
pub const SETTLE_DELAY_ENV: &str = "SELECTION_HOTKEYD_SETTLE_MS";

const SETTINGS_FILE: &str = "settings.json";

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for runtime data
    pub data_dir: PathBuf,

    /// Path of the persisted hotkey settings
    pub settings_path: PathBuf,

    /// Wait after the synthetic copy before reading the clipboard
    pub settle_delay: Duration,

    /// Recognizer timing
    pub timing: GestureTiming,

    /// Backoff for event tap creation
    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => {
                let home = std::env::var("HOME").context("HOME is not set")?;
                PathBuf::from(&home)
                    .join(".local")
                    .join("share")
                    .join("selection-hotkeyd")
            }
        };

        let settle_delay = match std::env::var(SETTLE_DELAY_ENV) {
            Ok(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .with_context(|| format!("{} must be a number of milliseconds", SETTLE_DELAY_ENV))?,
            Err(_) => DEFAULT_SETTLE_DELAY,
        };

        Ok(Self::with_data_dir(data_dir).with_settle_delay(settle_delay))
    }

    /// Defaults rooted at the given data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            settings_path: data_dir.join(SETTINGS_FILE),
            data_dir,
            settle_delay: DEFAULT_SETTLE_DELAY,
            timing: GestureTiming::default(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Ensure data directory exists
    pub fn ensure_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("failed to create {}", self.data_dir.display()))?;
        Ok(())
    }

    /// Read the persisted hotkey settings.
    ///
    /// A missing file yields defaults. An unreadable or malformed file is
    /// logged and also yields defaults; it is never fatal.
    pub fn load_settings(&self) -> HotkeySettings {
        match read_settings(&self.settings_path) {
            Ok(Some(settings)) => settings,
            Ok(None) => {
                debug!(path = ?self.settings_path, "no settings file, using defaults");
                HotkeySettings::default()
            }
            Err(e) => {
                warn!(?e, path = ?self.settings_path, "ignoring unreadable settings file");
                HotkeySettings::default()
            }
        }
    }

    /// Persist the hotkey settings as a whole
    pub fn save_settings(&self, settings: &HotkeySettings) -> Result<()> {
        self.ensure_dirs()?;
        let json = serde_json::to_string_pretty(&StoredSettings::from(settings))?;
        std::fs::write(&self.settings_path, json)
            .with_context(|| format!("failed to write {}", self.settings_path.display()))?;
        debug!(path = ?self.settings_path, "settings saved");
        Ok(())
    }
}

/// The user-configurable popup binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotkeySettings {
    pub shortcut: KeyboardShortcut,
    pub press_mode: PressMode,
}

/// On-disk form; every key is optional and defaulted independently
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shortcut_key_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    shortcut_modifiers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    press_mode: Option<String>,
}

impl From<&HotkeySettings> for StoredSettings {
    fn from(settings: &HotkeySettings) -> Self {
        Self {
            shortcut_key_code: Some(settings.shortcut.key_code),
            shortcut_modifiers: Some(settings.shortcut.modifiers.bits()),
            press_mode: Some(settings.press_mode.as_str().to_string()),
        }
    }
}

impl StoredSettings {
    fn resolve(self) -> HotkeySettings {
        let default = HotkeySettings::default();
        let press_mode = match self.press_mode.as_deref() {
            Some(raw) => PressMode::parse(raw).unwrap_or_else(|| {
                warn!(value = raw, "unknown press mode in settings, using default");
                default.press_mode
            }),
            None => default.press_mode,
        };

        HotkeySettings {
            shortcut: KeyboardShortcut::new(
                self.shortcut_key_code.unwrap_or(default.shortcut.key_code),
                self.shortcut_modifiers
                    .map(ModifierSet::from_bits_truncate)
                    .unwrap_or(default.shortcut.modifiers),
            ),
            press_mode,
        }
    }
}

fn read_settings(path: &Path) -> Result<Option<HotkeySettings>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", path.display())),
    };
    let stored: StoredSettings =
        serde_json::from_str(&raw).with_context(|| format!("malformed {}", path.display()))?;
    Ok(Some(stored.resolve()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcut::keycode;
    use tempfile::TempDir;

    #[test]
    fn test_config_load() {
        let config = Config::load().unwrap();
        assert!(config.settings_path.ends_with(SETTINGS_FILE));
        assert!(config.settings_path.starts_with(&config.data_dir));
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path());
        let settings = config.load_settings();
        assert_eq!(settings.shortcut, KeyboardShortcut::command(keycode::C));
        assert_eq!(settings.press_mode, PressMode::DoublePress);
    }

    #[test]
    fn test_keys_default_independently() {
        let stored: StoredSettings =
            serde_json::from_str(r#"{ "press_mode": "single_press" }"#).unwrap();
        let settings = stored.resolve();
        assert_eq!(settings.shortcut, KeyboardShortcut::default_popup());
        assert_eq!(settings.press_mode, PressMode::SinglePress);

        let stored: StoredSettings =
            serde_json::from_str(r#"{ "shortcut_key_code": 14 }"#).unwrap();
        let settings = stored.resolve();
        assert_eq!(settings.shortcut, KeyboardShortcut::command(14));
        assert_eq!(settings.press_mode, PressMode::DoublePress);
    }

    #[test]
    fn test_unknown_press_mode_defaults() {
        let stored: StoredSettings =
            serde_json::from_str(r#"{ "press_mode": "triple_press", "shortcut_modifiers": 3 }"#)
                .unwrap();
        let settings = stored.resolve();
        assert_eq!(settings.press_mode, PressMode::DoublePress);
        assert_eq!(
            settings.shortcut.modifiers,
            ModifierSet::COMMAND | ModifierSet::SHIFT
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path().join("nested"));
        let settings = HotkeySettings {
            shortcut: KeyboardShortcut::new(14, ModifierSet::COMMAND | ModifierSet::OPTION),
            press_mode: PressMode::SinglePress,
        };

        config.save_settings(&settings).unwrap();
        assert_eq!(config.load_settings(), settings);
    }

    #[test]
    fn test_malformed_file_is_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::with_data_dir(dir.path());
        config.ensure_dirs().unwrap();
        std::fs::write(&config.settings_path, "{ not json").unwrap();

        assert_eq!(config.load_settings(), HotkeySettings::default());
    }
}
