//! Application settings

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use beacon_mux::BroadcastConfig;
use serde::{Deserialize, Serialize};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Slot count, admission ceiling and rotation interval
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    /// Beacon list location; defaults to `beacons.json` next to the settings
    #[serde(default)]
    pub beacons_file: Option<PathBuf>,
}

impl Settings {
    /// Get the XDG config directory for beaconcast
    /// Uses $XDG_CONFIG_HOME/beaconcast on Linux/macOS, falls back to ~/.config/beaconcast
    pub fn config_dir() -> Option<PathBuf> {
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_config);
            if path.is_absolute() {
                return Some(path.join("beaconcast"));
            }
        }

        dirs::home_dir().map(|h| h.join(".config").join("beaconcast"))
    }

    /// Get the settings file path
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("settings.json"))
    }

    /// Beacon list path
    pub fn beacons_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.beacons_file {
            return Ok(path.clone());
        }
        Self::config_dir()
            .map(|p| p.join("beacons.json"))
            .context("Could not determine config directory")
    }

    /// Load settings from disk, falling back to defaults
    pub fn load() -> Self {
        Self::settings_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Load settings from a specific file, falling back to defaults
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| match serde_json::from_str(&s) {
                Ok(settings) => Some(settings),
                Err(e) => {
                    tracing::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Save settings to disk
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::settings_path().context("Could not determine settings path")?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Save settings to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create settings directory")?;
        }

        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, json).context("Failed to write settings")?;

        Ok(())
    }
}
