//! Remembered stream settings
//!
//! When enabled, the last committed settings are written to disk and used as
//! the picker defaults the next time it opens.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::settings::StreamSettings;
use crate::Result;

/// On-disk record of the last commit
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SavedSettings {
    settings: StreamSettings,
    /// RFC 3339 timestamp of the commit (for debugging)
    #[serde(default)]
    last_used: String,
}

/// JSON file holding the last committed settings
#[derive(Debug, Clone)]
pub struct LastSettingsStore {
    path: PathBuf,
}

impl LastSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the user's data directory
    pub fn default_location() -> Self {
        Self::new(
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from(".local/share"))
                .join("cosmic/cosmic-ext-share/last_settings.json"),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Previously saved settings; `None` if missing or unreadable
    pub fn load(&self) -> Option<StreamSettings> {
        let contents = fs::read_to_string(&self.path).ok()?;
        let saved: SavedSettings = serde_json::from_str(&contents).ok()?;
        debug!("Loaded last stream settings from {}", self.path.display());
        Some(saved.settings)
    }

    pub fn save(&self, settings: &StreamSettings) -> Result<()> {
        let saved = SavedSettings {
            settings: settings.clone(),
            last_used: chrono::Utc::now().to_rfc3339(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_string_pretty(&saved)?)?;
        debug!("Saved stream settings to {}", self.path.display());
        Ok(())
    }

    pub fn clear(&self) {
        if fs::remove_file(&self.path).is_ok() {
            debug!("Cleared saved stream settings at {}", self.path.display());
        }
    }
}
