//! Picker Configuration
//!
//! TOML configuration for the picker binary.

use anyhow::{Context, Result};
use cosmic_ext_share_core::constraints::DEFAULT_RECONCILE_DELAY;
use cosmic_ext_share_core::{CoordinatorConfig, PickerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Picker configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Picker defaults
    #[serde(default)]
    pub picker: PickerConfig,

    /// Track reconciliation
    #[serde(default)]
    pub reconcile: ReconcileConfig,

    /// Virtual microphone
    #[serde(default)]
    pub virtual_mic: VirtualMicConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Delay before the video track is reconciled, in milliseconds
    #[serde(default = "default_reconcile_delay_ms")]
    pub delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VirtualMicConfig {
    /// Create a virtual microphone for streams with audio
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_reconcile_delay_ms() -> u64 {
    DEFAULT_RECONCILE_DELAY.as_millis() as u64
}

fn default_true() -> bool {
    true
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            delay_ms: default_reconcile_delay_ms(),
        }
    }
}

impl Default for VirtualMicConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl ReconcileConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Config {
    /// Default configuration file location
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("cosmic")
            .join("cosmic-ext-share")
            .join("picker.toml")
    }

    /// Load configuration from file, creating default if not found
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            picker: self.picker.clone(),
            reconcile_delay: self.reconcile.delay(),
        }
    }
}
