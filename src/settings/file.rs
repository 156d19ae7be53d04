//! TOML settings file
//!
//! ```toml
//! [device]
//! left_stick_deadzone = 0.1
//! right_stick_deadzone = 0.15
//! left_invert_y = true
//!
//! [mouse]
//! enabled = false
//! sensitivity = 1.5
//!
//! [polling]
//! interval_ms = 8.0
//! ```
//!
//! Missing sections and keys take their defaults.

use super::{
    SettingsProvider, StickInversion, DEFAULT_DEADZONE, DEFAULT_MOUSE_SENSITIVITY,
    DEFAULT_POLLING_INTERVAL_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Settings I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SettingsFile {
    pub device: DeviceSection,
    pub mouse: MouseSection,
    pub polling: PollingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    pub left_stick_deadzone: f64,
    pub right_stick_deadzone: f64,
    pub left_invert_x: bool,
    pub left_invert_y: bool,
    pub right_invert_x: bool,
    pub right_invert_y: bool,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            left_stick_deadzone: DEFAULT_DEADZONE,
            right_stick_deadzone: DEFAULT_DEADZONE,
            left_invert_x: false,
            left_invert_y: false,
            right_invert_x: false,
            right_invert_y: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MouseSection {
    pub enabled: bool,
    pub sensitivity: f64,
}

impl Default for MouseSection {
    fn default() -> Self {
        Self {
            enabled: false,
            sensitivity: DEFAULT_MOUSE_SENSITIVITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_ms: f64,
}

impl Default for PollingSection {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLLING_INTERVAL_MS,
        }
    }
}

impl SettingsFile {
    /// Parses a settings file; missing sections and keys take their defaults
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        toml::from_str(content).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        toml::to_string_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))
    }

    /// Reads the file, or returns defaults when it does not exist yet
    pub async fn load(path: &Path) -> Result<Self, SettingsError> {
        let exists = tokio::fs::try_exists(path)
            .await
            .map_err(|e| io_error(path, e))?;
        if !exists {
            info!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| io_error(path, e))?;
        let settings = Self::from_toml(&content)?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    pub async fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }
        tokio::fs::write(path, self.to_toml()?)
            .await
            .map_err(|e| io_error(path, e))?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.display().to_string(),
        source,
    }
}

impl SettingsProvider for SettingsFile {
    fn deadzones(&self) -> (f64, f64) {
        (
            self.device.left_stick_deadzone,
            self.device.right_stick_deadzone,
        )
    }

    fn inversion(&self) -> (StickInversion, StickInversion) {
        (
            StickInversion {
                x: self.device.left_invert_x,
                y: self.device.left_invert_y,
            },
            StickInversion {
                x: self.device.right_invert_x,
                y: self.device.right_invert_y,
            },
        )
    }

    fn mouse_mode(&self) -> bool {
        self.mouse.enabled
    }

    fn mouse_sensitivity(&self) -> f64 {
        self.mouse.sensitivity
    }

    fn polling_interval_ms(&self) -> f64 {
        self.polling.interval_ms
    }
}
