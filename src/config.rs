//! Application configuration for the `hidmapper` binary
//!
//! ```toml
//! profiles_dir = "profiles"
//! capture_dir = "captures"
//!
//! [settings.device]
//! left_stick_deadzone = 0.1
//!
//! [[mappings]]
//! device = "arcade.hex"
//! family = "arcade"
//! ```
//!
//! Relative directories are resolved against the directory holding the file.

use crate::device::DeviceInfo;
use crate::profile::GENERIC_FAMILY;
use crate::settings::SettingsFile;
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "hidmapper";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub profiles_dir: PathBuf,
    pub capture_dir: PathBuf,
    pub settings: SettingsFile,
    pub mappings: Vec<DeviceMapping>,
}

/// Binds a device path (or capture file name) to a controller family
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceMapping {
    pub device: String,
    #[serde(default = "default_family")]
    pub family: String,
}

fn default_family() -> String {
    GENERIC_FAMILY.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        let base = app_dir();
        Self {
            profiles_dir: base.join("profiles"),
            capture_dir: base.join("captures"),
            settings: SettingsFile::default(),
            mappings: Vec::new(),
        }
    }
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

impl AppConfig {
    /// `<config_dir>/hidmapper/config.toml`
    pub fn default_path() -> PathBuf {
        app_dir().join(CONFIG_FILE)
    }

    /// Parses config text without resolving relative directories
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))
    }

    /// Loads `path`, falling back to defaults when the file does not exist
    pub async fn load(path: &Path) -> Result<Self> {
        if !tokio::fs::try_exists(path)
            .await
            .map_err(|e| eyre!("Failed to check {}: {}", path.display(), e))?
        {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| eyre!("Failed to read {}: {}", path.display(), e))?;
        let mut config = Self::from_toml(&content)?;

        if let Some(base) = path.parent() {
            config.profiles_dir = resolve(base, &config.profiles_dir);
            config.capture_dir = resolve(base, &config.capture_dir);
        }
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Family configured for `device`, matched by full path or file name
    pub fn family_for(&self, device: &DeviceInfo) -> Option<&str> {
        let file_name = Path::new(&device.path)
            .file_name()
            .and_then(|name| name.to_str());

        self.mappings
            .iter()
            .find(|mapping| {
                mapping.device == device.path || Some(mapping.device.as_str()) == file_name
            })
            .map(|mapping| mapping.family.as_str())
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
