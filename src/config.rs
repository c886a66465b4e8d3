use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

const CONFIG_DIR_NAME: &str = "NativeAudio";
const CONFIG_FILE_NAME: &str = "config.json";

fn default_fade_ms() -> u64 {
    1000
}

fn default_volume() -> f32 {
    1.0
}

fn default_channels() -> usize {
    1
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fade duration used when a fade is requested without an explicit duration
    #[serde(default = "default_fade_ms")]
    pub default_fade_ms: u64,

    /// Volume applied on load when the caller does not pass one (0.0-1.0)
    #[serde(default = "default_volume")]
    pub default_volume: f32,

    /// Channel count used on load when the caller does not pass one
    #[serde(default = "default_channels")]
    pub default_channels: usize,

    /// React to audio focus / interruption signals
    #[serde(default = "default_true")]
    pub focus: bool,

    /// Keep playing while the app is in the background
    #[serde(default)]
    pub background: bool,

    /// Default tracing filter for the demo binary
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_fade_ms: default_fade_ms(),
            default_volume: default_volume(),
            default_channels: default_channels(),
            focus: true,
            background: false,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the platform-specific config directory.
    /// Creates default config if file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if path.exists() {
            let config = Self::load_from(&path)?;
            tracing::info!("Loaded config from: {}", path.display());
            Ok(config)
        } else {
            let config = EngineConfig::default();
            config.save_to(&path)?;
            tracing::info!("Created default config at: {}", path.display());
            Ok(config)
        }
    }

    /// Load and validate a configuration file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the platform-specific config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::DirectoryCreationFailed {
                path: parent.display().to_string(),
                source: e,
            })?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        fs::write(path, json).map_err(|e| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            return Err(ConfigError::Invalid(format!(
                "default_volume must be 0.0-1.0, got {}",
                self.default_volume
            )));
        }
        if self.default_channels == 0 {
            return Err(ConfigError::Invalid(
                "default_channels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Directory holding config and logs
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Fade duration in seconds, as accepted by the play/stop options
    pub fn default_fade_secs(&self) -> f64 {
        self.default_fade_ms as f64 / 1000.0
    }
}
