//! Configuration file support for the breathing coach.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/anb/config.toml`.

use crate::catalog::DEFAULT_PATTERN_ID;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Longest session the coach will run, in minutes
pub const MAX_SESSION_MINUTES: u32 = 600;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub session: SessionDefaults,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub guidance: GuidanceConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Pattern and duration used when a session is started without choices
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionDefaults {
    #[serde(default = "default_pattern")]
    pub default_pattern: String,

    #[serde(default = "default_minutes")]
    pub default_minutes: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            default_pattern: default_pattern(),
            default_minutes: default_minutes(),
        }
    }
}

/// Pauses inserted between cycles
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_inter_cycle_pause_ms")]
    pub inter_cycle_pause_ms: u32,

    #[serde(default = "default_quick_inter_cycle_pause_ms")]
    pub quick_inter_cycle_pause_ms: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            inter_cycle_pause_ms: default_inter_cycle_pause_ms(),
            quick_inter_cycle_pause_ms: default_quick_inter_cycle_pause_ms(),
        }
    }
}

impl TimingConfig {
    /// Inter-cycle pause for a normal or quick session
    pub fn inter_cycle_pause(&self, quick: bool) -> chrono::Duration {
        let ms = if quick {
            self.quick_inter_cycle_pause_ms
        } else {
            self.inter_cycle_pause_ms
        };
        chrono::Duration::milliseconds(i64::from(ms))
    }
}

/// Metric levels below which coaching hints are shown
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GuidanceConfig {
    #[serde(default = "default_posture_threshold")]
    pub posture_threshold: f64,

    #[serde(default = "default_eye_threshold")]
    pub eye_threshold: f64,

    #[serde(default = "default_head_threshold")]
    pub head_threshold: f64,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            posture_threshold: default_posture_threshold(),
            eye_threshold: default_eye_threshold(),
            head_threshold: default_head_threshold(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("anb")
}

fn default_pattern() -> String {
    DEFAULT_PATTERN_ID.into()
}

fn default_minutes() -> u32 {
    15
}

fn default_inter_cycle_pause_ms() -> u32 {
    1500
}

fn default_quick_inter_cycle_pause_ms() -> u32 {
    500
}

fn default_posture_threshold() -> f64 {
    70.0
}

fn default_eye_threshold() -> f64 {
    80.0
}

fn default_head_threshold() -> f64 {
    75.0
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!(
                "No config file found at {:?}, using defaults",
                config_path
            );
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values the session engine cannot run with
    pub fn validate(&self) -> Result<()> {
        let minutes = self.session.default_minutes;
        if minutes == 0 || minutes > MAX_SESSION_MINUTES {
            return Err(Error::Config(format!(
                "session.default_minutes must be between 1 and {}, got {}",
                MAX_SESSION_MINUTES, minutes
            )));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("anb").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
