//! holosync configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Color3;
use crate::events::DEFAULT_CHANNEL_CAPACITY;
use crate::session::ParticipantSettings;
use crate::store::StoreConfig;
use crate::throttle::ThrottleConfig;

/// Main holosync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Replicated store channels
    pub store: StoreConfig,

    /// Manipulation broadcast throttle
    pub throttle: ThrottleConfig,

    /// Local event bus
    pub events: EventsConfig,

    /// Rendering appearance
    pub appearance: AppearanceConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .holosync.yml
        let local_config = PathBuf::from(".holosync.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/holosync/holosync.yml
        if let Some(user_config) = Self::user_config_path()
            && user_config.exists()
        {
            match Self::load_from_file(&user_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    ///
    /// Any failure yields None; the full load afterwards reports it.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => [Some(PathBuf::from(".holosync.yml")), Self::user_config_path()]
                .into_iter()
                .flatten()
                .collect(),
        };

        candidates
            .iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("holosync").join("holosync.yml"))
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Per-participant settings derived from this configuration
    pub fn participant_settings(&self) -> ParticipantSettings {
        ParticipantSettings {
            throttle: self.throttle.clone(),
            bus_capacity: self.events.bus_capacity,
            remote_control_color: self.appearance.remote_control_color,
        }
    }

    /// Render as YAML for `hs config`
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// Local event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the slowest one lags
    #[serde(rename = "bus-capacity")]
    pub bus_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            bus_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Rendering appearance
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceConfig {
    /// Highlight on holograms another participant is manipulating
    #[serde(rename = "remote-control-color")]
    pub remote_control_color: Color3,
}

impl Default for AppearanceConfig {
    fn default() -> Self {
        Self {
            remote_control_color: Color3::remote_control(),
        }
    }
}
