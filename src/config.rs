//! Configuration for the loyalty core.
//!
//! Supports YAML file and environment variable overrides.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Order tracking synchronizer configuration.
    pub tracking: TrackingConfig,
    /// Domain event bus configuration.
    pub events: EventsConfig,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Storage type (sqlite).
    #[serde(rename = "type")]
    pub storage_type: String,
    /// Path to database file. Use `:memory:` for in-memory.
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: "sqlite".to_string(),
            path: "./data/loyalty.db".to_string(),
        }
    }
}

/// Order tracking synchronizer configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Backstop poll interval in seconds.
    pub poll_interval_secs: u64,
    /// Consecutive poll misses before the order is surfaced as not found.
    pub not_found_threshold: u32,
}

impl TrackingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 15,
            not_found_threshold: 4,
        }
    }
}

/// Domain event bus configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Broadcast channel capacity before lagging subscribers drop events.
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Config file
    /// 3. Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("PATRONAGE_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("STORAGE_PATH") {
            self.storage.path = path;
        }

        if let Ok(secs) = std::env::var("TRACKING_POLL_SECS") {
            if let Ok(s) = secs.parse() {
                self.tracking.poll_interval_secs = s;
            }
        }

        if let Ok(threshold) = std::env::var("TRACKING_NOT_FOUND_THRESHOLD") {
            if let Ok(t) = threshold.parse() {
                self.tracking.not_found_threshold = t;
            }
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{0}': {1}")]
    FileRead(String, String),

    #[error("Failed to parse config: {0}")]
    Parse(String),
}
