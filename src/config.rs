use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::geodesy::DistanceAlgorithm;
use crate::logging::LogConfig;
use crate::persistence::MAX_STREAM_BYTES;

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Summary generator settings
    #[serde(default)]
    pub stats: StatsConfig,

    /// Heartbeat-interval filter defaults
    #[serde(default)]
    pub ibi: IbiConfig,

    /// Persisted-size boundary
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Logging output
    #[serde(default)]
    pub logging: LogConfig,

    /// Device names for binary recordings
    #[serde(default)]
    pub devices: DevicesConfig,
}

/// Summary generator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Minimum altitude change counted towards ascent/descent
    pub gain_threshold: f64,

    /// Decimal places altitude samples are rounded to before differencing
    pub gain_precision: u32,

    /// Algorithm used for track distance
    pub distance_algorithm: DistanceAlgorithm,

    /// Lower limits of zones 2-5 as fractions of the activity maximum
    pub zone_percentages: [f64; 4],
}

/// Heartbeat-interval filter defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IbiConfig {
    pub low_limit_bpm: f64,
    pub high_limit_bpm: f64,
    pub median_window: usize,
    pub low_pass_window: usize,
    pub step: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Serialized-size ceiling per persisted stream
    pub max_stream_bytes: usize,
}

/// Device name settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicesConfig {
    /// TOML registry merged over the built-in manufacturer and product names
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            stats: StatsConfig::default(),
            ibi: IbiConfig::default(),
            persistence: PersistenceConfig::default(),
            logging: LogConfig::default(),
            devices: DevicesConfig::default(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        StatsConfig {
            gain_threshold: 1.5,
            gain_precision: 1,
            distance_algorithm: DistanceAlgorithm::Accurate,
            zone_percentages: [0.6, 0.7, 0.8, 0.9],
        }
    }
}

impl Default for IbiConfig {
    fn default() -> Self {
        IbiConfig {
            low_limit_bpm: 40.0,
            high_limit_bpm: 220.0,
            median_window: 5,
            low_pass_window: 5,
            step: 2,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        PersistenceConfig {
            max_stream_bytes: MAX_STREAM_BYTES,
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sportsrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %err,
                    "No usable config file, using defaults"
                );
                Self::default()
            }
        }
    }
}
