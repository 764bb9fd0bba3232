//! Configuration for the activity fusion agent.

use crate::classifier::{BUNDLED_ACCELEROMETER_MODEL, BUNDLED_FULL_MODEL};
use crate::core::fusion::{SensorSet, DEFAULT_NUM_TIMESTEPS};
use crate::source::{DEFAULT_CHANNEL_CAPACITY, GAME_RATE_INTERVAL};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Timesteps per classification window
    pub num_timesteps: usize,

    /// Which sensors are fused
    pub sensors: SensorSelection,

    /// Model file; the model built into the binary is used when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,

    /// Path for storing telemetry
    pub data_path: PathBuf,

    /// Delivery period of the synthetic source
    #[serde(with = "duration_millis")]
    pub sample_interval: Duration,

    /// Capacity of the sample channel
    pub channel_capacity: usize,

    /// Whether listening is currently paused
    pub paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-fusion-agent");

        Self {
            num_timesteps: DEFAULT_NUM_TIMESTEPS,
            sensors: SensorSelection::default(),
            model_path: None,
            data_path: data_dir,
            sample_interval: GAME_RATE_INTERVAL,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            paused: false,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content).map_err(ConfigError::Parse)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-fusion-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_path)?;
        Ok(())
    }

    /// Human-readable description of the model that `run` will load.
    pub fn model_description(&self) -> String {
        match &self.model_path {
            Some(path) => path.display().to_string(),
            None => format!("bundled ({})", self.sensors),
        }
    }

    /// Path of the persisted telemetry counters.
    pub fn telemetry_path(&self) -> PathBuf {
        self.data_path.join("telemetry.json")
    }
}

/// The supported active sensor sets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorSelection {
    /// Accelerometer only
    Accelerometer,
    /// Accelerometer, linear acceleration and rotation vector
    #[default]
    Full,
}

impl SensorSelection {
    pub fn sensor_set(self) -> SensorSet {
        match self {
            SensorSelection::Accelerometer => SensorSet::accelerometer_only(),
            SensorSelection::Full => SensorSet::full(),
        }
    }

    /// Bundled model matching this selection.
    pub fn bundled_model(self) -> &'static [u8] {
        match self {
            SensorSelection::Accelerometer => BUNDLED_ACCELEROMETER_MODEL,
            SensorSelection::Full => BUNDLED_FULL_MODEL,
        }
    }
}

impl fmt::Display for SensorSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorSelection::Accelerometer => f.write_str("accelerometer"),
            SensorSelection::Full => f.write_str("full"),
        }
    }
}

impl FromStr for SensorSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "accelerometer" | "acc" => Ok(SensorSelection::Accelerometer),
            "full" | "all" => Ok(SensorSelection::Full),
            other => Err(format!(
                "unknown sensor selection '{other}' (expected accelerometer or full)"
            )),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(serde_json::Error),

    #[error("Serialize error: {0}")]
    Serialize(serde_json::Error),
}

/// Serde support for Duration as whole milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierLoader, LinearLoader};

    #[test]
    fn test_sensor_selection_parsing() {
        assert_eq!("acc".parse::<SensorSelection>(), Ok(SensorSelection::Accelerometer));
        assert_eq!("Full".parse::<SensorSelection>(), Ok(SensorSelection::Full));
        assert_eq!("all".parse::<SensorSelection>(), Ok(SensorSelection::Full));
        assert!("gyro".parse::<SensorSelection>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.num_timesteps, 128);
        assert_eq!(config.sensors, SensorSelection::Full);
        assert_eq!(config.sample_interval, Duration::from_millis(20));
        assert!(!config.paused);
        assert!(config.model_path.is_none());
        assert_eq!(config.model_description(), "bundled (full)");
    }

    #[test]
    fn test_bundled_model_fits_every_selection() {
        // Embedded at build time, so loading never touches the working directory
        for selection in [SensorSelection::Accelerometer, SensorSelection::Full] {
            let loader = LinearLoader::for_sensors(&selection.sensor_set());
            assert!(
                loader.load(selection.bundled_model()).is_ok(),
                "bundled model for {selection} does not load"
            );
        }
        assert_eq!(SensorSelection::Accelerometer.sensor_set().row_width(), 3);
    }

    #[test]
    fn test_explicit_model_path_is_described() {
        let config = Config {
            model_path: Some(PathBuf::from("/opt/models/custom.json")),
            ..Config::default()
        };
        assert_eq!(config.model_description(), "/opt/models/custom.json");
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = Config {
            num_timesteps: 64,
            model_path: Some(PathBuf::from("/tmp/model.json")),
            ..Config::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"sample_interval\":20"));
        assert!(json.contains("\"sensors\":\"full\""));

        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.num_timesteps, 64);
        assert_eq!(parsed.model_path, config.model_path);
        assert_eq!(parsed.sample_interval, Duration::from_millis(20));
    }
}
