//! Configuration management for Chargerkit
//!
//! This module handles loading, validation, and management of the application
//! configuration from YAML files. Each configured charger carries a driver
//! type plus an opaque key/value map that is handed to the driver factory
//! untouched; drivers decode it into their own typed settings with
//! [`decode_other`].

mod defaults;

use crate::error::{ChargerError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Opaque driver-specific configuration passed through to factories
pub type Other = BTreeMap<String, serde_yaml::Value>;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Configured charger instances
    pub chargers: Vec<ChargerConfig>,
}

/// A single charger instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChargerConfig {
    /// Instance name used to address the charger from the CLI
    pub name: String,

    /// Registered driver type (e.g. `etrel`, `wallbox`, `go-e`)
    #[serde(rename = "type")]
    pub driver: String,

    /// Remaining keys, interpreted by the driver only
    #[serde(flatten)]
    pub other: Other,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console level override
    pub console_level: Option<String>,

    /// Optional file level override
    pub file_level: Option<String>,

    /// Path to log file or log directory
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "chargerkit.yaml",
            "/data/chargerkit.yaml",
            "/etc/chargerkit/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Config::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        crate::logging::parse_log_level(&self.logging.level)?;

        let mut seen = HashSet::new();
        for charger in &self.chargers {
            if charger.name.trim().is_empty() {
                return Err(ChargerError::validation(
                    "chargers.name",
                    "Name cannot be empty",
                ));
            }
            if charger.driver.trim().is_empty() {
                return Err(ChargerError::validation(
                    format!("chargers.{}.type", charger.name),
                    "Driver type cannot be empty".to_string(),
                ));
            }
            if !seen.insert(charger.name.as_str()) {
                return Err(ChargerError::validation(
                    "chargers.name".to_string(),
                    format!("Duplicate charger name: {}", charger.name),
                ));
            }
        }

        Ok(())
    }

    /// Find a configured charger by name
    pub fn charger(&self, name: &str) -> Result<&ChargerConfig> {
        self.chargers
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ChargerError::config(format!("Unknown charger: {}", name)))
    }
}

/// Decode an opaque driver map into a typed driver configuration.
///
/// Unknown keys are rejected when the target type uses
/// `#[serde(deny_unknown_fields)]`.
pub fn decode_other<T: DeserializeOwned>(other: &Other) -> Result<T> {
    let mapping = other
        .iter()
        .map(|(k, v)| (serde_yaml::Value::String(k.to_lowercase()), v.clone()))
        .collect::<serde_yaml::Mapping>();

    serde_yaml::from_value(serde_yaml::Value::Mapping(mapping))
        .map_err(|e| ChargerError::config(format!("Invalid driver configuration: {}", e)))
}
