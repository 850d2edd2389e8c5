//! # Engine Configuration
//!
//! All tunables of the engine in one serde-backed struct. Every field has a default,
//! so a config file only needs the values it changes:
//!
//! ```json
//! { "generator": { "max_attempts": 500 }, "environment": { "passes_per_call": 16 } }
//! ```

use std::{error::Error, fmt, fs, io, path::Path};

use log::info;
use serde::{Deserialize, Serialize};

use super::voxels::{environment::EnvironmentConfig, generator::GeneratorConfig};

/// Errors raised while loading a config file.
#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(_) => None,
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(e: io::Error) -> Self {
        ConfigError::Io(e)
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub generator: GeneratorConfig,
    pub environment: EnvironmentConfig,
    /// Radius of the visible chunk queue around the observer, in chunks.
    pub view_radius_chunks: i32,
    /// Fixed update rate of the optimizer loop.
    pub tick_rate_hz: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            generator: GeneratorConfig::default(),
            environment: EnvironmentConfig::default(),
            view_radius_chunks: 4,
            tick_rate_hz: 60.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config.normalized())
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config = Self::from_json_str(&fs::read_to_string(path)?)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn normalized(mut self) -> Self {
        self.environment = self.environment.normalized();
        self.view_radius_chunks = self.view_radius_chunks.max(0);
        if self.tick_rate_hz.is_nan() || self.tick_rate_hz <= 0.0 {
            self.tick_rate_hz = EngineConfig::default().tick_rate_hz;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(
            r#"{ "generator": { "max_attempts": 12 }, "environment": { "passes_per_call": 10 } }"#,
        )
        .unwrap();
        assert_eq!(config.generator.max_attempts, 12);
        assert_eq!(config.generator.random_fraction, 0.16);
        assert_eq!(config.environment.passes_per_call, 8);
        assert_eq!(config.view_radius_chunks, 4);
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(matches!(
            EngineConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            EngineConfig::from_json_file("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
