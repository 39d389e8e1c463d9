//! Configuration loading with file-backed defaults using figment.
//!
//! Precedence, lowest to highest:
//! 1. Embedded defaults
//! 2. Service configuration file (TOML)
//! 3. Environment variables (`<COMPONENT>_*`)
//!
//! On first run with a missing file, the loader writes out a default-valued
//! file before reading it back, so subsequent runs see a stable, editable
//! configuration on disk.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] figment::Error),

    #[error("Failed to write default configuration: {0}")]
    WriteDefaults(#[from] toml::ser::Error),

    #[error("IO error reading configuration: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration validation failed: {message}")]
    ValidationError { message: String },
}

/// Main configuration structure for courier services.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Config {
    /// Broker connection configuration
    pub broker: BrokerConfig,
    /// Local logging configuration
    pub logging: LoggingConfig,
}

/// Broker connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Broker host name or IP address
    pub host: String,
    /// Broker TCP port
    pub port: u16,
    /// MQTT keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Bound of the inbound message channel between the connection and the
    /// dispatch loop
    pub channel_capacity: usize,
}

/// Local logging configuration.
///
/// Controls process-local tracing output only; structured log packets on the
/// bus `LOG` topic are unaffected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, human)
    pub format: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 1883,
            keep_alive_secs: 30,
            channel_capacity: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "human".to_owned(),
        }
    }
}

impl Config {
    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broker.host.is_empty() {
            return Err(ConfigError::ValidationError {
                message: "broker.host must not be empty".to_owned(),
            });
        }
        if self.broker.port == 0 {
            return Err(ConfigError::ValidationError {
                message: "broker.port must be non-zero".to_owned(),
            });
        }
        if self.broker.channel_capacity == 0 {
            return Err(ConfigError::ValidationError {
                message: "broker.channel_capacity must be non-zero".to_owned(),
            });
        }
        Ok(())
    }
}

/// Configuration loader with file-backed defaults and env overrides.
pub struct ConfigLoader {
    component: String,
    config_path: PathBuf,
}

impl ConfigLoader {
    /// Create a loader for the specified component, reading
    /// `<component>.toml` from the working directory.
    pub fn new(component: &str) -> Self {
        Self {
            component: component.to_owned(),
            config_path: PathBuf::from(format!("{component}.toml")),
        }
    }

    /// Create a loader reading an explicit configuration file path.
    pub fn with_path(component: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            component: component.to_owned(),
            config_path: path.into(),
        }
    }

    /// Path of the backing configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration, writing out a default-valued file first if none
    /// exists yet.
    pub fn load(&self) -> Result<Config, ConfigError> {
        if !self.config_path.exists() {
            self.write_defaults()?;
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&self.config_path))
            .merge(Env::prefixed(&self.env_prefix()))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    fn write_defaults(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let rendered = toml::to_string_pretty(&Config::default())?;
        std::fs::write(&self.config_path, rendered)?;
        Ok(())
    }

    fn env_prefix(&self) -> String {
        format!("{}_", self.component.to_uppercase().replace('-', "_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.broker.host, "127.0.0.1");
        assert_eq!(config.broker.port, 1883);
    }

    #[test]
    fn test_missing_file_is_written_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("svc.toml");

        let loader = ConfigLoader::with_path("svc", &path);
        let config = loader.load().unwrap();

        assert_eq!(config, Config::default());
        assert!(path.exists());

        // The written file must read back to the same configuration.
        let reread = ConfigLoader::with_path("svc", &path).load().unwrap();
        assert_eq!(reread, config);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("svc.toml");
        std::fs::write(
            &path,
            "[broker]\nhost = \"broker.internal\"\nport = 8883\n",
        )
        .unwrap();

        let config = ConfigLoader::with_path("svc", &path).load().unwrap();
        assert_eq!(config.broker.host, "broker.internal");
        assert_eq!(config.broker.port, 8883);
        // Unspecified fields keep their defaults.
        assert_eq!(config.broker.keep_alive_secs, 30);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_empty_host() {
        let mut config = Config::default();
        config.broker.host.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let mut config = Config::default();
        config.broker.channel_capacity = 0;
        assert!(config.validate().is_err());
    }
}
