/*!
 * Configuration management for linux-driver-management.
 *
 * Configuration is layered: built-in defaults, then an optional TOML file,
 * then environment variables (`LDM__SECTION__KEY`).
 */
use std::path::Path;

use config::{Config as ConfigLib, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Daemon configuration
    #[serde(default)]
    pub daemon: DaemonConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, ldm_daemon=debug, ...)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to print the event target alongside each message
    #[serde(default = "default_with_target")]
    pub with_target: bool,
}

/// Daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Root of the sysfs mount scanned for devices
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: String,

    /// Whether observers are told about devices found by the initial scan
    #[serde(default = "default_notify_initial_scan")]
    pub notify_initial_scan: bool,

    /// Capacity of the steady-state event queue
    #[serde(default = "default_event_queue")]
    pub event_queue: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            with_target: default_with_target(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_sysfs_root(),
            notify_initial_scan: default_notify_initial_scan(),
            event_queue: default_event_queue(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_with_target() -> bool {
    true
}

fn default_sysfs_root() -> String {
    "/sys".to_string()
}

fn default_notify_initial_scan() -> bool {
    true
}

fn default_event_queue() -> usize {
    256
}

impl Config {
    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }
}

/// A builder for creating a configuration
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_file: Option<String>,
    environment_prefix: Option<String>,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config file path
    pub fn with_config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_string_lossy().to_string());
        self
    }

    /// Set the environment variable prefix for configuration
    pub fn with_environment_prefix<S: AsRef<str>>(mut self, prefix: S) -> Self {
        self.environment_prefix = Some(prefix.as_ref().to_string());
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<Config> {
        let mut config_builder = ConfigLib::builder();

        let default_config = Config::default();
        config_builder = config_builder.add_source(
            ConfigLib::try_from(&default_config)
                .map_err(|e| Error::config(format!("Failed to create default config: {}", e)))?,
        );

        if let Some(config_file) = self.config_file {
            let path = Path::new(&config_file);
            if path.exists() {
                debug!("Loading configuration from {}", config_file);
                config_builder = config_builder.add_source(File::with_name(&config_file));
            } else {
                debug!("Configuration file {} does not exist, using defaults", config_file);
            }
        }

        if let Some(prefix) = self.environment_prefix {
            debug!("Loading configuration from environment variables with prefix {}", prefix);
            config_builder = config_builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config_lib = config_builder
            .build()
            .map_err(|e| Error::config(format!("Failed to build configuration: {}", e)))?;

        let config: Config = config_lib
            .try_deserialize()
            .map_err(|e| Error::config(format!("Failed to deserialize configuration: {}", e)))?;

        if config.daemon.event_queue == 0 {
            return Err(Error::config("daemon.event_queue must be greater than zero"));
        }

        info!("Configuration loaded successfully");
        Ok(config)
    }
}
