//! Configuration management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ChainrunError, Result};

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainrunConfig {
    /// Manager configuration
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Default log sink directory for jobs that do not override it
    #[serde(default)]
    pub log_output_directory: Option<PathBuf>,

    /// Interval between readiness scans and idle checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Length of one time unit used by job timeout, delay and backoff (milliseconds)
    #[serde(default = "default_time_unit_ms")]
    pub time_unit_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            log_output_directory: None,
            poll_interval_ms: default_poll_interval_ms(),
            time_unit_ms: default_time_unit_ms(),
        }
    }
}

impl ManagerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn time_unit(&self) -> Duration {
        Duration::from_millis(self.time_unit_ms)
    }

    /// Set the default log directory.
    pub fn with_log_output_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_output_directory = Some(dir.into());
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_time_unit_ms(mut self, ms: u64) -> Self {
        self.time_unit_ms = ms;
        self
    }

    /// Reject zero intervals: a zero time unit turns every timeout into an
    /// immediate kill, and a zero poll interval spins.
    pub fn validate(&self) -> Result<()> {
        if self.time_unit_ms == 0 {
            return Err(ChainrunError::configuration("manager.time_unit_ms must be at least 1")
                .with_context("time_unit_ms", self.time_unit_ms));
        }
        if self.poll_interval_ms == 0 {
            return Err(ChainrunError::configuration("manager.poll_interval_ms must be at least 1")
                .with_context("poll_interval_ms", self.poll_interval_ms));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for structured logging
    Json,
    /// Pretty format for terminals
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

// Default value functions
fn default_poll_interval_ms() -> u64 { 1000 }
fn default_time_unit_ms() -> u64 { 1000 }
fn default_log_level() -> String { "info".to_string() }

impl ChainrunConfig {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CHAINRUN").separator("__"))
            .build()?;

        let cfg: ChainrunConfig = config.try_deserialize()?;
        cfg.manager.validate()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with environment overrides on top.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("CHAINRUN").separator("__"))
            .build()?;

        let cfg: ChainrunConfig = config.try_deserialize()?;
        cfg.manager.validate()?;
        Ok(cfg)
    }
}
