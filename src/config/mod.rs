//! Configuration module for the ADC sampling driver
//!
//! This module handles the driver configuration:
//! - The deployment's base handle, requested channel mask and sampling interval
//! - Converter backend selection ([`HalConfig`])
//! - Self-test timing
//! - Logging filter and optional log directory
//!
//! # Config Location
//!
//! When no path is given the driver looks for `adc.toml` in the
//! platform-appropriate config directory under `adc-sampler`:
//! - **Linux**: `~/.config/adc-sampler/adc.toml`
//! - **macOS**: `~/Library/Application Support/adc-sampler/adc.toml`
//! - **Windows**: `%APPDATA%\adc-sampler\adc.toml`
//!
//! Files ending in `.json` are parsed as JSON, everything else as TOML.
//!
//! # Example
//!
//! ```toml
//! [driver]
//! base_address = 0
//! channel_mask = 0x0000_00ff
//! interval_us = 10000
//!
//! [hal]
//! backend = "simulated"
//! reference_voltage = 3.3
//!
//! [self_test]
//! iterations = 20
//! poll_interval_ms = 500
//! ```

pub mod hal;

pub use hal::*;

use crate::error::{AdcError, Result, ResultExt};
use crate::types::DEFAULT_INTERVAL;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config directories
pub const APP_ID: &str = "adc-sampler";

/// Config filename
pub const CONFIG_FILE: &str = "adc.toml";

/// Default requested channel mask (channels 0-7)
pub const DEFAULT_CHANNEL_MASK: u32 = 0x0000_00FF;

/// Default number of self-test polling rounds
pub const DEFAULT_SELF_TEST_ITERATIONS: u32 = 20;

/// Default delay between self-test polls in milliseconds
pub const DEFAULT_SELF_TEST_POLL_MS: u64 = 500;

/// Default wait for the first report in milliseconds
pub const DEFAULT_SELF_TEST_INITIAL_WAIT_MS: u64 = 20;

/// Default time `stop` waits for the worker to finish, in milliseconds
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 1000;

/// Default tracing filter
pub const DEFAULT_LOG_FILTER: &str = "info,adc_sampler=debug";

/// Get the default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

// ==================== Driver Config ====================

/// Deployment settings of the sampling engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Converter base handle
    #[serde(default)]
    pub base_address: u32,

    /// Requested channels, bit N = channel N
    #[serde(default = "default_channel_mask")]
    pub channel_mask: u32,

    /// Sampling period in microseconds, also used as the initial delay
    #[serde(default = "default_interval_us")]
    pub interval_us: u64,

    /// How long `stop` waits for the worker thread
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            base_address: 0,
            channel_mask: DEFAULT_CHANNEL_MASK,
            interval_us: default_interval_us(),
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
        }
    }
}

impl DriverConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_micros(self.interval_us.max(1))
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

// ==================== Self-Test Config ====================

/// Timing of the self-test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfTestConfig {
    #[serde(default = "default_self_test_iterations")]
    pub iterations: u32,

    #[serde(default = "default_self_test_poll_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_self_test_initial_wait_ms")]
    pub initial_wait_ms: u64,
}

impl Default for SelfTestConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SELF_TEST_ITERATIONS,
            poll_interval_ms: DEFAULT_SELF_TEST_POLL_MS,
            initial_wait_ms: DEFAULT_SELF_TEST_INITIAL_WAIT_MS,
        }
    }
}

impl SelfTestConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn initial_wait(&self) -> Duration {
        Duration::from_millis(self.initial_wait_ms)
    }
}

// ==================== Logging Config ====================

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    #[serde(default = "default_log_filter")]
    pub filter: String,

    /// Directory for daily-rolling log files
    #[serde(default)]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            directory: None,
        }
    }
}

// ==================== Adc Config ====================

/// Complete driver configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AdcConfig {
    #[serde(default)]
    pub driver: DriverConfig,

    #[serde(default)]
    pub hal: HalConfig,

    #[serde(default)]
    pub self_test: SelfTestConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AdcConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON text
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, choosing the format by extension
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        };
        parsed.with_context(|| format!("Failed to parse config file {:?}", path))
    }

    /// Load a config file, returning defaults on any error
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(p) => p,
            None => return Self::default(),
        };

        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| AdcError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file {:?}", path))
    }

    /// Reject values the driver cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.driver.interval_us == 0 {
            return Err(AdcError::Config(
                "driver.interval_us must be greater than zero".to_string(),
            ));
        }
        if self.driver.stop_timeout_ms == 0 {
            return Err(AdcError::Config(
                "driver.stop_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.self_test.iterations == 0 {
            return Err(AdcError::Config(
                "self_test.iterations must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_channel_mask() -> u32 {
    DEFAULT_CHANNEL_MASK
}

fn default_interval_us() -> u64 {
    DEFAULT_INTERVAL.as_micros() as u64
}

fn default_stop_timeout_ms() -> u64 {
    DEFAULT_STOP_TIMEOUT_MS
}

fn default_self_test_iterations() -> u32 {
    DEFAULT_SELF_TEST_ITERATIONS
}

fn default_self_test_poll_ms() -> u64 {
    DEFAULT_SELF_TEST_POLL_MS
}

fn default_self_test_initial_wait_ms() -> u64 {
    DEFAULT_SELF_TEST_INITIAL_WAIT_MS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

// ==================== Tests ====================
