//! Converter backend configuration
//!
//! Selects which [`crate::hal::AdcHal`] implementation the driver builds on
//! `start`, along with its backend-specific settings.
//!
//! ```toml
//! [hal]
//! backend = "iio"
//! sysfs_root = "/sys/bus/iio/devices"
//! reference_voltage = 3.3
//! resolution_bits = 12
//! ```

use crate::hal::{SamplePattern, SimulatedChannel};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default reference voltage in volts
pub const DEFAULT_REFERENCE_VOLTAGE: f32 = 3.3;

/// Default converter resolution in bits
pub const DEFAULT_RESOLUTION_BITS: u8 = 12;

/// Default internal temperature sensor channel
pub const DEFAULT_TEMP_SENSOR_CHANNEL: u8 = 16;

/// Default IIO sysfs root
pub const DEFAULT_IIO_ROOT: &str = "/sys/bus/iio/devices";

/// Converter backend selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum HalConfig {
    /// Software converter
    Simulated(SimulatedConfig),
    /// Linux IIO sysfs converter
    Iio(IioConfig),
}

impl Default for HalConfig {
    fn default() -> Self {
        HalConfig::Simulated(SimulatedConfig::default())
    }
}

impl HalConfig {
    /// Backend name for display
    pub fn backend_name(&self) -> &'static str {
        match self {
            HalConfig::Simulated(_) => "simulated",
            HalConfig::Iio(_) => "iio",
        }
    }
}

/// Settings of the simulated converter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedConfig {
    #[serde(default = "default_reference_voltage")]
    pub reference_voltage: f32,

    #[serde(default = "default_resolution_bits")]
    pub resolution_bits: u8,

    /// Channel reported as always-on
    #[serde(default = "default_temp_sensor_channel")]
    pub temp_sensor_channel: Option<u8>,

    /// Pattern for channels not listed in `channels`
    #[serde(default)]
    pub default_pattern: SamplePattern,

    #[serde(default)]
    pub channels: Vec<SimulatedChannel>,

    /// Force `init` to fail with this code
    #[serde(default)]
    pub fail_init: Option<i32>,
}

impl Default for SimulatedConfig {
    fn default() -> Self {
        Self {
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            resolution_bits: DEFAULT_RESOLUTION_BITS,
            temp_sensor_channel: Some(DEFAULT_TEMP_SENSOR_CHANNEL),
            default_pattern: SamplePattern::default(),
            channels: Vec::new(),
            fail_init: None,
        }
    }
}

/// Settings of the IIO converter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IioConfig {
    #[serde(default = "default_iio_root")]
    pub sysfs_root: PathBuf,

    #[serde(default = "default_reference_voltage")]
    pub reference_voltage: f32,

    #[serde(default = "default_resolution_bits")]
    pub resolution_bits: u8,

    /// IIO devices rarely expose a temperature channel as a voltage input
    #[serde(default)]
    pub temp_sensor_channel: Option<u8>,
}

impl Default for IioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: default_iio_root(),
            reference_voltage: DEFAULT_REFERENCE_VOLTAGE,
            resolution_bits: DEFAULT_RESOLUTION_BITS,
            temp_sensor_channel: None,
        }
    }
}

fn default_reference_voltage() -> f32 {
    DEFAULT_REFERENCE_VOLTAGE
}

fn default_resolution_bits() -> u8 {
    DEFAULT_RESOLUTION_BITS
}

fn default_temp_sensor_channel() -> Option<u8> {
    Some(DEFAULT_TEMP_SENSOR_CHANNEL)
}

fn default_iio_root() -> PathBuf {
    PathBuf::from(DEFAULT_IIO_ROOT)
}
