//! Hardware abstraction for the analog-to-digital converter
//!
//! The sampling engine talks to the converter only through [`AdcHal`], so
//! it can run against real hardware or the simulated converter used in tests.
//!
//! # Implementations
//!
//! - [`SimulatedAdc`] - Deterministic software converter with per-channel patterns
//! - [`IioAdc`] - Linux Industrial I/O converter exposed through sysfs
//!
//! Use [`from_config`] to build the converter selected in the configuration.

pub mod iio;
pub mod simulated;

pub use iio::IioAdc;
pub use simulated::{SamplePattern, SimulatedAdc, SimulatedChannel};

use crate::config::HalConfig;
use crate::error::Result;

/// Unified interface for converters
///
/// Implementations must be `Send`: the engine owning the converter is moved
/// onto the work-queue thread after initialisation.
///
/// # Example
///
/// ```ignore
/// fn read_all(hal: &mut dyn AdcHal, base: u32, channels: &[u8]) -> Vec<u32> {
///     channels.iter().map(|&ch| hal.sample(base, ch)).collect()
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait AdcHal: Send {
    /// Power up and configure the converter at `base`
    fn init(&mut self, base: u32) -> Result<()>;

    /// Release the converter at `base`
    fn uninit(&mut self, base: u32);

    /// Convert one channel.
    ///
    /// Blocks for at most the converter's conversion timeout and returns
    /// [`crate::types::SAMPLE_TIMEOUT`] when it expires.
    fn sample(&mut self, base: u32, channel: u8) -> u32;

    /// Reference voltage in volts
    fn reference_voltage(&self) -> f32;

    /// Maximum digital count
    fn full_scale_count(&self) -> u32;

    /// Channels the converter always samples (temperature reference)
    fn always_on_channel_mask(&self) -> u32;
}

/// Build the converter described by the configuration
pub fn from_config(config: &HalConfig) -> Box<dyn AdcHal> {
    match config {
        HalConfig::Simulated(sim) => Box::new(SimulatedAdc::from_config(sim)),
        HalConfig::Iio(iio) => Box::new(IioAdc::from_config(iio)),
    }
}
