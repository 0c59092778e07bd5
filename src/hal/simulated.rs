//! Simulated converter
//!
//! A software stand-in for the on-chip ADC. It produces values from
//! per-channel patterns, honours the configured reference voltage and
//! resolution, and can be told to fail initialisation or to time out on
//! chosen channels.
//!
//! # Patterns
//!
//! - [`SamplePattern::Constant`] - Fixed raw count
//! - [`SamplePattern::Sine`] - Sinusoid over wall-clock time since init
//! - [`SamplePattern::Ramp`] - Count that increases by `step` per conversion and wraps at full scale
//! - [`SamplePattern::Timeout`] - Every conversion times out
//!
//! # Example
//!
//! ```ignore
//! use adc_sampler::hal::{AdcHal, SamplePattern, SimulatedAdc};
//!
//! let mut adc = SimulatedAdc::new()
//!     .with_channel(4, SamplePattern::Constant { value: 1000 })
//!     .with_channel(5, SamplePattern::Timeout);
//!
//! adc.init(0)?;
//! assert_eq!(adc.sample(0, 4), 1000);
//! ```

use crate::config::SimulatedConfig;
use crate::error::{AdcError, Result};
use crate::types::SAMPLE_TIMEOUT;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::AdcHal;

/// Pattern for generating raw counts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplePattern {
    /// Constant raw count
    Constant { value: u32 },
    /// Sine wave in raw counts
    Sine {
        frequency_hz: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Increasing count
    Ramp { step: u32 },
    /// Conversion never completes
    Timeout,
}

impl Default for SamplePattern {
    fn default() -> Self {
        SamplePattern::Sine {
            frequency_hz: 1.0,
            amplitude: 1000.0,
            offset: 2048.0,
        }
    }
}

/// Pattern assignment for one channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulatedChannel {
    pub channel: u8,
    pub pattern: SamplePattern,
    /// Peak noise in raw counts added on top of the pattern
    #[serde(default)]
    pub noise: u32,
}

impl SimulatedChannel {
    pub fn new(channel: u8, pattern: SamplePattern) -> Self {
        Self {
            channel,
            pattern,
            noise: 0,
        }
    }

    pub fn with_noise(mut self, noise: u32) -> Self {
        self.noise = noise;
        self
    }
}

/// Call counters observable from outside the converter
#[derive(Debug, Default)]
pub struct SimulatedAdcCounters {
    pub inits: AtomicU64,
    pub uninits: AtomicU64,
    pub samples: AtomicU64,
}

impl SimulatedAdcCounters {
    pub fn inits(&self) -> u64 {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn uninits(&self) -> u64 {
        self.uninits.load(Ordering::SeqCst)
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::SeqCst)
    }
}

/// Software converter
#[derive(Debug)]
pub struct SimulatedAdc {
    reference_voltage: f32,
    resolution_bits: u8,
    temp_sensor_channel: Option<u8>,
    default_pattern: SamplePattern,
    channels: HashMap<u8, SimulatedChannel>,
    ramp_state: HashMap<u8, u32>,
    fail_init: Option<i32>,
    initialized: bool,
    start_time: Instant,
    rng_state: u64,
    counters: Arc<SimulatedAdcCounters>,
}

impl Default for SimulatedAdc {
    fn default() -> Self {
        Self::from_config(&SimulatedConfig::default())
    }
}

impl SimulatedAdc {
    /// Create a converter with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SimulatedConfig) -> Self {
        let channels = config
            .channels
            .iter()
            .map(|c| (c.channel, *c))
            .collect();

        Self {
            reference_voltage: config.reference_voltage,
            resolution_bits: config.resolution_bits.clamp(1, 31),
            temp_sensor_channel: config.temp_sensor_channel,
            default_pattern: config.default_pattern,
            channels,
            ramp_state: HashMap::new(),
            fail_init: config.fail_init,
            initialized: false,
            start_time: Instant::now(),
            rng_state: 0x2545_F491_4F6C_DD1D,
            counters: Arc::new(SimulatedAdcCounters::default()),
        }
    }

    /// Assign a pattern to a channel
    pub fn with_channel(mut self, channel: u8, pattern: SamplePattern) -> Self {
        self.channels
            .insert(channel, SimulatedChannel::new(channel, pattern));
        self
    }

    /// Pattern for channels without an explicit assignment
    pub fn with_default_pattern(mut self, pattern: SamplePattern) -> Self {
        self.default_pattern = pattern;
        self
    }

    /// Make `init` fail with the given negative code
    pub fn with_init_failure(mut self, code: i32) -> Self {
        self.fail_init = Some(code);
        self
    }

    /// Channel reported as always-on, `None` for no temperature sensor
    pub fn with_temp_sensor_channel(mut self, channel: Option<u8>) -> Self {
        self.temp_sensor_channel = channel;
        self
    }

    /// Shared handle to the call counters
    pub fn counters(&self) -> Arc<SimulatedAdcCounters> {
        self.counters.clone()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    fn generate(&mut self, channel: u8) -> u32 {
        let config = self
            .channels
            .get(&channel)
            .copied()
            .unwrap_or_else(|| SimulatedChannel::new(channel, self.default_pattern));
        let full_scale = self.full_scale_count();

        let base = match config.pattern {
            SamplePattern::Constant { value } => value.min(full_scale),
            SamplePattern::Sine {
                frequency_hz,
                amplitude,
                offset,
            } => {
                let t = self.start_time.elapsed().as_secs_f64();
                let v = offset + amplitude * (2.0 * std::f64::consts::PI * frequency_hz * t).sin();
                v.clamp(0.0, full_scale as f64) as u32
            }
            SamplePattern::Ramp { step } => {
                let value = self.ramp_state.entry(channel).or_insert(0);
                let current = *value;
                *value = (current.wrapping_add(step)) % (full_scale + 1);
                current
            }
            SamplePattern::Timeout => return SAMPLE_TIMEOUT,
        };

        if config.noise == 0 {
            return base;
        }
        let span = 2 * config.noise as u64 + 1;
        let jitter = (self.next_random() % span) as i64 - config.noise as i64;
        (base as i64 + jitter).clamp(0, full_scale as i64) as u32
    }

    fn next_random(&mut self) -> u64 {
        let mut s = self.rng_state;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.rng_state = s;
        s
    }
}

impl AdcHal for SimulatedAdc {
    fn init(&mut self, base: u32) -> Result<()> {
        self.counters.inits.fetch_add(1, Ordering::SeqCst);
        if let Some(code) = self.fail_init {
            return Err(AdcError::HalInit { base, code });
        }

        self.initialized = true;
        self.start_time = Instant::now();
        self.ramp_state.clear();
        tracing::debug!("Simulated ADC initialized (base {:#x})", base);
        Ok(())
    }

    fn uninit(&mut self, base: u32) {
        self.counters.uninits.fetch_add(1, Ordering::SeqCst);
        self.initialized = false;
        tracing::debug!("Simulated ADC released (base {:#x})", base);
    }

    fn sample(&mut self, _base: u32, channel: u8) -> u32 {
        self.counters.samples.fetch_add(1, Ordering::SeqCst);
        if !self.initialized {
            return SAMPLE_TIMEOUT;
        }
        self.generate(channel)
    }

    fn reference_voltage(&self) -> f32 {
        self.reference_voltage
    }

    fn full_scale_count(&self) -> u32 {
        (1u32 << self.resolution_bits) - 1
    }

    fn always_on_channel_mask(&self) -> u32 {
        self.temp_sensor_channel
            .filter(|ch| *ch < 32)
            .map(|ch| 1u32 << ch)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_pattern() {
        let mut adc = SimulatedAdc::new().with_channel(3, SamplePattern::Constant { value: 1234 });
        adc.init(0).unwrap();
        assert_eq!(adc.sample(0, 3), 1234);
        assert_eq!(adc.sample(0, 3), 1234);
    }

    #[test]
    fn test_constant_is_clamped_to_full_scale() {
        let mut adc =
            SimulatedAdc::new().with_channel(0, SamplePattern::Constant { value: 100_000 });
        adc.init(0).unwrap();
        assert_eq!(adc.sample(0, 0), adc.full_scale_count());
    }

    #[test]
    fn test_ramp_wraps() {
        let mut adc = SimulatedAdc::new().with_channel(1, SamplePattern::Ramp { step: 2048 });
        adc.init(0).unwrap();
        assert_eq!(adc.sample(0, 1), 0);
        assert_eq!(adc.sample(0, 1), 2048);
        // 4096 wraps past the 12-bit full scale of 4095
        assert_eq!(adc.sample(0, 1), 0);
    }

    #[test]
    fn test_timeout_pattern() {
        let mut adc = SimulatedAdc::new().with_channel(7, SamplePattern::Timeout);
        adc.init(0).unwrap();
        assert_eq!(adc.sample(0, 7), SAMPLE_TIMEOUT);
    }

    #[test]
    fn test_sample_before_init_times_out() {
        let mut adc = SimulatedAdc::new();
        assert_eq!(adc.sample(0, 0), SAMPLE_TIMEOUT);
    }

    #[test]
    fn test_sine_stays_in_range() {
        let mut adc = SimulatedAdc::new();
        adc.init(0).unwrap();
        for _ in 0..100 {
            assert!(adc.sample(0, 2) <= adc.full_scale_count());
        }
    }

    #[test]
    fn test_noise_is_bounded() {
        let config = SimulatedConfig {
            channels: vec![
                SimulatedChannel::new(0, SamplePattern::Constant { value: 2000 }).with_noise(5),
            ],
            ..Default::default()
        };
        let mut adc = SimulatedAdc::from_config(&config);
        adc.init(0).unwrap();
        for _ in 0..200 {
            let v = adc.sample(0, 0);
            assert!((1995..=2005).contains(&v), "value {} out of range", v);
        }
    }

    #[test]
    fn test_init_failure() {
        let mut adc = SimulatedAdc::new().with_init_failure(-5);
        let err = adc.init(0x10).unwrap_err();
        assert!(matches!(err, AdcError::HalInit { base: 0x10, code: -5 }));
        assert!(!adc.is_initialized());
    }

    #[test]
    fn test_counters_are_shared() {
        let mut adc = SimulatedAdc::new();
        let counters = adc.counters();
        adc.init(0).unwrap();
        adc.sample(0, 0);
        adc.uninit(0);

        assert_eq!(counters.inits(), 1);
        assert_eq!(counters.samples(), 1);
        assert_eq!(counters.uninits(), 1);
    }

    #[test]
    fn test_always_on_mask() {
        let adc = SimulatedAdc::new().with_temp_sensor_channel(Some(10));
        assert_eq!(adc.always_on_channel_mask(), 1 << 10);

        let adc = SimulatedAdc::new().with_temp_sensor_channel(None);
        assert_eq!(adc.always_on_channel_mask(), 0);
    }
}
