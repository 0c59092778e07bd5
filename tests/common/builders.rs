//! Test data builders for creating test objects

use adc_sampler::config::{AdcConfig, HalConfig, SimulatedConfig};
use adc_sampler::hal::{SamplePattern, SimulatedChannel};

/// Builder for driver configurations with short timings
pub struct ConfigBuilder {
    config: AdcConfig,
    simulated: SimulatedConfig,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let mut config = AdcConfig::default();
        config.driver.interval_us = 1_000;
        config.driver.stop_timeout_ms = 2_000;
        config.self_test.iterations = 3;
        config.self_test.poll_interval_ms = 10;
        config.self_test.initial_wait_ms = 500;

        Self {
            config,
            simulated: SimulatedConfig::default(),
        }
    }

    pub fn base_address(mut self, base: u32) -> Self {
        self.config.driver.base_address = base;
        self
    }

    pub fn channel_mask(mut self, mask: u32) -> Self {
        self.config.driver.channel_mask = mask;
        self
    }

    pub fn interval_us(mut self, interval_us: u64) -> Self {
        self.config.driver.interval_us = interval_us;
        self
    }

    pub fn temp_sensor_channel(mut self, channel: Option<u8>) -> Self {
        self.simulated.temp_sensor_channel = channel;
        self
    }

    pub fn pattern(mut self, channel: u8, pattern: SamplePattern) -> Self {
        self.simulated
            .channels
            .push(SimulatedChannel::new(channel, pattern));
        self
    }

    pub fn default_pattern(mut self, pattern: SamplePattern) -> Self {
        self.simulated.default_pattern = pattern;
        self
    }

    pub fn fail_init(mut self, code: i32) -> Self {
        self.simulated.fail_init = Some(code);
        self
    }

    pub fn self_test_iterations(mut self, iterations: u32) -> Self {
        self.config.self_test.iterations = iterations;
        self
    }

    pub fn build(mut self) -> AdcConfig {
        self.config.hal = HalConfig::Simulated(self.simulated);
        self.config
    }
}
