//! Mock construction helpers

use adc_sampler::config::{AdcConfig, HalConfig};
use adc_sampler::hal::simulated::SimulatedAdcCounters;
use adc_sampler::hal::{AdcHal, SimulatedAdc};
use adc_sampler::AdcController;
use std::sync::{Arc, Mutex};

/// Counters of every converter a factory has built, in build order
pub type CounterLog = Arc<Mutex<Vec<Arc<SimulatedAdcCounters>>>>;

/// Factory building simulated converters and recording their counters
pub fn recording_factory() -> (
    impl FnMut(&HalConfig) -> Box<dyn AdcHal> + Send + 'static,
    CounterLog,
) {
    let log: CounterLog = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();

    let factory = move |config: &HalConfig| -> Box<dyn AdcHal> {
        let adc = match config {
            HalConfig::Simulated(sim) => SimulatedAdc::from_config(sim),
            HalConfig::Iio(_) => SimulatedAdc::new(),
        };
        sink.lock().unwrap().push(adc.counters());
        Box::new(adc)
    };

    (factory, log)
}

/// Controller over simulated converters with their counters
pub fn simulated_controller(config: AdcConfig) -> (AdcController, CounterLog) {
    let (factory, log) = recording_factory();
    (AdcController::new(config).with_hal_factory(factory), log)
}

/// Sum of `uninit` calls over every converter built so far
pub fn total_uninits(log: &CounterLog) -> u64 {
    log.lock().unwrap().iter().map(|c| c.uninits()).sum()
}

/// Sum of `init` calls over every converter built so far
pub fn total_inits(log: &CounterLog) -> u64 {
    log.lock().unwrap().iter().map(|c| c.inits()).sum()
}
