//! # adc-sampler: periodic ADC sampling driver
//!
//! Samples a configurable set of analog channels at a fixed rate and
//! publishes each cycle as an [`AdcReport`] on a latest-value topic. A
//! command surface starts, stops and inspects the single driver instance,
//! and a diagnostic self-test prints live readings from the topic.
//!
//! ## Architecture
//!
//! - **HAL**: [`hal::AdcHal`] abstracts the converter (simulated or Linux IIO sysfs)
//! - **Engine**: [`engine::SamplingEngine`] owns the converter and runs one cycle per tick
//! - **Scheduling**: [`scheduler::WorkQueue`] drives the engine on a dedicated thread
//! - **Communication**: [`topic::Topic`] hands the newest report to every subscriber
//! - **Control**: [`controller::AdcController`] implements `start`, `stop`, `status` and `test`
//!
//! ## Configuration
//!
//! The driver reads `adc.toml` (or a JSON file) from the platform config
//! directory under `adc-sampler`, falling back to defaults:
//!
//! - **Linux**: `~/.config/adc-sampler/adc.toml`
//! - **macOS**: `~/Library/Application Support/adc-sampler/adc.toml`
//! - **Windows**: `%APPDATA%\adc-sampler\adc.toml`
//!
//! ## Example
//!
//! ```ignore
//! use adc_sampler::{AdcConfig, AdcController};
//!
//! let mut controller = AdcController::new(AdcConfig::default());
//! controller.start()?;
//!
//! let reports = controller.topic().subscribe();
//! if let Some(report) = reports.wait(std::time::Duration::from_millis(50)) {
//!     for (channel, raw) in report.channels() {
//!         if let Some(volts) = report.to_volts(raw) {
//!             println!("{channel}: {volts:.3} V");
//!         }
//!     }
//! }
//!
//! controller.stop()?;
//! ```

pub mod channels;
pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod hal;
pub mod scheduler;
pub mod selftest;
pub mod topic;
pub mod types;

// Re-export commonly used types
pub use channels::{ChannelSample, ChannelSet};
pub use config::{AdcConfig, HalConfig};
pub use controller::{AdcController, Command};
pub use engine::{EngineHandle, SamplingEngine};
pub use error::{AdcError, Result};
pub use hal::{AdcHal, SimulatedAdc};
pub use topic::{Subscription, Topic};
pub use types::{AdcReport, CycleStats, EngineState};
