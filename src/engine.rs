//! Sampling engine
//!
//! The engine owns the converter, the resolved channel set and the sample
//! buffer. Once initialised it is moved onto a work-queue thread, where
//! [`SamplingEngine::run_cycle`] samples every configured channel, builds an
//! [`AdcReport`] and publishes it on the report topic.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized -> Initializing -> Running -> ShuttingDown -> Stopped
//!                        |                                       ^
//!                        +------------- init failed -------------+
//! ```
//!
//! Shutdown is cooperative: [`EngineHandle::request_exit`] sets a flag that
//! the next tick observes before touching the hardware. The engine leaves
//! the schedule, and dropping it releases the converter.
//!
//! # Report capacity
//!
//! A report carries at most [`MAX_SUPPORTED_CHANNELS`] channels. When more
//! channels are configured only the first ones (in channel order) are
//! reported; the rest are sampled but silently left out.

use crate::channels::{ChannelSample, ChannelSet, SampleBuffer};
use crate::error::Result;
use crate::hal::AdcHal;
use crate::scheduler::{absolute_time_us, CycleOutcome, ScheduleHandle, WorkQueue};
use crate::topic::Topic;
use crate::types::{
    AdcReport, CycleStats, EngineState, SharedEngineState, BUILTIN_ADC_DEVID, CHANNEL_ID_UNUSED,
    DEFAULT_INTERVAL, MAX_SUPPORTED_CHANNELS, SAMPLE_TIMEOUT,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Build a report from the sample buffer.
///
/// Copies up to [`MAX_SUPPORTED_CHANNELS`] samples in order and marks every
/// remaining slot with [`CHANNEL_ID_UNUSED`].
pub fn assemble_report(
    samples: &[ChannelSample],
    v_ref: f32,
    resolution: u32,
    timestamp: u64,
) -> AdcReport {
    let mut report = AdcReport {
        timestamp,
        device_id: BUILTIN_ADC_DEVID,
        resolution,
        v_ref,
        ..Default::default()
    };

    let reported = samples.len().min(MAX_SUPPORTED_CHANNELS);
    for (i, sample) in samples.iter().take(reported).enumerate() {
        report.channel_id[i] = sample.channel as i16;
        report.raw_data[i] = sample.raw;
    }
    for id in report.channel_id.iter_mut().skip(reported) {
        *id = CHANNEL_ID_UNUSED;
    }

    report
}

/// Periodic sampler for one converter
pub struct SamplingEngine {
    base_address: u32,
    hal: Box<dyn AdcHal>,
    channels: ChannelSet,
    samples: SampleBuffer,
    publisher: Topic<AdcReport>,
    interval: Duration,
    should_exit: Arc<AtomicBool>,
    state: SharedEngineState,
    stats: Arc<Mutex<CycleStats>>,
}

impl SamplingEngine {
    /// Resolve the channel set against the converter's always-on mask and
    /// allocate the sample buffer
    pub fn new(
        hal: Box<dyn AdcHal>,
        base_address: u32,
        requested_mask: u32,
        publisher: Topic<AdcReport>,
    ) -> Self {
        let channels = ChannelSet::resolve(requested_mask, hal.always_on_channel_mask());
        let samples = SampleBuffer::new(&channels);

        tracing::debug!("ADC channels: {}", channels);

        Self {
            base_address,
            hal,
            channels,
            samples,
            publisher,
            interval: DEFAULT_INTERVAL,
            should_exit: Arc::new(AtomicBool::new(false)),
            state: SharedEngineState::new(),
            stats: Arc::new(Mutex::new(CycleStats::default())),
        }
    }

    /// Set the sampling period (also the initial delay)
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    pub fn samples(&self) -> &[ChannelSample] {
        self.samples.as_slice()
    }

    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Flag checked at the top of every cycle
    pub fn exit_flag(&self) -> Arc<AtomicBool> {
        self.should_exit.clone()
    }

    /// Initialise the converter and register the engine on the work queue.
    ///
    /// On failure the engine is dropped without ever being scheduled.
    pub fn init(mut self, work_queue: &WorkQueue) -> Result<EngineHandle> {
        self.state.set(EngineState::Initializing);

        if let Err(e) = self.hal.init(self.base_address) {
            tracing::error!("arch adc init failed: {}", e);
            return Err(e);
        }

        let handle_state = self.state.clone();
        let should_exit = self.should_exit.clone();
        let stats = self.stats.clone();
        let channels = self.channels.clone();
        let interval = self.interval;

        self.state.set(EngineState::Running);
        let schedule = work_queue.schedule_on_interval(interval, interval, move || {
            self.run_cycle()
        })?;

        tracing::info!(
            "ADC sampling {} channels every {:?} on {}",
            channels.len(),
            interval,
            work_queue.name()
        );

        Ok(EngineHandle {
            should_exit,
            state: handle_state,
            stats,
            channels,
            schedule,
        })
    }

    /// One scheduled tick
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.should_exit.load(Ordering::SeqCst) {
            self.exit_and_cleanup();
            return CycleOutcome::Exit;
        }

        let started = Instant::now();
        let mut timeouts = 0;

        for slot in self.samples.iter_mut() {
            slot.raw = self.hal.sample(self.base_address, slot.channel);
            if slot.raw == SAMPLE_TIMEOUT {
                tracing::error!("sample timeout (channel {})", slot.channel);
                timeouts += 1;
            }
        }

        let report = assemble_report(
            self.samples.as_slice(),
            self.hal.reference_voltage(),
            self.hal.full_scale_count(),
            absolute_time_us(),
        );
        self.publisher.publish(report);

        let elapsed_us = started.elapsed().as_micros() as u64;
        match self.stats.lock() {
            Ok(mut stats) => stats.record_cycle(elapsed_us, timeouts),
            Err(poisoned) => poisoned.into_inner().record_cycle(elapsed_us, timeouts),
        }
        tracing::trace!("ADC cycle published {} channels in {}us", report.channel_count(), elapsed_us);

        CycleOutcome::Continue
    }

    fn exit_and_cleanup(&mut self) {
        self.state.set(EngineState::ShuttingDown);
        tracing::debug!("ADC engine leaving schedule");
    }
}

impl Drop for SamplingEngine {
    fn drop(&mut self) {
        self.hal.uninit(self.base_address);
        self.state.set(EngineState::Stopped);
        tracing::info!("ADC engine stopped (base {:#x})", self.base_address);
    }
}

/// Controller-side view of a running engine
#[derive(Debug)]
pub struct EngineHandle {
    should_exit: Arc<AtomicBool>,
    state: SharedEngineState,
    stats: Arc<Mutex<CycleStats>>,
    channels: ChannelSet,
    schedule: ScheduleHandle,
}

impl EngineHandle {
    pub fn state(&self) -> EngineState {
        self.state.get()
    }

    /// Whether the engine is still receiving ticks
    pub fn is_running(&self) -> bool {
        self.state.get() == EngineState::Running && !self.schedule.is_finished()
    }

    pub fn channels(&self) -> &ChannelSet {
        &self.channels
    }

    /// Snapshot of the cycle statistics
    pub fn stats(&self) -> CycleStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Ask the engine to leave the schedule on its next tick
    pub fn request_exit(&self) {
        self.should_exit.store(true, Ordering::SeqCst);
    }

    /// Request exit and wait for the engine to release the converter.
    ///
    /// If the engine has not exited within `timeout` the schedule is
    /// cleared, which ends the worker after its current tick. Returns
    /// `false` while that tick is still running; the engine then still owns
    /// the converter and the handle must be kept.
    pub fn stop(&mut self, timeout: Duration) -> bool {
        self.request_exit();
        if !self.schedule.wait(timeout) {
            tracing::warn!("ADC engine did not exit within {:?}, clearing schedule", timeout);
            self.schedule.clear();
        }
        self.schedule.join(timeout)
    }
}
