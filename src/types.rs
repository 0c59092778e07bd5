//! Core data types for the ADC sampling driver
//!
//! This module defines the report published once per sampling cycle, the
//! engine lifecycle state and the cycle statistics counter.

use crate::error::{AdcError, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Number of channel slots addressable by a channel mask
pub const TOTAL_CHANNELS: u8 = 32;

/// Capacity of a single report
pub const MAX_SUPPORTED_CHANNELS: usize = 12;

/// `channel_id` value of an unused report slot
pub const CHANNEL_ID_UNUSED: i16 = -1;

/// Raw value returned by a converter when a conversion timed out
pub const SAMPLE_TIMEOUT: u32 = u32::MAX;

/// Device identifier stamped on reports from the on-chip converter
pub const BUILTIN_ADC_DEVID: u32 = 0xFFFF_FFFF;

/// Default sampling interval (100 Hz)
pub const DEFAULT_INTERVAL: Duration = Duration::from_micros(10_000);

/// Report published once per cycle.
///
/// The field names and the binary layout produced by [`AdcReport::to_bytes`]
/// are consumed by other components and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcReport {
    /// Monotonic time of the cycle in microseconds
    pub timestamp: u64,
    /// Converter identifier
    pub device_id: u32,
    /// Channel of each slot, [`CHANNEL_ID_UNUSED`] when the slot is empty
    pub channel_id: [i16; MAX_SUPPORTED_CHANNELS],
    /// Raw conversion result of each slot
    pub raw_data: [u32; MAX_SUPPORTED_CHANNELS],
    /// Maximum digital count of the converter
    pub resolution: u32,
    /// Reference voltage in volts
    pub v_ref: f32,
}

impl Default for AdcReport {
    fn default() -> Self {
        Self {
            timestamp: 0,
            device_id: 0,
            channel_id: [CHANNEL_ID_UNUSED; MAX_SUPPORTED_CHANNELS],
            raw_data: [0; MAX_SUPPORTED_CHANNELS],
            resolution: 0,
            v_ref: 0.0,
        }
    }
}

impl AdcReport {
    /// Size of the binary encoding
    pub const WIRE_SIZE: usize = 8 + 4 + MAX_SUPPORTED_CHANNELS * 2 + MAX_SUPPORTED_CHANNELS * 4 + 4 + 4;

    /// Iterate over the populated slots as `(channel, raw)` pairs
    pub fn channels(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        self.channel_id
            .iter()
            .zip(self.raw_data.iter())
            .filter(|(id, _)| **id >= 0)
            .map(|(id, raw)| (*id as u8, *raw))
    }

    /// Number of populated slots
    pub fn channel_count(&self) -> usize {
        self.channel_id.iter().filter(|id| **id >= 0).count()
    }

    /// Raw value reported for a channel, if present
    pub fn raw_for(&self, channel: u8) -> Option<u32> {
        self.channels()
            .find(|(id, _)| *id == channel)
            .map(|(_, raw)| raw)
    }

    /// Convert a raw count to volts using this report's reference and resolution
    pub fn to_volts(&self, raw: u32) -> Option<f32> {
        if raw == SAMPLE_TIMEOUT || self.resolution == 0 {
            return None;
        }
        Some(raw as f32 * self.v_ref / self.resolution as f32)
    }

    /// Encode as little-endian: timestamp, device_id, channel_id, raw_data, resolution, v_ref
    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        let mut pos = 0;
        let mut put = |bytes: &[u8]| {
            out[pos..pos + bytes.len()].copy_from_slice(bytes);
            pos += bytes.len();
        };

        put(&self.timestamp.to_le_bytes());
        put(&self.device_id.to_le_bytes());
        for id in &self.channel_id {
            put(&id.to_le_bytes());
        }
        for raw in &self.raw_data {
            put(&raw.to_le_bytes());
        }
        put(&self.resolution.to_le_bytes());
        put(&self.v_ref.to_le_bytes());

        out
    }

    /// Decode the layout written by [`AdcReport::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != Self::WIRE_SIZE {
            return Err(AdcError::ReportLength {
                expected: Self::WIRE_SIZE,
                actual: bytes.len(),
            });
        }

        let mut pos = 0;
        let timestamp = u64::from_le_bytes(take(bytes, &mut pos));
        let device_id = u32::from_le_bytes(take(bytes, &mut pos));

        let mut channel_id = [CHANNEL_ID_UNUSED; MAX_SUPPORTED_CHANNELS];
        for id in channel_id.iter_mut() {
            *id = i16::from_le_bytes(take(bytes, &mut pos));
        }

        let mut raw_data = [0u32; MAX_SUPPORTED_CHANNELS];
        for raw in raw_data.iter_mut() {
            *raw = u32::from_le_bytes(take(bytes, &mut pos));
        }

        let resolution = u32::from_le_bytes(take(bytes, &mut pos));
        let v_ref = f32::from_le_bytes(take(bytes, &mut pos));

        Ok(Self {
            timestamp,
            device_id,
            channel_id,
            raw_data,
            resolution,
            v_ref,
        })
    }
}

/// Copy the next `N` bytes out of a length-checked buffer
fn take<const N: usize>(bytes: &[u8], pos: &mut usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[*pos..*pos + N]);
    *pos += N;
    out
}

/// Lifecycle of a sampling engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum EngineState {
    /// Constructed, hardware untouched
    #[default]
    Uninitialized = 0,
    /// Hardware init in progress
    Initializing = 1,
    /// Registered and receiving ticks
    Running = 2,
    /// Exit observed, tearing down
    ShuttingDown = 3,
    /// Hardware released
    Stopped = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => EngineState::Initializing,
            2 => EngineState::Running,
            3 => EngineState::ShuttingDown,
            4 => EngineState::Stopped,
            _ => EngineState::Uninitialized,
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Uninitialized => write!(f, "Uninitialized"),
            EngineState::Initializing => write!(f, "Initializing..."),
            EngineState::Running => write!(f, "Running"),
            EngineState::ShuttingDown => write!(f, "Shutting down..."),
            EngineState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Engine state shared between the worker thread and the controller
#[derive(Debug, Clone, Default)]
pub struct SharedEngineState(Arc<AtomicU8>);

impl SharedEngineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    pub fn set(&self, state: EngineState) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

/// Size of the rolling window for recent cycle times
const RECENT_WINDOW_SIZE: usize = 100;

/// Timing and error counters of the sampling cycle
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Number of completed cycles
    pub cycles: u64,
    /// Number of samples that returned [`SAMPLE_TIMEOUT`]
    pub sample_timeouts: u64,
    /// Total cycle time in microseconds
    pub total_cycle_time_us: u64,
    /// Last cycle time in microseconds
    pub last_cycle_time_us: u64,
    /// Minimum cycle time observed (microseconds)
    pub min_cycle_time_us: u64,
    /// Maximum cycle time observed (microseconds)
    pub max_cycle_time_us: u64,
    /// Rolling window of recent cycle times for jitter calculation
    pub recent_cycle_times: VecDeque<u64>,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self {
            cycles: 0,
            sample_timeouts: 0,
            total_cycle_time_us: 0,
            last_cycle_time_us: 0,
            min_cycle_time_us: u64::MAX,
            max_cycle_time_us: 0,
            recent_cycle_times: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl CycleStats {
    /// Record one completed cycle
    pub fn record_cycle(&mut self, time_us: u64, timeouts: u64) {
        self.cycles += 1;
        self.sample_timeouts += timeouts;
        self.total_cycle_time_us += time_us;
        self.last_cycle_time_us = time_us;
        self.min_cycle_time_us = self.min_cycle_time_us.min(time_us);
        self.max_cycle_time_us = self.max_cycle_time_us.max(time_us);

        self.recent_cycle_times.push_back(time_us);
        if self.recent_cycle_times.len() > RECENT_WINDOW_SIZE {
            self.recent_cycle_times.pop_front();
        }
    }

    /// Average cycle time in microseconds
    pub fn avg_cycle_time_us(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.total_cycle_time_us as f64 / self.cycles as f64
        }
    }

    /// Jitter (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_cycle_times.iter().min().copied().unwrap_or(0);
        let max = self.recent_cycle_times.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cycles == 0 {
            return write!(f, "adc: cycle time: 0 events");
        }
        write!(
            f,
            "adc: cycle time: {} events, {:.1}us avg, min {}us max {}us, jitter {}us, {} sample timeouts",
            self.cycles,
            self.avg_cycle_time_us(),
            self.min_cycle_time_us,
            self.max_cycle_time_us,
            self.jitter_us(),
            self.sample_timeouts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> AdcReport {
        let mut report = AdcReport {
            timestamp: 1_234_567,
            device_id: BUILTIN_ADC_DEVID,
            resolution: 4096,
            v_ref: 3.3,
            ..Default::default()
        };
        report.channel_id[0] = 2;
        report.raw_data[0] = 2048;
        report.channel_id[1] = 16;
        report.raw_data[1] = SAMPLE_TIMEOUT;
        report
    }

    #[test]
    fn test_default_report_is_empty() {
        let report = AdcReport::default();
        assert_eq!(report.channel_count(), 0);
        assert!(report.channel_id.iter().all(|id| *id == CHANNEL_ID_UNUSED));
    }

    #[test]
    fn test_report_channel_lookup() {
        let report = sample_report();
        assert_eq!(report.channel_count(), 2);
        assert_eq!(report.raw_for(2), Some(2048));
        assert_eq!(report.raw_for(16), Some(SAMPLE_TIMEOUT));
        assert_eq!(report.raw_for(3), None);
    }

    #[test]
    fn test_to_volts() {
        let report = sample_report();
        let volts = report.to_volts(2048).unwrap();
        assert!((volts - 1.65).abs() < 1e-3);
        assert_eq!(report.to_volts(SAMPLE_TIMEOUT), None);
    }

    #[test]
    fn test_wire_layout() {
        let report = sample_report();
        let bytes = report.to_bytes();
        assert_eq!(bytes.len(), 92);
        assert_eq!(&bytes[0..8], &1_234_567u64.to_le_bytes());
        assert_eq!(&bytes[8..12], &BUILTIN_ADC_DEVID.to_le_bytes());
        // first channel id, then the unused sentinel in the last slot
        assert_eq!(&bytes[12..14], &2i16.to_le_bytes());
        assert_eq!(&bytes[34..36], &(-1i16).to_le_bytes());

        let decoded = AdcReport::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, report);
    }

    #[test]
    fn test_from_bytes_rejects_short_input() {
        let err = AdcReport::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(
            err,
            AdcError::ReportLength {
                expected: 92,
                actual: 10
            }
        ));
    }

    #[test]
    fn test_report_json_field_names() {
        let json = serde_json::to_value(sample_report()).unwrap();
        for field in ["device_id", "v_ref", "resolution", "timestamp", "channel_id", "raw_data"] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
        assert_eq!(json["channel_id"][2], -1);
    }

    #[test]
    fn test_shared_engine_state() {
        let state = SharedEngineState::new();
        assert_eq!(state.get(), EngineState::Uninitialized);

        let other = state.clone();
        other.set(EngineState::Running);
        assert_eq!(state.get(), EngineState::Running);
    }

    #[test]
    fn test_cycle_stats() {
        let mut stats = CycleStats::default();
        assert_eq!(stats.avg_cycle_time_us(), 0.0);

        stats.record_cycle(100, 0);
        stats.record_cycle(300, 2);

        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.sample_timeouts, 2);
        assert_eq!(stats.min_cycle_time_us, 100);
        assert_eq!(stats.max_cycle_time_us, 300);
        assert_eq!(stats.jitter_us(), 200);
        assert_eq!(stats.avg_cycle_time_us(), 200.0);

        stats.reset();
        assert_eq!(stats.cycles, 0);
    }
}
