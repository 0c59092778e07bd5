//! Channel set resolution and the per-cycle sample buffer
//!
//! A requested channel mask is merged with the converter's always-on mask
//! (the internal temperature reference) and expanded into an ascending list
//! of channel ids. The [`SampleBuffer`] holds one slot per resolved channel
//! and is rewritten in place by every sampling cycle.

use crate::types::{MAX_SUPPORTED_CHANNELS, TOTAL_CHANNELS};

/// Ordered, unique list of channels to sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSet {
    mask: u32,
    channels: Vec<u8>,
}

impl ChannelSet {
    /// Expand `requested | always_on` into ascending channel ids.
    ///
    /// More than [`MAX_SUPPORTED_CHANNELS`] channels is a configuration
    /// error: it is logged and the full list is kept, so later reports will
    /// only carry the first [`MAX_SUPPORTED_CHANNELS`] of them.
    pub fn resolve(requested: u32, always_on: u32) -> Self {
        let mask = requested | always_on;
        let channels: Vec<u8> = (0..TOTAL_CHANNELS)
            .filter(|ch| mask & (1u32 << ch) != 0)
            .collect();

        if channels.len() > MAX_SUPPORTED_CHANNELS {
            tracing::error!(
                "MAX_SUPPORTED_CHANNELS is too small ({}, {})",
                MAX_SUPPORTED_CHANNELS,
                channels.len()
            );
        }

        Self { mask, channels }
    }

    /// Effective mask including the always-on bits
    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn channels(&self) -> &[u8] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Whether more channels are configured than a report can carry
    pub fn is_over_capacity(&self) -> bool {
        self.channels.len() > MAX_SUPPORTED_CHANNELS
    }

    pub fn contains(&self, channel: u8) -> bool {
        channel < TOTAL_CHANNELS && self.mask & (1u32 << channel) != 0
    }
}

impl std::fmt::Display for ChannelSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x} [", self.mask)?;
        for (i, ch) in self.channels.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", ch)?;
        }
        write!(f, "]")
    }
}

/// Last reading of one channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSample {
    pub channel: u8,
    /// Raw conversion result, 0 until the first cycle
    pub raw: u32,
}

/// One slot per configured channel, in channel order
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Vec<ChannelSample>,
}

impl SampleBuffer {
    pub fn new(set: &ChannelSet) -> Self {
        let samples = set
            .channels()
            .iter()
            .map(|&channel| ChannelSample { channel, raw: 0 })
            .collect();
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[ChannelSample] {
        &self.samples
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ChannelSample> {
        self.samples.iter_mut()
    }
}
