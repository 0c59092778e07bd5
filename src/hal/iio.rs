//! Linux Industrial I/O converter
//!
//! Reads conversions from the sysfs interface of an IIO ADC. The base
//! handle selects the device (`<root>/iio:device<base>`), and each channel
//! is read from `in_voltage<channel>_raw`. A failed or unparsable read is
//! reported as a conversion timeout so the cycle can carry on.

use crate::config::IioConfig;
use crate::error::{AdcError, Result};
use crate::types::SAMPLE_TIMEOUT;
use std::path::{Path, PathBuf};

use super::AdcHal;

/// Value of `ENODEV`, returned when the device directory does not exist
const ENODEV: i32 = 19;

/// sysfs-backed converter
#[derive(Debug, Clone)]
pub struct IioAdc {
    sysfs_root: PathBuf,
    device_dir: Option<PathBuf>,
    reference_voltage: f32,
    resolution_bits: u8,
    temp_sensor_channel: Option<u8>,
}

impl IioAdc {
    pub fn from_config(config: &IioConfig) -> Self {
        Self {
            sysfs_root: config.sysfs_root.clone(),
            device_dir: None,
            reference_voltage: config.reference_voltage,
            resolution_bits: config.resolution_bits.clamp(1, 31),
            temp_sensor_channel: config.temp_sensor_channel,
        }
    }

    /// Device directory for a base handle
    pub fn device_path(root: &Path, base: u32) -> PathBuf {
        root.join(format!("iio:device{}", base))
    }

    fn read_raw(dir: &Path, channel: u8) -> std::io::Result<u32> {
        let path = dir.join(format!("in_voltage{}_raw", channel));
        let content = std::fs::read_to_string(&path)?;
        content
            .trim()
            .parse::<u32>()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

impl AdcHal for IioAdc {
    fn init(&mut self, base: u32) -> Result<()> {
        let dir = Self::device_path(&self.sysfs_root, base);
        if !dir.is_dir() {
            tracing::error!("IIO device {:?} not found", dir);
            return Err(AdcError::HalInit {
                base,
                code: -ENODEV,
            });
        }

        match std::fs::read_to_string(dir.join("name")) {
            Ok(name) => tracing::info!("Using IIO device {:?} ({})", dir, name.trim()),
            Err(_) => tracing::info!("Using IIO device {:?}", dir),
        }

        self.device_dir = Some(dir);
        Ok(())
    }

    fn uninit(&mut self, _base: u32) {
        self.device_dir = None;
    }

    fn sample(&mut self, _base: u32, channel: u8) -> u32 {
        let Some(dir) = self.device_dir.as_deref() else {
            return SAMPLE_TIMEOUT;
        };

        match Self::read_raw(dir, channel) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::trace!("IIO read of channel {} failed: {}", channel, e);
                SAMPLE_TIMEOUT
            }
        }
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

    fn fake_sysfs() -> (tempfile::TempDir, IioAdc) {
        let root = tempfile::tempdir().unwrap();
        let dev = root.path().join("iio:device0");
        std::fs::create_dir(&dev).unwrap();
        std::fs::write(dev.join("name"), "ads1015\n").unwrap();
        std::fs::write(dev.join("in_voltage0_raw"), "1234\n").unwrap();
        std::fs::write(dev.join("in_voltage1_raw"), "garbage").unwrap();

        let config = IioConfig {
            sysfs_root: root.path().to_path_buf(),
            ..Default::default()
        };
        (root, IioAdc::from_config(&config))
    }

    #[test]
    fn test_reads_raw_values() {
        let (_root, mut adc) = fake_sysfs();
        adc.init(0).unwrap();
        assert_eq!(adc.sample(0, 0), 1234);
    }

    #[test]
    fn test_bad_reads_are_timeouts() {
        let (_root, mut adc) = fake_sysfs();
        adc.init(0).unwrap();
        assert_eq!(adc.sample(0, 1), SAMPLE_TIMEOUT);
        assert_eq!(adc.sample(0, 5), SAMPLE_TIMEOUT);
    }

    #[test]
    fn test_missing_device_fails_init() {
        let (_root, mut adc) = fake_sysfs();
        let err = adc.init(3).unwrap_err();
        assert!(matches!(err, AdcError::HalInit { base: 3, code: -19 }));
    }

    #[test]
    fn test_sample_after_uninit() {
        let (_root, mut adc) = fake_sysfs();
        adc.init(0).unwrap();
        adc.uninit(0);
        assert_eq!(adc.sample(0, 0), SAMPLE_TIMEOUT);
    }
}
