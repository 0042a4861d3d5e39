//! Ambient light sensor acquisition and smoothing.
//!
//! The sensor is a single integer attribute in sysfs. Readings are fed into
//! a fixed-size moving average window that survives pauses.

use crate::error::SensorError;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Default moving average window size.
pub const DEFAULT_NUM_READINGS: usize = 10;

/// Source of raw light intensity readings.
pub trait LightSensor: Send {
    /// Read the current raw intensity in device units.
    fn read_raw(&mut self) -> Result<u32, SensorError>;
}

/// Light sensor backed by an IIO sysfs attribute such as
/// `/sys/bus/iio/devices/iio:device0/in_intensity_both_raw`.
#[derive(Debug, Clone)]
pub struct SysfsLightSensor {
    path: PathBuf,
}

impl SysfsLightSensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LightSensor for SysfsLightSensor {
    fn read_raw(&mut self) -> Result<u32, SensorError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| SensorError::Unavailable {
                path: self.path.display().to_string(),
                source: e,
            })?;

        let trimmed = contents.trim();
        trimmed
            .parse::<u32>()
            .map_err(|_| SensorError::InvalidReading(trimmed.to_string()))
    }
}

/// Moving average over the last `capacity` sensor samples.
///
/// The oldest sample is evicted once the window is full.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    readings: VecDeque<u32>,
    capacity: usize,
}

impl SmoothingFilter {
    /// Create a filter with the given window size.
    ///
    /// A zero capacity is treated as a window of one; configuration
    /// validation rejects it before the loop is ever built.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample and return the mean of the retained window.
    pub fn push(&mut self, sample: u32) -> f64 {
        if self.readings.len() >= self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(sample);
        self.average()
    }

    /// Mean of the current window, or 0.0 before the first sample.
    pub fn average(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let sum: u64 = self.readings.iter().map(|&r| r as u64).sum();
        sum as f64 / self.len() as f64
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &u32> {
        self.readings.iter()
    }
}

impl Default for SmoothingFilter {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_READINGS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::tempdir;

    #[test]
    fn test_window_of_three() {
        let mut filter = SmoothingFilter::new(3);
        let estimates: Vec<f64> = [10, 20, 30, 40].iter().map(|&s| filter.push(s)).collect();
        assert_eq!(estimates, vec![10.0, 15.0, 20.0, 30.0]);
        assert_eq!(filter.len(), 3);
    }

    #[test]
    fn test_window_of_one_returns_sample() {
        let mut filter = SmoothingFilter::new(1);
        assert_eq!(filter.push(7), 7.0);
        assert_eq!(filter.push(1234), 1234.0);
        assert_eq!(filter.len(), 1);
    }

    #[test]
    fn test_zero_capacity_degrades_to_one() {
        let filter = SmoothingFilter::new(0);
        assert_eq!(filter.capacity(), 1);
    }

    #[test]
    fn test_empty_average() {
        let filter = SmoothingFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.average(), 0.0);
        assert_eq!(filter.capacity(), DEFAULT_NUM_READINGS);
    }

    #[test]
    fn test_sysfs_sensor_reads_trimmed_value() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in_intensity_both_raw");
        std::fs::write(&path, "412\n").unwrap();

        let mut sensor = SysfsLightSensor::new(&path);
        assert_eq!(sensor.read_raw().unwrap(), 412);
    }

    #[test]
    fn test_sysfs_sensor_missing_file() {
        let dir = tempdir().unwrap();
        let mut sensor = SysfsLightSensor::new(dir.path().join("missing"));
        assert!(matches!(sensor.read_raw(), Err(SensorError::Unavailable { .. })));
    }

    #[test]
    fn test_sysfs_sensor_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("in_intensity_both_raw");
        std::fs::write(&path, "-3").unwrap();

        let mut sensor = SysfsLightSensor::new(&path);
        assert!(matches!(sensor.read_raw(), Err(SensorError::InvalidReading(_))));
    }

    proptest! {
        #[test]
        fn prop_window_holds_most_recent_samples(
            capacity in 1usize..20,
            samples in prop::collection::vec(0u32..5000, 1..100),
        ) {
            let mut filter = SmoothingFilter::new(capacity);
            let mut estimate = 0.0;
            for &sample in &samples {
                estimate = filter.push(sample);
                prop_assert!(filter.len() <= capacity);
            }

            let start = samples.len().saturating_sub(capacity);
            let window = &samples[start..];
            let expected = window.iter().map(|&s| s as f64).sum::<f64>() / window.len() as f64;
            prop_assert!((estimate - expected).abs() < 1e-9);

            let retained: Vec<u32> = filter.iter().copied().collect();
            prop_assert_eq!(retained, window.to_vec());
        }
    }
}
