//! Metrics collection module for the adaptive brightness daemon.
//!
//! Tracks cycle, fault and ramp counts for the status command.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Metrics data exposed via IPC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsResponse {
    /// Control loop cycles that read the sensor
    pub cycles: u64,
    /// Sensor reads that failed
    pub sensor_failures: u64,
    /// Backlight reads that failed (cycle skipped)
    pub device_read_failures: u64,
    /// Ramps that reached their target
    pub ramps_completed: u64,
    /// Ramps cut short by a write failure
    pub ramps_aborted: u64,
    /// Values written to the backlight
    pub backlight_writes: u64,
    /// Cycles where actuation was skipped deep in a stable plateau
    pub skipped_actuations: u64,
    /// Uptime in seconds
    pub uptime_sec: u64,
}

/// Metrics collector for the daemon
pub struct MetricsCollector {
    start_time: Instant,
    cycles: AtomicU64,
    sensor_failures: AtomicU64,
    device_read_failures: AtomicU64,
    ramps_completed: AtomicU64,
    ramps_aborted: AtomicU64,
    backlight_writes: AtomicU64,
    skipped_actuations: AtomicU64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: AtomicU64::new(0),
            sensor_failures: AtomicU64::new(0),
            device_read_failures: AtomicU64::new(0),
            ramps_completed: AtomicU64::new(0),
            ramps_aborted: AtomicU64::new(0),
            backlight_writes: AtomicU64::new(0),
            skipped_actuations: AtomicU64::new(0),
        }
    }

    pub fn record_cycle(&self) {
        self.cycles.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_sensor_failure(&self) {
        self.sensor_failures.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_device_read_failure(&self) {
        self.device_read_failures.fetch_add(1, Ordering::SeqCst);
    }

    /// Record a finished ramp and the number of writes it committed
    pub fn record_ramp(&self, writes: usize, completed: bool) {
        self.backlight_writes.fetch_add(writes as u64, Ordering::SeqCst);
        if completed {
            self.ramps_completed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.ramps_aborted.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn record_skipped_actuation(&self) {
        self.skipped_actuations.fetch_add(1, Ordering::SeqCst);
    }

    /// Get current metrics
    pub fn get_metrics(&self) -> MetricsResponse {
        MetricsResponse {
            cycles: self.cycles.load(Ordering::SeqCst),
            sensor_failures: self.sensor_failures.load(Ordering::SeqCst),
            device_read_failures: self.device_read_failures.load(Ordering::SeqCst),
            ramps_completed: self.ramps_completed.load(Ordering::SeqCst),
            ramps_aborted: self.ramps_aborted.load(Ordering::SeqCst),
            backlight_writes: self.backlight_writes.load(Ordering::SeqCst),
            skipped_actuations: self.skipped_actuations.load(Ordering::SeqCst),
            uptime_sec: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
