//! Backlight control: sysfs register access and rate-limited ramping.
//!
//! The actuator walks the backlight toward its target in fixed steps with a
//! short delay between writes so the transition is not visible, then lands
//! exactly on the target.

use crate::device_lock::DeviceLock;
use crate::error::DeviceError;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default ramp granularity in backlight units.
pub const DEFAULT_STEP: u32 = 50;

/// Delay between ramp steps when the step is larger than 50 units.
const FAST_STEP_INTERVAL_MS: u64 = 50;

/// Delay between ramp steps for small steps.
const SMOOTH_STEP_INTERVAL_MS: u64 = 100;

/// A scalar brightness register.
pub trait BacklightDevice: Send {
    fn read_brightness(&mut self) -> Result<u32, DeviceError>;
    fn write_brightness(&mut self, value: u32) -> Result<(), DeviceError>;
}

/// Backlight exposed under `/sys/class/backlight/<device>`.
#[derive(Debug, Clone)]
pub struct SysfsBacklight {
    dir: PathBuf,
}

impl SysfsBacklight {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn brightness_path(&self) -> PathBuf {
        self.dir.join("brightness")
    }

    /// Hardware ceiling reported by the driver.
    pub fn max_brightness(&self) -> Result<u32, DeviceError> {
        read_register(&self.dir.join("max_brightness"))
    }
}

impl BacklightDevice for SysfsBacklight {
    fn read_brightness(&mut self) -> Result<u32, DeviceError> {
        read_register(&self.brightness_path())
    }

    fn write_brightness(&mut self, value: u32) -> Result<(), DeviceError> {
        let path = self.brightness_path();
        std::fs::write(&path, value.to_string()).map_err(|e| DeviceError::WriteFailed {
            path: path.display().to_string(),
            value,
            source: e,
        })
    }
}

fn read_register(path: &Path) -> Result<u32, DeviceError> {
    let contents = std::fs::read_to_string(path).map_err(|e| DeviceError::ReadFailed {
        path: path.display().to_string(),
        source: e,
    })?;
    let trimmed = contents.trim();
    trimmed
        .parse::<u32>()
        .map_err(|_| DeviceError::InvalidValue(trimmed.to_string()))
}

/// Clamp `value` to `[0, max_backlight_value]` and write it.
///
/// Returns the value actually committed.
pub fn write_clamped<B: BacklightDevice + ?Sized>(
    device: &mut B,
    value: i64,
    max_backlight_value: u32,
) -> Result<u32, DeviceError> {
    let clamped = value.clamp(0, max_backlight_value as i64) as u32;
    device.write_brightness(clamped)?;
    Ok(clamped)
}

/// Delay between ramp steps for a given step size.
///
/// Large steps ramp faster; small steps favour smoothness.
pub fn step_interval(step: u32) -> Duration {
    if step > 50 {
        Duration::from_millis(FAST_STEP_INTERVAL_MS)
    } else {
        Duration::from_millis(SMOOTH_STEP_INTERVAL_MS)
    }
}

/// Outcome of one `drive_to` call.
#[derive(Debug)]
pub struct RampReport {
    /// Brightness read before ramping
    pub start: u32,
    /// Clamped target of the ramp
    pub target: u32,
    /// Values committed to the device, in order
    pub writes: Vec<u32>,
    /// Write failure that cut the ramp short
    pub aborted: Option<DeviceError>,
}

impl RampReport {
    fn new(start: u32, target: u32) -> Self {
        Self {
            start,
            target,
            writes: Vec::new(),
            aborted: None,
        }
    }

    /// True when the ramp reached its target without a write failure.
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }

    pub fn last_written(&self) -> Option<u32> {
        self.writes.last().copied()
    }
}

/// Drives a backlight device toward target values in bounded steps.
///
/// The device sits behind an async mutex and, optionally, a cross-process
/// `DeviceLock`; both are held for the whole read-step-write sequence.
pub struct Actuator<B> {
    device: Mutex<B>,
    lock: Option<DeviceLock>,
    step: u32,
    max_backlight_value: u32,
}

impl<B: BacklightDevice> Actuator<B> {
    pub fn new(device: B, step: u32, max_backlight_value: u32) -> Self {
        Self {
            device: Mutex::new(device),
            lock: None,
            step: step.max(1),
            max_backlight_value,
        }
    }

    /// Also hold `lock` while ramping.
    pub fn with_device_lock(mut self, lock: DeviceLock) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn max_backlight_value(&self) -> u32 {
        self.max_backlight_value
    }

    /// Read the current brightness.
    pub async fn current(&self) -> Result<u32, DeviceError> {
        let mut device = self.device.lock().await;
        device.read_brightness()
    }

    /// Ramp the backlight from its current value to `target`.
    ///
    /// Returns `Err` only if nothing could be done this cycle: the current
    /// brightness could not be read or the device lock was unavailable. A
    /// write failure mid-ramp stops the remaining steps and is reported in
    /// the returned `RampReport`.
    pub async fn drive_to(&self, target: u32) -> Result<RampReport, DeviceError> {
        let target = target.min(self.max_backlight_value);

        let mut device = self.device.lock().await;
        let _lock_guard = match &self.lock {
            Some(lock) => Some(lock.lock()?),
            None => None,
        };

        let current = device.read_brightness()?;
        debug!("Current brightness: {}", current);

        let mut report = RampReport::new(current, target);

        // Skip the write entirely when already at target
        if current == target {
            return Ok(report);
        }

        let step = self.step as i64;
        let target_value = target as i64;
        let step_value = if target_value > current as i64 { step } else { -step };
        let interval = step_interval(self.step);

        let mut new_value = current as i64;
        while (target_value - new_value).abs() >= step {
            new_value += step_value;
            match write_clamped(&mut *device, new_value, self.max_backlight_value) {
                Ok(written) => {
                    debug!("Adjusting brightness: {}", written);
                    report.writes.push(written);
                }
                Err(e) => {
                    warn!("Failed to write brightness, abandoning ramp: {}", e);
                    report.aborted = Some(e);
                    return Ok(report);
                }
            }
            tokio::time::sleep(interval).await;
        }

        // Final correcting write when the steps did not land on the target
        if report.last_written() != Some(target) {
            match write_clamped(&mut *device, target_value, self.max_backlight_value) {
                Ok(written) => report.writes.push(written),
                Err(e) => {
                    warn!("Failed to set brightness: {}", e);
                    report.aborted = Some(e);
                    return Ok(report);
                }
            }
        }

        debug!("Brightness adjusted to: {}", target);
        Ok(report)
    }
}
