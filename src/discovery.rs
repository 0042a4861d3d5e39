//! Device discovery for the ambient light sensor and the backlight.
//!
//! Runs once at startup; the resolved paths are injected into the sensor
//! reader and the actuator.

use crate::error::DiscoveryError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// IIO device root
pub const IIO_PATH: &str = "/sys/bus/iio/devices";

/// Backlight class root
pub const BACKLIGHT_PATH: &str = "/sys/class/backlight";

/// IIO `name` attribute value identifying the light sensor
const ALS_NAME: &str = "als";

/// Intensity attributes, in order of preference
const SENSOR_ATTRIBUTES: &[&str] = &["in_intensity_both_raw", "in_illuminance_raw"];

/// Resolved device locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePaths {
    /// Raw intensity attribute of the light sensor
    pub sensor: PathBuf,
    /// Backlight device directory holding `brightness`
    pub backlight_dir: PathBuf,
}

impl DevicePaths {
    /// Resolve both devices under the standard sysfs roots.
    pub fn discover(backlight_device: Option<&str>) -> Result<Self, DiscoveryError> {
        Self::discover_in(Path::new(IIO_PATH), Path::new(BACKLIGHT_PATH), backlight_device)
    }

    /// Resolve both devices under the given roots.
    pub fn discover_in(
        iio_root: &Path,
        backlight_root: &Path,
        backlight_device: Option<&str>,
    ) -> Result<Self, DiscoveryError> {
        let sensor = locate_als_sensor(iio_root)?;
        let backlight_dir = match backlight_device {
            Some(name) => backlight_root.join(name),
            None => locate_backlight(backlight_root)?,
        };
        Ok(Self {
            sensor,
            backlight_dir,
        })
    }

    /// Name of the backlight device (last path component).
    pub fn backlight_name(&self) -> String {
        self.backlight_dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "backlight".to_string())
    }
}

/// Find the intensity attribute of the first IIO device named `als`.
pub fn locate_als_sensor(iio_root: &Path) -> Result<PathBuf, DiscoveryError> {
    let entries = std::fs::read_dir(iio_root).map_err(|e| DiscoveryError::ScanFailed {
        path: iio_root.display().to_string(),
        source: e,
    })?;

    let mut devices: Vec<PathBuf> = entries
        .flatten()
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("iio:device"))
        .map(|entry| entry.path())
        .collect();
    devices.sort();

    for device in devices {
        let name = match std::fs::read_to_string(device.join("name")) {
            Ok(name) => name,
            Err(_) => continue,
        };
        if name.trim() != ALS_NAME {
            continue;
        }

        debug!("Found ALS device: {}", device.display());
        for attribute in SENSOR_ATTRIBUTES {
            let path = device.join(attribute);
            if path.exists() {
                return Ok(path);
            }
        }
    }

    Err(DiscoveryError::SensorNotFound(iio_root.display().to_string()))
}

/// Pick the first backlight device.
pub fn locate_backlight(backlight_root: &Path) -> Result<PathBuf, DiscoveryError> {
    let entries = std::fs::read_dir(backlight_root).map_err(|e| DiscoveryError::ScanFailed {
        path: backlight_root.display().to_string(),
        source: e,
    })?;

    let mut devices: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    devices.sort();
    debug!("Found backlight devices: {:?}", devices);

    devices
        .into_iter()
        .next()
        .ok_or_else(|| DiscoveryError::BacklightNotFound(backlight_root.display().to_string()))
}
