//! Configuration module for persistent settings.
//!
//! This module handles loading, saving, and validating daemon configuration.
//! The configuration is read once at startup and stays static afterwards.

use crate::backlight::DEFAULT_STEP;
use crate::error::ConfigError;
use crate::sensor::DEFAULT_NUM_READINGS;
use crate::stability::{STABILITY_DURATION, STABILITY_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default location of the pause flag file.
pub const DEFAULT_PAUSE_FLAG_PATH: &str = "/tmp/adaptive_brightness_pause.flag";

/// Brightness presets tuned for different viewing situations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Smooth, unhurried adjustments while reading
    Reading,
    /// Steep curve and fast ramps for daylight
    Day,
    /// Moderate speed for gradual evening light
    Evening,
    /// Slowest, least distracting transitions
    Movie,
    /// Dim floor and gentle curve
    Night,
}

impl Profile {
    /// (sensitivity_factor, min_brightness_level, step) for this preset.
    pub fn tuning(&self) -> (f64, u32, u32) {
        match self {
            Profile::Reading => (0.8, 100, 50),
            Profile::Day => (1.5, 200, 100),
            Profile::Evening => (1.2, 50, 50),
            Profile::Movie => (0.5, 80, 20),
            Profile::Night => (0.3, 10, 30),
        }
    }
}

/// Daemon configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Curve steepness; higher values brighten faster with ambient light
    pub sensitivity_factor: f64,
    /// Floor below which the backlight is never driven
    pub min_brightness_level: u32,
    /// Moving average window size
    pub num_readings: usize,
    /// Sensor ceiling used to normalise the curve
    pub max_sensor_value: u32,
    /// Hardware ceiling of the backlight register
    pub max_backlight_value: u32,
    /// Ramp granularity in backlight units
    pub step: u32,
    /// Dead band on the moving average before a change is recognised
    pub stability_threshold: f64,
    /// Time the average must hold still before the cooldown grows
    pub stability_duration_secs: u64,
    /// Backlight device name under /sys/class/backlight, discovered if unset
    pub backlight_device: Option<String>,
    /// Sentinel file whose presence pauses adjustments
    pub pause_flag_path: PathBuf,
    /// Preset applied on top of the values above
    pub profile: Option<Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sensitivity_factor: 1.0,
            min_brightness_level: 400,
            num_readings: DEFAULT_NUM_READINGS,
            max_sensor_value: 2752,
            max_backlight_value: 4095,
            step: DEFAULT_STEP,
            stability_threshold: STABILITY_THRESHOLD,
            stability_duration_secs: STABILITY_DURATION.as_secs(),
            backlight_device: None,
            pause_flag_path: PathBuf::from(DEFAULT_PAUSE_FLAG_PATH),
            profile: None,
        }
    }
}

impl Config {
    /// Validate configuration values.
    /// Returns Ok(()) if valid, Err with descriptive message if invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sensor_value <= 1 {
            return Err(ConfigError::ValidationError(format!(
                "max_sensor_value ({}) must be greater than 1",
                self.max_sensor_value
            )));
        }

        if self.num_readings == 0 {
            return Err(ConfigError::ValidationError(
                "num_readings must be at least 1".to_string(),
            ));
        }

        if self.step == 0 {
            return Err(ConfigError::ValidationError(
                "step must be at least 1".to_string(),
            ));
        }

        if !self.sensitivity_factor.is_finite() || self.sensitivity_factor <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "sensitivity_factor ({}) must be a positive number",
                self.sensitivity_factor
            )));
        }

        if !self.stability_threshold.is_finite() || self.stability_threshold < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "stability_threshold ({}) must not be negative",
                self.stability_threshold
            )));
        }

        if self.stability_duration_secs == 0 {
            return Err(ConfigError::ValidationError(
                "stability_duration_secs must be at least 1".to_string(),
            ));
        }

        if self.max_backlight_value == 0 {
            return Err(ConfigError::ValidationError(
                "max_backlight_value must be at least 1".to_string(),
            ));
        }

        if self.min_brightness_level > self.max_backlight_value {
            return Err(ConfigError::ValidationError(format!(
                "min_brightness_level ({}) cannot be greater than max_backlight_value ({})",
                self.min_brightness_level, self.max_backlight_value
            )));
        }

        Ok(())
    }

    /// Overwrite the tuning values with the selected preset, if any.
    pub fn apply_profile(&mut self) {
        if let Some(profile) = self.profile {
            let (sensitivity_factor, min_brightness_level, step) = profile.tuning();
            self.sensitivity_factor = sensitivity_factor;
            self.min_brightness_level = min_brightness_level;
            self.step = step;
        }
    }

    pub fn stability_duration(&self) -> Duration {
        Duration::from_secs(self.stability_duration_secs)
    }

    /// Load configuration from file or use defaults.
    /// If the file doesn't exist, returns the default config.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            ConfigError::ParseError(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file using atomic write.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Atomic write: write to temp file, then rename
        let temp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseError(format!("Failed to serialize config: {}", e)))?;

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Get the default config path (~/.config/adaptive-brightness/config.json).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("adaptive-brightness")
            .join("config.json")
    }
}
