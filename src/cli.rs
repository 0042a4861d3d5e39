//! Command-line arguments.

use crate::config::{Config, Profile};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Adaptive display brightness driven by the ambient light sensor
#[derive(Parser, Debug)]
#[command(name = "adaptive-brightness")]
#[command(version, about = "Adaptive display brightness driven by the ambient light sensor")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the brightness daemon
    Start(StartArgs),

    /// Pause brightness adjustment (creates the pause flag)
    Pause,

    /// Resume brightness adjustment (removes the pause flag)
    Resume,

    /// Query the running daemon
    Status,

    /// Write the effective configuration to the config file
    InitConfig(StartArgs),
}

/// Overrides applied on top of the config file
#[derive(Args, Debug, Default, Clone)]
pub struct StartArgs {
    /// Minimum brightness level
    #[arg(long)]
    pub min_brightness_level: Option<u32>,

    /// Sensitivity factor of the brightness curve
    #[arg(long)]
    pub sensitivity_factor: Option<f64>,

    /// Step size for brightness ramps
    #[arg(long)]
    pub step: Option<u32>,

    /// Number of readings in the moving average
    #[arg(long)]
    pub num_readings: Option<usize>,

    /// Maximum ambient light sensor value
    #[arg(long)]
    pub max_sensor_value: Option<u32>,

    /// Maximum backlight value
    #[arg(long)]
    pub max_backlight_value: Option<u32>,

    /// Backlight device name under /sys/class/backlight
    #[arg(long)]
    pub backlight_device: Option<String>,

    /// Brightness profile
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Disable all log output
    #[arg(long)]
    pub silent: bool,
}

impl StartArgs {
    /// Apply the profile, then any explicit flags, to `config`.
    ///
    /// Explicit flags win over the profile's presets.
    pub fn apply_to(&self, config: &mut Config) {
        if self.profile.is_some() {
            config.profile = self.profile;
        }
        config.apply_profile();

        if let Some(value) = self.min_brightness_level {
            config.min_brightness_level = value;
        }
        if let Some(value) = self.sensitivity_factor {
            config.sensitivity_factor = value;
        }
        if let Some(value) = self.step {
            config.step = value;
        }
        if let Some(value) = self.num_readings {
            config.num_readings = value;
        }
        if let Some(value) = self.max_sensor_value {
            config.max_sensor_value = value;
        }
        if let Some(value) = self.max_backlight_value {
            config.max_backlight_value = value;
        }
        if let Some(device) = &self.backlight_device {
            config.backlight_device = Some(device.clone());
        }
    }
}
