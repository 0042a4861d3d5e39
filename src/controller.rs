//! The adaptive brightness control loop.
//!
//! Each cycle: check pause → read sensor → smooth → classify stability and
//! derive the cooldown → map to a target → ramp the backlight → sleep.
//! Sensor and backlight faults only skip the current cycle.

use crate::backlight::{Actuator, BacklightDevice};
use crate::config::Config;
use crate::curve::BrightnessCurve;
use crate::error::DeviceError;
use crate::ipc_server::DaemonState;
use crate::pause::PauseGate;
use crate::sensor::{LightSensor, SmoothingFilter};
use crate::stability::{StabilityTracker, StabilityUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Backoff between pause flag polls while paused.
pub const PAUSE_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before retrying after a failed sensor read.
pub const SENSOR_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Smoothing and stability state carried across cycles and pauses.
#[derive(Debug, Clone)]
pub struct ControllerState {
    pub filter: SmoothingFilter,
    pub tracker: StabilityTracker,
    pub curve: BrightnessCurve,
}

impl ControllerState {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: SmoothingFilter::new(config.num_readings),
            tracker: StabilityTracker::new(config.stability_threshold, config.stability_duration()),
            curve: BrightnessCurve::new(
                config.max_sensor_value,
                config.sensitivity_factor,
                config.min_brightness_level,
            ),
        }
    }
}

/// What happened in one cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Paused; nothing was read or written
    Paused,
    /// Sensor read failed; state untouched
    SensorUnavailable,
    /// Backlight driven toward `target`
    Adjusted {
        target: u32,
        brightness: u32,
        complete: bool,
        cooldown: Duration,
    },
    /// Backlight could not be read or locked; ramp skipped
    DeviceUnavailable { cooldown: Duration },
    /// Deep in a stable plateau; actuation skipped
    Skipped { cooldown: Duration },
}

impl CycleOutcome {
    /// How long to sleep before the next cycle.
    pub fn next_delay(&self) -> Duration {
        match self {
            CycleOutcome::Paused => PAUSE_BACKOFF,
            CycleOutcome::SensorUnavailable => SENSOR_RETRY_INTERVAL,
            CycleOutcome::Adjusted { cooldown, .. }
            | CycleOutcome::DeviceUnavailable { cooldown }
            | CycleOutcome::Skipped { cooldown } => *cooldown,
        }
    }
}

/// Owns the controller state and drives one backlight from one sensor.
pub struct ControlLoop<S, B> {
    sensor: S,
    actuator: Actuator<B>,
    gate: PauseGate,
    state: ControllerState,
    shared: Arc<DaemonState>,
    was_paused: bool,
}

impl<S: LightSensor, B: BacklightDevice> ControlLoop<S, B> {
    pub fn new(
        config: &Config,
        sensor: S,
        actuator: Actuator<B>,
        shared: Arc<DaemonState>,
    ) -> Self {
        Self {
            sensor,
            actuator,
            gate: shared.gate.clone(),
            state: ControllerState::from_config(config),
            shared,
            was_paused: false,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Read the backlight once before the loop starts.
    ///
    /// Failure here means the device is misconfigured and is fatal.
    pub async fn establish_baseline(&self) -> Result<u32, DeviceError> {
        let current = self.actuator.current().await?;
        self.shared.snapshot.write().await.brightness = Some(current);
        info!(
            "Baseline brightness: {} (ramp step {}, ceiling {})",
            current,
            self.actuator.step(),
            self.actuator.max_backlight_value()
        );
        Ok(current)
    }

    /// Run one control cycle.
    pub async fn step(&mut self) -> CycleOutcome {
        if self.gate.is_paused() {
            if !self.was_paused {
                info!(
                    "Brightness adjustment is paused (flag file {} or command)",
                    self.gate.flag_path().display()
                );
                self.was_paused = true;
            }
            return CycleOutcome::Paused;
        }
        if self.was_paused {
            info!("Brightness adjustment resumed");
            self.was_paused = false;
        }

        let sample = match self.sensor.read_raw() {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Failed to read sensor data: {}", e);
                self.shared.metrics.record_sensor_failure();
                return CycleOutcome::SensorUnavailable;
            }
        };
        self.shared.metrics.record_cycle();

        let estimate = self.state.filter.push(sample);
        debug!(
            "Moving average: {:.2} ({}/{} readings)",
            estimate,
            self.state.filter.len(),
            self.state.filter.capacity()
        );

        let now = tokio::time::Instant::now().into_std();
        let update = self.state.tracker.update(estimate, now);
        if !update.is_stable() {
            if let Some(stable) = self.state.tracker.stable_value() {
                debug!("Ambient light changed, new stable value {:.2}", stable);
            }
        }

        let (outcome, target) = if self.state.tracker.should_actuate(now) {
            let target = self
                .state
                .curve
                .map(estimate)
                .min(self.actuator.max_backlight_value());
            debug!("Target brightness: {}", target);
            (self.actuate(target, update.cooldown).await, Some(target))
        } else {
            debug!("Stable plateau, skipping adjustment");
            self.shared.metrics.record_skipped_actuation();
            (CycleOutcome::Skipped { cooldown: update.cooldown }, None)
        };

        self.publish(sample, estimate, &update, target, &outcome, now).await;
        debug!("Cooldown period: {:?}", self.state.tracker.cooldown());
        outcome
    }

    async fn actuate(&self, target: u32, cooldown: Duration) -> CycleOutcome {
        match self.actuator.drive_to(target).await {
            Ok(report) => {
                self.shared
                    .metrics
                    .record_ramp(report.writes.len(), report.is_complete());
                let brightness = report.last_written().unwrap_or(report.start);
                CycleOutcome::Adjusted {
                    target: report.target,
                    brightness,
                    complete: report.is_complete(),
                    cooldown,
                }
            }
            Err(e) => {
                warn!("Skipping brightness adjustment this cycle: {}", e);
                self.shared.metrics.record_device_read_failure();
                CycleOutcome::DeviceUnavailable { cooldown }
            }
        }
    }

    async fn publish(
        &self,
        sample: u32,
        estimate: f64,
        update: &StabilityUpdate,
        target: Option<u32>,
        outcome: &CycleOutcome,
        now: std::time::Instant,
    ) {
        let tracker = &self.state.tracker;
        let mut snapshot = self.shared.snapshot.write().await;
        snapshot.last_sample = Some(sample);
        snapshot.moving_average = Some(estimate);
        snapshot.stability = Some(update.stability.as_str().to_string());
        snapshot.cooldown_secs = tracker.cooldown().as_secs();
        snapshot.stable_for_secs = now
            .saturating_duration_since(tracker.last_change_time())
            .as_secs();
        snapshot.readings = self.state.filter.len();
        if target.is_some() {
            snapshot.last_target = target;
        }
        if let CycleOutcome::Adjusted { brightness, .. } = outcome {
            snapshot.brightness = Some(*brightness);
        }
    }

    /// Run cycles until shutdown is signalled.
    ///
    /// Shutdown is only observed between cycles, so a ramp in progress
    /// always finishes.
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let outcome = self.step().await;

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                _ = tokio::time::sleep(outcome.next_delay()) => {}
            }
        }
        info!("Control loop shutting down");
    }
}
