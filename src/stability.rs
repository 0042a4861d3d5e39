//! Stability tracking with hysteresis and adaptive cooldown.
//!
//! The smoothed sensor estimate is compared against the last value that was
//! accepted as a real change. Small deviations are ignored; a plateau that
//! holds long enough backs the cooldown off exponentially, and any real
//! change snaps it back to the minimum.

use std::time::{Duration, Instant};

/// Default dead band around the stable value, in sensor units.
pub const STABILITY_THRESHOLD: f64 = 5.0;

/// Default time the estimate must hold before the cooldown grows.
pub const STABILITY_DURATION: Duration = Duration::from_secs(60);

/// Shortest cooldown, used whenever the scene is changing.
pub const MIN_COOLDOWN: Duration = Duration::from_secs(1);

/// Longest cooldown reached on a long plateau.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(30);

/// Classification produced by one update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Estimate moved outside the dead band (or this is the first reading)
    Changing,
    /// Plateau held for the stability duration and the cooldown was raised
    CooldownIncreased,
    /// Inside the dead band, cooldown untouched
    Steady,
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        !matches!(self, Stability::Changing)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stability::Changing => "Changing",
            Stability::CooldownIncreased => "CooldownIncreased",
            Stability::Steady => "Steady",
        }
    }
}

/// Result of feeding one estimate into the tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StabilityUpdate {
    pub stability: Stability,
    pub cooldown: Duration,
}

impl StabilityUpdate {
    pub fn is_stable(&self) -> bool {
        self.stability.is_stable()
    }
}

/// Hysteresis tracker deriving the poll/actuation cooldown.
#[derive(Debug, Clone)]
pub struct StabilityTracker {
    /// Last estimate accepted as a real change
    stable_value: Option<f64>,
    /// When `stable_value` was last replaced
    last_change_time: Instant,
    /// Current cooldown, always within [MIN_COOLDOWN, MAX_COOLDOWN]
    cooldown: Duration,
    threshold: f64,
    duration: Duration,
}

impl StabilityTracker {
    pub fn new(threshold: f64, duration: Duration) -> Self {
        Self::new_at(threshold, duration, Instant::now())
    }

    /// Create a tracker with an explicit start time (for testing).
    pub fn new_at(threshold: f64, duration: Duration, now: Instant) -> Self {
        Self {
            stable_value: None,
            last_change_time: now,
            cooldown: MIN_COOLDOWN,
            threshold,
            duration,
        }
    }

    pub fn stable_value(&self) -> Option<f64> {
        self.stable_value
    }

    pub fn last_change_time(&self) -> Instant {
        self.last_change_time
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Feed a smoothed estimate observed at `now`.
    ///
    /// # Algorithm
    /// - First estimate, or |estimate - stable_value| > threshold → accept it,
    ///   restart the plateau timer and reset the cooldown to 1s
    /// - Plateau held for at least `duration` → double the cooldown, capped at 30s
    /// - Otherwise → leave the cooldown alone
    pub fn update(&mut self, estimate: f64, now: Instant) -> StabilityUpdate {
        let changed = match self.stable_value {
            None => true,
            Some(stable) => {
                let delta = (estimate - stable).abs();
                tracing::debug!("Stability delta: {:.2}", delta);
                delta > self.threshold
            }
        };

        let stability = if changed {
            self.stable_value = Some(estimate);
            self.last_change_time = now;
            self.cooldown = MIN_COOLDOWN;
            tracing::debug!("Resetting cooldown period: {:?}", self.cooldown);
            Stability::Changing
        } else if self.elapsed(now) >= self.duration {
            self.cooldown = (self.cooldown * 2).min(MAX_COOLDOWN);
            tracing::debug!("Increasing cooldown period: {:?}", self.cooldown);
            Stability::CooldownIncreased
        } else {
            Stability::Steady
        };

        StabilityUpdate {
            stability,
            cooldown: self.cooldown,
        }
    }

    /// Whether this cycle should drive the backlight.
    ///
    /// True while the cooldown is at its minimum or the plateau is younger
    /// than the stability duration. Deep in a plateau with a raised
    /// cooldown, actuation is skipped.
    pub fn should_actuate(&self, now: Instant) -> bool {
        self.cooldown == MIN_COOLDOWN || self.elapsed(now) < self.duration
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_change_time)
    }
}

impl Default for StabilityTracker {
    fn default() -> Self {
        Self::new(STABILITY_THRESHOLD, STABILITY_DURATION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn tracker(start: Instant) -> StabilityTracker {
        StabilityTracker::new_at(STABILITY_THRESHOLD, STABILITY_DURATION, start)
    }

    #[test]
    fn test_first_reading_is_a_change() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        assert!(tracker.stable_value().is_none());

        let update = tracker.update(100.0, start);
        assert_eq!(update.stability, Stability::Changing);
        assert!(!update.is_stable());
        assert_eq!(update.cooldown, MIN_COOLDOWN);
        assert_eq!(tracker.stable_value(), Some(100.0));
    }

    #[test]
    fn test_small_noise_is_ignored() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(100.0, start);

        let update = tracker.update(104.9, start + Duration::from_secs(1));
        assert_eq!(update.stability, Stability::Steady);
        assert!(update.is_stable());
        // Noise never moves the reference value
        assert_eq!(tracker.stable_value(), Some(100.0));
        assert_eq!(tracker.last_change_time(), start);
    }

    #[test]
    fn test_deviation_exactly_at_threshold_is_stable() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(100.0, start);

        let update = tracker.update(105.0, start + Duration::from_secs(1));
        assert_eq!(update.stability, Stability::Steady);
    }

    #[test]
    fn test_plateau_doubles_cooldown_once_at_duration() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(50.0, start);

        let before = tracker.update(50.0, start + Duration::from_secs(59));
        assert_eq!(before.stability, Stability::Steady);
        assert_eq!(before.cooldown, Duration::from_secs(1));

        let at = tracker.update(50.0, start + STABILITY_DURATION);
        assert_eq!(at.stability, Stability::CooldownIncreased);
        assert_eq!(at.cooldown, Duration::from_secs(2));
    }

    #[test]
    fn test_plateau_keeps_doubling_until_cap() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(50.0, start);

        let mut now = start + STABILITY_DURATION;
        let mut cooldowns = Vec::new();
        for _ in 0..7 {
            let update = tracker.update(50.0, now);
            cooldowns.push(update.cooldown.as_secs());
            now += update.cooldown;
        }
        assert_eq!(cooldowns, vec![2, 4, 8, 16, 30, 30, 30]);
    }

    #[test]
    fn test_real_change_resets_cooldown() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(50.0, start);
        tracker.update(50.0, start + STABILITY_DURATION);
        tracker.update(50.0, start + STABILITY_DURATION + Duration::from_secs(2));
        assert_eq!(tracker.cooldown(), Duration::from_secs(4));

        let jump_at = start + Duration::from_secs(70);
        let update = tracker.update(56.0, jump_at);
        assert_eq!(update.stability, Stability::Changing);
        assert_eq!(update.cooldown, MIN_COOLDOWN);
        assert_eq!(tracker.last_change_time(), jump_at);
        assert_eq!(tracker.stable_value(), Some(56.0));
    }

    #[test]
    fn test_should_actuate_within_duration() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(50.0, start);
        assert!(tracker.should_actuate(start));
        assert!(tracker.should_actuate(start + Duration::from_secs(59)));
    }

    #[test]
    fn test_should_actuate_at_duration_with_min_cooldown() {
        // Plateau is old enough but the cooldown has not been raised yet
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(50.0, start);
        assert!(tracker.should_actuate(start + Duration::from_secs(120)));
    }

    #[test]
    fn test_actuation_skipped_deep_in_plateau() {
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(50.0, start);

        let now = start + STABILITY_DURATION;
        tracker.update(50.0, now);
        assert_eq!(tracker.cooldown(), Duration::from_secs(2));
        assert!(!tracker.should_actuate(now));
    }

    #[test]
    fn test_drift_within_band_is_not_tracked() {
        // A slow drift that never exceeds the band relative to the stable
        // value keeps the old reference, so the plateau timer keeps running.
        let start = Instant::now();
        let mut tracker = tracker(start);
        tracker.update(100.0, start);

        for (secs, value) in [(10, 102.0), (20, 104.0), (60, 105.0)] {
            tracker.update(value, start + Duration::from_secs(secs));
        }
        assert_eq!(tracker.stable_value(), Some(100.0));
        assert_eq!(tracker.cooldown(), Duration::from_secs(2));
        assert!(!tracker.should_actuate(start + Duration::from_secs(60)));

        // One more unit past the band snaps straight back to fast response
        let update = tracker.update(105.5, start + Duration::from_secs(62));
        assert_eq!(update.stability, Stability::Changing);
        assert!(tracker.should_actuate(start + Duration::from_secs(62)));
    }

    proptest! {
        #[test]
        fn prop_cooldown_stays_in_bounds(
            steps in prop::collection::vec((0.0f64..500.0, 0u64..120), 1..200),
        ) {
            let start = Instant::now();
            let mut tracker = tracker(start);
            let mut now = start;

            for (estimate, advance) in steps {
                now += Duration::from_secs(advance);
                let update = tracker.update(estimate, now);
                prop_assert!(update.cooldown >= MIN_COOLDOWN);
                prop_assert!(update.cooldown <= MAX_COOLDOWN);
                prop_assert!(tracker.stable_value().is_some());
            }
        }

        #[test]
        fn prop_large_deviation_always_resets(
            base in 0.0f64..1000.0,
            offset in 5.001f64..500.0,
            plateau_updates in 0usize..10,
            negative in any::<bool>(),
        ) {
            let start = Instant::now();
            let mut tracker = tracker(start);
            tracker.update(base, start);

            let mut now = start + STABILITY_DURATION;
            for _ in 0..plateau_updates {
                let update = tracker.update(base, now);
                now += update.cooldown;
            }

            let jumped = if negative { base - offset } else { base + offset };
            let update = tracker.update(jumped, now);
            prop_assert_eq!(update.stability, Stability::Changing);
            prop_assert_eq!(update.cooldown, MIN_COOLDOWN);
        }
    }
}
