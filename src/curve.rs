//! Logarithmic mapping from ambient light to backlight level.
//!
//! Equal ratios of ambient light produce equal brightness deltas, which is
//! closer to how the eye perceives light than a linear mapping.

/// Curve parameters taken from the configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrightnessCurve {
    /// Sensor ceiling; must be greater than 1
    pub max_sensor_value: u32,
    /// Curve steepness
    pub sensitivity_factor: f64,
    /// Output floor
    pub min_brightness_level: u32,
}

impl BrightnessCurve {
    pub fn new(max_sensor_value: u32, sensitivity_factor: f64, min_brightness_level: u32) -> Self {
        Self {
            max_sensor_value,
            sensitivity_factor,
            min_brightness_level,
        }
    }

    /// Map a smoothed estimate to a target backlight value.
    pub fn map(&self, estimate: f64) -> u32 {
        map(
            estimate,
            self.max_sensor_value,
            self.sensitivity_factor,
            self.min_brightness_level,
        )
    }
}

/// Map a smoothed sensor estimate to a target backlight value.
///
/// Estimates at or below one return `min_brightness_level`. Otherwise the
/// natural log of the estimate, scaled by `sensitivity_factor` and
/// normalised by `ln(max_sensor_value)`, is spread over
/// `[min_brightness_level, max_sensor_value]` and rounded. The result is
/// never below the floor. Callers guarantee `max_sensor_value > 1`.
pub fn map(
    estimate: f64,
    max_sensor_value: u32,
    sensitivity_factor: f64,
    min_brightness_level: u32,
) -> u32 {
    if estimate <= 0.0 {
        return min_brightness_level;
    }

    // Below one unit of light the log is negative; treat it as darkness
    let floor = min_brightness_level as f64;
    let ceiling = max_sensor_value as f64;
    let adjusted = estimate.ln().max(0.0) * sensitivity_factor;
    let scaled = adjusted / ceiling.ln() * (ceiling - floor) + floor;
    let target = scaled.round();

    if target <= floor {
        min_brightness_level
    } else if target >= u32::MAX as f64 {
        u32::MAX
    } else {
        target as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_non_positive_returns_floor() {
        assert_eq!(map(0.0, 2752, 1.0, 400), 400);
        assert_eq!(map(-12.5, 2752, 1.0, 400), 400);
    }

    #[test]
    fn test_saturates_at_sensor_ceiling() {
        assert_eq!(map(2752.0, 2752, 1.0, 400), 2752);
        assert_eq!(map(2752.0, 2752, 1.0, 0), 2752);
    }

    #[test]
    fn test_estimate_of_one_returns_floor() {
        // ln(1) == 0 so the curve starts exactly at the floor
        assert_eq!(map(1.0, 2752, 1.0, 400), 400);
    }

    #[test]
    fn test_known_midpoint() {
        // ln(100)/ln(2752) * 2352 + 400, rounded
        let expected = ((100f64).ln() / (2752f64).ln() * 2352.0 + 400.0).round() as u32;
        assert_eq!(map(100.0, 2752, 1.0, 400), expected);
        assert_eq!(expected, 1768);
    }

    #[test]
    fn test_sensitivity_steepens_curve() {
        let gentle = map(100.0, 2752, 0.5, 200);
        let steep = map(100.0, 2752, 1.5, 200);
        assert!(steep > gentle);
    }

    #[test]
    fn test_fractional_estimate_below_one_clamped_to_floor() {
        // ln(x) < 0 for 0 < x < 1 would pull below the floor
        assert_eq!(map(0.5, 2752, 1.0, 300), 300);
    }

    #[test]
    fn test_floor_above_sensor_ceiling_stays_flat() {
        // A floor above max_sensor_value gives a negative span
        assert_eq!(map(0.5, 2752, 1.0, 3000), 3000);
        assert_eq!(map(1.0 / 3.0, 2752, 1.0, 3000), 3000);
        assert_eq!(map(2.0, 2752, 1.0, 3000), 3000);
        assert_eq!(map(2752.0, 2752, 1.0, 3000), 3000);
    }

    #[test]
    fn test_curve_struct_matches_function() {
        let curve = BrightnessCurve::new(2752, 1.2, 50);
        assert_eq!(curve.map(640.0), map(640.0, 2752, 1.2, 50));
    }

    proptest! {
        #[test]
        fn prop_monotonic_non_decreasing(
            a in 0.001f64..10_000.0,
            b in 0.001f64..10_000.0,
            max_sensor_value in 2u32..10_000,
            sensitivity_factor in 0.1f64..3.0,
            floor in 0u32..20_000,
        ) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let low = map(lo, max_sensor_value, sensitivity_factor, floor);
            let high = map(hi, max_sensor_value, sensitivity_factor, floor);
            prop_assert!(low <= high, "map({}) = {} > map({}) = {}", lo, low, hi, high);
        }

        #[test]
        fn prop_never_below_floor(
            estimate in -100.0f64..10_000.0,
            max_sensor_value in 2u32..10_000,
            sensitivity_factor in 0.1f64..3.0,
            floor in 0u32..1000,
        ) {
            prop_assert!(map(estimate, max_sensor_value, sensitivity_factor, floor) >= floor);
        }

        #[test]
        fn prop_saturates_at_ceiling(max_sensor_value in 2u32..10_000, floor in 0u32..1000) {
            prop_assume!(floor <= max_sensor_value);
            prop_assert_eq!(
                map(max_sensor_value as f64, max_sensor_value, 1.0, floor),
                max_sensor_value
            );
        }
    }
}
