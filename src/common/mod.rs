/// Common constants and numeric helpers for the growth engine.

/// Tolerance used for mass balance checks and "effectively zero" tests.
pub const EPSILON: f64 = 1e-9;

/// Carbon content of plant dry matter [kg C / kg DM].
pub const CARBON_FRACTION_IN_DM: f64 = 0.4;

/// Mass balance tolerance applied after each daily commit [kg/ha].
pub const MASS_BALANCE_TOLERANCE: f64 = 1e-6;

/// Number of tissue cohorts in a shoot organ (emerging, developing, mature, dead).
pub const SHOOT_TISSUES: usize = 4;

/// Number of tissue cohorts in a root organ (live, dead).
pub const ROOT_TISSUES: usize = 2;

/// Safe division returning `fallback` when the denominator is effectively zero.
#[inline]
pub fn divide(numerator: f64, denominator: f64, fallback: f64) -> f64 {
    if denominator.abs() > EPSILON {
        numerator / denominator
    } else {
        fallback
    }
}

/// Clamp to [lower, upper].
#[inline]
pub fn bound(value: f64, lower: f64, upper: f64) -> f64 {
    value.max(lower).min(upper)
}

/// True when `a` and `b` agree within `tolerance`.
#[inline]
pub fn nearly_equal(a: f64, b: f64, tolerance: f64) -> bool {
    (a - b).abs() <= tolerance
}

/// Weighted mean of daily max and min temperature [°C].
#[inline]
pub fn weighted_mean_temperature(max_t: f64, min_t: f64, weight_max: f64) -> f64 {
    let w = bound(weight_max, 0.0, 1.0);
    max_t * w + min_t * (1.0 - w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_divide_falls_back_on_zero() {
        assert_eq!(divide(1.0, 0.0, 7.0), 7.0);
        assert_eq!(divide(1.0, 2.0, 7.0), 0.5);
    }

    #[test]
    fn test_weighted_mean_temperature() {
        assert!((weighted_mean_temperature(30.0, 10.0, 0.75) - 25.0).abs() < 1e-12);
        // weight is clamped
        assert!((weighted_mean_temperature(30.0, 10.0, 2.0) - 30.0).abs() < 1e-12);
    }
}
