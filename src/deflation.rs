//! This module contains the deflation-rate check that runs on every
//! sample while the cuff is deflating.

/// Acquisition rate in samples per second.
const SAMPLES_PER_SECOND: f32 = 25.0;
/// Pressure-change limit in mmHg per second.
const RATE_LIMIT_MMHG_PER_SECOND: f32 = 4.0;

/// Per-sample classification of the instantaneous pressure-change rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateClass {
    Normal,  // "Measuring.."
    TooFast, // "Too fast", rendered with warning severity.
}

/// Classify the pressure change between two adjacent samples.
///
/// The warning trips when the change exceeds +4 mmHg/s. Cuff pressure
/// falls during normal deflation, so the tripping condition is an upward
/// jump between ticks. No hysteresis: each sample is classified on its
/// own.
pub fn classify_rate(previous_mmhg: f32, current_mmhg: f32) -> RateClass {
    if SAMPLES_PER_SECOND * (current_mmhg - previous_mmhg) > RATE_LIMIT_MMHG_PER_SECOND {
        RateClass::TooFast
    } else {
        RateClass::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descending_pressure_is_always_normal() {
        // Steady deflation at the limit rate, 4/25 mmHg per sample.
        let mut pressure = 150.0;
        for _ in 0..100 {
            let next = pressure - 4.0 / 25.0;
            assert_eq!(classify_rate(pressure, next), RateClass::Normal);
            pressure = next;
        }
        // Even a much steeper drop stays in the normal class; the check
        // only looks at upward change.
        assert_eq!(classify_rate(150.0, 120.0), RateClass::Normal);
    }

    #[test]
    fn test_upward_jump_trips_on_that_tick_only() {
        // A small upward wiggle, 3.125 mmHg/s, stays under the limit.
        assert_eq!(classify_rate(100.0, 100.125), RateClass::Normal);
        // 6.25 mmHg/s upward trips the warning.
        assert_eq!(classify_rate(100.0, 100.25), RateClass::TooFast);
        // The next tick is classified independently.
        assert_eq!(classify_rate(100.25, 100.125), RateClass::Normal);
    }
}
