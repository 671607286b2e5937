/*!
 * Pressure Classification
 * Maps the used-memory ratio onto discrete pressure levels
 */

use crate::memory::types::{MemoryThresholds, PressureLevel};

/// Classify a used-memory percentage against the thresholds
pub fn classify(used_pct: f64, thresholds: &MemoryThresholds) -> PressureLevel {
    if used_pct >= thresholds.critical_pct {
        PressureLevel::Critical
    } else if used_pct >= thresholds.high_pct() {
        PressureLevel::High
    } else if used_pct >= thresholds.low_pct {
        PressureLevel::Medium
    } else {
        PressureLevel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> MemoryThresholds {
        MemoryThresholds {
            low_pct: 70.0,
            critical_pct: 90.0,
            minimum_free_kb: 0,
        }
    }

    #[test]
    fn test_boundaries() {
        let t = thresholds();
        assert_eq!(classify(0.0, &t), PressureLevel::Low);
        assert_eq!(classify(69.9, &t), PressureLevel::Low);
        assert_eq!(classify(70.0, &t), PressureLevel::Medium);
        assert_eq!(classify(79.9, &t), PressureLevel::Medium);
        assert_eq!(classify(80.0, &t), PressureLevel::High);
        assert_eq!(classify(89.9, &t), PressureLevel::High);
        assert_eq!(classify(90.0, &t), PressureLevel::Critical);
        assert_eq!(classify(100.0, &t), PressureLevel::Critical);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(PressureLevel::Low < PressureLevel::Medium);
        assert!(PressureLevel::Medium < PressureLevel::High);
        assert!(PressureLevel::High < PressureLevel::Critical);
    }
}
