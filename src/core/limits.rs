/*!
 * System Limits and Defaults
 *
 * Centralized location for tunables, thresholds, and magic numbers.
 * Grouped by subsystem. Values marked [HOST] mirror conventions of the
 * Linux interfaces they are written to.
 */

use std::time::Duration;

// =============================================================================
// OBSERVER
// =============================================================================

/// Default interval between polls of the host process table
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Samples kept in the system-wide CPU moving-average ring
pub const CPU_HISTORY_LEN: usize = 100;

/// Samples kept per process for usage smoothing
pub const PROCESS_CPU_HISTORY_LEN: usize = 10;

// =============================================================================
// PROCESS CONTROL
// =============================================================================

/// Interval between auto-management sweeps
pub const AUTO_MANAGE_INTERVAL: Duration = Duration::from_secs(2);

/// Grace period between SIGTERM and SIGKILL escalation
pub const TERMINATE_GRACE: Duration = Duration::from_millis(400);

/// Poll step while waiting out the termination grace period
pub const TERMINATE_PROBE_STEP: Duration = Duration::from_millis(50);

/// Resource-group directory name under the host cgroup mount
/// [HOST] Path segment is stable so limits survive controller restarts
pub const GROUP_BASE_NAME: &str = "smart_scheduler";

/// System-wide CPU alert threshold (percent)
pub const DEFAULT_CPU_ALERT_PCT: f64 = 90.0;

/// RSS above which a process counts as a memory hog candidate
pub const MEMORY_WARNING_RSS_KB: u64 = 512 * 1024;

/// Maximum processes terminated by one emergency sweep
pub const EMERGENCY_KILL_LIMIT: usize = 5;

/// Capacity of the control event ring (power of 2)
pub const EVENT_RING_SIZE: usize = 1024;

// =============================================================================
// MEMORY PRESSURE
// =============================================================================

/// Used-memory percentage at which pressure leaves Low
pub const DEFAULT_LOW_PRESSURE_PCT: f64 = 70.0;

/// Used-memory percentage classified as Critical
pub const DEFAULT_CRITICAL_PRESSURE_PCT: f64 = 90.0;

/// Free memory floor; below this Critical pressure may terminate hogs
pub const DEFAULT_MINIMUM_FREE_KB: u64 = 256 * 1024;

/// Interval between pressure scans
pub const PRESSURE_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// Hogs lowered on High pressure
pub const HIGH_PRESSURE_OPTIMIZE_COUNT: usize = 5;

/// Hogs lowered by the Balanced strategy
pub const BALANCED_OPTIMIZE_COUNT: usize = 3;

/// Used% above which Conservative clears the page cache
pub const CONSERVATIVE_CLEAR_PCT: f64 = 85.0;

/// Used% above which Balanced optimizes
pub const BALANCED_CLEAR_PCT: f64 = 75.0;

/// Exponential moving average weight for per-process memory trend
pub const MEMORY_TREND_DECAY: f64 = 0.8;

// =============================================================================
// SCHEDULER
// =============================================================================

/// Default scheduling tick
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Wait beyond which a ready process is considered starving
pub const DEFAULT_STARVATION_THRESHOLD: Duration = Duration::from_secs(5);

/// One-shot priority bump applied to starving processes
pub const STARVATION_BOOST: i32 = 5;

/// Multilevel feedback queue count; level 0 is highest
pub const FEEDBACK_LEVELS: usize = 5;

/// Slice clamp floor
pub const MIN_TIME_SLICE: Duration = Duration::from_millis(10);

/// Slice clamp ceiling
pub const MAX_TIME_SLICE: Duration = Duration::from_millis(500);

/// System CPU% above which slices shrink
pub const HIGH_LOAD_PCT: f64 = 80.0;

/// System CPU% below which slices relax back toward class defaults
pub const LOW_LOAD_PCT: f64 = 20.0;

/// Shrink factor applied to non-real-time slices under high load
pub const SLICE_SHRINK_FACTOR: f64 = 0.8;

/// Growth factor applied when the system is mostly idle
pub const SLICE_RELAX_FACTOR: f64 = 1.25;

/// CPU% above which a process is reclassified as Batch
pub const BATCH_CPU_PCT: f64 = 80.0;

/// CPU% below which a process is reclassified as Idle
pub const IDLE_CPU_PCT: f64 = 5.0;

// =============================================================================
// MODES
// =============================================================================

/// Pause before applying a mode when smooth transitions are on
pub const DEFAULT_TRANSITION_DELAY: Duration = Duration::from_secs(2);

/// Interval between auto-detection evaluations
pub const DEFAULT_DETECT_INTERVAL: Duration = Duration::from_secs(30);

/// Battery capacity percentage below which PowerSaving wins
pub const BATTERY_LOW_PCT: u8 = 20;

/// Thermal zone reading above which PowerSaving wins [HOST] millidegrees
pub const THERMAL_LIMIT_MDEG: i64 = 85_000;

/// CPU% a gaming-named process must exceed to trigger Gaming
pub const GAMING_DETECT_CPU_PCT: f64 = 30.0;

/// RSS a gaming-named process must exceed to trigger Gaming
pub const GAMING_DETECT_RSS_KB: u64 = 1024 * 1024;

/// Distinct productivity matches required to trigger Productivity
pub const PRODUCTIVITY_DETECT_COUNT: usize = 2;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_clamp_ordered() {
        assert!(MIN_TIME_SLICE < MAX_TIME_SLICE);
        assert!(DEFAULT_TICK_INTERVAL >= MIN_TIME_SLICE);
    }

    #[test]
    fn test_pressure_thresholds_ordered() {
        assert!(DEFAULT_LOW_PRESSURE_PCT < DEFAULT_CRITICAL_PRESSURE_PCT);
        assert!(BALANCED_CLEAR_PCT < CONSERVATIVE_CLEAR_PCT);
    }

    #[test]
    fn test_event_ring_power_of_two() {
        assert!(EVENT_RING_SIZE.is_power_of_two());
    }
}
