/*!
 * Core Types
 * Common types shared across subsystems
 */

use serde::{Deserialize, Serialize};

/// Process ID as exposed by the host pid namespace
pub type Pid = u32;

/// Nice value in [-20, 19]; lower is more favorable
pub type Nice = i32;

/// Kernel clock ticks (USER_HZ units)
pub type Ticks = u64;

/// Memory sizes reported by the host, in kilobytes
pub type KiloBytes = u64;

/// Lowest (most favorable) nice value accepted by the host
pub const NICE_MIN: Nice = -20;

/// Highest (least favorable) nice value accepted by the host
pub const NICE_MAX: Nice = 19;

/// Clamp a requested nice value into the host-accepted range
#[inline]
pub fn clamp_nice(nice: Nice) -> Nice {
    nice.clamp(NICE_MIN, NICE_MAX)
}

/// Three-slot load average as published by the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAvg {
    pub one: f64,
    pub five: f64,
    pub fifteen: f64,
}
