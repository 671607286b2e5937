/*!
 * Memory Types
 * Pressure levels, strategies, and per-process memory records
 */

use crate::core::types::{KiloBytes, Pid};
use serde::{Deserialize, Serialize};

/// Discrete classification of memory scarcity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PressureLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Strategy applied by explicit optimization calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStrategy {
    Conservative,
    Balanced,
    Aggressive,
}

/// Thresholds steering classification and mitigation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemoryThresholds {
    /// Used% at which pressure leaves Low
    pub low_pct: f64,
    /// Used% classified as Critical
    pub critical_pct: f64,
    /// Free-memory floor guarded by the Critical handler
    pub minimum_free_kb: KiloBytes,
}

impl MemoryThresholds {
    /// High sits halfway between the Low and Critical thresholds
    #[inline]
    pub fn high_pct(&self) -> f64 {
        (self.low_pct + self.critical_pct) / 2.0
    }
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        use crate::core::limits;
        Self {
            low_pct: limits::DEFAULT_LOW_PRESSURE_PCT,
            critical_pct: limits::DEFAULT_CRITICAL_PRESSURE_PCT,
            minimum_free_kb: limits::DEFAULT_MINIMUM_FREE_KB,
        }
    }
}

/// Per-process memory view enriched with the trend estimate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessMemory {
    pub pid: Pid,
    pub name: String,
    pub rss_kb: KiloBytes,
    pub vsize_kb: KiloBytes,
    /// Exponential moving average of this process's share of used memory
    pub trend_pct: f64,
}
