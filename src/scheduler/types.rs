/*!
 * Scheduler Types
 * Algorithms, process classes, and statistics
 */

use crate::core::config::AlgorithmName;
use crate::core::errors::SchedulerError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Selection algorithm; the set is closed and dispatched by tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingAlgorithm {
    PriorityBased,
    RoundRobin,
    MultilevelFeedback,
    Fair,
}

impl From<AlgorithmName> for SchedulingAlgorithm {
    fn from(name: AlgorithmName) -> Self {
        match name {
            AlgorithmName::Priority => Self::PriorityBased,
            AlgorithmName::RoundRobin => Self::RoundRobin,
            AlgorithmName::Multilevel => Self::MultilevelFeedback,
            AlgorithmName::Fair => Self::Fair,
        }
    }
}

impl FromStr for SchedulingAlgorithm {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(Self::PriorityBased),
            "round_robin" => Ok(Self::RoundRobin),
            "multilevel" => Ok(Self::MultilevelFeedback),
            "fair" => Ok(Self::Fair),
            other => Err(SchedulerError::UnknownAlgorithm(other.into())),
        }
    }
}

/// Behavioral class inferred from name and usage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessClass {
    Interactive,
    Batch,
    System,
    RealTime,
    Idle,
}

/// Tunables of the tick cycle
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval: Duration,
    pub default_slice: Duration,
    pub starvation_threshold: Duration,
    pub priority_boost: bool,
    pub adaptive_slicing: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        use crate::core::limits;
        Self {
            tick_interval: limits::DEFAULT_TICK_INTERVAL,
            default_slice: limits::DEFAULT_TICK_INTERVAL,
            starvation_threshold: limits::DEFAULT_STARVATION_THRESHOLD,
            priority_boost: true,
            adaptive_slicing: true,
        }
    }
}

/// Counters exposed for monitoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_scheduled: u64,
    pub context_switches: u64,
    pub preemptions: u64,
    pub active_processes: usize,
    pub algorithm: SchedulingAlgorithm,
}
