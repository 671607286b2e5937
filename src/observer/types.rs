/*!
 * Observer Types
 * Immutable per-poll snapshots of process and system state
 */

use crate::core::types::{KiloBytes, LoadAvg, Pid, Ticks};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Kernel-reported process state letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Unknown,
}

impl ProcState {
    pub fn from_letter(c: char) -> Self {
        match c {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' | 't' => Self::Stopped,
            'Z' => Self::Zombie,
            _ => Self::Unknown,
        }
    }
}

/// One process as seen by a single poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: Pid,
    pub name: String,
    pub command: String,
    pub state: ProcState,
    pub parent_pid: Pid,
    pub thread_count: u32,
    pub nice: i32,
    pub vsize_kb: KiloBytes,
    pub rss_kb: KiloBytes,
    pub cpu_user_ticks: Ticks,
    pub cpu_system_ticks: Ticks,
    pub last_observed_at: SystemTime,
    /// Share of global CPU time since the previous poll; 0 on first sight
    pub cpu_pct: f64,
}

impl ProcessSnapshot {
    #[inline]
    pub fn active_ticks(&self) -> Ticks {
        self.cpu_user_ticks + self.cpu_system_ticks
    }
}

/// Aggregated CPU tick counters from the global stat line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuTicks {
    pub user: Ticks,
    pub nice: Ticks,
    pub system: Ticks,
    pub idle: Ticks,
    pub iowait: Ticks,
    pub irq: Ticks,
    pub softirq: Ticks,
    pub steal: Ticks,
}

impl CpuTicks {
    #[inline]
    pub fn total(&self) -> Ticks {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    #[inline]
    pub fn active(&self) -> Ticks {
        self.total() - self.idle - self.iowait
    }
}

/// System-wide totals for a single poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub cpu_total_pct: f64,
    pub cpu_ticks: CpuTicks,
    pub mem_total_kb: KiloBytes,
    pub mem_available_kb: KiloBytes,
    pub mem_cached_kb: KiloBytes,
    pub mem_buffered_kb: KiloBytes,
    pub swap_total_kb: KiloBytes,
    pub swap_free_kb: KiloBytes,
    pub load_avg: LoadAvg,
    pub core_count: usize,
    pub timestamp: SystemTime,
}

impl SystemSnapshot {
    /// Memory in use; never negative by construction
    #[inline]
    pub fn mem_used_kb(&self) -> KiloBytes {
        self.mem_total_kb.saturating_sub(self.mem_available_kb)
    }

    /// Used memory share of total, in percent
    #[inline]
    pub fn mem_used_pct(&self) -> f64 {
        if self.mem_total_kb == 0 {
            return 0.0;
        }
        100.0 * self.mem_used_kb() as f64 / self.mem_total_kb as f64
    }
}

impl Default for SystemSnapshot {
    fn default() -> Self {
        Self {
            cpu_total_pct: 0.0,
            cpu_ticks: CpuTicks::default(),
            mem_total_kb: 0,
            mem_available_kb: 0,
            mem_cached_kb: 0,
            mem_buffered_kb: 0,
            swap_total_kb: 0,
            swap_free_kb: 0,
            load_avg: LoadAvg::default(),
            core_count: 1,
            timestamp: SystemTime::UNIX_EPOCH,
        }
    }
}
