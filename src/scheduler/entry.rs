/*!
 * Scheduled Process Entries
 * Per-process scheduling state owned exclusively by the scheduler
 */

use crate::core::limits::PROCESS_CPU_HISTORY_LEN;
use crate::core::types::{Nice, Pid};
use crate::scheduler::types::ProcessClass;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// One process in the scheduled table
#[derive(Debug, Clone)]
pub struct ScheduledProcess {
    pub pid: Pid,
    pub name: String,
    pub base_nice: Nice,
    /// Ranking value; higher is more urgent. Seeded from the negated nice so
    /// favorable processes rank high, bounded to the nice magnitude range.
    pub dynamic_priority: i32,
    pub class: ProcessClass,
    pub time_slice: Duration,
    pub virtual_runtime: f64,
    /// Feedback level, 0 highest
    pub queue_level: usize,
    pub schedule_count: u64,
    pub preemption_count: u64,
    pub last_scheduled_at: Option<Instant>,
    pub admitted_at: Instant,
    /// Ring of recent usage samples
    pub cpu_history: VecDeque<f64>,
    /// Accumulated anti-starvation bonus; cleared when scheduled
    pub starvation_bonus: i32,
    /// Selections since entering the current feedback level
    pub level_runs: u32,
}

impl ScheduledProcess {
    pub fn new(pid: Pid, name: String, base_nice: Nice, class: ProcessClass, slice: Duration) -> Self {
        Self {
            pid,
            name,
            base_nice,
            dynamic_priority: -base_nice,
            class,
            time_slice: slice,
            virtual_runtime: 0.0,
            queue_level: 0,
            schedule_count: 0,
            preemption_count: 0,
            last_scheduled_at: None,
            admitted_at: Instant::now(),
            cpu_history: VecDeque::with_capacity(PROCESS_CPU_HISTORY_LEN),
            starvation_bonus: 0,
            level_runs: 0,
        }
    }

    pub fn record_cpu(&mut self, cpu_pct: f64) {
        if self.cpu_history.len() == PROCESS_CPU_HISTORY_LEN {
            self.cpu_history.pop_front();
        }
        self.cpu_history.push_back(cpu_pct);
    }

    /// Most recent usage sample; zero before the first
    pub fn latest_cpu(&self) -> f64 {
        self.cpu_history.back().copied().unwrap_or(0.0)
    }

    pub fn avg_cpu(&self) -> f64 {
        if self.cpu_history.is_empty() {
            return 0.0;
        }
        self.cpu_history.iter().sum::<f64>() / self.cpu_history.len() as f64
    }

    /// Wall time this process has been ready without being selected
    pub fn waiting_for(&self, now: Instant) -> Duration {
        now.duration_since(self.last_scheduled_at.unwrap_or(self.admitted_at))
    }

    pub fn is_starving(&self, now: Instant, threshold: Duration) -> bool {
        self.waiting_for(now) > threshold
    }

    pub fn mark_scheduled(&mut self, now: Instant) {
        self.last_scheduled_at = Some(now);
        self.schedule_count += 1;
        self.starvation_bonus = 0;
    }
}
