/*!
 * Process Control Types
 * Managed-process records and control events
 */

use crate::core::types::{KiloBytes, Nice, Pid};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// Category assigned to a managed process; Critical is exempt from policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessCategory {
    Critical,
    System,
    Gaming,
    Productivity,
    User,
}

/// Lifecycle state the controller believes a managed process is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Suspended,
    Terminated,
}

/// Bookkeeping for a process the controller has intervened on
///
/// Created on first intervention, removed when the pid vanishes; original
/// values support best-effort restoration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedProcess {
    pub pid: Pid,
    pub name: String,
    pub category: ProcessCategory,
    pub original_nice: Nice,
    pub current_nice: Nice,
    pub original_state: RunState,
    pub current_state: RunState,
    /// 0 means unlimited
    pub memory_limit_kb: KiloBytes,
    /// 100 means unlimited
    pub cpu_limit_pct: f64,
    pub last_action_at: SystemTime,
}

impl ManagedProcess {
    pub fn new(pid: Pid, name: String, category: ProcessCategory, original_nice: Nice) -> Self {
        Self {
            pid,
            name,
            category,
            original_nice,
            current_nice: original_nice,
            original_state: RunState::Running,
            current_state: RunState::Running,
            memory_limit_kb: 0,
            cpu_limit_pct: 100.0,
            last_action_at: SystemTime::now(),
        }
    }

    #[inline]
    pub fn is_critical(&self) -> bool {
        self.category == ProcessCategory::Critical
    }
}

/// Operations the controller performs on behalf of callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Terminate,
    Pause,
    Resume,
    SetNice,
    SetAffinity,
    AssignGroup,
}

/// Which per-process limit was breached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Memory,
    Cpu,
}

/// System-wide resource whose threshold was crossed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemResource {
    Cpu,
    Memory,
}

/// Events published on the control lane
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControlEvent {
    ProcessAction {
        action: ControlAction,
        pid: Pid,
        success: bool,
    },
    ResourceLimitExceeded {
        pid: Pid,
        kind: LimitKind,
        observed: f64,
        limit: f64,
    },
    SystemThresholdExceeded {
        resource: SystemResource,
        observed_pct: f64,
        threshold_pct: f64,
    },
}

/// Shared resource-group settings applied through the host group filesystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub cpu_shares: u32,
    /// 0 means no memory ceiling
    pub memory_limit_kb: KiloBytes,
}

impl GroupConfig {
    pub fn new(name: impl Into<String>, cpu_shares: u32) -> Self {
        Self {
            name: name.into(),
            cpu_shares,
            memory_limit_kb: 0,
        }
    }

    pub fn with_memory_limit_kb(mut self, limit: KiloBytes) -> Self {
        self.memory_limit_kb = limit;
        self
    }
}
