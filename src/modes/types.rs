/*!
 * Mode Types
 * Mode identifiers, composite configurations, and transactional backups
 */

use crate::control::RunState;
use crate::core::config::ModeName;
use crate::core::errors::ModeError;
use crate::core::types::{Nice, Pid};
use crate::memory::MemoryStrategy;
use crate::scheduler::SchedulingAlgorithm;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

/// Operating modes; exactly one is active at any time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Gaming,
    Productivity,
    PowerSaving,
    Balanced,
}

impl Mode {
    pub const ALL: [Mode; 4] = [
        Mode::Gaming,
        Mode::Productivity,
        Mode::PowerSaving,
        Mode::Balanced,
    ];
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Gaming => "gaming",
            Mode::Productivity => "productivity",
            Mode::PowerSaving => "power_saving",
            Mode::Balanced => "balanced",
        };
        f.write_str(name)
    }
}

impl FromStr for Mode {
    type Err = ModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gaming" => Ok(Mode::Gaming),
            "productivity" => Ok(Mode::Productivity),
            "power_saving" | "powersaving" => Ok(Mode::PowerSaving),
            "balanced" => Ok(Mode::Balanced),
            other => Err(ModeError::UnknownMode(other.into())),
        }
    }
}

impl From<ModeName> for Mode {
    fn from(name: ModeName) -> Self {
        match name {
            ModeName::Gaming => Mode::Gaming,
            ModeName::Productivity => Mode::Productivity,
            ModeName::PowerSaving => Mode::PowerSaving,
            ModeName::Balanced => Mode::Balanced,
        }
    }
}

/// Composite target configuration a mode applies across subsystems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    pub algorithm: SchedulingAlgorithm,
    pub time_slice_ms: u64,
    pub realtime_boost: bool,
    /// Name tokens promoted to high priority
    pub high_priority_tokens: Vec<String>,
    /// Name tokens suspended while the mode is active
    pub suspend_tokens: Vec<String>,
    pub memory_strategy: MemoryStrategy,
    pub swap_enabled: bool,
    pub governor: String,
    pub turbo: bool,
    pub brightness_pct: Option<u8>,
    pub freq_cap_pct: Option<u8>,
}

impl ModeConfig {
    /// Compiled-in defaults per mode
    pub fn defaults(mode: Mode) -> Self {
        match mode {
            Mode::Gaming => Self {
                algorithm: SchedulingAlgorithm::PriorityBased,
                time_slice_ms: 50,
                realtime_boost: true,
                high_priority_tokens: str_vec(&["game", "steam", "wine", "proton", "lutris"]),
                suspend_tokens: str_vec(&["updater", "packagekit", "tracker", "baloo"]),
                memory_strategy: MemoryStrategy::Conservative,
                swap_enabled: false,
                governor: "performance".into(),
                turbo: true,
                brightness_pct: None,
                freq_cap_pct: None,
            },
            Mode::Productivity => Self {
                algorithm: SchedulingAlgorithm::Fair,
                time_slice_ms: 100,
                realtime_boost: false,
                high_priority_tokens: Vec::new(),
                suspend_tokens: Vec::new(),
                memory_strategy: MemoryStrategy::Balanced,
                swap_enabled: true,
                governor: "ondemand".into(),
                turbo: false,
                brightness_pct: None,
                freq_cap_pct: None,
            },
            Mode::PowerSaving => Self {
                algorithm: SchedulingAlgorithm::RoundRobin,
                time_slice_ms: 200,
                realtime_boost: false,
                high_priority_tokens: Vec::new(),
                suspend_tokens: Vec::new(),
                memory_strategy: MemoryStrategy::Aggressive,
                swap_enabled: true,
                governor: "powersave".into(),
                turbo: false,
                brightness_pct: Some(30),
                freq_cap_pct: Some(60),
            },
            Mode::Balanced => Self {
                algorithm: SchedulingAlgorithm::PriorityBased,
                time_slice_ms: 100,
                realtime_boost: false,
                high_priority_tokens: Vec::new(),
                suspend_tokens: Vec::new(),
                memory_strategy: MemoryStrategy::Balanced,
                swap_enabled: true,
                governor: "ondemand".into(),
                turbo: false,
                brightness_pct: None,
                freq_cap_pct: None,
            },
        }
    }

    /// Overlay a JSON-shaped patch of the same fields
    pub fn apply_patch(&mut self, patch: &serde_json::Value) -> Result<(), ModeError> {
        let patch: ModeConfigPatch = serde_json::from_value(patch.clone())
            .map_err(|e| ModeError::ApplyFailed(format!("bad mode profile: {}", e)))?;
        patch.apply_to(self);
        Ok(())
    }
}

fn str_vec(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Optional-field mirror of ModeConfig for profile overrides
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModeConfigPatch {
    pub algorithm: Option<SchedulingAlgorithm>,
    pub time_slice_ms: Option<u64>,
    pub realtime_boost: Option<bool>,
    pub high_priority_tokens: Option<Vec<String>>,
    pub suspend_tokens: Option<Vec<String>>,
    pub memory_strategy: Option<MemoryStrategy>,
    pub swap_enabled: Option<bool>,
    pub governor: Option<String>,
    pub turbo: Option<bool>,
    pub brightness_pct: Option<u8>,
    pub freq_cap_pct: Option<u8>,
}

impl ModeConfigPatch {
    fn apply_to(self, config: &mut ModeConfig) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        overlay!(
            algorithm,
            time_slice_ms,
            realtime_boost,
            high_priority_tokens,
            suspend_tokens,
            memory_strategy,
            swap_enabled,
            governor,
            turbo
        );
        if self.brightness_pct.is_some() {
            config.brightness_pct = self.brightness_pct;
        }
        if self.freq_cap_pct.is_some() {
            config.freq_cap_pct = self.freq_cap_pct;
        }
    }
}

/// Pre-change values of one managed process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessRestore {
    pub pid: Pid,
    pub nice: Nice,
    pub state: RunState,
}

/// Everything needed to undo a mode application
///
/// Created at switch start, consumed on commit, replayed on failure.
#[derive(Debug, Clone)]
pub struct StateBackup {
    pub mode: Mode,
    pub algorithm: SchedulingAlgorithm,
    pub governor: Option<String>,
    pub processes: Vec<ProcessRestore>,
}

/// Counters reset on every committed switch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeMetrics {
    pub switches: u64,
    pub failed_switches: u64,
    pub active_since: Option<SystemTime>,
}
