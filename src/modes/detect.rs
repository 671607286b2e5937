/*!
 * Mode Auto-Detection
 * Derives the mode best matching the current workload and platform state
 */

use crate::core::limits::{
    BATTERY_LOW_PCT, GAMING_DETECT_CPU_PCT, GAMING_DETECT_RSS_KB, PRODUCTIVITY_DETECT_COUNT,
    THERMAL_LIMIT_MDEG,
};
use crate::modes::hardware::HardwareControl;
use crate::modes::types::Mode;
use crate::observer::ProcessSnapshot;
use std::collections::HashSet;

pub(crate) const GAMING_TOKENS: &[&str] = &[
    "steam", "game", "wine", "proton", "lutris", "retroarch", "minecraft",
];

pub(crate) const PRODUCTIVITY_TOKENS: &[&str] = &[
    "code", "idea", "vim", "emacs", "libreoffice", "gimp", "blender", "slack", "docker", "make",
    "cargo", "jupyter",
];

/// Pick the mode the current situation calls for
///
/// Platform distress (low battery while discharging, thermal pressure) wins
/// over workload signals; a busy gaming process wins over productivity.
pub fn detect_optimal_mode(processes: &[ProcessSnapshot], hardware: &HardwareControl) -> Mode {
    if on_battery_low(hardware) || too_hot(hardware) {
        return Mode::PowerSaving;
    }

    let gaming_active = processes.iter().any(|p| {
        let lower = p.name.to_lowercase();
        GAMING_TOKENS.iter().any(|t| lower.contains(t))
            && (p.cpu_pct > GAMING_DETECT_CPU_PCT || p.rss_kb > GAMING_DETECT_RSS_KB)
    });
    if gaming_active {
        return Mode::Gaming;
    }

    let mut productivity_matches: HashSet<&str> = HashSet::new();
    for process in processes {
        let lower = process.name.to_lowercase();
        for token in PRODUCTIVITY_TOKENS {
            if lower.contains(token) {
                productivity_matches.insert(token);
            }
        }
    }
    if productivity_matches.len() >= PRODUCTIVITY_DETECT_COUNT {
        return Mode::Productivity;
    }

    Mode::Balanced
}

fn on_battery_low(hardware: &HardwareControl) -> bool {
    let discharging = hardware
        .battery_status()
        .map(|s| s.eq_ignore_ascii_case("discharging"))
        .unwrap_or(false);
    if !discharging {
        return false;
    }
    hardware
        .battery_capacity()
        .map(|pct| pct <= BATTERY_LOW_PCT)
        .unwrap_or(false)
}

fn too_hot(hardware: &HardwareControl) -> bool {
    hardware
        .thermal_mdeg()
        .map(|mdeg| mdeg > THERMAL_LIMIT_MDEG)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::types::ProcState;
    use std::fs;
    use std::time::SystemTime;
    use tempfile::TempDir;

    fn snapshot(pid: u32, name: &str, cpu_pct: f64, rss_kb: u64) -> ProcessSnapshot {
        ProcessSnapshot {
            pid,
            name: name.into(),
            command: name.into(),
            state: ProcState::Running,
            parent_pid: 1,
            thread_count: 1,
            nice: 0,
            vsize_kb: rss_kb,
            rss_kb,
            cpu_user_ticks: 0,
            cpu_system_ticks: 0,
            last_observed_at: SystemTime::now(),
            cpu_pct,
        }
    }

    fn bare_hardware() -> (TempDir, HardwareControl) {
        let tmp = TempDir::new().unwrap();
        let hardware = HardwareControl::with_sys_root(tmp.path());
        (tmp, hardware)
    }

    #[test]
    fn test_idle_host_is_balanced() {
        let (_tmp, hardware) = bare_hardware();
        assert_eq!(detect_optimal_mode(&[], &hardware), Mode::Balanced);
    }

    #[test]
    fn test_busy_gaming_process_wins() {
        let (_tmp, hardware) = bare_hardware();
        let procs = [snapshot(1, "steam", 60.0, 100_000)];
        assert_eq!(detect_optimal_mode(&procs, &hardware), Mode::Gaming);

        // An idle launcher is not enough
        let procs = [snapshot(1, "steam", 1.0, 100_000)];
        assert_eq!(detect_optimal_mode(&procs, &hardware), Mode::Balanced);

        // But a huge resident set is
        let procs = [snapshot(1, "proton-run", 1.0, 2 * 1024 * 1024)];
        assert_eq!(detect_optimal_mode(&procs, &hardware), Mode::Gaming);
    }

    #[test]
    fn test_two_distinct_productivity_matches_required() {
        let (_tmp, hardware) = bare_hardware();
        let one = [snapshot(1, "code", 5.0, 1000), snapshot(2, "code", 5.0, 1000)];
        assert_eq!(detect_optimal_mode(&one, &hardware), Mode::Balanced);

        let two = [snapshot(1, "code", 5.0, 1000), snapshot(2, "docker", 5.0, 1000)];
        assert_eq!(detect_optimal_mode(&two, &hardware), Mode::Productivity);
    }

    #[test]
    fn test_low_battery_overrides_everything() {
        let (tmp, hardware) = bare_hardware();
        let bat = tmp.path().join("class/power_supply/BAT0");
        fs::create_dir_all(&bat).unwrap();
        fs::write(bat.join("status"), "Discharging").unwrap();
        fs::write(bat.join("capacity"), "10").unwrap();

        let procs = [snapshot(1, "steam", 90.0, 2_000_000)];
        assert_eq!(detect_optimal_mode(&procs, &hardware), Mode::PowerSaving);

        // Plugged in: battery no longer forces power saving
        fs::write(bat.join("status"), "Charging").unwrap();
        assert_eq!(detect_optimal_mode(&procs, &hardware), Mode::Gaming);
    }

    #[test]
    fn test_thermal_pressure_forces_power_saving() {
        let (tmp, hardware) = bare_hardware();
        let thermal = tmp.path().join("class/thermal/thermal_zone0");
        fs::create_dir_all(&thermal).unwrap();
        fs::write(thermal.join("temp"), "90000").unwrap();

        assert_eq!(detect_optimal_mode(&[], &hardware), Mode::PowerSaving);
    }
}
