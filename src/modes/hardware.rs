/*!
 * Hardware Control
 * Governor, turbo, frequency-cap, brightness, battery, and thermal sysfs
 */

use crate::core::errors::ModeError;
use log::{debug, warn};
use std::path::{Path, PathBuf};

/// Thin wrapper over the host's power-management sysfs
pub struct HardwareControl {
    sys_root: PathBuf,
}

impl HardwareControl {
    pub fn new() -> Self {
        Self::with_sys_root("/sys")
    }

    /// Build against an alternate sysfs root; used by tests
    pub fn with_sys_root(root: impl Into<PathBuf>) -> Self {
        Self {
            sys_root: root.into(),
        }
    }

    fn cpu_dirs(&self) -> Vec<PathBuf> {
        let base = self.sys_root.join("devices/system/cpu");
        let Ok(entries) = std::fs::read_dir(&base) else {
            return Vec::new();
        };
        let mut dirs: Vec<PathBuf> = entries
            .flatten()
            .filter(|e| {
                let name = e.file_name();
                let name = name.to_string_lossy();
                name.strip_prefix("cpu")
                    .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
            .map(|e| e.path())
            .collect();
        dirs.sort();
        dirs
    }

    /// Write the scaling governor on every core
    pub fn set_governor(&self, governor: &str) -> Result<(), ModeError> {
        let mut wrote = false;
        for dir in self.cpu_dirs() {
            let path = dir.join("cpufreq/scaling_governor");
            if !path.exists() {
                continue;
            }
            std::fs::write(&path, governor)
                .map_err(|e| ModeError::Hardware(format!("{}: {}", path.display(), e)))?;
            wrote = true;
        }
        if !wrote {
            return Err(ModeError::Hardware("no governor interface found".into()));
        }
        debug!("governor set to '{}'", governor);
        Ok(())
    }

    /// Current governor of the first core
    pub fn read_governor(&self) -> Option<String> {
        let dir = self.cpu_dirs().into_iter().next()?;
        std::fs::read_to_string(dir.join("cpufreq/scaling_governor"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    /// Enable or disable turbo boost
    ///
    /// The pstate knob is inverted (`no_turbo`); the acpi-cpufreq knob is
    /// not. Hosts exposing neither are tolerated.
    pub fn set_turbo(&self, enabled: bool) -> Result<(), ModeError> {
        let pstate = self.sys_root.join("devices/system/cpu/intel_pstate/no_turbo");
        if pstate.exists() {
            let value = if enabled { "0" } else { "1" };
            return std::fs::write(&pstate, value)
                .map_err(|e| ModeError::Hardware(format!("{}: {}", pstate.display(), e)));
        }
        let boost = self.sys_root.join("devices/system/cpu/cpufreq/boost");
        if boost.exists() {
            let value = if enabled { "1" } else { "0" };
            return std::fs::write(&boost, value)
                .map_err(|e| ModeError::Hardware(format!("{}: {}", boost.display(), e)));
        }
        warn!("no turbo interface found, skipping");
        Ok(())
    }

    /// Cap every core's maximum frequency at a share of its hardware limit
    pub fn set_freq_cap_pct(&self, pct: u8) -> Result<(), ModeError> {
        let pct = pct.clamp(1, 100) as u64;
        for dir in self.cpu_dirs() {
            let max_path = dir.join("cpufreq/cpuinfo_max_freq");
            let cap_path = dir.join("cpufreq/scaling_max_freq");
            let Some(max_khz) = std::fs::read_to_string(&max_path)
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
            else {
                continue;
            };
            let capped = max_khz * pct / 100;
            std::fs::write(&cap_path, capped.to_string())
                .map_err(|e| ModeError::Hardware(format!("{}: {}", cap_path.display(), e)))?;
        }
        Ok(())
    }

    /// Lift any frequency cap back to the hardware maximum
    pub fn clear_freq_cap(&self) -> Result<(), ModeError> {
        self.set_freq_cap_pct(100)
    }

    /// Set every backlight to a share of its maximum brightness
    pub fn set_brightness_pct(&self, pct: u8) -> Result<(), ModeError> {
        let pct = pct.min(100) as u64;
        let base = self.sys_root.join("class/backlight");
        let Ok(entries) = std::fs::read_dir(&base) else {
            warn!("no backlight interface found, skipping");
            return Ok(());
        };
        for entry in entries.flatten() {
            let dir = entry.path();
            let Some(max) = std::fs::read_to_string(dir.join("max_brightness"))
                .ok()
                .and_then(|s| s.trim().parse::<u64>().ok())
            else {
                continue;
            };
            let value = max * pct / 100;
            let path = dir.join("brightness");
            std::fs::write(&path, value.to_string())
                .map_err(|e| ModeError::Hardware(format!("{}: {}", path.display(), e)))?;
        }
        Ok(())
    }

    /// Battery charge state, e.g. "Discharging"
    pub fn battery_status(&self) -> Option<String> {
        self.read_trimmed("class/power_supply/BAT0/status")
    }

    /// Battery capacity in percent
    pub fn battery_capacity(&self) -> Option<u8> {
        self.read_trimmed("class/power_supply/BAT0/capacity")?
            .parse()
            .ok()
    }

    /// First thermal zone reading, in millidegrees
    pub fn thermal_mdeg(&self) -> Option<i64> {
        self.read_trimmed("class/thermal/thermal_zone0/temp")?
            .parse()
            .ok()
    }

    fn read_trimmed(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.sys_root.join(rel))
            .ok()
            .map(|s| s.trim().to_string())
    }

    pub fn sys_root(&self) -> &Path {
        &self.sys_root
    }
}

impl Default for HardwareControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_sysfs(cores: usize) -> (TempDir, HardwareControl) {
        let tmp = TempDir::new().unwrap();
        for n in 0..cores {
            let freq = tmp.path().join(format!("devices/system/cpu/cpu{}/cpufreq", n));
            fs::create_dir_all(&freq).unwrap();
            fs::write(freq.join("scaling_governor"), "ondemand").unwrap();
            fs::write(freq.join("cpuinfo_max_freq"), "3000000").unwrap();
            fs::write(freq.join("scaling_max_freq"), "3000000").unwrap();
        }
        let hardware = HardwareControl::with_sys_root(tmp.path());
        (tmp, hardware)
    }

    #[test]
    fn test_governor_written_to_all_cores() {
        let (tmp, hardware) = fake_sysfs(2);
        hardware.set_governor("performance").unwrap();
        for n in 0..2 {
            let path = tmp
                .path()
                .join(format!("devices/system/cpu/cpu{}/cpufreq/scaling_governor", n));
            assert_eq!(fs::read_to_string(path).unwrap(), "performance");
        }
        assert_eq!(hardware.read_governor().unwrap(), "performance");
    }

    #[test]
    fn test_governor_without_interface_fails() {
        let tmp = TempDir::new().unwrap();
        let hardware = HardwareControl::with_sys_root(tmp.path());
        assert!(hardware.set_governor("performance").is_err());
    }

    #[test]
    fn test_freq_cap_scales_hardware_max() {
        let (tmp, hardware) = fake_sysfs(1);
        hardware.set_freq_cap_pct(60).unwrap();
        let path = tmp
            .path()
            .join("devices/system/cpu/cpu0/cpufreq/scaling_max_freq");
        assert_eq!(fs::read_to_string(path).unwrap(), "1800000");
    }

    #[test]
    fn test_turbo_pstate_is_inverted() {
        let (tmp, hardware) = fake_sysfs(1);
        let pstate = tmp.path().join("devices/system/cpu/intel_pstate");
        fs::create_dir_all(&pstate).unwrap();
        fs::write(pstate.join("no_turbo"), "0").unwrap();

        hardware.set_turbo(false).unwrap();
        assert_eq!(fs::read_to_string(pstate.join("no_turbo")).unwrap(), "1");
        hardware.set_turbo(true).unwrap();
        assert_eq!(fs::read_to_string(pstate.join("no_turbo")).unwrap(), "0");
    }

    #[test]
    fn test_missing_turbo_tolerated() {
        let (_tmp, hardware) = fake_sysfs(1);
        assert!(hardware.set_turbo(true).is_ok());
    }

    #[test]
    fn test_brightness_scaled_from_max() {
        let (tmp, hardware) = fake_sysfs(1);
        let panel = tmp.path().join("class/backlight/panel0");
        fs::create_dir_all(&panel).unwrap();
        fs::write(panel.join("max_brightness"), "200").unwrap();
        fs::write(panel.join("brightness"), "200").unwrap();

        hardware.set_brightness_pct(30).unwrap();
        assert_eq!(fs::read_to_string(panel.join("brightness")).unwrap(), "60");
    }

    #[test]
    fn test_sensor_reads() {
        let (tmp, hardware) = fake_sysfs(1);
        let bat = tmp.path().join("class/power_supply/BAT0");
        fs::create_dir_all(&bat).unwrap();
        fs::write(bat.join("status"), "Discharging\n").unwrap();
        fs::write(bat.join("capacity"), "15\n").unwrap();
        let thermal = tmp.path().join("class/thermal/thermal_zone0");
        fs::create_dir_all(&thermal).unwrap();
        fs::write(thermal.join("temp"), "67000\n").unwrap();

        assert_eq!(hardware.battery_status().unwrap(), "Discharging");
        assert_eq!(hardware.battery_capacity().unwrap(), 15);
        assert_eq!(hardware.thermal_mdeg().unwrap(), 67000);
    }
}
