/*!
 * Shared Test Fixtures
 * Recording host-ops fake and fake proc/sys tree builders
 */
#![allow(dead_code)]

use parking_lot::Mutex;
use smartsched::control::{Probe, ProcessOps};
use std::collections::HashMap;
use std::path::Path;

/// Recording fake of the host process primitives
#[derive(Default)]
pub struct MockOps {
    pub nice: Mutex<HashMap<u32, i32>>,
    pub stopped: Mutex<Vec<u32>>,
    pub continued: Mutex<Vec<u32>>,
    pub terminated: Mutex<Vec<u32>>,
    pub dead: Mutex<Vec<u32>>,
}

impl ProcessOps for MockOps {
    fn probe(&self, pid: u32) -> Probe {
        if self.dead.lock().contains(&pid) {
            Probe::Gone
        } else {
            Probe::Allowed
        }
    }

    fn alive(&self, pid: u32) -> bool {
        !self.dead.lock().contains(&pid)
    }

    fn send_stop(&self, pid: u32) -> Result<(), String> {
        self.stopped.lock().push(pid);
        Ok(())
    }

    fn send_continue(&self, pid: u32) -> Result<(), String> {
        self.continued.lock().push(pid);
        Ok(())
    }

    fn send_terminate(&self, pid: u32) -> Result<(), String> {
        self.terminated.lock().push(pid);
        self.dead.lock().push(pid);
        Ok(())
    }

    fn send_kill(&self, pid: u32) -> Result<(), String> {
        self.dead.lock().push(pid);
        Ok(())
    }

    fn apply_nice(&self, pid: u32, nice: i32) -> Result<(), String> {
        self.nice.lock().insert(pid, nice);
        Ok(())
    }

    fn read_nice(&self, pid: u32) -> Option<i32> {
        Some(self.nice.lock().get(&pid).copied().unwrap_or(0))
    }

    fn apply_affinity(&self, _pid: u32, _cores: &[usize]) -> Result<(), String> {
        Ok(())
    }
}

/// Write the global files of a fake proc tree
pub fn write_proc_global(root: &Path, cpu_ticks: (u64, u64, u64, u64), total_kb: u64, available_kb: u64) {
    std::fs::write(
        root.join("stat"),
        format!(
            "cpu  {} {} {} {} 0 0 0 0 0 0\n",
            cpu_ticks.0, cpu_ticks.1, cpu_ticks.2, cpu_ticks.3
        ),
    )
    .unwrap();
    std::fs::write(
        root.join("meminfo"),
        format!(
            "MemTotal: {} kB\nMemAvailable: {} kB\nBuffers: 1000 kB\n\
             Cached: 2000 kB\nSwapTotal: 1000000 kB\nSwapFree: 900000 kB\n",
            total_kb, available_kb
        ),
    )
    .unwrap();
    std::fs::write(root.join("loadavg"), "0.50 0.40 0.30 2/300 4242\n").unwrap();
    std::fs::write(root.join("cpuinfo"), "processor\t: 0\nprocessor\t: 1\n").unwrap();
}

/// Write one fake pid directory
pub fn write_proc_pid(root: &Path, pid: u32, name: &str, utime: u64, rss_kb: u64) {
    let dir = root.join(pid.to_string());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("stat"),
        format!(
            "{pid} ({name}) S 1 {pid} {pid} 0 -1 0 0 0 0 0 {utime} 0 0 0 20 0 1 0 100 8192000 256 0",
        ),
    )
    .unwrap();
    std::fs::write(
        dir.join("status"),
        format!("Name:\t{name}\nVmRSS:\t{rss_kb} kB\n"),
    )
    .unwrap();
    std::fs::write(dir.join("cmdline"), format!("/usr/bin/{name}\0")).unwrap();
}

pub fn remove_proc_pid(root: &Path, pid: u32) {
    let _ = std::fs::remove_dir_all(root.join(pid.to_string()));
}

/// Build a fake sysfs with governors and vm sinks
pub fn write_sysfs(root: &Path, cores: usize) {
    for n in 0..cores {
        let freq = root.join(format!("devices/system/cpu/cpu{}/cpufreq", n));
        std::fs::create_dir_all(&freq).unwrap();
        std::fs::write(freq.join("scaling_governor"), "ondemand").unwrap();
        std::fs::write(freq.join("cpuinfo_max_freq"), "3000000").unwrap();
        std::fs::write(freq.join("scaling_max_freq"), "3000000").unwrap();
    }
}

pub fn read_governor(root: &Path, core: usize) -> String {
    std::fs::read_to_string(root.join(format!(
        "devices/system/cpu/cpu{}/cpufreq/scaling_governor",
        core
    )))
    .unwrap()
}
