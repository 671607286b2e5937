/*!
 * Memory Pressure Controller
 * Classifies system memory scarcity and applies escalating mitigation
 */

use crate::control::ProcessController;
use crate::core::limits::{
    BALANCED_CLEAR_PCT, BALANCED_OPTIMIZE_COUNT, CONSERVATIVE_CLEAR_PCT, EMERGENCY_KILL_LIMIT,
    HIGH_PRESSURE_OPTIMIZE_COUNT, MEMORY_TREND_DECAY, PRESSURE_SCAN_INTERVAL,
};
use crate::core::types::{KiloBytes, Pid, NICE_MAX};
use crate::observer::{Observer, ProcessSnapshot, SystemSnapshot};
use ahash::RandomState;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub mod pressure;
pub mod types;

pub use types::{MemoryStrategy, MemoryThresholds, PressureLevel, ProcessMemory};

type PressureCallback = Arc<dyn Fn(PressureLevel) + Send + Sync>;

/// Drop-caches control values understood by the host
const DROP_PAGE_CACHE: &str = "1";
const DROP_ALL_CACHES: &str = "3";
const COMPACT: &str = "1";

/// Memory controller; owns the pressure-scan worker
pub struct MemoryController {
    observer: Arc<Observer>,
    control: Arc<ProcessController>,

    /// Root for the vm control sinks, normally `/proc`
    sink_root: PathBuf,

    strategy: RwLock<MemoryStrategy>,
    thresholds: RwLock<MemoryThresholds>,
    auto_optimize: AtomicBool,

    /// Per-pid EMA of memory share, feeding hog identification; one mutex
    /// guards the whole map
    trend: Mutex<HashMap<Pid, f64, RandomState>>,

    callbacks: Mutex<Vec<PressureCallback>>,
    last_level: Mutex<PressureLevel>,

    scan_interval: RwLock<Duration>,
    stop_requested: AtomicBool,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryController {
    pub fn new(observer: Arc<Observer>, control: Arc<ProcessController>) -> Self {
        Self::with_sink_root(observer, control, "/proc")
    }

    /// Build against an alternate sink root; used by tests
    pub fn with_sink_root(
        observer: Arc<Observer>,
        control: Arc<ProcessController>,
        sink_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            observer,
            control,
            sink_root: sink_root.into(),
            strategy: RwLock::new(MemoryStrategy::Balanced),
            thresholds: RwLock::new(MemoryThresholds::default()),
            auto_optimize: AtomicBool::new(true),
            trend: Mutex::new(HashMap::with_hasher(RandomState::new())),
            callbacks: Mutex::new(Vec::new()),
            last_level: Mutex::new(PressureLevel::Low),
            scan_interval: RwLock::new(PRESSURE_SCAN_INTERVAL),
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    pub fn set_strategy(&self, strategy: MemoryStrategy) {
        *self.strategy.write() = strategy;
        info!("memory strategy set to {:?}", strategy);
    }

    pub fn strategy(&self) -> MemoryStrategy {
        *self.strategy.read()
    }

    pub fn set_thresholds(&self, thresholds: MemoryThresholds) {
        *self.thresholds.write() = thresholds;
    }

    pub fn thresholds(&self) -> MemoryThresholds {
        *self.thresholds.read()
    }

    pub fn set_auto_optimize(&self, enabled: bool) {
        self.auto_optimize.store(enabled, Ordering::SeqCst);
    }

    /// Current pressure classification from the last observer poll
    pub fn pressure(&self) -> PressureLevel {
        let Some(system) = self.observer.get_system() else {
            return PressureLevel::Low;
        };
        pressure::classify(system.mem_used_pct(), &self.thresholds.read())
    }

    /// System totals as seen by the observer
    pub fn system_info(&self) -> Option<SystemSnapshot> {
        self.observer.get_system()
    }

    /// Memory view of one process
    pub fn process_info(&self, pid: Pid) -> Option<ProcessMemory> {
        self.observer.get_process(pid).map(|p| self.enrich(&p))
    }

    /// Largest residents, descending
    pub fn top_memory(&self, n: usize) -> Vec<ProcessMemory> {
        self.observer
            .top_memory(n)
            .iter()
            .map(|p| self.enrich(p))
            .collect()
    }

    /// Hog candidates: the n largest non-critical residents
    pub fn identify_memory_hogs(&self, n: usize) -> Vec<ProcessMemory> {
        self.observer
            .top_memory(usize::MAX)
            .iter()
            .filter(|p| !self.control.guard().is_critical(p.pid, &p.name))
            .take(n)
            .map(|p| self.enrich(p))
            .collect()
    }

    /// Apply the active strategy once, explicitly
    pub fn optimize_system_memory(&self) {
        let Some(system) = self.observer.get_system() else {
            return;
        };
        let used_pct = system.mem_used_pct();
        match *self.strategy.read() {
            MemoryStrategy::Conservative => {
                if used_pct > CONSERVATIVE_CLEAR_PCT {
                    self.clear_page_cache();
                }
            }
            MemoryStrategy::Balanced => {
                if used_pct > BALANCED_CLEAR_PCT {
                    self.clear_page_cache();
                    for hog in self.identify_memory_hogs(BALANCED_OPTIMIZE_COUNT) {
                        self.optimize_process_memory(hog.pid);
                    }
                }
            }
            MemoryStrategy::Aggressive => {
                self.clear_all_caches();
                self.compact();
                for hog in self.identify_memory_hogs(HIGH_PRESSURE_OPTIMIZE_COUNT) {
                    self.optimize_process_memory(hog.pid);
                }
            }
        }
    }

    /// Soft action: lower the process priority; never kills
    pub fn optimize_process_memory(&self, pid: Pid) -> bool {
        match self.control.set_nice(pid, NICE_MAX) {
            Ok(()) => true,
            Err(e) => {
                debug!("optimize of pid {} skipped: {}", pid, e);
                false
            }
        }
    }

    /// Drop the page cache; false without sufficient privileges
    pub fn clear_page_cache(&self) -> bool {
        self.write_sink("sys/vm/drop_caches", DROP_PAGE_CACHE)
    }

    /// Drop page cache, dentries, and inodes
    pub fn clear_all_caches(&self) -> bool {
        self.write_sink("sys/vm/drop_caches", DROP_ALL_CACHES)
    }

    /// Ask the host to compact fragmented memory
    pub fn compact(&self) -> bool {
        self.write_sink("sys/vm/compact_memory", COMPACT)
    }

    /// Steer the host's swap eagerness; false without privileges
    pub fn set_swappiness(&self, value: u8) -> bool {
        self.write_sink("sys/vm/swappiness", &value.min(100).to_string())
    }

    /// Full Critical-level mitigation, runnable on demand
    pub fn emergency_cleanup(&self) {
        warn!("emergency memory cleanup requested");
        self.handle_critical();
    }

    pub fn register_pressure_callback(&self, cb: impl Fn(PressureLevel) + Send + Sync + 'static) {
        self.callbacks.lock().push(Arc::new(cb));
    }

    /// Start the pressure-scan worker; no-op when already running
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        let controller = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("mem-control".into())
            .spawn(move || controller.scan_loop())
            .expect("spawn memory worker");
        *self.handle.lock() = Some(handle);
        info!("memory pressure scanning started");
    }

    /// Request stop and join the worker
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
        info!("memory pressure scanning stopped");
    }

    fn scan_loop(&self) {
        while !self.stop_requested.load(Ordering::SeqCst) {
            self.scan_once();
            let interval = *self.scan_interval.read();
            let mut slept = Duration::ZERO;
            while slept < interval && !self.stop_requested.load(Ordering::SeqCst) {
                let step = (interval - slept).min(Duration::from_millis(50));
                std::thread::sleep(step);
                slept += step;
            }
        }
    }

    /// One pressure scan; the worker runs this on every cycle
    pub fn scan_once(&self) {
        self.update_trends();
        let level = self.pressure();

        let changed = {
            let mut last = self.last_level.lock();
            let changed = *last != level;
            *last = level;
            changed
        };
        if changed {
            info!("memory pressure is now {:?}", level);
            let callbacks = self.callbacks.lock().clone();
            for cb in callbacks {
                cb(level);
            }
        }

        if level == PressureLevel::Low || !self.auto_optimize.load(Ordering::SeqCst) {
            return;
        }
        match level {
            PressureLevel::Medium => {
                self.clear_page_cache();
            }
            PressureLevel::High => {
                self.clear_all_caches();
                for hog in self.identify_memory_hogs(HIGH_PRESSURE_OPTIMIZE_COUNT) {
                    self.optimize_process_memory(hog.pid);
                }
            }
            PressureLevel::Critical => self.handle_critical(),
            PressureLevel::Low => unreachable!(),
        }
    }

    /// Critical mitigation: drop, compact, then terminate hogs while the
    /// free floor is breached
    fn handle_critical(&self) {
        self.clear_all_caches();
        self.compact();

        let minimum_free = self.thresholds.read().minimum_free_kb;
        let Some(system) = self.observer.get_system() else {
            return;
        };
        if system.mem_available_kb >= minimum_free {
            return;
        }
        let mut deficit = minimum_free.saturating_sub(system.mem_available_kb);
        let mut killed = 0;

        for hog in self.identify_memory_hogs(usize::MAX) {
            if deficit == 0 || killed >= EMERGENCY_KILL_LIMIT {
                break;
            }
            // Criticality is enforced again inside the controller
            match self.control.terminate(hog.pid) {
                Ok(()) => {
                    warn!(
                        "critical pressure: terminated pid {} ({}, {} kB)",
                        hog.pid, hog.name, hog.rss_kb
                    );
                    deficit = deficit.saturating_sub(hog.rss_kb);
                    killed += 1;
                }
                Err(e) => debug!("critical pressure: skipping pid {}: {}", hog.pid, e),
            }
        }
    }

    fn update_trends(&self) {
        let Some(system) = self.observer.get_system() else {
            return;
        };
        let total = system.mem_total_kb.max(1);
        let processes = self.observer.get_processes();
        let live: std::collections::HashSet<Pid> = processes.iter().map(|p| p.pid).collect();

        // One pass under the single map mutex
        let mut trend = self.trend.lock();
        for process in &processes {
            let share = 100.0 * process.rss_kb as f64 / total as f64;
            let entry = trend.entry(process.pid).or_insert(share);
            *entry = MEMORY_TREND_DECAY * *entry + (1.0 - MEMORY_TREND_DECAY) * share;
        }
        trend.retain(|pid, _| live.contains(pid));
    }

    fn enrich(&self, snapshot: &ProcessSnapshot) -> ProcessMemory {
        ProcessMemory {
            pid: snapshot.pid,
            name: snapshot.name.clone(),
            rss_kb: snapshot.rss_kb,
            vsize_kb: snapshot.vsize_kb,
            trend_pct: self.trend.lock().get(&snapshot.pid).copied().unwrap_or(0.0),
        }
    }

    fn write_sink(&self, rel: &str, value: &str) -> bool {
        let path = self.sink_root.join(rel);
        match std::fs::write(&path, value) {
            Ok(()) => {
                debug!("wrote '{}' to {}", value, path.display());
                true
            }
            Err(e) => {
                // Typically missing privileges; mitigation continues without it
                debug!("sink {} unavailable: {}", path.display(), e);
                false
            }
        }
    }

    /// Kilobytes a successful emergency sweep is expected to free
    pub fn projected_emergency_gain(&self) -> KiloBytes {
        self.identify_memory_hogs(EMERGENCY_KILL_LIMIT)
            .iter()
            .map(|h| h.rss_kb)
            .sum()
    }
}

impl Drop for MemoryController {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fake_sinks() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let vm = tmp.path().join("sys/vm");
        fs::create_dir_all(&vm).unwrap();
        fs::write(vm.join("drop_caches"), "").unwrap();
        fs::write(vm.join("compact_memory"), "").unwrap();
        let root = tmp.path().to_path_buf();
        (tmp, root)
    }

    struct NoopOps;

    impl crate::control::ProcessOps for NoopOps {
        fn probe(&self, _pid: Pid) -> crate::control::Probe {
            crate::control::Probe::Allowed
        }
        fn alive(&self, _pid: Pid) -> bool {
            false
        }
        fn send_stop(&self, _pid: Pid) -> Result<(), String> {
            Ok(())
        }
        fn send_continue(&self, _pid: Pid) -> Result<(), String> {
            Ok(())
        }
        fn send_terminate(&self, _pid: Pid) -> Result<(), String> {
            Ok(())
        }
        fn send_kill(&self, _pid: Pid) -> Result<(), String> {
            Ok(())
        }
        fn apply_nice(&self, _pid: Pid, _nice: i32) -> Result<(), String> {
            Ok(())
        }
        fn read_nice(&self, _pid: Pid) -> Option<i32> {
            Some(0)
        }
        fn apply_affinity(&self, _pid: Pid, _cores: &[usize]) -> Result<(), String> {
            Ok(())
        }
    }

    fn controller_with_sinks(root: &std::path::Path) -> Arc<MemoryController> {
        let observer = Arc::new(Observer::with_proc_root("/nonexistent-proc"));
        let control = Arc::new(crate::control::ProcessController::with_ops(
            Arc::clone(&observer),
            Arc::new(NoopOps),
        ));
        Arc::new(MemoryController::with_sink_root(observer, control, root))
    }

    #[test]
    fn test_cache_drop_writes_values() {
        let (_tmp, root) = fake_sinks();
        let memory = controller_with_sinks(&root);

        assert!(memory.clear_page_cache());
        assert_eq!(
            fs::read_to_string(root.join("sys/vm/drop_caches")).unwrap(),
            "1"
        );
        assert!(memory.clear_all_caches());
        assert_eq!(
            fs::read_to_string(root.join("sys/vm/drop_caches")).unwrap(),
            "3"
        );
        assert!(memory.compact());
        assert_eq!(
            fs::read_to_string(root.join("sys/vm/compact_memory")).unwrap(),
            "1"
        );
    }

    #[test]
    fn test_missing_sink_soft_fails() {
        let tmp = TempDir::new().unwrap();
        let memory = controller_with_sinks(tmp.path());
        assert!(!memory.clear_page_cache());
        assert!(!memory.compact());
    }

    #[test]
    fn test_pressure_low_without_observations() {
        let (_tmp, root) = fake_sinks();
        let memory = controller_with_sinks(&root);
        assert_eq!(memory.pressure(), PressureLevel::Low);
    }
}
