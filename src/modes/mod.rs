/*!
 * Mode Manager
 * Applies composite configurations transactionally across subsystems
 */

use crate::control::{ProcessCategory, ProcessController, RunState};
use crate::core::errors::ModeError;
use crate::core::limits::{DEFAULT_DETECT_INTERVAL, DEFAULT_TRANSITION_DELAY};
use crate::memory::MemoryController;
use crate::observer::Observer;
use crate::scheduler::Scheduler;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

pub mod detect;
pub mod hardware;
pub mod types;

pub use detect::detect_optimal_mode;
pub use hardware::HardwareControl;
pub use types::{Mode, ModeConfig, ModeMetrics, ProcessRestore, StateBackup};

/// Nice value granted to a mode's high-priority name matches
const HIGH_PRIORITY_NICE: i32 = -10;

/// Swappiness values for the swap toggle
const SWAPPINESS_ON: u8 = 60;
const SWAPPINESS_OFF: u8 = 0;

type SwitchCallback = Arc<dyn Fn(Mode, Mode) + Send + Sync>;

/// The mode state machine; owns the optional auto-detection worker
pub struct ModeManager {
    scheduler: Arc<Scheduler>,
    memory: Arc<MemoryController>,
    control: Arc<ProcessController>,
    observer: Arc<Observer>,
    hardware: HardwareControl,

    configs: RwLock<HashMap<Mode, ModeConfig>>,
    active: RwLock<Mode>,
    previous: RwLock<Option<Mode>>,

    /// At most one switch in flight
    switching: AtomicBool,
    smooth_transitions: AtomicBool,
    transition_delay: RwLock<Duration>,

    auto_enabled: AtomicBool,
    detect_interval: RwLock<Duration>,

    callbacks: Mutex<Vec<SwitchCallback>>,
    metrics: Mutex<ModeMetrics>,

    /// Suppresses stale quick-override reverts
    override_generation: AtomicU64,

    /// Governor found at construction, re-applied on shutdown
    startup_governor: Option<String>,

    stop_requested: AtomicBool,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ModeManager {
    pub fn new(
        scheduler: Arc<Scheduler>,
        memory: Arc<MemoryController>,
        control: Arc<ProcessController>,
        observer: Arc<Observer>,
    ) -> Self {
        Self::with_hardware(scheduler, memory, control, observer, HardwareControl::new())
    }

    /// Build with an explicit hardware layer; used by tests
    pub fn with_hardware(
        scheduler: Arc<Scheduler>,
        memory: Arc<MemoryController>,
        control: Arc<ProcessController>,
        observer: Arc<Observer>,
        hardware: HardwareControl,
    ) -> Self {
        let startup_governor = hardware.read_governor();
        let configs = Mode::ALL
            .iter()
            .map(|mode| (*mode, ModeConfig::defaults(*mode)))
            .collect();
        Self {
            scheduler,
            memory,
            control,
            observer,
            hardware,
            configs: RwLock::new(configs),
            active: RwLock::new(Mode::Balanced),
            previous: RwLock::new(None),
            switching: AtomicBool::new(false),
            smooth_transitions: AtomicBool::new(true),
            transition_delay: RwLock::new(DEFAULT_TRANSITION_DELAY),
            auto_enabled: AtomicBool::new(false),
            detect_interval: RwLock::new(DEFAULT_DETECT_INTERVAL),
            callbacks: Mutex::new(Vec::new()),
            metrics: Mutex::new(ModeMetrics::default()),
            override_generation: AtomicU64::new(0),
            startup_governor,
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    pub fn active_mode(&self) -> Mode {
        *self.active.read()
    }

    pub fn previous_mode(&self) -> Option<Mode> {
        *self.previous.read()
    }

    pub fn mode_config(&self, mode: Mode) -> ModeConfig {
        self.configs.read()[&mode].clone()
    }

    pub fn metrics(&self) -> ModeMetrics {
        self.metrics.lock().clone()
    }

    pub fn set_smooth_transitions(&self, enabled: bool) {
        self.smooth_transitions.store(enabled, Ordering::SeqCst);
    }

    pub fn set_transition_delay(&self, delay: Duration) {
        *self.transition_delay.write() = delay;
    }

    pub fn set_detect_interval(&self, interval: Duration) {
        *self.detect_interval.write() = interval.max(Duration::from_millis(100));
    }

    pub fn set_auto_detection(&self, enabled: bool) {
        self.auto_enabled.store(enabled, Ordering::SeqCst);
    }

    /// Invoked as (from, to) after every committed switch
    pub fn subscribe_switch(&self, cb: impl Fn(Mode, Mode) + Send + Sync + 'static) {
        self.callbacks.lock().push(Arc::new(cb));
    }

    /// Overlay JSON profile patches onto the compiled-in mode table
    pub fn load_profiles(
        &self,
        profiles: &HashMap<String, serde_json::Value>,
    ) -> Result<(), ModeError> {
        let mut configs = self.configs.write();
        for (name, patch) in profiles {
            let mode: Mode = name.parse()?;
            let config = configs.get_mut(&mode).expect("all modes present");
            config.apply_patch(patch)?;
        }
        Ok(())
    }

    /// Switch to the target mode, atomically
    ///
    /// Either the full composite configuration lands, or the backup is
    /// replayed and the active mode is left untouched.
    pub fn switch(&self, target: Mode) -> Result<(), ModeError> {
        if self.switching.swap(true, Ordering::SeqCst) {
            return Err(ModeError::SwitchInFlight);
        }
        let result = self.switch_locked(target);
        self.switching.store(false, Ordering::SeqCst);
        result
    }

    fn switch_locked(&self, target: Mode) -> Result<(), ModeError> {
        let current = *self.active.read();
        if current == target {
            return Err(ModeError::AlreadyActive(target.to_string()));
        }

        info!("mode switch {} -> {}", current, target);
        let backup = self.build_backup(current);

        if self.smooth_transitions.load(Ordering::SeqCst) {
            std::thread::sleep(*self.transition_delay.read());
        }

        let config = self.mode_config(target);
        if let Err(err) = self.apply_mode(&config) {
            warn!("mode apply failed, restoring: {}", err);
            if let Err(restore_err) = self.restore(&backup) {
                warn!("restore after failed switch incomplete: {}", restore_err);
            }
            self.metrics.lock().failed_switches += 1;
            return Err(ModeError::ApplyFailed(err.to_string()));
        }

        *self.previous.write() = Some(current);
        *self.active.write() = target;
        {
            let mut metrics = self.metrics.lock();
            metrics.switches += 1;
            metrics.active_since = Some(SystemTime::now());
        }
        let callbacks = self.callbacks.lock().clone();
        for cb in callbacks {
            cb(current, target);
        }
        info!("mode switch committed: {}", target);
        Ok(())
    }

    /// Apply the active mode's configuration without the switch protocol
    ///
    /// Used once at startup, where there is no prior mode to restore.
    pub fn apply_startup(&self, mode: Mode) {
        *self.active.write() = mode;
        let config = self.mode_config(mode);
        if let Err(err) = self.apply_mode(&config) {
            warn!("startup mode apply incomplete: {}", err);
        }
        self.metrics.lock().active_since = Some(SystemTime::now());
    }

    fn build_backup(&self, mode: Mode) -> StateBackup {
        StateBackup {
            mode,
            algorithm: self.scheduler.algorithm(),
            governor: self.hardware.read_governor(),
            processes: self
                .control
                .managed_processes()
                .into_iter()
                .map(|m| ProcessRestore {
                    pid: m.pid,
                    nice: m.current_nice,
                    state: m.current_state,
                })
                .collect(),
        }
    }

    fn apply_mode(&self, config: &ModeConfig) -> Result<(), ModeError> {
        // Scheduler first: pure in-process state, cannot fail
        self.scheduler.set_algorithm(config.algorithm);
        self.scheduler
            .set_default_slice(Duration::from_millis(config.time_slice_ms));
        self.scheduler.set_priority_boost(config.realtime_boost);

        // Memory policy; the swap knob is privilege-dependent and soft
        self.memory.set_strategy(config.memory_strategy);
        let swappiness = if config.swap_enabled {
            SWAPPINESS_ON
        } else {
            SWAPPINESS_OFF
        };
        if !self.memory.set_swappiness(swappiness) {
            debug!("swappiness unavailable, continuing");
        }

        // Name-based process lists; per-pid failures are tolerated because
        // matches may be protected or already gone
        self.apply_process_lists(config);

        // Hardware last; any failure here aborts the switch
        self.hardware.set_governor(&config.governor)?;
        self.hardware.set_turbo(config.turbo)?;
        if let Some(pct) = config.brightness_pct {
            self.hardware.set_brightness_pct(pct)?;
        }
        match config.freq_cap_pct {
            Some(pct) => self.hardware.set_freq_cap_pct(pct)?,
            None => self.hardware.clear_freq_cap()?,
        }
        Ok(())
    }

    fn apply_process_lists(&self, config: &ModeConfig) {
        if config.high_priority_tokens.is_empty() && config.suspend_tokens.is_empty() {
            return;
        }
        for process in self.observer.get_processes() {
            let lower = process.name.to_lowercase();
            if config.high_priority_tokens.iter().any(|t| lower.contains(t)) {
                self.control.set_category(process.pid, ProcessCategory::Gaming);
                if let Err(e) = self.control.set_nice(process.pid, HIGH_PRIORITY_NICE) {
                    debug!("high-priority nice for pid {} skipped: {}", process.pid, e);
                }
                if config.realtime_boost {
                    self.scheduler.register_realtime(process.pid, 10);
                }
            } else if config.suspend_tokens.iter().any(|t| lower.contains(t)) {
                if let Err(e) = self.control.pause(process.pid) {
                    debug!("suspend of pid {} skipped: {}", process.pid, e);
                }
            }
        }
    }

    /// Replay a backup after a failed apply
    fn restore(&self, backup: &StateBackup) -> Result<(), ModeError> {
        let mut failures = Vec::new();

        self.scheduler.set_algorithm(backup.algorithm);
        if let Some(governor) = &backup.governor {
            if let Err(e) = self.hardware.set_governor(governor) {
                failures.push(e.to_string());
            }
        }

        let backed_up: std::collections::HashSet<_> =
            backup.processes.iter().map(|p| p.pid).collect();
        for entry in &backup.processes {
            self.restore_process(entry.pid, entry.nice, entry.state, &mut failures);
        }
        // Entries created during the failed apply are not in the backup;
        // their pre-intervention values live on the managed record itself
        for managed in self.control.managed_processes() {
            if backed_up.contains(&managed.pid) {
                continue;
            }
            self.scheduler.unregister_realtime(managed.pid);
            self.restore_process(
                managed.pid,
                managed.original_nice,
                managed.original_state,
                &mut failures,
            );
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ModeError::RestoreFailed(failures.join("; ")))
        }
    }

    fn restore_process(
        &self,
        pid: crate::core::types::Pid,
        nice: crate::core::types::Nice,
        state: RunState,
        failures: &mut Vec<String>,
    ) {
        match self.control.set_nice(pid, nice) {
            Ok(()) | Err(crate::core::errors::ControlError::NotFound(_)) => {}
            Err(e) => failures.push(e.to_string()),
        }
        if state == RunState::Running {
            if let Some(managed) = self.control.managed_process(pid) {
                if managed.current_state == RunState::Suspended {
                    if let Err(e) = self.control.resume(pid) {
                        failures.push(e.to_string());
                    }
                }
            }
        }
    }

    /// Switch to Gaming for a bounded burst, then return
    pub fn quick_boost(self: &Arc<Self>, duration: Duration) -> Result<(), ModeError> {
        self.quick_override(Mode::Gaming, duration)
    }

    /// Switch to PowerSaving for a bounded stretch, then return
    pub fn quick_power_save(self: &Arc<Self>, duration: Duration) -> Result<(), ModeError> {
        self.quick_override(Mode::PowerSaving, duration)
    }

    fn quick_override(self: &Arc<Self>, target: Mode, duration: Duration) -> Result<(), ModeError> {
        let prior = self.active_mode();
        if prior == target {
            return Err(ModeError::AlreadyActive(target.to_string()));
        }
        self.switch(target)?;

        let generation = self.override_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let manager = Arc::clone(self);
        std::thread::Builder::new()
            .name("mode-override".into())
            .spawn(move || {
                std::thread::sleep(duration);
                // A newer override or manual switch supersedes this revert
                if manager.override_generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                if manager.active_mode() != target {
                    return;
                }
                if let Err(e) = manager.switch(prior) {
                    warn!("quick override revert failed: {}", e);
                }
            })
            .expect("spawn override timer");
        Ok(())
    }

    /// Start the auto-detection worker; no-op when already running
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        let manager = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("mode-detect".into())
            .spawn(move || manager.detect_loop())
            .expect("spawn mode worker");
        *self.handle.lock() = Some(handle);
        info!("mode auto-detection worker started");
    }

    /// Request stop, join the worker, and leave the host as found
    pub fn stop(&self) {
        if self.running.load(Ordering::SeqCst) {
            self.stop_requested.store(true, Ordering::SeqCst);
            if let Some(handle) = self.handle.lock().take() {
                let _ = handle.join();
            }
            self.running.store(false, Ordering::SeqCst);
        }
        self.restore_system_state();
        info!("mode manager stopped");
    }

    /// Undo interventions: managed processes and the startup governor
    pub fn restore_system_state(&self) {
        self.control.restore_all();
        if let Some(governor) = &self.startup_governor {
            if let Err(e) = self.hardware.set_governor(governor) {
                warn!("could not restore startup governor: {}", e);
            }
        }
    }

    fn detect_loop(&self) {
        while !self.stop_requested.load(Ordering::SeqCst) {
            if self.auto_enabled.load(Ordering::SeqCst) {
                self.detect_once();
            }
            let interval = *self.detect_interval.read();
            let mut slept = Duration::ZERO;
            while slept < interval && !self.stop_requested.load(Ordering::SeqCst) {
                let step = (interval - slept).min(Duration::from_millis(50));
                std::thread::sleep(step);
                slept += step;
            }
        }
    }

    /// One auto-detection evaluation; the worker runs this on every cycle
    pub fn detect_once(&self) {
        let processes = self.observer.get_processes();
        let detected = detect_optimal_mode(&processes, &self.hardware);
        if detected == self.active_mode() {
            return;
        }
        info!("auto-detection proposes {}", detected);
        if let Err(e) = self.switch(detected) {
            debug!("auto switch skipped: {}", e);
        }
    }
}

impl Drop for ModeManager {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            self.stop_requested.store(true, Ordering::SeqCst);
            if let Some(handle) = self.handle.lock().take() {
                let _ = handle.join();
            }
            self.running.store(false, Ordering::SeqCst);
        }
    }
}
