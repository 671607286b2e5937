/*!
 * Daemon
 * Top-level owner: constructs each component once, wires the dependency
 * graph, and exposes the upward operations
 */

use crate::control::ProcessController;
use crate::core::config::Settings;
use crate::core::errors::{ControlError, ModeError};
use crate::core::types::{Nice, Pid};
use crate::memory::{MemoryController, MemoryThresholds};
use crate::modes::{Mode, ModeManager};
use crate::observer::{Observer, ProcessSnapshot, SystemSnapshot};
use crate::scheduler::Scheduler;
use log::info;
use std::sync::Arc;

/// Owns all components; there are no reference cycles, only Arcs handed
/// downward from here
pub struct Daemon {
    settings: Settings,
    observer: Arc<Observer>,
    control: Arc<ProcessController>,
    memory: Arc<MemoryController>,
    scheduler: Arc<Scheduler>,
    modes: Arc<ModeManager>,
}

impl Daemon {
    #[cfg(unix)]
    pub fn new(settings: Settings) -> Self {
        let observer = Arc::new(Observer::new());
        let control = Arc::new(ProcessController::new(Arc::clone(&observer)));
        Self::wire(settings, observer, control)
    }

    /// Assemble from pre-built leaves; used by tests with fake roots
    pub fn wire(
        settings: Settings,
        observer: Arc<Observer>,
        control: Arc<ProcessController>,
    ) -> Self {
        let memory = Arc::new(MemoryController::new(
            Arc::clone(&observer),
            Arc::clone(&control),
        ));
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&observer),
            Arc::clone(&control),
            settings.default_scheduling_algorithm.into(),
        ));
        let modes = Arc::new(ModeManager::new(
            Arc::clone(&scheduler),
            Arc::clone(&memory),
            Arc::clone(&control),
            Arc::clone(&observer),
        ));
        Self::assemble(settings, observer, control, memory, scheduler, modes)
    }

    /// Final wiring step shared by all constructors
    pub fn assemble(
        settings: Settings,
        observer: Arc<Observer>,
        control: Arc<ProcessController>,
        memory: Arc<MemoryController>,
        scheduler: Arc<Scheduler>,
        modes: Arc<ModeManager>,
    ) -> Self {
        observer.set_interval(settings.monitoring_interval);
        control.set_alert_thresholds(
            settings.cpu_threshold_percent,
            settings.memory_threshold_percent,
        );
        memory.set_auto_optimize(settings.enable_auto_optimization);
        memory.set_thresholds(MemoryThresholds {
            low_pct: settings.memory_threshold_percent,
            ..MemoryThresholds::default()
        });
        scheduler.set_default_slice(settings.default_time_slice);
        modes.set_auto_detection(settings.enable_auto_mode);

        Self {
            settings,
            observer,
            control,
            memory,
            scheduler,
            modes,
        }
    }

    /// Start every worker and apply the startup mode
    pub fn start(&self) {
        info!("daemon starting");
        self.observer.start();
        self.modes.apply_startup(self.settings.default_mode.into());
        self.scheduler.start();
        self.memory.start();
        self.control.start_auto_manage();
        self.modes.start();
        info!("daemon running");
    }

    /// Stop every worker and leave the host as found
    pub fn stop(&self) {
        info!("daemon stopping");
        self.modes.stop();
        self.control.stop_auto_manage();
        self.memory.stop();
        self.scheduler.stop();
        self.observer.stop();
        info!("daemon stopped");
    }

    pub fn switch_mode(&self, name: &str) -> Result<(), ModeError> {
        let mode: Mode = name.parse()?;
        self.modes.switch(mode)
    }

    pub fn current_mode(&self) -> Mode {
        self.modes.active_mode()
    }

    pub fn top_cpu(&self, n: usize) -> Vec<ProcessSnapshot> {
        self.observer.top_cpu(n)
    }

    pub fn top_memory(&self, n: usize) -> Vec<ProcessSnapshot> {
        self.observer.top_memory(n)
    }

    pub fn system_snapshot(&self) -> Option<SystemSnapshot> {
        self.observer.get_system()
    }

    pub fn pause(&self, pid: Pid) -> Result<(), ControlError> {
        self.control.pause(pid)
    }

    pub fn resume(&self, pid: Pid) -> Result<(), ControlError> {
        self.control.resume(pid)
    }

    pub fn terminate(&self, pid: Pid) -> Result<(), ControlError> {
        self.control.terminate(pid)
    }

    pub fn set_nice(&self, pid: Pid, nice: Nice) -> Result<(), ControlError> {
        self.control.set_nice(pid, nice)
    }

    pub fn optimize_memory(&self) {
        self.memory.optimize_system_memory();
    }

    pub fn clear_caches(&self) -> bool {
        self.memory.clear_all_caches()
    }

    pub fn observer(&self) -> &Arc<Observer> {
        &self.observer
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn memory(&self) -> &Arc<MemoryController> {
        &self.memory
    }

    pub fn controller(&self) -> &Arc<ProcessController> {
        &self.control
    }

    pub fn modes(&self) -> &Arc<ModeManager> {
        &self.modes
    }
}
