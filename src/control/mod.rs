/*!
 * Process Controller
 * Applies process-level operations under permission and criticality guards
 */

use crate::core::errors::ControlError;
use crate::core::limits::{
    AUTO_MANAGE_INTERVAL, DEFAULT_CPU_ALERT_PCT, DEFAULT_LOW_PRESSURE_PCT, EMERGENCY_KILL_LIMIT,
    MEMORY_WARNING_RSS_KB, TERMINATE_GRACE, TERMINATE_PROBE_STEP,
};
use crate::core::types::{clamp_nice, KiloBytes, Nice, Pid, NICE_MAX};
use crate::observer::Observer;
use ahash::RandomState;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

pub mod cgroup;
pub mod events;
pub mod guard;
pub mod types;

pub use cgroup::GroupManager;
pub use events::{EventLane, LaneStats};
pub use guard::CriticalGuard;
pub use types::{
    ControlAction, ControlEvent, GroupConfig, LimitKind, ManagedProcess, ProcessCategory,
    RunState, SystemResource,
};

/// Outcome of the null-signal permission probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probe {
    Allowed,
    Denied,
    Gone,
}

/// Host process primitives behind a seam so policies stay testable
///
/// The real implementation issues signals and scheduling syscalls; tests
/// substitute a recording fake.
pub trait ProcessOps: Send + Sync {
    fn probe(&self, pid: Pid) -> Probe;
    fn alive(&self, pid: Pid) -> bool;
    fn send_stop(&self, pid: Pid) -> Result<(), String>;
    fn send_continue(&self, pid: Pid) -> Result<(), String>;
    fn send_terminate(&self, pid: Pid) -> Result<(), String>;
    fn send_kill(&self, pid: Pid) -> Result<(), String>;
    fn apply_nice(&self, pid: Pid, nice: Nice) -> Result<(), String>;
    fn read_nice(&self, pid: Pid) -> Option<Nice>;
    fn apply_affinity(&self, pid: Pid, cores: &[usize]) -> Result<(), String>;
}

/// Real host implementation using signals and scheduling syscalls
#[cfg(unix)]
pub struct SysOps;

#[cfg(unix)]
impl SysOps {
    fn kill(pid: Pid, signal: Option<nix::sys::signal::Signal>) -> Result<(), String> {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), signal)
            .map_err(|e| e.to_string())
    }
}

#[cfg(unix)]
impl ProcessOps for SysOps {
    fn probe(&self, pid: Pid) -> Probe {
        use nix::errno::Errno;
        match nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None) {
            Ok(()) => Probe::Allowed,
            Err(Errno::EPERM) => Probe::Denied,
            Err(_) => Probe::Gone,
        }
    }

    fn alive(&self, pid: Pid) -> bool {
        self.probe(pid) != Probe::Gone
    }

    fn send_stop(&self, pid: Pid) -> Result<(), String> {
        Self::kill(pid, Some(nix::sys::signal::Signal::SIGSTOP))
    }

    fn send_continue(&self, pid: Pid) -> Result<(), String> {
        Self::kill(pid, Some(nix::sys::signal::Signal::SIGCONT))
    }

    fn send_terminate(&self, pid: Pid) -> Result<(), String> {
        Self::kill(pid, Some(nix::sys::signal::Signal::SIGTERM))
    }

    fn send_kill(&self, pid: Pid) -> Result<(), String> {
        Self::kill(pid, Some(nix::sys::signal::Signal::SIGKILL))
    }

    fn apply_nice(&self, pid: Pid, nice: Nice) -> Result<(), String> {
        let rc = unsafe { nix::libc::setpriority(nix::libc::PRIO_PROCESS, pid, nice) };
        if rc == -1 {
            return Err(std::io::Error::last_os_error().to_string());
        }
        Ok(())
    }

    fn read_nice(&self, pid: Pid) -> Option<Nice> {
        nix::errno::Errno::clear();
        let value = unsafe { nix::libc::getpriority(nix::libc::PRIO_PROCESS, pid) };
        if value == -1 && nix::errno::Errno::last() != nix::errno::Errno::UnknownErrno {
            return None;
        }
        Some(value)
    }

    fn apply_affinity(&self, pid: Pid, cores: &[usize]) -> Result<(), String> {
        let mut set = nix::sched::CpuSet::new();
        for core in cores {
            set.set(*core).map_err(|e| e.to_string())?;
        }
        nix::sched::sched_setaffinity(nix::unistd::Pid::from_raw(pid as i32), &set)
            .map_err(|e| e.to_string())
    }
}

/// Controller state shared with its auto-management worker
pub struct ProcessController {
    ops: Arc<dyn ProcessOps>,
    observer: Arc<Observer>,
    guard: CriticalGuard,
    groups: GroupManager,
    /// One mutex guards the whole managed table; host calls happen outside it
    managed: Mutex<HashMap<Pid, ManagedProcess, RandomState>>,
    events: EventLane,

    cpu_alert_pct: RwLock<f64>,
    memory_alert_pct: RwLock<f64>,

    auto_interval: RwLock<Duration>,
    stop_requested: AtomicBool,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProcessController {
    #[cfg(unix)]
    pub fn new(observer: Arc<Observer>) -> Self {
        Self::with_ops(observer, Arc::new(SysOps))
    }

    /// Build with substituted host primitives; used by tests
    pub fn with_ops(observer: Arc<Observer>, ops: Arc<dyn ProcessOps>) -> Self {
        Self {
            ops,
            observer,
            guard: CriticalGuard::new(),
            groups: GroupManager::new(),
            managed: Mutex::new(HashMap::with_hasher(RandomState::new())),
            events: EventLane::new(),
            cpu_alert_pct: RwLock::new(DEFAULT_CPU_ALERT_PCT),
            memory_alert_pct: RwLock::new(DEFAULT_LOW_PRESSURE_PCT),
            auto_interval: RwLock::new(AUTO_MANAGE_INTERVAL),
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    pub fn with_group_base(mut self, base: impl Into<std::path::PathBuf>) -> Self {
        self.groups = GroupManager::with_base(base);
        self
    }

    pub fn guard(&self) -> &CriticalGuard {
        &self.guard
    }

    pub fn events(&self) -> &EventLane {
        &self.events
    }

    pub fn set_alert_thresholds(&self, cpu_pct: f64, memory_pct: f64) {
        *self.cpu_alert_pct.write() = cpu_pct.clamp(0.0, 100.0);
        *self.memory_alert_pct.write() = memory_pct.clamp(0.0, 100.0);
    }

    pub fn set_auto_manage_interval(&self, interval: Duration) {
        *self.auto_interval.write() = interval.max(Duration::from_millis(1));
    }

    /// Gracefully terminate, escalating to a forced kill after the grace
    pub fn terminate(&self, pid: Pid) -> Result<(), ControlError> {
        let result = self.terminate_inner(pid);
        self.record(ControlAction::Terminate, pid, &result);
        result
    }

    fn terminate_inner(&self, pid: Pid) -> Result<(), ControlError> {
        self.check_guard(pid)?;
        self.ops
            .send_terminate(pid)
            .map_err(|reason| ControlError::HostCall { pid, reason })?;

        let mut waited = Duration::ZERO;
        while waited < TERMINATE_GRACE && self.ops.alive(pid) {
            std::thread::sleep(TERMINATE_PROBE_STEP);
            waited += TERMINATE_PROBE_STEP;
        }
        if self.ops.alive(pid) {
            debug!("pid {} survived grace, escalating to kill", pid);
            self.ops
                .send_kill(pid)
                .map_err(|reason| ControlError::HostCall { pid, reason })?;
        }
        if self.ops.alive(pid) {
            return Err(ControlError::StillAlive(pid));
        }

        if let Some(managed) = self.managed.lock().get_mut(&pid) {
            managed.current_state = RunState::Terminated;
            managed.last_action_at = SystemTime::now();
        }
        info!("pid {} terminated", pid);
        Ok(())
    }

    /// Suspend the process; the host action and this bookkeeping op are distinct
    pub fn pause(&self, pid: Pid) -> Result<(), ControlError> {
        let result = self.pause_inner(pid);
        self.record(ControlAction::Pause, pid, &result);
        result
    }

    fn pause_inner(&self, pid: Pid) -> Result<(), ControlError> {
        self.check_guard(pid)?;
        self.ops
            .send_stop(pid)
            .map_err(|reason| ControlError::HostCall { pid, reason })?;
        self.update_managed(pid, ProcessCategory::User, |managed| {
            managed.current_state = RunState::Suspended;
            managed.last_action_at = SystemTime::now();
        });
        info!("pid {} suspended", pid);
        Ok(())
    }

    /// Resume a suspended process
    pub fn resume(&self, pid: Pid) -> Result<(), ControlError> {
        let result = self.resume_inner(pid);
        self.record(ControlAction::Resume, pid, &result);
        result
    }

    fn resume_inner(&self, pid: Pid) -> Result<(), ControlError> {
        self.check_guard(pid)?;
        self.ops
            .send_continue(pid)
            .map_err(|reason| ControlError::HostCall { pid, reason })?;
        self.update_managed(pid, ProcessCategory::User, |managed| {
            managed.current_state = RunState::Running;
            managed.last_action_at = SystemTime::now();
        });
        info!("pid {} resumed", pid);
        Ok(())
    }

    /// Set the scheduling priority; out-of-range requests are clamped
    pub fn set_nice(&self, pid: Pid, nice: Nice) -> Result<(), ControlError> {
        let result = self.set_nice_inner(pid, nice);
        self.record(ControlAction::SetNice, pid, &result);
        result
    }

    fn set_nice_inner(&self, pid: Pid, nice: Nice) -> Result<(), ControlError> {
        let nice = clamp_nice(nice);
        self.check_guard(pid)?;
        self.ops
            .apply_nice(pid, nice)
            .map_err(|reason| ControlError::HostCall { pid, reason })?;
        self.update_managed(pid, ProcessCategory::User, |managed| {
            managed.current_nice = nice;
            managed.last_action_at = SystemTime::now();
        });
        debug!("pid {} nice set to {}", pid, nice);
        Ok(())
    }

    /// Bind the process to the given cores
    pub fn set_affinity(&self, pid: Pid, cores: &[usize]) -> Result<(), ControlError> {
        let result = self.set_affinity_inner(pid, cores);
        self.record(ControlAction::SetAffinity, pid, &result);
        result
    }

    fn set_affinity_inner(&self, pid: Pid, cores: &[usize]) -> Result<(), ControlError> {
        self.check_guard(pid)?;
        self.ops
            .apply_affinity(pid, cores)
            .map_err(|reason| ControlError::HostCall { pid, reason })?;
        debug!("pid {} bound to cores {:?}", pid, cores);
        Ok(())
    }

    /// Move the process into a shared resource group
    pub fn assign_group(&self, pid: Pid, config: &GroupConfig) -> Result<(), ControlError> {
        let result = self
            .check_guard(pid)
            .and_then(|()| self.groups.assign(pid, config));
        self.record(ControlAction::AssignGroup, pid, &result);
        result
    }

    /// Best-effort restoration of every managed process; never fails
    pub fn restore_all(&self) {
        let entries: Vec<ManagedProcess> = self.managed.lock().values().cloned().collect();
        for managed in entries {
            let pid = managed.pid;
            if !self.ops.alive(pid) {
                continue;
            }
            if managed.current_state == RunState::Suspended {
                if let Err(e) = self.ops.send_continue(pid) {
                    warn!("restore: resume of pid {} failed: {}", pid, e);
                } else if let Some(entry) = self.managed.lock().get_mut(&pid) {
                    entry.current_state = RunState::Running;
                }
            }
            if managed.current_nice != managed.original_nice {
                if let Err(e) = self.ops.apply_nice(pid, managed.original_nice) {
                    warn!("restore: nice of pid {} failed: {}", pid, e);
                } else if let Some(entry) = self.managed.lock().get_mut(&pid) {
                    entry.current_nice = managed.original_nice;
                }
            }
        }
        info!("managed processes restored");
    }

    /// Record category and limits for a process without touching the host
    pub fn set_category(&self, pid: Pid, category: ProcessCategory) {
        self.update_managed(pid, category, |managed| {
            managed.category = category;
        });
    }

    pub fn set_limits(&self, pid: Pid, memory_limit_kb: KiloBytes, cpu_limit_pct: f64) {
        self.update_managed(pid, ProcessCategory::User, |managed| {
            managed.memory_limit_kb = memory_limit_kb;
            managed.cpu_limit_pct = cpu_limit_pct.clamp(0.0, 100.0);
        });
    }

    pub fn managed_process(&self, pid: Pid) -> Option<ManagedProcess> {
        self.managed.lock().get(&pid).cloned()
    }

    /// Consistent snapshot of the whole table under its one mutex
    pub fn managed_processes(&self) -> Vec<ManagedProcess> {
        self.managed.lock().values().cloned().collect()
    }

    /// Drop table entries for pids the observer no longer sees
    pub fn reconcile(&self) {
        let live: std::collections::HashSet<Pid> = self
            .observer
            .get_processes()
            .iter()
            .map(|p| p.pid)
            .collect();
        if live.is_empty() {
            return;
        }
        self.managed.lock().retain(|pid, _| live.contains(pid));
    }

    /// Start the auto-management worker; no-op when already running
    pub fn start_auto_manage(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        let controller = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("proc-control".into())
            .spawn(move || controller.auto_manage_loop())
            .expect("spawn control worker");
        *self.handle.lock() = Some(handle);
        info!("process auto-management started");
    }

    /// Request stop and join the worker
    pub fn stop_auto_manage(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        self.running.store(false, Ordering::SeqCst);
        info!("process auto-management stopped");
    }

    fn auto_manage_loop(&self) {
        while !self.stop_requested.load(Ordering::SeqCst) {
            self.auto_manage_once();
            let interval = *self.auto_interval.read();
            let mut slept = Duration::ZERO;
            while slept < interval && !self.stop_requested.load(Ordering::SeqCst) {
                let step = (interval - slept).min(Duration::from_millis(50));
                std::thread::sleep(step);
                slept += step;
            }
        }
    }

    /// One auto-management sweep; the worker runs this on every cycle
    pub fn auto_manage_once(&self) {
        self.reconcile();
        self.check_process_limits();
        self.check_system_thresholds();
    }

    fn check_process_limits(&self) {
        let snapshots = self.observer.get_processes();
        let limits: HashMap<Pid, ManagedProcess, RandomState> = self.managed.lock().clone();
        for snapshot in &snapshots {
            let Some(managed) = limits.get(&snapshot.pid) else {
                continue;
            };
            if managed.is_critical() {
                continue;
            }
            let mut breached = None;
            if managed.memory_limit_kb > 0 && snapshot.rss_kb > managed.memory_limit_kb {
                breached = Some((
                    LimitKind::Memory,
                    snapshot.rss_kb as f64,
                    managed.memory_limit_kb as f64,
                ));
            } else if managed.cpu_limit_pct < 100.0 && snapshot.cpu_pct > managed.cpu_limit_pct {
                breached = Some((LimitKind::Cpu, snapshot.cpu_pct, managed.cpu_limit_pct));
            }
            if let Some((kind, observed, limit)) = breached {
                warn!(
                    "pid {} exceeded {:?} limit ({} > {})",
                    snapshot.pid, kind, observed, limit
                );
                let _ = self.set_nice(snapshot.pid, NICE_MAX);
                self.events.publish(ControlEvent::ResourceLimitExceeded {
                    pid: snapshot.pid,
                    kind,
                    observed,
                    limit,
                });
            }
        }
    }

    fn check_system_thresholds(&self) {
        let Some(system) = self.observer.get_system() else {
            return;
        };
        let cpu_threshold = *self.cpu_alert_pct.read();
        if system.cpu_total_pct > cpu_threshold {
            self.events.publish(ControlEvent::SystemThresholdExceeded {
                resource: SystemResource::Cpu,
                observed_pct: system.cpu_total_pct,
                threshold_pct: cpu_threshold,
            });
        }
        let memory_threshold = *self.memory_alert_pct.read();
        if system.mem_used_pct() > memory_threshold {
            self.events.publish(ControlEvent::SystemThresholdExceeded {
                resource: SystemResource::Memory,
                observed_pct: system.mem_used_pct(),
                threshold_pct: memory_threshold,
            });
            self.emergency_kill_memory_hogs();
        }
    }

    /// Terminate the largest non-critical residents until pressure abates
    pub fn emergency_kill_memory_hogs(&self) -> usize {
        let threshold = *self.memory_alert_pct.read();
        let mut killed = 0;
        for candidate in self.observer.top_memory(usize::MAX) {
            if killed >= EMERGENCY_KILL_LIMIT {
                break;
            }
            if candidate.rss_kb <= MEMORY_WARNING_RSS_KB {
                break; // sorted descending, nothing further qualifies
            }
            if self.guard.is_critical(candidate.pid, &candidate.name) {
                continue;
            }
            match self.terminate(candidate.pid) {
                Ok(()) => {
                    killed += 1;
                    warn!(
                        "emergency: terminated pid {} ({}, {} kB)",
                        candidate.pid, candidate.name, candidate.rss_kb
                    );
                }
                Err(e) => debug!("emergency: skipping pid {}: {}", candidate.pid, e),
            }
            if let Some(system) = self.observer.get_system() {
                if system.mem_used_pct() < threshold {
                    break;
                }
            }
        }
        killed
    }

    fn check_guard(&self, pid: Pid) -> Result<(), ControlError> {
        let name = self
            .observer
            .get_process(pid)
            .map(|p| p.name)
            .or_else(|| self.managed.lock().get(&pid).map(|m| m.name.clone()))
            .unwrap_or_default();
        if self.guard.is_critical(pid, &name) {
            return Err(ControlError::Protected(pid));
        }
        match self.ops.probe(pid) {
            Probe::Allowed => Ok(()),
            Probe::Denied => Err(ControlError::PermissionDenied(pid)),
            Probe::Gone => Err(ControlError::NotFound(pid)),
        }
    }

    /// Mutate the entry for a pid, creating it on first intervention
    ///
    /// The seed values come from observer and host reads collected before
    /// the table mutex is taken, so the critical section stays short.
    fn update_managed<R>(
        &self,
        pid: Pid,
        category: ProcessCategory,
        apply: impl FnOnce(&mut ManagedProcess) -> R,
    ) -> R {
        let known = self.managed.lock().contains_key(&pid);
        let seed = if known {
            // Entry existed a moment ago; the fallback only matters if it
            // is reconciled away between these two lock acquisitions
            ManagedProcess::new(pid, String::new(), category, 0)
        } else {
            let snapshot = self.observer.get_process(pid);
            let name = snapshot.as_ref().map(|p| p.name.clone()).unwrap_or_default();
            let original_nice = snapshot
                .map(|p| p.nice)
                .or_else(|| self.ops.read_nice(pid))
                .unwrap_or(0);
            ManagedProcess::new(pid, name, category, original_nice)
        };

        let mut managed = self.managed.lock();
        apply(managed.entry(pid).or_insert(seed))
    }

    fn record(&self, action: ControlAction, pid: Pid, result: &Result<(), ControlError>) {
        self.events.publish(ControlEvent::ProcessAction {
            action,
            pid,
            success: result.is_ok(),
        });
    }
}

impl Drop for ProcessController {
    fn drop(&mut self) {
        self.stop_auto_manage();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::collections::HashMap;

    /// Recording fake of the host primitives
    #[derive(Default)]
    struct FakeOps {
        nice: PlMutex<HashMap<Pid, Nice>>,
        stopped: PlMutex<Vec<Pid>>,
        continued: PlMutex<Vec<Pid>>,
        dead: PlMutex<Vec<Pid>>,
        denied: PlMutex<Vec<Pid>>,
        term_survivors: PlMutex<Vec<Pid>>,
    }

    impl ProcessOps for FakeOps {
        fn probe(&self, pid: Pid) -> Probe {
            if self.dead.lock().contains(&pid) {
                Probe::Gone
            } else if self.denied.lock().contains(&pid) {
                Probe::Denied
            } else {
                Probe::Allowed
            }
        }

        fn alive(&self, pid: Pid) -> bool {
            !self.dead.lock().contains(&pid)
        }

        fn send_stop(&self, pid: Pid) -> Result<(), String> {
            self.stopped.lock().push(pid);
            Ok(())
        }

        fn send_continue(&self, pid: Pid) -> Result<(), String> {
            self.continued.lock().push(pid);
            Ok(())
        }

        fn send_terminate(&self, pid: Pid) -> Result<(), String> {
            if !self.term_survivors.lock().contains(&pid) {
                self.dead.lock().push(pid);
            }
            Ok(())
        }

        fn send_kill(&self, pid: Pid) -> Result<(), String> {
            self.dead.lock().push(pid);
            Ok(())
        }

        fn apply_nice(&self, pid: Pid, nice: Nice) -> Result<(), String> {
            self.nice.lock().insert(pid, nice);
            Ok(())
        }

        fn read_nice(&self, pid: Pid) -> Option<Nice> {
            self.nice.lock().get(&pid).copied()
        }

        fn apply_affinity(&self, _pid: Pid, _cores: &[usize]) -> Result<(), String> {
            Ok(())
        }
    }

    fn controller() -> (Arc<FakeOps>, ProcessController) {
        let ops = Arc::new(FakeOps::default());
        let observer = Arc::new(Observer::with_proc_root("/nonexistent-proc"));
        let controller = ProcessController::with_ops(observer, ops.clone());
        (ops, controller)
    }

    #[test]
    fn test_nice_clamped() {
        let (ops, controller) = controller();
        controller.set_nice(100, 99).unwrap();
        assert_eq!(ops.nice.lock()[&100], NICE_MAX);
        controller.set_nice(100, -99).unwrap();
        assert_eq!(ops.nice.lock()[&100], crate::core::types::NICE_MIN);
    }

    #[test]
    fn test_pause_resume_state_round_trip() {
        let (ops, controller) = controller();
        controller.pause(200).unwrap();
        assert_eq!(
            controller.managed_process(200).unwrap().current_state,
            RunState::Suspended
        );
        controller.resume(200).unwrap();
        assert_eq!(
            controller.managed_process(200).unwrap().current_state,
            RunState::Running
        );
        assert_eq!(*ops.stopped.lock(), vec![200]);
        assert_eq!(*ops.continued.lock(), vec![200]);
    }

    #[test]
    fn test_protected_pid_rejected_without_host_call() {
        let (ops, controller) = controller();
        controller.guard().protect_pid(300);
        let err = controller.pause(300).unwrap_err();
        assert_eq!(err, ControlError::Protected(300));
        assert!(ops.stopped.lock().is_empty());
    }

    #[test]
    fn test_permission_denied_surfaces() {
        let (ops, controller) = controller();
        ops.denied.lock().push(400);
        assert_eq!(
            controller.set_nice(400, 5).unwrap_err(),
            ControlError::PermissionDenied(400)
        );
    }

    #[test]
    fn test_terminate_marks_state() {
        let (_, controller) = controller();
        controller.set_limits(500, 0, 100.0); // create managed entry
        controller.terminate(500).unwrap();
        assert_eq!(
            controller.managed_process(500).unwrap().current_state,
            RunState::Terminated
        );
    }

    #[test]
    fn test_restore_all_resumes_and_restores_nice() {
        let (ops, controller) = controller();
        ops.nice.lock().insert(600, 0);
        controller.set_nice(600, 10).unwrap();
        controller.pause(600).unwrap();

        controller.restore_all();

        assert_eq!(ops.nice.lock()[&600], 0);
        assert_eq!(*ops.continued.lock(), vec![600]);
        let managed = controller.managed_process(600).unwrap();
        assert_eq!(managed.current_state, RunState::Running);
        assert_eq!(managed.current_nice, 0);
    }

    #[test]
    fn test_restore_all_skips_dead() {
        let (ops, controller) = controller();
        controller.pause(700).unwrap();
        ops.dead.lock().push(700);
        controller.restore_all(); // must not panic or error
        assert!(ops.continued.lock().is_empty());
    }

    #[test]
    fn test_events_reflect_failures() {
        let (_, controller) = controller();
        controller.guard().protect_pid(800);
        let _ = controller.pause(800);

        let mut saw_failure = false;
        while let Some(event) = controller.events().try_consume() {
            if let ControlEvent::ProcessAction { pid: 800, success, .. } = event {
                saw_failure = !success;
            }
        }
        assert!(saw_failure);
    }
}
