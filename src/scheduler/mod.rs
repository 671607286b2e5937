/*!
 * Adaptive Scheduler
 * Owns the scheduled-process table and applies the active policy each tick
 */

use crate::control::ProcessController;
use crate::core::errors::SchedulerError;
use crate::core::limits::{
    HIGH_LOAD_PCT, LOW_LOAD_PCT, MAX_TIME_SLICE, MIN_TIME_SLICE, SLICE_RELAX_FACTOR,
    SLICE_SHRINK_FACTOR, STARVATION_BOOST,
};
use crate::core::types::{clamp_nice, Pid, NICE_MAX};
use crate::observer::{Observer, ProcessSnapshot, SystemSnapshot};
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

pub mod classify;
pub mod entry;
mod policy;
pub mod types;

pub use entry::ScheduledProcess;
pub use types::{ProcessClass, SchedulerConfig, SchedulerStats, SchedulingAlgorithm};

use policy::QueueState;

type FailureCallback = Arc<dyn Fn(&SchedulerError) + Send + Sync>;

/// Everything guarded by the scheduler's single mutex
struct SchedState {
    algorithm: SchedulingAlgorithm,
    queues: QueueState,
    table: HashMap<Pid, ScheduledProcess>,
    current: Option<Pid>,
    /// Real-time registrations, ordered by registration priority (desc)
    realtime: Vec<(Pid, u8)>,
}

/// Lock-free counters updated on the hot path
#[derive(Default)]
struct AtomicStats {
    scheduled: AtomicU64,
    context_switches: AtomicU64,
    preemptions: AtomicU64,
}

/// The policy engine; one background worker drives `tick`
pub struct Scheduler {
    state: Mutex<SchedState>,
    config: RwLock<SchedulerConfig>,
    stats: AtomicStats,
    observer: Arc<Observer>,
    control: Arc<ProcessController>,
    failure_subs: Mutex<Vec<FailureCallback>>,

    stop_requested: AtomicBool,
    running: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(
        observer: Arc<Observer>,
        control: Arc<ProcessController>,
        algorithm: SchedulingAlgorithm,
    ) -> Self {
        info!("scheduler initialized with {:?}", algorithm);
        Self {
            state: Mutex::new(SchedState {
                algorithm,
                queues: QueueState::rebuild(algorithm, &HashMap::new()),
                table: HashMap::new(),
                current: None,
                realtime: Vec::new(),
            }),
            config: RwLock::new(SchedulerConfig::default()),
            stats: AtomicStats::default(),
            observer,
            control,
            failure_subs: Mutex::new(Vec::new()),
            stop_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            handle: Mutex::new(None),
        }
    }

    pub fn set_config(&self, config: SchedulerConfig) {
        *self.config.write() = config;
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config.read().clone()
    }

    pub fn set_default_slice(&self, slice: Duration) {
        self.config.write().default_slice = slice.clamp(MIN_TIME_SLICE, MAX_TIME_SLICE);
    }

    pub fn set_priority_boost(&self, enabled: bool) {
        self.config.write().priority_boost = enabled;
    }

    pub fn set_adaptive_slicing(&self, enabled: bool) {
        self.config.write().adaptive_slicing = enabled;
    }

    pub fn set_starvation_threshold(&self, threshold: Duration) {
        self.config.write().starvation_threshold = threshold;
    }

    pub fn algorithm(&self) -> SchedulingAlgorithm {
        self.state.lock().algorithm
    }

    /// Switch algorithms, rebuilding queues from the live table
    ///
    /// Re-setting the active algorithm is a no-op so the selection sequence
    /// is left undisturbed. Fields belonging to other algorithms are reset.
    pub fn set_algorithm(&self, algorithm: SchedulingAlgorithm) {
        let mut state = self.state.lock();
        if state.algorithm == algorithm {
            return;
        }
        for entry in state.table.values_mut() {
            if algorithm != SchedulingAlgorithm::Fair {
                entry.virtual_runtime = 0.0;
            }
            if algorithm != SchedulingAlgorithm::MultilevelFeedback {
                entry.queue_level = 0;
                entry.level_runs = 0;
            }
        }
        state.algorithm = algorithm;
        state.queues = QueueState::rebuild(algorithm, &state.table);
        info!("scheduler algorithm switched to {:?}", algorithm);
    }

    /// Register a pid to be selected ahead of any algorithmic choice
    pub fn register_realtime(&self, pid: Pid, priority: u8) {
        let mut state = self.state.lock();
        state.realtime.retain(|(p, _)| *p != pid);
        state.realtime.push((pid, priority));
        state.realtime.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        if let Some(entry) = state.table.get_mut(&pid) {
            entry.class = ProcessClass::RealTime;
            entry.time_slice = classify::initial_slice(ProcessClass::RealTime);
        }
    }

    pub fn unregister_realtime(&self, pid: Pid) {
        self.state.lock().realtime.retain(|(p, _)| *p != pid);
    }

    /// Subscribe to apply failures; the selection stands regardless
    pub fn subscribe_failure(&self, cb: impl Fn(&SchedulerError) + Send + Sync + 'static) {
        self.failure_subs.lock().push(Arc::new(cb));
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.state.lock();
        SchedulerStats {
            total_scheduled: self.stats.scheduled.load(Ordering::Relaxed),
            context_switches: self.stats.context_switches.load(Ordering::Relaxed),
            preemptions: self.stats.preemptions.load(Ordering::Relaxed),
            active_processes: state.table.len(),
            algorithm: state.algorithm,
        }
    }

    pub fn process(&self, pid: Pid) -> Option<ScheduledProcess> {
        self.state.lock().table.get(&pid).cloned()
    }

    pub fn processes(&self) -> Vec<ScheduledProcess> {
        self.state.lock().table.values().cloned().collect()
    }

    pub fn current(&self) -> Option<Pid> {
        self.state.lock().current
    }

    /// One scheduling cycle against the observer's latest poll
    ///
    /// Skipped entirely when the observer has not produced a snapshot yet.
    pub fn tick(&self) {
        let Some(system) = self.observer.get_system() else {
            debug!("tick skipped: no system snapshot");
            return;
        };
        let processes = self.observer.get_processes();
        self.tick_with(&processes, &system);
    }

    /// Deterministic tick against explicit observations
    ///
    /// Embedders and tests drive this directly; the worker funnels here.
    pub fn tick_with(&self, processes: &[ProcessSnapshot], system: &SystemSnapshot) {
        let now = Instant::now();
        let config = self.config.read().clone();
        let mut state = self.state.lock();

        self.reconcile(&mut state, processes, &config);
        self.refresh_entries(&mut state, processes, now, &config);

        let selected = self.select(&mut state, now);

        if let Some(pid) = selected {
            if state.current != Some(pid) {
                self.stats.context_switches.fetch_add(1, Ordering::Relaxed);
                if let Some(outgoing) = state.current {
                    if let Some(entry) = state.table.get_mut(&outgoing) {
                        entry.preemption_count += 1;
                    }
                    self.stats.preemptions.fetch_add(1, Ordering::Relaxed);
                }
            }

            let (nice, charge) = {
                let entry = state.table.get_mut(&pid).expect("selected pid present");
                entry.mark_scheduled(now);
                let nice = clamp_nice(-entry.dynamic_priority);
                // Fair accounting: charge weighted by nice so favorable
                // processes accrue runtime slower
                let weight = (entry.base_nice as f64 / 20.0).exp2();
                let usage = entry.latest_cpu();
                let charge = if usage > 0.0 { usage * 0.1 } else { 1.0 } * weight;
                (nice, charge)
            };
            if state.algorithm == SchedulingAlgorithm::Fair {
                if let Some(entry) = state.table.get_mut(&pid) {
                    entry.virtual_runtime += charge;
                }
            }
            state.current = Some(pid);
            self.stats.scheduled.fetch_add(1, Ordering::Relaxed);

            drop(state);
            if let Err(e) = self.control.set_nice(pid, nice) {
                let err = SchedulerError::ApplyFailed {
                    pid,
                    nice,
                    reason: e.to_string(),
                };
                debug!("priority apply failed: {}", err);
                let subs = self.failure_subs.lock().clone();
                for cb in subs {
                    cb(&err);
                }
            }
            state = self.state.lock();
        } else {
            state.current = None;
        }

        if config.adaptive_slicing {
            self.adapt_slices(&mut state, system);
        }
    }

    /// Start the tick worker; no-op when already running
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        let scheduler = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("scheduler".into())
            .spawn(move || scheduler.tick_loop())
            .expect("spawn scheduler worker");
        *self.handle.lock() = Some(handle);
        info!("scheduler started");
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
        info!("scheduler stopped");
    }

    fn tick_loop(&self) {
        while !self.stop_requested.load(Ordering::SeqCst) {
            self.tick();
            let interval = self.config.read().tick_interval;
            std::thread::sleep(interval);
        }
    }

    /// Add newly observed pids, drop vanished ones
    fn reconcile(
        &self,
        state: &mut SchedState,
        processes: &[ProcessSnapshot],
        config: &SchedulerConfig,
    ) {
        let live: HashMap<Pid, &ProcessSnapshot> =
            processes.iter().map(|p| (p.pid, p)).collect();

        let gone: Vec<Pid> = state
            .table
            .keys()
            .filter(|pid| !live.contains_key(pid))
            .copied()
            .collect();
        for pid in gone {
            state.table.remove(&pid);
            state.queues.remove(pid);
            state.realtime.retain(|(p, _)| *p != pid);
            if state.current == Some(pid) {
                state.current = None;
            }
        }

        let mut fresh: Vec<Pid> = live
            .keys()
            .filter(|pid| !state.table.contains_key(pid))
            .copied()
            .collect();
        fresh.sort_unstable();
        for pid in fresh {
            let snapshot = live[&pid];
            let class = classify::classify_name(&snapshot.name);
            // Specialized classes carry their own slice; the common case
            // starts from the mode-configured default
            let slice = if class == ProcessClass::Interactive {
                config.default_slice
            } else {
                classify::initial_slice(class)
            };
            let entry = ScheduledProcess::new(
                pid,
                snapshot.name.clone(),
                snapshot.nice,
                class,
                slice,
            );
            state.table.insert(pid, entry);
            state.queues.admit(pid);
        }
    }

    /// Update history, classes, and ranking values for present processes
    fn refresh_entries(
        &self,
        state: &mut SchedState,
        processes: &[ProcessSnapshot],
        now: Instant,
        config: &SchedulerConfig,
    ) {
        for snapshot in processes {
            let Some(entry) = state.table.get_mut(&snapshot.pid) else {
                continue;
            };
            entry.record_cpu(snapshot.cpu_pct);

            let was = entry.class;
            entry.class = classify::reclassify(entry.class, snapshot.cpu_pct);
            if entry.class != was {
                entry.time_slice = classify::initial_slice(entry.class);
            }

            let starving = entry.is_starving(now, config.starvation_threshold);
            if starving && config.priority_boost {
                entry.starvation_bonus += STARVATION_BOOST;
            }

            let mut rank = -entry.base_nice;
            if entry.class == ProcessClass::Interactive {
                rank += 5;
            }
            if entry.latest_cpu() > 80.0 {
                rank -= 3;
            }
            if starving {
                rank += 10;
            }
            entry.dynamic_priority = (rank + entry.starvation_bonus).min(NICE_MAX);
        }
    }

    /// Real-time registrations override the algorithmic choice
    fn select(&self, state: &mut SchedState, _now: Instant) -> Option<Pid> {
        let realtime = state
            .realtime
            .iter()
            .map(|(pid, _)| *pid)
            .find(|pid| state.table.contains_key(pid));
        if realtime.is_some() {
            return realtime;
        }
        policy::select_next(&mut state.queues, &mut state.table)
    }

    /// Shrink non-real-time slices under load, relax them when idle
    fn adapt_slices(&self, state: &mut SchedState, system: &SystemSnapshot) {
        if system.cpu_total_pct > HIGH_LOAD_PCT {
            for entry in state.table.values_mut() {
                if entry.class == ProcessClass::RealTime {
                    continue;
                }
                let scaled = entry.time_slice.mul_f64(SLICE_SHRINK_FACTOR);
                entry.time_slice = scaled.clamp(MIN_TIME_SLICE, MAX_TIME_SLICE);
            }
        } else if system.cpu_total_pct < LOW_LOAD_PCT {
            for entry in state.table.values_mut() {
                if entry.class == ProcessClass::RealTime {
                    continue;
                }
                let ceiling = classify::initial_slice(entry.class);
                let scaled = entry.time_slice.mul_f64(SLICE_RELAX_FACTOR).min(ceiling);
                entry.time_slice = scaled.clamp(MIN_TIME_SLICE, MAX_TIME_SLICE);
            }
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
