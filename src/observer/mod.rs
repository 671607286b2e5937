/*!
 * System & Process Observer
 * Polls host state on a fixed interval, publishing consistent snapshots
 * and fanning them out to subscribers
 */

use crate::core::errors::ObserverError;
use crate::core::limits::{CPU_HISTORY_LEN, DEFAULT_POLL_INTERVAL};
use crate::core::types::{Pid, Ticks};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime};

pub mod procfs;
pub mod types;

pub use types::{CpuTicks, ProcState, ProcessSnapshot, SystemSnapshot};

type ProcessCallback = Arc<dyn Fn(&[ProcessSnapshot]) + Send + Sync>;
type SystemCallback = Arc<dyn Fn(&SystemSnapshot) + Send + Sync>;
type FailureCallback = Arc<dyn Fn(&ObserverError) + Send + Sync>;

/// The pair published by one completed poll
#[derive(Debug, Clone, Default)]
struct Published {
    processes: Vec<ProcessSnapshot>,
    system: Option<SystemSnapshot>,
}

struct Inner {
    proc_root: PathBuf,
    interval: RwLock<Duration>,

    // Most recently completed poll; readers never see the in-flight one
    published: RwLock<Published>,

    // Delta state for CPU% computation
    last_pid_ticks: DashMap<Pid, Ticks, RandomState>,
    last_cpu_ticks: Mutex<Option<CpuTicks>>,

    // System-wide CPU moving average ring
    cpu_history: Mutex<VecDeque<f64>>,

    process_subs: Mutex<Vec<ProcessCallback>>,
    system_subs: Mutex<Vec<SystemCallback>>,
    failure_subs: Mutex<Vec<FailureCallback>>,

    stop_requested: AtomicBool,
    running: AtomicBool,
}

/// Observer of the host's process table and system counters
pub struct Observer {
    inner: Arc<Inner>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Observer {
    pub fn new() -> Self {
        Self::with_proc_root("/proc")
    }

    /// Build against an alternate proc root; used by tests and containers
    pub fn with_proc_root(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                proc_root: root.into(),
                interval: RwLock::new(DEFAULT_POLL_INTERVAL),
                published: RwLock::new(Published::default()),
                last_pid_ticks: DashMap::with_hasher(RandomState::new()),
                last_cpu_ticks: Mutex::new(None),
                cpu_history: Mutex::new(VecDeque::with_capacity(CPU_HISTORY_LEN)),
                process_subs: Mutex::new(Vec::new()),
                system_subs: Mutex::new(Vec::new()),
                failure_subs: Mutex::new(Vec::new()),
                stop_requested: AtomicBool::new(false),
                running: AtomicBool::new(false),
            }),
            handle: Mutex::new(None),
        }
    }

    pub fn set_interval(&self, interval: Duration) {
        *self.inner.interval.write() = interval.max(Duration::from_millis(10));
    }

    /// Start the poll worker; no-op when already running
    pub fn start(&self) {
        if self.inner.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.stop_requested.store(false, Ordering::SeqCst);
        let inner = Arc::clone(&self.inner);
        let handle = std::thread::Builder::new()
            .name("observer".into())
            .spawn(move || poll_loop(inner))
            .expect("spawn observer worker");
        *self.handle.lock() = Some(handle);
        info!("observer started (root {})", self.inner.proc_root.display());
    }

    /// Request stop and join the worker; no-op when not running
    pub fn stop(&self) {
        if !self.inner.running.load(Ordering::SeqCst) {
            return;
        }
        self.inner.stop_requested.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
        self.inner.running.store(false, Ordering::SeqCst);
        // A restarted observer reports cpu_pct = 0 on its first poll again
        self.inner.last_pid_ticks.clear();
        *self.inner.last_cpu_ticks.lock() = None;
        info!("observer stopped");
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Run one poll synchronously and publish its result
    ///
    /// The background worker calls this on every tick; embedders and tests
    /// may drive it directly for deterministic sampling.
    pub fn poll_once(&self) -> Result<(), ObserverError> {
        poll_once(&self.inner)
    }

    /// Processes from the last completed poll
    pub fn get_processes(&self) -> Vec<ProcessSnapshot> {
        self.inner.published.read().processes.clone()
    }

    pub fn get_process(&self, pid: Pid) -> Option<ProcessSnapshot> {
        self.inner
            .published
            .read()
            .processes
            .iter()
            .find(|p| p.pid == pid)
            .cloned()
    }

    pub fn get_processes_by_name(&self, needle: &str) -> Vec<ProcessSnapshot> {
        self.inner
            .published
            .read()
            .processes
            .iter()
            .filter(|p| p.name.contains(needle))
            .cloned()
            .collect()
    }

    /// System totals from the last completed poll
    pub fn get_system(&self) -> Option<SystemSnapshot> {
        self.inner.published.read().system.clone()
    }

    /// Top CPU consumers, descending; pid ascending breaks ties
    pub fn top_cpu(&self, n: usize) -> Vec<ProcessSnapshot> {
        let mut processes = self.get_processes();
        processes.sort_by(|a, b| {
            b.cpu_pct
                .partial_cmp(&a.cpu_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.pid.cmp(&b.pid))
        });
        processes.truncate(n);
        processes
    }

    /// Top resident-memory consumers, descending; pid ascending breaks ties
    pub fn top_memory(&self, n: usize) -> Vec<ProcessSnapshot> {
        let mut processes = self.get_processes();
        processes.sort_by(|a, b| b.rss_kb.cmp(&a.rss_kb).then(a.pid.cmp(&b.pid)));
        processes.truncate(n);
        processes
    }

    /// Mean of the recent system CPU samples
    pub fn moving_average_cpu(&self) -> f64 {
        let history = self.inner.cpu_history.lock();
        if history.is_empty() {
            return 0.0;
        }
        history.iter().sum::<f64>() / history.len() as f64
    }

    pub fn subscribe_process(&self, cb: impl Fn(&[ProcessSnapshot]) + Send + Sync + 'static) {
        self.inner.process_subs.lock().push(Arc::new(cb));
    }

    pub fn subscribe_system(&self, cb: impl Fn(&SystemSnapshot) + Send + Sync + 'static) {
        self.inner.system_subs.lock().push(Arc::new(cb));
    }

    /// Invoked when a fatal source failure stops the worker
    pub fn subscribe_failure(&self, cb: impl Fn(&ObserverError) + Send + Sync + 'static) {
        self.inner.failure_subs.lock().push(Arc::new(cb));
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_loop(inner: Arc<Inner>) {
    while !inner.stop_requested.load(Ordering::SeqCst) {
        if let Err(err) = poll_once(&inner) {
            match err {
                ObserverError::SourceMissing(_) => {
                    error!("observer source lost, stopping worker: {}", err);
                    let subs = inner.failure_subs.lock().clone();
                    for cb in subs {
                        cb(&err);
                    }
                    inner.running.store(false, Ordering::SeqCst);
                    return;
                }
                other => debug!("observer poll error: {}", other),
            }
        }
        let interval = *inner.interval.read();
        let mut slept = Duration::ZERO;
        // Sleep in short steps so stop requests are honored promptly
        while slept < interval && !inner.stop_requested.load(Ordering::SeqCst) {
            let step = (interval - slept).min(Duration::from_millis(50));
            std::thread::sleep(step);
            slept += step;
        }
    }
}

fn poll_once(inner: &Inner) -> Result<(), ObserverError> {
    let root = &inner.proc_root;
    let now = SystemTime::now();

    let cpu_ticks = procfs::parse_cpu_line(&read_source(root, "stat")?)?;
    let meminfo = procfs::parse_meminfo(&read_source(root, "meminfo")?);
    let load_avg = procfs::parse_loadavg(&read_source(root, "loadavg")?);
    let core_count = std::fs::read_to_string(root.join("cpuinfo"))
        .map(|t| procfs::parse_core_count(&t))
        .unwrap_or(1);

    // Global deltas first; per-pid shares divide by the total delta
    let (cpu_total_pct, delta_total) = {
        let mut last = inner.last_cpu_ticks.lock();
        let result = match *last {
            Some(prev) => {
                let dt = cpu_ticks.total().saturating_sub(prev.total());
                let da = cpu_ticks.active().saturating_sub(prev.active());
                (100.0 * da as f64 / dt.max(1) as f64, Some(dt))
            }
            None => (0.0, None),
        };
        *last = Some(cpu_ticks);
        result
    };

    let pids = procfs::list_pids(root)?;
    let mut processes = Vec::with_capacity(pids.len());
    let mut seen: HashSet<Pid> = HashSet::with_capacity(pids.len());

    for pid in pids {
        match sample_pid(root, pid, delta_total, inner, now) {
            Ok(snapshot) => {
                seen.insert(pid);
                processes.push(snapshot);
            }
            // Any per-pid failure skips that pid only; it may have exited
            Err(err) => debug!("skipping pid {}: {}", pid, err),
        }
    }

    // Drop delta state for pids that vanished so reuse starts fresh
    inner.last_pid_ticks.retain(|pid, _| seen.contains(pid));

    {
        let mut history = inner.cpu_history.lock();
        if history.len() == CPU_HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(cpu_total_pct);
    }

    let system = SystemSnapshot {
        cpu_total_pct,
        cpu_ticks,
        mem_total_kb: meminfo.total_kb,
        mem_available_kb: meminfo.available_kb,
        mem_cached_kb: meminfo.cached_kb,
        mem_buffered_kb: meminfo.buffered_kb,
        swap_total_kb: meminfo.swap_total_kb,
        swap_free_kb: meminfo.swap_free_kb,
        load_avg,
        core_count,
        timestamp: now,
    };

    // Publish atomically under one lock, then notify outside it
    let (procs, sys) = {
        let mut published = inner.published.write();
        published.processes = processes;
        published.system = Some(system);
        (published.processes.clone(), published.system.clone())
    };

    if !inner.stop_requested.load(Ordering::SeqCst) {
        let process_subs = inner.process_subs.lock().clone();
        for cb in process_subs {
            cb(&procs);
        }
        if let Some(sys) = sys {
            let system_subs = inner.system_subs.lock().clone();
            for cb in system_subs {
                cb(&sys);
            }
        }
    }

    Ok(())
}

fn sample_pid(
    root: &Path,
    pid: Pid,
    delta_total: Option<Ticks>,
    inner: &Inner,
    now: SystemTime,
) -> Result<ProcessSnapshot, ObserverError> {
    let pid_dir = root.join(pid.to_string());
    let stat_line =
        std::fs::read_to_string(pid_dir.join("stat")).map_err(|e| ObserverError::Malformed {
            pid,
            reason: e.to_string(),
        })?;
    let stat = procfs::parse_pid_stat(pid, &stat_line)?;

    // status is authoritative for RSS; fall back to the stat estimate
    let rss_kb = std::fs::read_to_string(pid_dir.join("status"))
        .ok()
        .and_then(|t| procfs::parse_status_rss(&t))
        .unwrap_or(stat.rss_kb);

    let command = std::fs::read(pid_dir.join("cmdline"))
        .map(|raw| procfs::parse_cmdline(&raw))
        .unwrap_or_default();

    let active = stat.utime + stat.stime;
    let cpu_pct = match (inner.last_pid_ticks.get(&pid), delta_total) {
        (Some(prev), Some(dt)) => {
            let delta_pid = active.saturating_sub(*prev);
            100.0 * delta_pid as f64 / dt.max(1) as f64
        }
        // First observation of this pid reports zero
        _ => 0.0,
    };
    inner.last_pid_ticks.insert(pid, active);

    Ok(ProcessSnapshot {
        pid,
        name: stat.name,
        command,
        state: stat.state,
        parent_pid: stat.parent_pid,
        thread_count: stat.thread_count,
        nice: stat.nice,
        vsize_kb: stat.vsize_kb,
        rss_kb,
        cpu_user_ticks: stat.utime,
        cpu_system_ticks: stat.stime,
        last_observed_at: now,
        cpu_pct,
    })
}

fn read_source(root: &Path, name: &str) -> Result<String, ObserverError> {
    std::fs::read_to_string(root.join(name))
        .map_err(|e| ObserverError::SourceMissing(format!("{}/{}: {}", root.display(), name, e)))
}
