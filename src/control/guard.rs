/*!
 * Criticality Guard
 * Protects processes whose loss would impair host operability
 */

use crate::core::types::Pid;
use parking_lot::RwLock;
use std::collections::HashSet;

/// Exact names protected out of the box: host init, display stack, bus,
/// network management
const SEED_NAMES: &[&str] = &[
    "systemd",
    "init",
    "dbus-daemon",
    "dbus-broker",
    "NetworkManager",
    "wpa_supplicant",
    "Xorg",
    "Xwayland",
    "gnome-shell",
    "kwin_wayland",
    "sway",
    "sshd",
    "login",
];

/// Kernel threads and init helpers are protected by prefix
const SEED_PREFIXES: &[&str] = &[
    "kthread", "kworker", "ksoftirqd", "migration", "rcu_", "watchdog", "irq/", "systemd-",
];

/// Pid 1 and pid 2 never qualify for interventions
const PROTECTED_PIDS: &[Pid] = &[1, 2];

/// Runtime-extensible set of processes the controller refuses to touch
pub struct CriticalGuard {
    names: RwLock<HashSet<String>>,
    prefixes: RwLock<Vec<String>>,
    pids: RwLock<HashSet<Pid>>,
}

impl CriticalGuard {
    pub fn new() -> Self {
        Self {
            names: RwLock::new(SEED_NAMES.iter().map(|s| s.to_string()).collect()),
            prefixes: RwLock::new(SEED_PREFIXES.iter().map(|s| s.to_string()).collect()),
            pids: RwLock::new(PROTECTED_PIDS.iter().copied().collect()),
        }
    }

    /// Whether the given process may never be modified
    pub fn is_critical(&self, pid: Pid, name: &str) -> bool {
        if self.pids.read().contains(&pid) {
            return true;
        }
        if self.names.read().contains(name) {
            return true;
        }
        self.prefixes.read().iter().any(|p| name.starts_with(p))
    }

    pub fn protect_name(&self, name: impl Into<String>) {
        self.names.write().insert(name.into());
    }

    pub fn protect_prefix(&self, prefix: impl Into<String>) {
        self.prefixes.write().push(prefix.into());
    }

    pub fn protect_pid(&self, pid: Pid) {
        self.pids.write().insert(pid);
    }
}

impl Default for CriticalGuard {
    fn default() -> Self {
        Self::new()
    }
}
