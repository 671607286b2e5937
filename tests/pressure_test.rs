/*!
 * Memory Pressure Tests
 * Escalating mitigation, emergency termination ordering, and exemptions
 */

mod common;

use common::{write_proc_global, write_proc_pid, MockOps};
use smartsched::control::ProcessController;
use smartsched::memory::{MemoryController, MemoryStrategy, PressureLevel};
use smartsched::observer::Observer;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Stack {
    ops: Arc<MockOps>,
    observer: Arc<Observer>,
    memory: Arc<MemoryController>,
    root: PathBuf,
    _dir: TempDir,
}

/// Fake proc tree doubling as the vm sink root
fn stack(total_kb: u64, available_kb: u64) -> Stack {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();
    write_proc_global(&root, (1000, 0, 0, 1000), total_kb, available_kb);
    std::fs::create_dir_all(root.join("sys/vm")).unwrap();
    std::fs::write(root.join("sys/vm/drop_caches"), "").unwrap();
    std::fs::write(root.join("sys/vm/compact_memory"), "").unwrap();
    std::fs::write(root.join("sys/vm/swappiness"), "60").unwrap();

    let ops = Arc::new(MockOps::default());
    let observer = Arc::new(Observer::with_proc_root(&root));
    let control = Arc::new(ProcessController::with_ops(
        Arc::clone(&observer),
        ops.clone(),
    ));
    let memory = Arc::new(MemoryController::with_sink_root(
        Arc::clone(&observer),
        control,
        &root,
    ));
    Stack {
        ops,
        observer,
        memory,
        root,
        _dir: dir,
    }
}

fn sink(stack: &Stack, name: &str) -> String {
    std::fs::read_to_string(stack.root.join("sys/vm").join(name)).unwrap()
}

#[test]
fn pressure_levels_follow_used_memory() {
    // 50% used
    let s = stack(1_000_000, 500_000);
    s.observer.poll_once().unwrap();
    assert_eq!(s.memory.pressure(), PressureLevel::Low);

    // 75% used
    let s = stack(1_000_000, 250_000);
    s.observer.poll_once().unwrap();
    assert_eq!(s.memory.pressure(), PressureLevel::Medium);

    // 85% used
    let s = stack(1_000_000, 150_000);
    s.observer.poll_once().unwrap();
    assert_eq!(s.memory.pressure(), PressureLevel::High);

    // 95% used
    let s = stack(1_000_000, 50_000);
    s.observer.poll_once().unwrap();
    assert_eq!(s.memory.pressure(), PressureLevel::Critical);
}

#[test]
fn medium_pressure_drops_only_the_page_cache() {
    let s = stack(1_000_000, 250_000);
    s.observer.poll_once().unwrap();
    s.memory.scan_once();
    assert_eq!(sink(&s, "drop_caches"), "1");
    assert!(s.ops.terminated.lock().is_empty());
}

#[test]
fn high_pressure_lowers_the_biggest_residents() {
    let s = stack(1_000_000, 150_000);
    write_proc_pid(&s.root, 201, "bloaty", 0, 90_000);
    write_proc_pid(&s.root, 202, "modest", 0, 10_000);
    s.observer.poll_once().unwrap();

    s.memory.scan_once();
    assert_eq!(sink(&s, "drop_caches"), "3");
    // Soft action only: niced to the floor, not killed
    assert_eq!(s.ops.nice.lock().get(&201).copied(), Some(19));
    assert!(s.ops.terminated.lock().is_empty());
}

#[test]
fn critical_pressure_kills_hogs_largest_first_sparing_critical() {
    // 99%+ used and far below the free floor
    let s = stack(16_000_000, 100_000);
    write_proc_pid(&s.root, 2, "kworker/0:0", 0, 9_999_999);
    write_proc_pid(&s.root, 301, "systemd", 0, 500_000);
    write_proc_pid(&s.root, 310, "chromium", 0, 120_000);
    write_proc_pid(&s.root, 311, "blender", 0, 90_000);
    write_proc_pid(&s.root, 312, "editor", 0, 10_000);
    s.observer.poll_once().unwrap();

    s.memory.scan_once();

    assert_eq!(sink(&s, "drop_caches"), "3");
    assert_eq!(sink(&s, "compact_memory"), "1");

    let terminated = s.ops.terminated.lock().clone();
    // Largest non-critical first; the deficit (156 MB) is covered by two
    assert_eq!(terminated, vec![310, 311]);
    assert!(!terminated.contains(&301), "named-critical must survive");
    assert!(!terminated.contains(&2), "kernel thread must survive");
}

#[test]
fn strategies_gate_the_explicit_optimize_call() {
    // 80% used: Conservative stays quiet, Balanced acts
    let s = stack(1_000_000, 200_000);
    write_proc_pid(&s.root, 401, "bloaty", 0, 50_000);
    s.observer.poll_once().unwrap();

    s.memory.set_strategy(MemoryStrategy::Conservative);
    s.memory.optimize_system_memory();
    assert_eq!(sink(&s, "drop_caches"), "");

    s.memory.set_strategy(MemoryStrategy::Balanced);
    s.memory.optimize_system_memory();
    assert_eq!(sink(&s, "drop_caches"), "1");
    assert_eq!(s.ops.nice.lock().get(&401).copied(), Some(19));

    s.memory.set_strategy(MemoryStrategy::Aggressive);
    s.memory.optimize_system_memory();
    assert_eq!(sink(&s, "drop_caches"), "3");
    assert_eq!(sink(&s, "compact_memory"), "1");
}

#[test]
fn auto_optimize_off_leaves_the_host_alone() {
    let s = stack(1_000_000, 50_000);
    write_proc_pid(&s.root, 501, "bloaty", 0, 600_000);
    s.observer.poll_once().unwrap();

    s.memory.set_auto_optimize(false);
    s.memory.scan_once();
    assert_eq!(sink(&s, "drop_caches"), "");
    assert!(s.ops.terminated.lock().is_empty());
}

#[test]
fn pressure_callbacks_fire_on_level_changes() {
    let s = stack(1_000_000, 500_000);
    s.observer.poll_once().unwrap();

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink_cb = Arc::clone(&seen);
    s.memory.register_pressure_callback(move |level| {
        sink_cb.lock().push(level);
    });

    s.memory.scan_once(); // Low -> Low: no change, no callback
    write_proc_global(&s.root, (1100, 0, 0, 1100), 1_000_000, 50_000);
    s.observer.poll_once().unwrap();
    s.memory.scan_once(); // now Critical

    assert_eq!(*seen.lock(), vec![PressureLevel::Critical]);
}

#[test]
fn memory_trend_tracks_the_biggest_residents() {
    let s = stack(1_000_000, 500_000);
    write_proc_pid(&s.root, 601, "grower", 0, 100_000);
    s.observer.poll_once().unwrap();
    s.memory.scan_once();

    let info = s.memory.process_info(601).unwrap();
    assert!(info.trend_pct > 0.0);
    assert_eq!(info.rss_kb, 100_000);
}
