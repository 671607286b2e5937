/*!
 * Process Classification
 * Name-token inference on admission, usage-based adjustment afterwards
 */

use crate::core::limits::{
    BATCH_CPU_PCT, IDLE_CPU_PCT, MAX_TIME_SLICE, MIN_TIME_SLICE,
};
use crate::scheduler::types::ProcessClass;
use std::time::Duration;

const SYSTEM_TOKENS: &[&str] = &[
    "systemd", "kthread", "kworker", "init", "dbus", "udev", "journald", "cron",
];

const INTERACTIVE_TOKENS: &[&str] = &[
    "xorg", "wayland", "gnome", "plasma", "kwin", "sway", "firefox", "chrom", "browser", "steam",
    "game", "terminal", "konsole", "alacritty",
];

const BATCH_TOKENS: &[&str] = &[
    "make", "gcc", "clang", "rustc", "cargo", "cc1", "ld", "backup", "rsync", "tar", "ffmpeg",
    "compile", "build", "encode",
];

/// Infer a class from the process name; interactive when nothing matches
pub fn classify_name(name: &str) -> ProcessClass {
    let lower = name.to_lowercase();
    if SYSTEM_TOKENS.iter().any(|t| lower.contains(t)) {
        return ProcessClass::System;
    }
    if INTERACTIVE_TOKENS.iter().any(|t| lower.contains(t)) {
        return ProcessClass::Interactive;
    }
    if BATCH_TOKENS.iter().any(|t| lower.contains(t)) {
        return ProcessClass::Batch;
    }
    ProcessClass::Interactive
}

/// Usage-driven adjustment; real-time registrations are sticky
pub fn reclassify(current: ProcessClass, cpu_pct: f64) -> ProcessClass {
    if current == ProcessClass::RealTime {
        return current;
    }
    if cpu_pct > BATCH_CPU_PCT {
        ProcessClass::Batch
    } else if cpu_pct < IDLE_CPU_PCT {
        ProcessClass::Idle
    } else {
        current
    }
}

/// Class-determined slice, clamped into the global bounds
pub fn initial_slice(class: ProcessClass) -> Duration {
    let raw = match class {
        ProcessClass::RealTime => Duration::from_millis(20),
        ProcessClass::Interactive => Duration::from_millis(50),
        ProcessClass::System => Duration::from_millis(100),
        ProcessClass::Batch => Duration::from_millis(200),
        ProcessClass::Idle => Duration::from_millis(500),
    };
    raw.clamp(MIN_TIME_SLICE, MAX_TIME_SLICE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_tokens() {
        assert_eq!(classify_name("systemd-oomd"), ProcessClass::System);
        assert_eq!(classify_name("firefox-bin"), ProcessClass::Interactive);
        assert_eq!(classify_name("rustc"), ProcessClass::Batch);
        assert_eq!(classify_name("mystery-tool"), ProcessClass::Interactive);
        assert_eq!(classify_name("Chromium"), ProcessClass::Interactive);
    }

    #[test]
    fn test_reclassify_by_usage() {
        assert_eq!(
            reclassify(ProcessClass::Interactive, 95.0),
            ProcessClass::Batch
        );
        assert_eq!(reclassify(ProcessClass::Batch, 1.0), ProcessClass::Idle);
        assert_eq!(
            reclassify(ProcessClass::Interactive, 50.0),
            ProcessClass::Interactive
        );
        assert_eq!(reclassify(ProcessClass::RealTime, 1.0), ProcessClass::RealTime);
    }

    #[test]
    fn test_slice_table() {
        assert_eq!(initial_slice(ProcessClass::RealTime), Duration::from_millis(20));
        assert_eq!(initial_slice(ProcessClass::Idle), Duration::from_millis(500));
        for class in [
            ProcessClass::RealTime,
            ProcessClass::Interactive,
            ProcessClass::System,
            ProcessClass::Batch,
            ProcessClass::Idle,
        ] {
            let slice = initial_slice(class);
            assert!(slice >= MIN_TIME_SLICE && slice <= MAX_TIME_SLICE);
        }
    }
}
