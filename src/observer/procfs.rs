/*!
 * Proc Filesystem Parsers
 * Line-oriented readers for the kernel's published process and system state
 */

use crate::core::errors::ObserverError;
use crate::core::types::{KiloBytes, LoadAvg, Pid, Ticks};
use crate::observer::types::{CpuTicks, ProcState};
use std::path::Path;

/// Page size used to convert statm/stat page counts to kilobytes
const PAGE_KB: u64 = 4;

/// Fields pulled from a single `/proc/<pid>/stat` line
#[derive(Debug, Clone, PartialEq)]
pub struct PidStat {
    pub name: String,
    pub state: ProcState,
    pub parent_pid: Pid,
    pub nice: i32,
    pub thread_count: u32,
    pub utime: Ticks,
    pub stime: Ticks,
    pub vsize_kb: KiloBytes,
    pub rss_kb: KiloBytes,
}

/// Enumerate numeric entries of the pid namespace
pub fn list_pids(proc_root: &Path) -> Result<Vec<Pid>, ObserverError> {
    let entries = std::fs::read_dir(proc_root)
        .map_err(|e| ObserverError::SourceMissing(format!("{}: {}", proc_root.display(), e)))?;
    let mut pids = Vec::new();
    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        if let Ok(pid) = entry.file_name().to_string_lossy().parse::<Pid>() {
            pids.push(pid);
        }
    }
    pids.sort_unstable();
    Ok(pids)
}

/// Parse one stat line; the comm field is parenthesised and may itself
/// contain spaces and parentheses, so split around the last `)`
pub fn parse_pid_stat(pid: Pid, line: &str) -> Result<PidStat, ObserverError> {
    let open = line.find('(').ok_or_else(|| malformed(pid, "missing comm"))?;
    let close = line.rfind(')').ok_or_else(|| malformed(pid, "unterminated comm"))?;
    if close < open {
        return Err(malformed(pid, "comm delimiters out of order"));
    }
    let name = line[open + 1..close].to_string();
    let rest: Vec<&str> = line[close + 1..].split_whitespace().collect();

    // rest[0] is field 3 (state); stat fields are 1-indexed in proc(5)
    let field = |idx: usize| -> Result<&str, ObserverError> {
        rest.get(idx - 3)
            .copied()
            .ok_or_else(|| malformed(pid, "truncated stat line"))
    };
    let num = |idx: usize| -> Result<u64, ObserverError> {
        field(idx)?
            .parse::<u64>()
            .map_err(|_| malformed(pid, "non-numeric stat field"))
    };

    let state = ProcState::from_letter(field(3)?.chars().next().unwrap_or('?'));
    let parent_pid = num(4)? as Pid;
    let utime = num(14)?;
    let stime = num(15)?;
    let nice = field(19)?
        .parse::<i32>()
        .map_err(|_| malformed(pid, "non-numeric nice"))?;
    let thread_count = num(20)? as u32;
    let vsize_kb = num(23)? / 1024;
    let rss_kb = num(24)? * PAGE_KB;

    Ok(PidStat {
        name,
        state,
        parent_pid,
        nice,
        thread_count,
        utime,
        stime,
        vsize_kb,
        rss_kb,
    })
}

/// Pull VmRSS from `/proc/<pid>/status`; preferred over the stat estimate
pub fn parse_status_rss(text: &str) -> Option<KiloBytes> {
    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest.split_whitespace().next()?.parse().ok();
        }
    }
    None
}

/// Join the NUL-separated cmdline into a displayable command
pub fn parse_cmdline(raw: &[u8]) -> String {
    let joined: Vec<String> = raw
        .split(|b| *b == 0)
        .filter(|part| !part.is_empty())
        .map(|part| String::from_utf8_lossy(part).into_owned())
        .collect();
    joined.join(" ")
}

/// Parse the aggregate `cpu ` line of the global stat file
pub fn parse_cpu_line(text: &str) -> Result<CpuTicks, ObserverError> {
    let line = text
        .lines()
        .find(|l| l.starts_with("cpu "))
        .ok_or_else(|| ObserverError::SourceMissing("global cpu line".into()))?;
    let fields: Vec<Ticks> = line
        .split_whitespace()
        .skip(1)
        .filter_map(|f| f.parse().ok())
        .collect();
    if fields.len() < 4 {
        return Err(ObserverError::SourceMissing("short cpu line".into()));
    }
    let get = |i: usize| fields.get(i).copied().unwrap_or(0);
    Ok(CpuTicks {
        user: get(0),
        nice: get(1),
        system: get(2),
        idle: get(3),
        iowait: get(4),
        irq: get(5),
        softirq: get(6),
        steal: get(7),
    })
}

/// Memory totals from meminfo
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemInfo {
    pub total_kb: KiloBytes,
    pub available_kb: KiloBytes,
    pub cached_kb: KiloBytes,
    pub buffered_kb: KiloBytes,
    pub swap_total_kb: KiloBytes,
    pub swap_free_kb: KiloBytes,
}

pub fn parse_meminfo(text: &str) -> MemInfo {
    let mut info = MemInfo::default();
    for line in text.lines() {
        let Some((key, rest)) = line.split_once(':') else {
            continue;
        };
        let value: KiloBytes = rest
            .split_whitespace()
            .next()
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        match key {
            "MemTotal" => info.total_kb = value,
            "MemAvailable" => info.available_kb = value,
            "Cached" => info.cached_kb = value,
            "Buffers" => info.buffered_kb = value,
            "SwapTotal" => info.swap_total_kb = value,
            "SwapFree" => info.swap_free_kb = value,
            _ => {}
        }
    }
    info
}

pub fn parse_loadavg(text: &str) -> LoadAvg {
    let mut fields = text.split_whitespace();
    let mut next = || fields.next().and_then(|f| f.parse().ok()).unwrap_or(0.0);
    LoadAvg {
        one: next(),
        five: next(),
        fifteen: next(),
    }
}

/// Count processors from cpuinfo; at least one
pub fn parse_core_count(text: &str) -> usize {
    text.lines()
        .filter(|l| l.starts_with("processor"))
        .count()
        .max(1)
}

fn malformed(pid: Pid, reason: &str) -> ObserverError {
    ObserverError::Malformed {
        pid,
        reason: reason.into(),
    }
}
