/*!
 * Configuration
 * Line-oriented `key = value` settings with clamp-or-default handling
 */

use crate::core::errors::ConfigError;
use crate::core::limits;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Scheduling algorithm names accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmName {
    Priority,
    RoundRobin,
    Multilevel,
    Fair,
}

impl FromStr for AlgorithmName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "priority" => Ok(Self::Priority),
            "round_robin" => Ok(Self::RoundRobin),
            "multilevel" => Ok(Self::Multilevel),
            "fair" => Ok(Self::Fair),
            other => Err(ConfigError::InvalidValue {
                key: "default_scheduling_algorithm".into(),
                value: other.into(),
            }),
        }
    }
}

/// Mode names accepted in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeName {
    Gaming,
    Productivity,
    PowerSaving,
    Balanced,
}

impl FromStr for ModeName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gaming" => Ok(Self::Gaming),
            "productivity" => Ok(Self::Productivity),
            "power_saving" => Ok(Self::PowerSaving),
            "balanced" => Ok(Self::Balanced),
            other => Err(ConfigError::InvalidValue {
                key: "default_mode".into(),
                value: other.into(),
            }),
        }
    }
}

/// Log levels handed to the external sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warn",
            Self::Error => "error",
            Self::Critical => "error",
        }
    }
}

/// Runtime settings assembled from defaults and an optional config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub monitoring_interval: Duration,
    pub default_scheduling_algorithm: AlgorithmName,
    pub default_time_slice: Duration,
    pub memory_threshold_percent: f64,
    pub cpu_threshold_percent: f64,
    pub enable_auto_optimization: bool,
    pub enable_auto_mode: bool,
    pub default_mode: ModeName,
    pub log_level: LogLevel,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            monitoring_interval: limits::DEFAULT_POLL_INTERVAL,
            default_scheduling_algorithm: AlgorithmName::Priority,
            default_time_slice: limits::DEFAULT_TICK_INTERVAL,
            memory_threshold_percent: limits::DEFAULT_LOW_PRESSURE_PCT,
            cpu_threshold_percent: limits::DEFAULT_CPU_ALERT_PCT,
            enable_auto_optimization: true,
            enable_auto_mode: false,
            default_mode: ModeName::Balanced,
            log_level: LogLevel::Info,
        }
    }
}

impl Settings {
    /// Read settings from a `key = value` file
    ///
    /// Lines beginning with `#` are comments; values may be double-quoted.
    /// Unknown keys are warned about and ignored; out-of-range values are
    /// clamped or fall back to defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Unreadable(format!("{}: {}", path.display(), e)))?;
        Ok(Self::parse(&text))
    }

    /// Parse settings from text, falling back per key on bad values
    pub fn parse(text: &str) -> Self {
        let mut settings = Self::default();
        for (key, value) in iter_pairs(text) {
            settings.apply(&key, &value);
        }
        settings
    }

    fn apply(&mut self, key: &str, value: &str) {
        match key {
            "monitoring_interval_ms" => match value.parse::<u64>() {
                Ok(ms) => self.monitoring_interval = Duration::from_millis(ms.max(10)),
                Err(_) => warn!("config: bad monitoring_interval_ms '{}', keeping default", value),
            },
            "default_scheduling_algorithm" => match value.parse() {
                Ok(alg) => self.default_scheduling_algorithm = alg,
                Err(_) => warn!("config: unknown algorithm '{}', keeping default", value),
            },
            "default_time_slice_ms" => match value.parse::<u64>() {
                Ok(ms) => {
                    let slice = Duration::from_millis(ms)
                        .clamp(limits::MIN_TIME_SLICE, limits::MAX_TIME_SLICE);
                    self.default_time_slice = slice;
                }
                Err(_) => warn!("config: bad default_time_slice_ms '{}', keeping default", value),
            },
            "memory_threshold_percent" => match value.parse::<f64>() {
                Ok(pct) => self.memory_threshold_percent = pct.clamp(0.0, 100.0),
                Err(_) => warn!("config: bad memory_threshold_percent '{}', keeping default", value),
            },
            "cpu_threshold_percent" => match value.parse::<f64>() {
                Ok(pct) => self.cpu_threshold_percent = pct.clamp(0.0, 100.0),
                Err(_) => warn!("config: bad cpu_threshold_percent '{}', keeping default", value),
            },
            "enable_auto_optimization" => match parse_bool(value) {
                Some(v) => self.enable_auto_optimization = v,
                None => warn!("config: bad enable_auto_optimization '{}', keeping default", value),
            },
            "enable_auto_mode" => match parse_bool(value) {
                Some(v) => self.enable_auto_mode = v,
                None => warn!("config: bad enable_auto_mode '{}', keeping default", value),
            },
            "default_mode" => match value.parse() {
                Ok(mode) => self.default_mode = mode,
                Err(_) => warn!("config: unknown mode '{}', keeping default", value),
            },
            "log_level" => match value {
                "debug" => self.log_level = LogLevel::Debug,
                "info" => self.log_level = LogLevel::Info,
                "warning" => self.log_level = LogLevel::Warning,
                "error" => self.log_level = LogLevel::Error,
                "critical" => self.log_level = LogLevel::Critical,
                other => warn!("config: unknown log_level '{}', keeping default", other),
            },
            other => warn!("config: unknown key '{}'", other),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Iterate `key = value` pairs, skipping comments and blank lines
fn iter_pairs(text: &str) -> impl Iterator<Item = (String, String)> + '_ {
    text.lines().filter_map(|line| {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }
        let (key, value) = line.split_once('=')?;
        let key = key.trim().to_string();
        let value = value.trim().trim_matches('"').to_string();
        Some((key, value))
    })
}

/// Parse a JSON-shaped map of per-mode overrides into raw patch values
///
/// The mode manager interprets each patch against its compiled-in defaults.
pub fn parse_mode_profiles(text: &str) -> Result<HashMap<String, serde_json::Value>, ConfigError> {
    serde_json::from_str(text).map_err(|e| ConfigError::InvalidValue {
        key: "mode_profiles".into(),
        value: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults_on_empty() {
        let s = Settings::parse("");
        assert_eq!(s.default_mode, ModeName::Balanced);
        assert_eq!(s.monitoring_interval, limits::DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn test_parse_full_file() {
        let text = r#"
# scheduler tuning
monitoring_interval_ms = 500
default_scheduling_algorithm = fair
default_time_slice_ms = "100"
memory_threshold_percent = 75.5
cpu_threshold_percent = 85
enable_auto_optimization = false
enable_auto_mode = yes
default_mode = gaming
log_level = debug
"#;
        let s = Settings::parse(text);
        assert_eq!(s.monitoring_interval, Duration::from_millis(500));
        assert_eq!(s.default_scheduling_algorithm, AlgorithmName::Fair);
        assert_eq!(s.default_time_slice, Duration::from_millis(100));
        assert_eq!(s.memory_threshold_percent, 75.5);
        assert_eq!(s.cpu_threshold_percent, 85.0);
        assert!(!s.enable_auto_optimization);
        assert!(s.enable_auto_mode);
        assert_eq!(s.default_mode, ModeName::Gaming);
        assert_eq!(s.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let text = "default_time_slice_ms = soon\ndefault_mode = turbo\nunknown_key = 1";
        let s = Settings::parse(text);
        assert_eq!(s.default_time_slice, limits::DEFAULT_TICK_INTERVAL);
        assert_eq!(s.default_mode, ModeName::Balanced);
    }

    #[test]
    fn test_slice_clamped_to_bounds() {
        let s = Settings::parse("default_time_slice_ms = 5000");
        assert_eq!(s.default_time_slice, limits::MAX_TIME_SLICE);
        let s = Settings::parse("default_time_slice_ms = 1");
        assert_eq!(s.default_time_slice, limits::MIN_TIME_SLICE);
    }

    #[test]
    fn test_mode_profiles_json() {
        let profiles = parse_mode_profiles(r#"{"gaming": {"time_slice_ms": 25}}"#).unwrap();
        assert!(profiles.contains_key("gaming"));
        assert!(parse_mode_profiles("not json").is_err());
    }
}
