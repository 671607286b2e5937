/*!
 * Error Types
 * Centralized error handling with thiserror and serde support
 */

use crate::core::types::{Nice, Pid};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Observer errors: transient ones are skipped per pid, fatal ones stop the worker
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ObserverError {
    #[error("process state source missing: {0}")]
    SourceMissing(String),

    #[error("malformed record for pid {pid}: {reason}")]
    Malformed { pid: Pid, reason: String },
}

/// Process control errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ControlError {
    #[error("pid {0} is protected and cannot be modified")]
    Protected(Pid),

    #[error("pid {0} not found")]
    NotFound(Pid),

    #[error("permission denied for pid {0}")]
    PermissionDenied(Pid),

    #[error("pid {0} survived termination")]
    StillAlive(Pid),

    #[error("host call failed for pid {pid}: {reason}")]
    HostCall { pid: Pid, reason: String },

    #[error("resource group write refused: {0}")]
    GroupWrite(String),
}

/// Memory controller errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum MemoryError {
    #[error("control sink unavailable: {0}")]
    SinkUnavailable(String),

    #[error("insufficient privileges for {0}")]
    Privileges(String),
}

/// Scheduler errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SchedulerError {
    #[error("pid {0} not in scheduled table")]
    ProcessNotFound(Pid),

    #[error("unknown scheduling algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("priority application failed for pid {pid} (nice {nice}): {reason}")]
    ApplyFailed { pid: Pid, nice: Nice, reason: String },
}

/// Mode manager errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ModeError {
    #[error("mode {0} is already active")]
    AlreadyActive(String),

    #[error("another mode switch is in flight")]
    SwitchInFlight,

    #[error("unknown mode: {0}")]
    UnknownMode(String),

    #[error("hardware control failed: {0}")]
    Hardware(String),

    #[error("apply failed, state restored: {0}")]
    ApplyFailed(String),

    #[error("restore failed: {0}")]
    RestoreFailed(String),
}

/// Configuration errors; most bad values are clamped instead of raised
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum ConfigError {
    #[error("cannot read configuration: {0}")]
    Unreadable(String),

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Unified error type across subsystems
#[derive(Error, Debug)]
pub enum SchedError {
    #[error("observer error: {0}")]
    Observer(#[from] ObserverError),

    #[error("control error: {0}")]
    Control(#[from] ControlError),

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("mode error: {0}")]
    Mode(#[from] ModeError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SchedError {
    fn from(err: std::io::Error) -> Self {
        SchedError::Io(err.to_string())
    }
}

/// Common result type
pub type SchedResult<T> = Result<T, SchedError>;
