/*!
 * Resource Groups
 * Writes pid memberships and limits into the host group filesystem
 */

use crate::control::types::GroupConfig;
use crate::core::errors::ControlError;
use crate::core::limits::GROUP_BASE_NAME;
use crate::core::types::Pid;
use log::{debug, info};
use std::path::{Path, PathBuf};

/// Manages group directories under a stable base path
pub struct GroupManager {
    base: PathBuf,
}

impl GroupManager {
    /// Default host location for the CPU controller hierarchy
    pub fn new() -> Self {
        Self::with_base(Path::new("/sys/fs/cgroup/cpu").join(GROUP_BASE_NAME))
    }

    /// Build against an alternate base; used by tests
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Create-or-update the group and move the pid into it
    pub fn assign(&self, pid: Pid, config: &GroupConfig) -> Result<(), ControlError> {
        let dir = self.base.join(&config.name);
        std::fs::create_dir_all(&dir).map_err(|e| group_err(&dir, e))?;

        write_value(&dir.join("cpu.shares"), config.cpu_shares)?;
        if config.memory_limit_kb > 0 {
            write_value(
                &dir.join("memory.limit_in_bytes"),
                config.memory_limit_kb * 1024,
            )?;
        }
        write_value(&dir.join("tasks"), pid)?;

        info!(
            "pid {} assigned to group '{}' (shares {}, mem {} kB)",
            pid, config.name, config.cpu_shares, config.memory_limit_kb
        );
        Ok(())
    }

    /// Remove a group directory; pids fall back to the parent group
    pub fn remove(&self, name: &str) -> Result<(), ControlError> {
        let dir = self.base.join(name);
        match std::fs::remove_dir(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("group '{}' already gone", name);
                Ok(())
            }
            Err(e) => Err(group_err(&dir, e)),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }
}

impl Default for GroupManager {
    fn default() -> Self {
        Self::new()
    }
}

fn write_value(path: &Path, value: impl std::fmt::Display) -> Result<(), ControlError> {
    std::fs::write(path, value.to_string()).map_err(|e| group_err(path, e))
}

fn group_err(path: &Path, err: std::io::Error) -> ControlError {
    ControlError::GroupWrite(format!("{}: {}", path.display(), err))
}
