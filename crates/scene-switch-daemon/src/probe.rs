//! Process presence probe

use std::ffi::OsStr;
use sysinfo::System;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("process enumeration is not supported on this platform")]
    Unsupported,

    #[error("failed to enumerate processes: {message}")]
    Enumeration { message: String },
}

/// Answers "is a process with this name running?"
pub trait ProcessProbe: Send {
    /// Take a fresh snapshot of the process table. Called once per cycle
    /// before any [`ProcessProbe::is_running`] query.
    fn refresh(&mut self) -> Result<(), ProbeError> {
        Ok(())
    }

    /// Whether a process named `name` is running, compared case-insensitively.
    fn is_running(&mut self, name: &str) -> Result<bool, ProbeError>;
}

/// [`ProcessProbe`] backed by the OS process table.
pub struct SysinfoProbe {
    system: System,
}

impl SysinfoProbe {
    pub fn new() -> Self {
        Self {
            system: System::new(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for SysinfoProbe {
    fn refresh(&mut self) -> Result<(), ProbeError> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(ProbeError::Unsupported);
        }
        self.system.refresh_all();
        // Our own process is always listed, so an empty table means the
        // snapshot could not be read.
        if self.system.processes().is_empty() {
            return Err(ProbeError::Enumeration {
                message: "process table snapshot is empty".to_string(),
            });
        }
        Ok(())
    }

    fn is_running(&mut self, name: &str) -> Result<bool, ProbeError> {
        let wanted = name.to_lowercase();
        Ok(self
            .system
            .processes()
            .values()
            .any(|process| name_matches(process.name(), &wanted)))
    }
}

/// Case-insensitive comparison of an OS process name with a lowercased name.
fn name_matches(process_name: &OsStr, wanted_lower: &str) -> bool {
    process_name.to_string_lossy().to_lowercase() == wanted_lower
}
