//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::ConfigError;

/// Default configuration file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "scene_switcher.toml";

/// Scene pair for one watched process: `(scene while running, scene while not running)`.
pub type SceneBinding = (String, String);

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address of the host's pipe endpoint
    #[serde(default = "default_pipe_name")]
    pub pipe_name: String,
    /// Seconds between process checks
    #[serde(default = "default_check_interval")]
    pub check_interval: f64,
    /// Consecutive connect failures tolerated before the long cooldown
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    /// Base reconnect delay in seconds, multiplied by the failure count
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: f64,
    /// Seconds to wait for a response line before the connection is dropped
    #[serde(default = "default_read_timeout")]
    pub read_timeout: f64,
    /// Executable name -> [scene while running, scene while not running]
    #[serde(default)]
    pub processes: BTreeMap<String, SceneBinding>,
}

impl Default for Config {
    fn default() -> Self {
        let mut processes = BTreeMap::new();
        processes.insert(
            "League of Legends.exe".to_string(),
            ("In game".to_string(), "Fuera de juego".to_string()),
        );
        Self {
            pipe_name: default_pipe_name(),
            check_interval: default_check_interval(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay: default_reconnect_delay(),
            read_timeout: default_read_timeout(),
            processes,
        }
    }
}

/// Platform default for the host pipe address.
pub fn default_pipe_name() -> String {
    if cfg!(windows) {
        r"\\.\pipe\slobs".to_string()
    } else {
        "/tmp/slobs.sock".to_string()
    }
}

fn default_check_interval() -> f64 {
    1.0
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_delay() -> f64 {
    2.0
}

fn default_read_timeout() -> f64 {
    5.0
}

impl Config {
    /// Poll interval between reconciliation cycles.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs_f64(self.check_interval)
    }

    /// Unit of the linear reconnect backoff.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs_f64(self.reconnect_delay)
    }

    /// Deadline for a single response line.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.read_timeout)
    }

    /// Check the invariants the loader relies on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipe_name.trim().is_empty() {
            return Err(invalid("pipe_name must not be empty"));
        }
        for (key, value) in [
            ("check_interval", self.check_interval),
            ("reconnect_delay", self.reconnect_delay),
            ("read_timeout", self.read_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid(format!("{key} must be a positive number, got {value}")));
            }
            if Duration::try_from_secs_f64(value).is_err() {
                return Err(invalid(format!("{key} is too large to be a duration, got {value}")));
            }
        }
        if self.reconnect_attempts == 0 {
            return Err(invalid("reconnect_attempts must be at least 1"));
        }
        for (process, (scene_on, scene_off)) in &self.processes {
            if process.trim().is_empty() {
                return Err(invalid("process names must not be empty"));
            }
            if scene_on.trim().is_empty() || scene_off.trim().is_empty() {
                return Err(invalid(format!("scene names for '{process}' must not be empty")));
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        message: message.into(),
    }
}
