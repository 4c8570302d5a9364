//! scene-switch daemon
//!
//! Watches for configured processes and keeps the streaming host's active
//! scene in line with them.

pub mod controller;
pub mod probe;
pub mod resources;

pub use controller::{ProcessStatus, SceneSwitcher, SwitcherStatus, WatchedProcess};
pub use probe::{ProbeError, ProcessProbe, SysinfoProbe};
pub use resources::{ResourceMonitor, ResourceSample};
