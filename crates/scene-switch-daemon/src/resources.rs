//! Periodic self-diagnostics: memory and CPU used by this process.

use std::time::Duration;
use sysinfo::{Pid, System};
use tokio::time::Instant;
use tracing::{debug, error, warn};

/// Default spacing between samples.
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(60);

/// Resident memory above which a warning is logged.
pub const MEMORY_WARN_MB: f64 = 200.0;

/// Process CPU usage above which a warning is logged.
pub const CPU_WARN_PERCENT: f32 = 10.0;

/// One resource reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResourceSample {
    /// Resident set size of this process
    pub rss_bytes: u64,
    /// CPU usage of this process since the previous sample
    pub cpu_percent: f32,
    /// Share of system memory in use
    pub system_memory_percent: f64,
}

impl ResourceSample {
    pub fn memory_mb(&self) -> f64 {
        self.rss_bytes as f64 / (1024.0 * 1024.0)
    }

    pub fn high_memory(&self) -> bool {
        self.memory_mb() > MEMORY_WARN_MB
    }

    pub fn high_cpu(&self) -> bool {
        self.cpu_percent > CPU_WARN_PERCENT
    }
}

/// Samples this process's resource usage at most once per interval.
pub struct ResourceMonitor {
    system: System,
    pid: Option<Pid>,
    interval: Duration,
    last_check: Instant,
}

impl ResourceMonitor {
    pub fn new() -> Self {
        Self::with_interval(DEFAULT_SAMPLE_INTERVAL)
    }

    pub fn with_interval(interval: Duration) -> Self {
        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                error!("Cannot determine own pid for resource monitoring: {e}");
                None
            }
        };
        Self {
            system: System::new(),
            pid,
            interval,
            last_check: Instant::now(),
        }
    }

    /// Log a sample if the interval has elapsed since the last one.
    ///
    /// Failures are logged and never propagated.
    pub fn check(&mut self) {
        if self.last_check.elapsed() < self.interval {
            return;
        }
        self.last_check = Instant::now();

        match self.sample() {
            Some(sample) => report(&sample),
            None => error!("Error monitoring resources: own process not found"),
        }
    }

    /// Take a reading now.
    pub fn sample(&mut self) -> Option<ResourceSample> {
        let pid = self.pid?;
        self.system.refresh_all();
        let process = self.system.process(pid)?;
        let total = self.system.total_memory();
        let system_memory_percent = if total == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 * 100.0 / total as f64
        };
        Some(ResourceSample {
            rss_bytes: process.memory(),
            cpu_percent: process.cpu_usage(),
            system_memory_percent,
        })
    }
}

impl Default for ResourceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn report(sample: &ResourceSample) {
    debug!(
        "Resources - memory: {:.2} MB ({} bytes), CPU: {:.1}%, system: {:.1}% used",
        sample.memory_mb(),
        sample.rss_bytes,
        sample.cpu_percent,
        sample.system_memory_percent
    );
    if sample.high_memory() {
        warn!("High memory usage: {:.2} MB", sample.memory_mb());
    }
    if sample.high_cpu() {
        warn!("High CPU usage: {:.1}%", sample.cpu_percent);
    }
}
