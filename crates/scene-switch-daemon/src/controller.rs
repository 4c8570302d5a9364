//! Scene switch controller
//!
//! A reconciliation loop: every cycle the desired state (is the process
//! running?) is compared with the observed state (the per-process flag) and a
//! scene switch is issued when they differ. The flag only changes after the
//! host confirms the switch, so a failed switch is simply tried again on the
//! next cycle for as long as the condition holds.

use crate::probe::ProcessProbe;
use crate::resources::ResourceMonitor;
use scene_switch_core::client::SceneClient;
use scene_switch_core::config::Config;
use scene_switch_core::transport::Connector;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spacing of the periodic status summary.
pub const STATUS_INTERVAL: Duration = Duration::from_secs(300);

/// One configured process and the controller's belief about its scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedProcess {
    /// Executable name as reported by the OS
    pub name: String,
    /// Scene to show while the process runs
    pub scene_on: String,
    /// Scene to show once it is gone
    pub scene_off: String,
    /// `true` once `scene_on` has been confirmed active
    pub active: bool,
}

/// Snapshot used for the periodic status summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwitcherStatus {
    pub connected: bool,
    pub processes: Vec<ProcessStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessStatus {
    pub name: String,
    pub active: bool,
}

impl fmt::Display for SwitcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let processes: Vec<String> = self
            .processes
            .iter()
            .map(|p| format!("{}:{}", p.name, if p.active { "ACTIVE" } else { "INACTIVE" }))
            .collect();
        write!(
            f,
            "host connection {}; processes: {}",
            if self.connected { "UP" } else { "DOWN" },
            processes.join(", ")
        )
    }
}

/// Drives scene switches from process presence.
pub struct SceneSwitcher<C: Connector, P: ProcessProbe> {
    client: SceneClient<C>,
    probe: P,
    processes: Vec<WatchedProcess>,
    check_interval: Duration,
    status_interval: Duration,
    resources: Option<ResourceMonitor>,
}

impl<C: Connector, P: ProcessProbe> SceneSwitcher<C, P> {
    /// Build a switcher for every process in `config`, all flags cleared.
    pub fn new(config: &Config, client: SceneClient<C>, probe: P) -> Self {
        let processes = config
            .processes
            .iter()
            .map(|(name, (scene_on, scene_off))| WatchedProcess {
                name: name.clone(),
                scene_on: scene_on.clone(),
                scene_off: scene_off.clone(),
                active: false,
            })
            .collect();
        Self {
            client,
            probe,
            processes,
            check_interval: config.check_interval(),
            status_interval: STATUS_INTERVAL,
            resources: None,
        }
    }

    /// Sample resource usage at the start of every cycle.
    pub fn with_resource_monitor(mut self, monitor: ResourceMonitor) -> Self {
        self.resources = Some(monitor);
        self
    }

    pub fn client(&self) -> &SceneClient<C> {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut SceneClient<C> {
        &mut self.client
    }

    pub fn processes(&self) -> &[WatchedProcess] {
        &self.processes
    }

    /// Flag for `name`, or `None` if it is not configured.
    pub fn is_active(&self, name: &str) -> Option<bool> {
        self.processes
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.active)
    }

    pub fn status(&self) -> SwitcherStatus {
        SwitcherStatus {
            connected: self.client.is_connected(),
            processes: self
                .processes
                .iter()
                .map(|p| ProcessStatus {
                    name: p.name.clone(),
                    active: p.active,
                })
                .collect(),
        }
    }

    pub fn log_status(&self) {
        info!("Status: monitoring, {}", self.status());
    }

    /// Run one reconciliation pass over every configured process.
    ///
    /// A process that cannot be probed counts as not running for this pass.
    pub async fn reconcile(&mut self) {
        let snapshot_ok = match self.probe.refresh() {
            Ok(()) => true,
            Err(e) => {
                error!("Error enumerating processes: {e}");
                false
            }
        };

        for process in self.processes.iter_mut() {
            let running = snapshot_ok
                && match self.probe.is_running(&process.name) {
                    Ok(running) => running,
                    Err(e) => {
                        error!("Error checking process {}: {e}", process.name);
                        false
                    }
                };

            if running && !process.active {
                info!("{} detected. Switching to '{}'...", process.name, process.scene_on);
                if self.client.activate_scene(&process.scene_on).await {
                    process.active = true;
                }
            } else if !running && process.active {
                info!("{} closed. Switching to '{}'...", process.name, process.scene_off);
                if self.client.activate_scene(&process.scene_off).await {
                    process.active = false;
                }
            }
        }
    }

    /// Run until `cancel` fires.
    ///
    /// Each cycle samples resources, logs a status summary every
    /// [`STATUS_INTERVAL`], reconciles, then sleeps for the check interval.
    /// Cancellation is observed between cycles and during the sleep. The host
    /// connection is closed before returning.
    pub async fn run(&mut self, cancel: CancellationToken) {
        info!("Monitoring processes. Press Ctrl+C to exit.");
        let mut last_status = Instant::now();

        while !cancel.is_cancelled() {
            if let Some(monitor) = self.resources.as_mut() {
                monitor.check();
            }

            if last_status.elapsed() >= self.status_interval {
                self.log_status();
                last_status = Instant::now();
            }

            self.reconcile().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = sleep(self.check_interval) => {}
            }
        }

        info!("Shutdown requested");
        self.client.close().await;
        info!("Monitoring finished");
    }
}
