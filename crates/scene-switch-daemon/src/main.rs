//! scene-switch - switch streaming scenes when watched processes start or stop

use anyhow::{Context, Result};
use clap::Parser;
use scene_switch_core::client::SceneClient;
use scene_switch_core::config::{self, Config, DEFAULT_CONFIG_FILE};
use scene_switch_core::logging;
use scene_switch_core::transport::NamedPipeConnector;
use scene_switch_daemon::{ResourceMonitor, SceneSwitcher, SysinfoProbe};
use std::any::Any;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// scene-switch - switch streaming scenes when watched processes start or stop
#[derive(Parser, Debug)]
#[command(name = "scene-switch")]
#[command(about = "Switch streaming scenes when watched processes start or stop")]
#[command(version)]
struct Args {
    /// Path to configuration file (created with defaults if missing)
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate the configuration file and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.check {
        let _log_guard = logging::init(args.verbose, None);
        let config = check_config(&args.config)?;
        info!(
            "Configuration OK: {} process(es), pipe {}",
            config.processes.len(),
            config.pipe_name
        );
        return Ok(());
    }

    let _log_guard = logging::init(args.verbose, Some(Path::new(logging::LOG_DIR)));

    info!("=== Scene switcher starting ===");

    let config = config::load_or_create(&args.config);
    if config.processes.is_empty() {
        warn!(
            "No processes configured to monitor. Edit {}",
            args.config.display()
        );
        return Ok(());
    }

    let client = SceneClient::from_config(NamedPipeConnector::from_config(&config), &config);
    let mut switcher = SceneSwitcher::new(&config, client, SysinfoProbe::new())
        .with_resource_monitor(ResourceMonitor::new());

    if !switcher.client_mut().ensure_connected().await {
        warn!("Could not connect to the streaming host at startup. Make sure it is running.");
    }

    let cancel_token = CancellationToken::new();
    spawn_signal_handler(cancel_token.clone());

    let monitor = tokio::spawn(async move {
        switcher.run(cancel_token).await;
    });
    match monitor.await {
        Ok(()) => {}
        Err(e) if e.is_panic() => {
            let payload = e.into_panic();
            error!(
                "Monitoring loop panicked: {}. The pipe connection was dropped without a close.",
                panic_message(payload.as_ref())
            );
        }
        Err(e) => error!("Monitoring loop stopped unexpectedly: {e:?}"),
    }

    info!("=== Scene switcher stopped ===");
    Ok(())
}

/// Load and validate the config file without creating or falling back.
fn check_config(path: &Path) -> Result<Config> {
    config::load_config_file(path)
        .with_context(|| format!("Invalid configuration at {}", path.display()))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "non-string panic payload"
    }
}

/// Cancel `cancel` on Ctrl+C, or SIGTERM on Unix.
fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => {
                            info!("Shutdown requested by user (Ctrl+C)");
                        }
                        _ = sigterm.recv() => {
                            info!("Received SIGTERM");
                        }
                    }
                }
                Err(e) => {
                    warn!("Failed to install SIGTERM handler: {e}");
                    if let Err(e) = ctrl_c.await {
                        warn!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    info!("Shutdown requested by user (Ctrl+C)");
                }
            }
        }

        #[cfg(not(unix))]
        {
            if let Err(e) = ctrl_c.await {
                warn!("Failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Shutdown requested by user (Ctrl+C)");
        }

        cancel.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_args_check_flag() {
        let args = Args::try_parse_from(["scene-switch", "--check", "--config", "other.toml"]).unwrap();
        assert!(args.check);
        assert_eq!(args.config, PathBuf::from("other.toml"));

        let args = Args::try_parse_from(["scene-switch"]).unwrap();
        assert!(!args.check);
        assert_eq!(args.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn test_check_config_accepts_valid_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scene_switcher.toml");
        std::fs::write(&path, "[processes]\n\"Game.exe\" = [\"In game\", \"Menu\"]\n").unwrap();

        let config = check_config(&path).unwrap();
        assert_eq!(config.processes.len(), 1);
    }

    #[test]
    fn test_check_config_does_not_create_or_fall_back() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("missing.toml");
        assert!(check_config(&missing).is_err());
        assert!(!missing.exists());

        let invalid = temp.path().join("invalid.toml");
        std::fs::write(&invalid, "check_interval = 0").unwrap();
        let err = check_config(&invalid).unwrap_err();
        assert!(format!("{err:#}").contains("check_interval"));
    }

    #[test]
    fn test_panic_message_reads_string_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("lost pipe"));
        assert_eq!(panic_message(payload.as_ref()), "lost pipe");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
