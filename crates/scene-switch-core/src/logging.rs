//! Shared logging initialization for scene-switch binaries.
//!
//! Events go to the console at the level picked by `SCENE_SWITCH_LOG` (or
//! `--verbose`), and to a daily rolling file under `logs/` at `DEBUG` or
//! finer so the periodic resource reports are always recorded.

use std::path::Path;
use std::sync::OnceLock;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, fmt};

static INIT: OnceLock<()> = OnceLock::new();

/// Environment variable read by [`init`] to pick the console log level.
pub const LOG_ENV: &str = "SCENE_SWITCH_LOG";

/// Directory for log files, resolved against the working directory.
pub const LOG_DIR: &str = "logs";

/// Log files are named `scene_switcher.YYYY-MM-DD.log`.
pub const LOG_FILE_PREFIX: &str = "scene_switcher";

/// Rotated files kept on disk; older ones are pruned.
pub const MAX_LOG_FILES: usize = 10;

fn parse_level(raw: Option<&str>) -> Level {
    match raw.unwrap_or("info").to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" | "critical" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// The file always records at least `DEBUG`.
fn file_level(console: Level) -> Level {
    std::cmp::max(console, Level::DEBUG)
}

/// Daily rolling appender writing into `dir`.
pub fn file_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
}

/// Initialize process-level tracing output.
///
/// The console level comes from `SCENE_SWITCH_LOG`; `verbose` forces
/// `DEBUG`. When `log_dir` is given, a rolling file layer is added there.
/// Keep the returned guard alive for the life of the process so buffered
/// file output is flushed on exit.
///
/// Safe to call multiple times; only the first call installs the subscriber
/// and later calls return `None`. Never fails: if the log file cannot be
/// opened, logging continues on the console only.
pub fn init(verbose: bool, log_dir: Option<&Path>) -> Option<WorkerGuard> {
    if INIT.get().is_some() {
        return None;
    }
    let level = if verbose {
        Level::DEBUG
    } else {
        parse_level(std::env::var(LOG_ENV).ok().as_deref())
    };

    let console = fmt::layer()
        .with_target(false)
        .with_filter(LevelFilter::from_level(level));

    let mut file_error = None;
    let (file, guard) = match log_dir.map(file_appender) {
        Some(Ok(appender)) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::from_level(file_level(level)));
            (Some(layer), Some(guard))
        }
        Some(Err(e)) => {
            file_error = Some(e);
            (None, None)
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init();
    let _ = INIT.set(());

    if let Some(e) = file_error {
        tracing::warn!("File logging disabled: {e}");
    }
    guard
}
