use std::path::Path;

use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::time::ChronoLocal, prelude::*, EnvFilter};

use crate::errors::{AppResult, SwitcherError};

pub const LOG_FILE_PREFIX: &str = "fullscreen-audio-switcher.log";

/// Sends this crate's logs to a daily-rotated file in `log_dir`.
///
/// `RUST_LOG` overrides `level` when set. Keep the returned guard alive, dropping it
/// flushes and stops the writer. Fails if the host already installed a global subscriber.
pub fn initialize_logging(log_dir: &Path, level: LevelFilter) -> AppResult<WorkerGuard> {
    fs_err::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_timer(ChronoLocal::new(String::from("%Y-%m-%d %H:%M:%S%.3f")))
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| SwitcherError::Logging(e.to_string()))?;

    Ok(guard)
}
