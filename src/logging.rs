use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "pomonotes.log";
const DEBUG_ENV: &str = "POMONOTES_DEBUG_LOG";

/// Installs the global subscriber writing to `dir/pomonotes.log`.
/// Keep the guard alive until exit or buffered lines are lost.
pub fn init_logging(dir: &Path) -> anyhow::Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(std::env::var(DEBUG_ENV).ok().as_deref()))
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to install log subscriber: {err}"))?;

    Ok(guard)
}

/// `POMONOTES_DEBUG_LOG=1` wins over `RUST_LOG`; otherwise `RUST_LOG`, then `info`.
fn env_filter(debug_flag: Option<&str>) -> EnvFilter {
    if matches!(debug_flag, Some("1") | Some("true")) {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
