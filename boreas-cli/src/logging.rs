//! Per-role logging initialization.
//!
//! Every role writes to its own log file under the location's log layout
//! directory, alongside human-readable console output. The returned
//! `WorkerGuard` must stay alive for the life of the process or buffered
//! log lines are lost.

use anyhow::{Context, Result};
use boreas_core::{Layout, Location};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes tracing for the given role.
///
/// The filter comes from `RUST_LOG` when set, else `debug`/`info`
/// depending on `verbose`. File output lands in the location's log
/// layout directory as `<name>.log`, rotated daily.
///
/// # Errors
///
/// Fails when the log directory cannot be created.
pub fn init(location: &Location, verbose: bool) -> Result<WorkerGuard> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let log_dir = location
        .locator
        .layout_dir(location, Layout::Log)
        .with_context(|| format!("creating log directory for role '{location}'"))?;
    let appender = tracing_appender::rolling::daily(log_dir, format!("{}.log", location.name));
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}
