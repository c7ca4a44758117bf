//! Tracing configuration and log routing.
//!
//! Pipeline progress goes to stdout through a compact formatter. A second layer appends the
//! same events to a file so long-running batch jobs leave an auditable trail: the target is
//! `TENDERBRIEF_LOG_FILE` when set, `logs/tenderbrief.log` otherwise. File writes go through
//! a non-blocking worker so provider round-trips are never stalled by disk I/O.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Keeps the non-blocking worker alive until process exit; dropping it loses buffered lines.
static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the stdout and file tracing layers.
///
/// Filtering honors `RUST_LOG` and falls back to `info`. When no log file can be opened the
/// pipeline still runs with stdout logging alone.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry().with(filter).with(stdout_layer);

    match file_writer() {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

fn file_writer() -> Option<NonBlocking> {
    let (writer, guard) = match std::env::var("TENDERBRIEF_LOG_FILE") {
        Ok(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {path}: {err}"))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        Err(_) => {
            std::fs::create_dir_all("logs")
                .map_err(|err| eprintln!("Failed to create logs directory: {err}"))
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                "logs",
                "tenderbrief.log",
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(writer)
}
