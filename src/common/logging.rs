//! Logging and tracing configuration
//!
//! Console logging for interactive runs, with an optional file layer so that
//! long unattended runs keep a full record of attempts and failures.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::paths;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scenario_runner=info,warn"))
}

/// Initialize tracing for the CLI (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing to stderr plus an append-only log file
///
/// The returned guard must be held until exit so buffered lines are flushed.
/// Falls back to [`init_cli`] when the file can't be opened.
pub fn init_with_file(path: &Path) -> Option<WorkerGuard> {
    if let Some(dir) = path.parent() {
        if let Err(e) = paths::ensure_dir(dir) {
            eprintln!("Warning: Could not create log directory: {}", e);
        }
    }

    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);

            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true);

            let stderr_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .compact();

            tracing_subscriber::registry()
                .with(env_filter())
                .with(file_layer)
                .with(stderr_layer)
                .init();

            Some(guard)
        }
        Err(e) => {
            eprintln!("Warning: Could not open log file: {}", e);
            init_cli();
            None
        }
    }
}
