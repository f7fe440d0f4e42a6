//! Tracing Utilities Module
//!
//! Logging setup shared by `dcsctl` and `dcsd`: a console layer plus an
//! optional non-blocking file layer.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::utils::error::Result;

/// Keeps the file writer flushing for the lifetime of the process
static WORKER_GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Initializes the tracing subscriber with console and optional file output
///
/// Subsequent calls are no-ops. `RUST_LOG` overrides `default_level`.
///
/// # Arguments
/// * `log_path` - Log file to append to, or `None` for console only
/// * `default_level` - Filter directive used when `RUST_LOG` is not set
///
/// # Returns
/// * `Result<()>` - Ok when logging is active, or an error if the log file cannot be opened
pub fn setup_tracing(log_path: Option<&Path>, default_level: &str) -> Result<()> {
    if WORKER_GUARD.get().is_some() {
        return Ok(());
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Console goes to stderr so command output on stdout stays parseable
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_filter(env_filter.clone());

    let (file_layer, guard) = match log_path {
        Some(path) => {
            let file = OpenOptions::new().append(true).create(true).open(path)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(env_filter);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    // Another subscriber may already be installed (tests, embedding process)
    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    let _ = WORKER_GUARD.set(guard);
    Ok(())
}
