//! Tracing setup: compact console output on stderr plus a daily log file.
//!
//! `RUST_LOG`, when set, takes precedence over the configured level.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::{RlError, RlResult};

const LOG_FILE_PREFIX: &str = "ridelink.log";

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// `level` is a filter directive such as `"info"` or
/// `"rl_socket=debug,info"`. With `json_output` the file gets one JSON
/// object per event; the console stays human-readable either way.
pub fn init_logging(level: &str, log_dir: &Path, json_output: bool) -> RlResult<LogGuard> {
    std::fs::create_dir_all(log_dir)?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX));

    let file_layer = if json_output {
        fmt::layer()
            .with_writer(writer)
            .json()
            .with_file(true)
            .with_line_number(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(file_layer)
        .try_init()
        .map_err(|e| RlError::Config(format!("logging already initialized: {e}")))?;

    tracing::info!("logging to {} at {level}", log_dir.display());
    Ok(LogGuard { _worker: guard })
}

/// Keeps the background file writer alive; dropping it flushes the log.
pub struct LogGuard {
    _worker: WorkerGuard,
}

/// Console-only subscriber for tests and throwaway tools. Later calls are no-ops.
pub fn init_console_logging(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_does_not_panic() {
        init_console_logging("debug");
        init_console_logging("trace");
    }

    #[test]
    fn test_bad_directive_falls_back() {
        // only checks that construction never panics
        let _ = filter("not a [valid directive");
    }
}
