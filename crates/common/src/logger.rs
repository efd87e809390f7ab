use crate::error::VecSearchError;
use std::path::Path;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Log file written inside the configured log directory
pub const LOG_FILE_NAME: &str = "vecsearch.log";

/// Initialize logging system
///
/// Console output is always enabled. When `log_dir` is given, the same events
/// are appended to `vecsearch.log` in that directory, without ANSI colors.
/// `RUST_LOG` takes precedence over `log_level`.
pub fn setup_logging(log_dir: Option<&Path>, log_level: &str) -> Result<(), VecSearchError> {
    let file_layer = match log_dir {
        Some(dir) => {
            let log_file_path = dir.join(LOG_FILE_NAME);
            std::fs::create_dir_all(dir).map_err(|e| {
                VecSearchError::config(format!(
                    "Failed to create log directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            let log_file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file_path)
                .map_err(|e| {
                    VecSearchError::config(format!(
                        "Failed to open log file {}: {}",
                        log_file_path.display(),
                        e
                    ))
                })?;

            Some(
                fmt::layer()
                    .with_writer(log_file)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_ansi(false)
                    .with_filter(build_filter(log_level)),
            )
        }
        None => None,
    };

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(build_filter(log_level));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| VecSearchError::config(format!("Logging already initialized: {}", e)))?;

    match log_dir {
        Some(dir) => tracing::info!(
            "Logging initialized: level={}, log_file={}",
            log_level,
            dir.join(LOG_FILE_NAME).display()
        ),
        None => tracing::info!("Console logging initialized: level={}", log_level),
    }

    Ok(())
}

/// Env filter from `RUST_LOG`, else the configured level.
///
/// Unparseable levels fall back to `info`.
fn build_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
