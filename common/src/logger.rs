//! Tracing subscriber setup.
//!
//! Log lines always go to a daily-rolling file under `LogSettings::dir`. Stdout logging is
//! opt-in so the human-readable run summary is not interleaved with diagnostics unless asked.

use std::fs;
use std::path::PathBuf;

use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `LOG_LEVEL` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "grader=info,marker=info,gitlab_client=info,util=info";

/// Where and how loudly to log.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Filter directive, e.g. `grader=debug,gitlab_client=warn`.
    pub level: String,
    pub dir: PathBuf,
    pub file_name: String,
    pub to_stdout: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: DEFAULT_FILTER.to_string(),
            dir: PathBuf::from("logs"),
            file_name: "grader.log".to_string(),
            to_stdout: false,
        }
    }
}

/// Builds the filter from the configured directive, falling back to [`DEFAULT_FILTER`].
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber.
///
/// The returned guard flushes the non-blocking file writer on drop, so the caller must keep
/// it alive until the process exits.
pub fn init_logging(settings: &LogSettings) -> WorkerGuard {
    fs::create_dir_all(&settings.dir).ok();

    let file_appender = rolling::daily(&settings.dir, &settings.file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true);

    let stdout_layer = settings.to_stdout.then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(true)
    });

    let registry = tracing_subscriber::registry()
        .with(build_filter(&settings.level))
        .with(file_layer)
        .with(stdout_layer);

    if registry.try_init().is_err() {
        tracing::warn!("global tracing subscriber was already installed");
    }

    guard
}
