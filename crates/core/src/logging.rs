use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Where and how loudly a process logs.
#[derive(Debug, Clone)]
pub struct LogOptions {
    /// File prefix of the rolling log, e.g. `cli` -> `cli.2024-01-21`.
    pub component: String,
    /// Overrides `~/.autoreg/logs`, typically with a build-intermediates dir.
    pub log_dir: Option<PathBuf>,
    pub to_stderr: bool,
    /// Default level `debug` instead of `info` when `RUST_LOG` is unset.
    pub verbose: bool,
}

impl LogOptions {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            log_dir: None,
            to_stderr: true,
            verbose: false,
        }
    }
}

pub fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    Path::new(&home).join(".autoreg").join("logs")
}

pub fn init_logging(options: &LogOptions) -> WorkerGuard {
    let log_dir = options.log_dir.clone().unwrap_or_else(default_log_dir);
    let _ = std::fs::create_dir_all(&log_dir);

    let file_appender = tracing_appender::rolling::daily(&log_dir, &options.component);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if options.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);

    if options.to_stderr {
        let stderr_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false)
            .without_time();
        registry.with(stderr_layer).init();
    } else {
        registry.init();
    }

    guard
}
