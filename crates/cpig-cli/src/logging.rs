use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LOG_FILE: &str = "./logs/cpig.log";

/// Console output goes to stderr so report lines on stdout stay pipeable.
/// `TRACING_LEVEL` wins over `--verbose`.
pub fn init_logger(verbose: bool) -> WorkerGuard {
    let filter = env::var("TRACING_LEVEL").unwrap_or_else(|_| default_level(verbose).to_string());

    let log_file = env::var("LOG_FILE_PATH").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());
    let (dir, file_name) = split_log_path(Path::new(&log_file));
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, &file_name));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(EnvFilter::new(filter))
        .init();

    debug!("Logging to stderr and {}", dir.join(&file_name).display());
    guard
}

fn default_level(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let file_name = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("cpig.log"));
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, file_name)
}
