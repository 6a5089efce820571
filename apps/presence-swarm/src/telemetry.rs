use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to open log file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to configure logger: {0}")]
    Configure(String),
}

/// Installs the global subscriber. Logs go to `log_path` (appending) when set,
/// otherwise to stderr. `RUST_LOG` overrides the default `info` filter.
///
/// The returned guard flushes the non-blocking writer and must outlive `main`.
pub fn init(log_path: Option<&str>) -> Result<WorkerGuard, InitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (writer, guard) = match log_path {
        Some(path) => {
            let path = PathBuf::from(path);
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|source| InitError::Io { path, source })?;
            tracing_appender::non_blocking(file)
        }
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(log_path.is_none())
                .with_writer(writer),
        )
        .try_init()
        .map_err(|err| InitError::Configure(err.to_string()))?;

    Ok(guard)
}
