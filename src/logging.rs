//! Logging initialisation.

use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use agentpool_config::{ConfigLoader, LoggingConfig};

use crate::error::SetupError;

static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> Result<EnvFilter, SetupError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| SetupError::Logging(e.to_string())),
    }
}

/// Install the global subscriber: console output plus an optional daily
/// rolling file written through a non-blocking worker.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(config: &LoggingConfig) -> Result<(), SetupError> {
    let filter = env_filter(&config.level)?;

    let console = if config.json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_ansi(true).boxed()
    };

    let file = match &config.directory {
        Some(directory) => {
            let directory = ConfigLoader::expand_path(directory);
            std::fs::create_dir_all(&directory)?;

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(config.file_prefix.as_str())
                .max_log_files(30)
                .build(&directory)
                .map_err(|e| SetupError::Logging(e.to_string()))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = GUARD.set(guard);

            let layer = if config.json {
                fmt::layer().json().with_writer(writer).boxed()
            } else {
                fmt::layer().with_writer(writer).with_ansi(false).boxed()
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .with(filter)
        .try_init()
        .map_err(|e| SetupError::Logging(e.to_string()))
}
