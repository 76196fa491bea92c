use std::path::PathBuf;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Logging options. `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Directory for the daily-rolling log file. `None` disables file logging.
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: Some(PathBuf::from("logs")),
            file_prefix: "ltem".to_string(),
            max_log_files: 5,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LogSetupError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },
    #[error("Failed to create log directory '{path}': {source}")]
    Directory {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to create log file appender: {0}")]
    Appender(String),
    #[error("Logging already initialized")]
    AlreadyInitialized,
}

/// Installs the global subscriber: console output on stderr plus an optional
/// rolling file. Stdout is never written to, so frontends that speak a
/// protocol over stdout stay clean.
pub fn setup_logging(config: &LogConfig) -> Result<(), LogSetupError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| LogSetupError::Filter {
            filter: config.level.clone(),
            reason: e.to_string(),
        })?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .with_writer(std::io::stderr);

    let file_layer = match &config.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|source| LogSetupError::Directory {
                path: directory.clone(),
                source,
            })?;

            let file_appender = tracing_appender::rolling::Builder::new()
                .rotation(tracing_appender::rolling::Rotation::DAILY)
                .filename_prefix(&config.file_prefix)
                .filename_suffix("log")
                .max_log_files(config.max_log_files)
                .build(directory)
                .map_err(|e| LogSetupError::Appender(e.to_string()))?;

            let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
            LOG_GUARD
                .set(guard)
                .map_err(|_| LogSetupError::AlreadyInitialized)?;

            Some(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_ansi(false)
                    .with_writer(file_writer),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|_| LogSetupError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_logs_to_directory() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.directory, Some(PathBuf::from("logs")));
        assert_eq!(config.file_prefix, "ltem");
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: LogConfig = serde_json::from_str(r#"{ "level": "debug" }"#).unwrap();
        assert_eq!(config.level, "debug");
        assert_eq!(config.max_log_files, 5);
    }
}
