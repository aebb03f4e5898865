//! Structured logging configuration.
//!
//! Boot and watchdog runs are typically read back from the journal after the
//! fact, so the default format is compact single-line output; JSON is
//! available for log shippers.

use std::io;
use tracing::Level;
use tracing_subscriber::{
    filter::EnvFilter,
    fmt::{self},
    prelude::*,
};

/// Logging format options.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// Compact single-line output (default; journal-friendly)
    #[default]
    Compact,
    /// Pretty human-readable output for interactive use
    Pretty,
    /// JSON output for log aggregation
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format.
    pub format: LogFormat,
    /// Minimum log level.
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            level: Level::INFO,
        }
    }
}

impl LogConfig {
    /// Config for interactive commands (`diagnose`, `mode`).
    pub const fn interactive() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: Level::INFO,
        }
    }

    /// Set the log level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Called once at startup. `RUST_LOG` overrides the configured level.
/// Setting the global default may fail when tests install their own
/// subscriber first; that is deliberately ignored.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    match config.format {
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_ansi(false).with_target(true));
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_ansi(true).with_target(false));
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(io::stdout),
            );
            let _ = tracing::subscriber::set_global_default(subscriber);
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_compact_info() {
        let config = LogConfig::default();
        assert!(matches!(config.format, LogFormat::Compact));
        assert_eq!(config.level, Level::INFO);
    }

    #[test]
    fn builder_sets_level() {
        let config = LogConfig::interactive().level(Level::DEBUG);
        assert_eq!(config.level, Level::DEBUG);
    }
}
