//! Logging setup for test binaries and the `vaulttest` CLI.
//!
//! The library itself only emits `tracing` events. Test suites that want to
//! see them call [`init_logging`] once (repeated calls are harmless).

use std::io;
use tracing::Level;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Logging format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Pretty human-readable output
    #[default]
    Pretty,
    /// Compact single-line output
    Compact,
    /// JSON output for CI log collectors
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Output format
    pub format: LogFormat,
    /// Minimum log level, unless `RUST_LOG` says otherwise
    pub level: Level,
    /// Include target (module path)
    pub with_target: bool,
    /// Include file name and line number
    pub with_file: bool,
    /// Write through the test harness so output is captured per test
    pub test_writer: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: Level::INFO,
            with_target: true,
            with_file: false,
            test_writer: false,
        }
    }
}

impl LogConfig {
    /// Config for test binaries: compact, debug level, captured by libtest.
    pub const fn test() -> Self {
        Self {
            format: LogFormat::Compact,
            level: Level::DEBUG,
            with_target: false,
            with_file: false,
            test_writer: true,
        }
    }

    /// Set the log level.
    #[must_use]
    pub const fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the log format.
    #[must_use]
    pub const fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }
}

/// Install the global tracing subscriber.
///
/// Respects `RUST_LOG` if set. Returns `false` if a subscriber was already
/// installed, which is the normal case for every test after the first.
///
/// # Example
///
/// ```rust
/// use vaulttest::logging::{init_logging, LogConfig};
///
/// init_logging(&LogConfig::test());
/// init_logging(&LogConfig::test()); // no-op
/// ```
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_string()));

    let layer = fmt::layer()
        .with_target(config.with_target)
        .with_file(config.with_file)
        .with_line_number(config.with_file);

    let result = match (config.format, config.test_writer) {
        (LogFormat::Pretty, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_test_writer())
            .try_init(),
        (LogFormat::Pretty, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(io::stderr))
            .try_init(),
        (LogFormat::Compact, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact().with_test_writer())
            .try_init(),
        (LogFormat::Compact, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.compact().with_writer(io::stderr))
            .try_init(),
        (LogFormat::Json, true) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json().with_test_writer())
            .try_init(),
        (LogFormat::Json, false) => tracing_subscriber::registry()
            .with(filter)
            .with(layer.json().with_writer(io::stderr))
            .try_init(),
    };

    result.is_ok()
}
