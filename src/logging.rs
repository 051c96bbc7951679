//! Logging System
//!
//! Structured logging built on the `tracing` crate. Verbosity is explicit
//! configuration passed in by the caller; the `FMF_LOG` environment
//! variable overrides it with a full filter directive.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error, off
    #[serde(default = "default_level")]
    pub level: String,

    /// Enable colored output
    #[serde(default = "default_color")]
    pub color: bool,
}

fn default_level() -> String {
    String::from("warn")
}

fn default_color() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_level(),
            color: default_color(),
        }
    }
}

impl LoggingConfig {
    /// Map CLI verbosity flags to a configuration.
    pub fn from_flags(verbose: bool, debug: bool) -> LoggingConfig {
        let level = if debug {
            "debug"
        } else if verbose {
            "info"
        } else {
            "warn"
        };
        LoggingConfig {
            level: level.to_string(),
            ..LoggingConfig::default()
        }
    }
}

/// Initialize the logging system.
///
/// Logs go to stderr so that command output stays clean on stdout.
/// Repeated initialization (e.g. in tests) is a no-op.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_env("FMF_LOG")
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(config.color)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();
}
