//! # Diagnostic Logging
//!
//! Structured logging for the trace tool. Trace text goes to the configured
//! output; this subscriber only carries diagnostics (malformed-structure
//! events from the decoder, configuration warnings) on stderr.
//!
//! `RUST_LOG` takes precedence over the configured level.

use anyhow::Result;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// Build the level filter: `RUST_LOG` if set, else the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .map_err(|e| anyhow::anyhow!("invalid log filter: {}", e))
}

/// Initialize structured logging.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;

    let fmt_layer = if config.json_format {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_file(config.include_file_line)
            .with_line_number(config.include_file_line)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(config.enable_colors)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_file_line)
            .with_line_number(config.include_file_line)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))?;

    tracing::debug!(level = %config.level, json = config.json_format, "Logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_filter_from_configured_level() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let config = LoggingConfig {
            level: LogLevel::Warn,
            ..LoggingConfig::default()
        };
        let filter = env_filter(&config).unwrap();
        assert_eq!(filter.to_string(), "warn");
    }
}
