//! Trace tool configuration.
//!
//! Settings are layered the same way for every subcommand: built-in
//! defaults, then the TOML file, then `QUICD_TRACE_*` environment
//! variables, then command-line flags.
//!
//! # Example
//!
//! ```toml
//! [logging]
//! level = "debug"
//! json_format = false
//!
//! [output]
//! connection_tag = 4660
//! path = "/tmp/trace.log"
//!
//! [limits]
//! transport_parameter_decode_limit = 512
//! transport_parameter_preview = 32
//! ```

pub mod loader;


pub use loader::{load_config, CliArgs, Command, InputArgs};

use quicd_trace::transport::parameters::{DEFAULT_TP_DECODE_LIMIT, DEFAULT_TP_PREVIEW_LEN};
use quicd_trace::TraceOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Upper bound for the transport parameter decode limit. Extension blobs
/// are carried in a TLS extension whose length field is 16 bits.
pub const MAX_TP_DECODE_LIMIT: usize = u16::MAX as usize;

/// Top-level configuration of the trace tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Diagnostic logging (not the trace text itself)
    pub logging: LoggingConfig,

    /// Where and how trace lines are written
    pub output: OutputConfig,

    /// Decoder limits
    pub limits: LimitsConfig,
}

impl TraceConfig {
    /// Validate the entire configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.output.validate() {
            errors.extend(e);
        }

        if let Err(e) = self.limits.validate() {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Decoder options derived from `[limits]`.
    pub fn trace_options(&self) -> TraceOptions {
        TraceOptions {
            tp_decode_limit: self.limits.transport_parameter_decode_limit,
            tp_preview_len: self.limits.transport_parameter_preview,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level, overridable through `RUST_LOG`.
    ///
    /// **Default:** `Info`
    pub level: LogLevel,

    /// Emit logs as JSON.
    ///
    /// **Default:** `false`
    pub json_format: bool,

    /// Enable ANSI color codes in logs.
    ///
    /// **Default:** `true`
    pub enable_colors: bool,

    /// Include source file and line number in logs.
    ///
    /// **Default:** `false`
    pub include_file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            json_format: false,
            enable_colors: true,
            include_file_line: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Prefix every trace line with this connection tag (`{tag:016x}: `).
    ///
    /// **Default:** none
    pub connection_tag: Option<u64>,

    /// Append trace lines to this file instead of stdout.
    ///
    /// **Default:** none (stdout)
    pub path: Option<PathBuf>,
}

impl OutputConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Some(path) = &self.path {
            if path.as_os_str().is_empty() {
                errors.push("output.path must not be empty".to_string());
            } else if path.is_dir() {
                errors.push(format!("output.path is a directory: {}", path.display()));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Decoder limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Transport parameter blobs longer than this are previewed, not decoded.
    ///
    /// **Default:** 512
    pub transport_parameter_decode_limit: usize,

    /// Number of bytes shown in the preview of an oversized blob.
    ///
    /// **Default:** 32
    pub transport_parameter_preview: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            transport_parameter_decode_limit: DEFAULT_TP_DECODE_LIMIT,
            transport_parameter_preview: DEFAULT_TP_PREVIEW_LEN,
        }
    }
}

impl LimitsConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.transport_parameter_decode_limit == 0 {
            errors.push("limits.transport_parameter_decode_limit must be > 0".to_string());
        }

        if self.transport_parameter_decode_limit > MAX_TP_DECODE_LIMIT {
            errors.push(format!(
                "limits.transport_parameter_decode_limit must be <= {}",
                MAX_TP_DECODE_LIMIT
            ));
        }

        if self.transport_parameter_preview > self.transport_parameter_decode_limit {
            errors.push(format!(
                "limits.transport_parameter_preview ({}) exceeds decode limit ({})",
                self.transport_parameter_preview, self.transport_parameter_decode_limit
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
