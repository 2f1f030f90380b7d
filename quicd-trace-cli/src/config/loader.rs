//! Configuration loading and parsing.
//!
//! This module handles loading configuration from files, environment variables,
//! and command-line arguments, with proper precedence handling.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use config::Config as ConfigLoader;
use std::path::{Path, PathBuf};

use super::TraceConfig;

/// Environment variable prefix, e.g. `QUICD_TRACE_LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "QUICD_TRACE";

/// Command-line interface for the trace tool.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, short = 'c', default_value = "quicd-trace.toml", global = true)]
    pub config: String,

    /// Log level (overrides config file)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Connection tag in hex, prefixed to every trace line (overrides config file)
    #[arg(long, value_parser = parse_tag, global = true)]
    pub tag: Option<u64>,

    /// Write trace lines to this file instead of stdout (overrides config file)
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Print default configuration and exit
    #[arg(long)]
    pub print_default_config: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// What to decode.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Decode a decrypted packet payload into frame lines
    Frames(InputArgs),

    /// Decode a serialized resumption ticket
    Ticket(InputArgs),

    /// Decode a transport parameters extension blob
    TransportParams(InputArgs),
}

impl Command {
    pub fn input(&self) -> &InputArgs {
        match self {
            Command::Frames(input) | Command::Ticket(input) | Command::TransportParams(input) => {
                input
            }
        }
    }
}

/// Hex input, given inline or read from a file.
#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    /// Hex-encoded bytes (whitespace and a leading 0x are ignored)
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub hex: Option<String>,

    /// Read hex-encoded bytes from a file
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,
}

/// Parse a connection tag given in hex, with or without `0x`.
pub fn parse_tag(s: &str) -> Result<u64, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid connection tag '{}': {}", s, e))
}

/// Load and validate the trace configuration.
///
/// This function implements the configuration precedence:
/// 1. Default values (lowest priority)
/// 2. Configuration file
/// 3. Environment variables (`QUICD_TRACE_` prefix)
/// 4. Command-line arguments (highest priority)
///
/// # Errors
///
/// Returns an error if:
/// - Configuration file cannot be read or parsed
/// - Environment variables cannot be read
/// - Validation fails
pub fn load_config(cli: &CliArgs) -> Result<TraceConfig> {
    let mut config = load_config_file(Path::new(&cli.config))?;

    apply_env_overrides(&mut config, environment())?;

    apply_cli_overrides(&mut config, cli);

    config.validate().map_err(|errors| {
        anyhow::anyhow!("Configuration validation failed:\n{}", errors.join("\n"))
    })?;

    Ok(config)
}

/// Load configuration from a TOML file.
pub fn load_config_file(path: &Path) -> Result<TraceConfig> {
    // If file doesn't exist, use default config
    if !path.exists() {
        tracing::debug!(
            config_path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(TraceConfig::default());
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Process environment source with the `QUICD_TRACE_` prefix and `__`
/// as the section separator.
pub fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

/// Apply environment variable overrides.
///
/// Examples:
/// - `QUICD_TRACE_LOGGING__LEVEL=debug`
/// - `QUICD_TRACE_OUTPUT__CONNECTION_TAG=1234`
/// - `QUICD_TRACE_LIMITS__TRANSPORT_PARAMETER_DECODE_LIMIT=1024`
pub fn apply_env_overrides(config: &mut TraceConfig, env: config::Environment) -> Result<()> {
    let env_config = ConfigLoader::builder()
        .add_source(env)
        .build()
        .context("Failed to load environment variables")?;

    // Manually apply known overrides to avoid full deserialization
    if let Ok(level) = env_config.get_string("logging.level") {
        match level.parse() {
            Ok(parsed) => config.logging.level = parsed,
            Err(e) => tracing::warn!(level = %level, error = %e, "Ignoring invalid log level"),
        }
    }
    if let Ok(json) = env_config.get_bool("logging.json_format") {
        config.logging.json_format = json;
    }
    if let Ok(colors) = env_config.get_bool("logging.enable_colors") {
        config.logging.enable_colors = colors;
    }
    if let Ok(file_line) = env_config.get_bool("logging.include_file_line") {
        config.logging.include_file_line = file_line;
    }

    if let Ok(tag) = env_config.get_string("output.connection_tag") {
        config.output.connection_tag = Some(parse_tag(&tag).map_err(anyhow::Error::msg)?);
    }
    if let Ok(path) = env_config.get_string("output.path") {
        config.output.path = Some(PathBuf::from(path));
    }

    if let Ok(limit) = env_config.get_int("limits.transport_parameter_decode_limit") {
        config.limits.transport_parameter_decode_limit = usize::try_from(limit)
            .context("limits.transport_parameter_decode_limit must not be negative")?;
    }
    if let Ok(preview) = env_config.get_int("limits.transport_parameter_preview") {
        config.limits.transport_parameter_preview = usize::try_from(preview)
            .context("limits.transport_parameter_preview must not be negative")?;
    }

    Ok(())
}

/// Apply command-line argument overrides.
pub fn apply_cli_overrides(config: &mut TraceConfig, cli: &CliArgs) {
    if let Some(ref level_str) = cli.log_level {
        if let Ok(level) = level_str.parse() {
            config.logging.level = level;
        } else {
            tracing::warn!(level = %level_str, "Invalid log level specified, ignoring");
        }
    }

    if let Some(tag) = cli.tag {
        config.output.connection_tag = Some(tag);
    }

    if let Some(ref path) = cli.output {
        config.output.path = Some(path.clone());
    }
}

/// Render the default configuration in TOML format.
pub fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&TraceConfig::default()).context("Failed to serialize default config")
}
