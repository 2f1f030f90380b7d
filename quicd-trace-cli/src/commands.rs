//! Subcommand execution: hex input in, trace lines out.

use anyhow::{Context, Result};
use quicd_trace::{trace_frames, trace_ticket, trace_transport_extension, TraceWriter};
use std::fs::OpenOptions;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::{Command, InputArgs, TraceConfig};

/// Decode hex text, ignoring whitespace and an optional leading `0x`.
pub fn decode_hex(text: &str) -> Result<Vec<u8>> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = compact
        .strip_prefix("0x")
        .or_else(|| compact.strip_prefix("0X"))
        .unwrap_or(&compact);
    hex::decode(digits).context("input is not valid hex")
}

/// Read the command input, inline or from a file.
pub fn read_input(input: &InputArgs) -> Result<Vec<u8>> {
    match (&input.hex, &input.file) {
        (Some(text), _) => decode_hex(text),
        (None, Some(path)) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?;
            decode_hex(&text).with_context(|| format!("in {}", path.display()))
        }
        (None, None) => anyhow::bail!("no input given: pass hex bytes or --file"),
    }
}

/// Decode `bytes` as the command dictates and write the trace to `out`.
pub fn render<W: Write>(
    command: &Command,
    bytes: &[u8],
    config: &TraceConfig,
    out: W,
) -> Result<()> {
    let mut w = TraceWriter::new(out);
    w.set_connection_tag(config.output.connection_tag);

    match command {
        Command::Frames(_) => {
            let count = trace_frames(&mut w, bytes)?;
            tracing::debug!(frames = count, bytes = bytes.len(), "Traced frame payload");
        }
        Command::Ticket(_) => trace_ticket(&mut w, bytes)?,
        Command::TransportParams(_) => {
            trace_transport_extension(&mut w, bytes, &config.trace_options())?
        }
    }

    w.flush().context("Failed to flush trace output")
}

/// Run one subcommand end to end.
pub fn run(command: &Command, config: &TraceConfig) -> Result<()> {
    let bytes = read_input(command.input())?;

    match &config.output.path {
        Some(path) => {
            let file = open_output(path)?;
            render(command, &bytes, config, BufWriter::new(file))
        }
        None => render(command, &bytes, config, io::stdout().lock()),
    }
}

fn open_output(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open output file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn inline(hex: &str) -> InputArgs {
        InputArgs {
            hex: Some(hex.to_string()),
            file: None,
        }
    }

    fn render_to_string(command: &Command, bytes: &[u8], config: &TraceConfig) -> String {
        let mut out = Vec::new();
        render(command, bytes, config, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    mod input {
        use super::*;

        #[test]
        fn test_hex_with_prefix_and_whitespace() {
            assert_eq!(decode_hex("0x01 02\n0a").unwrap(), vec![1, 2, 10]);
            assert_eq!(decode_hex("ABcd").unwrap(), vec![0xab, 0xcd]);
        }

        #[test]
        fn test_odd_length_hex_rejected() {
            assert!(decode_hex("abc").is_err());
            assert!(decode_hex("zz").is_err());
        }

        #[test]
        fn test_read_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "01 1e").unwrap();
            let input = InputArgs {
                hex: None,
                file: Some(file.path().to_path_buf()),
            };
            assert_eq!(read_input(&input).unwrap(), vec![0x01, 0x1e]);
        }

        #[test]
        fn test_missing_file_is_an_error() {
            let input = InputArgs {
                hex: None,
                file: Some(PathBuf::from("/nonexistent/quicd-trace-input.hex")),
            };
            let err = read_input(&input).unwrap_err();
            assert!(err.to_string().contains("Failed to read input file"));
        }
    }

    mod rendering {
        use super::*;

        #[test]
        fn test_frames_output() {
            let command = Command::Frames(inline(""));
            let out = render_to_string(&command, &[0x01, 0x00, 0x00], &TraceConfig::default());
            assert_eq!(out, "    ping\n    padding, 2 bytes\n");
        }

        #[test]
        fn test_connection_tag_applied() {
            let mut config = TraceConfig::default();
            config.output.connection_tag = Some(0x1234);
            let command = Command::Frames(inline(""));
            let out = render_to_string(&command, &[0x1e], &config);
            assert_eq!(out, "0000000000001234:     HANDSHAKE_DONE\n");
        }

        #[test]
        fn test_transport_params_use_configured_limit() {
            let mut config = TraceConfig::default();
            config.limits.transport_parameter_decode_limit = 4;
            config.limits.transport_parameter_preview = 2;
            let command = Command::TransportParams(inline(""));
            let out = render_to_string(&command, &[0x00, 0x03, 0x01, 0x01, 0x00], &config);
            assert_eq!(out, "Transport parameters, 5 bytes: 0003...\n");
        }

        #[test]
        fn test_malformed_ticket_is_reported_not_failed() {
            let command = Command::Ticket(inline(""));
            let out = render_to_string(&command, &[0x00, 0x01], &TraceConfig::default());
            assert!(out.contains("Malformed"), "{}", out);
        }

        #[test]
        fn test_output_file_appends() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("trace.log");
            let mut config = TraceConfig::default();
            config.output.path = Some(path.clone());

            let command = Command::Frames(inline("01"));
            run(&command, &config).unwrap();
            run(&command, &config).unwrap();

            let text = std::fs::read_to_string(&path).unwrap();
            assert_eq!(text, "    ping\n    ping\n");
        }
    }
}
