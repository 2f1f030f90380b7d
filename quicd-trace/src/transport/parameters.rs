//! # Transport Parameters (RFC 9000 Section 18)
//!
//! Transport parameters are exchanged during the TLS handshake inside the
//! `quic_transport_parameters` extension. The traced blob is a 2-byte list
//! length followed by type-length-value triples, type and length being
//! VarInts.
//!
//! Lists up to `TraceOptions::tp_decode_limit` bytes are decoded triple by
//! triple; larger ones only get a hex preview.

#![forbid(unsafe_code)]

use crate::error::{DecodeError, Result};
use crate::sink::TraceWriter;
use crate::types::{Hex, HexPreview, SpanReader, VarInt};
use core::fmt;
use std::io::Write;

/// Transport Parameter ID (RFC 9000 Section 18.2)
pub type TransportParameterId = VarInt;

// Transport Parameter IDs
pub const TP_ORIGINAL_DESTINATION_CONNECTION_ID: TransportParameterId = 0x00;
pub const TP_MAX_IDLE_TIMEOUT: TransportParameterId = 0x01;
pub const TP_STATELESS_RESET_TOKEN: TransportParameterId = 0x02;
pub const TP_MAX_UDP_PAYLOAD_SIZE: TransportParameterId = 0x03;
pub const TP_INITIAL_MAX_DATA: TransportParameterId = 0x04;
pub const TP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL: TransportParameterId = 0x05;
pub const TP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE: TransportParameterId = 0x06;
pub const TP_INITIAL_MAX_STREAM_DATA_UNI: TransportParameterId = 0x07;
pub const TP_INITIAL_MAX_STREAMS_BIDI: TransportParameterId = 0x08;
pub const TP_INITIAL_MAX_STREAMS_UNI: TransportParameterId = 0x09;
pub const TP_ACK_DELAY_EXPONENT: TransportParameterId = 0x0a;
pub const TP_MAX_ACK_DELAY: TransportParameterId = 0x0b;
pub const TP_DISABLE_ACTIVE_MIGRATION: TransportParameterId = 0x0c;
pub const TP_PREFERRED_ADDRESS: TransportParameterId = 0x0d;
pub const TP_ACTIVE_CONNECTION_ID_LIMIT: TransportParameterId = 0x0e;
pub const TP_INITIAL_SOURCE_CONNECTION_ID: TransportParameterId = 0x0f;
pub const TP_RETRY_SOURCE_CONNECTION_ID: TransportParameterId = 0x10;

// Extension parameter IDs
pub const TP_VERSION_INFORMATION: TransportParameterId = 0x11; // RFC 9368
pub const TP_MAX_DATAGRAM_FRAME_SIZE: TransportParameterId = 0x20; // RFC 9221
pub const TP_GREASE_QUIC_BIT: TransportParameterId = 0x2ab2; // RFC 9287
pub const TP_GOOGLE_CONNECTION_OPTIONS: TransportParameterId = 0x3128;
pub const TP_GOOGLE_USER_AGENT: TransportParameterId = 0x3129;
pub const TP_MIN_ACK_DELAY: TransportParameterId = 0xff04de1b; // draft-ietf-quic-ack-frequency

/// Default size above which the list is previewed instead of decoded
pub const DEFAULT_TP_DECODE_LIMIT: usize = 512;

/// Default preview size for lists above the decode limit
pub const DEFAULT_TP_PREVIEW_LEN: usize = 32;

/// Knobs for the transport-parameter trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceOptions {
    pub tp_decode_limit: usize,
    pub tp_preview_len: usize,
}

impl Default for TraceOptions {
    fn default() -> Self {
        Self {
            tp_decode_limit: DEFAULT_TP_DECODE_LIMIT,
            tp_preview_len: DEFAULT_TP_PREVIEW_LEN,
        }
    }
}

/// One decoded (type, length, value) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportParameter<'a> {
    pub id: TransportParameterId,
    pub value: &'a [u8],
}

impl TransportParameter<'_> {
    /// Registry name, when known
    pub fn name(&self) -> Option<&'static str> {
        parameter_name(self.id)
    }

    /// Whether the value is rendered as text rather than hex
    pub fn is_printable(&self) -> bool {
        matches!(self.id, TP_GOOGLE_CONNECTION_OPTIONS | TP_GOOGLE_USER_AGENT)
    }
}

impl fmt::Display for TransportParameter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:x})", name, self.id)?,
            None => write!(f, "0x{:x}", self.id)?,
        }
        write!(f, ", length {}", self.value.len())?;
        if self.value.is_empty() {
            return Ok(());
        }
        if self.is_printable() {
            write!(f, ": \"{}\"", Printable(self.value))
        } else {
            write!(f, ": {}", Hex(self.value))
        }
    }
}

/// Text rendering that replaces non-printable bytes with '.'.
struct Printable<'a>(&'a [u8]);

impl fmt::Display for Printable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use fmt::Write as _;
        for &b in self.0 {
            let c = if b == b' ' || b.is_ascii_graphic() {
                char::from(b)
            } else {
                '.'
            };
            f.write_char(c)?;
        }
        Ok(())
    }
}

pub fn parameter_name(id: TransportParameterId) -> Option<&'static str> {
    let name = match id {
        TP_ORIGINAL_DESTINATION_CONNECTION_ID => "original_destination_connection_id",
        TP_MAX_IDLE_TIMEOUT => "max_idle_timeout",
        TP_STATELESS_RESET_TOKEN => "stateless_reset_token",
        TP_MAX_UDP_PAYLOAD_SIZE => "max_udp_payload_size",
        TP_INITIAL_MAX_DATA => "initial_max_data",
        TP_INITIAL_MAX_STREAM_DATA_BIDI_LOCAL => "initial_max_stream_data_bidi_local",
        TP_INITIAL_MAX_STREAM_DATA_BIDI_REMOTE => "initial_max_stream_data_bidi_remote",
        TP_INITIAL_MAX_STREAM_DATA_UNI => "initial_max_stream_data_uni",
        TP_INITIAL_MAX_STREAMS_BIDI => "initial_max_streams_bidi",
        TP_INITIAL_MAX_STREAMS_UNI => "initial_max_streams_uni",
        TP_ACK_DELAY_EXPONENT => "ack_delay_exponent",
        TP_MAX_ACK_DELAY => "max_ack_delay",
        TP_DISABLE_ACTIVE_MIGRATION => "disable_active_migration",
        TP_PREFERRED_ADDRESS => "preferred_address",
        TP_ACTIVE_CONNECTION_ID_LIMIT => "active_connection_id_limit",
        TP_INITIAL_SOURCE_CONNECTION_ID => "initial_source_connection_id",
        TP_RETRY_SOURCE_CONNECTION_ID => "retry_source_connection_id",
        TP_VERSION_INFORMATION => "version_information",
        TP_MAX_DATAGRAM_FRAME_SIZE => "max_datagram_frame_size",
        TP_GREASE_QUIC_BIT => "grease_quic_bit",
        TP_GOOGLE_CONNECTION_OPTIONS => "google_connection_options",
        TP_GOOGLE_USER_AGENT => "google_user_agent",
        TP_MIN_ACK_DELAY => "min_ack_delay",
        _ => return None,
    };
    Some(name)
}

/// Iterator over the triples of a parameter list (without its 2-byte
/// length prefix). Yields one error and stops on a truncated triple.
#[derive(Debug, Clone)]
pub struct TransportParameterIter<'a> {
    reader: SpanReader<'a>,
    failed: bool,
}

impl<'a> TransportParameterIter<'a> {
    pub fn new(list: &'a [u8]) -> Self {
        Self {
            reader: SpanReader::new(list),
            failed: false,
        }
    }

    fn read_one(&mut self) -> core::result::Result<TransportParameter<'a>, DecodeError> {
        let id = self.reader.varint("parameter type")?;
        let length = self.reader.varint("parameter length")?;
        let value = self.reader.bytes(length, "parameter value")?;
        Ok(TransportParameter { id, value })
    }
}

impl<'a> Iterator for TransportParameterIter<'a> {
    type Item = core::result::Result<TransportParameter<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let item = self.read_one();
        self.failed = item.is_err();
        Some(item)
    }
}

/// Trace a transport-parameter extension blob.
pub fn trace_transport_extension<W: Write>(
    w: &mut TraceWriter<W>,
    blob: &[u8],
    opts: &TraceOptions,
) -> Result<()> {
    if blob.len() > opts.tp_decode_limit {
        w.line(format_args!(
            "Transport parameters, {} bytes: {}",
            blob.len(),
            HexPreview::new(blob, opts.tp_preview_len)
        ))?;
        return Ok(());
    }

    let mut r = SpanReader::new(blob);
    let list = match r.u16("extension list length") {
        Ok(declared) => match r.bytes(u64::from(declared), "extension list") {
            Ok(list) => list,
            Err(err) => return malformed(w, err, blob.len()),
        },
        Err(err) => return malformed(w, err, blob.len()),
    };

    w.line(format_args!("Transport parameters, {} bytes:", list.len()))?;
    for param in TransportParameterIter::new(list) {
        match param {
            Ok(param) => w.line(format_args!("    {}", param))?,
            Err(err) => {
                tracing::debug!(error = %err, "malformed transport parameter");
                w.line(format_args!("    Malformed transport parameter: {}", err))?;
            }
        }
    }
    if !r.is_empty() {
        w.line(format_args!("    {} extra bytes after parameter list", r.remaining()))?;
    }
    Ok(())
}

fn malformed<W: Write>(w: &mut TraceWriter<W>, err: DecodeError, len: usize) -> Result<()> {
    tracing::debug!(error = %err, len, "malformed transport parameter list");
    w.line(format_args!("Malformed transport parameters: {}, {} bytes", err, len))?;
    Ok(())
}
