//! # Frame Rendering
//!
//! One text line per frame record. Payload-carrying frames show a short hex
//! preview; connection close frames show the reason length only.

#![forbid(unsafe_code)]

use super::parse::{FrameRecord, FrameStream};
use super::types::*;
use crate::error::{DecodeError, Result};
use crate::sink::TraceWriter;
use crate::types::{Hex, HexPreview};
use core::fmt;
use std::io::Write;
use std::net::SocketAddr;

/// Bytes of stream, crypto and datagram payload shown per frame
pub const DATA_PREVIEW_LEN: usize = 8;

/// Bytes of NEW_TOKEN token shown per frame
pub const TOKEN_PREVIEW_LEN: usize = 16;

/// Indentation of frame lines below the packet header
pub const FRAME_INDENT: &str = "    ";

/// Write one line per frame in `payload`, then stop at the end of the span.
///
/// Returns the number of frames written.
pub fn trace_frames<W: Write>(w: &mut TraceWriter<W>, payload: &[u8]) -> Result<usize> {
    let mut count = 0;
    for record in FrameStream::new(payload) {
        w.line(format_args!("{}{}", FRAME_INDENT, record))?;
        count += 1;
    }
    Ok(count)
}

impl fmt::Display for FrameRecord<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Ok(frame) => fmt::Display::fmt(frame, f),
            Err(DecodeError::UnknownFrameType(tag)) => {
                write!(f, "Unknown frame type 0x{:x}, {} bytes skipped", tag, self.consumed)
            }
            Err(DecodeError::UnreadableFrameType { needed }) => write!(
                f,
                "Unreadable frame type, needs {} bytes, {} bytes skipped",
                needed, self.consumed
            ),
            Err(err) => write!(
                f,
                "Malformed {} frame: {}, {} bytes",
                self.frame_type.name(),
                err,
                self.consumed
            ),
        }
    }
}

impl fmt::Display for AckFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match (self.path_id.is_some(), self.ecn_counts.is_some()) {
            (false, false) => "ACK",
            (false, true) => "ACK_ECN",
            (true, false) => "PATH_ACK",
            (true, true) => "PATH_ACK_ECN",
        };
        f.write_str(name)?;
        if let Some(path_id) = self.path_id {
            write!(f, "[{}]", path_id)?;
        }
        write!(f, " (nb={})", self.ack_range_count)?;
        for range in &self.ranges {
            if range.smallest == range.largest {
                write!(f, ", {}", range.largest)?;
            } else {
                write!(f, ", {}-{}", range.smallest, range.largest)?;
            }
        }
        if let Some(ecn) = &self.ecn_counts {
            write!(
                f,
                ", ect0={}, ect1={}, ce={}",
                ecn.ect0_count, ecn.ect1_count, ecn.ce_count
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Padding { run } => write!(f, "padding, {} bytes", run),
            Frame::Ping { run } if *run == 1 => f.write_str("ping"),
            Frame::Ping { run } => write!(f, "ping, {} bytes", run),
            Frame::Ack(ack) => fmt::Display::fmt(ack, f),
            Frame::ResetStream {
                stream_id,
                error_code,
                final_size,
            } => write!(
                f,
                "RESET_STREAM {}, error 0x{:x}, final size {}",
                stream_id, error_code, final_size
            ),
            Frame::StopSending {
                stream_id,
                error_code,
            } => write!(f, "STOP_SENDING {}, error 0x{:x}", stream_id, error_code),
            Frame::Crypto(crypto) => write!(
                f,
                "Crypto HS frame, offset {}, length {}: {}",
                crypto.offset,
                crypto.data.len(),
                HexPreview::new(crypto.data, DATA_PREVIEW_LEN)
            ),
            Frame::NewToken { token } => write!(
                f,
                "NEW_TOKEN, length {}: {}",
                token.len(),
                HexPreview::new(token, TOKEN_PREVIEW_LEN)
            ),
            Frame::Stream(stream) => write!(
                f,
                "Stream {}, offset {}, length {}, fin = {}: {}",
                stream.stream_id,
                stream.offset,
                stream.data.len(),
                u8::from(stream.fin),
                HexPreview::new(stream.data, DATA_PREVIEW_LEN)
            ),
            Frame::MaxData(maximum) => write!(f, "MAX_DATA: {}", maximum),
            Frame::MaxStreamData { stream_id, maximum } => {
                write!(f, "MAX_STREAM_DATA, stream: {}, max data: {}", stream_id, maximum)
            }
            Frame::MaxStreams {
                bidirectional,
                maximum,
            } => write!(f, "{}: {}", streams_name("MAX_STREAMS", *bidirectional), maximum),
            Frame::DataBlocked(limit) => write!(f, "DATA_BLOCKED: {}", limit),
            Frame::StreamDataBlocked { stream_id, limit } => {
                write!(f, "STREAM_DATA_BLOCKED: stream {}, limit {}", stream_id, limit)
            }
            Frame::StreamsBlocked {
                bidirectional,
                limit,
            } => write!(f, "{}: {}", streams_name("STREAMS_BLOCKED", *bidirectional), limit),
            Frame::NewConnectionId(ncid) => {
                match ncid.path_id {
                    Some(path_id) => write!(f, "PATH_NEW_CONNECTION_ID (path {})", path_id)?,
                    None => f.write_str("NEW_CONNECTION_ID")?,
                }
                write!(
                    f,
                    "[{}]: retire before {}, {}, srt: {}",
                    ncid.sequence_number,
                    ncid.retire_prior_to,
                    ncid.connection_id,
                    Hex(&ncid.stateless_reset_token)
                )
            }
            Frame::RetireConnectionId {
                path_id: Some(path_id),
                sequence_number,
            } => write!(
                f,
                "PATH_RETIRE_CONNECTION_ID (path {}): {}",
                path_id, sequence_number
            ),
            Frame::RetireConnectionId {
                path_id: None,
                sequence_number,
            } => write!(f, "RETIRE_CONNECTION_ID: {}", sequence_number),
            Frame::PathChallenge(data) => write!(f, "PATH_CHALLENGE: {}", Hex(data)),
            Frame::PathResponse(data) => write!(f, "PATH_RESPONSE: {}", Hex(data)),
            Frame::ConnectionClose(close) => {
                if close.application {
                    write!(f, "APPLICATION_CLOSE, error 0x{:x}", close.error_code)?;
                } else {
                    write!(f, "CONNECTION_CLOSE, error 0x{:x}", close.error_code)?;
                }
                if let Some(frame_type) = close.frame_type {
                    write!(f, ", frame type 0x{:x}", frame_type)?;
                }
                write!(f, ", reason length {}", close.reason_length)
            }
            Frame::HandshakeDone => f.write_str("HANDSHAKE_DONE"),
            Frame::ImmediateAck => f.write_str("IMMEDIATE_ACK"),
            Frame::Datagram(datagram) => {
                f.write_str("DATAGRAM")?;
                if let Some(id) = datagram.datagram_id {
                    write!(f, " id {}", id)?;
                }
                write!(
                    f,
                    ", length {}: {}",
                    datagram.data.len(),
                    HexPreview::new(datagram.data, DATA_PREVIEW_LEN)
                )
            }
            Frame::AckFrequency(freq) => write!(
                f,
                "ACK_FREQUENCY[{}], threshold {}, max ack delay {}, reordering {}",
                freq.sequence_number,
                freq.ack_eliciting_threshold,
                freq.request_max_ack_delay,
                freq.reordering_threshold
            ),
            Frame::TimeStamp(ts) => write!(f, "TIME_STAMP: {}", ts),
            Frame::ObservedAddress {
                sequence_number,
                address,
                port,
            } => write!(
                f,
                "OBSERVED_ADDRESS[{}]: {}",
                sequence_number,
                SocketAddr::new(*address, *port)
            ),
            Frame::AddAddress(add) => {
                write!(
                    f,
                    "ADD_ADDRESS[{}], seq {}, interface {}, ",
                    add.address_id, add.sequence_number, add.interface_type
                )?;
                match add.port {
                    Some(port) => write!(f, "{}", SocketAddr::new(add.address, port)),
                    None => write!(f, "{}", add.address),
                }
            }
            Frame::RemoveAddress {
                address_id,
                sequence_number,
            } => write!(f, "REMOVE_ADDRESS[{}], seq {}", address_id, sequence_number),
            Frame::PathAbandon {
                path_id,
                error_code,
            } => write!(f, "PATH_ABANDON (path {}), error 0x{:x}", path_id, error_code),
            Frame::PathStatus {
                available,
                path_id,
                sequence_number,
            } => write!(
                f,
                "{} (path {}), seq {}",
                if *available {
                    "PATH_STATUS_AVAILABLE"
                } else {
                    "PATH_STATUS_BACKUP"
                },
                path_id,
                sequence_number
            ),
            Frame::MaxPathId(max) => write!(f, "MAX_PATH_ID: {}", max),
            Frame::PathsBlocked(max) => write!(f, "PATHS_BLOCKED: {}", max),
            Frame::PathCidsBlocked {
                path_id,
                next_sequence,
            } => write!(
                f,
                "PATH_CIDS_BLOCKED (path {}), next seq {}",
                path_id, next_sequence
            ),
        }
    }
}

fn streams_name(base: &str, bidirectional: bool) -> String {
    format!("{}_{}", base, if bidirectional { "BIDI" } else { "UNI" })
}
