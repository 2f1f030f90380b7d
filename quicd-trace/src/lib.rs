//! quicd-trace: Diagnostic Decoder for QUIC Wire Structures
//!
//! Turns decrypted packet payloads, resumption tickets and transport
//! parameter blobs into deterministic, line-oriented text for protocol
//! debugging.
//!
//! # Design
//!
//! - **Zero-copy decoding**: every decoder works on a borrowed slice and
//!   checks bounds before each read
//! - **Malformed input is data**: truncation, inconsistent values and
//!   unknown tags produce a diagnostic line, never a panic or an abort
//! - **Forward progress**: a malformed frame consumes the rest of its span,
//!   so the frame stream always terminates
//! - **No shared state**: each call owns its span and its sink
//!
//! # Module Organization
//!
//! - `types`: VarInt codec, fixed-width reads, `ConnectionId`, `SpanReader`
//! - `frames`: frame classification, per-frame decoders, `FrameStream`
//! - `packet`: header formatter and segment trace assembler
//! - `ticket`: resumption and handshake ticket decoders
//! - `transport`: transport parameter formatter
//! - `sink`: `TraceWriter`, the line sink with optional connection tag
//!
//! Header parsing and decryption are not part of this crate; they are
//! consumed through `PacketHeader` and the `HeaderParser` trait.

#![forbid(unsafe_code)]

pub mod error;
pub mod frames;
pub mod packet;
pub mod sink;
pub mod ticket;
pub mod transport;
pub mod types;

pub use error::{DecodeError, Result, TraceError};
pub use frames::{decode_frame, trace_frames, Frame, FrameRecord, FrameStream, FrameType};
pub use packet::{
    trace_outgoing_raw_segment, trace_outgoing_segment, trace_raw_segment, trace_segment,
    ConnectionView, Direction, HeaderParser, PacketHeader, PacketType, SegmentStatus,
    TraceContext,
};
pub use sink::TraceWriter;
pub use ticket::{trace_ticket, HandshakeTicket, ResumptionTicket};
pub use transport::{trace_transport_extension, TraceOptions};
pub use types::{ConnectionId, SpanReader, VarInt, VarIntCodec};
