//! # QUIC Frame Types (RFC 9000 Section 19 and extensions)
//!
//! Frame type constants, the `FrameType` classification used by the
//! dispatcher, and the decoded `Frame` values. Decoded frames borrow payload
//! bytes from the packet buffer.
//!
//! ## Families beyond RFC 9000:
//! - **DATAGRAM** (RFC 9221, including the legacy id-carrying variants)
//! - **ACK_FREQUENCY / IMMEDIATE_ACK** (draft-ietf-quic-ack-frequency)
//! - **TIME_STAMP** (draft-huitema-quic-ts)
//! - **Multipath** (draft-ietf-quic-multipath)
//! - **Address advertisement** (OBSERVED_ADDRESS, ADD_ADDRESS, REMOVE_ADDRESS)

#![forbid(unsafe_code)]

use crate::types::{ConnectionId, VarInt};
use core::fmt;
use std::net::IpAddr;

/// Frame Type Constants (RFC 9000 Section 19)
pub const FRAME_TYPE_PADDING: u64 = 0x00;
pub const FRAME_TYPE_PING: u64 = 0x01;
pub const FRAME_TYPE_ACK: u64 = 0x02;
pub const FRAME_TYPE_ACK_ECN: u64 = 0x03;
pub const FRAME_TYPE_RESET_STREAM: u64 = 0x04;
pub const FRAME_TYPE_STOP_SENDING: u64 = 0x05;
pub const FRAME_TYPE_CRYPTO: u64 = 0x06;
pub const FRAME_TYPE_NEW_TOKEN: u64 = 0x07;
pub const FRAME_TYPE_STREAM_BASE: u64 = 0x08; // 0x08-0x0f
pub const FRAME_TYPE_STREAM_MAX: u64 = 0x0f;
pub const FRAME_TYPE_MAX_DATA: u64 = 0x10;
pub const FRAME_TYPE_MAX_STREAM_DATA: u64 = 0x11;
pub const FRAME_TYPE_MAX_STREAMS_BIDI: u64 = 0x12;
pub const FRAME_TYPE_MAX_STREAMS_UNI: u64 = 0x13;
pub const FRAME_TYPE_DATA_BLOCKED: u64 = 0x14;
pub const FRAME_TYPE_STREAM_DATA_BLOCKED: u64 = 0x15;
pub const FRAME_TYPE_STREAMS_BLOCKED_BIDI: u64 = 0x16;
pub const FRAME_TYPE_STREAMS_BLOCKED_UNI: u64 = 0x17;
pub const FRAME_TYPE_NEW_CONNECTION_ID: u64 = 0x18;
pub const FRAME_TYPE_RETIRE_CONNECTION_ID: u64 = 0x19;
pub const FRAME_TYPE_PATH_CHALLENGE: u64 = 0x1a;
pub const FRAME_TYPE_PATH_RESPONSE: u64 = 0x1b;
pub const FRAME_TYPE_CONNECTION_CLOSE: u64 = 0x1c;
pub const FRAME_TYPE_APPLICATION_CLOSE: u64 = 0x1d;
pub const FRAME_TYPE_HANDSHAKE_DONE: u64 = 0x1e;

/// Extension frame types
pub const FRAME_TYPE_IMMEDIATE_ACK: u64 = 0x1f;
pub const FRAME_TYPE_ADD_ADDRESS: u64 = 0x22;
pub const FRAME_TYPE_REMOVE_ADDRESS: u64 = 0x23;
pub const FRAME_TYPE_DATAGRAM_BASE: u64 = 0x30; // 0x30-0x33
pub const FRAME_TYPE_DATAGRAM_MAX: u64 = 0x33;
pub const FRAME_TYPE_ACK_FREQUENCY: u64 = 0xaf;
pub const FRAME_TYPE_TIME_STAMP: u64 = 0x2f5;
pub const FRAME_TYPE_OBSERVED_ADDRESS_V4: u64 = 0x9f81a6;
pub const FRAME_TYPE_OBSERVED_ADDRESS_V6: u64 = 0x9f81a7;

/// Multipath frame types (draft-ietf-quic-multipath)
pub const FRAME_TYPE_PATH_ACK: u64 = 0x15228c00;
pub const FRAME_TYPE_PATH_ACK_ECN: u64 = 0x15228c01;
pub const FRAME_TYPE_PATH_ABANDON: u64 = 0x15228c05;
pub const FRAME_TYPE_PATH_STATUS_BACKUP: u64 = 0x15228c07;
pub const FRAME_TYPE_PATH_STATUS_AVAILABLE: u64 = 0x15228c08;
pub const FRAME_TYPE_PATH_NEW_CONNECTION_ID: u64 = 0x15228c09;
pub const FRAME_TYPE_PATH_RETIRE_CONNECTION_ID: u64 = 0x15228c0a;
pub const FRAME_TYPE_MAX_PATH_ID: u64 = 0x15228c0c;
pub const FRAME_TYPE_PATHS_BLOCKED: u64 = 0x15228c0d;
pub const FRAME_TYPE_PATH_CIDS_BLOCKED: u64 = 0x15228c0e;

/// STREAM Frame Flag Bits (RFC 9000 Section 19.8)
///
/// - Bit 0 (FIN): Last frame in stream
/// - Bit 1 (LEN): Length field present
/// - Bit 2 (OFF): Offset field present
pub const STREAM_FRAME_BIT_FIN: u64 = 0x01;
pub const STREAM_FRAME_BIT_LEN: u64 = 0x02;
pub const STREAM_FRAME_BIT_OFF: u64 = 0x04;

/// DATAGRAM Frame Flag Bits
///
/// - Bit 0 (LEN): Length field present
/// - Bit 1 (ID): Datagram id field present
pub const DATAGRAM_FRAME_BIT_LEN: u64 = 0x01;
pub const DATAGRAM_FRAME_BIT_ID: u64 = 0x02;

/// Size of a stateless reset token
pub const STATELESS_RESET_TOKEN_LEN: usize = 16;

/// Size of PATH_CHALLENGE / PATH_RESPONSE data
pub const PATH_CHALLENGE_LEN: usize = 8;

// ============================================================================
// Frame Type Classification
// ============================================================================

/// Frame kind selected by the dispatcher from the type tag.
///
/// The stream and datagram families carry their flag bits; every other
/// kind maps from exactly one tag value. `Unknown` covers the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Padding,
    Ping,
    Ack { ecn: bool },
    ResetStream,
    StopSending,
    Crypto,
    NewToken,
    Stream { flags: u8 },
    MaxData,
    MaxStreamData,
    MaxStreams { bidirectional: bool },
    DataBlocked,
    StreamDataBlocked,
    StreamsBlocked { bidirectional: bool },
    NewConnectionId,
    RetireConnectionId,
    PathChallenge,
    PathResponse,
    ConnectionClose,
    ApplicationClose,
    HandshakeDone,
    ImmediateAck,
    Datagram { flags: u8 },
    AckFrequency,
    TimeStamp,
    ObservedAddress { ipv6: bool },
    AddAddress,
    RemoveAddress,
    PathAck { ecn: bool },
    PathAbandon,
    PathStatus { available: bool },
    PathNewConnectionId,
    PathRetireConnectionId,
    MaxPathId,
    PathsBlocked,
    PathCidsBlocked,
    Unknown(u64),
}

impl FrameType {
    /// Classify a decoded frame type tag.
    pub fn from_tag(tag: VarInt) -> Self {
        match tag {
            FRAME_TYPE_PADDING => FrameType::Padding,
            FRAME_TYPE_PING => FrameType::Ping,
            FRAME_TYPE_ACK => FrameType::Ack { ecn: false },
            FRAME_TYPE_ACK_ECN => FrameType::Ack { ecn: true },
            FRAME_TYPE_RESET_STREAM => FrameType::ResetStream,
            FRAME_TYPE_STOP_SENDING => FrameType::StopSending,
            FRAME_TYPE_CRYPTO => FrameType::Crypto,
            FRAME_TYPE_NEW_TOKEN => FrameType::NewToken,
            t @ FRAME_TYPE_STREAM_BASE..=FRAME_TYPE_STREAM_MAX => FrameType::Stream {
                flags: (t & 0x07) as u8,
            },
            FRAME_TYPE_MAX_DATA => FrameType::MaxData,
            FRAME_TYPE_MAX_STREAM_DATA => FrameType::MaxStreamData,
            FRAME_TYPE_MAX_STREAMS_BIDI => FrameType::MaxStreams { bidirectional: true },
            FRAME_TYPE_MAX_STREAMS_UNI => FrameType::MaxStreams { bidirectional: false },
            FRAME_TYPE_DATA_BLOCKED => FrameType::DataBlocked,
            FRAME_TYPE_STREAM_DATA_BLOCKED => FrameType::StreamDataBlocked,
            FRAME_TYPE_STREAMS_BLOCKED_BIDI => FrameType::StreamsBlocked { bidirectional: true },
            FRAME_TYPE_STREAMS_BLOCKED_UNI => FrameType::StreamsBlocked { bidirectional: false },
            FRAME_TYPE_NEW_CONNECTION_ID => FrameType::NewConnectionId,
            FRAME_TYPE_RETIRE_CONNECTION_ID => FrameType::RetireConnectionId,
            FRAME_TYPE_PATH_CHALLENGE => FrameType::PathChallenge,
            FRAME_TYPE_PATH_RESPONSE => FrameType::PathResponse,
            FRAME_TYPE_CONNECTION_CLOSE => FrameType::ConnectionClose,
            FRAME_TYPE_APPLICATION_CLOSE => FrameType::ApplicationClose,
            FRAME_TYPE_HANDSHAKE_DONE => FrameType::HandshakeDone,
            FRAME_TYPE_IMMEDIATE_ACK => FrameType::ImmediateAck,
            FRAME_TYPE_ADD_ADDRESS => FrameType::AddAddress,
            FRAME_TYPE_REMOVE_ADDRESS => FrameType::RemoveAddress,
            t @ FRAME_TYPE_DATAGRAM_BASE..=FRAME_TYPE_DATAGRAM_MAX => FrameType::Datagram {
                flags: (t & 0x03) as u8,
            },
            FRAME_TYPE_ACK_FREQUENCY => FrameType::AckFrequency,
            FRAME_TYPE_TIME_STAMP => FrameType::TimeStamp,
            FRAME_TYPE_OBSERVED_ADDRESS_V4 => FrameType::ObservedAddress { ipv6: false },
            FRAME_TYPE_OBSERVED_ADDRESS_V6 => FrameType::ObservedAddress { ipv6: true },
            FRAME_TYPE_PATH_ACK => FrameType::PathAck { ecn: false },
            FRAME_TYPE_PATH_ACK_ECN => FrameType::PathAck { ecn: true },
            FRAME_TYPE_PATH_ABANDON => FrameType::PathAbandon,
            FRAME_TYPE_PATH_STATUS_BACKUP => FrameType::PathStatus { available: false },
            FRAME_TYPE_PATH_STATUS_AVAILABLE => FrameType::PathStatus { available: true },
            FRAME_TYPE_PATH_NEW_CONNECTION_ID => FrameType::PathNewConnectionId,
            FRAME_TYPE_PATH_RETIRE_CONNECTION_ID => FrameType::PathRetireConnectionId,
            FRAME_TYPE_MAX_PATH_ID => FrameType::MaxPathId,
            FRAME_TYPE_PATHS_BLOCKED => FrameType::PathsBlocked,
            FRAME_TYPE_PATH_CIDS_BLOCKED => FrameType::PathCidsBlocked,
            other => FrameType::Unknown(other),
        }
    }

    /// Name used in trace lines.
    pub fn name(&self) -> &'static str {
        match self {
            FrameType::Padding => "padding",
            FrameType::Ping => "ping",
            FrameType::Ack { ecn: false } => "ACK",
            FrameType::Ack { ecn: true } => "ACK_ECN",
            FrameType::ResetStream => "RESET_STREAM",
            FrameType::StopSending => "STOP_SENDING",
            FrameType::Crypto => "CRYPTO",
            FrameType::NewToken => "NEW_TOKEN",
            FrameType::Stream { .. } => "STREAM",
            FrameType::MaxData => "MAX_DATA",
            FrameType::MaxStreamData => "MAX_STREAM_DATA",
            FrameType::MaxStreams { bidirectional: true } => "MAX_STREAMS_BIDI",
            FrameType::MaxStreams { bidirectional: false } => "MAX_STREAMS_UNI",
            FrameType::DataBlocked => "DATA_BLOCKED",
            FrameType::StreamDataBlocked => "STREAM_DATA_BLOCKED",
            FrameType::StreamsBlocked { bidirectional: true } => "STREAMS_BLOCKED_BIDI",
            FrameType::StreamsBlocked { bidirectional: false } => "STREAMS_BLOCKED_UNI",
            FrameType::NewConnectionId => "NEW_CONNECTION_ID",
            FrameType::RetireConnectionId => "RETIRE_CONNECTION_ID",
            FrameType::PathChallenge => "PATH_CHALLENGE",
            FrameType::PathResponse => "PATH_RESPONSE",
            FrameType::ConnectionClose => "CONNECTION_CLOSE",
            FrameType::ApplicationClose => "APPLICATION_CLOSE",
            FrameType::HandshakeDone => "HANDSHAKE_DONE",
            FrameType::ImmediateAck => "IMMEDIATE_ACK",
            FrameType::Datagram { .. } => "DATAGRAM",
            FrameType::AckFrequency => "ACK_FREQUENCY",
            FrameType::TimeStamp => "TIME_STAMP",
            FrameType::ObservedAddress { .. } => "OBSERVED_ADDRESS",
            FrameType::AddAddress => "ADD_ADDRESS",
            FrameType::RemoveAddress => "REMOVE_ADDRESS",
            FrameType::PathAck { ecn: false } => "PATH_ACK",
            FrameType::PathAck { ecn: true } => "PATH_ACK_ECN",
            FrameType::PathAbandon => "PATH_ABANDON",
            FrameType::PathStatus { available: false } => "PATH_STATUS_BACKUP",
            FrameType::PathStatus { available: true } => "PATH_STATUS_AVAILABLE",
            FrameType::PathNewConnectionId => "PATH_NEW_CONNECTION_ID",
            FrameType::PathRetireConnectionId => "PATH_RETIRE_CONNECTION_ID",
            FrameType::MaxPathId => "MAX_PATH_ID",
            FrameType::PathsBlocked => "PATHS_BLOCKED",
            FrameType::PathCidsBlocked => "PATH_CIDS_BLOCKED",
            FrameType::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Decoded Frames
// ============================================================================

/// One acknowledged interval, both ends inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AckRange {
    pub smallest: u64,
    pub largest: u64,
}

/// ECN Counts (RFC 9000 Section 19.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EcnCounts {
    pub ect0_count: VarInt,
    pub ect1_count: VarInt,
    pub ce_count: VarInt,
}

/// ACK / ACK_ECN / PATH_ACK / PATH_ACK_ECN (RFC 9000 Section 19.3)
///
/// `ranges` holds the reconstructed intervals, largest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckFrame {
    /// Path identifier, PATH_ACK variants only
    pub path_id: Option<VarInt>,
    pub largest_acked: VarInt,
    pub ack_delay: VarInt,
    /// Number of (gap, range) pairs after the first range
    pub ack_range_count: VarInt,
    pub ecn_counts: Option<EcnCounts>,
    pub ranges: tinyvec::TinyVec<[AckRange; 8]>,
}

/// STREAM Frame (RFC 9000 Section 19.8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFrame<'a> {
    pub stream_id: VarInt,
    pub offset: VarInt,
    pub fin: bool,
    /// Whether the length field was present on the wire
    pub explicit_length: bool,
    pub data: &'a [u8],
}

/// CRYPTO Frame (RFC 9000 Section 19.6)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoFrame<'a> {
    pub offset: VarInt,
    pub data: &'a [u8],
}

/// NEW_CONNECTION_ID / PATH_NEW_CONNECTION_ID (RFC 9000 Section 19.15)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConnectionIdFrame {
    pub path_id: Option<VarInt>,
    pub sequence_number: VarInt,
    pub retire_prior_to: VarInt,
    pub connection_id: ConnectionId,
    pub stateless_reset_token: [u8; STATELESS_RESET_TOKEN_LEN],
}

/// CONNECTION_CLOSE (0x1c) and APPLICATION_CLOSE (0x1d)
///
/// Only the length of the reason phrase is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionCloseFrame {
    pub application: bool,
    pub error_code: VarInt,
    /// Offending frame type, transport close only
    pub frame_type: Option<VarInt>,
    pub reason_length: VarInt,
}

/// DATAGRAM Frame (RFC 9221, with legacy datagram id)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatagramFrame<'a> {
    pub datagram_id: Option<VarInt>,
    pub explicit_length: bool,
    pub data: &'a [u8],
}

/// ACK_FREQUENCY Frame (draft-ietf-quic-ack-frequency)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrequencyFrame {
    pub sequence_number: VarInt,
    pub ack_eliciting_threshold: VarInt,
    pub request_max_ack_delay: VarInt,
    pub reordering_threshold: VarInt,
}

/// ADD_ADDRESS Frame
///
/// Flags byte: bit 4 signals a trailing port, low nibble is the IP version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddAddressFrame {
    pub address_id: u8,
    pub sequence_number: VarInt,
    pub interface_type: u8,
    pub address: IpAddr,
    pub port: Option<u16>,
}

/// Decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Run of consecutive PADDING bytes
    Padding { run: usize },
    /// Run of consecutive PING bytes
    Ping { run: usize },
    Ack(AckFrame),
    ResetStream {
        stream_id: VarInt,
        error_code: VarInt,
        final_size: VarInt,
    },
    StopSending {
        stream_id: VarInt,
        error_code: VarInt,
    },
    Crypto(CryptoFrame<'a>),
    NewToken { token: &'a [u8] },
    Stream(StreamFrame<'a>),
    MaxData(VarInt),
    MaxStreamData { stream_id: VarInt, maximum: VarInt },
    MaxStreams { bidirectional: bool, maximum: VarInt },
    DataBlocked(VarInt),
    StreamDataBlocked { stream_id: VarInt, limit: VarInt },
    StreamsBlocked { bidirectional: bool, limit: VarInt },
    NewConnectionId(NewConnectionIdFrame),
    RetireConnectionId {
        path_id: Option<VarInt>,
        sequence_number: VarInt,
    },
    PathChallenge([u8; PATH_CHALLENGE_LEN]),
    PathResponse([u8; PATH_CHALLENGE_LEN]),
    ConnectionClose(ConnectionCloseFrame),
    HandshakeDone,
    ImmediateAck,
    Datagram(DatagramFrame<'a>),
    AckFrequency(AckFrequencyFrame),
    TimeStamp(VarInt),
    ObservedAddress {
        sequence_number: VarInt,
        address: IpAddr,
        port: u16,
    },
    AddAddress(AddAddressFrame),
    RemoveAddress { address_id: u8, sequence_number: VarInt },
    PathAbandon { path_id: VarInt, error_code: VarInt },
    PathStatus {
        available: bool,
        path_id: VarInt,
        sequence_number: VarInt,
    },
    MaxPathId(VarInt),
    PathsBlocked(VarInt),
    PathCidsBlocked { path_id: VarInt, next_sequence: VarInt },
}
