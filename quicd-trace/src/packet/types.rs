//! # Packet Header Descriptor (RFC 9000 Section 17)
//!
//! The already-resolved header handed over by the header parser. Nothing in
//! this crate re-derives these fields from raw bytes, except the outgoing
//! reconstruction in `segment`.

use crate::types::ConnectionId;
use core::fmt;

/// QUIC Protocol Version (RFC 9000 Section 15)
pub type Version = u32;

/// QUIC Version 1 (RFC 9000)
pub const VERSION_1: Version = 0x00000001;

/// Packet Type (RFC 9000 Section 17)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Initial packet (Long Header, type 0x0)
    Initial,
    /// 0-RTT packet (Long Header, type 0x1)
    ZeroRtt,
    /// Handshake packet (Long Header, type 0x2)
    Handshake,
    /// Retry packet (Long Header, type 0x3)
    Retry,
    /// 1-RTT packet (Short Header)
    OneRtt,
    /// Version Negotiation packet (special Long Header)
    VersionNegotiation,
}

impl PacketType {
    /// Returns true if this is a long header packet type
    pub fn is_long_header(&self) -> bool {
        !matches!(self, PacketType::OneRtt)
    }

    /// Returns true if the payload is a frame stream
    pub fn carries_frames(&self) -> bool {
        !matches!(self, PacketType::Retry | PacketType::VersionNegotiation)
    }

    /// Name used in trace lines.
    pub fn name(&self) -> &'static str {
        match self {
            PacketType::Initial => "initial",
            PacketType::ZeroRtt => "0rtt protected",
            PacketType::Handshake => "handshake",
            PacketType::Retry => "retry",
            PacketType::OneRtt => "1rtt protected",
            PacketType::VersionNegotiation => "version negotiation",
        }
    }
}

impl fmt::Display for PacketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Resolved packet header
///
/// `offset` and `payload_length` locate the decrypted payload within the
/// segment bytes. `pn_offset` is where the packet number field starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketHeader {
    pub packet_type: PacketType,
    /// Long headers only
    pub version: Version,
    pub dcid: ConnectionId,
    pub scid: ConnectionId,
    /// Truncated packet number as carried on the wire
    pub pn: u32,
    /// Reconstructed packet number
    pub pn64: u64,
    pub offset: usize,
    pub payload_length: usize,
    pub pn_offset: usize,
    /// Spin bit (RFC 9000 Section 17.3.1), short header only
    pub spin: bool,
    /// Key phase bit (RFC 9000 Section 17.3.1), short header only
    pub key_phase: bool,
}

impl PacketHeader {
    /// Header of the given type with every other field zeroed.
    pub fn new(packet_type: PacketType) -> Self {
        Self {
            packet_type,
            version: VERSION_1,
            dcid: ConnectionId::empty(),
            scid: ConnectionId::empty(),
            pn: 0,
            pn64: 0,
            offset: 0,
            payload_length: 0,
            pn_offset: 0,
            spin: false,
            key_phase: false,
        }
    }
}

/// Outcome of header parsing and decryption for one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStatus {
    Ok,
    /// Decryption failed and the trailer matched a stateless reset token
    StatelessReset,
    /// Header or decryption failure, with the implementation's error code
    Failed(u32),
}

impl SegmentStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, SegmentStatus::Ok)
    }
}

/// Direction of a traced segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Receiving,
    Sending,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Receiving => "Receiving",
            Direction::Sending => "Sending",
        }
    }
}
