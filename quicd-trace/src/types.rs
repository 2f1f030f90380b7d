//! # Primitive Decoding (RFC 9000 Section 16, RFC 8999)
//!
//! Variable-length integers, fixed-width big-endian fields and connection
//! IDs. Every higher-level decoder in this crate is built on these helpers.
//! All functions are pure and operate on borrowed slices.

#![forbid(unsafe_code)]

use crate::error::DecodeError;
use bytes::Bytes;
use core::fmt;

// ============================================================================
// Variable-Length Integer Encoding (RFC 9000 Section 16)
// ============================================================================

/// Variable-Length Integer (RFC 9000 Section 16)
///
/// The first two bits indicate the length: 00=1 byte, 01=2 bytes,
/// 10=4 bytes, 11=8 bytes. Maximum value: 2^62 - 1
pub type VarInt = u64;

/// Maximum value for VarInt (2^62 - 1)
pub const VARINT_MAX: u64 = (1u64 << 62) - 1;

/// VarInt encoding and decoding utilities
pub struct VarIntCodec;

impl VarIntCodec {
    /// Decode a VarInt from a byte slice, returning (value, bytes_consumed)
    ///
    /// Returns None if the buffer is shorter than the length announced by
    /// the tag bits of the first byte.
    pub fn decode(buf: &[u8]) -> Option<(VarInt, usize)> {
        let first = *buf.first()?;
        let len = Self::skip_len(first);
        let bytes = buf.get(..len)?;

        let value = bytes[1..]
            .iter()
            .fold(u64::from(first & 0x3f), |acc, b| (acc << 8) | u64::from(*b));
        Some((value, len))
    }

    /// Number of bytes a VarInt occupies, derived from its first byte alone.
    ///
    /// Nothing past the first byte is inspected. Only use the result for
    /// size estimates, never to index into unchecked memory.
    #[inline]
    pub const fn skip_len(first: u8) -> usize {
        1 << (first >> 6)
    }

    /// Length of the VarInt starting `buf`, or 0 for an empty buffer.
    pub fn skip(buf: &[u8]) -> usize {
        buf.first().map_or(0, |b| Self::skip_len(*b))
    }

    /// Encode a VarInt into a buffer, returning bytes written
    ///
    /// Returns None if value exceeds VARINT_MAX or buffer is too small
    pub fn encode(value: VarInt, buf: &mut [u8]) -> Option<usize> {
        if value > VARINT_MAX {
            return None;
        }

        let len = Self::size(value);
        let out = buf.get_mut(..len)?;
        let be = value.to_be_bytes();
        out.copy_from_slice(&be[8 - len..]);
        out[0] |= match len {
            1 => 0x00,
            2 => 0x40,
            4 => 0x80,
            _ => 0xc0,
        };
        Some(len)
    }

    /// Calculate the encoded size for a given value
    pub fn size(value: VarInt) -> usize {
        if value < 0x40 {
            1
        } else if value < 0x4000 {
            2
        } else if value < 0x4000_0000 {
            4
        } else {
            8
        }
    }
}

// ============================================================================
// Fixed-Width Integers
// ============================================================================

/// Read a `width`-byte big-endian integer from the start of `buf`.
///
/// Widths of 1 to 8 bytes are accepted (the protocol uses 2, 3, 4 and 8).
/// Returns None if `buf` holds fewer than `width` bytes.
pub fn decode_fixed_be(buf: &[u8], width: usize) -> Option<u64> {
    if width == 0 || width > 8 {
        return None;
    }
    let bytes = buf.get(..width)?;
    Some(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

// ============================================================================
// Bounded Span Reader
// ============================================================================

/// Forward-only reader over a byte span.
///
/// Every read proves `position + needed <= span.len()` before touching the
/// data and names the field it was reading on failure. The position never
/// moves past the end of the span.
#[derive(Debug, Clone)]
pub struct SpanReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> SpanReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes read so far
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Unread part of the span, without advancing.
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    /// Read one VarInt.
    pub fn varint(&mut self, field: &'static str) -> Result<VarInt, DecodeError> {
        let (value, len) =
            VarIntCodec::decode(self.rest()).ok_or(DecodeError::truncated(field))?;
        self.pos += len;
        Ok(value)
    }

    pub fn u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        let byte = *self.rest().first().ok_or(DecodeError::truncated(field))?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a `width`-byte big-endian integer.
    pub fn fixed(&mut self, width: usize, field: &'static str) -> Result<u64, DecodeError> {
        let value = decode_fixed_be(self.rest(), width).ok_or(DecodeError::truncated(field))?;
        self.pos += width;
        Ok(value)
    }

    pub fn u16(&mut self, field: &'static str) -> Result<u16, DecodeError> {
        self.fixed(2, field).map(|v| v as u16)
    }

    pub fn u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        self.fixed(4, field).map(|v| v as u32)
    }

    pub fn u64(&mut self, field: &'static str) -> Result<u64, DecodeError> {
        self.fixed(8, field)
    }

    /// Borrow `len` bytes. `len` comes straight off the wire, so it is
    /// compared as u64 before any conversion.
    pub fn bytes(&mut self, len: u64, field: &'static str) -> Result<&'a [u8], DecodeError> {
        if len > self.remaining() as u64 {
            return Err(DecodeError::truncated(field));
        }
        let start = self.pos;
        self.pos += len as usize;
        Ok(&self.buf[start..self.pos])
    }

    /// Borrow a fixed-size array.
    pub fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N as u64, field)?);
        Ok(out)
    }

    /// Consume everything left.
    pub fn take_rest(&mut self) -> &'a [u8] {
        let rest = self.rest();
        self.pos = self.buf.len();
        rest
    }
}

// ============================================================================
// Connection ID (RFC 9000 Section 5.1, RFC 8999 Section 5.3)
// ============================================================================

/// Maximum length of a Connection ID (20 bytes per RFC 9000)
pub const MAX_CID_LENGTH: usize = 20;

/// Connection ID - Version-independent identifier (RFC 8999 Section 5.3)
///
/// Connection IDs are opaque byte sequences chosen by endpoints.
/// Zero-length CIDs are permitted. `Display` renders the bracketed
/// lowercase hex form used in traces, e.g. `<0a0b0c>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ConnectionId {
    bytes: Bytes,
}

impl ConnectionId {
    /// Create from a borrowed slice (copies data)
    ///
    /// Returns None if length exceeds MAX_CID_LENGTH
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() > MAX_CID_LENGTH {
            return None;
        }
        Some(Self {
            bytes: Bytes::copy_from_slice(slice),
        })
    }

    /// Parse a connection ID of `declared_len` bytes from the start of `buf`.
    ///
    /// Returns None when the declared length exceeds MAX_CID_LENGTH or the
    /// bytes available.
    pub fn parse(buf: &[u8], declared_len: usize) -> Option<Self> {
        buf.get(..declared_len).and_then(Self::from_slice)
    }

    /// Access the underlying bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Length of the connection ID
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if this is a zero-length connection ID
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Create an empty (zero-length) connection ID
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({:02x?})", &self.bytes[..])
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", Hex(&self.bytes))
    }
}

// ============================================================================
// Hex Rendering
// ============================================================================

/// Lowercase hex rendering of a byte slice.
pub struct Hex<'a>(pub &'a [u8]);

impl fmt::Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Hex preview of at most `limit` bytes, followed by `...` when elided.
pub struct HexPreview<'a> {
    bytes: &'a [u8],
    limit: usize,
}

impl<'a> HexPreview<'a> {
    pub fn new(bytes: &'a [u8], limit: usize) -> Self {
        Self { bytes, limit }
    }
}

impl fmt::Display for HexPreview<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.bytes[..self.bytes.len().min(self.limit)];
        write!(f, "{}", Hex(shown))?;
        if self.bytes.len() > self.limit {
            f.write_str("...")?;
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
