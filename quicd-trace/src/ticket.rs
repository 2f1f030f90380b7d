//! # Session Resumption Tickets
//!
//! Two nested fixed-grammar records. The outer resumption ticket wraps the
//! TLS session ticket as issued in a NewSessionTicket message (RFC 8446
//! Section 4.6.1), which carries its own extension list.
//!
//! Resumption ticket layout (big-endian):
//!
//! ```text
//! ticket_time (8) | kx_id (2) | suite_id (2) |
//! tls_ticket_length (2) | tls_ticket (..) |
//! secret_length (1) | resumption_secret (..)
//! ```
//!
//! Handshake ticket layout:
//!
//! ```text
//! lifetime (4) | age_add (4) | nonce_length (1) | nonce (..) |
//! ticket_length (2) | ticket (..) | extensions_length (2) | extensions (..)
//! ```
//!
//! The running minimum length is re-verified after every length field, so
//! a length is never trusted before the bytes it announces are known to
//! exist.

#![forbid(unsafe_code)]

use crate::error::{DecodeError, Result};
use crate::sink::TraceWriter;
use crate::types::{Hex, HexPreview, SpanReader};
use core::fmt;
use std::io::Write;

/// Smallest valid resumption ticket: every length field present, all zero
pub const RESUMPTION_TICKET_MIN_LEN: usize = 8 + 2 + 2 + 2 + 1;

/// Smallest valid handshake ticket
pub const HANDSHAKE_TICKET_MIN_LEN: usize = 4 + 4 + 1 + 2 + 2;

/// TLS early_data extension (RFC 8446 Section 4.2.10)
pub const EXTENSION_EARLY_DATA: u16 = 0x002a;

/// Bytes of opaque ticket values shown in traces
const TICKET_PREVIEW_LEN: usize = 16;

fn ensure_len(total: usize, min: usize, field: &'static str) -> core::result::Result<(), DecodeError> {
    if total < min {
        Err(DecodeError::truncated(field))
    } else {
        Ok(())
    }
}

// ============================================================================
// Resumption Ticket
// ============================================================================

/// Outer resumption ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumptionTicket<'a> {
    /// Issue time, microseconds
    pub ticket_time: u64,
    pub kx_id: u16,
    pub suite_id: u16,
    pub tls_ticket: &'a [u8],
    pub resumption_secret: &'a [u8],
}

impl<'a> ResumptionTicket<'a> {
    pub fn decode(buf: &'a [u8]) -> core::result::Result<Self, DecodeError> {
        let mut min = RESUMPTION_TICKET_MIN_LEN;
        ensure_len(buf.len(), min, "resumption ticket")?;

        let mut r = SpanReader::new(buf);
        let ticket_time = r.u64("ticket time")?;
        let kx_id = r.u16("key exchange id")?;
        let suite_id = r.u16("cipher suite id")?;

        let tls_ticket_length = r.u16("tls ticket length")?;
        min += usize::from(tls_ticket_length);
        ensure_len(buf.len(), min, "tls ticket")?;
        let tls_ticket = r.bytes(u64::from(tls_ticket_length), "tls ticket")?;

        let secret_length = r.u8("secret length")?;
        min += usize::from(secret_length);
        ensure_len(buf.len(), min, "resumption secret")?;
        let resumption_secret = r.bytes(u64::from(secret_length), "resumption secret")?;

        Ok(Self {
            ticket_time,
            kx_id,
            suite_id,
            tls_ticket,
            resumption_secret,
        })
    }

    /// Decode the wrapped handshake ticket.
    pub fn handshake_ticket(&self) -> core::result::Result<HandshakeTicket<'a>, DecodeError> {
        HandshakeTicket::decode(self.tls_ticket)
    }
}

impl fmt::Display for ResumptionTicket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Resumption ticket, time {}, kx 0x{:04x}, suite 0x{:04x}, ticket length {}, secret length {}",
            self.ticket_time,
            self.kx_id,
            self.suite_id,
            self.tls_ticket.len(),
            self.resumption_secret.len()
        )
    }
}

// ============================================================================
// Handshake Ticket
// ============================================================================

/// Inner handshake ticket (NewSessionTicket body)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeTicket<'a> {
    /// Seconds
    pub lifetime: u32,
    pub age_add: u32,
    pub nonce: &'a [u8],
    pub ticket: &'a [u8],
    /// Raw extension list, walked by `extensions()`
    pub extensions: &'a [u8],
}

impl<'a> HandshakeTicket<'a> {
    pub fn decode(buf: &'a [u8]) -> core::result::Result<Self, DecodeError> {
        let mut min = HANDSHAKE_TICKET_MIN_LEN;
        ensure_len(buf.len(), min, "handshake ticket")?;

        let mut r = SpanReader::new(buf);
        let lifetime = r.u32("ticket lifetime")?;
        let age_add = r.u32("ticket age add")?;

        let nonce_length = r.u8("nonce length")?;
        min += usize::from(nonce_length);
        ensure_len(buf.len(), min, "nonce")?;
        let nonce = r.bytes(u64::from(nonce_length), "nonce")?;

        let ticket_length = r.u16("ticket length")?;
        min += usize::from(ticket_length);
        ensure_len(buf.len(), min, "ticket")?;
        let ticket = r.bytes(u64::from(ticket_length), "ticket")?;

        let extensions_length = r.u16("extensions length")?;
        min += usize::from(extensions_length);
        ensure_len(buf.len(), min, "extensions")?;
        let extensions = r.bytes(u64::from(extensions_length), "extensions")?;

        Ok(Self {
            lifetime,
            age_add,
            nonce,
            ticket,
            extensions,
        })
    }

    pub fn extensions(&self) -> TicketExtensionIter<'a> {
        TicketExtensionIter {
            reader: SpanReader::new(self.extensions),
            failed: false,
        }
    }
}

impl fmt::Display for HandshakeTicket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handshake ticket, lifetime {}, age_add 0x{:08x}, nonce length {}, ticket length {}, extensions length {}",
            self.lifetime,
            self.age_add,
            self.nonce.len(),
            self.ticket.len(),
            self.extensions.len()
        )
    }
}

/// One TLS extension (type, length, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketExtension<'a> {
    pub ext_type: u16,
    pub data: &'a [u8],
}

impl fmt::Display for TicketExtension<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ext_type == EXTENSION_EARLY_DATA {
            return match crate::types::decode_fixed_be(self.data, 4) {
                Some(max) if self.data.len() == 4 => {
                    write!(f, "early_data, max_early_data_size: {}", max)
                }
                _ => write!(f, "early_data, malformed length {}", self.data.len()),
            };
        }
        write!(
            f,
            "Extension 0x{:04x}, length {}: {}",
            self.ext_type,
            self.data.len(),
            HexPreview::new(self.data, TICKET_PREVIEW_LEN)
        )
    }
}

/// Walks a TLS extension list. Yields one error and stops on truncation.
#[derive(Debug, Clone)]
pub struct TicketExtensionIter<'a> {
    reader: SpanReader<'a>,
    failed: bool,
}

impl<'a> TicketExtensionIter<'a> {
    fn read_one(&mut self) -> core::result::Result<TicketExtension<'a>, DecodeError> {
        let ext_type = self.reader.u16("extension type")?;
        let length = self.reader.u16("extension length")?;
        let data = self.reader.bytes(u64::from(length), "extension value")?;
        Ok(TicketExtension { ext_type, data })
    }
}

impl<'a> Iterator for TicketExtensionIter<'a> {
    type Item = core::result::Result<TicketExtension<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.reader.is_empty() {
            return None;
        }
        let item = self.read_one();
        self.failed = item.is_err();
        Some(item)
    }
}

// ============================================================================
// Trace
// ============================================================================

/// Trace a resumption ticket and the handshake ticket it carries.
pub fn trace_ticket<W: Write>(w: &mut TraceWriter<W>, blob: &[u8]) -> Result<()> {
    let outer = match ResumptionTicket::decode(blob) {
        Ok(outer) => outer,
        Err(err) => {
            tracing::debug!(error = %err, len = blob.len(), "malformed resumption ticket");
            w.line(format_args!(
                "Malformed resumption ticket: {}, {} bytes",
                err,
                blob.len()
            ))?;
            return Ok(());
        }
    };
    w.line(format_args!("{}", outer))?;
    w.line(format_args!(
        "    resumption secret: {}",
        Hex(outer.resumption_secret)
    ))?;

    let inner = match outer.handshake_ticket() {
        Ok(inner) => inner,
        Err(err) => {
            tracing::debug!(error = %err, len = outer.tls_ticket.len(), "malformed handshake ticket");
            w.line(format_args!(
                "    Malformed handshake ticket: {}, {} bytes",
                err,
                outer.tls_ticket.len()
            ))?;
            return Ok(());
        }
    };
    w.line(format_args!("    {}", inner))?;
    w.line(format_args!("    nonce: {}", Hex(inner.nonce)))?;
    w.line(format_args!(
        "    ticket: {}",
        HexPreview::new(inner.ticket, TICKET_PREVIEW_LEN)
    ))?;
    for ext in inner.extensions() {
        match ext {
            Ok(ext) => w.line(format_args!("        {}", ext))?,
            Err(err) => {
                tracing::debug!(error = %err, "malformed ticket extension");
                w.line(format_args!("        Malformed extension: {}", err))?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Handshake ticket with the given extension bytes.
    fn handshake_ticket(extensions: &[u8]) -> Vec<u8> {
        let mut t = Vec::new();
        t.extend_from_slice(&7200u32.to_be_bytes());
        t.extend_from_slice(&0x0102_0304u32.to_be_bytes());
        t.push(2);
        t.extend_from_slice(&[0xaa, 0xbb]);
        t.extend_from_slice(&3u16.to_be_bytes());
        t.extend_from_slice(&[1, 2, 3]);
        t.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        t.extend_from_slice(extensions);
        t
    }

    fn resumption_ticket(inner: &[u8]) -> Vec<u8> {
        let mut t = Vec::new();
        t.extend_from_slice(&1_000_000u64.to_be_bytes());
        t.extend_from_slice(&0x0017u16.to_be_bytes());
        t.extend_from_slice(&0x1301u16.to_be_bytes());
        t.extend_from_slice(&(inner.len() as u16).to_be_bytes());
        t.extend_from_slice(inner);
        t.push(4);
        t.extend_from_slice(&[9, 9, 9, 9]);
        t
    }

    mod resumption_ticket_tests {
        use super::*;

        #[test]
        fn test_decode_fields() {
            let blob = resumption_ticket(&handshake_ticket(&[]));
            let outer = ResumptionTicket::decode(&blob).unwrap();
            assert_eq!(outer.ticket_time, 1_000_000);
            assert_eq!(outer.kx_id, 0x17);
            assert_eq!(outer.suite_id, 0x1301);
            assert_eq!(outer.tls_ticket.len(), 18);
            assert_eq!(outer.resumption_secret, &[9, 9, 9, 9]);
        }

        #[test]
        fn test_below_minimum() {
            assert_eq!(
                ResumptionTicket::decode(&[0u8; 14]),
                Err(DecodeError::truncated("resumption ticket"))
            );
        }

        #[test]
        fn test_ticket_length_past_end() {
            let mut blob = resumption_ticket(&handshake_ticket(&[]));
            // declare more than the 23 bytes that follow
            blob[12..14].copy_from_slice(&(19u16 + 5).to_be_bytes());
            assert_eq!(
                ResumptionTicket::decode(&blob),
                Err(DecodeError::truncated("tls ticket"))
            );
        }

        #[test]
        fn test_secret_length_past_end() {
            let mut blob = resumption_ticket(&handshake_ticket(&[]));
            blob.pop();
            assert_eq!(
                ResumptionTicket::decode(&blob),
                Err(DecodeError::truncated("resumption secret"))
            );
        }
    }

    mod handshake_ticket_tests {
        use super::*;

        #[test]
        fn test_decode_without_extensions() {
            let blob = handshake_ticket(&[]);
            let inner = HandshakeTicket::decode(&blob).unwrap();
            assert_eq!(inner.lifetime, 7200);
            assert_eq!(inner.age_add, 0x0102_0304);
            assert_eq!(inner.nonce, &[0xaa, 0xbb]);
            assert_eq!(inner.ticket, &[1, 2, 3]);
            assert_eq!(inner.extensions().count(), 0);
        }

        #[test]
        fn test_early_data_extension() {
            let ext = [0x00, 0x2a, 0x00, 0x04, 0x00, 0x00, 0x40, 0x00];
            let blob = handshake_ticket(&ext);
            let inner = HandshakeTicket::decode(&blob).unwrap();
            let exts: Vec<_> = inner.extensions().collect();
            assert_eq!(exts.len(), 1);
            let ext = exts[0].unwrap();
            assert_eq!(ext.ext_type, EXTENSION_EARLY_DATA);
            assert_eq!(ext.to_string(), "early_data, max_early_data_size: 16384");
        }

        #[test]
        fn test_generic_extension() {
            let ext = TicketExtension {
                ext_type: 0x0010,
                data: &[0xde, 0xad],
            };
            assert_eq!(ext.to_string(), "Extension 0x0010, length 2: dead");
        }

        #[test]
        fn test_truncated_extension_entry() {
            let blob = handshake_ticket(&[0x00, 0x2a, 0x00, 0x04, 0x00]);
            let inner = HandshakeTicket::decode(&blob).unwrap();
            let exts: Vec<_> = inner.extensions().collect();
            assert_eq!(exts, vec![Err(DecodeError::truncated("extension value"))]);
        }

        #[test]
        fn test_nonce_length_past_end() {
            let mut blob = handshake_ticket(&[]);
            blob[8] = 200;
            assert_eq!(
                HandshakeTicket::decode(&blob),
                Err(DecodeError::truncated("nonce"))
            );
        }
    }

    #[test]
    fn test_trace_nested() {
        let blob = resumption_ticket(&handshake_ticket(&[]));
        let mut w = TraceWriter::new(Vec::new());
        trace_ticket(&mut w, &blob).unwrap();
        let out = String::from_utf8(w.into_inner()).unwrap();
        assert_eq!(
            out,
            "Resumption ticket, time 1000000, kx 0x0017, suite 0x1301, ticket length 18, secret length 4\n\
             \x20   resumption secret: 09090909\n\
             \x20   Handshake ticket, lifetime 7200, age_add 0x01020304, nonce length 2, ticket length 3, extensions length 0\n\
             \x20   nonce: aabb\n\
             \x20   ticket: 010203\n"
        );
        assert!(!out.contains("Malformed"));
    }

    #[test]
    fn test_trace_malformed_outer() {
        let mut w = TraceWriter::new(Vec::new());
        trace_ticket(&mut w, &[0u8; 3]).unwrap();
        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "Malformed resumption ticket: truncated resumption ticket, 3 bytes\n"
        );
    }
}
