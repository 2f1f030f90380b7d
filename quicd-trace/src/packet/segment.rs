//! # Segment Trace Assembler
//!
//! Top-level entry points. A segment trace is the header lines, then either
//! an error line, a one-shot decode (version negotiation, retry), or a byte
//! count followed by one line per frame.
//!
//! Header parsing and decryption happen elsewhere. They reach this module
//! either as a ready `PacketHeader` plus `SegmentStatus`, or through the
//! `HeaderParser` trait for callers that only hold raw bytes.

#![forbid(unsafe_code)]

use super::header::format_header;
use super::types::{Direction, PacketHeader, PacketType, SegmentStatus};
use crate::error::Result;
use crate::frames::format::{trace_frames, TOKEN_PREVIEW_LEN};
use crate::sink::TraceWriter;
use crate::types::{decode_fixed_be, ConnectionId, HexPreview, MAX_CID_LENGTH};
use std::io::Write;

/// Packet number width assumed for outgoing segments, before header
/// protection settles the final encoding
pub const OUTGOING_PN_LENGTH: usize = 4;

/// Read-only view of the connection a segment belongs to.
pub trait ConnectionView {
    /// Identifier used as connection tag in traces
    fn log_id(&self) -> u64;

    /// Connection start, in microseconds on the same clock as `current_time`
    fn start_time(&self) -> u64;
}

/// Header parsing collaborator.
///
/// `quiet` asks the parser not to emit its own diagnostics, as it is being
/// called for field extraction only.
pub trait HeaderParser {
    fn parse_header(&self, packet: &[u8], quiet: bool) -> (PacketHeader, SegmentStatus);
}

/// Where a segment trace happens: connection (if known) and current time.
#[derive(Clone, Copy)]
pub struct TraceContext<'c> {
    pub connection: Option<&'c dyn ConnectionView>,
    /// Microseconds, same clock as `ConnectionView::start_time`
    pub current_time: u64,
    /// Prefix the segment's lines with the connection's log id
    pub connection_scoped: bool,
}

impl<'c> TraceContext<'c> {
    /// Context without connection; no elapsed time is printed.
    pub fn detached() -> Self {
        Self {
            connection: None,
            current_time: 0,
            connection_scoped: false,
        }
    }

    pub fn new(connection: &'c dyn ConnectionView, current_time: u64) -> Self {
        Self {
            connection: Some(connection),
            current_time,
            connection_scoped: false,
        }
    }

    /// Tag every line of the segment with the connection's log id.
    pub fn connection_scoped(mut self) -> Self {
        self.connection_scoped = true;
        self
    }

    fn elapsed_us(&self) -> Option<u64> {
        self.connection
            .map(|c| self.current_time.saturating_sub(c.start_time()))
    }
}

/// Trace one received segment.
pub fn trace_segment<W: Write>(
    w: &mut TraceWriter<W>,
    ctx: TraceContext<'_>,
    header: &PacketHeader,
    bytes: &[u8],
    status: SegmentStatus,
) -> Result<()> {
    trace_directed_segment(w, ctx, Direction::Receiving, header, bytes, status)
}

/// Parse a raw segment through `parser` and trace it as received.
pub fn trace_raw_segment<W: Write, P: HeaderParser + ?Sized>(
    w: &mut TraceWriter<W>,
    ctx: TraceContext<'_>,
    parser: &P,
    bytes: &[u8],
) -> Result<()> {
    let (header, status) = parser.parse_header(bytes, true);
    trace_segment(w, ctx, &header, bytes, status)
}

/// Trace one outgoing segment, logged before its final layout is known.
///
/// The packet number becomes `sequence`. The payload is assumed to start
/// after a 4-byte packet number (except for retry) and to end before the
/// `checksum_length`-byte authentication tag (except for version
/// negotiation).
pub fn trace_outgoing_segment<W: Write>(
    w: &mut TraceWriter<W>,
    ctx: TraceContext<'_>,
    header: &PacketHeader,
    sequence: u64,
    checksum_length: usize,
    bytes: &[u8],
    status: SegmentStatus,
) -> Result<()> {
    let header = outgoing_header(header, sequence, checksum_length);
    trace_directed_segment(w, ctx, Direction::Sending, &header, bytes, status)
}

/// Parse an outgoing segment through `parser` for its fields only, then
/// trace it as `trace_outgoing_segment` does.
pub fn trace_outgoing_raw_segment<W: Write, P: HeaderParser + ?Sized>(
    w: &mut TraceWriter<W>,
    ctx: TraceContext<'_>,
    parser: &P,
    sequence: u64,
    checksum_length: usize,
    bytes: &[u8],
) -> Result<()> {
    let (header, status) = parser.parse_header(bytes, true);
    trace_outgoing_segment(w, ctx, &header, sequence, checksum_length, bytes, status)
}

/// Rebuild the header of an outgoing segment.
pub fn outgoing_header(
    header: &PacketHeader,
    sequence: u64,
    checksum_length: usize,
) -> PacketHeader {
    let mut out = header.clone();
    out.pn64 = sequence;
    out.pn = sequence as u32;
    if out.packet_type != PacketType::Retry && out.pn_offset != 0 {
        out.offset = out.pn_offset + OUTGOING_PN_LENGTH;
        out.payload_length = out.payload_length.saturating_sub(OUTGOING_PN_LENGTH);
    }
    if out.packet_type != PacketType::VersionNegotiation {
        out.payload_length = out.payload_length.saturating_sub(checksum_length);
    }
    out
}

fn trace_directed_segment<W: Write>(
    w: &mut TraceWriter<W>,
    ctx: TraceContext<'_>,
    direction: Direction,
    header: &PacketHeader,
    bytes: &[u8],
    status: SegmentStatus,
) -> Result<()> {
    let scoped_tag = ctx
        .connection
        .filter(|_| ctx.connection_scoped)
        .map(|c| c.log_id());
    let Some(tag) = scoped_tag else {
        return trace_segment_lines(w, ctx, direction, header, bytes, status);
    };

    let previous = w.connection_tag();
    w.set_connection_tag(Some(tag));
    let result = trace_segment_lines(w, ctx, direction, header, bytes, status);
    w.set_connection_tag(previous);
    result
}

fn trace_segment_lines<W: Write>(
    w: &mut TraceWriter<W>,
    ctx: TraceContext<'_>,
    direction: Direction,
    header: &PacketHeader,
    bytes: &[u8],
    status: SegmentStatus,
) -> Result<()> {
    format_header(w, direction, header, ctx.elapsed_us())?;

    match status {
        SegmentStatus::Ok => {}
        SegmentStatus::StatelessReset => {
            w.line(format_args!("    Stateless reset."))?;
            return Ok(());
        }
        SegmentStatus::Failed(code) => {
            tracing::debug!(code, "segment failed header parsing or decryption");
            w.line(format_args!("    Header or encryption error: {:x}.", code))?;
            return Ok(());
        }
    }

    let tail: &[u8] = match bytes.get(header.offset..) {
        Some(tail) => tail,
        None => {
            tracing::debug!(
                offset = header.offset,
                available = bytes.len(),
                "payload offset past end of segment"
            );
            w.line(format_args!(
                "    Malformed segment: payload offset {}, {} bytes available",
                header.offset,
                bytes.len()
            ))?;
            &[]
        }
    };

    if !header.packet_type.carries_frames() {
        return match header.packet_type {
            PacketType::Retry => trace_retry(w, tail),
            _ => trace_version_list(w, tail),
        };
    }

    let payload = match tail.get(..header.payload_length) {
        Some(payload) => payload,
        None => {
            tracing::debug!(
                declared = header.payload_length,
                available = tail.len(),
                "payload length exceeds segment"
            );
            w.line(format_args!(
                "    Malformed segment: payload length {}, {} bytes available",
                header.payload_length,
                tail.len()
            ))?;
            tail
        }
    };
    let verb = match direction {
        Direction::Receiving => "Decrypted",
        Direction::Sending => "Prepared",
    };
    w.line(format_args!("    {} {} bytes", verb, payload.len()))?;
    trace_frames(w, payload)?;
    Ok(())
}

/// Version negotiation payload: a list of 4-byte versions.
fn trace_version_list<W: Write>(w: &mut TraceWriter<W>, payload: &[u8]) -> Result<()> {
    let chunks = payload.chunks_exact(4);
    let trailing = chunks.remainder().len();
    let versions: Vec<String> = chunks
        .filter_map(|c| decode_fixed_be(c, 4))
        .map(|v| format!("{:08x}", v))
        .collect();

    if versions.is_empty() {
        w.line(format_args!("    versions: none"))?;
    } else {
        w.line(format_args!("    versions: {}", versions.join(", ")))?;
    }
    if trailing != 0 {
        w.line(format_args!("    Malformed version list, {} trailing bytes", trailing))?;
    }
    Ok(())
}

/// Retry payload: one-byte original destination CID length, the CID, then
/// the token.
fn trace_retry<W: Write>(w: &mut TraceWriter<W>, payload: &[u8]) -> Result<()> {
    let Some((&odcil, rest)) = payload.split_first() else {
        w.line(format_args!("    Malformed retry: truncated odcid length"))?;
        return Ok(());
    };
    let odcil = usize::from(odcil);
    if odcil > MAX_CID_LENGTH {
        w.line(format_args!("    Malformed retry: odcid length {}", odcil))?;
        return Ok(());
    }
    let Some(odcid) = ConnectionId::parse(rest, odcil) else {
        w.line(format_args!("    Malformed retry: truncated odcid, {} bytes", rest.len()))?;
        return Ok(());
    };
    let token = &rest[odcil..];
    w.line(format_args!(
        "    ODCIL: {}, {}, Token length: {}: {}",
        odcil,
        odcid,
        token.len(),
        HexPreview::new(token, TOKEN_PREVIEW_LEN)
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Conn;

    impl ConnectionView for Conn {
        fn log_id(&self) -> u64 {
            0x77
        }

        fn start_time(&self) -> u64 {
            1_000
        }
    }

    fn trace(header: &PacketHeader, bytes: &[u8], status: SegmentStatus) -> String {
        let mut w = TraceWriter::new(Vec::new());
        trace_segment(&mut w, TraceContext::detached(), header, bytes, status).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_stateless_reset_stops() {
        let header = PacketHeader::new(PacketType::OneRtt);
        let out = trace(&header, &[0x01], SegmentStatus::StatelessReset);
        assert!(out.ends_with("    Stateless reset.\n"));
        assert_eq!(out.lines().count(), 3);
    }

    #[test]
    fn test_failure_code_in_hex() {
        let header = PacketHeader::new(PacketType::Handshake);
        let out = trace(&header, &[], SegmentStatus::Failed(0x401));
        assert!(out.ends_with("    Header or encryption error: 401.\n"));
    }

    #[test]
    fn test_frames_follow_byte_count() {
        let mut header = PacketHeader::new(PacketType::OneRtt);
        header.offset = 2;
        header.payload_length = 3;
        let bytes = [0x40, 0x00, 0x01, 0x00, 0x00, 0xee];
        let out = trace(&header, &bytes, SegmentStatus::Ok);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[2], "    Decrypted 3 bytes");
        assert_eq!(lines[3], "    ping");
        assert_eq!(lines[4], "    padding, 2 bytes");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_declared_length_past_segment_is_reported() {
        let mut header = PacketHeader::new(PacketType::OneRtt);
        header.offset = 1;
        header.payload_length = 50;
        let out = trace(&header, &[0x40, 0x01], SegmentStatus::Ok);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines[2],
            "    Malformed segment: payload length 50, 1 bytes available"
        );
        assert_eq!(lines[3], "    Decrypted 1 bytes");
        assert_eq!(lines[4], "    ping");
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn test_offset_past_segment_is_reported() {
        let mut header = PacketHeader::new(PacketType::Handshake);
        header.offset = 9;
        let out = trace(&header, &[0xe0, 0x00], SegmentStatus::Ok);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(
            lines[2],
            "    Malformed segment: payload offset 9, 2 bytes available"
        );
        assert_eq!(lines[3], "    Decrypted 0 bytes");
        assert_eq!(lines.len(), 4);
    }

    #[test]
    fn test_version_list() {
        let mut header = PacketHeader::new(PacketType::VersionNegotiation);
        header.offset = 1;
        let bytes = [0xff, 0x00, 0x00, 0x00, 0x01, 0xff, 0x00, 0x00, 0x1d];
        let out = trace(&header, &bytes, SegmentStatus::Ok);
        assert!(out.ends_with("    versions: 00000001, ff00001d\n"));
    }

    #[test]
    fn test_retry_decode() {
        let mut header = PacketHeader::new(PacketType::Retry);
        header.offset = 0;
        let bytes = [0x02, 0xab, 0xcd, 0x01, 0x02, 0x03];
        let out = trace(&header, &bytes, SegmentStatus::Ok);
        assert!(out.ends_with("    ODCIL: 2, <abcd>, Token length: 3: 010203\n"));
    }

    #[test]
    fn test_retry_truncated_odcid() {
        let header = PacketHeader::new(PacketType::Retry);
        let out = trace(&header, &[0x08, 0x01], SegmentStatus::Ok);
        assert!(out.ends_with("    Malformed retry: truncated odcid, 1 bytes\n"));
    }

    #[test]
    fn test_outgoing_header_reconstruction() {
        let mut header = PacketHeader::new(PacketType::Initial);
        header.pn_offset = 18;
        header.offset = 19;
        header.payload_length = 100;
        let out = outgoing_header(&header, 0x1_0000_0005, 16);
        assert_eq!(out.pn64, 0x1_0000_0005);
        assert_eq!(out.pn, 5);
        assert_eq!(out.offset, 22);
        assert_eq!(out.payload_length, 80);
    }

    #[test]
    fn test_outgoing_header_saturates() {
        let mut header = PacketHeader::new(PacketType::OneRtt);
        header.pn_offset = 9;
        header.payload_length = 10;
        assert_eq!(outgoing_header(&header, 1, 16).payload_length, 0);

        let mut retry = PacketHeader::new(PacketType::Retry);
        retry.pn_offset = 9;
        retry.offset = 30;
        retry.payload_length = 40;
        let out = outgoing_header(&retry, 1, 16);
        assert_eq!(out.offset, 30);
        assert_eq!(out.payload_length, 24);

        let mut vn = PacketHeader::new(PacketType::VersionNegotiation);
        vn.payload_length = 8;
        assert_eq!(outgoing_header(&vn, 0, 16).payload_length, 8);
    }

    #[test]
    fn test_outgoing_trace_with_elapsed() {
        let mut header = PacketHeader::new(PacketType::OneRtt);
        header.pn_offset = 1;
        header.payload_length = 4 + 1 + 16;
        let mut bytes = vec![0x40, 0, 0, 0, 0, 0x01];
        bytes.extend_from_slice(&[0u8; 16]);
        let conn = Conn;
        let mut w = TraceWriter::new(Vec::new());
        trace_outgoing_segment(
            &mut w,
            TraceContext::new(&conn, 3_500),
            &header,
            7,
            16,
            &bytes,
            SegmentStatus::Ok,
        )
        .unwrap();
        let out = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Sending packet type: 1rtt protected, t=2500us");
        assert_eq!(lines[1], "    <>, Seq: 7 (7), Phi: 0, S0");
        assert_eq!(lines[2], "    Prepared 1 bytes");
        assert_eq!(lines[3], "    ping");
    }

    #[test]
    fn test_connection_scoped_tag_is_restored() {
        let conn = Conn;
        let header = PacketHeader::new(PacketType::OneRtt);
        let mut w = TraceWriter::new(Vec::new()).with_connection_tag(1);
        trace_segment(
            &mut w,
            TraceContext::new(&conn, 1_000).connection_scoped(),
            &header,
            &[],
            SegmentStatus::StatelessReset,
        )
        .unwrap();
        assert_eq!(w.connection_tag(), Some(1));
        let out = String::from_utf8(w.into_inner()).unwrap();
        assert!(out.lines().all(|l| l.starts_with("0000000000000077: ")));
        assert!(out.starts_with("0000000000000077: Receiving packet type: 1rtt protected, t=0us\n"));
    }

    #[test]
    fn test_raw_segment_parses_quietly() {
        use std::cell::Cell;

        struct Parser {
            saw_quiet: Cell<bool>,
        }

        impl HeaderParser for Parser {
            fn parse_header(&self, packet: &[u8], quiet: bool) -> (PacketHeader, SegmentStatus) {
                self.saw_quiet.set(quiet);
                let mut header = PacketHeader::new(PacketType::OneRtt);
                header.offset = 1;
                header.payload_length = packet.len() - 1;
                (header, SegmentStatus::Ok)
            }
        }

        let parser = Parser {
            saw_quiet: Cell::new(false),
        };
        let mut w = TraceWriter::new(Vec::new());
        trace_raw_segment(&mut w, TraceContext::detached(), &parser, &[0x40, 0x1e]).unwrap();
        assert!(parser.saw_quiet.get());
        let out = String::from_utf8(w.into_inner()).unwrap();
        assert!(out.ends_with("    HANDSHAKE_DONE\n"));
    }

    #[test]
    fn test_outgoing_raw_segment_parses_quietly() {
        use std::cell::Cell;

        struct Parser {
            calls: Cell<u32>,
        }

        impl HeaderParser for Parser {
            fn parse_header(&self, packet: &[u8], quiet: bool) -> (PacketHeader, SegmentStatus) {
                assert!(quiet);
                self.calls.set(self.calls.get() + 1);
                let mut header = PacketHeader::new(PacketType::OneRtt);
                header.pn_offset = 1;
                header.payload_length = packet.len() - 1;
                (header, SegmentStatus::Ok)
            }
        }

        let parser = Parser {
            calls: Cell::new(0),
        };
        // short header byte, 4-byte packet number, HANDSHAKE_DONE, 16-byte tag
        let mut bytes = vec![0x40, 0, 0, 0, 9, 0x1e];
        bytes.extend_from_slice(&[0xaa; 16]);
        let mut w = TraceWriter::new(Vec::new());
        trace_outgoing_raw_segment(&mut w, TraceContext::detached(), &parser, 9, 16, &bytes)
            .unwrap();
        assert_eq!(parser.calls.get(), 1);
        let out = String::from_utf8(w.into_inner()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines[0], "Sending packet type: 1rtt protected");
        assert_eq!(lines[1], "    <>, Seq: 9 (9), Phi: 0, S0");
        assert_eq!(lines[2], "    Prepared 1 bytes");
        assert_eq!(lines[3], "    HANDSHAKE_DONE");
        assert_eq!(lines.len(), 4);
    }
}
