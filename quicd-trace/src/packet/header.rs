//! # Header Formatter
//!
//! Renders a resolved `PacketHeader` as two lines: the direction and type,
//! then the fields that exist for that packet category.

#![forbid(unsafe_code)]

use super::types::{Direction, PacketHeader, PacketType};
use crate::error::Result;
use crate::sink::TraceWriter;
use std::io::Write;

/// Write the header lines for one segment.
///
/// `elapsed_us` is appended to the first line when known. Output depends
/// only on the arguments and the writer's connection tag.
pub fn format_header<W: Write>(
    w: &mut TraceWriter<W>,
    direction: Direction,
    header: &PacketHeader,
    elapsed_us: Option<u64>,
) -> Result<()> {
    match elapsed_us {
        Some(t) => w.line(format_args!(
            "{} packet type: {}, t={}us",
            direction.as_str(),
            header.packet_type,
            t
        ))?,
        None => w.line(format_args!(
            "{} packet type: {}",
            direction.as_str(),
            header.packet_type
        ))?,
    }

    if !header.packet_type.is_long_header() {
        w.line(format_args!(
            "    {}, Seq: {} ({}), Phi: {}, S{}",
            header.dcid,
            header.pn,
            header.pn64,
            u8::from(header.key_phase),
            u8::from(header.spin)
        ))?;
    } else if header.packet_type == PacketType::VersionNegotiation {
        // no packet number in this category
        w.line(format_args!("    {}, {}", header.dcid, header.scid))?;
    } else {
        w.line(format_args!(
            "    Version {:x}, {}, {}, Seq: {}, pl: {}",
            header.version, header.dcid, header.scid, header.pn, header.payload_length
        ))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionId;

    fn render(header: &PacketHeader, tag: Option<u64>) -> String {
        let mut w = TraceWriter::new(Vec::new());
        w.set_connection_tag(tag);
        format_header(&mut w, Direction::Receiving, header, None).unwrap();
        String::from_utf8(w.into_inner()).unwrap()
    }

    #[test]
    fn test_short_header() {
        let mut header = PacketHeader::new(PacketType::OneRtt);
        header.dcid = ConnectionId::from_slice(&[0xaa, 0xbb]).unwrap();
        header.pn = 0x1234;
        header.pn64 = 0x11234;
        header.spin = true;
        assert_eq!(
            render(&header, None),
            "Receiving packet type: 1rtt protected\n    <aabb>, Seq: 4660 (70196), Phi: 0, S1\n"
        );
    }

    #[test]
    fn test_version_negotiation_has_no_sequence() {
        let mut header = PacketHeader::new(PacketType::VersionNegotiation);
        header.dcid = ConnectionId::from_slice(&[0x01]).unwrap();
        header.scid = ConnectionId::from_slice(&[0x02]).unwrap();
        let out = render(&header, None);
        assert!(out.ends_with("    <01>, <02>\n"));
        assert!(!out.contains("Seq"));
    }

    #[test]
    fn test_long_header_with_elapsed() {
        let mut header = PacketHeader::new(PacketType::Initial);
        header.version = 0xff00001d;
        header.pn = 3;
        header.payload_length = 45;
        let mut w = TraceWriter::new(Vec::new());
        format_header(&mut w, Direction::Sending, &header, Some(1500)).unwrap();
        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "Sending packet type: initial, t=1500us\n    Version ff00001d, <>, <>, Seq: 3, pl: 45\n"
        );
    }

    #[test]
    fn test_every_long_type_carries_version() {
        for packet_type in [
            PacketType::Initial,
            PacketType::ZeroRtt,
            PacketType::Handshake,
            PacketType::Retry,
        ] {
            let mut header = PacketHeader::new(packet_type);
            header.pn = 7;
            let out = render(&header, None);
            assert!(out.ends_with("    Version 1, <>, <>, Seq: 7, pl: 0\n"), "{}", out);
        }
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let mut header = PacketHeader::new(PacketType::Handshake);
        header.dcid = ConnectionId::from_slice(&[9; 8]).unwrap();
        for tag in [None, Some(0x42)] {
            assert_eq!(render(&header, tag), render(&header, tag));
        }
        assert!(render(&header, Some(0x42)).starts_with("0000000000000042: Receiving"));
    }
}
