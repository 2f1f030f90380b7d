//! End-to-End Trace Tests
//!
//! Full segment traces through the public entry points:
//! - header, byte count and frame lines of a received segment
//! - ACK range reconstruction and padding run length
//! - nested resumption ticket decode
//! - byte-identical output for repeated header formatting

use quicd_trace::frames::types::{AckRange, Frame};
use quicd_trace::packet::format_header;
use quicd_trace::{
    trace_segment, trace_ticket, ConnectionId, ConnectionView, Direction, FrameStream,
    HandshakeTicket, PacketHeader, PacketType, ResumptionTicket, SegmentStatus, TraceContext,
    TraceWriter,
};

struct Conn {
    id: u64,
    start: u64,
}

impl ConnectionView for Conn {
    fn log_id(&self) -> u64 {
        self.id
    }

    fn start_time(&self) -> u64 {
        self.start
    }
}

fn initial_header(payload_length: usize) -> PacketHeader {
    let mut header = PacketHeader::new(PacketType::Initial);
    header.version = 0xff00001d;
    header.dcid = ConnectionId::from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    header.scid = ConnectionId::from_slice(&[0x0a, 0x0b]).unwrap();
    header.pn = 3;
    header.pn64 = 3;
    header.offset = 4;
    header.pn_offset = 3;
    header.payload_length = payload_length;
    header
}

#[test]
fn test_received_segment_trace() {
    let mut payload = vec![0x02, 0x0a, 0x00, 0x01, 0x02, 0x00, 0x01];
    payload.extend_from_slice(&[0x0f, 0x04, 0x00, 0x03, b'a', b'b', b'c']);
    payload.extend_from_slice(&[0u8; 16]);
    payload.extend_from_slice(&[0x06, 0x00, 0x09, 0x01, 0x02, 0x03, 0x04]);

    let mut segment = vec![0xc0, 0x00, 0x00, 0x03];
    segment.extend_from_slice(&payload);
    // authentication tag, outside the payload
    segment.extend_from_slice(&[0xff; 16]);

    let conn = Conn { id: 0x1234, start: 10_000 };
    let mut w = TraceWriter::new(Vec::new());
    trace_segment(
        &mut w,
        TraceContext::new(&conn, 11_500),
        &initial_header(payload.len()),
        &segment,
        SegmentStatus::Ok,
    )
    .unwrap();

    let out = String::from_utf8(w.into_inner()).unwrap();
    assert_eq!(
        out,
        "Receiving packet type: initial, t=1500us\n\
         \x20   Version ff00001d, <0102030405060708>, <0a0b>, Seq: 3, pl: 37\n\
         \x20   Decrypted 37 bytes\n\
         \x20   ACK (nb=1), 8-10, 5-6\n\
         \x20   Stream 4, offset 0, length 3, fin = 1: 616263\n\
         \x20   padding, 16 bytes\n\
         \x20   Malformed CRYPTO frame: truncated data, 7 bytes\n"
    );
}

#[test]
fn test_connection_scoped_segment_trace() {
    let conn = Conn { id: 0x1234, start: 0 };
    let mut w = TraceWriter::new(Vec::new());
    trace_segment(
        &mut w,
        TraceContext::new(&conn, 5).connection_scoped(),
        &initial_header(0),
        &[0xc0, 0, 0, 3],
        SegmentStatus::Failed(0x40b),
    )
    .unwrap();
    let out = String::from_utf8(w.into_inner()).unwrap();
    let lines: Vec<_> = out.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "0000000000001234:     Header or encryption error: 40b.");
}

#[test]
fn test_ack_reconstruction_exact_ranges() {
    // largest 10, one extra block, first range 2 (3 packets), gap 0, range 1
    let payload = [0x02, 0x0a, 0x00, 0x01, 0x02, 0x00, 0x01];
    let records: Vec<_> = FrameStream::new(&payload).collect();
    assert_eq!(records.len(), 1);
    match &records[0].body {
        Ok(Frame::Ack(ack)) => {
            assert_eq!(ack.largest_acked, 10);
            assert_eq!(ack.ack_range_count, 1);
            assert_eq!(
                ack.ranges.as_slice(),
                &[
                    AckRange {
                        smallest: 8,
                        largest: 10
                    },
                    AckRange {
                        smallest: 5,
                        largest: 6
                    },
                ]
            );
        }
        other => panic!("expected ACK, got {:?}", other),
    }
}

#[test]
fn test_padding_run_of_sixteen() {
    let mut payload = vec![0u8; 16];
    payload.push(0x1e);
    let mut stream = FrameStream::new(&payload);
    let first = stream.next().unwrap();
    assert_eq!(first.body, Ok(Frame::Padding { run: 16 }));
    assert_eq!(stream.position(), 16);
    assert_eq!(stream.next().unwrap().body, Ok(Frame::HandshakeDone));
    assert!(stream.next().is_none());
}

#[test]
fn test_nested_ticket_without_extensions() {
    let inner: Vec<u8> = [
        &[0x00, 0x01, 0x51, 0x80][..], // lifetime 86400
        &[0xde, 0xad, 0xbe, 0xef],     // age_add
        &[0x01, 0x00],                 // nonce
        &[0x00, 0x04, 1, 2, 3, 4],     // ticket
        &[0x00, 0x00],                 // no extensions
    ]
    .concat();
    let outer: Vec<u8> = [
        &7u64.to_be_bytes()[..],
        &[0x00, 0x1d, 0x13, 0x02],
        &(inner.len() as u16).to_be_bytes(),
        inner.as_slice(),
        &[0x00],
    ]
    .concat();

    let ticket = ResumptionTicket::decode(&outer).unwrap();
    let handshake = ticket.handshake_ticket().unwrap();
    assert_eq!(
        handshake,
        HandshakeTicket {
            lifetime: 86400,
            age_add: 0xdeadbeef,
            nonce: &[0x00],
            ticket: &[1, 2, 3, 4],
            extensions: &[],
        }
    );

    let mut w = TraceWriter::new(Vec::new());
    trace_ticket(&mut w, &outer).unwrap();
    let out = String::from_utf8(w.into_inner()).unwrap();
    assert!(!out.contains("Malformed"));
    assert!(out.contains(
        "Handshake ticket, lifetime 86400, age_add 0xdeadbeef, nonce length 1, ticket length 4, extensions length 0"
    ));
}

#[test]
fn test_header_formatting_is_byte_identical() {
    let header = initial_header(12);
    let render = |tag: Option<u64>| {
        let mut w = TraceWriter::new(Vec::new());
        w.set_connection_tag(tag);
        format_header(&mut w, Direction::Receiving, &header, Some(99)).unwrap();
        w.into_inner()
    };
    assert_eq!(render(None), render(None));
    assert_eq!(render(Some(7)), render(Some(7)));
    assert_ne!(render(None), render(Some(7)));
}
