//! # Frame Decoding (RFC 9000 Section 12.4)
//!
//! Zero-copy frame decoding with an iterator-based dispatcher.
//!
//! Every decoder receives the full remaining span, tag included, and reports
//! how many bytes it consumed. A malformed frame never aborts the stream: it
//! becomes a `FrameRecord` whose body is the error and whose `consumed` is
//! the whole remaining span, which ends iteration on the next call.

#![forbid(unsafe_code)]

use super::types::*;
use crate::error::DecodeError;
use crate::types::{ConnectionId, SpanReader, VarInt, VarIntCodec, MAX_CID_LENGTH};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord<'a> {
    pub frame_type: FrameType,
    pub body: Result<Frame<'a>, DecodeError>,
    /// Bytes to advance, tag included. Always at least 1.
    pub consumed: usize,
}

impl FrameRecord<'_> {
    pub fn is_malformed(&self) -> bool {
        self.body.is_err()
    }
}

/// Decode the frame at the start of `buf`.
///
/// Returns None only for an empty span. On any malformed condition the
/// record reports `consumed == buf.len()`.
pub fn decode_frame(buf: &[u8]) -> Option<FrameRecord<'_>> {
    let first = *buf.first()?;

    let Some((tag, _)) = VarIntCodec::decode(buf) else {
        return Some(FrameRecord {
            frame_type: FrameType::Unknown(u64::from(first)),
            body: Err(DecodeError::UnreadableFrameType {
                needed: VarIntCodec::skip(buf),
            }),
            consumed: buf.len(),
        });
    };

    let frame_type = FrameType::from_tag(tag);
    let record = match decode_body(frame_type, buf) {
        Ok((frame, consumed)) => FrameRecord {
            frame_type,
            body: Ok(frame),
            consumed,
        },
        Err(err) => FrameRecord {
            frame_type,
            body: Err(err),
            consumed: buf.len(),
        },
    };
    debug_assert!(record.consumed >= 1 && record.consumed <= buf.len());
    Some(record)
}

fn decode_body(frame_type: FrameType, buf: &[u8]) -> Result<(Frame<'_>, usize), DecodeError> {
    let mut r = SpanReader::new(buf);
    r.varint("frame type")?;
    let frame = decode_fields(frame_type, &mut r)?;
    Ok((frame, r.position()))
}

/// Consume the bytes following the tag that repeat `tag`, returning the run
/// length: every byte from the start of the frame, tag included. A
/// non-minimal tag encoding counts with all of its bytes.
fn repeat_run(r: &mut SpanReader<'_>, tag: u8) -> Result<usize, DecodeError> {
    let extra = r.rest().iter().take_while(|&&b| b == tag).count();
    r.bytes(extra as u64, "run")?;
    Ok(r.position())
}

fn decode_fields<'a>(
    frame_type: FrameType,
    r: &mut SpanReader<'a>,
) -> Result<Frame<'a>, DecodeError> {
    let frame = match frame_type {
        FrameType::Padding => Frame::Padding {
            run: repeat_run(r, FRAME_TYPE_PADDING as u8)?,
        },
        FrameType::Ping => Frame::Ping {
            run: repeat_run(r, FRAME_TYPE_PING as u8)?,
        },
        FrameType::Unknown(tag) => return Err(DecodeError::UnknownFrameType(tag)),
        FrameType::Ack { ecn } => Frame::Ack(parse_ack_frame(r, false, ecn)?),
        FrameType::PathAck { ecn } => Frame::Ack(parse_ack_frame(r, true, ecn)?),
        FrameType::ResetStream => Frame::ResetStream {
            stream_id: r.varint("stream id")?,
            error_code: r.varint("error code")?,
            final_size: r.varint("final size")?,
        },
        FrameType::StopSending => Frame::StopSending {
            stream_id: r.varint("stream id")?,
            error_code: r.varint("error code")?,
        },
        FrameType::Crypto => Frame::Crypto(parse_crypto_frame(r)?),
        FrameType::NewToken => {
            let length = r.varint("token length")?;
            Frame::NewToken {
                token: r.bytes(length, "token")?,
            }
        }
        FrameType::Stream { flags } => Frame::Stream(parse_stream_frame(r, flags)?),
        FrameType::MaxData => Frame::MaxData(r.varint("maximum data")?),
        FrameType::MaxStreamData => Frame::MaxStreamData {
            stream_id: r.varint("stream id")?,
            maximum: r.varint("maximum stream data")?,
        },
        FrameType::MaxStreams { bidirectional } => Frame::MaxStreams {
            bidirectional,
            maximum: r.varint("maximum streams")?,
        },
        FrameType::DataBlocked => Frame::DataBlocked(r.varint("data limit")?),
        FrameType::StreamDataBlocked => Frame::StreamDataBlocked {
            stream_id: r.varint("stream id")?,
            limit: r.varint("stream data limit")?,
        },
        FrameType::StreamsBlocked { bidirectional } => Frame::StreamsBlocked {
            bidirectional,
            limit: r.varint("stream limit")?,
        },
        FrameType::NewConnectionId => {
            Frame::NewConnectionId(parse_new_connection_id_frame(r, None)?)
        }
        FrameType::PathNewConnectionId => {
            let path_id = r.varint("path id")?;
            Frame::NewConnectionId(parse_new_connection_id_frame(r, Some(path_id))?)
        }
        FrameType::RetireConnectionId => Frame::RetireConnectionId {
            path_id: None,
            sequence_number: r.varint("sequence number")?,
        },
        FrameType::PathRetireConnectionId => Frame::RetireConnectionId {
            path_id: Some(r.varint("path id")?),
            sequence_number: r.varint("sequence number")?,
        },
        FrameType::PathChallenge => Frame::PathChallenge(r.array("challenge data")?),
        FrameType::PathResponse => Frame::PathResponse(r.array("response data")?),
        FrameType::ConnectionClose => Frame::ConnectionClose(parse_close_frame(r, false)?),
        FrameType::ApplicationClose => Frame::ConnectionClose(parse_close_frame(r, true)?),
        FrameType::HandshakeDone => Frame::HandshakeDone,
        FrameType::ImmediateAck => Frame::ImmediateAck,
        FrameType::Datagram { flags } => Frame::Datagram(parse_datagram_frame(r, flags)?),
        FrameType::AckFrequency => Frame::AckFrequency(AckFrequencyFrame {
            sequence_number: r.varint("sequence number")?,
            ack_eliciting_threshold: r.varint("ack-eliciting threshold")?,
            request_max_ack_delay: r.varint("requested max ack delay")?,
            reordering_threshold: r.varint("reordering threshold")?,
        }),
        FrameType::TimeStamp => Frame::TimeStamp(r.varint("timestamp")?),
        FrameType::ObservedAddress { ipv6 } => Frame::ObservedAddress {
            sequence_number: r.varint("sequence number")?,
            address: parse_ip(r, ipv6)?,
            port: r.u16("port")?,
        },
        FrameType::AddAddress => Frame::AddAddress(parse_add_address_frame(r)?),
        FrameType::RemoveAddress => Frame::RemoveAddress {
            address_id: r.u8("address id")?,
            sequence_number: r.varint("sequence number")?,
        },
        FrameType::PathAbandon => Frame::PathAbandon {
            path_id: r.varint("path id")?,
            error_code: r.varint("error code")?,
        },
        FrameType::PathStatus { available } => Frame::PathStatus {
            available,
            path_id: r.varint("path id")?,
            sequence_number: r.varint("sequence number")?,
        },
        FrameType::MaxPathId => Frame::MaxPathId(r.varint("maximum path id")?),
        FrameType::PathsBlocked => Frame::PathsBlocked(r.varint("maximum path id")?),
        FrameType::PathCidsBlocked => Frame::PathCidsBlocked {
            path_id: r.varint("path id")?,
            next_sequence: r.varint("next sequence number")?,
        },
    };
    Ok(frame)
}

// ============================================================================
// Per-Frame Decoders
// ============================================================================

/// Parse ACK frame (RFC 9000 Section 19.3), optionally path-scoped
/// (draft-ietf-quic-multipath) and with ECN counts.
///
/// Ranges are rebuilt from the largest acknowledged value downwards. A range
/// reaching below zero is an "ack range error"; a gap that would carry the
/// cursor below zero is an "ack gap error".
fn parse_ack_frame(
    r: &mut SpanReader<'_>,
    multipath: bool,
    ecn: bool,
) -> Result<AckFrame, DecodeError> {
    let path_id = if multipath {
        Some(r.varint("path id")?)
    } else {
        None
    };
    let largest_acked = r.varint("largest acknowledged")?;
    let ack_delay = r.varint("ack delay")?;
    let ack_range_count = r.varint("ack range count")?;

    let mut ranges = tinyvec::TinyVec::new();
    let mut cursor = largest_acked;
    let mut remaining = ack_range_count;
    loop {
        let range = r.varint("ack range")? + 1;
        if cursor + 1 < range {
            return Err(DecodeError::inconsistent("ack range error"));
        }
        ranges.push(AckRange {
            smallest: cursor + 1 - range,
            largest: cursor,
        });

        if remaining == 0 {
            break;
        }
        remaining -= 1;

        let gap = r.varint("ack gap")? + 1;
        if cursor < range + gap {
            return Err(DecodeError::inconsistent("ack gap error"));
        }
        cursor -= range + gap;
    }

    let ecn_counts = if ecn {
        Some(EcnCounts {
            ect0_count: r.varint("ect0 count")?,
            ect1_count: r.varint("ect1 count")?,
            ce_count: r.varint("ce count")?,
        })
    } else {
        None
    };

    Ok(AckFrame {
        path_id,
        largest_acked,
        ack_delay,
        ack_range_count,
        ecn_counts,
        ranges,
    })
}

/// Parse STREAM frame (RFC 9000 Section 19.8)
fn parse_stream_frame<'a>(r: &mut SpanReader<'a>, flags: u8) -> Result<StreamFrame<'a>, DecodeError> {
    let flags = u64::from(flags);
    let stream_id = r.varint("stream id")?;
    let offset = if flags & STREAM_FRAME_BIT_OFF != 0 {
        r.varint("offset")?
    } else {
        0
    };
    let explicit_length = flags & STREAM_FRAME_BIT_LEN != 0;
    let data = if explicit_length {
        let length = r.varint("length")?;
        r.bytes(length, "data")?
    } else {
        r.take_rest()
    };

    Ok(StreamFrame {
        stream_id,
        offset,
        fin: flags & STREAM_FRAME_BIT_FIN != 0,
        explicit_length,
        data,
    })
}

/// Parse CRYPTO frame (RFC 9000 Section 19.6)
fn parse_crypto_frame<'a>(r: &mut SpanReader<'a>) -> Result<CryptoFrame<'a>, DecodeError> {
    let offset = r.varint("offset")?;
    let length = r.varint("length")?;
    let data = r.bytes(length, "data")?;
    Ok(CryptoFrame { offset, data })
}

/// Parse NEW_CONNECTION_ID frame (RFC 9000 Section 19.15)
fn parse_new_connection_id_frame(
    r: &mut SpanReader<'_>,
    path_id: Option<VarInt>,
) -> Result<NewConnectionIdFrame, DecodeError> {
    let sequence_number = r.varint("sequence number")?;
    let retire_prior_to = r.varint("retire prior to")?;
    let cid_length = r.u8("connection id length")?;
    if usize::from(cid_length) > MAX_CID_LENGTH {
        return Err(DecodeError::inconsistent("connection id too long"));
    }
    let cid_bytes = r.bytes(u64::from(cid_length), "connection id")?;
    let connection_id = ConnectionId::from_slice(cid_bytes)
        .ok_or(DecodeError::inconsistent("connection id too long"))?;
    let stateless_reset_token = r.array("stateless reset token")?;

    Ok(NewConnectionIdFrame {
        path_id,
        sequence_number,
        retire_prior_to,
        connection_id,
        stateless_reset_token,
    })
}

/// Parse CONNECTION_CLOSE frame (RFC 9000 Section 19.19)
///
/// The reason phrase is bounds-checked and skipped.
fn parse_close_frame(
    r: &mut SpanReader<'_>,
    application: bool,
) -> Result<ConnectionCloseFrame, DecodeError> {
    let error_code = r.varint("error code")?;
    let frame_type = if application {
        None
    } else {
        Some(r.varint("frame type")?)
    };
    let reason_length = r.varint("reason length")?;
    r.bytes(reason_length, "reason phrase")?;

    Ok(ConnectionCloseFrame {
        application,
        error_code,
        frame_type,
        reason_length,
    })
}

/// Parse DATAGRAM frame (RFC 9221)
///
/// The id and length fields are toggled independently by the tag bits.
fn parse_datagram_frame<'a>(
    r: &mut SpanReader<'a>,
    flags: u8,
) -> Result<DatagramFrame<'a>, DecodeError> {
    let flags = u64::from(flags);
    let datagram_id = if flags & DATAGRAM_FRAME_BIT_ID != 0 {
        Some(r.varint("datagram id")?)
    } else {
        None
    };
    let explicit_length = flags & DATAGRAM_FRAME_BIT_LEN != 0;
    let data = if explicit_length {
        let length = r.varint("length")?;
        r.bytes(length, "data")?
    } else {
        r.take_rest()
    };

    Ok(DatagramFrame {
        datagram_id,
        explicit_length,
        data,
    })
}

/// ADD_ADDRESS flag signalling a trailing port
const ADD_ADDRESS_PORT_PRESENT: u8 = 0x10;

/// Parse ADD_ADDRESS frame
fn parse_add_address_frame(r: &mut SpanReader<'_>) -> Result<AddAddressFrame, DecodeError> {
    let flags = r.u8("flags")?;
    let ipv6 = match flags & 0x0f {
        4 => false,
        6 => true,
        _ => return Err(DecodeError::inconsistent("unsupported ip version")),
    };
    let address_id = r.u8("address id")?;
    let sequence_number = r.varint("sequence number")?;
    let interface_type = r.u8("interface type")?;
    let address = parse_ip(r, ipv6)?;
    let port = if flags & ADD_ADDRESS_PORT_PRESENT != 0 {
        Some(r.u16("port")?)
    } else {
        None
    };

    Ok(AddAddressFrame {
        address_id,
        sequence_number,
        interface_type,
        address,
        port,
    })
}

fn parse_ip(r: &mut SpanReader<'_>, ipv6: bool) -> Result<IpAddr, DecodeError> {
    if ipv6 {
        Ok(IpAddr::V6(Ipv6Addr::from(r.array::<16>("ipv6 address")?)))
    } else {
        Ok(IpAddr::V4(Ipv4Addr::from(r.array::<4>("ipv4 address")?)))
    }
}

// ============================================================================
// Frame Stream Dispatcher
// ============================================================================

/// Frame Iterator (Zero-Copy)
///
/// Walks a decrypted payload frame by frame, advancing by exactly the
/// `consumed` value of each record. Terminates once the cursor reaches the
/// end of the payload, which a malformed frame forces immediately.
#[derive(Debug, Clone)]
pub struct FrameStream<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> FrameStream<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self {
            buf: payload,
            offset: 0,
        }
    }

    /// Current cursor within the payload
    pub fn position(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for FrameStream<'a> {
    type Item = FrameRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = decode_frame(&self.buf[self.offset..])?;

        match &record.body {
            Ok(_) => tracing::trace!(
                frame = record.frame_type.name(),
                offset = self.offset,
                consumed = record.consumed,
                "decoded frame"
            ),
            Err(err) => tracing::debug!(
                frame = record.frame_type.name(),
                offset = self.offset,
                skipped = record.consumed,
                error = %err,
                "malformed frame"
            ),
        }

        self.offset += record.consumed;
        Some(record)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
