//! # QUIC Frame Decoding and Rendering (RFC 9000 Section 12.4, 19)
//!
//! RFC 9000 frames plus the datagram, ack-frequency, timestamp, multipath
//! and address-advertisement extensions. Decoding is zero-copy: frame
//! payloads borrow from the packet buffer.

pub mod format;
pub mod parse;
pub mod types;

pub use format::trace_frames;
pub use parse::{decode_frame, FrameRecord, FrameStream};
pub use types::*;
