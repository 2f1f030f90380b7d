//! # Packet Header Formatting and Segment Traces (RFC 9000 Section 17)

pub mod header;
pub mod segment;
pub mod types;

pub use header::format_header;
pub use segment::{
    outgoing_header, trace_outgoing_raw_segment, trace_outgoing_segment, trace_raw_segment,
    trace_segment, ConnectionView, HeaderParser, TraceContext,
};
pub use types::*;
