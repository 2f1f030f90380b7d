//! Decoder Error Types
//!
//! Three classes of malformed input are distinguished:
//! - **Truncation**: a declared field length exceeds the remaining span
//! - **Structural inconsistency**: a decoded value breaks a protocol invariant
//! - **Unknown tag**: a frame type this decoder does not recognize
//!
//! None of them abort a trace. Decoders turn them into a diagnostic line and
//! report the rest of the span as consumed.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Malformed-input conditions reported by the frame, ticket and
/// transport-parameter decoders.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A field extends past the end of the span
    #[error("truncated {field}")]
    Truncated { field: &'static str },

    /// A decoded value violates a protocol invariant
    #[error("{reason}")]
    Inconsistent { reason: &'static str },

    /// Frame type decoded but not recognized
    #[error("unknown frame type 0x{0:x}")]
    UnknownFrameType(u64),

    /// The frame type varint itself is truncated; `needed` is the length
    /// announced by its first byte
    #[error("unreadable frame type, needs {needed} bytes")]
    UnreadableFrameType { needed: usize },
}

impl DecodeError {
    pub(crate) const fn truncated(field: &'static str) -> Self {
        DecodeError::Truncated { field }
    }

    pub(crate) const fn inconsistent(reason: &'static str) -> Self {
        DecodeError::Inconsistent { reason }
    }
}

/// Errors surfaced by the `trace_*` entry points.
///
/// Malformed input is never an error at this level; only the output sink
/// can fail.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("trace sink error: {0}")]
    Io(#[from] std::io::Error),
}

/// Generic Result Type for trace operations
pub type Result<T> = core::result::Result<T, TraceError>;
