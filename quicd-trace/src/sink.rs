//! # Trace Output Sink
//!
//! Append-only, line-oriented writer over any `std::io::Write`. When a
//! connection tag is set, every line is prefixed with `{tag:016x}: ` so that
//! traces of many connections can share one file.

#![forbid(unsafe_code)]

use core::fmt;
use std::io::{self, Write};

/// Line writer used by every `trace_*` entry point.
#[derive(Debug)]
pub struct TraceWriter<W> {
    out: W,
    tag: Option<u64>,
}

impl<W: Write> TraceWriter<W> {
    /// Create a writer without connection tag.
    pub fn new(out: W) -> Self {
        Self { out, tag: None }
    }

    /// Prefix every subsequent line with the given connection tag.
    pub fn with_connection_tag(mut self, tag: u64) -> Self {
        self.tag = Some(tag);
        self
    }

    /// Set or clear the connection tag.
    pub fn set_connection_tag(&mut self, tag: Option<u64>) {
        self.tag = tag;
    }

    pub fn connection_tag(&self) -> Option<u64> {
        self.tag
    }

    /// Write one newline-terminated line.
    pub fn line(&mut self, args: fmt::Arguments<'_>) -> io::Result<()> {
        if let Some(tag) = self.tag {
            write!(self.out, "{:016x}: ", tag)?;
        }
        self.out.write_fmt(args)?;
        self.out.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_lines() {
        let mut w = TraceWriter::new(Vec::new());
        w.line(format_args!("first {}", 1)).unwrap();
        w.line(format_args!("second")).unwrap();
        assert_eq!(w.into_inner(), b"first 1\nsecond\n");
    }

    #[test]
    fn test_tagged_lines() {
        let mut w = TraceWriter::new(Vec::new()).with_connection_tag(0xabc);
        w.line(format_args!("hello")).unwrap();
        assert_eq!(
            String::from_utf8(w.into_inner()).unwrap(),
            "0000000000000abc: hello\n"
        );
    }

    #[test]
    fn test_tag_can_be_cleared() {
        let mut w = TraceWriter::new(Vec::new()).with_connection_tag(1);
        w.set_connection_tag(None);
        w.line(format_args!("x")).unwrap();
        assert_eq!(w.into_inner(), b"x\n");
    }
}
