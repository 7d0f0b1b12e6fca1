//! Line codec for the control socket.
//!
//! Both directions carry newline-terminated UTF-8 lines:
//!
//! ```text
//! controller → daemon:  <command> <args>\n
//! daemon → controller:  EVENT [<instance>] <NAME> <args>\n
//!                       <escaped command result>\n
//! ```
//!
//! A trailing `\r` is stripped so `\r\n` clients work. Invalid UTF-8 is
//! replaced, not rejected.

use anyhow::{bail, Result};

use crate::constants::MAX_LINE_LENGTH;

/// Incremental splitter from raw bytes to lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Create a decoder with an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and extract every complete line, without terminators.
    ///
    /// Incomplete data is buffered for the next call.
    ///
    /// # Errors
    ///
    /// Fails when a line grows past [`MAX_LINE_LENGTH`] without a newline.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<String>> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(String::from_utf8_lossy(&line).into_owned());
        }

        if self.buf.len() > MAX_LINE_LENGTH {
            bail!(
                "Line too long: {} bytes without newline (max {MAX_LINE_LENGTH})",
                self.buf.len()
            );
        }
        Ok(lines)
    }

    /// Take whatever is buffered as a final unterminated line (at EOF).
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string())
    }

    /// Returns true if the decoder has buffered partial data.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_complete_lines() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"set a = 1\nprint @a\n").unwrap();
        assert_eq!(lines, vec!["set a = 1", "print @a"]);
        assert!(!decoder.has_partial());
    }

    #[test]
    fn test_buffers_partial_lines_across_reads() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"event HEL").unwrap().is_empty());
        assert!(decoder.has_partial());
        assert_eq!(decoder.feed(b"LO world\r\nnext").unwrap(), vec!["event HELLO world"]);
        assert_eq!(decoder.finish().as_deref(), Some("next"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_empty_lines_are_preserved() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.feed(b"\n\nx\n").unwrap(), vec!["", "", "x"]);
    }

    #[test]
    fn test_oversized_line_is_an_error() {
        let mut decoder = LineDecoder::new();
        let big = vec![b'a'; MAX_LINE_LENGTH + 1];
        assert!(decoder.feed(&big).is_err());
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"print \xff\n").unwrap();
        assert_eq!(lines, vec!["print \u{fffd}"]);
    }
}
