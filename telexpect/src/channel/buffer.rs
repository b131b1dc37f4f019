//! Receive buffer for stream text awaiting a match.
//!
//! Text is appended at the tail as chunks arrive and removed from the head
//! when an expectation consumes a match, so memory stays bounded by the
//! unmatched remainder rather than the session's lifetime output.

use bytes::BytesMut;
use vte::{Parser, Perform};

/// Append-only buffer of received text, truncated from the front on match.
///
/// ANSI escape sequences are stripped with a stateful parser, so a sequence
/// split across two chunks is still removed.
pub struct StreamBuffer {
    /// Unconsumed text.
    buffer: BytesMut,

    /// Escape-sequence parser, `None` when stripping is disabled.
    parser: Option<Parser>,

    /// Everything ever received, when transcript keeping is enabled.
    transcript: Option<Vec<u8>>,
}

impl StreamBuffer {
    /// Create a new buffer.
    pub fn new(strip_ansi: bool, keep_transcript: bool) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            parser: strip_ansi.then(Parser::new),
            transcript: keep_transcript.then(Vec::new),
        }
    }

    /// Append a received chunk.
    pub fn extend(&mut self, data: &[u8]) {
        let before = self.buffer.len();

        match &mut self.parser {
            Some(parser) => {
                let mut sink = Printable {
                    out: &mut self.buffer,
                };
                parser.advance(&mut sink, data);
            }
            None => self.buffer.extend_from_slice(data),
        }

        if let Some(transcript) = &mut self.transcript {
            transcript.extend_from_slice(&self.buffer[before..]);
        }
    }

    /// Remove everything up to `end`, returning the text before `start` and
    /// the text in `start..end`.
    pub fn consume(&mut self, start: usize, end: usize) -> (String, String) {
        let before = self.buffer.split_to(start);
        let matched = self.buffer.split_to(end - start);
        (
            String::from_utf8_lossy(&before).into_owned(),
            String::from_utf8_lossy(&matched).into_owned(),
        )
    }

    /// Take the whole unconsumed remainder.
    pub fn take(&mut self) -> String {
        let rest = self.buffer.split();
        String::from_utf8_lossy(&rest).into_owned()
    }

    /// Get a reference to the unconsumed text.
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the unconsumed text as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    /// Get the current buffer length.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Discard the unconsumed text.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Everything received so far, if transcript keeping is enabled.
    pub fn transcript(&self) -> Option<std::borrow::Cow<'_, str>> {
        self.transcript
            .as_deref()
            .map(String::from_utf8_lossy)
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(true, false)
    }
}

/// Collects printable output and line controls, dropping escape sequences.
struct Printable<'a> {
    out: &'a mut BytesMut,
}

impl Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(c.encode_utf8(&mut utf8).as_bytes());
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.extend_from_slice(&[byte]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_extend() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"Hello, world!\r\n");
        assert_eq!(buffer.as_slice(), b"Hello, world!\r\n");
    }

    #[test]
    fn test_ansi_stripping() {
        let mut buffer = StreamBuffer::default();
        // Typical ANSI color code: \x1b[32m (green)
        buffer.extend(b"\x1b[32mGreen text\x1b[0m");
        assert_eq!(buffer.as_slice(), b"Green text");
    }

    #[test]
    fn test_ansi_sequence_split_across_chunks() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"switch\x1b[");
        buffer.extend(b"0m#");
        assert_eq!(buffer.as_slice(), b"switch#");
    }

    #[test]
    fn test_raw_mode_keeps_escapes() {
        let mut buffer = StreamBuffer::new(false, false);
        buffer.extend(b"\x1b[0mswitch#");
        assert_eq!(buffer.as_slice(), b"\x1b[0mswitch#");
    }

    #[test]
    fn test_consume_truncates_front() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"output\r\nrouter#trailing");

        let (before, matched) = buffer.consume(8, 15);
        assert_eq!(before, "output\r\n");
        assert_eq!(matched, "router#");
        assert_eq!(buffer.as_slice(), b"trailing");

        assert_eq!(buffer.take(), "trailing");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_transcript_survives_consume() {
        let mut buffer = StreamBuffer::new(true, true);
        buffer.extend(b"Password: ");
        buffer.consume(0, 10);
        buffer.extend(b"\x1b[1mrouter>\x1b[0m");

        assert_eq!(buffer.as_slice(), b"router>");
        assert_eq!(buffer.transcript().unwrap(), "Password: router>");
    }

    #[test]
    fn test_no_transcript_by_default() {
        let mut buffer = StreamBuffer::default();
        buffer.extend(b"data");
        assert!(buffer.transcript().is_none());
    }
}
