//! Incremental decoding of newline-delimited JSON bodies.
//!
//! The proxy streams one JSON object per line, but network reads split the
//! body at arbitrary byte offsets: a multi-byte character or a JSON object may
//! straddle two chunks. Decoding happens in two stages:
//!
//! 1. [`Utf8StreamDecoder`] turns bytes into text, holding back an incomplete
//!    trailing UTF-8 sequence until the next chunk arrives.
//! 2. [`LineSplitter`] buffers text until a newline and hands out complete,
//!    non-empty lines.
//!
//! [`NdjsonDecoder`] combines both, and [`parse_line`] interprets one line.

use std::borrow::Cow;

use serde_json::Value;

use crate::error::{Error, Result};

const REPLACEMENT: char = '\u{FFFD}';

/// Stateful UTF-8 decoder that tolerates sequences split across chunks.
///
/// Invalid sequences are replaced with U+FFFD rather than failing the stream.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a chunk, returning all text that is complete so far
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        let data: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(chunk)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(chunk);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(data.len());
        let mut rest: &[u8] = &data;

        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&rest[..valid]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(REPLACEMENT);
                            rest = &rest[valid + len..];
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes
                            self.pending = rest[valid..].to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }

    /// Flush at end of input. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            REPLACEMENT.to_string()
        }
    }

    /// Number of bytes held back waiting for the rest of a character
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Buffers text and yields complete lines.
///
/// `\n` terminates a line, a trailing `\r` is stripped, and blank lines are
/// dropped.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: String,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and drain every complete line
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Take whatever is left once the input has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim_end_matches('\r');
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest.to_string())
        }
    }

    /// Whether an unterminated line is buffered
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Bytes in, complete NDJSON lines out
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    text: Utf8StreamDecoder,
    lines: LineSplitter,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        let text = self.text.decode(chunk);
        self.lines.push(&text)
    }

    /// Flush both stages at end of stream
    pub fn finish(&mut self) -> Vec<String> {
        let tail = self.text.finish();
        let mut lines = self.lines.push(&tail);
        lines.extend(self.lines.finish());
        lines
    }
}

/// The parts of a stream line the client cares about
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamLine {
    /// Incremental text, when the object carries a string `response`
    pub response: Option<String>,
    /// `"done": true` marks the generator's final object
    pub done: bool,
    pub done_reason: Option<String>,
}

/// Parse one NDJSON line.
///
/// Any valid JSON is accepted; values that are not objects, or objects
/// without a string `response`, simply carry no fragment.
pub fn parse_line(line: &str) -> Result<StreamLine> {
    let value: Value = serde_json::from_str(line).map_err(|source| Error::Parse {
        line: line.to_string(),
        source,
    })?;

    let Some(obj) = value.as_object() else {
        return Ok(StreamLine::default());
    };

    Ok(StreamLine {
        response: obj
            .get("response")
            .and_then(Value::as_str)
            .map(str::to_string),
        done: obj.get("done").and_then(Value::as_bool).unwrap_or(false),
        done_reason: obj
            .get("done_reason")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_split_across_chunks() {
        let bytes = "héllo ✓".as_bytes();
        // split inside the 3-byte check mark
        let split = bytes.len() - 1;
        let mut decoder = Utf8StreamDecoder::new();
        let first = decoder.decode(&bytes[..split]);
        assert_eq!(first, "héllo ");
        assert_eq!(decoder.pending_len(), 2);
        let second = decoder.decode(&bytes[split..]);
        assert_eq!(second, "✓");
        assert_eq!(decoder.finish(), "");
    }

    #[test]
    fn test_four_byte_char_one_byte_at_a_time() {
        let bytes = "🦀".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();
        let mut out = String::new();
        for b in bytes {
            out.push_str(&decoder.decode(std::slice::from_ref(b)));
        }
        assert_eq!(out, "🦀");
    }

    #[test]
    fn test_invalid_bytes_are_replaced() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(b"a\xffb"), "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_sequence_flushes_replacement() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.decode(&[0xe2, 0x9c]), "");
        assert_eq!(decoder.finish(), "\u{FFFD}");
    }

    #[test]
    fn test_splitter_buffers_until_newline() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(r#"{"response":"He"#).is_empty());
        assert!(splitter.has_partial());
        let lines = splitter.push("llo\"}\n{\"a\":1}\n");
        assert_eq!(lines, vec![r#"{"response":"Hello"}"#, r#"{"a":1}"#]);
        assert!(!splitter.has_partial());
    }

    #[test]
    fn test_splitter_drops_blank_lines_and_crlf() {
        let mut splitter = LineSplitter::new();
        let lines = splitter.push("\n\r\n{\"x\":1}\r\n\n");
        assert_eq!(lines, vec![r#"{"x":1}"#]);
        assert_eq!(splitter.finish(), None);
    }

    #[test]
    fn test_splitter_finish_returns_unterminated_line() {
        let mut splitter = LineSplitter::new();
        splitter.push("{\"response\":\"tail\"}");
        assert_eq!(splitter.finish().as_deref(), Some(r#"{"response":"tail"}"#));
    }

    #[test]
    fn test_ndjson_decoder_handles_char_split_inside_json() {
        let body = "{\"response\":\"naïve\"}\n".as_bytes();
        let cut = body.iter().position(|&b| b == 0xc3).unwrap() + 1;
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.feed(&body[..cut]).is_empty());
        let lines = decoder.feed(&body[cut..]);
        assert_eq!(lines, vec!["{\"response\":\"naïve\"}"]);
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_parse_line_fragment() {
        let parsed = parse_line(r#"{"model":"llama3.1","response":"Hi","done":false}"#).unwrap();
        assert_eq!(parsed.response.as_deref(), Some("Hi"));
        assert!(!parsed.done);
    }

    #[test]
    fn test_parse_line_done_without_response() {
        let parsed = parse_line(r#"{"done":true,"done_reason":"stop"}"#).unwrap();
        assert_eq!(parsed.response, None);
        assert!(parsed.done);
        assert_eq!(parsed.done_reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_parse_line_non_object_is_ignored() {
        assert_eq!(parse_line("[1,2,3]").unwrap(), StreamLine::default());
        assert_eq!(parse_line(r#"{"response":7}"#).unwrap().response, None);
    }

    #[test]
    fn test_parse_line_malformed() {
        let err = parse_line("{not json").unwrap_err();
        assert!(matches!(err, Error::Parse { ref line, .. } if line == "{not json"));
    }
}
