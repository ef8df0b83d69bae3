//! Blank-line frame splitting over arbitrarily chunked bytes.

use crate::error::StreamError;
use bytes::{Buf, BytesMut};

/// Largest frame accepted before the stream is considered broken.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Accumulates raw chunks and yields complete text frames.
///
/// A frame ends at a blank line: `\n` followed by `\n`, with an optional `\r`
/// before either newline. Splitting happens on bytes, so a UTF-8 sequence cut
/// by a chunk boundary is reassembled before it is decoded.
#[derive(Debug)]
pub struct FrameSplitter {
    buf: BytesMut,
    /// Bytes before this offset are known not to start a delimiter.
    scanned: usize,
    limit: usize,
}

impl Default for FrameSplitter {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSplitter {
    pub fn new() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            scanned: 0,
            limit,
        }
    }

    /// Append one chunk and drain every frame it completes, in order.
    ///
    /// Fails only when the undelimited tail grows past the frame limit.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, StreamError> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();

        while let Some((end, delimiter_len)) = self.find_delimiter() {
            let raw = self.buf.split_to(end);
            self.buf.advance(delimiter_len);
            self.scanned = 0;
            let frame = decode_frame_text(&raw);
            if !frame.is_empty() {
                frames.push(frame);
            }
        }

        if self.buf.len() > self.limit {
            return Err(StreamError::FrameTooLarge { limit: self.limit });
        }
        Ok(frames)
    }

    /// Bytes buffered without a delimiter yet.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// End of stream: residual bytes without a delimiter are dropped.
    /// Returns how many were dropped.
    pub fn finish(self) -> usize {
        self.buf.len()
    }

    fn find_delimiter(&mut self) -> Option<(usize, usize)> {
        let bytes = &self.buf[..];
        let mut i = self.scanned;
        while i < bytes.len() {
            if bytes[i] == b'\n' {
                match (bytes.get(i + 1), bytes.get(i + 2)) {
                    (Some(b'\n'), _) => return Some((i, 2)),
                    (Some(b'\r'), Some(b'\n')) => return Some((i, 3)),
                    // Not enough bytes yet to decide.
                    (None, _) | (Some(b'\r'), None) => {
                        self.scanned = i;
                        return None;
                    }
                    _ => {}
                }
            }
            i += 1;
        }
        self.scanned = bytes.len();
        None
    }
}

fn decode_frame_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches('\r');
    if text.contains('\r') {
        text.replace("\r\n", "\n")
    } else {
        text.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut splitter = FrameSplitter::new();
        chunks
            .iter()
            .flat_map(|chunk| splitter.feed(chunk).unwrap())
            .collect()
    }

    #[test]
    fn any_three_way_split_yields_both_frames() {
        let wire = b"data: {\"key\":\"test\"}\n\ndata: {\"key\":\"value\"}\n\n";
        for a in 0..=wire.len() {
            for b in a..=wire.len() {
                let frames = split_all(&[&wire[..a], &wire[a..b], &wire[b..]]);
                assert_eq!(
                    frames,
                    ["data: {\"key\":\"test\"}", "data: {\"key\":\"value\"}"],
                    "split at {a}/{b}"
                );
            }
        }
    }

    #[test]
    fn escaped_newlines_inside_json_do_not_split() {
        let wire = br#"data: {"text":"line1\n\nline2"}"#;
        let mut chunk = wire.to_vec();
        chunk.extend_from_slice(b"\n\n");
        let frames = split_all(&[&chunk]);
        assert_eq!(frames, [r#"data: {"text":"line1\n\nline2"}"#]);
    }

    #[test]
    fn crlf_matches_lf() {
        let lf = split_all(&[b"data: {\"a\":1}\n\ndata: {\"b\":2}\n\n"]);
        let crlf = split_all(&[b"data: {\"a\":1}\r\n\r\ndata: {\"b\":2}\r\n\r\n"]);
        assert_eq!(lf, crlf);
    }

    #[test]
    fn crlf_delimiter_split_between_chunks() {
        let frames = split_all(&[b"data: 1\r", b"\n", b"\r", b"\ndata: 2\r\n\r\n"]);
        assert_eq!(frames, ["data: 1", "data: 2"]);
    }

    #[test]
    fn mixed_terminators_are_accepted() {
        let frames = split_all(&[b"data: a\r\n\ndata: b\n\r\ndata: c\n\n"]);
        assert_eq!(frames, ["data: a", "data: b", "data: c"]);
    }

    #[test]
    fn inner_crlf_is_normalized() {
        let frames = split_all(&[b": keep-alive\r\ndata: x\r\n\r\n"]);
        assert_eq!(frames, [": keep-alive\ndata: x"]);
    }

    #[test]
    fn multibyte_char_across_chunks() {
        let wire = "data: {\"t\":\"h\u{e9}llo \u{1F600}\"}\n\n".as_bytes();
        let cut = wire.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let frames = split_all(&[&wire[..cut], &wire[cut..]]);
        assert_eq!(frames, ["data: {\"t\":\"h\u{e9}llo \u{1F600}\"}"]);
    }

    #[test]
    fn consecutive_delimiters_emit_no_empty_frames() {
        let frames = split_all(&[b"\n\ndata: x\n\n\n\n\n\ndata: y\n\n"]);
        assert_eq!(frames, ["data: x", "data: y"]);
    }

    #[test]
    fn residual_without_delimiter_is_dropped() {
        let mut splitter = FrameSplitter::new();
        assert_eq!(splitter.feed(b"data: 1\n\ndata: par").unwrap(), ["data: 1"]);
        assert_eq!(splitter.pending(), 9);
        assert_eq!(splitter.finish(), 9);
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let mut splitter = FrameSplitter::with_limit(8);
        assert!(splitter.feed(b"data: 1\n\n").is_ok());
        let err = splitter.feed(b"data: 123456").unwrap_err();
        assert!(matches!(err, StreamError::FrameTooLarge { limit: 8 }));
    }
}
