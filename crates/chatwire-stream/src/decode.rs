//! Frame payload decoding and the envelope stream adapter.

use crate::error::{DecodeError, StreamError};
use crate::frame::FrameSplitter;
use crate::transport::ByteStream;
use chatwire_protocol::EventEnvelope;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, warn};

/// Payload that marks graceful end of the event stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Decode one frame into an envelope.
///
/// `Ok(None)` means the frame carries nothing to deliver: a `[DONE]` marker,
/// a keep-alive comment, or no `data:` line at all.
pub fn decode_frame(frame: &str) -> Result<Option<EventEnvelope>, DecodeError> {
    let Some(payload) = frame_payload(frame) else {
        return Ok(None);
    };
    if payload.trim() == DONE_SENTINEL {
        return Ok(None);
    }
    let value: Value =
        serde_json::from_str(&payload).map_err(|source| DecodeError::json(&payload, source))?;
    Ok(Some(EventEnvelope::from_value(value)?))
}

/// Joined `data:` lines of a frame; other SSE fields and comments are ignored.
fn frame_payload(frame: &str) -> Option<String> {
    let mut payload: Option<String> = None;
    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        if field != "data" {
            continue;
        }
        match payload.as_mut() {
            Some(buf) => {
                buf.push('\n');
                buf.push_str(value);
            }
            None => payload = Some(value.to_owned()),
        }
    }
    payload
}

/// Split and decode a byte stream into envelopes, in wire order.
///
/// Decode errors are yielded and the stream goes on. A read error or an
/// oversized frame is yielded last.
pub fn envelope_stream(
    bytes: ByteStream,
) -> impl Stream<Item = Result<EventEnvelope, StreamError>> + Send + 'static {
    async_stream::stream! {
        let mut bytes = bytes;
        let mut splitter = FrameSplitter::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            let frames = match splitter.feed(&chunk) {
                Ok(frames) => frames,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            for frame in frames {
                match decode_frame(&frame) {
                    Ok(Some(envelope)) => yield Ok(envelope),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(%err, "skipping malformed frame");
                        yield Err(StreamError::Decode(err));
                    }
                }
            }
        }

        let dropped = splitter.finish();
        if dropped > 0 {
            debug!(dropped, "discarding undelimited bytes at end of stream");
        }
    }
}
