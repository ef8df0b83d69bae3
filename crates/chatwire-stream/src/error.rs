use chatwire_protocol::ProtocolError;
use thiserror::Error;

/// Longest payload excerpt carried by a [`DecodeError`].
const PREVIEW_CHARS: usize = 120;

/// A single frame could not be turned into an envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed JSON payload `{preview}`: {source}")]
    Json {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("payload is valid JSON but not an object (got {found})")]
    NotAnObject { found: &'static str },
}

impl DecodeError {
    pub(crate) fn json(payload: &str, source: serde_json::Error) -> Self {
        Self::Json {
            preview: preview(payload),
            source,
        }
    }
}

impl From<ProtocolError> for DecodeError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::NotAnObject { found } => Self::NotAnObject { found },
        }
    }
}

fn preview(payload: &str) -> String {
    let mut chars = payload.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Everything a subscription can report through `on_error`.
#[derive(Debug, Error)]
pub enum StreamError {
    /// One bad frame. The subscription keeps streaming.
    #[error("failed to decode frame: {0}")]
    Decode(#[from] DecodeError),
    #[error("subscribe request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("subscribe request returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("frame exceeded {limit} bytes without a delimiter")]
    FrameTooLarge { limit: usize },
    #[error("invalid subscription config: {0}")]
    InvalidConfig(String),
}

impl StreamError {
    /// True when streaming continues after this error was reported.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
