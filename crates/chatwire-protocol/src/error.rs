//! Error types for the chat wire protocol.

use thiserror::Error;

/// Errors raised while turning wire values into protocol types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("envelope must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },
}

/// Errors reported by [`validate_tool_call`](crate::tool::validate_tool_call).
#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("tool call at index {index} has no function name")]
    MissingName { index: usize },
    #[error("tool call at index {index} has invalid JSON arguments: {source}")]
    InvalidArguments {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience result type for protocol conversions.
pub type ProtocolResult<T> = Result<T, ProtocolError>;
