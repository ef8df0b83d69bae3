//! Chat messages as they appear in snapshots and message events.
//!
//! Messages are role-tagged. Content is absent, a plain string, or a list of
//! typed parts. Assistant messages accumulate streaming state (tool calls,
//! thinking blocks, citations, usage) through delta ops; two fields are
//! internal to the client and never re-sent: `reasoning_content` and `extra`.

use crate::ids::MessageId;
use crate::tool::ToolCall;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

open_enum!(
    /// Author role of a message.
    Role {
        User => "user",
        Assistant => "assistant",
        Tool => "tool",
        System => "system",
        /// Files attached as context by the IDE or by tools.
        ContextFile => "context_file",
        /// A proposed file diff.
        Diff => "diff",
        PlainText => "plain_text",
    }
);

open_enum!(
    /// Why a generation stopped.
    FinishReason {
        Stop => "stop",
        Length => "length",
        Abort => "abort",
        Error => "error",
        ToolCalls => "tool_calls",
    }
);

/// Message body: a plain string or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// The body when it is a plain string.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Parts(_) => None,
        }
    }

    /// Concatenated text of the body, skipping non-text parts.
    pub fn to_plain_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// One element of a multi-part message body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
    /// A part type this client does not render.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Token usage reported for a generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_zero")]
    pub prompt_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub completion_tokens: u64,
    #[serde(default, deserialize_with = "null_as_zero")]
    pub total_tokens: u64,
    /// Provider-specific counters (cache hits, reasoning tokens, ...).
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

// Providers send `null` for counters they do not track.
fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or_default())
}

/// A chat message snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_blocks: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// Streamed reasoning text. Client-side only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Metadata bag written only by `merge_extra`. Client-side only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<Map<String, Value>>,
}

impl ChatMessage {
    /// An empty message with the given role.
    pub fn new(role: Role) -> Self {
        Self {
            role,
            content: None,
            message_id: None,
            tool_call_id: None,
            tool_calls: None,
            thinking_blocks: None,
            citations: None,
            finish_reason: None,
            usage: None,
            reasoning_content: None,
            extra: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            content: Some(MessageContent::Text(text.into())),
            ..Self::new(Role::User)
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            content: Some(MessageContent::Text(text.into())),
            ..Self::new(Role::Assistant)
        }
    }

    /// The placeholder an assistant message starts from when a stream opens.
    pub fn streaming(message_id: MessageId) -> Self {
        Self {
            message_id: Some(message_id),
            ..Self::new(Role::Assistant)
        }
    }

    /// Plain-string body, if the content is a string.
    pub fn text(&self) -> Option<&str> {
        self.content.as_ref().and_then(MessageContent::as_text)
    }

    /// Copy suitable for sending back to the backend: client-side fields removed.
    pub fn to_wire(&self) -> Self {
        Self {
            reasoning_content: None,
            extra: None,
            ..self.clone()
        }
    }
}
