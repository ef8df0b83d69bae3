//! Delta ops: incremental mutations of an in-progress assistant message.
//!
//! A `stream_delta` envelope carries a batch of ops; [`apply_delta_ops`] folds
//! the batch onto the current snapshot of the targeted message and returns
//! the next snapshot. Ops the client does not understand are inert.

use crate::message::{ChatMessage, MessageContent, Usage};
use crate::tool::ToolCall;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// One mutation instruction, tagged by `op` on the wire.
///
/// Forward-compatible: an unknown `op`, or a known `op` whose body does not
/// have the expected shape, decodes into [`DeltaOp::Unknown`] instead of
/// failing. Applying an `Unknown` op leaves the message untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "op", rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeltaOp {
    /// Concatenate onto the string content.
    AppendContent { text: String },
    /// Concatenate onto the client-side reasoning text.
    AppendReasoning { text: String },
    /// Replace the tool calls wholesale. Fragments are merged upstream.
    SetToolCalls { tool_calls: Vec<ToolCall> },
    SetThinkingBlocks { blocks: Vec<Value> },
    /// Append exactly one citation.
    AddCitation { citation: Value },
    /// Replace usage wholesale; `null` clears it.
    SetUsage { usage: Option<Usage> },
    /// Shallow, right-biased merge into the metadata bag.
    MergeExtra { extra: Map<String, Value> },
    #[serde(skip)]
    Unknown { op: String, data: Value },
}

impl DeltaOp {
    /// Decode a raw op, falling back to [`DeltaOp::Unknown`].
    pub fn from_value(value: Value) -> Self {
        match DeltaOp::deserialize(&value) {
            Ok(op) => op,
            Err(_) => {
                let op = value
                    .get("op")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let mut data = value;
                if let Some(obj) = data.as_object_mut() {
                    obj.remove("op");
                }
                DeltaOp::Unknown { op, data }
            }
        }
    }

    /// Wire tag of this op.
    pub fn op_name(&self) -> &str {
        match self {
            Self::AppendContent { .. } => "append_content",
            Self::AppendReasoning { .. } => "append_reasoning",
            Self::SetToolCalls { .. } => "set_tool_calls",
            Self::SetThinkingBlocks { .. } => "set_thinking_blocks",
            Self::AddCitation { .. } => "add_citation",
            Self::SetUsage { .. } => "set_usage",
            Self::MergeExtra { .. } => "merge_extra",
            Self::Unknown { op, .. } => op,
        }
    }

    fn apply(&self, message: &mut ChatMessage) {
        match self {
            Self::AppendContent { text } => match &mut message.content {
                Some(MessageContent::Text(content)) => content.push_str(text),
                other => *other = Some(MessageContent::Text(text.clone())),
            },
            Self::AppendReasoning { text } => message
                .reasoning_content
                .get_or_insert_with(String::new)
                .push_str(text),
            Self::SetToolCalls { tool_calls } => message.tool_calls = Some(tool_calls.clone()),
            Self::SetThinkingBlocks { blocks } => message.thinking_blocks = Some(blocks.clone()),
            Self::AddCitation { citation } => message
                .citations
                .get_or_insert_with(Vec::new)
                .push(citation.clone()),
            Self::SetUsage { usage } => message.usage.clone_from(usage),
            Self::MergeExtra { extra } => {
                let bag = message.extra.get_or_insert_with(Map::new);
                for (key, value) in extra {
                    bag.insert(key.clone(), value.clone());
                }
            }
            Self::Unknown { .. } => {}
        }
    }
}

impl<'de> Deserialize<'de> for DeltaOp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_value(raw))
    }
}

impl Serialize for DeltaOp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown { op, data } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("op", op)?;
                if let Some(fields) = data.as_object() {
                    for (key, value) in fields {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
            known => DeltaOp::serialize(known, serializer),
        }
    }
}

/// Fold `ops` left to right onto a copy of `message` and return the result.
///
/// The input is never modified. Splitting a batch anywhere and applying the
/// halves in sequence gives the same result as applying it whole.
pub fn apply_delta_ops(message: &ChatMessage, ops: &[DeltaOp]) -> ChatMessage {
    let mut next = message.clone();
    for op in ops {
        op.apply(&mut next);
    }
    next
}
