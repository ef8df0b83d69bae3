//! Event envelopes delivered on a chat subscription.
//!
//! Every envelope is a flat JSON object tagged by `type`, carrying `chat_id`
//! and `seq` next to the kind-specific fields.
//!
//! Forward-compatible: unknown `type` tags, and known tags whose fields do not
//! have the expected shape, decode into `EventKind::Unknown { event_type, data }`
//! instead of failing.

use crate::delta::DeltaOp;
use crate::error::{ProtocolError, ProtocolResult};
use crate::ids::{ChatId, ClientRequestId, MessageId, Seq};
use crate::message::{ChatMessage, FinishReason};
use crate::thread::{PauseReason, RuntimeState, ThreadParams, ThreadPatch};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// One server-to-client event on a chat subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct EventEnvelope {
    pub chat_id: ChatId,
    /// Per-chat sequence marker, always a string.
    pub seq: Seq,
    pub kind: EventKind,
}

/// Discriminated union of all subscription event kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(remote = "Self", tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum EventKind {
    /// Full state of the chat, sent first on every (re)subscription.
    Snapshot {
        #[serde(default)]
        thread: ThreadParams,
        #[serde(default)]
        runtime: RuntimeState,
        #[serde(default)]
        messages: Vec<ChatMessage>,
    },
    StreamStarted {
        message_id: MessageId,
    },
    StreamDelta {
        message_id: MessageId,
        #[serde(default)]
        ops: Vec<DeltaOp>,
    },
    StreamFinished {
        message_id: MessageId,
        #[serde(default)]
        finish_reason: Option<FinishReason>,
    },
    MessageAdded {
        message: ChatMessage,
        index: usize,
    },
    MessageUpdated {
        message_id: MessageId,
        message: ChatMessage,
    },
    MessageRemoved {
        message_id: MessageId,
    },
    /// Every message at or after `from_index` was dropped.
    MessagesTruncated {
        from_index: usize,
    },
    ThreadUpdated(ThreadPatch),
    RuntimeUpdated(RuntimeState),
    TitleUpdated {
        title: String,
        #[serde(default)]
        is_generated: bool,
    },
    PauseRequired {
        reasons: Vec<PauseReason>,
    },
    PauseCleared,
    /// The backend asks the IDE to run a tool locally.
    IdeToolRequired {
        tool_call_id: String,
        tool_name: String,
        #[serde(default)]
        args: Value,
    },
    /// Reply to a client command.
    Ack {
        client_request_id: ClientRequestId,
        accepted: bool,
        #[serde(default)]
        result: Option<Value>,
    },
    #[serde(skip)]
    Unknown {
        event_type: String,
        data: Value,
    },
}

impl EventKind {
    /// Decode the kind-specific part of an envelope, falling back to `Unknown`.
    pub fn from_value(value: Value) -> Self {
        match EventKind::deserialize(&value) {
            Ok(kind) => kind,
            Err(_) => {
                let event_type = value
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_owned();
                let mut data = value;
                if let Some(obj) = data.as_object_mut() {
                    obj.remove("type");
                }
                EventKind::Unknown { event_type, data }
            }
        }
    }

    /// The wire `type` tag.
    pub fn event_type(&self) -> &str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::StreamStarted { .. } => "stream_started",
            Self::StreamDelta { .. } => "stream_delta",
            Self::StreamFinished { .. } => "stream_finished",
            Self::MessageAdded { .. } => "message_added",
            Self::MessageUpdated { .. } => "message_updated",
            Self::MessageRemoved { .. } => "message_removed",
            Self::MessagesTruncated { .. } => "messages_truncated",
            Self::ThreadUpdated(_) => "thread_updated",
            Self::RuntimeUpdated(_) => "runtime_updated",
            Self::TitleUpdated { .. } => "title_updated",
            Self::PauseRequired { .. } => "pause_required",
            Self::PauseCleared => "pause_cleared",
            Self::IdeToolRequired { .. } => "ide_tool_required",
            Self::Ack { .. } => "ack",
            Self::Unknown { event_type, .. } => event_type,
        }
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_value(raw))
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Unknown { event_type, data } => {
                let mut map = serializer.serialize_map(None)?;
                map.serialize_entry("type", event_type)?;
                if let Some(fields) = data.as_object() {
                    for (key, value) in fields {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.end()
            }
            known => EventKind::serialize(known, serializer),
        }
    }
}

impl EventEnvelope {
    pub fn new(chat_id: impl Into<ChatId>, seq: impl Into<Seq>, kind: EventKind) -> Self {
        Self {
            chat_id: chat_id.into(),
            seq: seq.into(),
            kind,
        }
    }

    /// Decode a wire object without strict validation.
    ///
    /// A missing `chat_id` or `seq` becomes empty; a numeric `seq` is coerced
    /// to its string form. Only a non-object value is rejected.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        let mut fields = match value {
            Value::Object(fields) => fields,
            other => {
                return Err(ProtocolError::NotAnObject {
                    found: json_type_name(&other),
                });
            }
        };
        let chat_id = match fields.remove("chat_id") {
            Some(Value::String(id)) => ChatId::from(id),
            None | Some(Value::Null) => ChatId::default(),
            Some(other) => ChatId::from(other.to_string()),
        };
        let seq = fields
            .remove("seq")
            .map(|raw| Seq::from_wire(&raw))
            .unwrap_or_default();
        Ok(Self {
            chat_id,
            seq,
            kind: EventKind::from_value(Value::Object(fields)),
        })
    }

    /// Flat wire form: `type`, `chat_id`, `seq`, then the kind's fields.
    pub fn to_value(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.event_type().to_owned()));
        out.insert("chat_id".into(), Value::String(self.chat_id.as_str().to_owned()));
        out.insert("seq".into(), Value::String(self.seq.as_str().to_owned()));
        if let Ok(Value::Object(fields)) = serde_json::to_value(&self.kind) {
            for (key, value) in fields {
                if key != "type" {
                    out.insert(key, value);
                }
            }
        }
        Value::Object(out)
    }

    pub fn event_type(&self) -> &str {
        self.kind.event_type()
    }

    /// The message this event targets, for message-scoped kinds.
    pub fn message_id(&self) -> Option<&MessageId> {
        match &self.kind {
            EventKind::StreamStarted { message_id }
            | EventKind::StreamDelta { message_id, .. }
            | EventKind::StreamFinished { message_id, .. }
            | EventKind::MessageUpdated { message_id, .. }
            | EventKind::MessageRemoved { message_id } => Some(message_id),
            EventKind::MessageAdded { message, .. } => message.message_id.as_ref(),
            _ => None,
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl<'de> Deserialize<'de> for EventEnvelope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Self::from_value(raw).map_err(D::Error::custom)
    }
}

impl Serialize for EventEnvelope {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}
