//! Tool calls and fragment merging.
//!
//! While a model streams a tool call, the call arrives in fragments that share
//! a positional `index`: the first usually carries `id`, `type` and the
//! function name, later ones carry successive pieces of the JSON arguments.
//! [`merge_tool_calls`] joins fragments by index; [`validate_tool_call`]
//! checks the accumulated result.

use crate::error::ToolCallError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

/// A (possibly partial) tool call record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Position of the call within the assistant turn. Stable across fragments.
    #[serde(default)]
    pub index: usize,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: ToolCallFunction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCallFunction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// JSON arguments, possibly incomplete while streaming.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub arguments: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl ToolCall {
    /// An empty fragment at `index`.
    pub fn new(index: usize) -> Self {
        Self {
            index,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_type(mut self, call_type: impl Into<String>) -> Self {
        self.call_type = Some(call_type.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.function.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, arguments: impl Into<String>) -> Self {
        self.function.arguments = arguments.into();
        self
    }

    /// Fold a later fragment with the same index into this record.
    ///
    /// Present `id`, `type` and `function.name` overwrite; absent ones keep
    /// the stored value. Argument text is appended.
    pub fn absorb(&mut self, fragment: &ToolCall) {
        if let Some(id) = &fragment.id {
            self.id = Some(id.clone());
        }
        if let Some(call_type) = &fragment.call_type {
            self.call_type = Some(call_type.clone());
        }
        if let Some(name) = &fragment.function.name {
            self.function.name = Some(name.clone());
        }
        self.function.arguments.push_str(&fragment.function.arguments);
    }
}

/// Merge incoming fragments into the stored tool calls, keyed by `index`.
///
/// Returns a new list in ascending index order. Incoming fragments without a
/// stored counterpart become new entries with exactly the fields they carry.
pub fn merge_tool_calls(stored: &[ToolCall], incoming: &[ToolCall]) -> Vec<ToolCall> {
    let mut by_index: BTreeMap<usize, ToolCall> = BTreeMap::new();
    for call in stored.iter().chain(incoming) {
        match by_index.entry(call.index) {
            Entry::Vacant(slot) => {
                slot.insert(call.clone());
            }
            Entry::Occupied(mut slot) => slot.get_mut().absorb(call),
        }
    }
    by_index.into_values().collect()
}

/// Check that a merged call is complete: it names a function and its
/// arguments parse as JSON. Empty arguments count as `{}`.
pub fn validate_tool_call(call: &ToolCall) -> Result<Value, ToolCallError> {
    if call.function.name.as_deref().is_none_or(str::is_empty) {
        return Err(ToolCallError::MissingName { index: call.index });
    }
    let arguments = call.function.arguments.trim();
    if arguments.is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_json::from_str(arguments).map_err(|source| ToolCallError::InvalidArguments {
        index: call.index,
        source,
    })
}
