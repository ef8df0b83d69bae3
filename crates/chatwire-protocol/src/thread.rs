//! Thread parameters and runtime state of a chat.
//!
//! `ThreadParams` is the full description sent in a snapshot; `ThreadPatch`
//! is the sparse, extensible form carried by `thread_updated`.
//! `RuntimeState` describes what the backend is doing for the chat right now.

use crate::ids::ChatId;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Full thread configuration, as sent in a `snapshot`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThreadParams {
    pub id: ChatId,
    pub title: String,
    pub model: String,
    /// Free-form chat mode (e.g. `AGENT`, `EXPLORE`, `QUICK`).
    pub mode: String,
    pub tool_use: String,
    pub boost_reasoning: bool,
    pub context_tokens_cap: Option<u64>,
    pub include_project_info: bool,
    pub checkpoints_enabled: bool,
    pub is_title_generated: bool,
}

/// Sparse update to [`ThreadParams`].
///
/// Every field is optional; absent means "unchanged". Fields this client does
/// not know are kept in `extensions`, in wire order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boost_reasoning: Option<bool>,
    /// `Some(None)` clears the cap; `None` leaves it unchanged.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub context_tokens_cap: Option<Option<u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_project_info: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoints_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_title_generated: Option<bool>,
    #[serde(flatten)]
    pub extensions: IndexMap<String, Value>,
}

/// Distinguishes an explicit `null` from an absent field.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl ThreadParams {
    /// Overwrite every field the patch carries; keep the rest.
    pub fn apply_patch(&mut self, patch: &ThreadPatch) {
        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(model) = &patch.model {
            self.model.clone_from(model);
        }
        if let Some(mode) = &patch.mode {
            self.mode.clone_from(mode);
        }
        if let Some(tool_use) = &patch.tool_use {
            self.tool_use.clone_from(tool_use);
        }
        if let Some(boost_reasoning) = patch.boost_reasoning {
            self.boost_reasoning = boost_reasoning;
        }
        if let Some(cap) = patch.context_tokens_cap {
            self.context_tokens_cap = cap;
        }
        if let Some(include_project_info) = patch.include_project_info {
            self.include_project_info = include_project_info;
        }
        if let Some(checkpoints_enabled) = patch.checkpoints_enabled {
            self.checkpoints_enabled = checkpoints_enabled;
        }
        if let Some(is_title_generated) = patch.is_title_generated {
            self.is_title_generated = is_title_generated;
        }
    }
}

open_enum!(
    /// What the backend is doing for the chat.
    RunState {
        Idle => "idle",
        Generating => "generating",
        ExecutingTools => "executing_tools",
        Paused => "paused",
        /// Waiting for the IDE to run a tool locally.
        WaitingIde => "waiting_ide",
        Error => "error",
    }
);

impl Default for RunState {
    fn default() -> Self {
        Self::Idle
    }
}

open_enum!(
    /// Why a tool call needs the user.
    PauseKind {
        Confirmation => "confirmation",
        Denial => "denial",
    }
);

impl Default for PauseKind {
    fn default() -> Self {
        Self::Confirmation
    }
}

/// A tool call held back until the user confirms it (or was denied outright).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PauseReason {
    #[serde(rename = "type")]
    pub kind: PauseKind,
    pub command: String,
    pub rule: String,
    pub tool_call_id: String,
    pub integr_config_path: Option<String>,
}

/// Backend runtime state for a chat, as sent in `snapshot` and `runtime_updated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeState {
    pub state: RunState,
    pub paused: bool,
    pub error: Option<String>,
    pub queue_size: u64,
    pub pause_reasons: Vec<PauseReason>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_overwrites_present_fields_only() {
        let mut params = ThreadParams {
            title: "Old".into(),
            model: "gpt-4o".into(),
            context_tokens_cap: Some(8_000),
            ..ThreadParams::default()
        };
        let patch: ThreadPatch = serde_json::from_value(json!({
            "title": "New",
            "boost_reasoning": true
        }))
        .unwrap();

        params.apply_patch(&patch);
        assert_eq!(params.title, "New");
        assert_eq!(params.model, "gpt-4o");
        assert!(params.boost_reasoning);
        assert_eq!(params.context_tokens_cap, Some(8_000));
    }

    #[test]
    fn explicit_null_clears_token_cap() {
        let absent: ThreadPatch = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.context_tokens_cap, None);

        let cleared: ThreadPatch =
            serde_json::from_value(json!({"context_tokens_cap": null})).unwrap();
        assert_eq!(cleared.context_tokens_cap, Some(None));

        let mut params = ThreadParams {
            context_tokens_cap: Some(4_096),
            ..ThreadParams::default()
        };
        params.apply_patch(&cleared);
        assert_eq!(params.context_tokens_cap, None);
    }

    #[test]
    fn patch_keeps_extension_fields_in_order() {
        let patch: ThreadPatch = serde_json::from_value(json!({
            "model": "m",
            "zeta": 1,
            "alpha": {"nested": true}
        }))
        .unwrap();
        let keys: Vec<&str> = patch.extensions.keys().map(String::as_str).collect();
        assert_eq!(keys, ["zeta", "alpha"]);
        assert_eq!(patch.model.as_deref(), Some("m"));
    }

    #[test]
    fn runtime_state_tolerates_unknown_state() {
        let runtime: RuntimeState = serde_json::from_value(json!({
            "state": "compressing",
            "paused": false,
            "queue_size": 2
        }))
        .unwrap();
        assert_eq!(runtime.state, RunState::Other("compressing".into()));
        assert!(runtime.pause_reasons.is_empty());
        assert!(runtime.error.is_none());
    }

    #[test]
    fn pause_reason_reads_type_field() {
        let reason: PauseReason = serde_json::from_value(json!({
            "type": "denial",
            "command": "rm -rf /",
            "rule": "rm *",
            "tool_call_id": "call_1",
            "integr_config_path": null
        }))
        .unwrap();
        assert_eq!(reason.kind, PauseKind::Denial);
        assert_eq!(reason.tool_call_id, "call_1");
    }
}
