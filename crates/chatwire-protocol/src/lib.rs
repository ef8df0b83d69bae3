//! # chatwire-protocol: chat subscription wire contract
//!
//! This crate defines the types carried on a chat subscription stream and the
//! pure reducers that fold incremental updates into message snapshots.
//!
//! No async runtime, no HTTP client: any consumer of the stream can depend on
//! it as a plain contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`]: Typed ID wrappers (ChatId, MessageId, ClientRequestId) and [`Seq`]
//! - [`event`]: EventEnvelope + EventKind (15 wire kinds, forward-compatible)
//! - [`message`]: ChatMessage, Role, content parts, usage
//! - [`thread`]: ThreadParams, ThreadPatch, RuntimeState, PauseReason
//! - [`delta`]: DeltaOp and the `apply_delta_ops` reducer
//! - [`tool`]: ToolCall fragments, `merge_tool_calls`, `validate_tool_call`
//! - [`error`]: ProtocolError, ToolCallError

/// Declares a string-valued wire enum that is not closed at decode time:
/// unknown values land in an `Other(String)` arm instead of failing.
macro_rules! open_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// A value this client does not know yet, kept verbatim.
            Other(String),
        }

        impl $name {
            /// The wire spelling of this value.
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(s) => s.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(s),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(s) => s,
                    known => known.as_str().to_owned(),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod delta;
pub mod error;
pub mod event;
pub mod ids;
pub mod message;
pub mod thread;
pub mod tool;

// Re-export the most commonly used types at the crate root.
pub use delta::{DeltaOp, apply_delta_ops};
pub use error::{ProtocolError, ProtocolResult, ToolCallError};
pub use event::{EventEnvelope, EventKind};
pub use ids::{ChatId, ClientRequestId, MessageId, Seq};
pub use message::{ChatMessage, ContentPart, FinishReason, ImageUrl, MessageContent, Role, Usage};
pub use thread::{PauseKind, PauseReason, RunState, RuntimeState, ThreadParams, ThreadPatch};
pub use tool::{ToolCall, ToolCallFunction, merge_tool_calls, validate_tool_call};
