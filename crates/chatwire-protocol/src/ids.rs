//! Typed identifiers and the per-chat sequence marker.
//!
//! IDs are opaque String wrappers (serde-transparent). The backend chooses the
//! format; the client only compares and echoes them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

macro_rules! typed_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from any string value.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// View as string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

typed_id!(
    /// Identifier of a chat thread. Subscriptions are scoped to one chat.
    ChatId
);
typed_id!(
    /// Identifier of one message within a chat.
    MessageId
);
typed_id!(
    /// Correlation id a client attaches to a command; echoed back in `ack`.
    ClientRequestId
);

/// Per-chat sequence marker carried by every envelope.
///
/// The wire value may be a string or a number; it is always surfaced as a
/// string. Monotonicity is not checked here: callers that care about gaps
/// compare values themselves (see [`Seq::as_number`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Seq(String);

impl Seq {
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Normalize a raw wire value.
    ///
    /// Strings pass through, numbers are coerced to their decimal form
    /// (`42`, `42.0` and `"42"` all become `"42"`), `null` becomes empty and
    /// anything else keeps its compact JSON text.
    pub fn from_wire(value: &Value) -> Self {
        match value {
            Value::String(s) => Self(s.clone()),
            Value::Number(n) => Self(normalize_number(n)),
            Value::Null => Self::default(),
            other => Self(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse as an unsigned integer, if the marker is numeric.
    pub fn as_number(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

fn normalize_number(n: &serde_json::Number) -> String {
    if let Some(u) = n.as_u64() {
        return u.to_string();
    }
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        // Integral floats within the exactly-representable range print without a fraction.
        Some(f) if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 => (f as i64).to_string(),
        _ => n.to_string(),
    }
}

impl<'de> Deserialize<'de> for Seq {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(Self::from_wire(&raw))
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Seq {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<u64> for Seq {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}
