//! Data carried between the bridge components.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque caller id on the chat side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub i64);

impl Identity {
    /// Raw chat id.
    pub fn id(self) -> i64 {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Identity {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A chat message received from the control channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: Identity,
    pub text: String,
    pub received_at_ms: i64,
}

impl InboundMessage {
    /// Builds a message, trimming surrounding whitespace from `text`.
    pub fn new(sender: Identity, text: &str, received_at_ms: i64) -> Self {
        Self {
            sender,
            text: text.trim().to_string(),
            received_at_ms,
        }
    }
}

/// The most recently relayed application output.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutputSnapshot {
    pub text: String,
    /// Zero when nothing has been relayed yet.
    pub captured_at_ms: i64,
}

impl OutputSnapshot {
    /// True before the first successful relay.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.captured_at_ms == 0
    }
}

/// Per-recipient result of one relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Success,
    Failure,
}

/// One send to one recipient during a relay cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayAttempt {
    pub target: Identity,
    pub text: String,
    pub outcome: DeliveryOutcome,
}

/// Screen coordinates in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// How the dispatcher submits injected text. Exactly one path is ever used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmitMethod {
    /// Key combination such as `ctrl+enter`.
    Shortcut { keys: String },
    /// Click on the send button.
    Click { target: Point },
}

impl SubmitMethod {
    /// Picks the shortcut when it is set and not `none`, otherwise the click target.
    pub fn resolve(shortcut: Option<&str>, click_target: Point) -> Self {
        match shortcut.map(str::trim) {
            Some(keys) if !keys.is_empty() && !keys.eq_ignore_ascii_case("none") => {
                Self::Shortcut {
                    keys: keys.to_string(),
                }
            }
            _ => Self::Click {
                target: click_target,
            },
        }
    }
}

/// Result of one Action Dispatcher run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Success,
    Failure,
}

impl DispatchOutcome {
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}
