//! HTTP wire types shared by the daemon and `deskbridgectl`.

use serde::{Deserialize, Serialize};

use crate::model::{Identity, Point};

/// Chat gateway pushes one inbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundRequest {
    pub sender: Identity,
    pub text: String,
}

/// What happened to an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InboundStatus {
    Denied,
    Echo,
    Duplicate,
    Throttled,
    TooShort,
    Dispatched,
    DispatchFailed,
}

/// Inbound response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundResponse {
    pub ok: bool,
    pub status: InboundStatus,
    /// Text the gateway should send back to the caller, if any.
    pub replies: Vec<String>,
}

/// Front-end command request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub sender: Identity,
}

/// Front-end command response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub ok: bool,
    pub reply: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CommandData>,
}

/// Structured payload for commands that report state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandData {
    Status(StatusReport),
    Monitor(MonitorStatus),
    Calibration(CalibrationReport),
    Relay { delivered: usize, attempted: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub messages_received: u64,
    pub messages_sent: u64,
    pub errors: u64,
    pub security_mode: bool,
    pub allowed_users: usize,
    pub monitoring_enabled: bool,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub capture_region: Point,
    /// Unix seconds of the last relayed snapshot.
    pub last_snapshot_at: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationReport {
    pub input_field: Point,
    pub submit_button: Point,
    pub response_area: Point,
    pub submit_shortcut: Option<String>,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
