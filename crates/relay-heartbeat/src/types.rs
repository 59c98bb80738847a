use serde::{Deserialize, Serialize};

pub const HEARTBEAT_OK_TOKEN: &str = "HEARTBEAT_OK";

/// A single configured heartbeat check (§4.10).
#[derive(Debug, Clone)]
pub struct HeartbeatJob {
    pub id: String,
    pub conversation: String,
    pub prompt: String,
}

/// The agent's verdict for one heartbeat invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeartbeatResult {
    Ok,
    Alert(String),
}

impl HeartbeatResult {
    /// Parse the agent's raw response body (§4.10: literal `HEARTBEAT_OK`
    /// or a free-form alert).
    pub fn from_response(body: &str) -> Self {
        if body.trim() == HEARTBEAT_OK_TOKEN {
            HeartbeatResult::Ok
        } else {
            HeartbeatResult::Alert(body.to_string())
        }
    }
}

/// Delivery policy knobs (§4.10).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    pub show_ok: bool,
    pub show_alerts: bool,
    pub use_indicator: bool,
    pub delivery_muted: bool,
    pub alert_repeat_cooldown_ms: u64,
}
