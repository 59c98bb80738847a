use serde::{Deserialize, Serialize};

use relay_core::types::Message;

/// Lifecycle state of a queue entry (§4.6 transition diagram).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Pending,
    InFlight,
    Done,
    Retry,
    DeadLetter,
}

impl EntryState {
    pub fn as_str(self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::InFlight => "in_flight",
            EntryState::Done => "done",
            EntryState::Retry => "retry",
            EntryState::DeadLetter => "dead_letter",
        }
    }
}

impl std::str::FromStr for EntryState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EntryState::Pending),
            "in_flight" => Ok(EntryState::InFlight),
            "done" => Ok(EntryState::Done),
            "retry" => Ok(EntryState::Retry),
            "dead_letter" => Ok(EntryState::DeadLetter),
            other => Err(format!("unknown queue entry state: {other}")),
        }
    }
}

/// A persisted unit of work: one admitted batch for one conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub conversation: String,
    pub messages: Vec<Message>,
    pub state: EntryState,
    pub attempt: u32,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Reason a batch was dropped instead of enqueued (§4.6 overflow policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    pub id: String,
    pub conversation: String,
    pub messages: Vec<Message>,
    pub reason: String,
    pub attempt: u32,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
