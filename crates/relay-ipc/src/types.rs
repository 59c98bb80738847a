use serde::{Deserialize, Serialize};

/// Bootstrap document piped to the agent's stdin at container start (§6
/// Agent contract).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentBootstrap {
    pub prompt: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub group_folder: String,
    pub chat_jid: String,
    pub is_main: bool,
    #[serde(default)]
    pub is_scheduled_task: bool,
    #[serde(default)]
    pub secrets: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnStatus {
    Success,
    Error,
}

/// The exactly-one framed result an agent emits to close out a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: TurnStatus,
    pub result: Option<String>,
    #[serde(default)]
    pub new_session_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A numbered interim message the agent may push mid-turn (§4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterimMessage {
    pub sequence: u64,
    pub body: String,
}
