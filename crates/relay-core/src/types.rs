use serde::{Deserialize, Serialize};

/// Stable opaque identifier for a conversation (the "chat id", §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A registered conversation (§3 Conversation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub display_name: String,
    /// Folder slug used for file mounts (`groups/<folder>/`, `sessions/<folder>/`).
    pub folder_slug: String,
    /// Token that gates admission (§4.5). `None` means "admit everything".
    pub trigger_token: Option<String>,
    pub is_main: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Conversation {
    /// Whether a message body satisfies this conversation's trigger policy.
    pub fn matches_trigger(&self, body: &str) -> bool {
        match &self.trigger_token {
            None => true,
            Some(token) => body.contains(token.as_str()),
        }
    }
}

/// A single inbound chat message (§3 Message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub conversation: ConversationId,
    pub body: String,
    pub author: String,
    /// Wall-clock time the dispatcher observed this message.
    pub received_at: chrono::DateTime<chrono::Utc>,
    /// Timestamp asserted by the origin channel — may be out of order on retry.
    pub origin_timestamp: chrono::DateTime<chrono::Utc>,
    /// Idempotency key. A Message is processed at most once to completion.
    pub delivery_id: String,
    /// Set when this message was synthesized by the scheduler or heartbeat
    /// rather than originating from a live participant (§4.9).
    #[serde(default)]
    pub synthetic: Option<SyntheticOrigin>,
}

/// Why a Message was synthesized rather than received from a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticOrigin {
    Scheduled,
    Heartbeat,
}

/// Outbound reply to an originating channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundReply {
    pub conversation: ConversationId,
    pub body: String,
    pub sender_tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_none_admits_anything() {
        let conv = Conversation {
            id: "c1".into(),
            display_name: "c1".into(),
            folder_slug: "c1".into(),
            trigger_token: None,
            is_main: false,
            created_at: chrono::Utc::now(),
        };
        assert!(conv.matches_trigger("anything at all"));
    }

    #[test]
    fn trigger_requires_substring_match() {
        let conv = Conversation {
            id: "c1".into(),
            display_name: "c1".into(),
            folder_slug: "c1".into(),
            trigger_token: Some("@Andy".into()),
            is_main: false,
            created_at: chrono::Utc::now(),
        };
        assert!(conv.matches_trigger("@Andy hello"));
        assert!(!conv.matches_trigger("hello there"));
    }
}
