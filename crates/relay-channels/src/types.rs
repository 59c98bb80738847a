use serde::{Deserialize, Serialize};

use relay_core::types::{Conversation, Message, OutboundReply};

/// A message as delivered by a channel adapter, ahead of bus admission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInbound {
    pub channel: String,
    pub message: Message,
}

/// A reply routed back out through a channel adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelOutbound {
    pub channel: String,
    pub reply: OutboundReply,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    Connected,
    Connecting,
    Disconnected,
    Error(String),
}

/// Registration details a channel contributes for a conversation it serves.
#[derive(Debug, Clone)]
pub struct ChannelConversation {
    pub conversation: Conversation,
    pub channel: String,
}
