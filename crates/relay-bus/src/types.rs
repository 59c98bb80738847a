use relay_core::types::{ConversationId, Message};

/// An ordered, coalesced run of admitted messages for one conversation,
/// handed off to the Group Queue as a single unit (§4.5).
#[derive(Debug, Clone)]
pub struct MessageBatch {
    pub conversation: ConversationId,
    /// Non-decreasing by `received_at` (§8 invariant).
    pub messages: Vec<Message>,
}

impl MessageBatch {
    pub fn single(message: Message) -> Self {
        Self {
            conversation: message.conversation.clone(),
            messages: vec![message],
        }
    }
}
