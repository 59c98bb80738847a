use std::collections::HashMap;
use std::sync::RwLock;

use relay_core::types::{Conversation, ConversationId, Message};

use crate::error::{BusError, Result};

/// Registered conversations and their trigger policies (§4.5 admission (a)).
pub struct ConversationRegistry {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
}

impl ConversationRegistry {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, conversation: Conversation) {
        self.conversations
            .write()
            .unwrap()
            .insert(conversation.id.clone(), conversation);
    }

    pub fn unregister(&self, id: &ConversationId) {
        self.conversations.write().unwrap().remove(id);
    }

    pub fn get(&self, id: &ConversationId) -> Option<Conversation> {
        self.conversations.read().unwrap().get(id).cloned()
    }

    /// All registered conversations, for admin/health enumeration.
    pub fn list(&self) -> Vec<Conversation> {
        self.conversations.read().unwrap().values().cloned().collect()
    }

    /// Admission check (a)+(b): conversation registered and trigger matched.
    pub fn admits(&self, message: &Message) -> Result<()> {
        let conversations = self.conversations.read().unwrap();
        let conversation = conversations
            .get(&message.conversation)
            .ok_or_else(|| BusError::UnregisteredConversation(message.conversation.to_string()))?;

        if conversation.matches_trigger(&message.body) {
            Ok(())
        } else {
            Err(BusError::TriggerMismatch(message.conversation.to_string()))
        }
    }
}

impl Default for ConversationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(id: &str, trigger: Option<&str>) -> Conversation {
        Conversation {
            id: ConversationId::from(id),
            display_name: id.to_string(),
            folder_slug: id.to_string(),
            trigger_token: trigger.map(str::to_string),
            is_main: false,
            created_at: chrono::Utc::now(),
        }
    }

    fn message(conversation: &str, body: &str) -> Message {
        Message {
            conversation: ConversationId::from(conversation),
            body: body.to_string(),
            author: "alice".to_string(),
            received_at: chrono::Utc::now(),
            origin_timestamp: chrono::Utc::now(),
            delivery_id: "d1".to_string(),
            synthetic: None,
        }
    }

    #[test]
    fn unregistered_conversation_is_rejected() {
        let registry = ConversationRegistry::new();
        let err = registry.admits(&message("c1", "hello")).unwrap_err();
        assert!(matches!(err, BusError::UnregisteredConversation(_)));
    }

    #[test]
    fn registered_conversation_without_trigger_admits_anything() {
        let registry = ConversationRegistry::new();
        registry.register(conversation("c1", None));
        assert!(registry.admits(&message("c1", "hello")).is_ok());
    }

    #[test]
    fn trigger_mismatch_is_rejected() {
        let registry = ConversationRegistry::new();
        registry.register(conversation("c1", Some("@Andy")));
        let err = registry.admits(&message("c1", "no mention here")).unwrap_err();
        assert!(matches!(err, BusError::TriggerMismatch(_)));
    }

    #[test]
    fn list_returns_all_registered_conversations() {
        let registry = ConversationRegistry::new();
        registry.register(conversation("c1", None));
        registry.register(conversation("c2", None));
        let mut ids: Vec<_> = registry.list().into_iter().map(|c| c.id.to_string()).collect();
        ids.sort();
        assert_eq!(ids, vec!["c1".to_string(), "c2".to_string()]);
    }

    #[test]
    fn trigger_match_admits() {
        let registry = ConversationRegistry::new();
        registry.register(conversation("c1", Some("@Andy")));
        assert!(registry.admits(&message("c1", "@Andy hello")).is_ok());
    }
}
