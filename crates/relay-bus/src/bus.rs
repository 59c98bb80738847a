use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use tokio::time::{sleep, Duration};
use tracing::debug;

use relay_core::types::{ConversationId, Message};

use crate::dedupe::DeliveryDedupe;
use crate::error::{BusError, Result};
use crate::registry::ConversationRegistry;
use crate::sink::BatchSink;
use crate::types::MessageBatch;

const DEBOUNCE_WINDOW_MS: u64 = 100;

/// One inbox per conversation: admission, debounce/coalescing, and dedupe
/// ahead of the Group Queue (§4.5).
pub struct Bus {
    registry: Arc<ConversationRegistry>,
    dedupe: Arc<DeliveryDedupe>,
    sink: Arc<dyn BatchSink>,
    pending: Arc<Mutex<HashMap<ConversationId, Vec<Message>>>>,
    debounce_window: Duration,
}

impl Bus {
    pub fn new(registry: Arc<ConversationRegistry>, sink: Arc<dyn BatchSink>) -> Self {
        Self {
            registry,
            dedupe: Arc::new(DeliveryDedupe::new()),
            sink,
            pending: Arc::new(Mutex::new(HashMap::new())),
            debounce_window: Duration::from_millis(DEBOUNCE_WINDOW_MS),
        }
    }

    #[cfg(test)]
    fn with_debounce_window(
        registry: Arc<ConversationRegistry>,
        sink: Arc<dyn BatchSink>,
        window: Duration,
    ) -> Self {
        let mut bus = Self::new(registry, sink);
        bus.debounce_window = window;
        bus
    }

    /// Submit an inbound message. Admission and dedupe happen synchronously;
    /// on success the message joins (or opens) this conversation's debounce
    /// window, and a flush is scheduled if one isn't already pending.
    pub fn submit(&self, message: Message) -> Result<()> {
        self.registry.admits(&message)?;

        if !self.dedupe.admit(&message.delivery_id) {
            return Err(BusError::DuplicateDelivery(message.delivery_id));
        }

        let conversation = message.conversation.clone();
        let should_schedule = {
            let mut pending = self.pending.lock().unwrap();
            let buffer = pending.entry(conversation.clone()).or_default();
            buffer.push(message);
            buffer.len() == 1
        };

        if should_schedule {
            self.schedule_flush(conversation);
        }

        Ok(())
    }

    fn schedule_flush(&self, conversation: ConversationId) {
        let pending = self.pending.clone();
        let sink = self.sink.clone();
        let window = self.debounce_window;

        tokio::spawn(async move {
            sleep(window).await;

            let batch_messages = {
                let mut pending = pending.lock().unwrap();
                pending.remove(&conversation)
            };

            let Some(mut messages) = batch_messages else {
                return;
            };
            if messages.is_empty() {
                return;
            }

            // Strict received-at ordering regardless of arrival interleaving.
            messages.sort_by_key(|m| m.received_at);

            debug!(
                conversation = %conversation,
                count = messages.len(),
                "flushing debounced batch"
            );

            sink.accept(MessageBatch {
                conversation,
                messages,
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::Conversation;

    fn registry_with(id: &str, trigger: Option<&str>) -> Arc<ConversationRegistry> {
        let registry = Arc::new(ConversationRegistry::new());
        registry.register(Conversation {
            id: ConversationId::from(id),
            display_name: id.to_string(),
            folder_slug: id.to_string(),
            trigger_token: trigger.map(str::to_string),
            is_main: false,
            created_at: chrono::Utc::now(),
        });
        registry
    }

    fn message(conversation: &str, delivery_id: &str, body: &str) -> Message {
        Message {
            conversation: ConversationId::from(conversation),
            body: body.to_string(),
            author: "alice".to_string(),
            received_at: chrono::Utc::now(),
            origin_timestamp: chrono::Utc::now(),
            delivery_id: delivery_id.to_string(),
            synthetic: None,
        }
    }

    #[tokio::test]
    async fn duplicate_delivery_id_is_rejected() {
        let registry = registry_with("c1", None);
        let (sink, _rx) = crate::sink::ChannelSink::new();
        let bus = Bus::new(registry, Arc::new(sink));

        bus.submit(message("c1", "m1", "hi")).unwrap();
        let err = bus.submit(message("c1", "m1", "hi again")).unwrap_err();
        assert!(matches!(err, BusError::DuplicateDelivery(_)));
    }

    #[tokio::test]
    async fn unregistered_conversation_is_rejected() {
        let registry = Arc::new(ConversationRegistry::new());
        let (sink, _rx) = crate::sink::ChannelSink::new();
        let bus = Bus::new(registry, Arc::new(sink));

        let err = bus.submit(message("ghost", "m1", "hi")).unwrap_err();
        assert!(matches!(err, BusError::UnregisteredConversation(_)));
    }

    #[tokio::test]
    async fn messages_within_window_coalesce_into_one_batch() {
        let registry = registry_with("c1", None);
        let (sink, mut rx) = crate::sink::ChannelSink::new();
        let bus = Bus::with_debounce_window(registry, Arc::new(sink), Duration::from_millis(50));

        bus.submit(message("c1", "m1", "hello")).unwrap();
        bus.submit(message("c1", "m2", "also this")).unwrap();

        let batch = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(batch.messages.len(), 2);
        assert_eq!(batch.messages[0].delivery_id, "m1");
        assert_eq!(batch.messages[1].delivery_id, "m2");
    }

    #[tokio::test]
    async fn messages_outside_window_form_separate_batches() {
        let registry = registry_with("c1", None);
        let (sink, mut rx) = crate::sink::ChannelSink::new();
        let bus = Bus::with_debounce_window(registry, Arc::new(sink), Duration::from_millis(30));

        bus.submit(message("c1", "m1", "hello")).unwrap();
        let first = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.messages.len(), 1);

        bus.submit(message("c1", "m2", "later")).unwrap();
        let second = tokio::time::timeout(Duration::from_millis(500), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.messages.len(), 1);
    }
}
