use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::warn;

use relay_core::types::Message;

use crate::backoff::backoff_for;
use crate::deadletter;
use crate::error::Result;
use crate::store::QueueStore;
use crate::types::{EntryState, QueueEntry};

/// Per-conversation bounded FIFO with at-most-one-in-flight admission and
/// durable transition logging (§4.6).
pub struct GroupQueue {
    store: Arc<QueueStore>,
    capacity: usize,
    max_attempts: u32,
    backoff_cap_ms: u64,
    dead_letter_dir: PathBuf,
    buffers: Mutex<HashMap<String, VecDeque<String>>>,
    in_flight: Mutex<HashSet<String>>,
}

impl GroupQueue {
    pub fn new(
        store: Arc<QueueStore>,
        capacity: usize,
        max_attempts: u32,
        backoff_cap_ms: u64,
        dead_letter_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            capacity,
            max_attempts,
            backoff_cap_ms,
            dead_letter_dir: dead_letter_dir.into(),
            buffers: Mutex::new(HashMap::new()),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Persist and enqueue a batch. If the conversation's buffer is already
    /// at capacity, the oldest pending entry is dropped to a dead-letter
    /// record with a warning (§4.6 overflow policy).
    pub fn enqueue(&self, conversation: &str, messages: &[Message]) -> Result<QueueEntry> {
        let messages_json = serde_json::to_string(messages)?;
        let entry = self.store.insert_pending(conversation, &messages_json)?;

        let overflowed = {
            let mut buffers = self.buffers.lock().unwrap();
            let buffer = buffers.entry(conversation.to_string()).or_default();
            buffer.push_back(entry.id.clone());

            if buffer.len() > self.capacity {
                buffer.pop_front()
            } else {
                None
            }
        };

        if let Some(dropped_id) = overflowed {
            self.drop_overflowed(&dropped_id)?;
        }

        Ok(entry)
    }

    fn drop_overflowed(&self, entry_id: &str) -> Result<()> {
        let dropped = self.store.get(entry_id)?;
        warn!(
            conversation = %dropped.conversation,
            entry = %entry_id,
            "queue capacity exceeded, dropping oldest pending entry"
        );
        let record = deadletter::new_record(
            &dropped.conversation,
            dropped.messages.clone(),
            "queue capacity exceeded",
            dropped.attempt,
        );
        deadletter::write(&self.dead_letter_dir, &record)?;
        self.store.set_state(entry_id, EntryState::DeadLetter, dropped.attempt)?;
        Ok(())
    }

    /// Pop the next pending entry for a conversation, if none is already
    /// in-flight for it.
    pub fn acquire_next(&self, conversation: &str) -> Result<Option<QueueEntry>> {
        {
            let in_flight = self.in_flight.lock().unwrap();
            if in_flight.contains(conversation) {
                return Ok(None);
            }
        }

        let entry_id = {
            let mut buffers = self.buffers.lock().unwrap();
            buffers
                .get_mut(conversation)
                .and_then(|buffer| buffer.pop_front())
        };

        let Some(entry_id) = entry_id else {
            return Ok(None);
        };

        let current = self.store.get(&entry_id)?;
        self.store
            .set_state(&entry_id, EntryState::InFlight, current.attempt)?;
        self.in_flight.lock().unwrap().insert(conversation.to_string());
        Ok(Some(self.store.get(&entry_id)?))
    }

    pub fn complete(&self, entry: &QueueEntry) -> Result<()> {
        self.store.set_state(&entry.id, EntryState::Done, entry.attempt)?;
        self.in_flight.lock().unwrap().remove(&entry.conversation);
        Ok(())
    }

    /// Retry or dead-letter an in-flight entry that failed (§4.6).
    pub async fn fail(&self, entry: &QueueEntry) -> Result<()> {
        let attempt = entry.attempt + 1;
        self.in_flight.lock().unwrap().remove(&entry.conversation);

        if attempt >= self.max_attempts {
            self.store
                .set_state(&entry.id, EntryState::DeadLetter, attempt)?;
            let record = deadletter::new_record(
                &entry.conversation,
                entry.messages.clone(),
                "attempt cap reached",
                attempt,
            );
            deadletter::write(&self.dead_letter_dir, &record)?;
            return Ok(());
        }

        self.store.set_state(&entry.id, EntryState::Retry, attempt)?;
        let delay = backoff_for(attempt, self.backoff_cap_ms);

        tokio::time::sleep(delay).await;
        self.store
            .set_state(&entry.id, EntryState::Pending, attempt)?;
        let mut buffers = self.buffers.lock().unwrap();
        buffers
            .entry(entry.conversation.clone())
            .or_default()
            .push_front(entry.id.clone());
        Ok(())
    }

    pub fn queue_depth(&self, conversation: &str) -> usize {
        self.buffers
            .lock()
            .unwrap()
            .get(conversation)
            .map(VecDeque::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::types::ConversationId;

    fn message(conversation: &str, id: &str) -> Message {
        Message {
            conversation: ConversationId::from(conversation),
            body: "hi".to_string(),
            author: "alice".to_string(),
            received_at: chrono::Utc::now(),
            origin_timestamp: chrono::Utc::now(),
            delivery_id: id.to_string(),
            synthetic: None,
        }
    }

    fn test_queue(capacity: usize, max_attempts: u32) -> GroupQueue {
        let store = Arc::new(QueueStore::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap().into_path();
        GroupQueue::new(store, capacity, max_attempts, 1, dir)
    }

    #[test]
    fn enqueue_then_acquire_returns_in_order() {
        let queue = test_queue(20, 5);
        queue.enqueue("c1", &[message("c1", "m1")]).unwrap();
        queue.enqueue("c1", &[message("c1", "m2")]).unwrap();

        let first = queue.acquire_next("c1").unwrap().unwrap();
        assert_eq!(first.messages[0].delivery_id, "m1");
    }

    #[test]
    fn at_most_one_in_flight_per_conversation() {
        let queue = test_queue(20, 5);
        queue.enqueue("c1", &[message("c1", "m1")]).unwrap();
        queue.enqueue("c1", &[message("c1", "m2")]).unwrap();

        let first = queue.acquire_next("c1").unwrap().unwrap();
        let second = queue.acquire_next("c1").unwrap();
        assert!(second.is_none());

        queue.complete(&first).unwrap();
        let third = queue.acquire_next("c1").unwrap().unwrap();
        assert_eq!(third.messages[0].delivery_id, "m2");
    }

    #[test]
    fn overflow_drops_oldest_to_dead_letter() {
        let queue = test_queue(1, 5);
        queue.enqueue("c1", &[message("c1", "m1")]).unwrap();
        queue.enqueue("c1", &[message("c1", "m2")]).unwrap();

        // m1 was dropped; only m2 remains in the buffer.
        let next = queue.acquire_next("c1").unwrap().unwrap();
        assert_eq!(next.messages[0].delivery_id, "m2");
    }

    #[tokio::test]
    async fn fail_beyond_max_attempts_dead_letters() {
        let queue = test_queue(20, 1);
        queue.enqueue("c1", &[message("c1", "m1")]).unwrap();
        let entry = queue.acquire_next("c1").unwrap().unwrap();

        queue.fail(&entry).await.unwrap();
        let updated = queue.store.get(&entry.id).unwrap();
        assert_eq!(updated.state, EntryState::DeadLetter);
    }

    #[tokio::test]
    async fn fail_under_cap_requeues_for_retry() {
        let queue = test_queue(20, 5);
        queue.enqueue("c1", &[message("c1", "m1")]).unwrap();
        let entry = queue.acquire_next("c1").unwrap().unwrap();

        queue.fail(&entry).await.unwrap();
        let requeued = queue.acquire_next("c1").unwrap().unwrap();
        assert_eq!(requeued.attempt, 1);
    }
}
