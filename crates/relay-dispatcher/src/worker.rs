use std::sync::Arc;

use tracing::error;

use relay_bus::{BatchSink, MessageBatch};
use relay_channels::ChannelOutbound;
use relay_core::types::{ConversationId, OutboundReply};

use crate::state::DispatcherState;
use crate::turn::{run_turn, send_best_effort, TurnOutcome};

/// Feeds admitted batches into the Group Queue and makes sure exactly one
/// worker loop is draining each conversation (§4.6/§5 "a per-conversation
/// worker that serializes everything for that conversation").
pub struct QueueSink {
    state: Arc<DispatcherState>,
}

impl QueueSink {
    pub fn new(state: Arc<DispatcherState>) -> Self {
        Self { state }
    }
}

impl BatchSink for QueueSink {
    fn accept(&self, batch: MessageBatch) {
        let state = self.state.clone();
        let conversation = batch.conversation.to_string();

        if let Err(err) = state.queue.enqueue(&conversation, &batch.messages) {
            state.note_error(format!("failed to enqueue batch for {conversation}: {err}"));
            return;
        }

        ensure_worker(state, conversation);
    }
}

fn ensure_worker(state: Arc<DispatcherState>, conversation: String) {
    if state.active_workers.insert(conversation.clone(), ()).is_some() {
        return;
    }
    tokio::spawn(run_conversation_worker(state, conversation));
}

async fn run_conversation_worker(state: Arc<DispatcherState>, conversation: String) {
    loop {
        let entry = match state.queue.acquire_next(&conversation) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                state.active_workers.remove(&conversation);
                // Re-check once: a batch may have landed in the gap between
                // the empty read above and removing ourselves from the
                // active set.
                match state.queue.acquire_next(&conversation) {
                    Ok(Some(entry)) => {
                        state.active_workers.insert(conversation.clone(), ());
                        entry
                    }
                    _ => return,
                }
            }
            Err(err) => {
                state.note_error(format!("queue error for {conversation}: {err}"));
                state.active_workers.remove(&conversation);
                return;
            }
        };

        match run_turn(&state, &entry).await {
            TurnOutcome::Success(reply) => {
                if let Err(err) = state.queue.complete(&entry) {
                    state.note_error(format!("failed to mark entry done: {err}"));
                }
                send_reply(&state, &conversation, &reply).await;
            }
            TurnOutcome::Failed(reason) => {
                let will_dead_letter = entry.attempt + 1 >= state.config.queue.max_attempts;
                if let Err(err) = state.queue.fail(&entry).await {
                    state.note_error(format!("failed to record retry: {err}"));
                }
                error!(conversation = %conversation, reason = %reason, "turn failed");
                let fallback = if will_dead_letter {
                    "I couldn't complete that."
                } else {
                    "something went wrong — retrying"
                };
                send_reply(&state, &conversation, fallback).await;
            }
        }
    }
}

async fn send_reply(state: &DispatcherState, conversation: &str, body: &str) {
    let outbound = ChannelOutbound {
        channel: state.default_channel.clone(),
        reply: OutboundReply {
            conversation: ConversationId::from(conversation),
            body: body.to_string(),
            sender_tag: None,
        },
    };
    send_best_effort(state, &outbound).await;
}
