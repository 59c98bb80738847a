use std::time::Duration;

use relay_channels::ChannelOutbound;
use relay_core::types::{ConversationId, OutboundReply, SyntheticOrigin};
use relay_ipc::{AgentBootstrap, AgentResult, IpcError, InterimMessage, Slot, TurnStatus};
use relay_queue::QueueEntry;

use crate::error::{Result, TurnError};
use crate::state::DispatcherState;

/// Outcome of driving one queue entry through a full container turn.
pub enum TurnOutcome {
    Success(String),
    Failed(String),
}

/// Run one turn end to end: acquire a container, bootstrap it over the IPC
/// slot, forward interim messages as they arrive, and return the final
/// result (§4.7/§4.8). Every failure here is a "turn failure" (§7) — the
/// caller decides retry vs. dead-letter from the queue entry's attempt
/// count.
pub async fn run_turn(state: &DispatcherState, entry: &QueueEntry) -> TurnOutcome {
    match run_turn_inner(state, entry).await {
        Ok(reply) => TurnOutcome::Success(reply),
        Err(err) => {
            state.note_error(err.to_string());
            TurnOutcome::Failed(err.to_string())
        }
    }
}

async fn run_turn_inner(state: &DispatcherState, entry: &QueueEntry) -> Result<String> {
    let conversation_id = ConversationId::from(entry.conversation.clone());
    let conversation = state
        .registry
        .get(&conversation_id)
        .ok_or_else(|| TurnError::UnknownConversation(entry.conversation.clone()))?;

    let handle = state.pool.acquire(&conversation_id).await?;

    let slot_root = state.ipc_root_for(&conversation.folder_slug);
    let slot = Slot::open(&slot_root, state.ipc_secret.clone())?;

    let prompt = entry
        .messages
        .iter()
        .map(|m| m.body.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let is_scheduled_task = entry.messages.iter().any(|m| {
        matches!(
            m.synthetic,
            Some(SyntheticOrigin::Scheduled) | Some(SyntheticOrigin::Heartbeat)
        )
    });

    let bootstrap = AgentBootstrap {
        prompt,
        session_id: state.sessions.get(&entry.conversation).map(|s| s.clone()),
        group_folder: conversation.folder_slug.clone(),
        chat_jid: conversation.id.to_string(),
        is_main: conversation.is_main,
        is_scheduled_task,
        secrets: None,
    };

    // The concrete process-spawning mechanism (and with it, how a bootstrap
    // reaches the agent's stdin) is the sandbox runtime's business and out
    // of scope here (§1/§9 Non-goals); this dispatcher writes it as the
    // first input file so the IPC polling loop below is the only thing it
    // depends on.
    let bootstrap_value = serde_json::to_value(&bootstrap).map_err(IpcError::from)?;
    slot.write_input("bootstrap.json", &bootstrap_value)?;

    let poll_interval = Duration::from_millis(state.config.ipc.poll_interval_ms.max(1));
    let warming_max = Duration::from_millis(state.config.pool.warming_max_ms);
    let output_timeout = Duration::from_millis(state.config.container.output_timeout_ms);
    let hard_kill = Duration::from_millis(state.config.container.hard_kill_timeout_ms);

    let turn = async {
        wait_for_ready(&slot, poll_interval, warming_max).await?;
        drain_until_final(state, &conversation_id, &slot, poll_interval, output_timeout).await
    };

    match tokio::time::timeout(hard_kill, turn).await {
        Ok(Ok(result)) => {
            if let Some(new_session) = result.new_session_id.clone() {
                state.sessions.insert(entry.conversation.clone(), new_session);
            }
            state.pool.release(&handle).await?;
            match result.status {
                TurnStatus::Success => Ok(result.result.unwrap_or_default()),
                TurnStatus::Error => Err(TurnError::AgentError(
                    result
                        .error
                        .unwrap_or_else(|| "agent reported an error with no message".to_string()),
                )),
            }
        }
        Ok(Err(err)) => {
            let _ = state.pool.kill(&handle).await;
            Err(err)
        }
        Err(_elapsed) => {
            let _ = state.pool.kill(&handle).await;
            Err(TurnError::WarmingTimedOut(hard_kill.as_millis() as u64))
        }
    }
}

async fn wait_for_ready(slot: &Slot, poll_interval: Duration, warming_max: Duration) -> Result<()> {
    let deadline = tokio::time::Instant::now() + warming_max;
    loop {
        if slot.consume_ready()? {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TurnError::WarmingTimedOut(warming_max.as_millis() as u64));
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Poll `output/` until the one framed `AgentResult` file appears,
/// forwarding any numbered interim messages immediately as they're seen
/// (§4.8).
async fn drain_until_final(
    state: &DispatcherState,
    conversation_id: &ConversationId,
    slot: &Slot,
    poll_interval: Duration,
    output_timeout: Duration,
) -> Result<AgentResult> {
    let deadline = tokio::time::Instant::now() + output_timeout;
    loop {
        for path in slot.pending_output_files()? {
            let value = slot.read_and_verify(&path)?;
            if value.get("status").is_some() {
                let result: AgentResult = serde_json::from_value(value).map_err(IpcError::from)?;
                return Ok(result);
            }
            if let Ok(interim) = serde_json::from_value::<InterimMessage>(value) {
                forward_interim(state, conversation_id, &interim).await;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(TurnError::OutputTimedOut);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn forward_interim(state: &DispatcherState, conversation_id: &ConversationId, interim: &InterimMessage) {
    let outbound = ChannelOutbound {
        channel: state.default_channel.clone(),
        reply: OutboundReply {
            conversation: conversation_id.clone(),
            body: interim.body.clone(),
            sender_tag: None,
        },
    };
    send_best_effort(state, &outbound).await;
}

/// Deliver one outbound reply. Best-effort, per the channel adapter
/// contract (§6) — a send failure is logged, not propagated as a turn
/// failure.
pub async fn send_best_effort(state: &DispatcherState, outbound: &ChannelOutbound) {
    let channels = state.channels.lock().await;
    let Some(channel) = channels.get(&outbound.channel) else {
        state.note_error(format!("no channel registered named '{}'", outbound.channel));
        return;
    };
    if let Err(err) = channel.send(outbound).await {
        state.note_error(format!("channel send failed: {err}"));
    }
}
