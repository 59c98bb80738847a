//! End-to-end tests driving `DispatcherState` the way `main.rs` wires it,
//! but against in-memory stores and a fake agent that answers over the IPC
//! slot directly (no sandbox runtime involved, per the pool's Non-goal).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use relay_bus::{BatchSink, ConversationRegistry, MessageBatch};
use relay_channels::ChannelManager;
use relay_core::config::RelayConfig;
use relay_core::types::{Conversation, ConversationId, Message};
use relay_ipc::{AgentResult, TurnStatus};
use relay_memory::MemoryManager;
use relay_pool::{ContainerSpec, FakeSandboxRuntime, Pool};
use relay_queue::{GroupQueue, QueueEntry, QueueStore};
use relay_retrieval::{HashingEmbedder, RetrievalEngine};
use relay_scheduler::JobStore;
use relay_store::Store;

use relay_dispatcher::state::DispatcherState;
use relay_dispatcher::turn::{run_turn, TurnOutcome};
use relay_dispatcher::worker::QueueSink;

const SECRET: &[u8] = b"test-secret";

fn test_state(data_root: PathBuf, backoff_cap_ms: u64, max_attempts: u32) -> Arc<DispatcherState> {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let embedder = Arc::new(HashingEmbedder);
    let memory = MemoryManager::new(store.clone(), embedder.clone());
    let retrieval = RetrievalEngine::new(store, embedder, 5);
    let memory_api = Arc::new(relay_api::AppState::new(memory, retrieval, None));

    let registry = Arc::new(ConversationRegistry::new());

    let queue_store = Arc::new(QueueStore::open_in_memory().unwrap());
    let queue = Arc::new(GroupQueue::new(
        queue_store,
        100,
        max_attempts,
        backoff_cap_ms,
        data_root.join("dead-letter"),
    ));

    let sandbox = Arc::new(FakeSandboxRuntime::new());
    let spec = ContainerSpec {
        memory_limit_mb: 512,
        cpu_limit: 1.0,
        workspace_mount: "/work".into(),
        ipc_mount: "/ipc".into(),
        session_mount: "/session".into(),
    };
    let pool = Arc::new(Pool::new(sandbox, spec, 0, 4, 50, 3_600_000, 0));

    let scheduler_store = Arc::new(JobStore::open_in_memory().unwrap());

    let mut config = RelayConfig::default();
    config.ipc.poll_interval_ms = 10;
    config.pool.warming_max_ms = 300;
    config.container.output_timeout_ms = 300;
    config.container.hard_kill_timeout_ms = 1_000;
    config.queue.max_attempts = max_attempts;
    config.queue.backoff_cap_ms = backoff_cap_ms;

    Arc::new(DispatcherState::new(
        config,
        memory_api,
        registry,
        queue,
        pool,
        scheduler_store,
        ChannelManager::new(),
        "loopback",
        SECRET.to_vec(),
        data_root,
    ))
}

fn conversation(id: &str) -> Conversation {
    Conversation {
        id: ConversationId::from(id),
        display_name: id.to_string(),
        folder_slug: id.to_string(),
        trigger_token: None,
        is_main: true,
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
        delivery_id: uuid::Uuid::new_v4().to_string(),
        synthetic: None,
    }
}

/// Polls the slot's input directory for `bootstrap.json`, then answers with
/// a ready sentinel and a signed success result, standing in for a real
/// agent process (out of scope per the pool's sandbox-runtime Non-goal).
async fn fake_agent_respond(ipc_root: PathBuf, body: &str) {
    let input_dir = ipc_root.join("input");
    let output_dir = ipc_root.join("output");
    for _ in 0..200 {
        if input_dir.join("bootstrap.json").exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    std::fs::create_dir_all(&output_dir).unwrap();
    std::fs::write(output_dir.join("_ready"), b"").unwrap();

    let result = AgentResult {
        status: TurnStatus::Success,
        result: Some(body.to_string()),
        new_session_id: Some("sess-1".to_string()),
        error: None,
    };
    let value = serde_json::to_value(&result).unwrap();
    let signed = relay_ipc::canonical::sign(&value, SECRET).unwrap();
    std::fs::write(output_dir.join("001.json"), serde_json::to_vec(&signed).unwrap()).unwrap();
}

#[tokio::test]
async fn single_turn_succeeds_and_records_session() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path().to_path_buf(), 50, 5);
    state.registry.register(conversation("c1"));

    let ipc_root = state.ipc_root_for("c1");
    tokio::spawn(fake_agent_respond(ipc_root, "hello back"));

    let entry = QueueEntry {
        id: "e1".to_string(),
        conversation: "c1".to_string(),
        messages: vec![message("c1", "hi there")],
        state: relay_queue::EntryState::InFlight,
        attempt: 0,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };

    match run_turn(&state, &entry).await {
        TurnOutcome::Success(body) => assert_eq!(body, "hello back"),
        TurnOutcome::Failed(reason) => panic!("expected success, got failure: {reason}"),
    }

    assert_eq!(state.sessions.get("c1").map(|s| s.clone()), Some("sess-1".to_string()));
}

#[tokio::test]
async fn silent_container_eventually_dead_letters_after_max_attempts() {
    let dir = tempfile::tempdir().unwrap();
    // Short timeouts and backoff so every attempt times out quickly and the
    // retry loop completes in well under the test harness's own deadline.
    let state = test_state(dir.path().to_path_buf(), 30, 2);
    state.registry.register(conversation("c1"));

    let sink = QueueSink::new(state.clone());
    sink.accept(MessageBatch {
        conversation: ConversationId::from("c1"),
        messages: vec![message("c1", "anyone there?")],
    });

    let dead_letter_dir = dir.path().join("dead-letter");
    let mut found = false;
    for _ in 0..200 {
        if dead_letter_dir.exists() && std::fs::read_dir(&dead_letter_dir).unwrap().next().is_some() {
            found = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert!(found, "expected a dead-letter record after exhausting retries");
    assert!(!state.recent_errors().is_empty());
}
