use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use relay_bus::ConversationRegistry;
use relay_channels::ChannelManager;
use relay_core::config::RelayConfig;
use relay_pool::Pool;
use relay_queue::GroupQueue;
use relay_scheduler::JobStore;

const MAX_RECENT_ERRORS: usize = 50;

/// Everything a dispatcher worker or the `/health` handler needs, wired
/// once at startup and shared behind `Arc` (§5 "dependency-injected
/// handles held by the dispatcher").
pub struct DispatcherState {
    pub config: RelayConfig,
    pub memory_api: Arc<relay_api::AppState>,
    pub registry: Arc<ConversationRegistry>,
    pub queue: Arc<GroupQueue>,
    pub pool: Arc<Pool>,
    pub scheduler_store: Arc<JobStore>,
    pub channels: tokio::sync::Mutex<ChannelManager>,
    /// Name of the channel adapter used for all outbound replies. Real
    /// deployments route by the conversation's origin channel; this build
    /// only wires a single `LoopbackChannel` (§1 Non-goals).
    pub default_channel: String,
    pub ipc_secret: Vec<u8>,
    pub data_root: PathBuf,
    /// conversation id -> most recent agent session id (§6 Agent contract
    /// "session-update marker").
    pub sessions: DashMap<String, String>,
    /// conversations with a worker loop currently draining their queue.
    pub active_workers: DashMap<String, ()>,
    pub heartbeat_last_at: AtomicI64,
    recent_errors: Mutex<VecDeque<String>>,
}

impl DispatcherState {
    pub fn new(
        config: RelayConfig,
        memory_api: Arc<relay_api::AppState>,
        registry: Arc<ConversationRegistry>,
        queue: Arc<GroupQueue>,
        pool: Arc<Pool>,
        scheduler_store: Arc<JobStore>,
        channels: ChannelManager,
        default_channel: impl Into<String>,
        ipc_secret: Vec<u8>,
        data_root: PathBuf,
    ) -> Self {
        Self {
            config,
            memory_api,
            registry,
            queue,
            pool,
            scheduler_store,
            channels: tokio::sync::Mutex::new(channels),
            default_channel: default_channel.into(),
            ipc_secret,
            data_root,
            sessions: DashMap::new(),
            active_workers: DashMap::new(),
            heartbeat_last_at: AtomicI64::new(0),
            recent_errors: Mutex::new(VecDeque::new()),
        }
    }

    pub fn note_error(&self, message: impl Into<String>) {
        let mut errors = self.recent_errors.lock().unwrap();
        if errors.len() >= MAX_RECENT_ERRORS {
            errors.pop_front();
        }
        errors.push_back(message.into());
    }

    pub fn recent_errors(&self) -> Vec<String> {
        self.recent_errors.lock().unwrap().iter().cloned().collect()
    }

    pub fn note_heartbeat(&self, at: chrono::DateTime<chrono::Utc>) {
        self.heartbeat_last_at.store(at.timestamp(), Ordering::Relaxed);
    }

    /// Filesystem slot root for a conversation's IPC directory (§6 Persisted
    /// state layout: `ipc/<conversationFolder>/`).
    pub fn ipc_root_for(&self, folder_slug: &str) -> PathBuf {
        self.data_root.join("ipc").join(folder_slug)
    }
}
