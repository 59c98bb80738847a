use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use relay_memory::MemoryManager;
use relay_retrieval::RetrievalEngine;

/// Central shared state, passed as `Arc<AppState>` to every handler.
pub struct AppState {
    pub memory: MemoryManager,
    pub retrieval: RetrievalEngine,
    pub auth_token: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub last_indexed_at: AtomicI64,
    pub requests_served: AtomicU64,
}

impl AppState {
    pub fn new(memory: MemoryManager, retrieval: RetrievalEngine, auth_token: Option<String>) -> Self {
        Self {
            memory,
            retrieval,
            auth_token,
            started_at: chrono::Utc::now(),
            last_indexed_at: AtomicI64::new(chrono::Utc::now().timestamp()),
            requests_served: AtomicU64::new(0),
        }
    }

    pub fn note_write(&self) {
        self.retrieval.invalidate_cache();
        self.last_indexed_at.store(chrono::Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn note_request(&self) {
        self.requests_served.fetch_add(1, Ordering::Relaxed);
    }
}
