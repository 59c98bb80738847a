use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde_json::{json, Value};

use crate::state::DispatcherState;

/// The full health surface (§6): memory API's own `/api/*` routes plus a
/// dispatcher-level `/health` covering pool, queue, channel, and heartbeat
/// state that the memory API alone can't see.
pub fn build_router(state: Arc<DispatcherState>) -> Router {
    let api = relay_api::router::build_api_router(state.memory_api.clone());
    let dispatcher = Router::new().route("/health", get(health)).with_state(state);

    api.merge(dispatcher)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

async fn health(State(state): State<Arc<DispatcherState>>) -> Json<Value> {
    let pool = state.pool.stats();

    let mut queue_depth = serde_json::Map::new();
    for conversation in state.registry.list() {
        let id = conversation.id.to_string();
        let depth = state.queue.queue_depth(&id);
        queue_depth.insert(id, json!(depth));
    }

    let mut channels_connected = serde_json::Map::new();
    for (name, status) in state.channels.lock().await.statuses() {
        let connected = matches!(status, relay_channels::ChannelStatus::Connected);
        channels_connected.insert(name, json!(connected));
    }

    let total_docs = state.memory_api.memory.store().list_all().map(|d| d.len()).unwrap_or(0);
    let last_indexed = state.memory_api.last_indexed_at.load(Ordering::Relaxed);
    let heartbeat_last_at = state.heartbeat_last_at.load(Ordering::Relaxed);

    Json(json!({
        "pool": {
            "total": pool.total,
            "ready": pool.ready,
            "inUse": pool.in_use,
            "warming": pool.warming,
            "maxSize": pool.max_size,
            "reuseCount": pool.reuse_count,
            "coldSpawnFallbacks": pool.cold_spawn_fallbacks,
        },
        "queueDepth": Value::Object(queue_depth),
        "recentErrors": state.recent_errors(),
        "channelsConnected": Value::Object(channels_connected),
        "memory": {
            "lastIndexed": last_indexed,
            "totalDocs": total_docs,
        },
        "heartbeatLastAt": if heartbeat_last_at == 0 { Value::Null } else { json!(heartbeat_last_at) },
    }))
}
