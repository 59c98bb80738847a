use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Assemble the full Axum router for the Memory API (§4.4) plus the
/// health surface (§6). Suitable for running the memory API standalone.
pub fn build_router(state: Arc<AppState>) -> Router {
    build_api_router(state.clone())
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// The `/api/*` surface only, without `/health`. The full dispatcher binary
/// mounts this alongside its own richer health endpoint (pool/queue/channel
/// state the memory API alone doesn't have) instead of this crate's
/// memory-only one.
pub fn build_api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/consult", get(handlers::consult))
        .route("/api/reflect", get(handlers::reflect))
        .route("/api/list", get(handlers::list))
        .route("/api/stats", get(handlers::stats))
        .route("/api/doc/{id}", get(handlers::get_doc))
        .route("/api/graph", get(handlers::graph))
        .route("/api/learn", post(handlers::learn))
        .route("/api/supersede", post(handlers::supersede))
        .route(
            "/api/user-model",
            get(handlers::get_user_model).post(handlers::update_user_model),
        )
        .route(
            "/api/procedural",
            get(handlers::search_procedural).post(handlers::learn_procedural),
        )
        .route("/api/procedural/usage", post(handlers::procedural_usage))
        .route(
            "/api/episodic",
            get(handlers::search_episodic).post(handlers::record_episodic),
        )
        .route("/api/episodic/purge-expired", post(handlers::purge_expired))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
