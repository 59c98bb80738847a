use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use relay_retrieval::{SearchMode, SearchQuery};
use relay_store::Layer;

use crate::auth::check_auth;
use crate::error::{api_error, from_memory_error, from_retrieval_error, from_store_error, unauthorized};
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;

fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, Json<Value>)> {
    if check_auth(state, headers) {
        Ok(())
    } else {
        Err(unauthorized())
    }
}

fn parse_layers(raw: Option<&str>) -> Option<Vec<Layer>> {
    raw.map(|s| s.split(',').filter_map(|l| l.trim().parse().ok()).collect())
}

fn touch_in_background(state: &Arc<AppState>, doc_id: &str) {
    let store = state.memory.store().clone();
    let id = doc_id.to_string();
    tokio::spawn(async move {
        let _ = store.touch_access(&id);
    });
}

// ── /api/search ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub mode: Option<String>,
    pub project: Option<String>,
    pub layer: Option<String>,
}

fn default_limit() -> usize {
    10
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let mode = match params.mode.as_deref() {
        Some("lexical") => SearchMode::Lexical,
        Some("vector") => SearchMode::Vector,
        _ => SearchMode::Hybrid,
    };

    let response = state
        .retrieval
        .search(SearchQuery {
            query: params.query,
            doc_type: params.doc_type,
            limit: params.limit,
            offset: params.offset,
            mode,
            project: params.project,
            layers: parse_layers(params.layer.as_deref()),
        })
        .await
        .map_err(from_retrieval_error)?;

    Ok(Json(json!(response)))
}

// ── /api/consult ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConsultParams {
    pub query: String,
}

const CONSULT_LIMIT: usize = 5;

pub async fn consult(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ConsultParams>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let mut matches = Vec::new();
    for doc_type in ["principle", "pattern"] {
        let response = state
            .retrieval
            .search(SearchQuery {
                query: params.query.clone(),
                doc_type: Some(doc_type.to_string()),
                limit: CONSULT_LIMIT,
                offset: 0,
                mode: SearchMode::Hybrid,
                project: None,
                layers: None,
            })
            .await
            .map_err(from_retrieval_error)?;
        matches.extend(response.results);
    }

    let reply = if matches.is_empty() {
        format!("No established principles or patterns cover \"{}\" yet.", params.query)
    } else {
        let bullets: Vec<String> = matches
            .iter()
            .take(CONSULT_LIMIT)
            .map(|m| format!("- {}", m.document.content))
            .collect();
        format!(
            "Based on recorded principles and patterns for \"{}\":\n{}",
            params.query,
            bullets.join("\n")
        )
    };

    Ok(Json(json!({ "reply": reply, "matches": matches })))
}

// ── /api/reflect ─────────────────────────────────────────────────────────

pub async fn reflect(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let store = state.memory.store();
    let mut candidates = store.list(None, None, 5000).map_err(from_store_error)?;
    candidates.retain(|d| d.doc_type == "principle" || d.doc_type == "learning");

    if candidates.is_empty() {
        return Ok(Json(json!({ "document": null })));
    }

    // Deterministic-looking but varying pick: fold the current time into a
    // cheap hash rather than pull in a `rand` dependency for one index pick.
    let seed = chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0) as usize;
    let idx = seed % candidates.len();
    let document = candidates.swap_remove(idx);
    touch_in_background(&state, &document.id);

    Ok(Json(json!({ "document": document })))
}

// ── /api/list ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub layer: Option<String>,
    pub project: Option<String>,
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    #[serde(default)]
    pub all: bool,
}

fn default_list_limit() -> usize {
    100
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let layer: Option<Layer> = params.layer.as_deref().and_then(|s| s.parse().ok());
    let mut docs = state
        .memory
        .store()
        .list(layer, params.project.as_deref(), params.limit)
        .map_err(from_store_error)?;

    if !params.all {
        let mut seen = std::collections::HashSet::new();
        docs.retain(|d| match &d.source_path {
            Some(path) => seen.insert(path.clone()),
            None => seen.insert(d.id.clone()),
        });
    }

    Ok(Json(json!({ "documents": docs })))
}

// ── /api/stats ───────────────────────────────────────────────────────────

pub async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let docs = state.memory.store().list_all().map_err(from_store_error)?;
    let mut by_layer: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    for doc in &docs {
        let key = doc.layer.map(|l| l.as_str().to_string()).unwrap_or_else(|| "legacy".to_string());
        *by_layer.entry(key).or_insert(0) += 1;
    }

    Ok(Json(json!({
        "total_docs": docs.len(),
        "by_layer": by_layer,
        "requests_served": state.requests_served.load(std::sync::atomic::Ordering::Relaxed),
        "started_at": state.started_at,
    })))
}

// ── /api/doc/{id} ────────────────────────────────────────────────────────

pub async fn get_doc(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let doc = state.memory.store().get(&id).map_err(from_store_error)?;
    touch_in_background(&state, &doc.id);
    Ok(Json(json!(doc)))
}

// ── /api/graph ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GraphEdge {
    from: String,
    to: String,
    shared_tag: String,
}

pub async fn graph(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let docs = state.memory.store().list_all().map_err(from_store_error)?;
    let principles: Vec<_> = docs.iter().filter(|d| d.doc_type == "principle").collect();
    let learnings: Vec<_> = docs.iter().filter(|d| d.doc_type == "learning").take(25).collect();

    let mut nodes = Vec::new();
    nodes.extend(principles.iter().map(|d| json!({"id": d.id, "doc_type": "principle"})));
    nodes.extend(learnings.iter().map(|d| json!({"id": d.id, "doc_type": "learning"})));

    let mut edges = Vec::new();
    let all: Vec<_> = principles.iter().chain(learnings.iter()).collect();
    for i in 0..all.len() {
        for j in (i + 1)..all.len() {
            if let Some(tag) = shared_concept_tag(&all[i].concepts, &all[j].concepts) {
                edges.push(GraphEdge {
                    from: all[i].id.clone(),
                    to: all[j].id.clone(),
                    shared_tag: tag,
                });
            }
        }
    }

    Ok(Json(json!({ "nodes": nodes, "edges": edges })))
}

fn shared_concept_tag(a: &Value, b: &Value) -> Option<String> {
    let tags_a = a.get("tags")?.as_array()?;
    let tags_b = b.get("tags")?.as_array()?;
    for tag in tags_a {
        if tags_b.contains(tag) {
            return tag.as_str().map(str::to_string);
        }
    }
    None
}

// ── /api/learn ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LearnRequest {
    pub content: String,
    pub layer: Option<String>,
    #[serde(default = "default_origin")]
    pub origin: String,
    pub source_path: Option<String>,
    pub created_by: Option<String>,
    pub project: Option<String>,
}

fn default_origin() -> String {
    "agent".to_string()
}

pub async fn learn(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<LearnRequest>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    if req.content.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "content must not be empty"));
    }

    let layer: Option<Layer> = req.layer.as_deref().and_then(|s| s.parse().ok());
    let outcome = state
        .memory
        .learn(
            &req.content,
            layer,
            &req.origin,
            req.source_path.as_deref(),
            req.created_by.as_deref(),
            req.project.as_deref(),
        )
        .await
        .map_err(from_memory_error)?;

    state.note_write();

    Ok(Json(json!({
        "document": outcome.document,
        "potential_contradiction": outcome.potential_contradiction,
    })))
}

// ── /api/supersede ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SupersedeRequest {
    pub id: String,
    pub by: String,
    pub reason: String,
}

pub async fn supersede(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SupersedeRequest>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    state
        .memory
        .store()
        .supersede(&req.id, &req.by, &req.reason)
        .map_err(from_store_error)?;
    state.note_write();

    Ok(Json(json!({ "superseded": req.id, "by": req.by })))
}

// ── /api/user-model ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UserModelParams {
    pub user_id: String,
}

pub async fn get_user_model(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<UserModelParams>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let doc = state.memory.get_user_model(&params.user_id).map_err(from_memory_error)?;
    Ok(Json(json!({ "document": doc })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserModelRequest {
    pub user_id: String,
    pub patch: Value,
}

pub async fn update_user_model(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<UpdateUserModelRequest>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let doc = state
        .memory
        .upsert_user_model(&req.user_id, &req.patch)
        .await
        .map_err(from_memory_error)?;
    state.note_write();

    Ok(Json(json!(doc)))
}

// ── /api/procedural ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ProceduralSearchParams {
    pub query: String,
    pub project: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn search_procedural(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<ProceduralSearchParams>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let docs = state
        .memory
        .procedural_search(&params.query, params.project.as_deref(), params.limit)
        .map_err(from_memory_error)?;
    Ok(Json(json!({ "documents": docs })))
}

#[derive(Debug, Deserialize)]
pub struct ProceduralLearnRequest {
    pub content: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    pub project: Option<String>,
}

pub async fn learn_procedural(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ProceduralLearnRequest>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let outcome = state
        .memory
        .learn(&req.content, Some(Layer::Procedural), &req.origin, None, None, req.project.as_deref())
        .await
        .map_err(from_memory_error)?;
    state.note_write();

    Ok(Json(json!(outcome.document)))
}

#[derive(Debug, Deserialize)]
pub struct ProceduralUsageRequest {
    pub id: String,
}

pub async fn procedural_usage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<ProceduralUsageRequest>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let doc = state.memory.procedural_usage(&req.id).map_err(from_memory_error)?;
    state.note_write();

    Ok(Json(json!(doc)))
}

// ── /api/episodic ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EpisodicSearchParams {
    pub query: String,
    pub project: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

pub async fn search_episodic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<EpisodicSearchParams>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let docs = state
        .memory
        .search_episodic(&params.query, params.project.as_deref(), params.limit)
        .map_err(from_memory_error)?;
    Ok(Json(json!({ "documents": docs })))
}

#[derive(Debug, Deserialize)]
pub struct EpisodicRecordRequest {
    pub content: String,
    #[serde(default = "default_origin")]
    pub origin: String,
    pub project: Option<String>,
}

pub async fn record_episodic(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<EpisodicRecordRequest>,
) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let outcome = state
        .memory
        .record_episodic(&req.content, &req.origin, req.project.as_deref())
        .await
        .map_err(from_memory_error)?;
    state.note_write();

    Ok(Json(json!(outcome.document)))
}

// ── purge-expired ────────────────────────────────────────────────────────

pub async fn purge_expired(State(state): State<Arc<AppState>>, headers: HeaderMap) -> ApiResult<Value> {
    require_auth(&state, &headers)?;
    state.note_request();

    let outcomes = state.memory.purge_expired_episodic().map_err(from_memory_error)?;
    state.note_write();

    let summary: Vec<Value> = outcomes
        .into_iter()
        .map(|(id, outcome)| json!({ "id": id, "outcome": format!("{outcome:?}") }))
        .collect();
    Ok(Json(json!({ "purged": summary })))
}

// ── /health ──────────────────────────────────────────────────────────────

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let total_docs = state.memory.store().list_all().map(|d| d.len()).unwrap_or(0);
    Json(json!({
        "status": "ok",
        "memory": {
            "last_indexed": state.last_indexed_at.load(std::sync::atomic::Ordering::Relaxed),
            "total_docs": total_docs,
        },
    }))
}
