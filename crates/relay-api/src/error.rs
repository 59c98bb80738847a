use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

/// Build the uniform `{error: string}` JSON error body (§4.4).
pub fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.into() })))
}

pub fn unauthorized() -> (StatusCode, Json<Value>) {
    api_error(StatusCode::UNAUTHORIZED, "unauthorized")
}

pub fn from_memory_error(err: relay_memory::MemoryError) -> (StatusCode, Json<Value>) {
    use relay_memory::MemoryError::*;
    match err {
        NotFound(id) => api_error(StatusCode::NOT_FOUND, format!("not found: {id}")),
        InvalidEnvelope(msg) => api_error(StatusCode::BAD_REQUEST, msg),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

pub fn from_retrieval_error(err: relay_retrieval::RetrievalError) -> (StatusCode, Json<Value>) {
    api_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}

pub fn from_store_error(err: relay_store::StoreError) -> (StatusCode, Json<Value>) {
    use relay_store::StoreError::*;
    match err {
        NotFound { id } => api_error(StatusCode::NOT_FOUND, format!("not found: {id}")),
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}
