//! HTTP inspection API: health and the current chat snapshot.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};

use fc_common::{AppError, AppResult};
use fc_protocol::ChatEntry;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/messages", get(list_messages))
        .route("/messages/{id}", get(get_message))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct EntryResponse {
    id: u64,
    author: String,
    text: String,
    message: String,
}

impl From<ChatEntry> for EntryResponse {
    fn from(entry: ChatEntry) -> Self {
        Self {
            id: entry.id,
            author: entry.author().to_string(),
            text: entry.text().to_string(),
            message: entry.message,
        }
    }
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "fc-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": fc_protocol::PROTOCOL_VERSION,
        "peers": state.hub.peer_count(),
        "entries": state.hub.entry_count(),
    }))
}

async fn list_messages(State(state): State<Arc<AppState>>) -> Json<Vec<EntryResponse>> {
    Json(state.hub.snapshot().into_iter().map(Into::into).collect())
}

async fn get_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<EntryResponse>> {
    let id: u64 = id
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid entry id '{id}'")))?;

    state
        .hub
        .entry(id)
        .map(|entry| Json(entry.into()))
        .ok_or_else(|| AppError::NotFound(format!("entry {id}")))
}
