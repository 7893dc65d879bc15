use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

const DEFAULT_SESSION_LIMIT: i64 = 10;

fn parse_limit(params: &HashMap<String, String>, default: i64) -> i64 {
    params
        .get("limit")
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(default)
}

pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let limit = parse_limit(&params, state.config.chat.max_history_display);

    let messages = match state.store.get_history(&session_id, limit).await {
        Ok(messages) => messages,
        Err(e) => {
            tracing::warn!(session_id = %session_id, "Failed to load conversation: {}", e);
            Vec::new()
        }
    };

    let formatted: Vec<Value> = messages
        .into_iter()
        .map(|msg| {
            json!({
                "role": msg.role,
                "content": msg.content,
                "timestamp": msg.timestamp,
            })
        })
        .collect();

    Json(json!({
        "session_id": session_id,
        "count": formatted.len(),
        "messages": formatted,
    }))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let limit = parse_limit(&params, DEFAULT_SESSION_LIMIT);

    let sessions = match state.store.list_sessions(&user_id, limit).await {
        Ok(sessions) => sessions,
        Err(e) => {
            tracing::warn!(user_id = %user_id, "Failed to list sessions: {}", e);
            Vec::new()
        }
    };

    Json(json!({
        "user_id": user_id,
        "count": sessions.len(),
        "sessions": sessions,
    }))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete_session(&session_id).await.map_err(|e| {
        tracing::error!(session_id = %session_id, "Failed to delete session: {}", e);
        ApiError::internal("Failed to delete session")
    })?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Session {} deleted", session_id),
    })))
}
