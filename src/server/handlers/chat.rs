use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::chat::suggest_meditation;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub user_id: String,
    pub input_text: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    pub session_id: String,
    pub message_id: Option<String>,
    pub used_rag: bool,
    pub recommended_meditation: Option<String>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> impl IntoResponse {
    let outcome = state
        .orchestrator
        .respond(
            &payload.session_id,
            &payload.user_id,
            &payload.input_text,
            &payload.language,
        )
        .await;

    Json(ChatResponse {
        reply: outcome.reply,
        session_id: payload.session_id,
        message_id: outcome.message_id,
        used_rag: outcome.used_rag,
        recommended_meditation: suggest_meditation(&payload.input_text).map(str::to_string),
    })
}
