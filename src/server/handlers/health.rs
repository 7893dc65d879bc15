use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Chill Panda Backend Running" }))
}

/// Unauthenticated liveness probe. A store outage reports `degraded`
/// rather than failing, since chat turns still complete without it.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Health check: conversation store unreachable: {}", e);
            false
        }
    };

    Json(json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "store": if store_ok { "connected" } else { "disconnected" },
        "retrieval": if state.orchestrator.retrieval_enabled() { "enabled" } else { "disabled" },
    }))
}
