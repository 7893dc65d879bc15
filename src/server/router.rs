use axum::extract::{Request, State};
use axum::http::{header, HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::errors::ApiError;
use crate::core::security::{require_api_key, API_KEY_HEADER};
use crate::server::handlers::{chat, health, sessions};
use crate::state::AppState;

/// Creates the application router.
///
/// - `/` and `/health` are public
/// - everything under `/api/v1` requires the `x-api-key` header, checked
///   before the request body is read
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state);

    let api = Router::new()
        .route("/chat", post(chat::chat))
        .route(
            "/conversation/:session_id",
            get(sessions::get_conversation),
        )
        .route("/sessions/:user_id", get(sessions::list_sessions))
        .route("/session/:session_id", delete(sessions::delete_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_guard,
        ));

    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

async fn api_key_guard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Err(err) = require_api_key(request.headers(), &state.api_key) {
        tracing::warn!(path = %request.uri().path(), "Rejected request with invalid API key");
        return Err(err);
    }
    Ok(next.run(request).await)
}

fn build_cors_layer(state: &Arc<AppState>) -> CorsLayer {
    let allowed_origins = state
        .config
        .server
        .cors_allowed_origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .filter(|origin| {
            // A credentialed CORS response may not use the `*` wildcard.
            if *origin == "*" {
                tracing::warn!("Ignoring wildcard CORS origin; list allowed origins explicitly");
                return false;
            }
            true
        })
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::CONTENT_TYPE,
            header::HeaderName::from_static(API_KEY_HEADER),
        ])
}
