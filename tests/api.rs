use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use chillpanda_backend::chat::{ChatOrchestrator, OrchestratorConfig, FALLBACK_REPLY};
use chillpanda_backend::core::config::{AppConfig, AppPaths};
use chillpanda_backend::core::security::ApiKey;
use chillpanda_backend::history::{ConversationStore, SqliteConversationStore};
use chillpanda_backend::llm::{ChatMessage, Generator, LlmError};
use chillpanda_backend::rag::{Passage, RetrievalError, Retriever};
use chillpanda_backend::server;
use chillpanda_backend::state::AppState;

const KEY: &str = "test-key";

struct EchoGenerator {
    fail: bool,
}

#[async_trait]
impl Generator for EchoGenerator {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _temperature: f64,
        _max_tokens: u32,
    ) -> Result<String, LlmError> {
        if self.fail {
            return Err(LlmError::Transport("connection refused".to_string()));
        }
        let last = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(format!("Panda heard: {}", last))
    }
}

struct StaticRetriever;

#[async_trait]
impl Retriever for StaticRetriever {
    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, RetrievalError> {
        Ok(vec![Passage::new("Breathe in for four counts.", "book", 0.9)])
    }
}

struct TestApp {
    router: Router,
    store: Arc<SqliteConversationStore>,
    _tmp: tempfile::TempDir,
}

async fn app(retrieval: bool, generation_fails: bool) -> TestApp {
    app_with_config(AppConfig::default(), retrieval, generation_fails).await
}

async fn app_with_config(config: AppConfig, retrieval: bool, generation_fails: bool) -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let paths = Arc::new(AppPaths::with_data_dir(
        tmp.path().to_path_buf(),
        tmp.path().join("data"),
    ));
    let store = Arc::new(
        SqliteConversationStore::with_path(&paths.db_path)
            .await
            .unwrap(),
    );

    let retriever: Option<Arc<dyn Retriever>> = if retrieval {
        Some(Arc::new(StaticRetriever))
    } else {
        None
    };
    let orchestrator = Arc::new(ChatOrchestrator::new(
        store.clone(),
        retriever,
        Arc::new(EchoGenerator {
            fail: generation_fails,
        }),
        OrchestratorConfig::from_app_config(&config),
    ));

    let state = AppState::new(
        paths,
        Arc::new(config),
        ApiKey::new(KEY),
        store.clone(),
        orchestrator,
    );

    TestApp {
        router: server::router(state),
        store,
        _tmp: tmp,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn chat_request(key: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/chat")
        .header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap()
}

fn turn(session_id: &str, text: &str) -> Value {
    json!({
        "session_id": session_id,
        "user_id": "u1",
        "input_text": text,
        "language": "en"
    })
}

#[tokio::test]
async fn banner_and_health_are_public() {
    let app = app(false, false).await;

    let (status, body) = send(&app.router, Request::get("/").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chill Panda Backend Running");

    let (status, body) =
        send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "connected");
    assert_eq!(body["retrieval"], "disabled");
}

#[tokio::test]
async fn health_reports_closed_store_as_degraded() {
    let app = app(true, false).await;
    app.store.close().await;

    let (_, body) = send(&app.router, Request::get("/health").body(Body::empty()).unwrap()).await;

    assert_eq!(body["status"], "degraded");
    assert_eq!(body["store"], "disconnected");
    assert_eq!(body["retrieval"], "enabled");
}

#[tokio::test]
async fn wildcard_cors_origin_is_ignored() {
    let mut config = AppConfig::default();
    config.server.cors_allowed_origins =
        vec!["*".to_string(), "http://localhost:3000".to_string()];
    let app = app_with_config(config, false, false).await;

    let request = Request::get("/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "http://localhost:3000"
    );

    let request = Request::get("/health")
        .header("origin", "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}

#[tokio::test]
async fn wildcard_only_cors_config_still_serves() {
    let mut config = AppConfig::default();
    config.server.cors_allowed_origins = vec!["*".to_string()];
    let app = app_with_config(config, false, false).await;

    let (status, body) = send(&app.router, Request::get("/").body(Body::empty()).unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Chill Panda Backend Running");
}

#[tokio::test]
async fn chat_rejects_missing_or_wrong_key() {
    let app = app(false, false).await;

    let (status, body) = send(&app.router, chat_request(None, turn("s1", "hi"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid API Key");

    let (status, _) = send(&app.router, chat_request(Some("nope"), turn("s1", "hi"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    assert!(app.store.get_history("s1", 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_rejects_malformed_body() {
    let app = app(false, false).await;

    let (status, _) = send(
        &app.router,
        chat_request(Some(KEY), json!({ "session_id": "s1" })),
    )
    .await;

    assert!(status.is_client_error());
}

#[tokio::test]
async fn chat_turn_round_trip() {
    let app = app(true, false).await;

    let (status, body) = send(
        &app.router,
        chat_request(Some(KEY), turn("s1", "I feel so stressed about exams")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session_id"], "s1");
    assert_eq!(body["used_rag"], true);
    assert!(body["message_id"].is_string());
    assert_eq!(body["recommended_meditation"], "Box Breathing");
    let reply = body["reply"].as_str().unwrap();
    assert!(reply.starts_with("Panda heard:"));
    assert!(reply.contains("Breathe in for four counts."));

    let (status, body) = send(&app.router, get("/api/v1/conversation/s1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(body["messages"][0]["role"], "user");
    assert_eq!(body["messages"][0]["content"], "I feel so stressed about exams");
    assert_eq!(body["messages"][1]["role"], "assistant");
    assert!(body["messages"][1]["timestamp"].is_string());
}

#[tokio::test]
async fn generation_failure_still_returns_ok_with_fallback() {
    let app = app(false, true).await;

    let (status, body) = send(&app.router, chat_request(Some(KEY), turn("s1", "hello"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], FALLBACK_REPLY);
    assert_eq!(body["used_rag"], false);
    assert!(body["recommended_meditation"].is_null());
}

#[tokio::test]
async fn conversation_limit_keeps_latest_messages() {
    let app = app(false, false).await;
    for text in ["one", "two", "three"] {
        send(&app.router, chat_request(Some(KEY), turn("s1", text))).await;
    }

    let (_, body) = send(&app.router, get("/api/v1/conversation/s1?limit=2")).await;

    assert_eq!(body["count"], 2);
    assert_eq!(body["messages"][0]["content"], "three");
    assert_eq!(body["messages"][1]["content"], "Panda heard: three");
}

#[tokio::test]
async fn sessions_are_listed_most_recent_first() {
    let app = app(false, false).await;
    send(&app.router, chat_request(Some(KEY), turn("older", "hi"))).await;
    send(&app.router, chat_request(Some(KEY), turn("newer", "hi again"))).await;

    let (status, body) = send(&app.router, get("/api/v1/sessions/u1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user_id"], "u1");
    assert_eq!(body["count"], 2);
    assert_eq!(body["sessions"][0]["session_id"], "newer");
    assert_eq!(body["sessions"][0]["message_count"], 2);
    assert_eq!(body["sessions"][1]["session_id"], "older");
}

#[tokio::test]
async fn delete_session_removes_history_and_listing() {
    let app = app(false, false).await;
    send(&app.router, chat_request(Some(KEY), turn("s1", "hi"))).await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v1/session/s1")
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, conversation) = send(&app.router, get("/api/v1/conversation/s1")).await;
    assert_eq!(conversation["count"], 0);
    let (_, sessions) = send(&app.router, get("/api/v1/sessions/u1")).await;
    assert_eq!(sessions["count"], 0);
}

#[tokio::test]
async fn delete_fails_with_500_when_store_is_closed() {
    let app = app(false, false).await;
    app.store.close().await;

    let request = Request::builder()
        .method("DELETE")
        .uri("/api/v1/session/s1")
        .header("x-api-key", KEY)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn reads_degrade_to_empty_lists_when_store_is_closed() {
    let app = app(false, false).await;
    app.store.close().await;

    let (status, body) = send(&app.router, get("/api/v1/sessions/u1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 0);

    let (status, body) = send(&app.router, chat_request(Some(KEY), turn("s1", "hi"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message_id"].is_null());
}
