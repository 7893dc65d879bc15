//! Chat turn orchestration.
//!
//! `ChatOrchestrator::respond` is the retrieval-augmented path: load recent
//! history, look up reference passages, build the prompt, generate, persist.
//! Every dependency failure degrades instead of failing the turn.

pub mod meditation;
pub mod prompt;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};

use crate::core::config::AppConfig;
use crate::history::{ConversationStore, Message, Role};
use crate::llm::{ChatMessage, Generator, LlmError};
use crate::rag::{ContextBuilder, Passage, RetrievalError, Retriever};

pub use meditation::suggest_meditation;
pub use prompt::{FALLBACK_REPLY, SYSTEM_PROMPT};

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_history: i64,
    pub prompt_history_turns: usize,
    pub top_k: usize,
    pub similarity_threshold: f64,
    pub temperature: f64,
    pub max_tokens: u32,
    pub retrieval_timeout: Duration,
    pub generation_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::default())
    }
}

impl OrchestratorConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_history: config.chat.max_history,
            prompt_history_turns: config.chat.prompt_history_turns,
            top_k: config.rag.top_k,
            similarity_threshold: config.rag.similarity_threshold,
            temperature: config.generation.temperature,
            max_tokens: config.generation.max_tokens,
            retrieval_timeout: Duration::from_secs(config.rag.timeout_secs),
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub reply: String,
    pub used_rag: bool,
    /// Id of the stored assistant reply; `None` when that write failed.
    pub message_id: Option<String>,
}

pub struct ChatOrchestrator {
    store: Arc<dyn ConversationStore>,
    retriever: Option<Arc<dyn Retriever>>,
    generator: Arc<dyn Generator>,
    context: ContextBuilder,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        retriever: Option<Arc<dyn Retriever>>,
        generator: Arc<dyn Generator>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            retriever,
            generator,
            context: ContextBuilder::new(config.similarity_threshold),
            config,
        }
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.retriever.is_some()
    }

    pub async fn respond(
        &self,
        session_id: &str,
        user_id: &str,
        input_text: &str,
        language: &str,
    ) -> TurnOutcome {
        let history = self.load_history(session_id).await;

        let passages = self.retrieve(session_id, input_text).await;
        let context = self.context.build(&passages);
        let used_rag = !context.is_empty();
        if used_rag {
            tracing::debug!(
                session_id = %session_id,
                sources = ?self.context.sources(&passages),
                "Using retrieved context"
            );
        }

        let messages = prompt::build_messages(
            &history,
            self.config.prompt_history_turns,
            used_rag.then_some(context.as_str()),
            input_text,
        );

        let reply = self.generate(session_id, &messages).await;

        let mut user_meta = Map::new();
        user_meta.insert("language".to_string(), json!(language));
        self.persist(session_id, user_id, Role::User, input_text, user_meta)
            .await;

        let mut assistant_meta = Map::new();
        assistant_meta.insert("language".to_string(), json!(language));
        assistant_meta.insert("used_rag".to_string(), Value::Bool(used_rag));
        let message_id = self
            .persist(session_id, user_id, Role::Assistant, &reply, assistant_meta)
            .await;

        tracing::info!(
            session_id = %session_id,
            used_rag,
            history = history.len(),
            stored = message_id.is_some(),
            "Chat turn completed"
        );

        TurnOutcome {
            reply,
            used_rag,
            message_id,
        }
    }

    async fn load_history(&self, session_id: &str) -> Vec<Message> {
        match self
            .store
            .get_history(session_id, self.config.max_history)
            .await
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(session_id = %session_id, "History unavailable, continuing without it: {}", e);
                Vec::new()
            }
        }
    }

    async fn retrieve(&self, session_id: &str, input_text: &str) -> Vec<Passage> {
        let Some(retriever) = &self.retriever else {
            return Vec::new();
        };

        let search = retriever.search(input_text, self.config.top_k);
        match with_timeout(self.config.retrieval_timeout, search, || {
            RetrievalError::Timeout
        })
        .await
        {
            Ok(passages) => {
                tracing::debug!(
                    session_id = %session_id,
                    candidates = passages.len(),
                    "Retrieved passages"
                );
                passages
            }
            Err(e) => {
                tracing::warn!(session_id = %session_id, "Retrieval failed, answering without context: {}", e);
                Vec::new()
            }
        }
    }

    async fn generate(&self, session_id: &str, messages: &[ChatMessage]) -> String {
        let completion = self.generator.complete(
            messages,
            self.config.temperature,
            self.config.max_tokens,
        );

        match with_timeout(self.config.generation_timeout, completion, || {
            LlmError::Timeout
        })
        .await
        {
            Ok(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    tracing::warn!(session_id = %session_id, "Model returned an empty completion, using fallback reply");
                    FALLBACK_REPLY.to_string()
                } else {
                    trimmed.to_string()
                }
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, "Generation failed, using fallback reply: {}", e);
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn persist(
        &self,
        session_id: &str,
        user_id: &str,
        role: Role,
        content: &str,
        metadata: Map<String, Value>,
    ) -> Option<String> {
        match self
            .store
            .save_message(session_id, user_id, role, content, metadata)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(session_id = %session_id, role = %role, "Failed to store message: {}", e);
                None
            }
        }
    }
}

async fn with_timeout<T, E, F>(
    limit: Duration,
    fut: F,
    on_timeout: impl FnOnce() -> E,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout()),
    }
}
