use std::sync::Arc;
use std::time::Duration;

use crate::chat::{ChatOrchestrator, OrchestratorConfig};
use crate::core::config::{AppConfig, AppPaths};
use crate::core::security::{init_api_key, ApiKey};
use crate::history::{ConversationStore, SqliteConversationStore};
use crate::llm::OpenAiClient;
use crate::rag::{PineconeIndex, Retriever, VectorRetriever};

pub mod error;

use error::InitializationError;

/// Shared state handed to every route.
///
/// Holds the effective configuration, the API key, the conversation store
/// and the chat orchestrator built on top of it.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub api_key: ApiKey,
    pub store: Arc<dyn ConversationStore>,
    pub orchestrator: Arc<ChatOrchestrator>,
}

impl AppState {
    pub fn new(
        paths: Arc<AppPaths>,
        config: Arc<AppConfig>,
        api_key: ApiKey,
        store: Arc<dyn ConversationStore>,
        orchestrator: Arc<ChatOrchestrator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            paths,
            config,
            api_key,
            store,
            orchestrator,
        })
    }

    /// Builds the production state.
    ///
    /// 1. Resolves the API key (configured, stored, or freshly generated)
    /// 2. Opens the SQLite conversation store
    /// 3. Creates the OpenAI-compatible client for generation and embeddings
    /// 4. Connects retrieval when a vector index is configured
    pub async fn initialize(
        paths: Arc<AppPaths>,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let api_key = init_api_key(config.server.api_key.as_deref(), &paths.api_key_path);

        let store: Arc<dyn ConversationStore> = Arc::new(match &config.store.database_url {
            Some(url) => SqliteConversationStore::connect(url, config.store.max_connections)
                .await
                .map_err(InitializationError::Store)?,
            None => SqliteConversationStore::with_path(&paths.db_path)
                .await
                .map_err(InitializationError::Store)?,
        });

        if config.generation.api_key.is_none() {
            tracing::warn!("No generation API key configured; requests are sent unauthenticated");
        }
        let client = Arc::new(
            OpenAiClient::new(
                &config.generation.base_url,
                config.generation.api_key.clone(),
                config.generation.model.clone(),
                config.rag.embedding_model.clone(),
                Duration::from_secs(config.generation.timeout_secs),
            )
            .map_err(InitializationError::Llm)?,
        );

        let retriever = build_retriever(&config, client.clone()).await;

        let orchestrator = Arc::new(ChatOrchestrator::new(
            store.clone(),
            retriever,
            client,
            OrchestratorConfig::from_app_config(&config),
        ));

        Ok(Self::new(
            paths,
            Arc::new(config),
            api_key,
            store,
            orchestrator,
        ))
    }
}

/// Retrieval is optional: a misconfigured or unreachable index disables it
/// instead of blocking startup.
async fn build_retriever(
    config: &AppConfig,
    client: Arc<OpenAiClient>,
) -> Option<Arc<dyn Retriever>> {
    if !config.rag.is_active() {
        tracing::info!("Retrieval disabled (no vector index configured)");
        return None;
    }

    match PineconeIndex::from_config(&config.rag).await {
        Ok(index) => {
            tracing::info!(
                index = %config.rag.index_name,
                host = %index.host(),
                "Retrieval enabled"
            );
            Some(Arc::new(VectorRetriever::new(client, Arc::new(index))))
        }
        Err(e) => {
            tracing::warn!(
                "{}; continuing without retrieval",
                InitializationError::Retrieval(e)
            );
            None
        }
    }
}
