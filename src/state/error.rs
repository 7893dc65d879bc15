use thiserror::Error;

use crate::core::errors::ConfigError;
use crate::history::StoreError;
use crate::llm::LlmError;
use crate::rag::RetrievalError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Failed to load configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to initialize conversation store: {0}")]
    Store(#[source] StoreError),

    #[error("Failed to initialize LLM client: {0}")]
    Llm(#[source] LlmError),

    #[error("Failed to initialize vector index: {0}")]
    Retrieval(#[source] RetrievalError),
}
