//! Retrieval-augmented generation support.
//!
//! - `Retriever`: the capability the chat orchestrator consumes
//! - `VectorRetriever`: embeds the query and searches a `VectorIndex`
//! - `PineconeIndex`: hosted vector index backend
//! - `ContextBuilder`: threshold filtering and context assembly
//! - `Chunker`: document splitting for ingestion

mod context_builder;
mod chunker;
pub mod pinecone;
mod retriever;
mod store;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use context_builder::{ContextBuilder, CONTEXT_SEPARATOR};
pub use chunker::{Chunker, ChunkerConfig, TextChunk};
pub use pinecone::{PineconeControl, PineconeIndex};
pub use retriever::VectorRetriever;
pub use store::{ChunkMatch, IndexedChunk, VectorIndex};

/// A retrieved piece of reference text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub source: String,
    pub relevance_score: f64,
}

impl Passage {
    pub fn new(text: impl Into<String>, source: impl Into<String>, relevance_score: f64) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            relevance_score,
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to embed query: {0}")]
    Embedding(String),
    #[error("vector index request failed: {0}")]
    Index(String),
    #[error("retrieval timed out")]
    Timeout,
    #[error("vector index returned an unexpected payload: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for RetrievalError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RetrievalError::Timeout
        } else if err.is_decode() {
            RetrievalError::MalformedResponse(err.to_string())
        } else {
            RetrievalError::Index(err.to_string())
        }
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` passages relevant to `query`, best match first.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError>;
}
