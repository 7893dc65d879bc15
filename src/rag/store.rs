//! Vector index seam: hosted indexes implement `VectorIndex`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::RetrievalError;

/// A chunk ready to be written to the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub id: String,
    pub values: Vec<f32>,
    pub text: String,
    pub source: String,
    /// Extra metadata stored next to `text` and `source`.
    pub metadata: Map<String, Value>,
}

/// One similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMatch {
    pub id: String,
    /// Similarity score (higher = better).
    pub score: f64,
    pub text: String,
    pub source: String,
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Nearest neighbours of `vector`.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ChunkMatch>, RetrievalError>;

    /// Insert or overwrite chunks; returns how many the index accepted.
    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<usize, RetrievalError>;
}
