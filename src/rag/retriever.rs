use std::sync::Arc;

use async_trait::async_trait;

use super::store::VectorIndex;
use super::{Passage, RetrievalError, Retriever};
use crate::llm::{Embedder, LlmError};

/// Embeds the query, then asks the vector index for its nearest chunks.
#[derive(Clone)]
pub struct VectorRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl VectorRetriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .embedder
            .embed(&[query.to_string()])
            .await
            .map_err(|e| match e {
                LlmError::Timeout => RetrievalError::Timeout,
                other => RetrievalError::Embedding(other.to_string()),
            })?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Embedding("no embedding returned".to_string()))?;

        let mut passages: Vec<Passage> = self
            .index
            .query(&vector, k)
            .await?
            .into_iter()
            .map(|hit| Passage::new(hit.text, hit.source, hit.score))
            .collect();

        passages.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        passages.truncate(k);

        tracing::debug!(
            candidates = passages.len(),
            best = passages.first().map(|p| p.relevance_score),
            "Vector search finished"
        );
        Ok(passages)
    }
}
