//! Context assembly for the generation prompt.
//!
//! Passages under the similarity threshold are dropped; the rest are joined
//! in retrieval order.

use super::Passage;

pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug, Clone)]
pub struct ContextBuilder {
    similarity_threshold: f64,
}

impl ContextBuilder {
    pub fn new(similarity_threshold: f64) -> Self {
        Self {
            similarity_threshold,
        }
    }

    /// Passages at or above the threshold, in retrieval order.
    pub fn relevant<'a>(&self, passages: &'a [Passage]) -> Vec<&'a Passage> {
        passages
            .iter()
            .filter(|p| p.relevance_score >= self.similarity_threshold)
            .filter(|p| !p.text.trim().is_empty())
            .collect()
    }

    /// Joined context block; empty when nothing clears the threshold.
    pub fn build(&self, passages: &[Passage]) -> String {
        self.relevant(passages)
            .iter()
            .map(|p| p.text.trim())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Distinct sources of the passages that made it into the context.
    pub fn sources(&self, passages: &[Passage]) -> Vec<String> {
        let mut sources: Vec<String> = self
            .relevant(passages)
            .iter()
            .map(|p| p.source.clone())
            .collect();
        sources.sort();
        sources.dedup();
        sources
    }
}
