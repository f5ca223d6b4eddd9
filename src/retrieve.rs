//! Top-k retrieval against the persisted index.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::PipelineError;
use crate::index::IndexStore;
use crate::models::ScoredChunk;

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<IndexStore>,
    top_k: usize,
    min_score: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<IndexStore>,
        top_k: usize,
        min_score: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            min_score,
        }
    }

    /// The most relevant chunks for `query`, best first.
    ///
    /// Fails with [`PipelineError::IndexUnavailable`] before touching the
    /// embedder when nothing has been ingested, and with
    /// [`PipelineError::NoMatch`] when no chunk scores above `min_score`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredChunk>, PipelineError> {
        if !self.index.exists() {
            return Err(PipelineError::IndexUnavailable);
        }

        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .map_err(PipelineError::external)?;

        let hits = match self.index.search(&query_vec, self.top_k).await {
            Ok(hits) => hits,
            // Removed between the existence check and the open.
            Err(_) if !self.index.exists() => return Err(PipelineError::IndexUnavailable),
            Err(e) => return Err(e.into()),
        };

        let relevant: Vec<ScoredChunk> = hits
            .into_iter()
            .filter(|h| h.score > self.min_score)
            .collect();

        tracing::debug!(
            top_k = self.top_k,
            relevant = relevant.len(),
            best = relevant.first().map(|h| h.score),
            "retrieved chunks"
        );

        if relevant.is_empty() {
            return Err(PipelineError::NoMatch);
        }
        Ok(relevant)
    }
}
