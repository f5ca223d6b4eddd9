//! Ingest and query orchestration.
//!
//! [`Pipeline`] owns one of each collaborator and is the only thing the CLI
//! and HTTP server talk to:
//!
//! ```text
//! ingest:  documents → extract → chunk → embed (batched) → replace index
//! ask:     question → embed → top-k search → prompt → generate → answer
//! feedback: (answer, feedback) → append-only log
//! ```
//!
//! Each operation runs its stages in sequence. The index and the feedback
//! log serialize their own writers.

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{create_embedder, Embedder, UnavailableEmbedder};
use crate::error::PipelineError;
use crate::extract::extract_documents;
use crate::feedback::{FeedbackSink, FileFeedbackSink};
use crate::generate::{build_prompt, create_generator, Generator, UnavailableGenerator};
use crate::index::{IndexMeta, IndexRecord, IndexStatus, IndexStore};
use crate::models::{Answer, Document, DocumentMetadata};
use crate::retrieve::Retriever;

/// Summary of a successful ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub documents: Vec<DocumentMetadata>,
    pub pages_total: usize,
    pub pages_skipped: usize,
    pub characters: usize,
    pub chunks: usize,
    pub model: String,
    pub dims: usize,
}

pub struct Pipeline {
    chunking: ChunkingConfig,
    batch_size: usize,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: Arc<IndexStore>,
    retriever: Retriever,
    feedback: Arc<dyn FeedbackSink>,
}

impl Pipeline {
    /// Assemble a pipeline from explicit collaborators. The index lives at
    /// `config.index.path`.
    pub fn new(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Self {
        let index = Arc::new(IndexStore::new(config.index.path.clone()));
        let retriever = Retriever::new(
            embedder.clone(),
            index.clone(),
            config.retrieval.top_k,
            config.retrieval.min_score,
        );
        Self {
            chunking: config.chunking.clone(),
            batch_size: config.embedding.batch_size.max(1),
            embedder,
            generator,
            index,
            retriever,
            feedback,
        }
    }

    /// Build the configured embedding and generation providers and the
    /// file-backed feedback log.
    ///
    /// A provider that cannot be constructed (missing API key, feature not
    /// compiled in) is replaced by one that fails on use, so operations that
    /// never reach it still work and the rest surface `ExternalService`.
    pub fn from_config(config: &Config) -> Self {
        let embedder: Arc<dyn Embedder> = match create_embedder(&config.embedding) {
            Ok(embedder) => embedder,
            Err(e) => {
                tracing::warn!(
                    provider = %config.embedding.provider,
                    error = %format!("{:#}", e),
                    "embedding provider unavailable"
                );
                Arc::new(UnavailableEmbedder::new(config.embedding.provider.clone(), &e))
            }
        };
        let generator: Arc<dyn Generator> = match create_generator(&config.llm) {
            Ok(generator) => generator,
            Err(e) => {
                tracing::warn!(
                    provider = %config.llm.provider,
                    error = %format!("{:#}", e),
                    "language model provider unavailable"
                );
                Arc::new(UnavailableGenerator::new(config.llm.provider.clone(), &e))
            }
        };
        let feedback = Arc::new(FileFeedbackSink::new(config.feedback.path.clone()));
        Self::new(config, embedder, generator, feedback)
    }

    pub fn index(&self) -> &IndexStore {
        &self.index
    }

    pub async fn index_status(&self) -> Result<IndexStatus, PipelineError> {
        Ok(self.index.status().await?)
    }

    /// Turn `documents` into a new index, replacing the current one.
    ///
    /// Nothing is embedded or written when the documents hold no text.
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<IngestReport, PipelineError> {
        if documents.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        let started = Instant::now();
        let document_count = documents.len();

        let extracted = tokio::task::spawn_blocking(move || extract_documents(&documents))
            .await
            .context("extraction task failed")??;
        if extracted.text.trim().is_empty() {
            tracing::info!(
                documents = document_count,
                pages = extracted.pages_total,
                "no extractable text"
            );
            return Err(PipelineError::EmptyInput);
        }

        let chunks = chunk_text(
            &extracted.text,
            self.chunking.chunk_size,
            self.chunking.overlap,
        );
        tracing::info!(
            documents = document_count,
            pages = extracted.pages_total,
            skipped = extracted.pages_skipped,
            chunks = chunks.len(),
            "extracted and chunked"
        );

        let mut records = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed(&texts)
                .await
                .map_err(PipelineError::external)?;
            if vectors.len() != batch.len() {
                return Err(PipelineError::ExternalService(format!(
                    "embedding service returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                )));
            }
            let dims = self.embedder.dims();
            if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
                return Err(PipelineError::ExternalService(format!(
                    "embedding model {} returned a {}-dimensional vector, expected {}",
                    self.embedder.model_name(),
                    bad.len(),
                    dims
                )));
            }
            tracing::debug!(batch = batch.len(), "embedded batch");
            records.extend(
                batch
                    .iter()
                    .cloned()
                    .zip(vectors)
                    .map(|(chunk, vector)| IndexRecord { chunk, vector }),
            );
        }

        let meta = self
            .index
            .replace(
                &records,
                &IndexMeta {
                    model: self.embedder.model_name().to_string(),
                    dims: 0,
                    chunk_count: 0,
                    document_count,
                    built_at: Utc::now(),
                },
            )
            .await?;

        tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "ingest complete");

        Ok(IngestReport {
            documents: extracted.documents,
            pages_total: extracted.pages_total,
            pages_skipped: extracted.pages_skipped,
            characters: extracted.text.chars().count(),
            chunks: meta.chunk_count,
            model: meta.model,
            dims: meta.dims,
        })
    }

    /// Answer `question` from the indexed documents.
    pub async fn ask(&self, question: &str) -> Result<Answer, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuery);
        }
        let started = Instant::now();

        let sources = self.retriever.retrieve(question).await?;
        let prompt = build_prompt(&sources, question);
        let text = self
            .generator
            .generate(&prompt)
            .await
            .map_err(PipelineError::external)?;

        tracing::info!(
            sources = sources.len(),
            model = self.generator.model_name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered question"
        );

        Ok(Answer { text, sources })
    }

    pub async fn record_feedback(&self, answer: &str, feedback: &str) -> Result<(), PipelineError> {
        if feedback.trim().is_empty() {
            return Err(PipelineError::EmptyFeedback);
        }
        self.feedback.record(answer, feedback).await?;
        Ok(())
    }
}
