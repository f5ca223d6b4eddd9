//! The persisted embedding index.
//!
//! One SQLite file at a fixed path holds every chunk with its vector plus a
//! single metadata row. The index has two states: ABSENT (no file) and
//! PRESENT. It is never updated in place:
//!
//! 1. [`IndexStore::replace`] builds a complete database in a sibling temp
//!    file (`<name>.tmp-<uuid>`).
//! 2. The temp file is closed and renamed over the target, which is atomic
//!    on POSIX filesystems.
//!
//! Readers open the file per query, so they see either the old index or
//! the new one. Writers are serialized by an async mutex owned by the
//! store; a failed build deletes its temp file and leaves the previous
//! index in place.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db;
use crate::embedding::cosine_similarity;
use crate::models::{ScoredChunk, TextChunk};

/// A chunk and its embedding, as written to the index.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub chunk: TextChunk,
    pub vector: Vec<f32>,
}

/// Facts about the most recent successful build.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexMeta {
    pub model: String,
    pub dims: usize,
    pub chunk_count: usize,
    pub document_count: usize,
    pub built_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum IndexStatus {
    Absent,
    Present(IndexMeta),
}

/// Handle to the single on-disk index.
pub struct IndexStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub async fn status(&self) -> Result<IndexStatus> {
        if !self.exists() {
            return Ok(IndexStatus::Absent);
        }
        let pool = db::open_read_only(&self.path).await?;
        let meta = read_meta(&pool).await;
        pool.close().await;
        Ok(IndexStatus::Present(meta?))
    }

    /// Replace the whole index with `records`.
    ///
    /// All vectors must have the same, non-zero length. `meta.dims` and
    /// `meta.chunk_count` are taken from the records.
    pub async fn replace(&self, records: &[IndexRecord], meta: &IndexMeta) -> Result<IndexMeta> {
        let dims = records.first().map(|r| r.vector.len()).unwrap_or(0);
        if dims == 0 {
            bail!("refusing to write an index without vectors");
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dims) {
            bail!(
                "chunk {} has a {}-dimensional vector, expected {}",
                bad.chunk.index,
                bad.vector.len(),
                dims
            );
        }
        let meta = IndexMeta {
            dims,
            chunk_count: records.len(),
            ..meta.clone()
        };

        let _guard = self.write_lock.lock().await;
        let tmp = self.temp_path();

        let built = write_index(&tmp, records, &meta).await;
        if let Err(e) = built {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.context(format!("failed to build index at {}", tmp.display())));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(anyhow::Error::new(e)
                .context(format!("failed to move index into {}", self.path.display())));
        }

        tracing::info!(
            path = %self.path.display(),
            chunks = meta.chunk_count,
            dims = meta.dims,
            "index replaced"
        );
        Ok(meta)
    }

    /// The `k` chunks most similar to `query` by cosine similarity,
    /// best first. Ties keep document order.
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let pool = db::open_read_only(&self.path)
            .await
            .with_context(|| format!("failed to open index at {}", self.path.display()))?;
        let result = search_pool(&pool, query, k).await;
        pool.close().await;
        result
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index.sqlite".to_string());
        self.path
            .with_file_name(format!("{}.tmp-{}", name, Uuid::new_v4()))
    }
}

async fn write_index(path: &Path, records: &[IndexRecord], meta: &IndexMeta) -> Result<()> {
    let pool = db::create(path).await?;
    let result = populate(&pool, records, meta).await;
    pool.close().await;
    result
}

async fn populate(pool: &SqlitePool, records: &[IndexRecord], meta: &IndexMeta) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        CREATE TABLE index_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            chunk_count INTEGER NOT NULL,
            document_count INTEGER NOT NULL,
            built_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE chunks (
            id TEXT PRIMARY KEY,
            chunk_index INTEGER NOT NULL UNIQUE,
            start_offset INTEGER NOT NULL,
            text TEXT NOT NULL,
            hash TEXT NOT NULL,
            embedding BLOB NOT NULL
        )
        "#,
    )
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO index_meta (id, model, dims, chunk_count, document_count, built_at) VALUES (1, ?, ?, ?, ?, ?)",
    )
    .bind(&meta.model)
    .bind(meta.dims as i64)
    .bind(meta.chunk_count as i64)
    .bind(meta.document_count as i64)
    .bind(meta.built_at.timestamp())
    .execute(&mut *tx)
    .await?;

    for record in records {
        let chunk = &record.chunk;
        sqlx::query(
            "INSERT INTO chunks (id, chunk_index, start_offset, text, hash, embedding) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.id)
        .bind(chunk.index)
        .bind(chunk.start as i64)
        .bind(&chunk.text)
        .bind(&chunk.hash)
        .bind(vec_to_blob(&record.vector))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn read_meta(pool: &SqlitePool) -> Result<IndexMeta> {
    let row = sqlx::query(
        "SELECT model, dims, chunk_count, document_count, built_at FROM index_meta WHERE id = 1",
    )
    .fetch_one(pool)
    .await
    .context("index metadata missing")?;

    let built_at: i64 = row.get("built_at");
    Ok(IndexMeta {
        model: row.get("model"),
        dims: row.get::<i64, _>("dims") as usize,
        chunk_count: row.get::<i64, _>("chunk_count") as usize,
        document_count: row.get::<i64, _>("document_count") as usize,
        built_at: DateTime::from_timestamp(built_at, 0).unwrap_or_default(),
    })
}

async fn search_pool(pool: &SqlitePool, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
    let meta = read_meta(pool).await?;
    if query.len() != meta.dims {
        bail!(
            "index was built with a different embedding model ({} dims with {}, query has {})",
            meta.dims,
            meta.model,
            query.len()
        );
    }

    let rows = sqlx::query(
        "SELECT id, chunk_index, start_offset, text, hash, embedding FROM chunks",
    )
    .fetch_all(pool)
    .await?;

    let mut scored: Vec<ScoredChunk> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let score = cosine_similarity(query, &blob_to_vec(&blob));
            ScoredChunk {
                chunk: TextChunk {
                    id: row.get("id"),
                    index: row.get("chunk_index"),
                    text: row.get("text"),
                    start: row.get::<i64, _>("start_offset") as usize,
                    hash: row.get("hash"),
                },
                score,
            }
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.chunk.index.cmp(&b.chunk.index))
    });
    scored.truncate(k);

    Ok(scored)
}

/// Encode a float vector as little-endian `f32` bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}
