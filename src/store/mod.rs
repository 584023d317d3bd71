//! Document and cache store boundary.
//!
//! The retrieval core never talks SQL directly: everything it needs from
//! the backing store is expressed by two traits, [`DocumentStore`] for
//! chunk records and [`CacheStore`] for cached answers. The production
//! backend is Postgres with pgvector ([`postgres::PostgresStore`]); the
//! in-memory backend ([`memory::MemoryStore`]) backs the test suite.
//!
//! Loosely-typed store rows are resolved into [`RetrievedDocument`]s in one
//! place, [`resolve_source_labels`], so optional-metadata handling never
//! leaks into retrieval logic.

pub mod memory;
pub mod postgres;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CacheEntry, Chunk, RetrievedDocument};

/// A stored chunk row with a similarity score attached.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub id: i64,
    pub content: String,
    pub metadata: serde_json::Value,
    pub similarity: f64,
}

/// A stored chunk row matched by pattern search (no score of its own).
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub id: i64,
    pub content: String,
    pub metadata: serde_json::Value,
}

/// A chunk and its embedding, persisted together as one record.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Chunk-record storage: the sole owner of persisted chunks.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Similarity search. Results come back pre-filtered to
    /// `similarity >= threshold`, ordered by similarity descending, and
    /// capped at `count`.
    async fn match_documents(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i64,
    ) -> Result<Vec<DocumentRow>>;

    /// Case-insensitive substring search over chunk content. `pattern`
    /// uses SQL `LIKE` syntax (`%` wildcards).
    async fn search_pattern(&self, pattern: &str, limit: i64) -> Result<Vec<PatternMatch>>;

    /// Insert a batch of records as one store write.
    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Delete every chunk record (full-reingest semantics).
    async fn delete_all(&self) -> Result<()>;
}

/// Keyed lookup/upsert for cached single-turn answers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn find(&self, question_hash: &str) -> Result<Option<CacheEntry>>;
    /// Insert or update the entry. `hit_count` starts at 0 on first insert
    /// and is never reset by a later upsert.
    async fn upsert(&self, entry: &CacheEntry) -> Result<()>;
    async fn increment_hits(&self, question_hash: &str) -> Result<()>;
}

/// Resolve each row's citation label from its metadata, falling back to a
/// synthesized `unknown-source-N` label (1-based position in the list).
pub fn resolve_source_labels(rows: Vec<DocumentRow>) -> Vec<RetrievedDocument> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, row)| {
            let source = row
                .metadata
                .get("source")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| format!("unknown-source-{}", idx + 1));
            RetrievedDocument {
                id: row.id,
                content: row.content,
                metadata: row.metadata,
                similarity: row.similarity,
                source,
            }
        })
        .collect()
}
