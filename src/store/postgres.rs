//! Postgres-backed stores (pgvector document store + response cache).
//!
//! Expected schema, managed by the database rather than this crate:
//!
//! ```sql
//! CREATE TABLE documents (
//!     id        BIGSERIAL PRIMARY KEY,
//!     content   TEXT NOT NULL,
//!     metadata  JSONB NOT NULL DEFAULT '{}',
//!     embedding VECTOR(1536)
//! );
//!
//! CREATE FUNCTION match_documents(query_embedding VECTOR, match_threshold FLOAT8, match_count BIGINT)
//! RETURNS TABLE (id BIGINT, content TEXT, metadata JSONB, similarity FLOAT8) ...;
//!
//! CREATE TABLE response_cache (
//!     question_hash TEXT PRIMARY KEY,
//!     question      TEXT NOT NULL,
//!     answer        TEXT NOT NULL,
//!     language      TEXT NOT NULL,
//!     hit_count     BIGINT NOT NULL DEFAULT 0
//! );
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use crate::models::CacheEntry;

use super::{CacheStore, ChunkRecord, DocumentRow, DocumentStore, PatternMatch};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .context("failed to connect to the document store")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// pgvector text literal: `[0.1,0.2,...]`.
fn vector_literal(embedding: &[f32]) -> String {
    let mut out = String::with_capacity(embedding.len() * 10 + 2);
    out.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&v.to_string());
    }
    out.push(']');
    out
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn match_documents(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i64,
    ) -> Result<Vec<DocumentRow>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata, similarity FROM match_documents($1::vector, $2, $3)",
        )
        .bind(vector_literal(embedding))
        .bind(threshold)
        .bind(count)
        .fetch_all(&self.pool)
        .await
        .context("similarity search failed")?;

        Ok(rows
            .iter()
            .map(|row| DocumentRow {
                id: row.get("id"),
                content: row.get("content"),
                metadata: row.get("metadata"),
                similarity: row.get("similarity"),
            })
            .collect())
    }

    async fn search_pattern(&self, pattern: &str, limit: i64) -> Result<Vec<PatternMatch>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata FROM documents WHERE content ILIKE $1 LIMIT $2",
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("pattern search failed")?;

        Ok(rows
            .iter()
            .map(|row| PatternMatch {
                id: row.get("id"),
                content: row.get("content"),
                metadata: row.get("metadata"),
            })
            .collect())
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in records {
            let metadata = serde_json::to_value(&record.chunk.metadata)?;
            sqlx::query(
                "INSERT INTO documents (content, metadata, embedding) VALUES ($1, $2, $3::vector)",
            )
            .bind(&record.chunk.content)
            .bind(&metadata)
            .bind(vector_literal(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await.context("chunk batch insert failed")?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await
            .context("failed clearing existing documents")?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for PostgresStore {
    async fn find(&self, question_hash: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            "SELECT question_hash, question, answer, language, hit_count \
             FROM response_cache WHERE question_hash = $1",
        )
        .bind(question_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CacheEntry {
            question_hash: r.get("question_hash"),
            question: r.get("question"),
            answer: r.get("answer"),
            language: r.get("language"),
            hit_count: r.get("hit_count"),
        }))
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO response_cache (question_hash, question, answer, language, hit_count) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (question_hash) DO UPDATE SET \
                 question = excluded.question, \
                 answer = excluded.answer, \
                 language = excluded.language",
        )
        .bind(&entry.question_hash)
        .bind(&entry.question)
        .bind(&entry.answer)
        .bind(&entry.language)
        .bind(entry.hit_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment_hits(&self, question_hash: &str) -> Result<()> {
        sqlx::query("UPDATE response_cache SET hit_count = hit_count + 1 WHERE question_hash = $1")
            .bind(question_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
