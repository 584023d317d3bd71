//! In-memory store implementation backing the test suite.
//!
//! Vector search is brute-force cosine similarity over all stored rows;
//! pattern search interprets `%`-wildcard patterns case-insensitively.
//! Identifiers are assigned sequentially from 1 in insertion order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::CacheEntry;

use super::{CacheStore, ChunkRecord, DocumentRow, DocumentStore, PatternMatch};

struct StoredRow {
    id: i64,
    content: String,
    metadata: serde_json::Value,
    embedding: Vec<f32>,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<StoredRow>>,
    cache: RwLock<HashMap<String, CacheEntry>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(0),
        }
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        return 0.0;
    }
    (dot / (norm_a * norm_b)) as f64
}

/// `ILIKE`-style match: the pattern's `%`-separated parts must occur in the
/// content, in order, case-insensitively. Patterns here are always
/// unanchored (`%...%`), which is all the retriever produces.
fn ilike_match(content: &str, pattern: &str) -> bool {
    let haystack = content.to_lowercase();
    let needle = pattern.to_lowercase();
    let mut pos = 0usize;
    for part in needle.split('%').filter(|p| !p.is_empty()) {
        match haystack[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
    }
    true
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn match_documents(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i64,
    ) -> Result<Vec<DocumentRow>> {
        let rows = self.rows.read().unwrap();
        let mut matched: Vec<DocumentRow> = rows
            .iter()
            .map(|row| DocumentRow {
                id: row.id,
                content: row.content.clone(),
                metadata: row.metadata.clone(),
                similarity: cosine_similarity(embedding, &row.embedding),
            })
            .filter(|row| row.similarity >= threshold)
            .collect();
        matched.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matched.truncate(count as usize);
        Ok(matched)
    }

    async fn search_pattern(&self, pattern: &str, limit: i64) -> Result<Vec<PatternMatch>> {
        let rows = self.rows.read().unwrap();
        Ok(rows
            .iter()
            .filter(|row| ilike_match(&row.content, pattern))
            .take(limit as usize)
            .map(|row| PatternMatch {
                id: row.id,
                content: row.content.clone(),
                metadata: row.metadata.clone(),
            })
            .collect())
    }

    async fn insert_chunks(&self, records: &[ChunkRecord]) -> Result<()> {
        let mut rows = self.rows.write().unwrap();
        for record in records {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            rows.push(StoredRow {
                id,
                content: record.chunk.content.clone(),
                metadata: serde_json::to_value(&record.chunk.metadata)?,
                embedding: record.embedding.clone(),
            });
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        self.rows.write().unwrap().clear();
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn find(&self, question_hash: &str) -> Result<Option<CacheEntry>> {
        Ok(self.cache.read().unwrap().get(question_hash).cloned())
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<()> {
        let mut cache = self.cache.write().unwrap();
        let hit_count = cache
            .get(&entry.question_hash)
            .map(|existing| existing.hit_count)
            .unwrap_or(0);
        let mut stored = entry.clone();
        stored.hit_count = hit_count;
        cache.insert(stored.question_hash.clone(), stored);
        Ok(())
    }

    async fn increment_hits(&self, question_hash: &str) -> Result<()> {
        if let Some(entry) = self.cache.write().unwrap().get_mut(question_hash) {
            entry.hit_count += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, ChunkMetadata, DocumentType};

    fn record(content: &str, embedding: Vec<f32>) -> ChunkRecord {
        ChunkRecord {
            chunk: Chunk {
                content: content.to_string(),
                metadata: ChunkMetadata {
                    source: "a.md".to_string(),
                    chunk_index: 0,
                    document_type: DocumentType::Markdown,
                },
            },
            embedding,
        }
    }

    #[test]
    fn ilike_parts_in_order() {
        assert!(ilike_match("Configure the Booking Engine", "%configure%engine%"));
        assert!(!ilike_match("Engine then configure", "%configure%engine%"));
        assert!(ilike_match("anything", "%"));
    }

    #[tokio::test]
    async fn vector_search_filters_and_orders() {
        let store = MemoryStore::new();
        store
            .insert_chunks(&[
                record("far", vec![0.0, 1.0]),
                record("close", vec![1.0, 0.1]),
                record("exact", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store
            .match_documents(&[1.0, 0.0], 0.25, 12)
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "exact");
        assert_eq!(results[1].content, "close");
    }

    #[tokio::test]
    async fn upsert_preserves_hit_count() {
        let store = MemoryStore::new();
        let entry = CacheEntry {
            question_hash: "h".to_string(),
            question: "q".to_string(),
            answer: "a".to_string(),
            language: "en".to_string(),
            hit_count: 0,
        };
        store.upsert(&entry).await.unwrap();
        store.increment_hits("h").await.unwrap();
        store.upsert(&entry).await.unwrap();
        assert_eq!(store.find("h").await.unwrap().unwrap().hit_count, 1);
    }
}
