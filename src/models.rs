//! Core data types flowing through the ingestion and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// Kind of source document, inferred from its location and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Markdown,
    Transcript,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Markdown => "markdown",
            DocumentType::Transcript => "transcript",
        }
    }
}

/// Metadata persisted alongside each chunk's content and embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Path relative to the corpus root.
    pub source: String,
    /// 0-based, sequential within one source file.
    pub chunk_index: i64,
    pub document_type: DocumentType,
}

/// A bounded span of source text, stored and embedded as one retrievable unit.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// A document-store record plus its similarity score and resolved source label.
#[derive(Debug, Clone)]
pub struct RetrievedDocument {
    pub id: i64,
    pub content: String,
    pub metadata: serde_json::Value,
    /// Ranking-only. Cosine similarity for vector hits, or the fixed
    /// constant assigned to the keyword tier that matched.
    pub similarity: f64,
    /// Citation label for the answer generator.
    pub source: String,
}

/// A cached single-turn answer, keyed by the normalized question hash.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub question_hash: String,
    pub question: String,
    pub answer: String,
    pub language: String,
    pub hit_count: i64,
}

/// Summary of one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub markdown_files: usize,
    pub transcript_files: usize,
    pub chunks: usize,
    pub batches: usize,
}
