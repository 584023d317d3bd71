//! # askbase
//!
//! Retrieval core for a bilingual (English/Italian) document QA assistant.
//!
//! askbase turns a corpus of mixed-format documents — markdown guides and
//! spoken-word video transcripts — into retrievable chunks, and at query
//! time returns the most relevant chunks by combining semantic (vector)
//! search with lexical (keyword) search, deduplicating and ranking the
//! result. A normalized, hash-keyed response cache memoizes single-turn
//! answers around the (external) generation step.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────┐   ┌───────────┐
//! │  Corpus  │──▶│ Clean+Chunk+Embed │──▶│ Postgres   │
//! │ md / txt │   │   (batch loop)    │   │ pgvector  │
//! └──────────┘   └───────────────────┘   └─────┬─────┘
//!                                              │
//!                         query ──▶ HybridRetriever
//!                                   vector ∪ keyword
//!                                              │
//!                                   ranked context set
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`chunk`] | Token estimation, recursive and section-aware chunking |
//! | [`transcript`] | Spoken-word noise cleanup |
//! | [`embedding`] | Embedding service boundary |
//! | [`ingest`] | Corpus ingestion pipeline |
//! | [`retrieve`] | Hybrid vector+keyword retrieval |
//! | [`cache`] | Single-turn response cache |
//! | [`answer`] | Answer orchestration around the generation boundary |
//! | [`store`] | Document/cache store traits and backends |
//! | [`config`] | TOML configuration |
//! | [`models`] | Core data types |
//! | [`progress`] | Ingest progress reporting |

pub mod answer;
pub mod cache;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod retrieve;
pub mod store;
pub mod transcript;
