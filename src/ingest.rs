//! Corpus ingestion pipeline: walk, classify, (clean,) chunk, embed, store.
//!
//! A single sequential batch pipeline: one corpus walk produces all chunks
//! up front, then each batch performs one blocking embedding call followed
//! by one store write. Batches never overlap. A failed batch aborts the
//! run; batches already committed stay committed (at-least-once, not
//! atomic across the corpus).
//!
//! With `clean` set, the store is wiped only after chunk generation has
//! succeeded and immediately before the write phase — a chunking failure
//! must never destroy the existing index.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use globset::Glob;
use walkdir::WalkDir;

use crate::chunk::{recursive_chunk, section_aware_chunk};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::models::{Chunk, ChunkMetadata, DocumentType, IngestReport};
use crate::progress::{IngestProgressEvent, IngestProgressReporter};
use crate::store::{ChunkRecord, DocumentStore};
use crate::transcript::clean_transcript;

struct SourceFile {
    path: PathBuf,
    relative: String,
    document_type: DocumentType,
}

pub async fn run_ingest(
    config: &Config,
    store: &dyn DocumentStore,
    embedder: &dyn Embedder,
    corpus_root: &Path,
    clean: bool,
    reporter: &dyn IngestProgressReporter,
) -> Result<IngestReport> {
    if !corpus_root.is_dir() {
        bail!(
            "corpus path does not exist or is not a directory: {}",
            corpus_root.display()
        );
    }

    reporter.report(IngestProgressEvent::Scanning {
        corpus_root: corpus_root.display().to_string(),
    });

    let files = scan_corpus(config, corpus_root)?;

    let mut report = IngestReport::default();
    let mut chunks: Vec<Chunk> = Vec::new();

    for file in &files {
        let raw = std::fs::read_to_string(&file.path)
            .with_context(|| format!("failed to read {}", file.path.display()))?;

        let pieces = match file.document_type {
            DocumentType::Markdown => {
                report.markdown_files += 1;
                section_aware_chunk(&raw, &config.chunking)
            }
            DocumentType::Transcript => {
                report.transcript_files += 1;
                recursive_chunk(
                    &clean_transcript(&raw),
                    config.chunking.chunk_size_tokens,
                    config.chunking.overlap_tokens,
                )
            }
        };

        for (chunk_index, content) in pieces.into_iter().enumerate() {
            chunks.push(Chunk {
                content,
                metadata: ChunkMetadata {
                    source: file.relative.clone(),
                    chunk_index: chunk_index as i64,
                    document_type: file.document_type,
                },
            });
        }
    }

    // An empty corpus is a no-op, not an error — and nothing gets wiped.
    if chunks.is_empty() {
        return Ok(report);
    }

    report.chunks = chunks.len();
    reporter.report(IngestProgressEvent::ChunksPrepared {
        chunks: chunks.len() as u64,
    });

    if clean {
        store.delete_all().await?;
    }

    let batch_size = config.embedding.batch_size;
    let total = chunks.len() as u64;

    for (batch_index, batch) in chunks.chunks(batch_size).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .with_context(|| format!("embedding batch {} failed", batch_index))?;
        if embeddings.len() != batch.len() {
            bail!(
                "embedding batch {}: expected {} vectors, got {}",
                batch_index,
                batch.len(),
                embeddings.len()
            );
        }

        let records: Vec<ChunkRecord> = batch
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| ChunkRecord { chunk, embedding })
            .collect();

        store
            .insert_chunks(&records)
            .await
            .with_context(|| format!("inserting batch {} failed", batch_index))?;

        report.batches += 1;
        let inserted = (batch_index * batch_size + batch.len()) as u64;
        reporter.report(IngestProgressEvent::BatchInserted { inserted, total });
    }

    Ok(report)
}

/// Enumerate and classify corpus files, in deterministic path order.
/// Files matching neither glob are ignored.
fn scan_corpus(config: &Config, root: &Path) -> Result<Vec<SourceFile>> {
    let markdown = Glob::new(&config.corpus.markdown_glob)
        .context("invalid corpus.markdown_glob")?
        .compile_matcher();
    let transcript = Glob::new(&config.corpus.transcript_glob)
        .context("invalid corpus.transcript_glob")?
        .compile_matcher();

    let mut files = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        let document_type = if transcript.is_match(relative) {
            DocumentType::Transcript
        } else if markdown.is_match(relative) {
            DocumentType::Markdown
        } else {
            continue;
        };

        files.push(SourceFile {
            path: path.to_path_buf(),
            relative: relative.to_string_lossy().to_string(),
            document_type,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}
