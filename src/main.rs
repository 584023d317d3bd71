//! # askbase CLI
//!
//! Commands for corpus ingestion and retrieval inspection.
//!
//! | Command | Description |
//! |---------|-------------|
//! | `askbase ingest <dir>` | Chunk, embed, and store a corpus directory |
//! | `askbase search "<query>"` | Run hybrid retrieval and print ranked results |
//!
//! ## Examples
//!
//! ```bash
//! # Full reingest (wipes the store first — the default)
//! askbase ingest ./knowledge-base
//!
//! # Append without wiping
//! askbase ingest ./knowledge-base --no-clean
//!
//! # Inspect what a query retrieves
//! askbase search "how do I configure seasonal rates"
//! ```
//!
//! Credentials come from the environment: `DATABASE_URL` for the document
//! store and `OPENAI_API_KEY` for the embedding service.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use askbase::config;
use askbase::embedding::OpenAiEmbedder;
use askbase::ingest::run_ingest;
use askbase::progress::ProgressMode;
use askbase::retrieve::HybridRetriever;
use askbase::store::postgres::PostgresStore;

/// askbase — retrieval core for a bilingual document QA assistant.
#[derive(Parser)]
#[command(
    name = "askbase",
    about = "Retrieval core for a document QA assistant: corpus ingestion and hybrid search",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/askbase.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a corpus directory into the document store.
    ///
    /// Walks the directory, classifies files (markdown vs. video
    /// transcript), chunks and embeds them, and writes the records in
    /// batches. By default the store is wiped first (full replace);
    /// --no-clean appends instead.
    Ingest {
        /// Corpus root directory.
        corpus_dir: PathBuf,

        /// Wipe the document store before writing (the default).
        #[arg(long, conflicts_with = "no_clean")]
        clean: bool,

        /// Append to the existing store instead of wiping it first.
        #[arg(long)]
        no_clean: bool,

        /// Emit machine-readable progress (JSON lines on stderr).
        #[arg(long)]
        json_progress: bool,
    },

    /// Run hybrid retrieval for a query and print ranked results.
    Search {
        /// The query string.
        query: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest {
            corpus_dir,
            clean: _,
            no_clean,
            json_progress,
        } => {
            let clean = !no_clean;
            let store = PostgresStore::connect(&cfg.db.resolve_url()?).await?;
            let embedder = OpenAiEmbedder::new(&cfg.embedding)?;
            let reporter = if json_progress {
                ProgressMode::Json.reporter()
            } else {
                ProgressMode::default_for_tty().reporter()
            };

            println!("Reading corpus from: {}", corpus_dir.display());
            let report = run_ingest(
                &cfg,
                &store,
                &embedder,
                &corpus_dir,
                clean,
                reporter.as_ref(),
            )
            .await?;

            if report.chunks == 0 {
                println!("No chunks found. Nothing to ingest.");
                return Ok(());
            }

            println!("ingest complete");
            println!("  markdown files: {}", report.markdown_files);
            println!("  transcript files: {}", report.transcript_files);
            println!("  chunks written: {}", report.chunks);
            println!("  batches: {}", report.batches);
        }

        Commands::Search { query, limit } => {
            let store = PostgresStore::connect(&cfg.db.resolve_url()?).await?;
            let embedder = OpenAiEmbedder::new(&cfg.embedding)?;

            let mut retrieval = cfg.retrieval.clone();
            if let Some(limit) = limit {
                retrieval.match_count = limit;
            }

            let retriever = HybridRetriever::new(&store, &embedder, &retrieval);
            let results = retriever.retrieve(&query).await?;

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for (i, doc) in results.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, doc.similarity, doc.source);
                println!("    excerpt: \"{}\"", excerpt(&doc.content));
                println!();
            }
        }
    }

    Ok(())
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= 160 {
        flat
    } else {
        let mut cut: String = flat.chars().take(160).collect();
        cut.push_str("...");
        cut
    }
}
