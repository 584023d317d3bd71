//! Ingest progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. The human format is the default when stderr is a TTY.

use std::io::Write;

/// A single progress event for an ingestion run.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent {
    /// Corpus walk started.
    Scanning { corpus_root: String },
    /// Chunk generation finished; embedding/writing is about to start.
    ChunksPrepared { chunks: u64 },
    /// One embed+insert batch committed: `inserted` of `total` chunks done.
    BatchInserted { inserted: u64, total: u64 },
}

/// Reports ingest progress. Implementations write to stderr.
pub trait IngestProgressReporter: Send + Sync {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress: "ingest  1,234 / 5,000 chunks".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        let line = match &event {
            IngestProgressEvent::Scanning { corpus_root } => {
                format!("ingest {}  scanning...\n", corpus_root)
            }
            IngestProgressEvent::ChunksPrepared { chunks } => {
                format!("ingest  prepared {} chunks\n", format_number(*chunks))
            }
            IngestProgressEvent::BatchInserted { inserted, total } => {
                format!(
                    "ingest  {} / {} chunks\n",
                    format_number(*inserted),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestProgressEvent) {
        let obj = match &event {
            IngestProgressEvent::Scanning { corpus_root } => serde_json::json!({
                "event": "progress",
                "phase": "scanning",
                "corpus_root": corpus_root
            }),
            IngestProgressEvent::ChunksPrepared { chunks } => serde_json::json!({
                "event": "progress",
                "phase": "prepared",
                "chunks": chunks
            }),
            IngestProgressEvent::BatchInserted { inserted, total } => serde_json::json!({
                "event": "progress",
                "phase": "inserting",
                "inserted": inserted,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
