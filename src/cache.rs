//! Single-turn response cache.
//!
//! The cache key is a pure function of the normalized question text —
//! never of conversation history — so entries are only valid for
//! first-turn questions. Callers enforce the single-turn restriction; the
//! cache has no notion of conversation context.
//!
//! Everything here is best-effort: a store failure on lookup behaves like
//! a miss, a store failure on record is swallowed, and the hit counter is
//! incremented in a detached task that may lose updates under concurrency
//! but can never block or fail the read path.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::models::CacheEntry;
use crate::store::CacheStore;

/// Lower-case, trim, strip trailing punctuation, collapse internal
/// whitespace. `"What is X?"`, `"what is x"` and `"What is x  ?"` all
/// normalize identically.
pub fn normalize_question(question: &str) -> String {
    let lowered = question.to_lowercase();
    let stripped = lowered
        .trim()
        .trim_end_matches(|c: char| c.is_whitespace() || matches!(c, '?' | '!' | '.' | ',' | ';' | ':'));
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// SHA-256 of the normalized question, hex-encoded.
pub fn question_hash(normalized: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    min_answer_chars: usize,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, min_answer_chars: usize) -> Self {
        Self {
            store,
            min_answer_chars,
        }
    }

    /// Look up a previously recorded answer for this question.
    ///
    /// On a hit the hit counter is incremented in a detached task; losing
    /// that update never delays or fails the returned entry.
    pub async fn lookup(&self, question: &str) -> Option<CacheEntry> {
        let hash = question_hash(&normalize_question(question));
        match self.store.find(&hash).await {
            Ok(Some(entry)) => {
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    let _ = store.increment_hits(&hash).await;
                });
                Some(entry)
            }
            Ok(None) => None,
            Err(_) => None,
        }
    }

    /// Record a freshly generated answer keyed by the normalized question.
    ///
    /// Short answers are not worth caching; write failures are swallowed.
    pub async fn record(&self, question: &str, answer: &str, language: &str) {
        if answer.chars().count() <= self.min_answer_chars {
            return;
        }
        let normalized = normalize_question(question);
        let entry = CacheEntry {
            question_hash: question_hash(&normalized),
            question: normalized,
            answer: answer.to_string(),
            language: language.to_string(),
            hit_count: 0,
        };
        let _ = self.store.upsert(&entry).await;
    }
}
