//! Hybrid retrieval: vector similarity plus tiered keyword search.
//!
//! Pure vector search misses exact terminology (module names, field
//! labels); the keyword legs recover precision on literal terms the
//! embedding space blurs. Vector hits always take priority in the merge —
//! a keyword match never displaces a vector match for the same record.
//!
//! Tiers, in order:
//!
//! 1. Vector: embed the query, similarity search above a threshold.
//! 2. Multiword: one substring pattern requiring up to the first
//!    `max_keywords` extracted keywords to co-occur in order.
//! 3. Pairwise: if the multiword tier is empty, an explicit ordered list
//!    of 2-keyword patterns, stopping at the first non-empty result.
//!
//! The vector and multiword legs are independent store reads and are
//! issued concurrently; the pairwise fallback is inherently sequential.

use anyhow::{bail, Result};
use std::collections::HashSet;

use crate::config::RetrievalConfig;
use crate::embedding::Embedder;
use crate::models::RetrievedDocument;
use crate::store::{resolve_source_labels, DocumentRow, DocumentStore};

/// Tokens never used as search keywords. English and Italian; tokens of
/// length <= 2 are dropped before this list applies.
const STOP_WORDS: &[&str] = &[
    // English
    "the", "and", "are", "was", "were", "but", "for", "with", "from", "into", "about", "this",
    "that", "these", "those", "what", "when", "where", "which", "who", "why", "how", "can",
    "could", "should", "would", "does", "did", "not", "you", "your", "have", "has", "had", "will",
    "than", "then", "there", "here", "all", "any", "its", "our",
    // Italian
    "che", "chi", "come", "cosa", "con", "per", "non", "una", "uno", "del", "della", "delle",
    "degli", "dei", "nel", "nella", "sul", "sulla", "gli", "dove", "quando", "quale", "quali",
    "perche", "sono", "essere", "fare", "posso", "devo", "puoi", "viene", "vengono", "anche",
    "questo", "questa", "questi", "queste",
];

pub struct HybridRetriever<'a> {
    store: &'a dyn DocumentStore,
    embedder: &'a dyn Embedder,
    config: &'a RetrievalConfig,
}

impl<'a> HybridRetriever<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        embedder: &'a dyn Embedder,
        config: &'a RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Retrieve the ranked, source-attributed context set for a query.
    ///
    /// Oversized queries are rejected before any embedding or store call.
    /// A query with no usable keywords still runs the vector leg; a query
    /// matching nothing returns an empty set, which is not an error.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedDocument>> {
        let length = query.chars().count();
        if length > self.config.max_query_chars {
            bail!(
                "query too long: {} characters (maximum {})",
                length,
                self.config.max_query_chars
            );
        }

        let keywords = extract_keywords(query);

        let (vector, multiword) =
            tokio::join!(self.vector_leg(query), self.multiword_leg(&keywords));
        let vector = vector?;
        let mut keyword = multiword?;

        if keyword.is_empty() && keywords.len() >= 2 {
            keyword = self.pairwise_leg(&keywords).await?;
        }

        let merged = merge_results(vector, keyword, self.config.match_count as usize);
        Ok(resolve_source_labels(merged))
    }

    async fn vector_leg(&self, query: &str) -> Result<Vec<DocumentRow>> {
        let embedding = self.embedder.embed(query).await?;
        self.store
            .match_documents(&embedding, self.config.match_threshold, self.config.match_count)
            .await
    }

    async fn multiword_leg(&self, keywords: &[String]) -> Result<Vec<DocumentRow>> {
        if keywords.is_empty() {
            return Ok(Vec::new());
        }
        let take = self.config.max_keywords.min(keywords.len());
        let pattern = format!("%{}%", keywords[..take].join("%"));
        let matches = self
            .store
            .search_pattern(&pattern, self.config.keyword_limit)
            .await?;
        Ok(scored(matches, self.config.keyword_similarity))
    }

    async fn pairwise_leg(&self, keywords: &[String]) -> Result<Vec<DocumentRow>> {
        let pairs = keyword_pairs(
            keywords.len(),
            self.config.pairwise_first,
            self.config.pairwise_second,
        );
        for (i, j) in pairs {
            let pattern = format!("%{}%{}%", keywords[i], keywords[j]);
            let matches = self
                .store
                .search_pattern(&pattern, self.config.keyword_limit)
                .await?;
            if !matches.is_empty() {
                return Ok(scored(matches, self.config.pairwise_similarity));
            }
        }
        Ok(Vec::new())
    }
}

fn scored(matches: Vec<crate::store::PatternMatch>, similarity: f64) -> Vec<DocumentRow> {
    matches
        .into_iter()
        .map(|m| DocumentRow {
            id: m.id,
            content: m.content,
            metadata: m.metadata,
            similarity,
        })
        .collect()
}

/// Lower-case whitespace tokens, minus stop words and tokens of length <= 2.
pub fn extract_keywords(query: &str) -> Vec<String> {
    let lowered = query.to_lowercase();
    lowered
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// The ordered attempt list for the pairwise fallback: index pairs `(i, j)`
/// with `i` over the first `first` keywords and `j` over the next `second`
/// positions after `i`. The bounds are caps, not targets.
pub fn keyword_pairs(len: usize, first: usize, second: usize) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for i in 0..first.min(len) {
        for j in (i + 1)..(i + 1 + second).min(len) {
            pairs.push((i, j));
        }
    }
    pairs
}

/// Union the two legs: vector results kept in full and listed first,
/// keyword results appended only when their id is new, then truncated.
fn merge_results(
    vector: Vec<DocumentRow>,
    keyword: Vec<DocumentRow>,
    top_k: usize,
) -> Vec<DocumentRow> {
    let seen: HashSet<i64> = vector.iter().map(|row| row.id).collect();
    let mut merged = vector;
    for row in keyword {
        if !seen.contains(&row.id) {
            merged.push(row);
        }
    }
    merged.truncate(top_k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: i64, similarity: f64) -> DocumentRow {
        DocumentRow {
            id,
            content: format!("content {}", id),
            metadata: serde_json::json!({ "source": format!("doc{}.md", id) }),
            similarity,
        }
    }

    #[test]
    fn keywords_drop_stop_words_and_short_tokens() {
        let keywords = extract_keywords("How do I configure the booking engine on it?");
        assert_eq!(keywords, vec!["configure", "booking", "engine", "it?"]);
    }

    #[test]
    fn keywords_bilingual_stop_words() {
        let keywords = extract_keywords("Come posso configurare una tariffa nel contratto");
        assert_eq!(keywords, vec!["configurare", "tariffa", "contratto"]);
    }

    #[test]
    fn keywords_lowercased() {
        assert_eq!(extract_keywords("Booking ENGINE"), vec!["booking", "engine"]);
    }

    #[test]
    fn keywords_empty_query() {
        assert!(extract_keywords("").is_empty());
        assert!(extract_keywords("the and a of").is_empty());
    }

    #[test]
    fn pair_attempts_ordered_and_capped() {
        assert_eq!(
            keyword_pairs(5, 3, 4),
            vec![
                (0, 1),
                (0, 2),
                (0, 3),
                (0, 4),
                (1, 2),
                (1, 3),
                (1, 4),
                (2, 3),
                (2, 4),
            ]
        );
        assert_eq!(keyword_pairs(2, 3, 4), vec![(0, 1)]);
        assert!(keyword_pairs(1, 3, 4).is_empty());
        assert!(keyword_pairs(0, 3, 4).is_empty());
    }

    #[test]
    fn merge_vector_priority_dedup() {
        let vector = vec![row(1, 0.9), row(2, 0.8), row(3, 0.7)];
        let keyword = vec![row(2, 0.5), row(4, 0.5), row(3, 0.5)];
        let merged = merge_results(vector, keyword, 12);
        let ids: Vec<i64> = merged.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        // Shared ids keep the vector-leg score.
        assert!((merged[1].similarity - 0.8).abs() < 1e-9);
        assert!((merged[3].similarity - 0.5).abs() < 1e-9);
    }

    #[test]
    fn merge_truncates_to_top_k() {
        let vector: Vec<DocumentRow> = (1..=10).map(|i| row(i, 0.9)).collect();
        let keyword: Vec<DocumentRow> = (11..=20).map(|i| row(i, 0.5)).collect();
        let merged = merge_results(vector, keyword, 12);
        assert_eq!(merged.len(), 12);
        assert_eq!(merged[9].id, 10);
        assert_eq!(merged[10].id, 11);
        assert_eq!(merged[11].id, 12);
    }

    #[test]
    fn merge_empty_legs() {
        assert!(merge_results(Vec::new(), Vec::new(), 12).is_empty());
        let only_keyword = merge_results(Vec::new(), vec![row(1, 0.45)], 12);
        assert_eq!(only_keyword.len(), 1);
    }
}
