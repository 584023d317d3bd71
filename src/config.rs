use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct DbConfig {
    /// Document/cache store connection URL. Usually left unset in the file
    /// and supplied via the DATABASE_URL environment variable.
    #[serde(default)]
    pub url: Option<String>,
}

impl DbConfig {
    pub fn resolve_url(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var("DATABASE_URL").map_err(|_| {
            anyhow::anyhow!(
                "no database URL configured: set [db] url or the DATABASE_URL environment variable"
            )
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default = "default_markdown_glob")]
    pub markdown_glob: String,
    #[serde(default = "default_transcript_glob")]
    pub transcript_glob: String,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            markdown_glob: default_markdown_glob(),
            transcript_glob: default_transcript_glob(),
        }
    }
}

fn default_markdown_glob() -> String {
    "**/*.md".to_string()
}
fn default_transcript_glob() -> String {
    "**/video_transcripts/**/*.txt.txt".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_overlap_tokens")]
    pub overlap_tokens: usize,
    #[serde(default = "default_max_section_tokens")]
    pub max_section_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size_tokens(),
            overlap_tokens: default_overlap_tokens(),
            max_section_tokens: default_max_section_tokens(),
        }
    }
}

fn default_chunk_size_tokens() -> usize {
    800
}
fn default_overlap_tokens() -> usize {
    50
}
fn default_max_section_tokens() -> usize {
    1500
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f64,
    #[serde(default = "default_match_count")]
    pub match_count: i64,
    #[serde(default = "default_keyword_limit")]
    pub keyword_limit: i64,
    #[serde(default = "default_keyword_similarity")]
    pub keyword_similarity: f64,
    #[serde(default = "default_pairwise_similarity")]
    pub pairwise_similarity: f64,
    #[serde(default = "default_max_keywords")]
    pub max_keywords: usize,
    /// Caps on the pairwise fallback's attempt list (first x second index
    /// combinations, tried in order).
    #[serde(default = "default_pairwise_first")]
    pub pairwise_first: usize,
    #[serde(default = "default_pairwise_second")]
    pub pairwise_second: usize,
    #[serde(default = "default_max_query_chars")]
    pub max_query_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: default_match_threshold(),
            match_count: default_match_count(),
            keyword_limit: default_keyword_limit(),
            keyword_similarity: default_keyword_similarity(),
            pairwise_similarity: default_pairwise_similarity(),
            max_keywords: default_max_keywords(),
            pairwise_first: default_pairwise_first(),
            pairwise_second: default_pairwise_second(),
            max_query_chars: default_max_query_chars(),
        }
    }
}

fn default_match_threshold() -> f64 {
    0.25
}
fn default_match_count() -> i64 {
    12
}
fn default_keyword_limit() -> i64 {
    6
}
fn default_keyword_similarity() -> f64 {
    0.5
}
fn default_pairwise_similarity() -> f64 {
    0.45
}
fn default_max_keywords() -> usize {
    5
}
fn default_pairwise_first() -> usize {
    3
}
fn default_pairwise_second() -> usize {
    4
}
fn default_max_query_chars() -> usize {
    10_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_batch_size() -> usize {
    32
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Generated answers at or under this length are not worth caching.
    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

fn default_min_answer_chars() -> usize {
    50
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).context("failed to parse config file")?;

    if config.chunking.chunk_size_tokens == 0 {
        anyhow::bail!("chunking.chunk_size_tokens must be > 0");
    }
    if config.chunking.overlap_tokens >= config.chunking.chunk_size_tokens {
        anyhow::bail!("chunking.overlap_tokens must be smaller than chunk_size_tokens");
    }
    if config.chunking.max_section_tokens < config.chunking.chunk_size_tokens {
        anyhow::bail!("chunking.max_section_tokens must be >= chunk_size_tokens");
    }

    if config.retrieval.match_count < 1 {
        anyhow::bail!("retrieval.match_count must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.match_threshold) {
        anyhow::bail!("retrieval.match_threshold must be in [0.0, 1.0]");
    }
    if config.retrieval.max_keywords == 0 {
        anyhow::bail!("retrieval.max_keywords must be >= 1");
    }

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_budgets() {
        let config = Config::default();
        assert_eq!(config.chunking.chunk_size_tokens, 800);
        assert_eq!(config.chunking.overlap_tokens, 50);
        assert_eq!(config.chunking.max_section_tokens, 1500);
        assert_eq!(config.retrieval.match_count, 12);
        assert!((config.retrieval.match_threshold - 0.25).abs() < 1e-9);
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.cache.min_answer_chars, 50);
    }

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.retrieval.max_keywords, 5);
        assert_eq!(config.retrieval.pairwise_first, 3);
        assert_eq!(config.retrieval.pairwise_second, 4);
    }

    #[test]
    fn overrides_apply() {
        let config: Config = toml::from_str(
            r#"
            [chunking]
            chunk_size_tokens = 400

            [retrieval]
            match_count = 6
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.chunk_size_tokens, 400);
        assert_eq!(config.retrieval.match_count, 6);
        assert_eq!(config.chunking.overlap_tokens, 50);
    }
}
