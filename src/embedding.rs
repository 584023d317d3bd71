//! Embedding service boundary.
//!
//! Defines the [`Embedder`] trait and the OpenAI-backed implementation used
//! in production. The trait is the seam test code plugs into with fixed
//! vectors.
//!
//! This layer performs **no retries and no fallback**: a missing credential
//! is a fatal construction error, and a failed call propagates to the
//! caller with context. `embed_batch` on an empty slice returns an empty
//! result without touching the network.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Converts text into fixed-length vectors, singly or in batches.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
    /// Embed a single text (used for queries).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    /// Embed a batch of texts, one vector per input, in input order.
    /// An empty batch returns an empty sequence without a network call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embedding provider calling the OpenAI `POST /v1/embeddings` endpoint.
///
/// Requires the `OPENAI_API_KEY` environment variable; its absence is a
/// configuration error raised at construction, before any work begins.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            dims: config.dims,
            api_key,
            client,
        })
    }

    async fn request(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": inputs,
        });

        let response = self
            .client
            .post("https://api.openai.com/v1/embeddings")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("embedding API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_embedding_response(&json)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        if vectors.is_empty() {
            bail!("empty embedding response");
        }
        Ok(vectors.swap_remove(0))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

/// Extract the `data[].embedding` arrays from the API response, in order.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("invalid embedding response: missing embedding"))?;

        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vector);
    }

    Ok(embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_response() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2, 0.3] },
                { "embedding": [0.4, 0.5, 0.6] }
            ]
        });
        let vectors = parse_embedding_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 3);
        assert!((vectors[1][0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn parse_missing_data() {
        let json = serde_json::json!({ "error": "nope" });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[test]
    fn parse_missing_embedding_field() {
        let json = serde_json::json!({ "data": [ { "index": 0 } ] });
        assert!(parse_embedding_response(&json).is_err());
    }

    #[tokio::test]
    async fn empty_batch_skips_the_network() {
        // The key only has to exist; no request goes out for an empty batch.
        std::env::set_var("OPENAI_API_KEY", "test-key-never-sent");
        let embedder = OpenAiEmbedder::new(&EmbeddingConfig::default()).unwrap();
        let vectors = embedder.embed_batch(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }
}
