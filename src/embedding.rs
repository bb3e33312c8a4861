//! Embedding provider abstraction and the Ollama implementation.
//!
//! [`Embedder`] is the seam between the pipeline and the embedding
//! backend: text in, fixed-dimension dense vector out. [`OllamaEmbedder`]
//! calls a local Ollama instance's `POST /api/embed` endpoint.
//!
//! Model acquisition is an explicit step: construction performs no I/O,
//! and [`OllamaEmbedder::ensure_ready`] pulls the model once before first
//! use, failing fast when the backend cannot provide it.
//!
//! # Retry Strategy
//!
//! Transient HTTP faults use exponential backoff:
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use async_trait::async_trait;
use std::time::Duration;

use crate::config::ModelsConfig;
use crate::error::{RagError, Result};

/// Maps text to a fixed-dimension dense vector. Stateless per call.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Fixed output dimension of the backing model.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, one vector per input, input order preserved.
    /// Every returned vector must have exactly [`dims`](Embedder::dims)
    /// elements; a provider that cannot honor that fails the call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput(
                "cannot embed empty text".to_string(),
            ));
        }
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.is_empty() {
            return Err(RagError::backend_msg("empty embedding response"));
        }
        Ok(vectors.remove(0))
    }
}

/// Embedding provider backed by a local Ollama instance.
///
/// Requires the configured embedding model to be pulled; call
/// [`ensure_ready`](OllamaEmbedder::ensure_ready) once before embedding.
pub struct OllamaEmbedder {
    url: String,
    model: String,
    dims: usize,
    timeout_secs: u64,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            url: config.url.clone(),
            model: config.embedding_model.clone(),
            dims: config.dims,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }

    /// Pull the embedding model so that it is available before first use.
    pub async fn ensure_ready(&self) -> Result<()> {
        pull_model(&self.url, &self.model, self.timeout_secs).await
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Err(RagError::EmptyInput(
                "cannot embed an empty batch".to_string(),
            ));
        }

        let client = http_client(self.timeout_secs)?;
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1u64 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/embed", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value =
                            response.json().await.map_err(|e| {
                                RagError::backend("invalid embedding response body", e)
                            })?;
                        let vectors = parse_embed_response(&json)?;
                        for vector in &vectors {
                            if vector.len() != self.dims {
                                return Err(RagError::query_msg(format!(
                                    "embedding dimension mismatch: model returned {}, \
                                     configured dims is {}",
                                    vector.len(),
                                    self.dims
                                )));
                            }
                        }
                        return Ok(vectors);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(RagError::backend_msg(format!(
                            "Ollama embed error {}: {}",
                            status, body_text
                        )));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    return Err(RagError::backend_msg(format!(
                        "Ollama embed error {}: {}",
                        status, body_text
                    )));
                }
                Err(e) => {
                    last_err = Some(RagError::backend(
                        format!("Ollama connection error (is Ollama running at {}?)", self.url),
                        e,
                    ));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| RagError::backend_msg("embedding failed after retries")))
    }
}

fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| RagError::backend("failed to build HTTP client", e))
}

fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            RagError::backend_msg("invalid Ollama response: missing embeddings array")
        })?;

    let mut result = Vec::with_capacity(embeddings.len());

    for embedding in embeddings {
        let vec: Vec<f32> = embedding
            .as_array()
            .ok_or_else(|| {
                RagError::backend_msg("invalid Ollama response: embedding is not an array")
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        result.push(vec);
    }

    Ok(result)
}

/// Pull a model on the Ollama instance (`POST /api/pull`, non-streaming).
///
/// Shared by the embedding and generation drivers; failure surfaces as
/// [`RagError::ModelUnavailable`].
pub async fn pull_model(url: &str, model: &str, timeout_secs: u64) -> Result<()> {
    let client = http_client(timeout_secs)?;
    let body = serde_json::json!({
        "model": model,
        "stream": false,
    });

    let response = client
        .post(format!("{}/api/pull", url))
        .json(&body)
        .send()
        .await
        .map_err(|e| RagError::ModelUnavailable {
            model: model.to_string(),
            message: format!("cannot reach Ollama at {}: {}", url, e),
        })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(RagError::ModelUnavailable {
            model: model.to_string(),
            message: format!("pull failed with {}: {}", status, body_text),
        });
    }

    let json: serde_json::Value =
        response
            .json()
            .await
            .map_err(|e| RagError::ModelUnavailable {
                model: model.to_string(),
                message: format!("invalid pull response: {}", e),
            })?;

    match json.get("status").and_then(|s| s.as_str()) {
        Some("success") => Ok(()),
        other => Err(RagError::ModelUnavailable {
            model: model.to_string(),
            message: format!("pull did not succeed: {:?}", other),
        }),
    }
}

/// Cosine similarity between two embedding vectors, in `[-1.0, 1.0]`.
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
