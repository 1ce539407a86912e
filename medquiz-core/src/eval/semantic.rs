//! Semantic similarity scoring.
//!
//! `GreedyMatchScorer` computes a BERTScore-style F1: every token of the
//! candidate is matched to its most similar reference token by cosine
//! similarity (precision), and vice versa (recall). Token vectors come from a
//! pluggable [`Embedder`]: a local character-trigram hashing embedder that
//! needs no network, or an OpenAI-compatible embeddings endpoint.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::{EmbeddingConfig, resolve_secret};
use crate::error::{EvaluationError, QuizError};

const METRIC: &str = "semantic";

/// Produces one vector per input text.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EvaluationError>;

    fn provider_name(&self) -> &str;
}

/// Scores how close two texts are in meaning, in [0, 1].
#[async_trait]
pub trait SemanticScorer: Send + Sync {
    async fn f1(&self, candidate: &str, reference: &str) -> Result<f64, EvaluationError>;

    fn name(&self) -> &str;
}

// ── Local hashing embedder ─────────────────────────────────────

/// djb2 string hash.
fn simple_hash(s: &str) -> usize {
    let mut hash: usize = 5381;
    for b in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as usize);
    }
    hash
}

/// Offline embedder: hashes each word and its boundary-padded character
/// trigrams into a fixed-size vector, then L2-normalizes it. Inflected forms
/// share most trigrams, so "kidney" and "kidneys" land close together.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in word_tokens(text) {
            vector[simple_hash(&word) % self.dimensions] += 1.0;

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                vector[simple_hash(&gram) % self.dimensions] += 1.0;
            }
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EvaluationError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn provider_name(&self) -> &str {
        "local"
    }
}

// ── OpenAI-compatible embedder ─────────────────────────────────

/// Embeddings from an OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: Option<String>,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, EvaluationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(concat!("medquiz/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| metric_error(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            api_key,
            model: model.unwrap_or_else(|| "text-embedding-3-small".into()),
            base_url: base_url
                .unwrap_or_else(|| "https://api.openai.com".into())
                .trim_end_matches('/')
                .to_string(),
        })
    }

    /// Pull `data[i].embedding` for every input, ordered by `index`.
    pub fn parse_response(
        json: &serde_json::Value,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>, EvaluationError> {
        let data = json["data"]
            .as_array()
            .ok_or_else(|| metric_error("Embedding response has no 'data' array"))?;

        let mut rows: Vec<(usize, Vec<f32>)> = data
            .iter()
            .enumerate()
            .map(|(pos, item)| {
                let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
                let embedding: Vec<f32> = item["embedding"]
                    .as_array()
                    .ok_or_else(|| metric_error("Embedding entry has no 'embedding'"))?
                    .iter()
                    .filter_map(|v| v.as_f64().map(|f| f as f32))
                    .collect();
                Ok((index, embedding))
            })
            .collect::<Result<_, EvaluationError>>()?;
        rows.sort_by_key(|(index, _)| *index);

        if rows.len() != expected {
            return Err(metric_error(format!(
                "Expected {} embeddings, got {}",
                expected,
                rows.len()
            )));
        }
        Ok(rows.into_iter().map(|(_, v)| v).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EvaluationError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/v1/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        debug!(url = %url, inputs = texts.len(), "Requesting embeddings");

        let mut builder = self.client.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| metric_error(format!("Embedding request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(metric_error(format!("HTTP {}: {}", status.as_u16(), text)));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| metric_error(format!("Invalid embedding JSON: {}", e)))?;
        Self::parse_response(&json, texts.len())
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

// ── Greedy matching scorer ─────────────────────────────────────

/// BERTScore-style F1 over token embeddings.
pub struct GreedyMatchScorer {
    embedder: Arc<dyn Embedder>,
}

impl GreedyMatchScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }
}

#[async_trait]
impl SemanticScorer for GreedyMatchScorer {
    async fn f1(&self, candidate: &str, reference: &str) -> Result<f64, EvaluationError> {
        let cand = word_tokens(candidate);
        let refr = word_tokens(reference);

        if cand == refr {
            return Ok(1.0);
        }
        if cand.is_empty() || refr.is_empty() {
            return Ok(0.0);
        }

        let mut inputs = cand.clone();
        inputs.extend(refr.iter().cloned());
        let vectors = self.embedder.embed_batch(&inputs).await?;
        if vectors.len() != inputs.len() {
            return Err(metric_error(format!(
                "Embedder '{}' returned {} vectors for {} tokens",
                self.embedder.provider_name(),
                vectors.len(),
                inputs.len()
            )));
        }
        let (cand_vecs, ref_vecs) = vectors.split_at(cand.len());

        let precision = mean_best_match(cand_vecs, ref_vecs);
        let recall = mean_best_match(ref_vecs, cand_vecs);
        if precision + recall <= 0.0 {
            return Ok(0.0);
        }
        Ok((2.0 * precision * recall / (precision + recall)).clamp(0.0, 1.0))
    }

    fn name(&self) -> &str {
        "greedy-match"
    }
}

/// Average over `from` of the best cosine similarity in `to`, floored at 0.
fn mean_best_match(from: &[Vec<f32>], to: &[Vec<f32>]) -> f64 {
    let total: f64 = from
        .iter()
        .map(|a| {
            to.iter()
                .map(|b| cosine_similarity(a, b))
                .fold(0.0f64, f64::max)
        })
        .sum();
    total / from.len() as f64
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

/// Lowercased alphanumeric words.
fn word_tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn metric_error(message: impl Into<String>) -> EvaluationError {
    EvaluationError::Metric {
        metric: METRIC.to_string(),
        message: message.into(),
    }
}

/// Build the semantic scorer for `config.provider` ("local" or "openai").
pub fn create_scorer(config: &EmbeddingConfig) -> Result<Arc<dyn SemanticScorer>, QuizError> {
    let embedder: Arc<dyn Embedder> = match config.provider.as_str() {
        "local" => Arc::new(HashingEmbedder::new(config.dimensions)),
        "openai" => {
            let is_local = config
                .base_url
                .as_deref()
                .is_some_and(|u| u.contains("localhost") || u.contains("127.0.0.1"));
            let api_key = if is_local {
                resolve_secret(&config.api_key_env).ok()
            } else {
                Some(resolve_secret(&config.api_key_env)?)
            };
            Arc::new(OpenAiEmbedder::new(api_key, config.model.clone(), config.base_url.clone())?)
        }
        other => {
            return Err(crate::error::ConfigError::Invalid {
                message: format!("Unknown embedding provider '{}'", other),
            }
            .into());
        }
    };
    Ok(Arc::new(GreedyMatchScorer::new(embedder)))
}
