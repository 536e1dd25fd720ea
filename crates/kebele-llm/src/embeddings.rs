//! Embeddings support for procedure retrieval.
//!
//! This module provides the [`Embedder`] trait and implementations for
//! turning a query into a vector that the procedure index can search with.
//!
//! # Implementations
//!
//! - [`MockEmbedder`]: Returns deterministic embeddings for testing
//! - [`HttpEmbedder`]: Calls a hosted embeddings API (Gemini or OpenAI
//!   wire format), rotating across a pool of API keys

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::cancel::CallContext;
use crate::error::{LlmError, Result};

/// Per-call bound applied to every embedding request.
pub const DEFAULT_EMBEDDING_TIMEOUT: Duration = Duration::from_secs(15);

/// Placeholder substituted with the selected API key in endpoint templates.
pub const KEY_PLACEHOLDER: &str = "{key}";

/// Default Gemini embedding endpoint.
pub const DEFAULT_GEMINI_EMBED_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent?key={key}";

/// Default OpenAI embedding endpoint.
pub const DEFAULT_OPENAI_EMBED_ENDPOINT: &str = "https://api.openai.com/v1/embeddings";

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
///
/// Implementations do not retry. A failed call is reported immediately.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, ctx: &CallContext, text: &str) -> Result<Vec<f32>>;

    /// Get the dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Get the name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// A mock embedder for testing purposes.
///
/// Generates deterministic embeddings based on text content. Can also be
/// scripted to fail, and counts how many times it was called.
#[derive(Debug)]
pub struct MockEmbedder {
    dimensions: usize,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MockEmbedder {
    /// Create a new mock embedder with the specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Create a mock embedder whose every call fails with a provider error.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new(8)
        }
    }

    /// Number of `embed` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, ctx: &CallContext, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if text.trim().is_empty() {
            return Err(LlmError::InvalidRequest(
                "cannot embed empty text".to_string(),
            ));
        }
        if ctx.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        if let Some(ref message) = self.failure {
            return Err(LlmError::provider(500, message.clone()));
        }

        // Same text always produces the same embedding
        let mut state = simple_hash(text);
        let mut embedding = vec![0.0f32; self.dimensions];
        for value in embedding.iter_mut() {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            *value = ((state >> 16) as u16 as f32 / 32768.0) - 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Simple hash function for deterministic embedding generation.
fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// Key Rotation
// ─────────────────────────────────────────────────────────────────────────────

/// A fixed pool of API keys handed out round-robin.
///
/// The cursor is a single atomic counter: each call claims one slot with
/// `fetch_add` and uses `slot % len`, so concurrent callers never share
/// a claim and no lock is taken.
pub struct KeyRing {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRing {
    /// Build a ring from a non-empty set of keys.
    ///
    /// Blank entries are dropped. Zero usable keys is a configuration error.
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();

        if keys.is_empty() {
            return Err(LlmError::Config(
                "at least one embedding API key is required".to_string(),
            ));
        }

        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Claim the next key, returning its slot index and value.
    pub fn next(&self) -> (usize, &str) {
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % self.keys.len();
        (slot, &self.keys[slot])
    }

    /// Number of keys in the ring.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; a ring cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for KeyRing {
    // Key material never reaches logs
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("keys", &self.keys.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Wire format spoken by the embeddings endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingApi {
    /// Gemini `embedContent`. The key goes into the URL via `{key}`,
    /// or the `x-goog-api-key` header when the template has no placeholder.
    Gemini,
    /// OpenAI `/embeddings`. The key is sent as a bearer token.
    OpenAi,
}

impl EmbeddingApi {
    /// Parse an API flavour from its configuration name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gemini" | "google" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => DEFAULT_GEMINI_EMBED_ENDPOINT,
            Self::OpenAi => DEFAULT_OPENAI_EMBED_ENDPOINT,
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "text-embedding-004",
            Self::OpenAi => "text-embedding-3-small",
        }
    }
}

/// Configuration for [`HttpEmbedder`].
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    /// Wire format.
    pub api: EmbeddingApi,
    /// Endpoint template, optionally containing `{key}`.
    pub endpoint: String,
    /// Embedding model name.
    pub model: String,
    /// API keys to rotate across.
    pub api_keys: Vec<String>,
    /// Per-call bound.
    pub timeout: Duration,
    /// Reported vector dimensions.
    pub dimensions: usize,
}

impl HttpEmbedderConfig {
    /// Create a config with the API's default endpoint and model.
    pub fn new<I, S>(api: EmbeddingApi, api_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dimensions = match api {
            EmbeddingApi::Gemini => 768,
            EmbeddingApi::OpenAi => 1536,
        };
        Self {
            api,
            endpoint: api.default_endpoint().to_string(),
            model: api.default_model().to_string(),
            api_keys: api_keys.into_iter().map(Into::into).collect(),
            timeout: DEFAULT_EMBEDDING_TIMEOUT,
            dimensions,
        }
    }

    /// Set the endpoint template.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the per-call bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the reported dimensions.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// Hosted embeddings client with round-robin key rotation.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
    keys: KeyRing,
}

impl HttpEmbedder {
    /// Create a new embedder. Fails when no API key is configured.
    pub fn new(config: HttpEmbedderConfig) -> Result<Self> {
        let keys = KeyRing::new(config.api_keys.iter().cloned())?;
        if config.endpoint.trim().is_empty() {
            return Err(LlmError::Config(
                "embedding endpoint cannot be empty".to_string(),
            ));
        }

        // The per-call bound is enforced by CallContext, not the HTTP client
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            keys,
        })
    }

    /// Number of keys being rotated.
    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn endpoint_for(&self, key: &str) -> String {
        self.config.endpoint.replace(KEY_PLACEHOLDER, key)
    }

    async fn request(&self, slot: usize, key: &str, text: &str) -> Result<Vec<f32>> {
        tracing::debug!(
            embedder = self.name(),
            key_slot = slot,
            text_len = text.len(),
            "Requesting embedding"
        );

        let url = self.endpoint_for(key);
        let templated = self.config.endpoint.contains(KEY_PLACEHOLDER);
        let builder = self.client.post(url);

        let response = match self.config.api {
            EmbeddingApi::Gemini => {
                let body = GeminiEmbedRequest {
                    model: format!("models/{}", self.config.model),
                    content: GeminiEmbedContent {
                        parts: vec![GeminiEmbedPart {
                            text: text.to_string(),
                        }],
                    },
                };
                let builder = if templated {
                    builder
                } else {
                    builder.header("x-goog-api-key", key)
                };
                builder.json(&body).send().await?
            }
            EmbeddingApi::OpenAi => {
                let body = OpenAiEmbedRequest {
                    model: self.config.model.clone(),
                    input: vec![text.to_string()],
                };
                let builder = if templated {
                    builder
                } else {
                    builder.bearer_auth(key)
                };
                builder.json(&body).send().await?
            }
        };

        self.decode(slot, response).await
    }

    async fn decode(&self, slot: usize, response: Response) -> Result<Vec<f32>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(
                embedder = self.name(),
                key_slot = slot,
                status = status.as_u16(),
                "Embedding request failed"
            );
            return Err(LlmError::provider(status.as_u16(), body));
        }

        let body = response.text().await?;
        let vector = match self.config.api {
            EmbeddingApi::Gemini => {
                let parsed: GeminiEmbedResponse = serde_json::from_str(&body).map_err(|e| {
                    LlmError::Serialization(format!("Failed to parse response: {}", e))
                })?;
                parsed.embedding.map(|e| e.values).unwrap_or_default()
            }
            EmbeddingApi::OpenAi => {
                let parsed: OpenAiEmbedResponse = serde_json::from_str(&body).map_err(|e| {
                    LlmError::Serialization(format!("Failed to parse response: {}", e))
                })?;
                parsed
                    .data
                    .into_iter()
                    .min_by_key(|d| d.index)
                    .map(|d| d.embedding)
                    .unwrap_or_default()
            }
        };

        if vector.is_empty() {
            return Err(LlmError::EmptyResponse("no embedding returned".to_string()));
        }
        Ok(vector)
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, ctx: &CallContext, text: &str) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Err(LlmError::InvalidRequest(
                "cannot embed empty text".to_string(),
            ));
        }

        // The key is claimed inside the future so a pre-cancelled call
        // does not advance the rotation.
        ctx.run(self.config.timeout, async {
            let (slot, key) = self.keys.next();
            self.request(slot, key, text).await
        })
        .await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        match self.config.api {
            EmbeddingApi::Gemini => "gemini",
            EmbeddingApi::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Serialize)]
struct GeminiEmbedRequest {
    model: String,
    content: GeminiEmbedContent,
}

#[derive(Debug, Serialize)]
struct GeminiEmbedContent {
    parts: Vec<GeminiEmbedPart>,
}

#[derive(Debug, Serialize)]
struct GeminiEmbedPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedResponse {
    embedding: Option<GeminiEmbedValues>,
}

#[derive(Debug, Deserialize)]
struct GeminiEmbedValues {
    #[serde(default)]
    values: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct OpenAiEmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    #[serde(default)]
    data: Vec<OpenAiEmbedData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedData {
    index: usize,
    embedding: Vec<f32>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic embedder description, usually built from config.
#[derive(Debug, Clone, Default)]
pub struct EmbedderSpec {
    /// Provider name: "gemini", "openai" or "mock".
    pub provider: String,
    /// Endpoint template override.
    pub endpoint: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// API keys to rotate across.
    pub api_keys: Vec<String>,
    /// Per-call bound override.
    pub timeout: Option<Duration>,
    /// Requested dimensions.
    pub dimensions: Option<usize>,
}

/// Build a `SharedEmbedder` from a spec.
pub fn build_embedder(spec: &EmbedderSpec) -> Result<SharedEmbedder> {
    if spec.provider.eq_ignore_ascii_case("mock") {
        return Ok(Arc::new(MockEmbedder::new(spec.dimensions.unwrap_or(64))));
    }

    let api = EmbeddingApi::from_name(&spec.provider).ok_or_else(|| {
        LlmError::Config(format!(
            "Unknown embedding provider '{}'. Valid: gemini, openai, mock",
            spec.provider
        ))
    })?;

    let mut config = HttpEmbedderConfig::new(api, spec.api_keys.iter().cloned());
    if let Some(ref endpoint) = spec.endpoint {
        config = config.with_endpoint(endpoint);
    }
    if let Some(ref model) = spec.model {
        config = config.with_model(model);
    }
    if let Some(timeout) = spec.timeout {
        config = config.with_timeout(timeout);
    }
    if let Some(dimensions) = spec.dimensions {
        config = config.with_dimensions(dimensions);
    }

    let embedder = HttpEmbedder::new(config)?;
    tracing::info!(
        provider = embedder.name(),
        keys = embedder.key_count(),
        "Embedding client ready"
    );
    Ok(Arc::new(embedder))
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate cosine similarity between two embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}
