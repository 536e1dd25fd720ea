//! Google Gemini `generateContent` backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::backend::LlmBackend;
use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, Usage};

/// Default Gemini API base URL.
pub const DEFAULT_GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default generation model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Model to use when the request does not override it.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl GeminiConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_GEMINI_BASE.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gemini Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Gemini API backend.
pub struct GeminiBackend {
    client: Client,
    config: GeminiConfig,
}

impl GeminiBackend {
    /// Create a new Gemini backend.
    pub fn new(config: GeminiConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(LlmError::Config("Gemini API key cannot be empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn generate_url(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    fn to_gemini_request(request: &CompletionRequest) -> GeminiRequest {
        let generation_config =
            if request.temperature.is_some() || request.max_tokens.is_some() {
                Some(GeminiGenerationConfig {
                    temperature: request.temperature,
                    max_output_tokens: request.max_tokens,
                })
            } else {
                None
            };

        GeminiRequest {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|system| GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: system.clone(),
                }],
            }),
            generation_config,
        }
    }

    async fn handle_response(response: Response, model: String) -> Result<CompletionResponse> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::provider(status.as_u16(), body));
        }

        let body = response.text().await?;
        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        let text = parsed.first_text()?;
        let usage = parsed
            .usage_metadata
            .map(|u| {
                Usage::new(
                    u.prompt_token_count.unwrap_or(0),
                    u.candidates_token_count.unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(CompletionResponse::new(model, text, usage))
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.config.model.clone());
        let body = Self::to_gemini_request(&request);

        tracing::debug!(
            backend = "gemini",
            model = %model,
            prompt_len = request.prompt.len(),
            "Sending Gemini request"
        );

        let response = self
            .client
            .post(self.generate_url(&model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await?;

        Self::handle_response(response, model).await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

/// A response part. Non-text parts (inline data, function calls) have no `text`.
#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

impl GeminiResponse {
    fn first_text(&self) -> Result<String> {
        let parts = self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default();

        let first = parts
            .first()
            .ok_or_else(|| LlmError::EmptyResponse("no candidates returned".to_string()))?;

        first.text.clone().ok_or(LlmError::NonTextPart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend_for(server: &MockServer) -> GeminiBackend {
        GeminiBackend::new(GeminiConfig::new("test-key").with_base_url(server.uri())).unwrap()
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(
            GeminiBackend::new(GeminiConfig::new("  ")),
            Err(LlmError::Config(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let request = CompletionRequest::new("Translate this")
            .with_system("You are a translator")
            .with_temperature(0.1);
        let body = serde_json::to_value(GeminiBackend::to_gemini_request(&request)).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "Translate this");
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You are a translator"
        );
        assert!(body["generationConfig"]["temperature"].is_number());
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "Selam"}], "role": "model"}}],
                "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 1}
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let response = backend.complete(CompletionRequest::new("Hello")).await.unwrap();

        assert_eq!(response.text, "Selam");
        assert_eq!(response.model, "gemini-1.5-flash");
        assert_eq!(response.usage, Usage::new(4, 1));
    }

    #[tokio::test]
    async fn test_complete_no_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend.complete(CompletionRequest::new("Hello")).await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_complete_non_text_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"inlineData": {"mimeType": "image/png", "data": ""}}]}}]
            })))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend.complete(CompletionRequest::new("Draw")).await.unwrap_err();
        assert!(matches!(err, LlmError::NonTextPart));
    }

    #[tokio::test]
    async fn test_complete_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend.complete(CompletionRequest::new("Hello")).await.unwrap_err();
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("quota exhausted"));
    }

    #[tokio::test]
    async fn test_complete_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let backend = backend_for(&server).await;
        let err = backend.complete(CompletionRequest::new("Hello")).await.unwrap_err();
        assert!(matches!(err, LlmError::Serialization(_)));
    }
}
