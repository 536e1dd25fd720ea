//! High-level completion client.
//!
//! The [`LlmClient`] wraps one configured backend and adds what every caller
//! needs: a per-call bound, caller cancellation, and a plain
//! prompt-in/text-out entry point.
//!
//! # Example
//!
//! ```rust,ignore
//! use kebele_llm::{CallContext, LlmClient, LlmClientSpec};
//!
//! let client = LlmClient::from_spec(&LlmClientSpec::gemini(api_key))?;
//! let text = client.generate_completion(&CallContext::new(), "Hello").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::backend::SharedBackend;
use crate::cancel::CallContext;
use crate::error::{LlmError, Result};
use crate::gemini::{GeminiBackend, GeminiConfig};
use crate::openai::{OpenAiBackend, OpenAiConfig};
use crate::types::{CompletionRequest, CompletionResponse};

/// Default per-call bound for completions.
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

// ─────────────────────────────────────────────────────────────────────────────
// Provider Enum
// ─────────────────────────────────────────────────────────────────────────────

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// Google Gemini API
    Gemini,
    /// OpenAI API
    OpenAi,
    /// Local Ollama instance (OpenAI-compatible)
    Ollama,
}

impl Provider {
    /// Get the string name for this provider.
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::OpenAi => "openai",
            Provider::Ollama => "ollama",
        }
    }

    /// Parse a provider from a string name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gemini" | "google" => Some(Provider::Gemini),
            "openai" | "gpt" => Some(Provider::OpenAi),
            "ollama" | "local" => Some(Provider::Ollama),
            _ => None,
        }
    }

    /// Check if this provider requires an API key.
    pub fn requires_api_key(&self) -> bool {
        match self {
            Provider::Gemini | Provider::OpenAi => true,
            Provider::Ollama => false,
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Specification
// ─────────────────────────────────────────────────────────────────────────────

/// Provider-agnostic client description, usually built from config.
#[derive(Debug, Clone)]
pub struct LlmClientSpec {
    /// Which provider to talk to.
    pub provider: Provider,
    /// API key, when the provider needs one.
    pub api_key: Option<String>,
    /// Base URL override.
    pub base_url: Option<String>,
    /// Model override.
    pub model: Option<String>,
    /// Per-call bound.
    pub timeout: Duration,
}

impl LlmClientSpec {
    /// A Gemini client spec.
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Gemini,
            api_key: Some(api_key.into()),
            base_url: None,
            model: None,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    /// A spec for any provider, with no key or overrides.
    pub fn for_provider(provider: Provider) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: None,
            model: None,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the per-call bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_backend(&self) -> Result<SharedBackend> {
        let api_key = self.api_key.as_deref().filter(|k| !k.trim().is_empty());
        if self.provider.requires_api_key() && api_key.is_none() {
            return Err(LlmError::Config(format!(
                "{} provider requires an API key",
                self.provider
            )));
        }

        match self.provider {
            Provider::Gemini => {
                let mut config = GeminiConfig::new(api_key.unwrap_or_default())
                    .with_timeout(self.timeout);
                if let Some(ref url) = self.base_url {
                    config = config.with_base_url(url);
                }
                if let Some(ref model) = self.model {
                    config = config.with_model(model);
                }
                Ok(Arc::new(GeminiBackend::new(config)?))
            }
            Provider::OpenAi | Provider::Ollama => {
                let mut config = match self.provider {
                    Provider::Ollama => OpenAiConfig::ollama(),
                    _ => OpenAiConfig::openai(api_key.unwrap_or_default()),
                }
                .with_timeout(self.timeout);
                if let Some(ref url) = self.base_url {
                    config = config.with_base_url(url);
                }
                if let Some(ref model) = self.model {
                    config = config.with_model(model);
                }
                Ok(Arc::new(OpenAiBackend::new(config)?))
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Client
// ─────────────────────────────────────────────────────────────────────────────

/// Completion client bound to a single backend.
///
/// No retries and no fallback: a failed call surfaces to the caller as-is.
pub struct LlmClient {
    backend: SharedBackend,
    timeout: Duration,
}

impl LlmClient {
    /// Wrap an existing backend.
    pub fn new(backend: SharedBackend) -> Self {
        Self {
            backend,
            timeout: DEFAULT_COMPLETION_TIMEOUT,
        }
    }

    /// Build a client from a spec.
    pub fn from_spec(spec: &LlmClientSpec) -> Result<Self> {
        let backend = spec.build_backend()?;
        tracing::info!(
            provider = %spec.provider,
            model = spec.model.as_deref().unwrap_or("default"),
            "Completion client ready"
        );
        Ok(Self::new(backend).with_timeout(spec.timeout))
    }

    /// Set the per-call bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Name of the wrapped backend.
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Execute a full completion request under the context's cancellation
    /// and the tighter of the two deadlines.
    pub async fn complete(
        &self,
        ctx: &CallContext,
        request: CompletionRequest,
    ) -> Result<CompletionResponse> {
        let started = std::time::Instant::now();
        let result = ctx.run(self.timeout, self.backend.complete(request)).await;

        match &result {
            Ok(response) => tracing::debug!(
                backend = self.backend.name(),
                model = %response.model,
                input_tokens = response.usage.input_tokens,
                output_tokens = response.usage.output_tokens,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Completion finished"
            ),
            Err(e) => tracing::debug!(
                backend = self.backend.name(),
                error = %e,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Completion failed"
            ),
        }

        result
    }

    /// Send a prompt and return the generated text.
    pub async fn generate_completion(&self, ctx: &CallContext, prompt: &str) -> Result<String> {
        let response = self.complete(ctx, CompletionRequest::new(prompt)).await?;
        if response.text.is_empty() {
            return Err(LlmError::EmptyResponse(
                "provider returned empty text".to_string(),
            ));
        }
        Ok(response.text)
    }
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("backend", &self.backend.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockResponse};

    #[test]
    fn test_provider_from_name() {
        assert_eq!(Provider::from_name("Gemini"), Some(Provider::Gemini));
        assert_eq!(Provider::from_name("gpt"), Some(Provider::OpenAi));
        assert_eq!(Provider::from_name("local"), Some(Provider::Ollama));
        assert_eq!(Provider::from_name("unknown"), None);
        assert!(!Provider::Ollama.requires_api_key());
    }

    #[test]
    fn test_spec_requires_key() {
        let err = LlmClient::from_spec(&LlmClientSpec::for_provider(Provider::Gemini));
        assert!(matches!(err, Err(LlmError::Config(_))));

        let err = LlmClient::from_spec(&LlmClientSpec::gemini("  "));
        assert!(matches!(err, Err(LlmError::Config(_))));

        let client = LlmClient::from_spec(&LlmClientSpec::for_provider(Provider::Ollama)).unwrap();
        assert_eq!(client.backend_name(), "ollama");
    }

    #[tokio::test]
    async fn test_generate_completion() {
        let backend = Arc::new(MockBackend::with_text("Amharic"));
        let client = LlmClient::new(backend.clone());

        let text = client
            .generate_completion(&CallContext::new(), "Which language?")
            .await
            .unwrap();
        assert_eq!(text, "Amharic");
        assert_eq!(backend.requests()[0].prompt, "Which language?");
    }

    #[tokio::test]
    async fn test_empty_text_is_an_error() {
        let client = LlmClient::new(Arc::new(MockBackend::with_text("")));
        let err = client
            .generate_completion(&CallContext::new(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_errors_propagate_without_retry() {
        let backend = Arc::new(MockBackend::new(vec![
            MockResponse::Fail("upstream".to_string()),
            MockResponse::text("never reached"),
        ]));
        let client = LlmClient::new(backend.clone());

        let err = client
            .generate_completion(&CallContext::new(), "x")
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_backend_times_out() {
        let client = LlmClient::new(Arc::new(MockBackend::new(vec![MockResponse::Hang])))
            .with_timeout(Duration::from_secs(5));

        let err = client
            .generate_completion(&CallContext::new(), "x")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_secs(5)));
        assert!(err.is_cancellation());
    }

    #[tokio::test]
    async fn test_cancellation_reaches_backend_call() {
        let client = LlmClient::new(Arc::new(MockBackend::new(vec![MockResponse::Hang])));
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            canceller.cancel();
        });

        let err = client.generate_completion(&ctx, "x").await.unwrap_err();
        assert!(matches!(err, LlmError::Cancelled));
    }
}
