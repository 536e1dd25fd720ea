//! Completion backend trait and mock implementation.
//!
//! This module defines the abstraction layer for language-model providers
//! (Gemini, OpenAI-compatible services) and a scripted mock for testing.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{LlmError, Result};
use crate::types::{CompletionRequest, CompletionResponse, Usage};

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for language-model providers.
///
/// A backend turns one prompt into generated text. It does not retry; a
/// failed call is reported immediately and retry policy belongs to the caller.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the full response.
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the name of this backend.
    fn name(&self) -> &str;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A scripted reply for [`MockBackend`].
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Reply with this text.
    Text(String),
    /// Fail with a provider error carrying this message (HTTP 500).
    Fail(String),
    /// Reply with an empty body.
    Empty,
    /// Never reply. Useful for cancellation and timeout tests.
    Hang,
}

impl MockResponse {
    /// Shorthand for a text reply.
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// A mock backend for testing purposes.
///
/// Returns pre-configured responses in order, useful for deterministic
/// testing of the guide pipeline and the translator.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: Mutex<VecDeque<MockResponse>>,
    request_log: Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with the given responses.
    ///
    /// Responses are returned in order. If more requests are made than
    /// responses available, an error is returned.
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: Mutex::new(responses.into()),
            request_log: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend that replies with each text in order.
    pub fn with_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(texts.into_iter().map(|t| MockResponse::Text(t.into())).collect())
    }

    /// Create a mock backend with a single text response.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![MockResponse::Text(text.into())])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().len()
    }

    /// Queue another response.
    pub fn push(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        self.request_log.lock().push(request);

        let next = self.responses.lock().pop_front();
        match next {
            Some(MockResponse::Text(text)) => Ok(CompletionResponse::new(
                "mock-model",
                text,
                Usage::new(10, 20),
            )),
            Some(MockResponse::Fail(message)) => Err(LlmError::provider(500, message)),
            Some(MockResponse::Empty) => Err(LlmError::EmptyResponse(
                "MockBackend: scripted empty response".to_string(),
            )),
            Some(MockResponse::Hang) => std::future::pending().await,
            None => Err(LlmError::Internal(
                "MockBackend: no more responses available".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
