//! Embedding and completion providers for Kebele.
//!
//! This crate provides the two external capabilities the guidance layer is
//! built on: turning text into vectors and turning prompts into text.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │  Embedder trait              │   │  LlmClient                   │
//! │  - embed(ctx, text) -> vec   │   │  - generate_completion(ctx)  │
//! └──────────────────────────────┘   └──────────────────────────────┘
//!       │                 │                       │
//!       ▼                 ▼                       ▼
//! ┌────────────┐   ┌────────────┐        ┌──────────────────┐
//! │HttpEmbedder│   │MockEmbedder│        │ LlmBackend trait │
//! │ (KeyRing)  │   └────────────┘        └──────────────────┘
//! └────────────┘                           │       │      │
//!                                          ▼       ▼      ▼
//!                                      Gemini  OpenAI   Mock
//! ```
//!
//! Every call takes a [`CallContext`] so a caller-side cancellation or
//! deadline aborts in-flight provider requests.

pub mod backend;
pub mod cancel;
pub mod client;
pub mod embeddings;
pub mod error;
pub mod types;

// Provider implementations
pub mod gemini;
pub mod openai;

pub use backend::{LlmBackend, MockBackend, MockResponse, SharedBackend};
pub use cancel::CallContext;
pub use error::{LlmError, Result};
pub use types::{CompletionRequest, CompletionResponse, Usage};

// Re-export embeddings
pub use embeddings::{
    DEFAULT_EMBEDDING_TIMEOUT, Embedder, EmbedderSpec, EmbeddingApi, HttpEmbedder,
    HttpEmbedderConfig, KeyRing, MockEmbedder, SharedEmbedder, build_embedder, cosine_similarity,
};

// Re-export provider configs
pub use gemini::{GeminiBackend, GeminiConfig};
pub use openai::{OpenAiBackend, OpenAiConfig};

// Re-export client
pub use client::{DEFAULT_COMPLETION_TIMEOUT, LlmClient, LlmClientSpec, Provider};

// Re-exported so callers can build contexts from a shared token.
pub use tokio_util::sync::CancellationToken;
