//! Guidance and translation services for Kebele.
//!
//! This crate sits between the HTTP delivery layer and the embedding and
//! completion providers, providing:
//!
//! - **Guided answers**: [`GuideService`] detects the question's language,
//!   retrieves matching procedures by embedding, answers from them (official)
//!   or from general knowledge (unofficial), and logs the exchange
//! - **Structured translation**: [`StructuredTranslator`] translates every
//!   prose leaf of a JSON document in one model call, keeping its shape
//! - **Collaborator seams**: [`ProcedureIndex`] and [`ChatHistoryStore`],
//!   with in-memory and SQLite adapters
//!
//! # Example
//!
//! ```ignore
//! use kebele_ai::GuideService;
//!
//! let guide = GuideService::new(llm, embedder, index, history);
//! let answer = guide.answer(&ctx, "user-1", "How do I renew my ID?").await?;
//! ```

mod error;
pub mod history;
pub mod index;
pub mod prompt;
pub mod services;
pub mod translate;
pub mod types;

pub use error::{AiError, Result};
pub use history::{ChatHistoryStore, InMemoryChatHistory, SharedChatHistory, SqliteChatHistory};
pub use index::{InMemoryProcedureIndex, ProcedureIndex, SharedProcedureIndex, load_procedures};
pub use services::{AnswerOutcome, GuideOptions, GuideService};
pub use translate::{DEFAULT_SEPARATOR, ExclusionPolicy, StructuredTranslator};
pub use types::{
    ChatRecord, ChatSource, Fee, HistoryPage, MAX_HISTORY_LIMIT, ProcedureRef, Procedure,
    ProcessingTime, normalize_paging, page_offset,
};

// Re-export provider types callers need to wire the services
pub use kebele_llm::{CallContext, CancellationToken, LlmClient, SharedEmbedder};
