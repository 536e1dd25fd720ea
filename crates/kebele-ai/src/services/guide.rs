//! Retrieval-augmented answers to citizen questions.
//!
//! [`GuideService`] runs one question through the pipeline:
//!
//! ```text
//! query ─┬─► detect language (completion) ─┐
//!        └─► embed ────────────────────────┴─► search index ─► generate ─► save record
//! ```
//!
//! Detection and embedding run concurrently. Detection is best-effort and
//! falls back to the configured default language; embedding, retrieval and
//! generation failures abort the request. A failure to save the record is
//! logged and reported on [`AnswerOutcome`] but the answer is still returned.

use std::sync::Arc;
use std::time::Duration;

use kebele_config::GuideConfig;
use kebele_llm::{CallContext, LlmClient, SharedEmbedder};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{AiError, Result};
use crate::history::SharedChatHistory;
use crate::index::SharedProcedureIndex;
use crate::prompt::{grounded_prompt, language_detection_prompt, normalize_language, ungrounded_prompt};
use crate::types::{ChatRecord, ChatSource, HistoryPage, ProcedureRef};

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Tuning for [`GuideService`].
#[derive(Debug, Clone)]
pub struct GuideOptions {
    /// Procedures retrieved per query.
    pub retrieval_limit: usize,
    /// Language used when detection fails.
    pub default_language: String,
    /// Bound on a single index search.
    pub retrieval_timeout: Duration,
    /// Bound on a single history operation.
    pub persistence_timeout: Duration,
}

impl Default for GuideOptions {
    fn default() -> Self {
        Self {
            retrieval_limit: 3,
            default_language: "English".to_string(),
            retrieval_timeout: Duration::from_secs(10),
            persistence_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&GuideConfig> for GuideOptions {
    fn from(config: &GuideConfig) -> Self {
        Self {
            retrieval_limit: config.retrieval_limit,
            default_language: config.default_language.clone(),
            ..Self::default()
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Everything produced while answering one question.
#[derive(Debug, Clone, Serialize)]
pub struct AnswerOutcome {
    /// Generated answer text.
    pub answer: String,
    /// Whether the answer was grounded on retrieved procedures.
    pub source: ChatSource,
    /// Procedures the answer was grounded on. Empty when unofficial.
    pub related: Vec<ProcedureRef>,
    /// Language the answer was requested in.
    pub language: String,
    /// False when detection failed and the default language was used.
    pub language_detected: bool,
    /// Identifier of the saved record, if saving succeeded.
    pub record_id: Option<Uuid>,
    /// Why the exchange was not saved.
    pub persistence_warning: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

/// Answers questions from official procedures when possible, general
/// knowledge otherwise, and logs each exchange.
pub struct GuideService {
    llm: Arc<LlmClient>,
    embedder: SharedEmbedder,
    index: SharedProcedureIndex,
    history: SharedChatHistory,
    options: GuideOptions,
}

impl GuideService {
    pub fn new(
        llm: Arc<LlmClient>,
        embedder: SharedEmbedder,
        index: SharedProcedureIndex,
        history: SharedChatHistory,
    ) -> Self {
        Self {
            llm,
            embedder,
            index,
            history,
            options: GuideOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GuideOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &GuideOptions {
        &self.options
    }

    /// Answer `query` for `user_id`, returning only the text.
    pub async fn answer(&self, ctx: &CallContext, user_id: &str, query: &str) -> Result<String> {
        Ok(self.answer_detailed(ctx, user_id, query).await?.answer)
    }

    /// Answer `query` for `user_id`, returning provenance and persistence status.
    pub async fn answer_detailed(
        &self,
        ctx: &CallContext,
        user_id: &str,
        query: &str,
    ) -> Result<AnswerOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AiError::Validation("query must not be empty".to_string()));
        }
        validate_user(user_id)?;
        if ctx.is_cancelled() {
            return Err(AiError::Cancelled);
        }

        // Embedding failure cancels the in-flight detection call
        let stage = ctx.child();
        let detect = self.detect_language(&stage, query);
        let embed = async {
            let result = self.embedder.embed(&stage, query).await;
            if result.is_err() {
                stage.cancel();
            }
            result
        };
        let ((language, language_detected), embedding) = tokio::join!(detect, embed);
        let embedding = embedding?;

        let procedures = ctx
            .run(
                self.options.retrieval_timeout,
                self.index
                    .search_by_embedding(&embedding, self.options.retrieval_limit),
            )
            .await?;

        let related: Vec<ProcedureRef> = procedures.iter().map(|p| p.to_ref()).collect();
        let prompt = if procedures.is_empty() {
            ungrounded_prompt(query, &language)
        } else {
            grounded_prompt(query, &language, &procedures)
        };
        debug!(
            user_id = %user_id,
            matched = procedures.len(),
            language = %language,
            "Procedures retrieved"
        );

        let answer = self.llm.generate_completion(ctx, &prompt).await?;

        let record = ChatRecord::new(user_id, query, answer.clone(), related.clone());
        let source = record.source;
        let (record_id, persistence_warning) = match ctx
            .run(self.options.persistence_timeout, self.history.save(&record))
            .await
        {
            Ok(()) => (Some(record.id), None),
            Err(AiError::Cancelled) => return Err(AiError::Cancelled),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to save chat record");
                (None, Some(e.to_string()))
            }
        };

        info!(
            user_id = %user_id,
            source = %source,
            related = related.len(),
            language = %language,
            saved = record_id.is_some(),
            "Guide answer generated"
        );

        Ok(AnswerOutcome {
            answer,
            source,
            related,
            language,
            language_detected,
            record_id,
            persistence_warning,
        })
    }

    /// One page of a user's past exchanges, newest first.
    pub async fn history(
        &self,
        ctx: &CallContext,
        user_id: &str,
        page: usize,
        limit: usize,
    ) -> Result<HistoryPage> {
        validate_user(user_id)?;
        ctx.run(
            self.options.persistence_timeout,
            self.history.get_by_user(user_id, page, limit),
        )
        .await
    }

    /// Delete every exchange logged for a user.
    pub async fn clear_history(&self, ctx: &CallContext, user_id: &str) -> Result<usize> {
        validate_user(user_id)?;
        ctx.run(
            self.options.persistence_timeout,
            self.history.delete_by_user(user_id),
        )
        .await
    }

    /// Detected language name and whether detection succeeded.
    async fn detect_language(&self, ctx: &CallContext, query: &str) -> (String, bool) {
        let fallback = || (self.options.default_language.clone(), false);

        match self
            .llm
            .generate_completion(ctx, &language_detection_prompt(query))
            .await
        {
            Ok(reply) => match normalize_language(&reply) {
                Some(language) => (language, true),
                None => {
                    warn!(reply = %reply, "Unusable language detection reply, using default");
                    fallback()
                }
            },
            Err(e) if e.is_cancellation() => {
                debug!(error = %e, "Language detection abandoned");
                fallback()
            }
            Err(e) => {
                warn!(error = %e, "Language detection failed, using default");
                fallback()
            }
        }
    }
}

impl std::fmt::Debug for GuideService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuideService")
            .field("llm", &self.llm)
            .field("embedder", &self.embedder.name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn validate_user(user_id: &str) -> Result<()> {
    if user_id.trim().is_empty() {
        return Err(AiError::Validation("user id must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{ChatHistoryStore, InMemoryChatHistory};
    use crate::index::ProcedureIndex;
    use crate::types::Procedure;
    use async_trait::async_trait;
    use kebele_llm::{LlmBackend, MockBackend, MockEmbedder, MockResponse};
    use parking_lot::Mutex;

    /// Index returning a fixed result and recording requested limits.
    struct ScriptedIndex {
        result: std::result::Result<Vec<Procedure>, String>,
        limits: Mutex<Vec<usize>>,
    }

    impl ScriptedIndex {
        fn returning(procedures: Vec<Procedure>) -> Arc<Self> {
            Arc::new(Self {
                result: Ok(procedures),
                limits: Mutex::new(Vec::new()),
            })
        }

        fn failing(message: &str) -> Arc<Self> {
            Arc::new(Self {
                result: Err(message.to_string()),
                limits: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ProcedureIndex for ScriptedIndex {
        async fn search_by_embedding(
            &self,
            _embedding: &[f32],
            limit: usize,
        ) -> Result<Vec<Procedure>> {
            self.limits.lock().push(limit);
            self.result.clone().map_err(AiError::Retrieval)
        }
    }

    /// History store whose writes always fail.
    struct FailingHistory;

    #[async_trait]
    impl ChatHistoryStore for FailingHistory {
        async fn save(&self, _record: &ChatRecord) -> Result<()> {
            Err(AiError::Storage("disk full".to_string()))
        }

        async fn get_by_user(&self, _: &str, _: usize, _: usize) -> Result<HistoryPage> {
            Err(AiError::Storage("disk full".to_string()))
        }

        async fn delete_by_user(&self, _: &str) -> Result<usize> {
            Err(AiError::Storage("disk full".to_string()))
        }
    }

    struct Fixture {
        service: GuideService,
        backend: Arc<MockBackend>,
        embedder: Arc<MockEmbedder>,
        history: Arc<InMemoryChatHistory>,
    }

    fn fixture(
        responses: Vec<MockResponse>,
        embedder: MockEmbedder,
        index: Arc<dyn ProcedureIndex>,
    ) -> Fixture {
        let backend = Arc::new(MockBackend::new(responses));
        let embedder = Arc::new(embedder);
        let history = Arc::new(InMemoryChatHistory::new());
        let shared_backend: Arc<dyn LlmBackend> = backend.clone();

        let service = GuideService::new(
            Arc::new(LlmClient::new(shared_backend)),
            embedder.clone(),
            index,
            history.clone(),
        );
        Fixture {
            service,
            backend,
            embedder,
            history,
        }
    }

    fn license_procedure() -> Procedure {
        Procedure::new("p1", "Procedure1")
            .with_prerequisites(["A"])
            .with_steps(["Step1"])
            .with_results(["Result1"])
            .with_fee(100.0, "ETB")
    }

    #[tokio::test]
    async fn test_matched_procedure_gives_official_answer() {
        let index = ScriptedIndex::returning(vec![license_procedure()]);
        let f = fixture(
            vec![
                MockResponse::text("English"),
                MockResponse::text("Bring A, then do Step1."),
            ],
            MockEmbedder::default(),
            index.clone(),
        );

        let outcome = f
            .service
            .answer_detailed(&CallContext::new(), "u1", "How do I get a license?")
            .await
            .unwrap();

        assert_eq!(outcome.source, ChatSource::Official);
        assert_eq!(outcome.answer, "Bring A, then do Step1.");
        let names: Vec<&str> = outcome.related.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Procedure1"]);
        assert!(outcome.language_detected);
        assert!(outcome.persistence_warning.is_none());
        assert_eq!(*index.limits.lock(), vec![3]);

        let generation = &f.backend.requests()[1].prompt;
        assert!(generation.contains("Fee: 100 ETB"));
        assert!(generation.contains("Step1"));

        let saved = f.history.all();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].source, ChatSource::Official);
        assert_eq!(saved[0].request, "How do I get a license?");
        assert_eq!(Some(saved[0].id), outcome.record_id);
    }

    #[tokio::test]
    async fn test_no_match_gives_unofficial_answer() {
        let f = fixture(
            vec![
                MockResponse::text("English"),
                MockResponse::text("I cannot check the weather."),
            ],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );

        let outcome = f
            .service
            .answer_detailed(&CallContext::new(), "u1", "What is the weather?")
            .await
            .unwrap();

        assert_eq!(outcome.source, ChatSource::Unofficial);
        assert!(outcome.related.is_empty());
        assert!(f.backend.requests()[1].prompt.contains("No official procedure matched"));
        assert_eq!(f.history.all()[0].source, ChatSource::Unofficial);
    }

    #[tokio::test]
    async fn test_detected_language_shapes_prompt() {
        let f = fixture(
            vec![MockResponse::text("Amharic."), MockResponse::text("መልስ")],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );

        let outcome = f
            .service
            .answer_detailed(&CallContext::new(), "u1", "መንጃ ፈቃድ እንዴት አገኛለሁ?")
            .await
            .unwrap();
        assert_eq!(outcome.language, "Amharic");
        assert!(f.backend.requests()[1].prompt.contains("Respond in Amharic."));
    }

    #[tokio::test]
    async fn test_detection_failure_falls_back_to_default() {
        let f = fixture(
            vec![
                MockResponse::Fail("overloaded".to_string()),
                MockResponse::text("answer"),
            ],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );

        let outcome = f
            .service
            .answer_detailed(&CallContext::new(), "u1", "Hello")
            .await
            .unwrap();
        assert_eq!(outcome.language, "English");
        assert!(!outcome.language_detected);
        assert!(f.backend.requests()[1].prompt.contains("Respond in English."));
    }

    #[tokio::test]
    async fn test_embedding_failure_is_fatal_and_cancels_detection() {
        let f = fixture(
            vec![MockResponse::Hang],
            MockEmbedder::failing("quota exceeded"),
            ScriptedIndex::returning(vec![license_procedure()]),
        );

        // Detection hangs; only the sibling cancellation lets this finish
        let err = tokio::time::timeout(
            Duration::from_secs(5),
            f.service
                .answer_detailed(&CallContext::new(), "u1", "How do I get a license?"),
        )
        .await
        .expect("detection was not cancelled")
        .unwrap_err();

        assert!(matches!(err, AiError::Llm(ref e) if e.status() == Some(500)));
        assert_eq!(f.backend.request_count(), 1);
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_failure_is_fatal() {
        let f = fixture(
            vec![MockResponse::text("English")],
            MockEmbedder::default(),
            ScriptedIndex::failing("index offline"),
        );

        let err = f
            .service
            .answer(&CallContext::new(), "u1", "How do I get a license?")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Retrieval(_)));
        assert_eq!(f.backend.request_count(), 1);
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_fatal() {
        let f = fixture(
            vec![MockResponse::text("English"), MockResponse::Empty],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );

        let err = f
            .service
            .answer(&CallContext::new(), "u1", "Hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Llm(_)));
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_answer() {
        let backend: Arc<dyn LlmBackend> = Arc::new(MockBackend::with_texts(["English", "answer"]));
        let service = GuideService::new(
            Arc::new(LlmClient::new(backend)),
            Arc::new(MockEmbedder::default()),
            ScriptedIndex::returning(vec![license_procedure()]),
            Arc::new(FailingHistory),
        );

        let outcome = service
            .answer_detailed(&CallContext::new(), "u1", "How do I get a license?")
            .await
            .unwrap();
        assert_eq!(outcome.answer, "answer");
        assert_eq!(outcome.source, ChatSource::Official);
        assert!(outcome.record_id.is_none());
        assert!(outcome.persistence_warning.unwrap().contains("disk full"));
    }

    #[tokio::test]
    async fn test_validation_happens_before_any_call() {
        let f = fixture(
            vec![],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );

        let err = f
            .service
            .answer(&CallContext::new(), "u1", "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Validation(_)));

        let err = f
            .service
            .answer(&CallContext::new(), "", "Hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AiError::Validation(_)));

        assert_eq!(f.backend.request_count(), 0);
        assert_eq!(f.embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_context_does_nothing() {
        let f = fixture(
            vec![],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );
        let ctx = CallContext::new();
        ctx.cancel();

        let err = f.service.answer(&ctx, "u1", "Hello").await.unwrap_err();
        assert!(matches!(err, AiError::Cancelled));
        assert_eq!(f.backend.request_count(), 0);
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_during_generation_discards_work() {
        let f = fixture(
            vec![MockResponse::text("English"), MockResponse::Hang],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );
        let ctx = CallContext::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = f.service.answer(&ctx, "u1", "Hello").await.unwrap_err();
        assert!(matches!(err, AiError::Cancelled));
        assert!(err.is_cancellation());
        assert!(f.history.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_caller_deadline_bounds_generation() {
        let f = fixture(
            vec![MockResponse::text("English"), MockResponse::Hang],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );
        let ctx = CallContext::new().with_timeout(Duration::from_secs(3));

        let err = f.service.answer(&ctx, "u1", "Hello").await.unwrap_err();
        assert!(matches!(err, AiError::Timeout(d) if d <= Duration::from_secs(3)));
        assert!(f.history.is_empty());
    }

    #[tokio::test]
    async fn test_history_and_clear() {
        let f = fixture(
            vec![
                MockResponse::text("English"),
                MockResponse::text("first"),
                MockResponse::text("English"),
                MockResponse::text("second"),
            ],
            MockEmbedder::default(),
            ScriptedIndex::returning(Vec::new()),
        );
        let ctx = CallContext::new();
        f.service.answer(&ctx, "u1", "one").await.unwrap();
        f.service.answer(&ctx, "u1", "two").await.unwrap();

        let page = f.service.history(&ctx, "u1", 1, 10).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.records[0].response, "second");

        assert_eq!(f.service.clear_history(&ctx, "u1").await.unwrap(), 2);
        assert_eq!(f.service.history(&ctx, "u1", 1, 10).await.unwrap().total, 0);
    }

    #[test]
    fn test_options_from_config() {
        let config = GuideConfig {
            retrieval_limit: 5,
            default_language: "Amharic".to_string(),
            ..Default::default()
        };
        let options = GuideOptions::from(&config);
        assert_eq!(options.retrieval_limit, 5);
        assert_eq!(options.default_language, "Amharic");
        assert_eq!(options.persistence_timeout, Duration::from_secs(5));
    }
}
