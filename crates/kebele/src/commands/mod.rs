//! CLI command handlers.

pub mod ask;
pub mod start;
pub mod translate;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use kebele_ai::{
    CallContext, GuideOptions, GuideService, InMemoryChatHistory, InMemoryProcedureIndex,
    LlmClient, SharedChatHistory, SharedEmbedder, SqliteChatHistory, StructuredTranslator,
    load_procedures,
};
use kebele_config::KebeleConfig;
use kebele_llm::{EmbedderSpec, LlmClientSpec, Provider, build_embedder};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, bypassing discovery.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Load the explicit config file, or discover and merge the usual layers.
pub fn load_config(ctx: &Context) -> Result<KebeleConfig> {
    if let Some(ref path) = ctx.config_path {
        let config = kebele_config::load_config_file(path)?;
        config.validate()?;
        if ctx.verbose {
            eprintln!("Loaded config: {}", path.display());
        }
        return Ok(config);
    }

    let loaded = kebele_config::load_config(None)?;
    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }
    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            eprintln!("No config files found, using defaults");
        } else {
            for source in sources {
                eprintln!("Loaded config: {}", source.display());
            }
        }
    }
    Ok(loaded.config)
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Build the completion client from `[llm]`.
pub fn build_llm(config: &KebeleConfig) -> Result<Arc<LlmClient>> {
    let llm = config.llm();
    let provider = Provider::from_name(llm.provider.name())
        .with_context(|| format!("unknown LLM provider '{}'", llm.provider))?;

    let mut spec =
        LlmClientSpec::for_provider(provider).with_timeout(Duration::from_secs(llm.timeout_secs));
    if let Some(secret) = kebele_config::resolve_llm_api_key(&llm)? {
        tracing::debug!(source = %secret.source, "LLM API key resolved");
        spec = spec.with_api_key(secret.value);
    }
    if let Some(ref url) = llm.base_url {
        spec = spec.with_base_url(url);
    }
    if let Some(ref model) = llm.model {
        spec = spec.with_model(model);
    }

    Ok(Arc::new(LlmClient::from_spec(&spec)?))
}

/// Build the embedding client from `[embedding]`.
pub fn build_embedding_client(config: &KebeleConfig) -> Result<SharedEmbedder> {
    let embedding = config.embedding();
    let api_keys = match kebele_config::resolve_embedding_keys(&embedding)? {
        Some(secret) => {
            tracing::debug!(
                source = %secret.source,
                keys = secret.value.len(),
                "Embedding keys resolved"
            );
            secret.value
        }
        None => Vec::new(),
    };

    let spec = EmbedderSpec {
        provider: embedding.provider.name().to_string(),
        endpoint: embedding.endpoint.clone(),
        model: embedding.model.clone(),
        api_keys,
        timeout: Some(Duration::from_secs(embedding.timeout_secs)),
        dimensions: embedding.dimensions,
    };
    Ok(build_embedder(&spec)?)
}

/// Build the guide: history store, procedure index and options from config.
pub async fn build_guide(config: &KebeleConfig, llm: Arc<LlmClient>) -> Result<GuideService> {
    let embedder = build_embedding_client(config)?;
    let guide_config = config.guide();

    let history: SharedChatHistory = match config.history().path {
        Some(path) => Arc::new(
            SqliteChatHistory::open(&path)
                .with_context(|| format!("opening history at {}", path.display()))?,
        ),
        None => {
            tracing::warn!("No history path configured, chat history is kept in memory");
            Arc::new(InMemoryChatHistory::new())
        }
    };

    let index = InMemoryProcedureIndex::new().with_min_score(guide_config.min_score);
    match guide_config.procedures_path {
        Some(ref path) => {
            let procedures = load_procedures(path)?;
            index
                .index_all(&CallContext::new(), embedder.as_ref(), procedures)
                .await?;
        }
        None => tracing::warn!("No procedures configured, every answer will be unofficial"),
    }

    Ok(
        GuideService::new(llm, embedder, Arc::new(index), history)
            .with_options(GuideOptions::from(&guide_config)),
    )
}

/// Build the translator from `[translation]`.
pub fn build_translator(config: &KebeleConfig, llm: Arc<LlmClient>) -> StructuredTranslator {
    StructuredTranslator::from_config(llm, &config.translation())
}

/// Cancel `ctx` when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c(ctx: &CallContext) {
    let token = ctx.cancellation().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, cancelling");
            token.cancel();
        }
    });
}
