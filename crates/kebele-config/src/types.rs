//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]         # HTTP listener and request gate
//! [embedding]      # embedding provider and rotating key pool
//! [llm]            # completion provider
//! [guide]          # retrieval and answer settings
//! [translation]    # structured translation settings
//! [history]        # chat history storage
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Default port for the HTTP server.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default request budget per minute for the `/ai` routes.
pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 120;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KebeleConfig {
    /// Server configuration.
    pub server: Option<ServerConfig>,

    /// Embedding provider configuration.
    pub embedding: Option<EmbeddingConfig>,

    /// Completion provider configuration.
    pub llm: Option<LlmConfig>,

    /// Guide pipeline configuration.
    pub guide: Option<GuideConfig>,

    /// Structured translation configuration.
    pub translation: Option<TranslationConfig>,

    /// Chat history storage configuration.
    pub history: Option<HistoryConfig>,
}

impl KebeleConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Sections are replaced wholesale, not field by field.
    pub fn merge(&mut self, other: KebeleConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.embedding.is_some() {
            self.embedding = other.embedding;
        }
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.guide.is_some() {
            self.guide = other.guide;
        }
        if other.translation.is_some() {
            self.translation = other.translation;
        }
        if other.history.is_some() {
            self.history = other.history;
        }
    }

    /// Server section, or defaults.
    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Embedding section, or defaults.
    pub fn embedding(&self) -> EmbeddingConfig {
        self.embedding.clone().unwrap_or_default()
    }

    /// LLM section, or defaults.
    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    /// Guide section, or defaults.
    pub fn guide(&self) -> GuideConfig {
        self.guide.clone().unwrap_or_default()
    }

    /// Translation section, or defaults.
    pub fn translation(&self) -> TranslationConfig {
        self.translation.clone().unwrap_or_default()
    }

    /// History section, or defaults.
    pub fn history(&self) -> HistoryConfig {
        self.history.clone().unwrap_or_default()
    }

    /// Check values that parse fine but cannot be used.
    pub fn validate(&self) -> Result<()> {
        let server = self.server();
        if server.api_rpm == 0 {
            return Err(ConfigError::invalid("server.api_rpm", "must be at least 1"));
        }

        let guide = self.guide();
        if guide.retrieval_limit == 0 {
            return Err(ConfigError::invalid(
                "guide.retrieval_limit",
                "must be at least 1",
            ));
        }
        if !(0.0..=1.0).contains(&guide.min_score) {
            return Err(ConfigError::invalid(
                "guide.min_score",
                "must be between 0.0 and 1.0",
            ));
        }

        let translation = self.translation();
        if !translation.supports(&translation.source_language) {
            return Err(ConfigError::invalid(
                "translation.source_language",
                format!(
                    "'{}' is not in the supported list",
                    translation.source_language
                ),
            ));
        }

        if self.embedding().timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "embedding.timeout_secs",
                "must be at least 1",
            ));
        }
        if self.llm().timeout_secs == 0 {
            return Err(ConfigError::invalid("llm.timeout_secs", "must be at least 1"));
        }

        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port to listen on.
    pub port: u16,
    /// Address to bind to.
    pub bind: String,
    /// Enable the request gate on `/ai` routes.
    pub rate_limiting: bool,
    /// Requests per minute admitted by the gate.
    pub api_rpm: u32,
    /// Enable request logging.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            rate_limiting: true,
            api_rpm: DEFAULT_REQUESTS_PER_MINUTE,
            request_logging: true,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Embedding Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Embedding provider configuration.
///
/// ```toml
/// [embedding]
/// provider = "gemini"
/// endpoint = "https://generativelanguage.googleapis.com/v1beta/models/text-embedding-004:embedContent?key={key}"
/// api_keys = ["k1", "k2"]   # prefer KEBELE_EMBEDDING_KEYS
/// timeout_secs = 15
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider: "gemini", "openai", or "mock".
    pub provider: EmbeddingProvider,
    /// Endpoint template. `{key}` is replaced with the selected key.
    pub endpoint: Option<String>,
    /// Embedding model name.
    pub model: Option<String>,
    /// API keys rotated round-robin (warns if set here).
    pub api_keys: Vec<String>,
    /// Per-call bound in seconds.
    pub timeout_secs: u64,
    /// Vector dimensions, when the provider default is not wanted.
    pub dimensions: Option<usize>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Gemini,
            endpoint: None,
            model: None,
            api_keys: Vec::new(),
            timeout_secs: 15,
            dimensions: None,
        }
    }
}

impl EmbeddingConfig {
    /// Returns true if API keys are stored directly in the config file.
    pub fn has_plaintext_api_keys(&self) -> bool {
        !self.api_keys.is_empty()
    }
}

/// Supported embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Gemini `embedContent`.
    Gemini,
    /// OpenAI embeddings API.
    OpenAi,
    /// Deterministic embedder for testing and demos.
    Mock,
}

impl EmbeddingProvider {
    /// Name understood by the embedder factory.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Mock => "mock",
        }
    }

    /// Whether this provider needs API keys.
    pub fn requires_keys(&self) -> bool {
        !matches!(self, Self::Mock)
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider.
    pub provider: LlmProvider,
    /// Model identifier.
    pub model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer env var; warns if set here).
    pub api_key: Option<String>,
    /// Per-call bound in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Gemini,
            model: None,
            base_url: None,
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Supported completion providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Gemini,
    OpenAi,
    Ollama,
}

impl LlmProvider {
    /// Provider-specific environment variable for the API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GEMINI_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::Ollama => "OLLAMA_API_KEY",
        }
    }

    /// Name understood by the completion client.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "gemini",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Ollama => "ollama",
        }
    }

    /// Whether a key is mandatory.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, LlmProvider::Ollama)
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Guide Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Retrieval and answer settings for the guide pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Number of procedures retrieved per query.
    pub retrieval_limit: usize,
    /// Language assumed when detection fails.
    pub default_language: String,
    /// Minimum cosine similarity for the in-memory procedure index.
    pub min_score: f32,
    /// JSON file of procedures to load into the in-memory index.
    pub procedures_path: Option<PathBuf>,
}

impl Default for GuideConfig {
    fn default() -> Self {
        Self {
            retrieval_limit: 3,
            default_language: "English".to_string(),
            min_score: 0.5,
            procedures_path: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Translation Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Structured translation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Language responses are authored in. Requests for it are never translated.
    pub source_language: String,
    /// Target languages accepted by the translator.
    pub supported: Vec<String>,
    /// Extra field names whose values are never translated.
    pub excluded_keys: Vec<String>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            source_language: "en".to_string(),
            supported: vec!["en".to_string(), "am".to_string()],
            excluded_keys: Vec::new(),
        }
    }
}

impl TranslationConfig {
    /// Whether `lang` is in the supported list (case-insensitive).
    pub fn supports(&self, lang: &str) -> bool {
        self.supported.iter().any(|s| s.eq_ignore_ascii_case(lang))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// History Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Chat history storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// SQLite database path. When absent, history is kept in memory.
    pub path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = KebeleConfig::from_toml("").unwrap();
        assert_eq!(config, KebeleConfig::new());
        assert_eq!(config.server().port, DEFAULT_PORT);
        assert_eq!(config.guide().retrieval_limit, 3);
        assert_eq!(config.guide().default_language, "English");
        assert_eq!(config.embedding().timeout_secs, 15);
        assert_eq!(config.llm().timeout_secs, 60);
        assert!(config.history().path.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let config = KebeleConfig::from_toml(
            r#"
[server]
port = 9090
rate_limiting = false

[embedding]
provider = "openai"
api_keys = ["a", "b"]
timeout_secs = 5

[llm]
provider = "ollama"
model = "llama3.1"

[guide]
retrieval_limit = 5

[translation]
supported = ["en", "am", "om"]
excluded_keys = ["sku"]

[history]
path = "/tmp/history.db"
"#,
        )
        .unwrap();

        assert_eq!(config.server().port, 9090);
        assert!(!config.server().rate_limiting);
        assert_eq!(config.embedding().provider, EmbeddingProvider::OpenAi);
        assert!(config.embedding().has_plaintext_api_keys());
        assert_eq!(config.llm().provider, LlmProvider::Ollama);
        assert!(!config.llm().provider.requires_api_key());
        assert_eq!(config.guide().retrieval_limit, 5);
        assert!(config.translation().supports("OM"));
        assert_eq!(config.translation().excluded_keys, vec!["sku"]);
        assert_eq!(
            config.history().path,
            Some(PathBuf::from("/tmp/history.db"))
        );
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = KebeleConfig::from_toml("[embedding]\nprovider = \"bogus\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = KebeleConfig::from_toml("[server]\nport = 1\n[guide]\nretrieval_limit = 2\n")
            .unwrap();
        let overlay = KebeleConfig::from_toml("[server]\nport = 2\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.server().port, 2);
        assert_eq!(base.guide().retrieval_limit, 2);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = KebeleConfig::from_toml("[guide]\nretrieval_limit = 0\n").unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { ref field, .. }) if field == "guide.retrieval_limit"
        ));

        let config =
            KebeleConfig::from_toml("[translation]\nsource_language = \"fr\"\n").unwrap();
        assert!(config.validate().is_err());

        let config = KebeleConfig::from_toml("[guide]\nmin_score = 1.5\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_keeps_sections() {
        let config = KebeleConfig::from_toml("[llm]\nprovider = \"openai\"\n").unwrap();
        let reparsed = KebeleConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed, config);
    }
}
