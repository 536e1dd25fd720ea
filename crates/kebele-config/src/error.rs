//! Configuration error types.

/// Result type alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read a config file.
    #[error("failed to read config file '{path}': {source}")]
    ReadFile {
        path: String,
        source: std::io::Error,
    },

    /// Failed to parse TOML.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Failed to serialize config.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value is present but unusable.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: String, reason: String },

    /// No embedding API key was found through any resolution method.
    #[error(
        "no embedding API keys configured for provider '{provider}'. Set {env_var}=\"key1,key2\" or [embedding] api_keys"
    )]
    NoEmbeddingKeys { provider: String, env_var: String },

    /// The completion provider needs a key and none was found.
    #[error("API key not found for LLM provider '{provider}'. Set {env_var} or [llm] api_key")]
    ApiKeyNotFound { provider: String, env_var: String },
}

impl ConfigError {
    /// Shorthand for an [`ConfigError::Invalid`] error.
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
