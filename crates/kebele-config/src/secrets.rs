//! Secrets resolution for provider API keys.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with warning at load time)
//!
//! Embedding keys come as a list: `KEBELE_EMBEDDING_KEYS="k1,k2,k3"`.

use crate::error::{ConfigError, Result};
use crate::types::{EmbeddingConfig, LlmConfig};

/// Environment variable holding comma-separated embedding keys.
pub const EMBEDDING_KEYS_ENV: &str = "KEBELE_EMBEDDING_KEYS";

/// Environment variable holding the completion provider key.
pub const LLM_API_KEY_ENV: &str = "KEBELE_LLM_API_KEY";

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret<T> {
    /// The secret value.
    pub value: T,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve the embedding key pool from the environment, then the config.
///
/// Returns `Ok(None)` only for providers that need no keys.
pub fn resolve_embedding_keys(
    config: &EmbeddingConfig,
) -> Result<Option<ResolvedSecret<Vec<String>>>> {
    resolve_embedding_keys_with(config, |var| std::env::var(var).ok())
}

/// Resolve the completion API key from the environment, then the config.
///
/// Checks `KEBELE_LLM_API_KEY`, then the provider-specific variable
/// (e.g. `GEMINI_API_KEY`), then `[llm] api_key`.
pub fn resolve_llm_api_key(config: &LlmConfig) -> Result<Option<ResolvedSecret<String>>> {
    resolve_llm_api_key_with(config, |var| std::env::var(var).ok())
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

fn resolve_embedding_keys_with(
    config: &EmbeddingConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ResolvedSecret<Vec<String>>>> {
    if !config.provider.requires_keys() {
        return Ok(None);
    }

    if let Some(raw) = lookup(EMBEDDING_KEYS_ENV) {
        let keys = split_keys(&raw);
        if !keys.is_empty() {
            return Ok(Some(ResolvedSecret {
                value: keys,
                source: SecretSource::EnvVar(EMBEDDING_KEYS_ENV.to_string()),
            }));
        }
    }

    let keys: Vec<String> = config
        .api_keys
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keys.is_empty() {
        return Err(ConfigError::NoEmbeddingKeys {
            provider: config.provider.to_string(),
            env_var: EMBEDDING_KEYS_ENV.to_string(),
        });
    }

    Ok(Some(ResolvedSecret {
        value: keys,
        source: SecretSource::ConfigFile,
    }))
}

fn resolve_llm_api_key_with(
    config: &LlmConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<ResolvedSecret<String>>> {
    for var in [LLM_API_KEY_ENV, config.provider.env_var()] {
        if let Some(value) = lookup(var)
            && !value.trim().is_empty()
        {
            return Ok(Some(ResolvedSecret {
                value,
                source: SecretSource::EnvVar(var.to_string()),
            }));
        }
    }

    match config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        Some(key) => Ok(Some(ResolvedSecret {
            value: key.to_string(),
            source: SecretSource::ConfigFile,
        })),
        None if config.provider.requires_api_key() => Err(ConfigError::ApiKeyNotFound {
            provider: config.provider.to_string(),
            env_var: LLM_API_KEY_ENV.to_string(),
        }),
        None => Ok(None),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
