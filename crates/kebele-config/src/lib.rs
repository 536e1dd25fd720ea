//! Configuration system for the Kebele guidance service.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (user config dir + project-local overrides)
//! - Per-section defaults so partial files are valid
//! - API key resolution (env var → config file) for the rotating
//!   embedding key pool and the completion provider

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, config_dir, load_config, load_config_file,
    load_config_with_options, user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{
    EMBEDDING_KEYS_ENV, LLM_API_KEY_ENV, ResolvedSecret, SecretSource, resolve_embedding_keys,
    resolve_llm_api_key,
};
pub use types::*;
