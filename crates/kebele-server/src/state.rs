//! Application state shared across handlers.

use std::sync::Arc;

use kebele_ai::{CallContext, GuideService, StructuredTranslator};

use crate::config::ServerConfig;
use crate::ratelimit::{SharedRateLimiter, create_rate_limiter};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Question answering pipeline.
    pub guide: Arc<GuideService>,

    /// Document translator, also used by the translation boundary.
    pub translator: Arc<StructuredTranslator>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,

    /// Request gate for `/ai` routes.
    pub limiter: SharedRateLimiter,
}

impl AppState {
    /// Create a new application state.
    pub fn new(guide: GuideService, translator: StructuredTranslator, config: ServerConfig) -> Self {
        let limiter = create_rate_limiter(config.api_rpm);
        Self {
            guide: Arc::new(guide),
            translator: Arc::new(translator),
            config: Arc::new(config),
            limiter,
        }
    }

    /// A fresh call context bounded by the configured request deadline.
    pub fn request_context(&self) -> CallContext {
        CallContext::new().with_timeout(self.config.request_timeout)
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("guide", &self.guide)
            .field("translator", &self.translator)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
