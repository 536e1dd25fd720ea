//! HTTP API for Kebele.
//!
//! Exposes the guide and translation services over HTTP.
//!
//! # Routes
//!
//! - `GET /health` - liveness
//! - `POST /ai/guide` - answer a question
//! - `GET /ai/history`, `DELETE /ai/history` - the caller's past questions
//! - `POST /ai/translate` - translate an arbitrary JSON document
//!
//! Every `/ai` route sits behind the translation boundary: a `lang` request
//! header asks for the JSON response to come back in that language.
//!
//! # Example
//!
//! ```ignore
//! use kebele_server::{AppState, Server, ServerConfig};
//!
//! let state = AppState::new(guide, translator, ServerConfig::new());
//! Server::from_state(state).run().await?;
//! ```

pub mod boundary;
pub mod config;
pub mod error;
pub mod identity;
pub mod ratelimit;
pub mod routes;
pub mod state;

pub use boundary::{LANG_HEADER, translation_middleware};
pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use identity::{USER_ID_HEADER, UserId};
pub use ratelimit::{rate_limit_middleware, request_logging_middleware};
pub use routes::{GuideRequest, GuideResponse, TranslateRequest, TranslateResponse};
pub use state::AppState;

use std::net::SocketAddr;

use axum::{Router, middleware};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// The Kebele HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            // Health stays outside the rate limit and translation layers
            .merge(routes::health_routes())
            .nest("/ai", self.ai_routes())
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::request_logging_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Guide, history and translation routes.
    fn ai_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/guide", post(routes::guide_handler))
            .route(
                "/history",
                get(routes::list_history_handler).delete(routes::clear_history_handler),
            )
            .route("/translate", post(routes::translate_handler))
            // Translation wraps the handlers only
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                boundary::translation_middleware,
            ))
            // Rejected requests never reach the boundary
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                ratelimit::rate_limit_middleware,
            ))
    }

    /// Run the server.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_on(addr).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!("Starting server on {}", addr);

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }
}
