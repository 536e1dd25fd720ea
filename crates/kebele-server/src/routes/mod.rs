//! API routes.

pub mod guide;
pub mod health;
pub mod history;
pub mod translate;

pub use guide::{GuideRequest, GuideResponse, guide_handler};
pub use health::{HealthResponse, health_routes};
pub use history::{
    ClearHistoryResponse, HistoryParams, HistoryResponse, clear_history_handler,
    list_history_handler,
};
pub use translate::{TranslateRequest, TranslateResponse, translate_handler};
