//! HTTP Surface
//!
//! Routes, admission (validation + rate limiting), SSE streaming, and the
//! centralized error audit. CORS is open to all origins; request bodies are
//! capped at 1 MiB.

pub mod audit;
pub mod history;
pub mod rate_limit;
pub mod research;
pub mod stream;
pub mod validation;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

pub use rate_limit::{RateLimiter, HISTORY_RULE, RESEARCH_RULE};

/// Request body cap: 1 MiB
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Build the service router with all layers applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/research", post(research::start_research))
        .route("/research/:id", get(research::get_research))
        .route("/research/:id/stream", get(stream::stream_research))
        .route("/history", get(history::list_history))
        .route("/history/:id", delete(history::delete_history))
        .route("/health", get(history::health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            audit::error_audit,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
