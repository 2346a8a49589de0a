//! Deep Research Service - Backend Library
//!
//! Network-facing deep-research orchestration: accepts a natural-language
//! query, drives a multi-phase pipeline interleaving LLM calls with web
//! search, streams phase-by-phase progress over SSE, and persists the
//! resulting report with its provenance.
//!
//! - HTTP surface (routes, streaming, admission) in `http`
//! - Orchestration modes and the deep pipeline in `services::orchestrator`
//! - LLM and search adapters in `services::llm` / `services::search`
//! - Result cache in `services::cache`
//! - Storage layer (pooled SQLite) in `storage`

pub mod config;
pub mod http;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use config::AppConfig;
pub use models::{
    Citation, HistoryPage, ProgressEvent, ResearchMode, ResearchPayload, SessionDetail,
    SessionRecord, SessionStatus, TokenUsage,
};
pub use services::cache::{spawn_sweeper, ResultCache};
pub use services::llm::{LlmClient, OpenAiClient};
pub use services::orchestrator::Orchestrator;
pub use services::search::SearchService;
pub use state::AppState;
pub use storage::{Database, ResearchStore};
pub use utils::error::{AppError, AppResult};
