//! Research Endpoints
//!
//! `POST /research` starts a session (or answers from cache); quick and
//! standard complete on this request, deep returns immediately and runs on
//! the stream connection. `GET /research/:id` returns the session snapshot
//! with its report and phases.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, State};
use axum::Json;
use tokio_util::sync::CancellationToken;

use crate::models::{ResearchMode, SessionDetail};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

use super::rate_limit::RESEARCH_RULE;
use super::validation::{validate_research_request, validate_session_id};

pub async fn start_research(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    state.limiter.check(addr.ip(), &RESEARCH_RULE)?;

    let parsed: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|_| AppError::validation("request body must be a JSON object"))?;
    let (query, mode) = validate_research_request(&parsed)?;

    if let Some(mut payload) = state.orchestrator.cached(&query, mode) {
        payload.from_cache = Some(true);
        tracing::debug!(mode = %mode, "research served from cache");
        return Ok(Json(serde_json::to_value(payload)?));
    }

    match mode {
        ResearchMode::Deep => {
            let session_id = state.store.create_session(&query, mode)?;
            state.jobs.register(session_id.clone(), query);
            tracing::info!(session_id = %session_id, "deep research session registered");
            Ok(Json(serde_json::json!({
                "sessionId": session_id,
                "mode": "deep",
                "status": "running",
            })))
        }
        ResearchMode::Quick | ResearchMode::Standard => {
            let cancel = CancellationToken::new();
            let payload = state.orchestrator.execute(&query, mode, &cancel).await?;
            Ok(Json(serde_json::to_value(payload)?))
        }
    }
}

pub async fn get_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<SessionDetail>> {
    validate_session_id(&id)?;
    let detail = state
        .store
        .get_session_with_report(&id)?
        .ok_or_else(|| AppError::not_found(format!("session {} not found", id)))?;
    Ok(Json(detail))
}
