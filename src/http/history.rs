//! History & Health Endpoints

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Path, Query, State};
use axum::Json;

use crate::models::HistoryPage;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

use super::rate_limit::HISTORY_RULE;
use super::validation::{clamp_limit, clamp_offset, validate_session_id};

pub async fn list_history(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<HistoryPage>> {
    state.limiter.check(addr.ip(), &HISTORY_RULE)?;

    let limit = clamp_limit(params.get("limit").map(String::as_str));
    let offset = clamp_offset(params.get("offset").map(String::as_str));

    let items = state.store.list_history(limit, offset)?;
    let total = state.store.count_history()?;
    Ok(Json(HistoryPage {
        items,
        total,
        limit,
        offset,
    }))
}

pub async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    validate_session_id(&id)?;
    if state.store.delete_session(&id)? {
        tracing::info!(session_id = %id, "session deleted");
        Ok(Json(serde_json::json!({ "deleted": true, "id": id })))
    } else {
        Err(AppError::not_found(format!("session {} not found", id)))
    }
}

/// Liveness probe; bypasses admission entirely.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
