//! Error Audit Middleware
//!
//! Records an error entry for every 5xx response, best-effort. The response
//! body is buffered (they are small JSON envelopes), mined for its message,
//! and passed through unchanged.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

const MAX_AUDIT_BODY_BYTES: usize = 64 * 1024;

pub async fn error_audit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    if !response.status().is_server_error() {
        return response;
    }

    let (parts, body) = response.into_parts();
    match axum::body::to_bytes(body, MAX_AUDIT_BODY_BYTES).await {
        Ok(bytes) => {
            let message = serde_json::from_slice::<serde_json::Value>(&bytes)
                .ok()
                .and_then(|v| {
                    v.get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .unwrap_or_else(|| format!("HTTP {}", parts.status));
            state.store.log_error(None, &message, None);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(_) => Response::from_parts(parts, Body::empty()),
    }
}
