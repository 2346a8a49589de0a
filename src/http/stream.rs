//! Deep-Mode Progress Stream
//!
//! `GET /research/:id/stream` claims the session's pending job and drives the
//! deep pipeline, forwarding progress events as SSE frames until the terminal
//! event. Dropping the connection drops the stream, which cancels the
//! pipeline through a token drop-guard. An already-completed session gets its
//! stored payload as plain JSON instead of a stream.

use std::convert::Infallible;
use std::pin::Pin;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::Stream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{ProgressEvent, SessionStatus};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

use super::validation::validate_session_id;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const EVENT_CHANNEL_CAPACITY: usize = 32;

type EventStream = Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>>;

pub async fn stream_research(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    validate_session_id(&id)?;
    let detail = state
        .store
        .get_session_with_report(&id)?
        .ok_or_else(|| AppError::not_found(format!("session {} not found", id)))?;

    if detail.session.status == SessionStatus::Completed {
        return Ok(Json(detail).into_response());
    }

    let stream: EventStream = match state.jobs.claim(&id) {
        Some(job) => {
            let cancel = CancellationToken::new();
            let guard = cancel.clone().drop_guard();
            let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let orchestrator = state.orchestrator.clone();
            let session_id = id.clone();
            tokio::spawn(async move {
                orchestrator.run_deep(session_id, job.query, cancel, tx).await;
            });

            Box::pin(async_stream::stream! {
                let _guard = guard;
                while let Some(event) = rx.recv().await {
                    let terminal = event.is_terminal();
                    yield Ok(event.into_sse_event());
                    if terminal {
                        break;
                    }
                }
            })
        }
        None => {
            // Failed sessions, or running sessions whose pipeline is already
            // attached elsewhere, get a single terminal frame.
            let message = match detail.session.status {
                SessionStatus::Failed => "research session failed",
                _ => "no pending research stream for this session",
            };
            let event = ProgressEvent::error(message);
            Box::pin(futures_util::stream::iter(vec![Ok(event.into_sse_event())]))
        }
    };

    let sse = Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keepalive"),
    );

    let mut response = sse.into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    Ok(response)
}
