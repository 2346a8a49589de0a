//! Streaming Progress Events
//!
//! Tagged event variants carried over the deep-mode SSE channel. Every stream
//! ends with exactly one terminal event (`complete` or `error`).

use axum::response::sse::Event;
use serde::Serialize;

use super::report::ResearchPayload;

/// One event on a deep-research progress stream.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Phase(PhaseProgress),
    Complete(ResearchPayload),
    Error { message: String },
}

/// Payload of a `phase` event, emitted on every phase boundary.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseProgress {
    pub phase: String,
    pub progress: u8,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: i64,
}

impl ProgressEvent {
    pub fn phase(
        phase: &str,
        progress: u8,
        message: impl Into<String>,
        data: Option<serde_json::Value>,
    ) -> Self {
        ProgressEvent::Phase(PhaseProgress {
            phase: phase.to_string(),
            progress,
            message: message.into(),
            data,
            timestamp: chrono::Utc::now().timestamp_millis(),
        })
    }

    pub fn complete(payload: ResearchPayload) -> Self {
        ProgressEvent::Complete(payload)
    }

    pub fn error(message: impl Into<String>) -> Self {
        ProgressEvent::Error {
            message: message.into(),
        }
    }

    /// SSE event name for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            ProgressEvent::Phase(_) => "phase",
            ProgressEvent::Complete(_) => "complete",
            ProgressEvent::Error { .. } => "error",
        }
    }

    /// Terminal events close the stream immediately after being sent.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Complete(_) | ProgressEvent::Error { .. }
        )
    }

    /// Frame this event for the wire: named event + single-line JSON data.
    pub fn into_sse_event(self) -> Event {
        let name = self.name();
        let data = serde_json::to_value(&self)
            .unwrap_or_else(|_| serde_json::json!({}))
            .to_string();
        Event::default().event(name).data(data)
    }
}
