//! LLM Adapter Types
//!
//! Chat request/response shapes and the error taxonomy shared by the adapter
//! and the orchestrator. Retryability is a property of the error kind:
//! cancellation, auth failures, and invalid requests never retry.

use async_trait::async_trait;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::models::{ResearchMode, TokenUsage};

/// Errors produced by the LLM adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    /// The request's cancellation signal fired
    #[error("cancelled")]
    Cancelled,

    /// No API key configured
    #[error("API key not configured")]
    MissingApiKey,

    /// Authentication failed (invalid API key, access denied)
    #[error("authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Invalid request (bad parameters)
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// Rate limit exceeded at the provider
    #[error("rate limited: {message}")]
    RateLimited { message: String },

    /// Server error from the provider
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Network/connection error
    #[error("network error: {message}")]
    NetworkError { message: String },

    /// Response parsing error
    #[error("parse error: {message}")]
    ParseError { message: String },

    /// Per-attempt timeout elapsed
    #[error("timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl LlmError {
    /// Whether a failed attempt with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LlmError::Cancelled
                | LlmError::MissingApiKey
                | LlmError::AuthenticationFailed { .. }
                | LlmError::InvalidRequest { .. }
        )
    }
}

/// Result type alias for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// One chat-completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub mode: ResearchMode,
    pub max_tokens: u32,
    pub temperature: f32,
    pub json_mode: bool,
}

/// Chat-completion result: message content plus token accounting.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tokens: TokenUsage,
}

/// Chat-capable LLM collaborator.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one chat request. Honours the per-mode timeout on every attempt
    /// and aborts as soon as `cancel` fires.
    async fn chat(&self, request: ChatRequest, cancel: &CancellationToken)
        -> LlmResult<ChatResponse>;
}

/// Map a non-2xx provider status to a typed error.
pub fn parse_http_error(status: u16, body: &str) -> LlmError {
    let message = truncate(body, 300);
    match status {
        400 => LlmError::InvalidRequest { message },
        401 | 403 => LlmError::AuthenticationFailed { message },
        429 => LlmError::RateLimited { message },
        _ => LlmError::ServerError { status, message },
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        value.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_error_classification() {
        assert!(matches!(
            parse_http_error(400, "bad"),
            LlmError::InvalidRequest { .. }
        ));
        assert!(matches!(
            parse_http_error(401, "nope"),
            LlmError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            parse_http_error(403, "denied"),
            LlmError::AuthenticationFailed { .. }
        ));
        assert!(matches!(
            parse_http_error(429, "slow down"),
            LlmError::RateLimited { .. }
        ));
        assert!(matches!(
            parse_http_error(500, "oops"),
            LlmError::ServerError { status: 500, .. }
        ));
    }

    #[test]
    fn test_retryability() {
        assert!(!LlmError::Cancelled.is_retryable());
        assert!(!LlmError::MissingApiKey.is_retryable());
        assert!(!parse_http_error(401, "x").is_retryable());
        assert!(!parse_http_error(400, "x").is_retryable());
        assert!(parse_http_error(429, "x").is_retryable());
        assert!(parse_http_error(503, "x").is_retryable());
        assert!(LlmError::Timeout { seconds: 30 }.is_retryable());
        assert!(LlmError::NetworkError {
            message: "reset".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_error_body_truncated() {
        let long = "x".repeat(500);
        if let LlmError::ServerError { message, .. } = parse_http_error(500, &long) {
            assert_eq!(message.len(), 300);
        } else {
            panic!("expected ServerError");
        }
    }
}
