//! Session Models
//!
//! Research sessions, modes, statuses, and phase telemetry records.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestration strategy for a research session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResearchMode {
    /// Single LLM call, no sources
    Quick,
    /// Web search + single synthesis call
    Standard,
    /// Six-phase pipeline with streamed progress
    Deep,
}

impl ResearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResearchMode::Quick => "quick",
            ResearchMode::Standard => "standard",
            ResearchMode::Deep => "deep",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "quick" => Some(ResearchMode::Quick),
            "standard" => Some(ResearchMode::Standard),
            "deep" => Some(ResearchMode::Deep),
            _ => None,
        }
    }

    /// How long a completed result stays in the cache.
    pub fn cache_ttl(&self) -> Duration {
        match self {
            ResearchMode::Quick => Duration::from_secs(15 * 60),
            ResearchMode::Standard => Duration::from_secs(20 * 60),
            ResearchMode::Deep => Duration::from_secs(30 * 60),
        }
    }

    /// Per-attempt timeout for LLM calls issued in this mode.
    pub fn llm_timeout(&self) -> Duration {
        match self {
            ResearchMode::Quick => Duration::from_secs(30),
            ResearchMode::Standard => Duration::from_secs(45),
            ResearchMode::Deep => Duration::from_secs(60),
        }
    }
}

impl std::fmt::Display for ResearchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Session lifecycle state. Transitions are monotonic:
/// `pending → running → (completed | failed)`; terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SessionStatus::Pending),
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Failed)
    }
}

/// A persisted research session row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(rename = "sessionId")]
    pub id: String,
    pub query: String,
    pub mode: ResearchMode,
    pub status: SessionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    pub created_at: String,
}

/// A persisted pipeline phase row (append-only, insertion-ordered).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    pub name: String,
    pub duration_ms: u64,
    pub tokens_used: u64,
    pub metadata: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_round_trip() {
        for mode in [
            ResearchMode::Quick,
            ResearchMode::Standard,
            ResearchMode::Deep,
        ] {
            assert_eq!(ResearchMode::parse(mode.as_str()), Some(mode));
        }
        assert_eq!(ResearchMode::parse("turbo"), None);
    }

    #[test]
    fn test_mode_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&ResearchMode::Deep).unwrap(),
            "\"deep\""
        );
    }

    #[test]
    fn test_cache_ttl_ordering() {
        assert!(ResearchMode::Quick.cache_ttl() < ResearchMode::Standard.cache_ttl());
        assert!(ResearchMode::Standard.cache_ttl() < ResearchMode::Deep.cache_ttl());
    }

    #[test]
    fn test_status_terminality() {
        assert!(!SessionStatus::Running.is_terminal());
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
    }
}
