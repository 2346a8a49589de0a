//! Report Models
//!
//! Final report payloads, citations, and token accounting.

use serde::{Deserialize, Serialize};

use super::session::{PhaseRecord, ResearchMode, SessionRecord};

/// A single cited source. Ids are consecutive starting at 1 within a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub id: u32,
    pub title: String,
    pub url: String,
    pub relevance: f64,
}

/// Token usage breakdown for one or more LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
    pub total: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: &TokenUsage) {
        self.input += other.input;
        self.output += other.output;
        self.total += other.total;
    }
}

/// Completed research result, as returned to clients and held in the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPayload {
    pub session_id: String,
    pub mode: ResearchMode,
    pub report: String,
    pub citations: Vec<Citation>,
    pub tokens: TokenUsage,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_cache: Option<bool>,
}

/// Session snapshot with its report (if any) and phase telemetry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
    pub phases: Vec<PhaseRecord>,
}

/// Paged history listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    pub items: Vec<SessionRecord>,
    pub total: u64,
    pub limit: u32,
    pub offset: u32,
}
