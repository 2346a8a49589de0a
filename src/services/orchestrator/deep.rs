//! Deep Research Pipeline
//!
//! Six sequential phases with streamed progress. Each executed phase emits a
//! `phase` event on entry and exit, appends one telemetry row, and accumulates
//! token usage; the stream always ends with exactly one terminal event.
//! Extraction and validation are skipped (no row, no events) when their input
//! is empty. Client disconnect cancels in-flight work and leaves the session
//! `running` with no report.

use std::collections::HashSet;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::models::{ProgressEvent, ResearchMode, ResearchPayload, TokenUsage};
use crate::services::llm::ChatRequest;
use crate::services::search::{SearchDepth, SearchHit};
use crate::utils::error::{AppError, AppResult};

use super::{
    citations_from_hits, elapsed_ms, ensure_active, format_source_list, prompts, Orchestrator,
};

/// Sub-searches per deep run beyond the raw query
const SUB_QUESTION_LIMIT: usize = 3;
/// Results requested per sub-query
const DEEP_MAX_RESULTS: u32 = 4;
/// Snippet truncation for prompt assembly
const SNIPPET_LIMIT: usize = 500;

const ANALYSIS_MAX_TOKENS: u32 = 800;
const ANALYSIS_TEMPERATURE: f32 = 0.2;
const EXTRACTION_MAX_TOKENS: u32 = 2000;
const EXTRACTION_TEMPERATURE: f32 = 0.3;
const VALIDATION_MAX_TOKENS: u32 = 1500;
const VALIDATION_TEMPERATURE: f32 = 0.3;
const SYNTHESIS_MAX_TOKENS: u32 = 4000;
const SYNTHESIS_TEMPERATURE: f32 = 0.4;

/// Structured decomposition of the research query (deep phase 1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryAnalysis {
    pub core_question: String,
    pub sub_questions: Vec<String>,
    pub domain: String,
    pub output_type: String,
}

/// Parse the phase-1 JSON response, falling back to a single-question
/// decomposition when the model's output is not valid JSON.
pub fn parse_query_analysis(content: &str, query: &str) -> QueryAnalysis {
    serde_json::from_str::<QueryAnalysis>(content).unwrap_or_else(|_| QueryAnalysis {
        core_question: query.to_string(),
        sub_questions: vec![query.to_string()],
        domain: "general".to_string(),
        output_type: "analysis".to_string(),
    })
}

/// Merge per-query result batches, keeping the first occurrence of each URL.
pub fn dedupe_by_url(batches: Vec<Vec<SearchHit>>) -> Vec<SearchHit> {
    let mut seen = HashSet::new();
    let mut sources = Vec::new();
    for hit in batches.into_iter().flatten() {
        if hit.url.is_empty() {
            continue;
        }
        if seen.insert(hit.url.clone()) {
            sources.push(hit);
        }
    }
    sources
}

impl Orchestrator {
    /// Run the deep pipeline, streaming progress into `tx`. Terminal handling
    /// happens here: success emits `complete`, failure marks the session
    /// failed and emits `error`, cancellation emits nothing and leaves the
    /// session `running`.
    pub async fn run_deep(
        &self,
        session_id: String,
        query: String,
        cancel: CancellationToken,
        tx: mpsc::Sender<ProgressEvent>,
    ) {
        match self.deep_pipeline(&session_id, &query, &cancel, &tx).await {
            Ok(payload) => {
                let _ = tx.send(ProgressEvent::complete(payload)).await;
            }
            Err(AppError::Cancelled) => {
                tracing::info!(session_id = %session_id, "deep research cancelled by client");
            }
            Err(e) => {
                self.record_failure(&session_id, &e);
                let _ = tx.send(ProgressEvent::error(e.to_string())).await;
            }
        }
    }

    async fn deep_pipeline(
        &self,
        session_id: &str,
        query: &str,
        cancel: &CancellationToken,
        tx: &mpsc::Sender<ProgressEvent>,
    ) -> AppResult<ResearchPayload> {
        let started = Instant::now();
        let mut tokens = TokenUsage::default();

        // Phase 1: query_analysis
        emit(
            tx,
            ProgressEvent::phase("query_analysis", 5, "Analyzing research query", None),
        )
        .await;
        let phase_started = Instant::now();
        let response = self
            .llm
            .chat(
                ChatRequest {
                    system: prompts::QUERY_ANALYSIS_PROMPT.to_string(),
                    user: format!("Research query: {}", query),
                    mode: ResearchMode::Deep,
                    max_tokens: ANALYSIS_MAX_TOKENS,
                    temperature: ANALYSIS_TEMPERATURE,
                    json_mode: true,
                },
                cancel,
            )
            .await?;
        tokens.add(&response.tokens);
        let analysis = parse_query_analysis(&response.content, query);
        self.store.append_phase(
            session_id,
            "query_analysis",
            elapsed_ms(phase_started),
            response.tokens.total,
            serde_json::json!({
                "domain": analysis.domain,
                "outputType": analysis.output_type,
                "subQuestions": analysis.sub_questions.len(),
            }),
        )?;
        emit(
            tx,
            ProgressEvent::phase(
                "query_analysis",
                15,
                "Query analysis complete",
                Some(serde_json::json!({
                    "coreQuestion": analysis.core_question,
                    "domain": analysis.domain,
                })),
            ),
        )
        .await;
        ensure_active(cancel)?;

        // Phase 2: source_discovery
        emit(
            tx,
            ProgressEvent::phase("source_discovery", 20, "Discovering sources", None),
        )
        .await;
        let phase_started = Instant::now();
        let mut queries = vec![query.to_string()];
        queries.extend(
            analysis
                .sub_questions
                .iter()
                .take(SUB_QUESTION_LIMIT)
                .cloned(),
        );
        let batches = self
            .search
            .search_many(&queries, SearchDepth::Advanced, DEEP_MAX_RESULTS, cancel)
            .await;
        let sources = dedupe_by_url(batches);
        self.store.append_phase(
            session_id,
            "source_discovery",
            elapsed_ms(phase_started),
            0,
            serde_json::json!({
                "sourcesFound": sources.len(),
                "subQueries": queries.len(),
            }),
        )?;
        emit(
            tx,
            ProgressEvent::phase(
                "source_discovery",
                30,
                format!("Found {} sources", sources.len()),
                Some(serde_json::json!({ "sourcesFound": sources.len() })),
            ),
        )
        .await;
        ensure_active(cancel)?;

        // Phase 3: content_extraction (skipped without sources)
        let mut extraction = None;
        if !sources.is_empty() {
            emit(
                tx,
                ProgressEvent::phase(
                    "content_extraction",
                    35,
                    "Extracting content from sources",
                    None,
                ),
            )
            .await;
            let phase_started = Instant::now();
            let response = self
                .llm
                .chat(
                    ChatRequest {
                        system: prompts::EXTRACTION_PROMPT.to_string(),
                        user: format!(
                            "Research query: {}\n\nSources:\n{}",
                            query,
                            format_source_list(&sources, SNIPPET_LIMIT)
                        ),
                        mode: ResearchMode::Deep,
                        max_tokens: EXTRACTION_MAX_TOKENS,
                        temperature: EXTRACTION_TEMPERATURE,
                        json_mode: false,
                    },
                    cancel,
                )
                .await?;
            tokens.add(&response.tokens);
            self.store.append_phase(
                session_id,
                "content_extraction",
                elapsed_ms(phase_started),
                response.tokens.total,
                serde_json::json!({ "sourcesProcessed": sources.len() }),
            )?;
            emit(
                tx,
                ProgressEvent::phase("content_extraction", 50, "Content extraction complete", None),
            )
            .await;
            extraction = Some(response.content);
            ensure_active(cancel)?;
        }

        // Phase 4: cross_validation (skipped without extraction)
        let mut validation = None;
        if let Some(insights) = &extraction {
            emit(
                tx,
                ProgressEvent::phase("cross_validation", 55, "Cross-validating findings", None),
            )
            .await;
            let phase_started = Instant::now();
            let response = self
                .llm
                .chat(
                    ChatRequest {
                        system: prompts::VALIDATION_PROMPT.to_string(),
                        user: format!(
                            "Research query: {}\n\nExtracted insights:\n{}",
                            query, insights
                        ),
                        mode: ResearchMode::Deep,
                        max_tokens: VALIDATION_MAX_TOKENS,
                        temperature: VALIDATION_TEMPERATURE,
                        json_mode: false,
                    },
                    cancel,
                )
                .await?;
            tokens.add(&response.tokens);
            self.store.append_phase(
                session_id,
                "cross_validation",
                elapsed_ms(phase_started),
                response.tokens.total,
                serde_json::json!({}),
            )?;
            emit(
                tx,
                ProgressEvent::phase("cross_validation", 65, "Cross-validation complete", None),
            )
            .await;
            validation = Some(response.content);
            ensure_active(cancel)?;
        }

        // Phase 5: structured_synthesis
        emit(
            tx,
            ProgressEvent::phase("structured_synthesis", 70, "Synthesizing final report", None),
        )
        .await;
        let phase_started = Instant::now();
        let response = self
            .llm
            .chat(
                ChatRequest {
                    system: prompts::DEEP_SYNTHESIS_PROMPT.to_string(),
                    user: build_synthesis_input(
                        query,
                        &analysis,
                        extraction.as_deref(),
                        validation.as_deref(),
                        &sources,
                    ),
                    mode: ResearchMode::Deep,
                    max_tokens: SYNTHESIS_MAX_TOKENS,
                    temperature: SYNTHESIS_TEMPERATURE,
                    json_mode: false,
                },
                cancel,
            )
            .await?;
        tokens.add(&response.tokens);
        let report = response.content;
        self.store.append_phase(
            session_id,
            "structured_synthesis",
            elapsed_ms(phase_started),
            response.tokens.total,
            serde_json::json!({ "sourcesCited": sources.len() }),
        )?;
        emit(
            tx,
            ProgressEvent::phase("structured_synthesis", 85, "Synthesis complete", None),
        )
        .await;
        ensure_active(cancel)?;

        // Phase 6: citation_linking (pure transform, no LLM)
        emit(
            tx,
            ProgressEvent::phase("citation_linking", 90, "Linking citations", None),
        )
        .await;
        let phase_started = Instant::now();
        let citations = citations_from_hits(&sources);
        self.store.append_phase(
            session_id,
            "citation_linking",
            elapsed_ms(phase_started),
            0,
            serde_json::json!({ "citations": citations.len() }),
        )?;
        emit(
            tx,
            ProgressEvent::phase(
                "citation_linking",
                100,
                format!("Research complete: {} citations", citations.len()),
                Some(serde_json::json!({ "citations": citations.len() })),
            ),
        )
        .await;

        let latency_ms = elapsed_ms(started).max(1);
        self.store.write_report(session_id, &report, &citations)?;
        self.store
            .complete_session(session_id, latency_ms, tokens.total)?;

        let payload = ResearchPayload {
            session_id: session_id.to_string(),
            mode: ResearchMode::Deep,
            report,
            citations,
            tokens,
            latency_ms,
            from_cache: None,
        };
        self.cache
            .insert(query, ResearchMode::Deep, payload.clone());
        Ok(payload)
    }
}

fn build_synthesis_input(
    query: &str,
    analysis: &QueryAnalysis,
    extraction: Option<&str>,
    validation: Option<&str>,
    sources: &[SearchHit],
) -> String {
    let mut sections = vec![format!("Research query: {}", query)];
    if let Ok(analysis_json) = serde_json::to_string_pretty(analysis) {
        sections.push(format!("Query analysis:\n{}", analysis_json));
    }
    if let Some(insights) = extraction {
        sections.push(format!("Extracted insights:\n{}", insights));
    }
    if let Some(report) = validation {
        sections.push(format!("Validation report:\n{}", report));
    }
    if !sources.is_empty() {
        sections.push(format!(
            "Sources:\n{}",
            format_source_list(sources, SNIPPET_LIMIT)
        ));
    }
    sections.join("\n\n")
}

async fn emit(tx: &mpsc::Sender<ProgressEvent>, event: ProgressEvent) {
    let _ = tx.send(event).await;
}
