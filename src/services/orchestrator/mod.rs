//! Research Orchestrator
//!
//! Owns the lifecycle of every research session: consults the cache, creates
//! the session row, drives the mode's pipeline, and writes the terminal state.
//! Quick and standard modes complete synchronously on the request's task; the
//! deep pipeline lives in `deep` and streams progress events.

pub mod deep;
pub mod jobs;
pub mod prompts;

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::models::{Citation, ResearchMode, ResearchPayload, TokenUsage};
use crate::services::cache::ResultCache;
use crate::services::llm::{ChatRequest, LlmClient};
use crate::services::search::{SearchDepth, SearchHit, SearchService};
use crate::storage::ResearchStore;
use crate::utils::error::{AppError, AppResult};

pub use deep::QueryAnalysis;
pub use jobs::{DeepJobs, PendingDeepJob};

const QUICK_MAX_TOKENS: u32 = 1500;
const QUICK_TEMPERATURE: f32 = 0.5;
const STANDARD_MAX_TOKENS: u32 = 2500;
const STANDARD_TEMPERATURE: f32 = 0.4;
const STANDARD_MAX_RESULTS: u32 = 5;

/// Result of one mode pipeline, before persistence and payload assembly.
struct ModeOutcome {
    report: String,
    citations: Vec<Citation>,
    tokens: TokenUsage,
}

/// Drives research sessions end to end. The orchestrator is the only
/// component that transitions session state.
pub struct Orchestrator {
    store: Arc<ResearchStore>,
    llm: Arc<dyn LlmClient>,
    search: Arc<SearchService>,
    cache: Arc<ResultCache>,
    verbose_errors: bool,
}

impl Orchestrator {
    pub fn new(
        store: Arc<ResearchStore>,
        llm: Arc<dyn LlmClient>,
        search: Arc<SearchService>,
        cache: Arc<ResultCache>,
        verbose_errors: bool,
    ) -> Self {
        Self {
            store,
            llm,
            search,
            cache,
            verbose_errors,
        }
    }

    /// Cached payload for (query, mode), if still fresh.
    pub fn cached(&self, query: &str, mode: ResearchMode) -> Option<ResearchPayload> {
        self.cache.get(query, mode)
    }

    /// Run a quick or standard session to completion and return its payload.
    /// On cache hit no session is created.
    pub async fn execute(
        &self,
        query: &str,
        mode: ResearchMode,
        cancel: &CancellationToken,
    ) -> AppResult<ResearchPayload> {
        if let Some(payload) = self.cache.get(query, mode) {
            return Ok(payload);
        }
        if mode == ResearchMode::Deep {
            return Err(AppError::internal(
                "deep mode runs through the streaming pipeline",
            ));
        }

        let session_id = self.store.create_session(query, mode)?;
        let started = Instant::now();

        let outcome = match mode {
            ResearchMode::Quick => self.run_quick(&session_id, query, cancel).await,
            ResearchMode::Standard => self.run_standard(&session_id, query, cancel).await,
            ResearchMode::Deep => unreachable!(),
        };

        match outcome {
            Ok(outcome) => self.finalize(&session_id, query, mode, started, outcome),
            Err(AppError::Cancelled) => Err(AppError::Cancelled),
            Err(e) => {
                self.record_failure(&session_id, &e);
                Err(e)
            }
        }
    }

    /// Single `quick_synthesis` phase: one economy-model call, no sources.
    async fn run_quick(
        &self,
        session_id: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> AppResult<ModeOutcome> {
        let phase_started = Instant::now();
        let response = self
            .llm
            .chat(
                ChatRequest {
                    system: prompts::QUICK_PROMPT.to_string(),
                    user: query.to_string(),
                    mode: ResearchMode::Quick,
                    max_tokens: QUICK_MAX_TOKENS,
                    temperature: QUICK_TEMPERATURE,
                    json_mode: false,
                },
                cancel,
            )
            .await?;

        self.store.append_phase(
            session_id,
            "quick_synthesis",
            elapsed_ms(phase_started),
            response.tokens.total,
            serde_json::json!({ "model": "economy" }),
        )?;

        Ok(ModeOutcome {
            report: response.content,
            citations: Vec::new(),
            tokens: response.tokens,
        })
    }

    /// `source_discovery` then `structured_synthesis` over the found sources.
    async fn run_standard(
        &self,
        session_id: &str,
        query: &str,
        cancel: &CancellationToken,
    ) -> AppResult<ModeOutcome> {
        let phase_started = Instant::now();
        let sources = self
            .search
            .search(query, SearchDepth::Basic, STANDARD_MAX_RESULTS, cancel)
            .await;
        self.store.append_phase(
            session_id,
            "source_discovery",
            elapsed_ms(phase_started),
            0,
            serde_json::json!({ "sourcesFound": sources.len() }),
        )?;
        ensure_active(cancel)?;

        let user = if sources.is_empty() {
            query.to_string()
        } else {
            format!(
                "Sources:\n{}\n\nResearch query: {}",
                format_source_list(&sources, usize::MAX),
                query
            )
        };

        let phase_started = Instant::now();
        let response = self
            .llm
            .chat(
                ChatRequest {
                    system: prompts::STANDARD_PROMPT.to_string(),
                    user,
                    mode: ResearchMode::Standard,
                    max_tokens: STANDARD_MAX_TOKENS,
                    temperature: STANDARD_TEMPERATURE,
                    json_mode: false,
                },
                cancel,
            )
            .await?;
        self.store.append_phase(
            session_id,
            "structured_synthesis",
            elapsed_ms(phase_started),
            response.tokens.total,
            serde_json::json!({ "sourcesCited": sources.len() }),
        )?;

        Ok(ModeOutcome {
            report: response.content,
            citations: citations_from_hits(&sources),
            tokens: response.tokens,
        })
    }

    /// Persist the successful outcome, complete the session, and cache it.
    fn finalize(
        &self,
        session_id: &str,
        query: &str,
        mode: ResearchMode,
        started: Instant,
        outcome: ModeOutcome,
    ) -> AppResult<ResearchPayload> {
        let latency_ms = elapsed_ms(started).max(1);
        self.store
            .write_report(session_id, &outcome.report, &outcome.citations)?;
        self.store
            .complete_session(session_id, latency_ms, outcome.tokens.total)?;

        let payload = ResearchPayload {
            session_id: session_id.to_string(),
            mode,
            report: outcome.report,
            citations: outcome.citations,
            tokens: outcome.tokens,
            latency_ms,
            from_cache: None,
        };
        self.cache.insert(query, mode, payload.clone());
        Ok(payload)
    }

    /// Mark the session failed and append an error entry, best-effort.
    fn record_failure(&self, session_id: &str, error: &AppError) {
        if self.verbose_errors {
            tracing::error!(session_id, error = ?error, "research session failed");
        } else {
            tracing::error!(session_id, error = %error, "research session failed");
        }
        if let Err(store_err) = self.store.fail_session(session_id) {
            tracing::warn!(session_id, error = %store_err, "failed to mark session failed");
        }
        self.store.log_error(
            Some(session_id),
            &error.to_string(),
            Some(&format!("{:?}", error)),
        );
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn ensure_active(cancel: &CancellationToken) -> AppResult<()> {
    if cancel.is_cancelled() {
        Err(AppError::Cancelled)
    } else {
        Ok(())
    }
}

/// Number sources 1-based as `[i] title (url)` with their snippets.
fn format_source_list(hits: &[SearchHit], snippet_limit: usize) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| {
            format!(
                "[{}] {} ({})\n{}",
                i + 1,
                hit.title,
                hit.url,
                truncate_chars(&hit.snippet, snippet_limit)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Renumber hits 1..N, carrying the provider score as relevance.
fn citations_from_hits(hits: &[SearchHit]) -> Vec<Citation> {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| Citation {
            id: (i + 1) as u32,
            title: hit.title.clone(),
            url: hit.url.clone(),
            relevance: hit.score.clamp(0.0, 1.0),
        })
        .collect()
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        value.to_string()
    } else {
        value.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionStatus;
    use crate::services::llm::{ChatResponse, LlmError, LlmResult};
    use crate::services::search::SearchProvider;
    use crate::storage::Database;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) struct ScriptedLlm {
        responses: Mutex<VecDeque<LlmResult<ChatResponse>>>,
    }

    impl ScriptedLlm {
        pub(crate) fn new(responses: Vec<LlmResult<ChatResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn chat(
            &self,
            _request: ChatRequest,
            cancel: &CancellationToken,
        ) -> LlmResult<ChatResponse> {
            if cancel.is_cancelled() {
                return Err(LlmError::Cancelled);
            }
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(text_response("exhausted", 1)))
        }
    }

    pub(crate) fn text_response(content: &str, total_tokens: u64) -> ChatResponse {
        ChatResponse {
            content: content.to_string(),
            tokens: TokenUsage {
                input: total_tokens / 3,
                output: total_tokens - total_tokens / 3,
                total: total_tokens,
            },
        }
    }

    pub(crate) struct FixedSearch {
        pub hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchProvider for FixedSearch {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn search(
            &self,
            _query: &str,
            _depth: SearchDepth,
            max_results: u32,
        ) -> Result<Vec<SearchHit>, String> {
            Ok(self
                .hits
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }
    }

    pub(crate) fn hit(title: &str, url: &str, score: f64) -> SearchHit {
        SearchHit {
            title: title.to_string(),
            url: url.to_string(),
            snippet: format!("snippet about {}", title),
            score,
        }
    }

    fn orchestrator_with(
        llm: Arc<dyn LlmClient>,
        hits: Vec<SearchHit>,
    ) -> (Orchestrator, Arc<ResearchStore>) {
        let store = Arc::new(ResearchStore::new(Database::in_memory().unwrap()));
        let search = Arc::new(SearchService::with_provider(Box::new(FixedSearch { hits })));
        let cache = Arc::new(ResultCache::new());
        let orchestrator = Orchestrator::new(store.clone(), llm, search, cache, true);
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_quick_mode_completes_session() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response("HTTP is...", 120))]));
        let (orchestrator, store) = orchestrator_with(llm, vec![]);
        let cancel = CancellationToken::new();

        let payload = orchestrator
            .execute("What is HTTP?", ResearchMode::Quick, &cancel)
            .await
            .unwrap();

        assert_eq!(payload.report, "HTTP is...");
        assert!(payload.citations.is_empty());
        assert_eq!(payload.tokens.total, 120);
        assert!(payload.latency_ms > 0);

        let detail = store
            .get_session_with_report(&payload.session_id)
            .unwrap()
            .unwrap();
        assert_eq!(detail.session.status, SessionStatus::Completed);
        assert_eq!(detail.session.total_tokens, Some(120));
        let names: Vec<&str> = detail.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["quick_synthesis"]);
    }

    #[tokio::test]
    async fn test_second_identical_request_hits_cache() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response("answer", 50))]));
        let (orchestrator, store) = orchestrator_with(llm, vec![]);
        let cancel = CancellationToken::new();

        let first = orchestrator
            .execute("same question", ResearchMode::Quick, &cancel)
            .await
            .unwrap();
        let second = orchestrator
            .execute("same question", ResearchMode::Quick, &cancel)
            .await
            .unwrap();

        assert_eq!(first.session_id, second.session_id);
        assert_eq!(store.count_history().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_standard_mode_builds_citations_from_sources() {
        let llm = Arc::new(ScriptedLlm::new(vec![Ok(text_response(
            "Report citing [1] and [2].",
            200,
        ))]));
        let hits = vec![
            hit("First", "https://one.example", 0.92),
            hit("Second", "https://two.example", 0.61),
        ];
        let (orchestrator, store) = orchestrator_with(llm, hits);
        let cancel = CancellationToken::new();

        let payload = orchestrator
            .execute("compare things", ResearchMode::Standard, &cancel)
            .await
            .unwrap();

        assert_eq!(payload.citations.len(), 2);
        assert_eq!(payload.citations[0].id, 1);
        assert_eq!(payload.citations[1].id, 2);
        assert_eq!(payload.citations[0].url, "https://one.example");
        assert!((payload.citations[0].relevance - 0.92).abs() < 1e-9);

        let detail = store
            .get_session_with_report(&payload.session_id)
            .unwrap()
            .unwrap();
        let names: Vec<&str> = detail.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["source_discovery", "structured_synthesis"]);
        assert_eq!(detail.phases[0].tokens_used, 0);
    }

    #[tokio::test]
    async fn test_llm_failure_marks_session_failed() {
        let llm = Arc::new(ScriptedLlm::new(vec![Err(LlmError::ServerError {
            status: 500,
            message: "upstream broke".into(),
        })]));
        let (orchestrator, store) = orchestrator_with(llm, vec![]);
        let cancel = CancellationToken::new();

        let result = orchestrator
            .execute("doomed", ResearchMode::Quick, &cancel)
            .await;
        assert!(result.is_err());

        let history = store.list_history(10, 0).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, SessionStatus::Failed);
        let detail = store.get_session_with_report(&history[0].id).unwrap().unwrap();
        assert!(detail.report.is_none());
        assert!(store.count_errors(&history[0].id).unwrap() >= 1);
    }

    #[test]
    fn test_source_list_formatting() {
        let hits = vec![hit("Alpha", "https://a.example", 0.5)];
        let formatted = format_source_list(&hits, usize::MAX);
        assert!(formatted.starts_with("[1] Alpha (https://a.example)\n"));
        assert!(formatted.contains("snippet about Alpha"));
    }

    #[test]
    fn test_citation_relevance_is_clamped() {
        let hits = vec![hit("A", "https://a", 1.4), hit("B", "https://b", -0.2)];
        let citations = citations_from_hits(&hits);
        assert_eq!(citations[0].relevance, 1.0);
        assert_eq!(citations[1].relevance, 0.0);
    }
}
