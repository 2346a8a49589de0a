//! Web Search Adapter
//!
//! Tavily-backed source discovery. Search never fails the pipeline: every
//! provider error degrades to an empty result list, and an unconfigured
//! provider always returns empty.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call HTTP timeout
const SEARCH_TIMEOUT: Duration = Duration::from_secs(15);

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// A single search result, ordered by provider relevance.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub score: f64,
}

/// Provider-side search effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchDepth {
    Basic,
    Advanced,
}

impl SearchDepth {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchDepth::Basic => "basic",
            SearchDepth::Advanced => "advanced",
        }
    }
}

/// Trait for pluggable search providers
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &str;

    /// Whether this provider can actually reach a backend
    fn is_enabled(&self) -> bool {
        true
    }

    /// Execute a search query
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
    ) -> Result<Vec<SearchHit>, String>;
}

/// Tavily search provider (requires API key)
struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn name(&self) -> &str {
        "Tavily"
    }

    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
    ) -> Result<Vec<SearchHit>, String> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": depth.as_str(),
        });

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Tavily request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let err_body = response.text().await.unwrap_or_default();
            return Err(format!(
                "Tavily API error ({}): {}",
                status.as_u16(),
                err_body
            ));
        }

        let data: TavilyResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse Tavily response: {}", e))?;

        Ok(data.results.into_iter().map(SearchHit::from).collect())
    }
}

/// Always-empty provider used when no API key is configured
struct DisabledProvider;

#[async_trait]
impl SearchProvider for DisabledProvider {
    fn name(&self) -> &str {
        "disabled"
    }

    fn is_enabled(&self) -> bool {
        false
    }

    async fn search(
        &self,
        _query: &str,
        _depth: SearchDepth,
        _max_results: u32,
    ) -> Result<Vec<SearchHit>, String> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    score: f64,
}

impl From<TavilyResult> for SearchHit {
    fn from(result: TavilyResult) -> Self {
        SearchHit {
            title: result.title,
            url: result.url,
            snippet: result.content,
            score: result.score.clamp(0.0, 1.0),
        }
    }
}

/// Search service with a pluggable provider and degrade-to-empty semantics.
pub struct SearchService {
    provider: Box<dyn SearchProvider>,
}

impl SearchService {
    /// Tavily when a key is present, otherwise the disabled provider.
    pub fn from_api_key(api_key: Option<&str>) -> Self {
        match api_key.filter(|k| !k.is_empty()) {
            Some(key) => {
                let client = reqwest::Client::builder()
                    .timeout(SEARCH_TIMEOUT)
                    .user_agent("deep-research-service/0.1")
                    .build()
                    .unwrap_or_else(|_| reqwest::Client::new());
                Self {
                    provider: Box::new(TavilyProvider {
                        client,
                        api_key: key.to_string(),
                    }),
                }
            }
            None => Self {
                provider: Box::new(DisabledProvider),
            },
        }
    }

    /// Wrap a custom provider (tests).
    pub fn with_provider(provider: Box<dyn SearchProvider>) -> Self {
        Self { provider }
    }

    pub fn is_enabled(&self) -> bool {
        self.provider.is_enabled()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Search, degrading any failure to an empty result list. Cancellation
    /// aborts immediately with empty results.
    pub async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Vec<SearchHit> {
        if cancel.is_cancelled() {
            return Vec::new();
        }

        tokio::select! {
            _ = cancel.cancelled() => Vec::new(),
            result = self.provider.search(query, depth, max_results) => match result {
                Ok(hits) => hits,
                Err(e) => {
                    tracing::warn!(provider = self.provider.name(), error = %e,
                        "search degraded to empty results");
                    Vec::new()
                }
            },
        }
    }

    /// Run one search per input query concurrently. Each sub-search succeeds
    /// or degrades independently; the output has one list per input.
    pub async fn search_many(
        &self,
        queries: &[String],
        depth: SearchDepth,
        max_results: u32,
        cancel: &CancellationToken,
    ) -> Vec<Vec<SearchHit>> {
        let futures = queries
            .iter()
            .map(|q| self.search(q, depth, max_results, cancel));
        futures_util::future::join_all(futures).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticProvider {
        hits: Vec<SearchHit>,
    }

    #[async_trait]
    impl SearchProvider for StaticProvider {
        fn name(&self) -> &str {
            "static"
        }

        async fn search(
            &self,
            query: &str,
            _depth: SearchDepth,
            max_results: u32,
        ) -> Result<Vec<SearchHit>, String> {
            if query == "fail" {
                return Err("provider exploded".to_string());
            }
            Ok(self
                .hits
                .iter()
                .take(max_results as usize)
                .cloned()
                .collect())
        }
    }

    fn hit(url: &str, score: f64) -> SearchHit {
        SearchHit {
            title: format!("Title {}", url),
            url: url.to_string(),
            snippet: "snippet".to_string(),
            score,
        }
    }

    #[test]
    fn test_disabled_without_api_key() {
        let service = SearchService::from_api_key(None);
        assert!(!service.is_enabled());

        let service = SearchService::from_api_key(Some(""));
        assert!(!service.is_enabled());
    }

    #[test]
    fn test_enabled_with_api_key() {
        let service = SearchService::from_api_key(Some("tvly-test"));
        assert!(service.is_enabled());
        assert_eq!(service.provider_name(), "Tavily");
    }

    #[test]
    fn test_tavily_response_parsing() {
        let raw = serde_json::json!({
            "results": [
                { "title": "A", "url": "https://a", "content": "aa", "score": 0.9 },
                { "title": "B", "url": "https://b", "content": "bb", "score": 1.7 },
            ]
        });
        let parsed: TavilyResponse = serde_json::from_value(raw).unwrap();
        let hits: Vec<SearchHit> = parsed.results.into_iter().map(SearchHit::from).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].snippet, "aa");
        assert_eq!(hits[1].score, 1.0);
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_empty() {
        let service = SearchService::with_provider(Box::new(StaticProvider {
            hits: vec![hit("https://a", 0.5)],
        }));
        let cancel = CancellationToken::new();
        let results = service
            .search("fail", SearchDepth::Basic, 5, &cancel)
            .await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_search_many_is_independent() {
        let service = SearchService::with_provider(Box::new(StaticProvider {
            hits: vec![hit("https://a", 0.5), hit("https://b", 0.4)],
        }));
        let cancel = CancellationToken::new();
        let queries = vec!["ok".to_string(), "fail".to_string(), "ok too".to_string()];
        let batches = service
            .search_many(&queries, SearchDepth::Advanced, 2, &cancel)
            .await;
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 2);
        assert!(batches[1].is_empty());
        assert_eq!(batches[2].len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_search_returns_empty() {
        let service = SearchService::with_provider(Box::new(StaticProvider {
            hits: vec![hit("https://a", 0.5)],
        }));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results = service.search("ok", SearchDepth::Basic, 5, &cancel).await;
        assert!(results.is_empty());
    }
}
