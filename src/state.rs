//! Process-Wide State
//!
//! Everything a request handler needs, behind cheap clones: configuration,
//! the research store, the result cache, the rate limiter, the deep-job
//! registry, and the orchestrator.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::http::rate_limit::RateLimiter;
use crate::services::cache::ResultCache;
use crate::services::llm::LlmClient;
use crate::services::orchestrator::{DeepJobs, Orchestrator};
use crate::services::search::SearchService;
use crate::storage::ResearchStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<ResearchStore>,
    pub cache: Arc<ResultCache>,
    pub limiter: Arc<RateLimiter>,
    pub jobs: Arc<DeepJobs>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Assemble the process state from its collaborators.
    pub fn new(
        config: AppConfig,
        store: ResearchStore,
        llm: Arc<dyn LlmClient>,
        search: SearchService,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(store);
        let cache = Arc::new(ResultCache::new());
        let orchestrator = Arc::new(Orchestrator::new(
            store.clone(),
            llm,
            Arc::new(search),
            cache.clone(),
            config.is_development(),
        ));
        Self {
            config,
            store,
            cache,
            limiter: Arc::new(RateLimiter::new()),
            jobs: Arc::new(DeepJobs::new()),
            orchestrator,
        }
    }
}
