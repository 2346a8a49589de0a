//! Deep Research Service - Entrypoint
//!
//! Wires configuration, storage, providers, and the HTTP surface together,
//! then serves until ctrl-c. Shutdown cancels the cache sweeper and drains
//! the listener.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use deep_research_service::services::cache::spawn_sweeper;
use deep_research_service::services::llm::{LlmClient, OpenAiClient};
use deep_research_service::services::search::SearchService;
use deep_research_service::storage::{Database, ResearchStore};
use deep_research_service::utils::error::AppResult;
use deep_research_service::{http, AppConfig, AppState};

#[tokio::main]
async fn main() -> AppResult<()> {
    init_tracing();

    let config = AppConfig::from_env();
    tracing::info!(
        port = config.port,
        database = %config.database_path.display(),
        "starting deep research service"
    );

    if config.openai_api_key.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; research requests will fail");
    }
    if config.tavily_api_key.is_none() {
        tracing::warn!("TAVILY_API_KEY is not set; source discovery will return no results");
    }

    let database = Database::open(&config.database_path)?;
    let store = ResearchStore::new(database);
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(config.openai_api_key.clone()));
    let search = SearchService::from_api_key(config.tavily_api_key.as_deref());

    let port = config.port;
    let state = AppState::new(config, store, llm, search);

    let shutdown = CancellationToken::new();
    let sweeper = spawn_sweeper(state.cache.clone(), shutdown.clone());

    let app = http::router(state);
    let listener = tokio::net::TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
    tracing::info!(port, "listening");

    let shutdown_signal = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_signal.cancel();
    })
    .await?;

    shutdown.cancel();
    let _ = sweeper.await;
    tracing::info!("deep research service stopped");
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
