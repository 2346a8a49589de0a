//! Service Configuration
//!
//! Environment-driven configuration with sensible defaults. Startup proceeds
//! without provider API keys; the corresponding adapters degrade (LLM calls
//! fail, search returns empty results).

use std::path::PathBuf;

/// Default HTTP port
const DEFAULT_PORT: u16 = 3001;

/// Runtime environment, controls diagnostic verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

/// Service configuration loaded from the environment
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// HTTP listen port (`PORT`, default 3001)
    pub port: u16,
    /// SQLite database location (`DATABASE_PATH`; `:memory:` for ephemeral)
    pub database_path: PathBuf,
    /// OpenAI API key (`OPENAI_API_KEY`); absent → LLM calls fail
    pub openai_api_key: Option<String>,
    /// Tavily API key (`TAVILY_API_KEY`); absent → search always empty
    pub tavily_api_key: Option<String>,
    /// Runtime environment (`APP_ENV`, default development)
    pub environment: Environment,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let database_path = std::env::var("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_database_path());

        let environment = match std::env::var("APP_ENV").as_deref() {
            Ok("production") => Environment::Production,
            _ => Environment::Development,
        };

        Self {
            port,
            database_path,
            openai_api_key: non_empty_env("OPENAI_API_KEY"),
            tavily_api_key: non_empty_env("TAVILY_API_KEY"),
            environment,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_path: PathBuf::from(":memory:"),
            openai_api_key: None,
            tavily_api_key: None,
            environment: Environment::Development,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn default_database_path() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("deep-research").join("research.db");
    }
    std::env::temp_dir().join("deep-research").join("research.db")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.is_development());
        assert!(config.openai_api_key.is_none());
    }

    #[test]
    fn test_default_database_path_is_absolute() {
        assert!(default_database_path().is_absolute());
    }
}
