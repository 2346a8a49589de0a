//! OpenAI Chat Client
//!
//! Chat-completions implementation of the `LlmClient` trait. Model selection
//! is centralised here: quick and standard research use the economy model,
//! deep research the high-capability model. Each attempt runs under the
//! mode's timeout; transient failures retry with exponential backoff.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::models::{ResearchMode, TokenUsage};

use super::types::{parse_http_error, ChatRequest, ChatResponse, LlmClient, LlmError, LlmResult};

/// Default OpenAI API endpoint
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const ECONOMY_MODEL: &str = "gpt-4o-mini";
const DEEP_MODEL: &str = "gpt-4o";

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 8000;

/// Model identifier for a research mode.
pub fn model_for_mode(mode: ResearchMode) -> &'static str {
    match mode {
        ResearchMode::Quick | ResearchMode::Standard => ECONOMY_MODEL,
        ResearchMode::Deep => DEEP_MODEL,
    }
}

/// Delay before the next attempt, after `failed_attempts` have failed.
fn backoff_delay(failed_attempts: u32) -> Duration {
    let millis = BACKOFF_BASE_MS
        .saturating_mul(1u64 << (failed_attempts.saturating_sub(1)).min(10))
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(millis)
}

/// OpenAI chat-completions client
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Point the client at a different endpoint (tests, compatible gateways).
    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("deep-research-service/0.1")
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            api_key,
            base_url: base_url.into(),
        }
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model_for_mode(request.mode),
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
        });
        if request.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }
        body
    }

    async fn attempt(
        &self,
        api_key: &str,
        body: &serde_json::Value,
        attempt_timeout: Duration,
        cancel: &CancellationToken,
    ) -> LlmResult<ChatResponse> {
        let request = async {
            let response = self
                .client
                .post(&self.base_url)
                .bearer_auth(api_key)
                .json(body)
                .send()
                .await
                .map_err(|e| LlmError::NetworkError {
                    message: e.to_string(),
                })?;

            let status = response.status().as_u16();
            let body_text = response.text().await.map_err(|e| LlmError::NetworkError {
                message: e.to_string(),
            })?;

            if status != 200 {
                return Err(parse_http_error(status, &body_text));
            }

            let parsed: ChatCompletionResponse =
                serde_json::from_str(&body_text).map_err(|e| LlmError::ParseError {
                    message: format!("failed to parse response: {}", e),
                })?;
            parse_chat_response(parsed)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            result = tokio::time::timeout(attempt_timeout, request) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(LlmError::Timeout {
                    seconds: attempt_timeout.as_secs(),
                }),
            },
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(
        &self,
        request: ChatRequest,
        cancel: &CancellationToken,
    ) -> LlmResult<ChatResponse> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }

        let attempt_timeout = request.mode.llm_timeout();
        let body = self.build_request_body(&request);

        let mut last_error = LlmError::NetworkError {
            message: "no attempts made".to_string(),
        };
        for attempt in 1..=MAX_ATTEMPTS {
            if attempt > 1 {
                let delay = backoff_delay(attempt - 1);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.attempt(api_key, &body, attempt_timeout, cancel).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "LLM attempt failed");
                    last_error = e;
                }
            }
        }
        Err(last_error)
    }
}

fn parse_chat_response(response: ChatCompletionResponse) -> LlmResult<ChatResponse> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| LlmError::ParseError {
            message: "response contained no message content".to_string(),
        })?;

    let tokens = response
        .usage
        .map(|u| TokenUsage {
            input: u.prompt_tokens,
            output: u.completion_tokens,
            total: u.total_tokens,
        })
        .unwrap_or_default();

    Ok(ChatResponse { content, tokens })
}

/// OpenAI API response format
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<ResponseUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_mapping() {
        assert_eq!(model_for_mode(ResearchMode::Quick), ECONOMY_MODEL);
        assert_eq!(model_for_mode(ResearchMode::Standard), ECONOMY_MODEL);
        assert_eq!(model_for_mode(ResearchMode::Deep), DEEP_MODEL);
    }

    #[test]
    fn test_backoff_schedule() {
        assert_eq!(backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(backoff_delay(3), Duration::from_millis(4000));
        assert_eq!(backoff_delay(4), Duration::from_millis(8000));
        assert_eq!(backoff_delay(10), Duration::from_millis(8000));
    }

    #[test]
    fn test_request_body_json_mode() {
        let client = OpenAiClient::new(Some("sk-test".into()));
        let body = client.build_request_body(&ChatRequest {
            system: "sys".into(),
            user: "usr".into(),
            mode: ResearchMode::Deep,
            max_tokens: 1000,
            temperature: 0.3,
            json_mode: true,
        });
        assert_eq!(body["model"], DEEP_MODEL);
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "usr");
    }

    #[test]
    fn test_request_body_plain_mode() {
        let client = OpenAiClient::new(Some("sk-test".into()));
        let body = client.build_request_body(&ChatRequest {
            system: "sys".into(),
            user: "usr".into(),
            mode: ResearchMode::Quick,
            max_tokens: 1500,
            temperature: 0.5,
            json_mode: false,
        });
        assert_eq!(body["model"], ECONOMY_MODEL);
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_parse_chat_response() {
        let raw = serde_json::json!({
            "choices": [{ "message": { "content": "HTTP is..." } }],
            "usage": { "prompt_tokens": 40, "completion_tokens": 80, "total_tokens": 120 }
        });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let response = parse_chat_response(parsed).unwrap();
        assert_eq!(response.content, "HTTP is...");
        assert_eq!(response.tokens.total, 120);
        assert_eq!(response.tokens.input, 40);
    }

    #[test]
    fn test_parse_chat_response_without_content() {
        let raw = serde_json::json!({ "choices": [], "usage": null });
        let parsed: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            parse_chat_response(parsed),
            Err(LlmError::ParseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_chat_without_api_key() {
        let client = OpenAiClient::new(None);
        let result = client
            .chat(
                ChatRequest {
                    system: "s".into(),
                    user: "u".into(),
                    mode: ResearchMode::Quick,
                    max_tokens: 10,
                    temperature: 0.0,
                    json_mode: false,
                },
                &CancellationToken::new(),
            )
            .await;
        assert_eq!(result.unwrap_err(), LlmError::MissingApiKey);
    }

    #[tokio::test]
    async fn test_chat_honours_pre_cancelled_token() {
        let client = OpenAiClient::new(Some("sk-test".into()));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = client
            .chat(
                ChatRequest {
                    system: "s".into(),
                    user: "u".into(),
                    mode: ResearchMode::Quick,
                    max_tokens: 10,
                    temperature: 0.0,
                    json_mode: false,
                },
                &cancel,
            )
            .await;
        assert_eq!(result.unwrap_err(), LlmError::Cancelled);
    }
}
