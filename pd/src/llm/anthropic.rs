//! Anthropic Claude API client implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::{CompletionRequest, CompletionResponse, LlmClient, LlmError, Message, StopReason, TokenUsage};
use crate::config::LlmConfig;

/// Maximum number of retries for transient errors
const MAX_RETRIES: u32 = 2;

/// Initial backoff delay for retries
const INITIAL_BACKOFF_MS: u64 = 500;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 500 | 502 | 503 | 504 | 529)
}

/// Anthropic Claude API client
pub struct AnthropicClient {
    model: String,
    api_key: String,
    base_url: String,
    http: Client,
    max_tokens: u32,
}

impl AnthropicClient {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config. The
    /// HTTP timeout comes from `llm.timeout-ms`.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        debug!(model = %config.model, "AnthropicClient::from_config: called");
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(config.api_key_env.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(LlmError::Network)?;

        Ok(Self {
            model: config.model.clone(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
            max_tokens: config.max_tokens,
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        debug!(%self.model, %request.max_tokens, "AnthropicClient::build_request_body: called");
        serde_json::json!({
            "model": self.model,
            "max_tokens": request.max_tokens.min(self.max_tokens),
            "system": request.system_prompt,
            "messages": request.messages.iter().map(convert_message).collect::<Vec<_>>(),
        })
    }

    /// Parse the Anthropic API response
    fn parse_response(&self, api_response: AnthropicResponse) -> CompletionResponse {
        debug!(?api_response.stop_reason, "AnthropicClient::parse_response: called");
        let text: String = api_response
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicContentBlock::Text { text } => Some(text),
                AnthropicContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        CompletionResponse {
            content: if text.is_empty() { None } else { Some(text) },
            stop_reason: StopReason::from_anthropic(&api_response.stop_reason),
            usage: TokenUsage {
                input_tokens: api_response.usage.input_tokens,
                output_tokens: api_response.usage.output_tokens,
            },
        }
    }
}

fn convert_message(msg: &Message) -> serde_json::Value {
    serde_json::json!({
        "role": msg.role,
        "content": msg.content,
    })
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        debug!(%self.model, %request.max_tokens, "AnthropicClient::complete: called");
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_request_body(&request);

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = INITIAL_BACKOFF_MS * 2u64.pow(attempt - 1);
                warn!(attempt, backoff_ms = backoff, "AnthropicClient::complete: retrying after transient error");
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            let response = match self
                .http
                .post(url.clone())
                .header("x-api-key", self.api_key.clone())
                .header("anthropic-version", "2023-06-01")
                .header("content-type", "application/json")
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) if e.is_timeout() => {
                    debug!(attempt, "AnthropicClient::complete: timed out");
                    return Err(LlmError::Network(e));
                }
                Err(e) => {
                    debug!(attempt, error = %e, "AnthropicClient::complete: network error");
                    last_error = Some(LlmError::Network(e));
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status == 429 {
                debug!("AnthropicClient::complete: rate limited (429)");
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.parse::<u64>().ok())
                    .unwrap_or(60);

                return Err(LlmError::RateLimited {
                    retry_after: Duration::from_secs(retry_after),
                });
            }

            if is_retryable_status(status) && attempt < MAX_RETRIES {
                let text = response.text().await.unwrap_or_default();
                debug!(attempt, status, "AnthropicClient::complete: retryable error");
                last_error = Some(LlmError::ApiError { status, message: text });
                continue;
            }

            if !response.status().is_success() {
                debug!(%status, "AnthropicClient::complete: API error");
                let text = response.text().await.unwrap_or_default();
                return Err(LlmError::ApiError { status, message: text });
            }

            debug!("AnthropicClient::complete: success");
            let api_response: AnthropicResponse = response.json().await?;
            return Ok(self.parse_response(api_response));
        }

        Err(last_error.unwrap_or_else(|| LlmError::InvalidResponse("Max retries exceeded".to_string())))
    }
}

// Anthropic API response types

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
    stop_reason: String,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(max_tokens: u32) -> AnthropicClient {
        AnthropicClient {
            model: "claude-sonnet-4".to_string(),
            api_key: "test-key".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            http: Client::new(),
            max_tokens,
        }
    }

    #[test]
    fn test_build_request_body_basic() {
        let request = CompletionRequest {
            system_prompt: "You are helpful".to_string(),
            messages: vec![Message::user("Hello"), Message::assistant("Hi")],
            max_tokens: 1000,
        };

        let body = client(8192).build_request_body(&request);

        assert_eq!(body["model"], "claude-sonnet-4");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["system"], "You are helpful");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][0]["content"], "Hello");
    }

    #[test]
    fn test_max_tokens_capped() {
        let request = CompletionRequest {
            system_prompt: "Test".to_string(),
            messages: vec![],
            max_tokens: 5000,
        };

        let body = client(1000).build_request_body(&request);
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn test_parse_response_joins_text_blocks() {
        let raw = r#"{
            "content": [
                {"type": "text", "text": "Hello "},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "world"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 3}
        }"#;
        let api: AnthropicResponse = serde_json::from_str(raw).unwrap();
        let response = client(1000).parse_response(api);
        assert_eq!(response.content.as_deref(), Some("Hello world"));
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn test_from_config_requires_key() {
        let config = LlmConfig {
            api_key_env: "PLANDECK_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            AnthropicClient::from_config(&config),
            Err(LlmError::MissingApiKey(_))
        ));
    }
}
