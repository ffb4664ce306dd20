//! LLM client module
//!
//! Provides completion requests against the configured provider. Everything
//! natural-language in plandeck (intent parsing, explanations, help chat,
//! draft conversations) goes through [`LlmClient::complete`].

use std::sync::Arc;

use tracing::debug;

mod anthropic;
pub mod client;
mod error;
mod types;

pub use anthropic::AnthropicClient;
pub use client::LlmClient;
pub use error::LlmError;
pub use types::{CompletionRequest, CompletionResponse, Message, Role, StopReason, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "anthropic" => {
            debug!("create_client: creating Anthropic client");
            Ok(Arc::new(AnthropicClient::from_config(config)?))
        }
        other => {
            debug!(provider = %other, "create_client: unknown provider");
            Err(LlmError::InvalidResponse(format!(
                "Unknown LLM provider: '{}'. Supported: anthropic",
                other
            )))
        }
    }
}

/// Pull the first JSON object out of a model reply
///
/// Models sometimes wrap JSON in prose or a fenced block; take the span from
/// the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_provider_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".to_string(),
            ..Default::default()
        };
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("carrier-pigeon"));
    }

    #[test]
    #[serial_test::serial]
    fn test_missing_api_key_names_the_variable() {
        let config = LlmConfig {
            api_key_env: "PLANDECK_TEST_MISSING_KEY".to_string(),
            ..Default::default()
        };
        // SAFETY: env mutation is serialized across tests
        unsafe {
            std::env::remove_var("PLANDECK_TEST_MISSING_KEY");
        }
        let err = create_client(&config).err().unwrap();
        assert!(err.to_string().contains("PLANDECK_TEST_MISSING_KEY"));
    }

    #[test]
    #[serial_test::serial]
    fn test_client_created_when_key_present() {
        let config = LlmConfig {
            api_key_env: "PLANDECK_TEST_PRESENT_KEY".to_string(),
            ..Default::default()
        };
        // SAFETY: env mutation is serialized across tests
        unsafe {
            std::env::set_var("PLANDECK_TEST_PRESENT_KEY", "test-key");
        }
        let result = create_client(&config);
        unsafe {
            std::env::remove_var("PLANDECK_TEST_PRESENT_KEY");
        }
        assert!(result.is_ok());
    }

    #[test]
    fn test_extract_json_from_fenced_reply() {
        let reply = "Sure:\n```json\n{\"kind\": \"status\"}\n```";
        assert_eq!(extract_json(reply), Some("{\"kind\": \"status\"}"));
        assert_eq!(extract_json("no json here"), None);
    }
}
