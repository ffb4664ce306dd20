//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(e) => !e.is_timeout(),
            LlmError::InvalidResponse(_) | LlmError::MissingApiKey(_) | LlmError::Json(_) => false,
        }
    }

    /// True when the HTTP client gave up waiting
    pub fn is_timeout(&self) -> bool {
        matches!(self, LlmError::Network(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(
            LlmError::RateLimited {
                retry_after: Duration::from_secs(60)
            }
            .is_retryable()
        );

        assert!(
            LlmError::ApiError {
                status: 503,
                message: "Overloaded".to_string()
            }
            .is_retryable()
        );

        assert!(
            !LlmError::ApiError {
                status: 400,
                message: "Bad request".to_string()
            }
            .is_retryable()
        );

        assert!(!LlmError::InvalidResponse("Bad JSON".to_string()).is_retryable());
        assert!(!LlmError::MissingApiKey("ANTHROPIC_API_KEY".to_string()).is_retryable());
    }

    #[test]
    fn test_missing_key_message_names_variable() {
        let err = LlmError::MissingApiKey("MY_KEY".to_string());
        assert!(err.to_string().contains("MY_KEY"));
        assert!(!err.is_timeout());
    }
}
