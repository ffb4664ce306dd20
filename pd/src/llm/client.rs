//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call carries the full conversation it needs
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request and wait for the whole response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock LLM client for unit tests
    pub struct MockLlmClient {
        responses: Vec<CompletionResponse>,
        call_count: AtomicUsize,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<CompletionResponse>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        /// Mock that answers each call with the next text in order
        pub fn with_texts(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| CompletionResponse::text(*t)).collect())
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        /// Requests received so far
        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            if let Ok(mut seen) = self.requests.lock() {
                seen.push(request);
            }
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            self.responses.get(idx).cloned().ok_or_else(|| {
                debug!("MockLlmClient::complete: no more mock responses");
                LlmError::InvalidResponse("No more mock responses".to_string())
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::llm::Message;

        fn request() -> CompletionRequest {
            CompletionRequest {
                system_prompt: "Test".to_string(),
                messages: vec![Message::user("hello")],
                max_tokens: 1000,
            }
        }

        #[tokio::test]
        async fn test_mock_client_returns_responses() {
            let client = MockLlmClient::with_texts(&["Response 1", "Response 2"]);

            let resp1 = client.complete(request()).await.unwrap();
            assert_eq!(resp1.content, Some("Response 1".to_string()));

            let resp2 = client.complete(request()).await.unwrap();
            assert_eq!(resp2.content, Some("Response 2".to_string()));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            assert!(client.complete(request()).await.is_err());
        }
    }
}
