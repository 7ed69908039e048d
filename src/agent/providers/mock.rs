//! Mock Model Provider
//!
//! A scripted provider for tests and offline runs. Responses are returned in
//! order (cycling when exhausted) and every request is recorded so tests can
//! inspect the context the model would have seen.

use crate::agent::model::{
    ChatRequest, GenerationConfig, ModelProvider, ModelResponse, ProviderKind, ProviderMetadata,
    TokenUsage,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted step
#[derive(Debug, Clone)]
enum Scripted {
    Respond(ModelResponse),
    Fail(String),
}

/// Mock provider that returns predefined responses
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Canned responses to cycle through
    script: Vec<Scripted>,
    /// Current response index
    current_index: Arc<Mutex<usize>>,
    /// Requests received, in order
    requests: Arc<Mutex<Vec<ChatRequest>>>,
    /// Model name to report
    model_name: String,
    /// Artificial latency applied to every completion
    delay: Option<Duration>,
}

impl MockProvider {
    /// Create a new mock provider with a single text response
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_script(vec![Scripted::Respond(ModelResponse::text(response))])
    }

    /// Create a new mock provider with multiple text responses
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self::with_script(
            responses
                .into_iter()
                .map(|r| Scripted::Respond(ModelResponse::text(r)))
                .collect(),
        )
    }

    /// Create a mock provider from fully specified model responses
    pub fn with_model_responses(responses: Vec<ModelResponse>) -> Self {
        Self::with_script(responses.into_iter().map(Scripted::Respond).collect())
    }

    /// Create a provider whose every completion fails
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(vec![Scripted::Fail(message.into())])
    }

    fn with_script(script: Vec<Scripted>) -> Self {
        Self {
            script,
            current_index: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            model_name: "mock-model".to_string(),
            delay: None,
        }
    }

    /// Append a failing step after the scripted responses
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.script.push(Scripted::Fail(message.into()));
        self
    }

    /// Set the model name
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Delay every completion (used to exercise timeouts)
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of completions requested so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// Snapshot of every request received
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Get the next scripted step (cycles through available steps)
    fn next_step(&self) -> Result<Scripted> {
        if self.script.is_empty() {
            return Err(anyhow!("mock provider has no scripted responses"));
        }
        let mut index = self
            .current_index
            .lock()
            .map_err(|_| anyhow!("mock provider state poisoned"))?;
        let step = self.script[*index % self.script.len()].clone();
        *index += 1;
        Ok(step)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new("This is a mock response from the test provider.")
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(
        &self,
        request: &ChatRequest,
        _config: &GenerationConfig,
    ) -> Result<ModelResponse> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_step()? {
            Scripted::Fail(message) => Err(anyhow!(message)),
            Scripted::Respond(mut response) => {
                let prompt_tokens = 10; // Mock values
                let completion_tokens = response.content.split_whitespace().count() as u32;
                response.model = self.model_name.clone();
                if response.usage.is_none() {
                    response.usage = Some(TokenUsage {
                        prompt_tokens,
                        completion_tokens,
                        total_tokens: prompt_tokens + completion_tokens,
                    });
                }
                Ok(response)
            }
        }
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "Mock Provider".to_string(),
            supported_models: vec!["mock-model".to_string()],
            supports_tools: true,
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Mock
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::model::{ChatMessage, ToolCall};
    use serde_json::json;

    fn request(text: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage::user(text)],
            tools: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_mock_provider_complete() {
        let provider = MockProvider::new("Hello, world!");
        let config = GenerationConfig::default();

        let response = provider.complete(&request("hi"), &config).await.unwrap();

        assert_eq!(response.content, "Hello, world!");
        assert_eq!(response.model, "mock-model");
        assert!(response.usage.is_some());
        assert_eq!(response.finish_reason, Some("stop".to_string()));
    }

    #[tokio::test]
    async fn test_mock_provider_multiple_responses() {
        let provider = MockProvider::with_responses(vec![
            "First response".to_string(),
            "Second response".to_string(),
        ]);
        let config = GenerationConfig::default();

        let resp1 = provider.complete(&request("a"), &config).await.unwrap();
        assert_eq!(resp1.content, "First response");

        let resp2 = provider.complete(&request("b"), &config).await.unwrap();
        assert_eq!(resp2.content, "Second response");

        // Should cycle back to first
        let resp3 = provider.complete(&request("c"), &config).await.unwrap();
        assert_eq!(resp3.content, "First response");
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_provider_records_requests() {
        let provider = MockProvider::with_model_responses(vec![ModelResponse::with_tool_calls(
            "",
            vec![ToolCall::new("call_1", "web_search", json!({"query": "rust"}))],
        )]);
        let response = provider
            .complete(&request("busca rust"), &GenerationConfig::default())
            .await
            .unwrap();

        assert_eq!(response.requested_tools().len(), 1);
        let seen = provider.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages[0].content(), "busca rust");
    }

    #[tokio::test]
    async fn test_mock_provider_failure_steps() {
        let provider = MockProvider::new("ok").then_fail("service unavailable");
        let config = GenerationConfig::default();

        assert!(provider.complete(&request("a"), &config).await.is_ok());
        let err = provider.complete(&request("b"), &config).await.unwrap_err();
        assert!(err.to_string().contains("service unavailable"));

        let failing = MockProvider::failing("down");
        assert!(failing.complete(&request("c"), &config).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_custom_model_name() {
        let provider = MockProvider::new("test").with_model_name("custom-model");
        let response = provider
            .complete(&request("prompt"), &GenerationConfig::default())
            .await
            .unwrap();
        assert_eq!(response.model, "custom-model");
        assert_eq!(provider.kind(), ProviderKind::Mock);
    }
}
