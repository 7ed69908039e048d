//! OpenAI Model Provider
//!
//! Integration with OpenAI's chat completions API using the async-openai crate,
//! with native function calling.

use crate::agent::function_calling::{build_chat_request, parse_completion};
use crate::agent::model::{
    ChatRequest, GenerationConfig, ModelProvider, ModelResponse, ProviderKind, ProviderMetadata,
};
use anyhow::{anyhow, Result};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;
use tracing::debug;

const DEFAULT_MODEL: &str = "gpt-4.1";

/// OpenAI provider that wraps the async-openai crate
#[derive(Debug, Clone)]
pub struct OpenAIProvider {
    /// The async-openai client
    client: Client<OpenAIConfig>,
    /// Model to use (e.g., "gpt-4.1", "gpt-4.1-mini")
    model: String,
}

impl OpenAIProvider {
    /// Create a new OpenAI provider with the default configuration
    ///
    /// This will use the OPENAI_API_KEY environment variable for authentication
    /// and default to the "gpt-4.1" model.
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a new OpenAI provider with a custom API key
    pub fn with_api_key(api_key: impl Into<String>) -> Self {
        Self::with_config(OpenAIConfig::new().with_api_key(api_key))
    }

    /// Create a new OpenAI provider with a custom configuration
    pub fn with_config(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(
        &self,
        request: &ChatRequest,
        config: &GenerationConfig,
    ) -> Result<ModelResponse> {
        let chat_request = build_chat_request(&self.model, request, config)?;
        debug!(
            "OpenAI request: model={}, messages={}, tools={}",
            self.model,
            request.messages.len(),
            request.tools.len()
        );

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| anyhow!("OpenAI API error: {}", e))?;

        parse_completion(response)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "OpenAI".to_string(),
            supported_models: vec![
                "gpt-4.1".to_string(),
                "gpt-4.1-mini".to_string(),
                "gpt-4o".to_string(),
                "gpt-4o-mini".to_string(),
            ],
            supports_tools: true,
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAI
    }
}
