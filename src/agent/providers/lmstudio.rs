//! LM Studio Model Provider
//!
//! Integrates with the LM Studio local server which exposes an OpenAI-compatible API.
//! This allows running the assistant against a locally hosted model while keeping
//! native function calling.

use crate::agent::function_calling::{build_chat_request, parse_completion};
use crate::agent::model::{
    ChatRequest, GenerationConfig, ModelProvider, ModelResponse, ProviderKind, ProviderMetadata,
};
use anyhow::{anyhow, Result};
use async_openai::{config::OpenAIConfig, Client};
use async_trait::async_trait;

/// Default LM Studio server address
pub const DEFAULT_ENDPOINT: &str = "http://localhost:1234/v1";

/// LM Studio provider implemented through the OpenAI-compatible API surface.
#[derive(Debug, Clone)]
pub struct LMStudioProvider {
    /// Async OpenAI client configured for the LM Studio endpoint.
    client: Client<OpenAIConfig>,
    /// Model identifier (as configured within LM Studio).
    model: String,
    api_base: String,
}

impl LMStudioProvider {
    /// Create a provider pointing at the default LM Studio endpoint.
    pub fn new(model: impl Into<String>) -> Self {
        Self::with_endpoint(DEFAULT_ENDPOINT, model)
    }

    /// Create a provider with a custom HTTP endpoint (e.g., remote LM Studio host).
    pub fn with_endpoint(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let endpoint_str = endpoint.into();
        let trimmed = endpoint_str.trim_end_matches('/');
        let api_base = if trimmed.ends_with("/v1") {
            trimmed.to_string()
        } else {
            format!("{}/v1", trimmed)
        };

        let config = OpenAIConfig::new()
            .with_api_base(api_base.clone())
            .with_api_key("lm-studio");

        Self {
            client: Client::with_config(config),
            model: model.into(),
            api_base,
        }
    }

    /// Override the model identifier for future requests.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

#[async_trait]
impl ModelProvider for LMStudioProvider {
    async fn complete(
        &self,
        request: &ChatRequest,
        config: &GenerationConfig,
    ) -> Result<ModelResponse> {
        let chat_request = build_chat_request(&self.model, request, config)?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| anyhow!("LM Studio API error: {}", e))?;

        parse_completion(response)
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "LM Studio".to_string(),
            supported_models: vec![
                "lmstudio-community/Llama-3.2-3B-Instruct".to_string(),
                "lmstudio-community/Qwen2.5-7B-Instruct".to_string(),
            ],
            supports_tools: true,
        }
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::LMStudio
    }
}
