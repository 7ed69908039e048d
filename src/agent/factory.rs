//! Provider Factory
//!
//! Creates model provider instances based on configuration.

use crate::agent::model::{ModelProvider, ProviderKind};
#[cfg(feature = "lmstudio")]
use crate::agent::providers::LMStudioProvider;
use crate::agent::providers::MockProvider;
#[cfg(feature = "openai")]
use crate::agent::providers::OpenAIProvider;
use crate::config::ModelConfig;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;

/// Create a model provider from configuration
pub fn create_provider(config: &ModelConfig) -> Result<Arc<dyn ModelProvider>> {
    let provider_kind = ProviderKind::from_str(&config.provider)
        .ok_or_else(|| anyhow!("Unknown provider: {}", config.provider))?;

    match provider_kind {
        ProviderKind::Mock => {
            let provider = if let Some(model_name) = &config.model_name {
                MockProvider::default().with_model_name(model_name.clone())
            } else {
                MockProvider::default()
            };
            Ok(Arc::new(provider))
        }

        #[cfg(feature = "openai")]
        ProviderKind::OpenAI => {
            let api_key = if let Some(source) = &config.api_key_source {
                resolve_api_key(source)?
            } else {
                // Default to OPENAI_API_KEY environment variable
                load_api_key_from_env("OPENAI_API_KEY")?
            };

            let mut openai_config =
                async_openai::config::OpenAIConfig::new().with_api_key(api_key);
            if let Some(endpoint) = &config.endpoint {
                openai_config = openai_config.with_api_base(endpoint.clone());
            }

            let mut provider = OpenAIProvider::with_config(openai_config);
            if let Some(model_name) = &config.model_name {
                provider = provider.with_model(model_name.clone());
            }

            Ok(Arc::new(provider))
        }

        #[cfg(feature = "lmstudio")]
        ProviderKind::LMStudio => {
            let model_name = config
                .model_name
                .as_ref()
                .ok_or_else(|| anyhow!("LM Studio provider requires a model_name"))?;

            let provider = match config
                .endpoint
                .clone()
                .or_else(|| std::env::var("LMSTUDIO_ENDPOINT").ok())
            {
                Some(endpoint) => LMStudioProvider::with_endpoint(endpoint, model_name),
                None => LMStudioProvider::new(model_name),
            };

            Ok(Arc::new(provider))
        }
    }
}

/// Resolve API key from a source string
///
/// Supports the following formats:
/// - `env:VAR_NAME` - Load from environment variable
/// - `file:PATH` - Load from file
/// - Any other string - Use as-is (direct API key)
pub fn resolve_api_key(source: &str) -> Result<String> {
    let key = if let Some(env_var) = source.strip_prefix("env:") {
        load_api_key_from_env(env_var)?
    } else if let Some(path) = source.strip_prefix("file:") {
        load_api_key_from_file(path)?
    } else {
        source.to_string()
    };

    if key.trim().is_empty() {
        return Err(anyhow!("API key from '{}' is empty", source));
    }
    Ok(key)
}

/// Load API key from environment variable
pub fn load_api_key_from_env(env_var: &str) -> Result<String> {
    std::env::var(env_var).context(format!("Environment variable {} not set", env_var))
}

/// Load API key from file
pub fn load_api_key_from_file(path: &str) -> Result<String> {
    // Handle tilde expansion manually
    let expanded_path = if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            std::path::PathBuf::from(home).join(stripped)
        } else {
            std::path::PathBuf::from(path)
        }
    } else {
        std::path::PathBuf::from(path)
    };

    std::fs::read_to_string(&expanded_path)
        .context(format!("Failed to read API key from file: {}", path))
        .map(|s| s.trim().to_string())
}
