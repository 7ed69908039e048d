//! Agent Builder
//!
//! Provides a fluent API for constructing agent instances from configuration
//! or from explicitly supplied parts (tests inject mocks this way).

use crate::agent::core::AgentCore;
use crate::agent::factory::create_provider;
use crate::agent::model::{GenerationConfig, ModelProvider};
use crate::agent::prompt::default_system_prompt;
use crate::agent::resolver::TurnResolver;
use crate::config::AppConfig;
use crate::persistence::{HistoryStore, Persistence};
use crate::session::SessionId;
use crate::tools::ToolRegistry;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Builder for constructing AgentCore instances
#[derive(Default)]
pub struct AgentBuilder {
    config: Option<AppConfig>,
    provider: Option<Arc<dyn ModelProvider>>,
    store: Option<Arc<dyn HistoryStore>>,
    tool_registry: Option<Arc<ToolRegistry>>,
    session_id: Option<SessionId>,
    system_prompt: Option<String>,
}

impl AgentBuilder {
    /// Create a new agent builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application configuration (used to derive defaults)
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the model provider
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the history store
    pub fn with_store(mut self, store: Arc<dyn HistoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Use a DuckDB persistence layer as the history store
    pub fn with_persistence(self, persistence: Persistence) -> Self {
        self.with_store(Arc::new(persistence))
    }

    /// Set the tool registry
    pub fn with_tool_registry(mut self, tool_registry: Arc<ToolRegistry>) -> Self {
        self.tool_registry = Some(tool_registry);
        self
    }

    /// Set the session ID (a new one is minted otherwise)
    pub fn with_session_id(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    /// Override the system instruction
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Build the agent, validating all required fields
    pub fn build(self) -> Result<AgentCore> {
        let config = self.config.unwrap_or_default();

        let store: Arc<dyn HistoryStore> = match self.store {
            Some(store) => store,
            None => Arc::new(
                Persistence::new(&config.database.path)
                    .context("Failed to create persistence layer")?,
            ),
        };

        let tool_registry = match self.tool_registry {
            Some(registry) => registry,
            None => {
                let registry = ToolRegistry::with_builtin_tools(&config)
                    .context("Failed to create tool registry")?;
                info!(
                    "Created tool registry with {} builtin tools",
                    registry.len()
                );
                Arc::new(registry)
            }
        };

        let provider = match self.provider {
            Some(provider) => provider,
            None => {
                create_provider(&config.model).context("Failed to create provider from config")?
            }
        };

        let system_prompt = self
            .system_prompt
            .or_else(|| config.agent.system_prompt.clone())
            .unwrap_or_else(|| default_system_prompt(&tool_registry.list()));
        if system_prompt.trim().is_empty() {
            return Err(anyhow!("System prompt cannot be empty"));
        }

        let generation = GenerationConfig {
            temperature: Some(config.model.temperature),
            max_tokens: config.model.max_tokens,
            top_p: None,
        };

        let resolver = TurnResolver::new(provider, tool_registry, system_prompt)
            .with_generation_config(generation)
            .with_max_tool_rounds(config.agent.max_tool_rounds)
            .with_model_timeout(Duration::from_secs(config.agent.model_timeout_secs))
            .with_tool_timeout(Duration::from_secs(config.agent.tool_timeout_secs));

        let session_id = self.session_id.unwrap_or_else(SessionId::generate);

        Ok(AgentCore::new(
            resolver,
            store,
            session_id,
            config.agent.name.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::providers::MockProvider;
    use crate::test_utils::create_test_db;

    #[test]
    fn test_builder_requires_nothing_beyond_config() {
        let mut config = AppConfig::default();
        config.tools.enabled.clear();
        let (persistence, _dir) = create_test_db();

        let agent = AgentBuilder::new()
            .with_config(config)
            .with_persistence(persistence)
            .build()
            .unwrap();

        assert_eq!(agent.agent_name(), "DataBot");
        assert!(agent.tool_registry().is_empty());
        assert!(agent.resolver().system_prompt().starts_with("Eres DataBot"));
    }

    #[test]
    fn test_builder_uses_supplied_parts() {
        let (persistence, _dir) = create_test_db();
        let session = SessionId::generate();

        let agent = AgentBuilder::new()
            .with_provider(Arc::new(MockProvider::new("hola")))
            .with_tool_registry(Arc::new(ToolRegistry::new()))
            .with_persistence(persistence)
            .with_session_id(session)
            .with_system_prompt("Eres un bot de pruebas")
            .build()
            .unwrap();

        assert_eq!(agent.session_id(), &session);
        assert_eq!(agent.resolver().system_prompt(), "Eres un bot de pruebas");
    }

    #[test]
    fn test_builder_rejects_blank_prompt() {
        let (persistence, _dir) = create_test_db();
        let result = AgentBuilder::new()
            .with_tool_registry(Arc::new(ToolRegistry::new()))
            .with_persistence(persistence)
            .with_system_prompt("   ")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_applies_round_cap_from_config() {
        let mut config = AppConfig::default();
        config.tools.enabled.clear();
        config.agent.max_tool_rounds = 3;
        let (persistence, _dir) = create_test_db();

        let agent = AgentBuilder::new()
            .with_config(config)
            .with_persistence(persistence)
            .build()
            .unwrap();
        assert_eq!(agent.resolver().max_tool_rounds(), 3);
    }
}
