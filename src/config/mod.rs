pub mod app_config;

// Re-export common types for convenience
pub use app_config::{
    AgentConfig, AppConfig, DatabaseConfig, KnowledgeConfig, LoggingConfig, ModelConfig,
    ToolsConfig, UiConfig, WebSearchConfig, CONFIG_FILE_NAME,
};
