//! Application-level configuration
//!
//! Defines the top-level configuration: history database, model settings,
//! resolution limits, capability backends, logging and shell preferences.
//! It is built once at process start and passed by reference afterwards.

use crate::agent::factory::resolve_api_key;
use crate::error::AgentError;
use crate::tools::BuiltinTool;
use anyhow::{Context, Result};
use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Embedded default configuration file
const DEFAULT_CONFIG: &str = include_str!("../../databot.config.toml");

/// Configuration file name
pub const CONFIG_FILE_NAME: &str = "databot.config.toml";

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// History database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Model provider configuration
    #[serde(default)]
    pub model: ModelConfig,
    /// Resolution loop settings
    #[serde(default)]
    pub agent: AgentConfig,
    /// Knowledge base backend
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    /// Web search backend
    #[serde(default)]
    pub web_search: WebSearchConfig,
    /// Capabilities offered to the model
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
    /// UI configuration
    #[serde(default)]
    pub ui: UiConfig,
}

impl AppConfig {
    /// Load configuration from the usual locations, falling back to the embedded default
    pub fn load() -> Result<Self> {
        // Try to load from databot.config.toml in current directory
        if let Ok(content) = std::fs::read_to_string(CONFIG_FILE_NAME) {
            return toml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", CONFIG_FILE_NAME, e));
        }

        // Try to load from ~/.databot/databot.config.toml
        if let Some(base_dirs) = BaseDirs::new() {
            let home_config = base_dirs.home_dir().join(".databot").join(CONFIG_FILE_NAME);
            if let Ok(content) = std::fs::read_to_string(&home_config) {
                return toml::from_str(&content).map_err(|e| {
                    anyhow::anyhow!("Failed to parse {}: {}", home_config.display(), e)
                });
            }
        }

        // Try to load from environment variable CONFIG_PATH
        if let Ok(config_path) = std::env::var("CONFIG_PATH") {
            if let Ok(content) = std::fs::read_to_string(&config_path) {
                return toml::from_str(&content)
                    .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e));
            }
        }

        // No config file found - create one from embedded default
        eprintln!(
            "No configuration file found. Creating {} with default settings...",
            CONFIG_FILE_NAME
        );
        if let Err(e) = std::fs::write(CONFIG_FILE_NAME, DEFAULT_CONFIG) {
            eprintln!("Warning: Could not create {}: {}", CONFIG_FILE_NAME, e);
            eprintln!("Continuing with default configuration in memory.");
        }

        Self::embedded_default()
    }

    /// Parse the configuration shipped inside the binary
    pub fn embedded_default() -> Result<Self> {
        toml::from_str(DEFAULT_CONFIG)
            .map_err(|e| anyhow::anyhow!("Failed to parse embedded default config: {}", e))
    }

    /// Load configuration from a specific file path
    /// If the file doesn't exist, creates it with default settings
    pub fn load_from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                eprintln!(
                    "Configuration file not found at {}. Creating with default settings...",
                    path.display()
                );

                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .context(format!("Failed to create directory {}", parent.display()))?;
                    }
                }

                std::fs::write(path, DEFAULT_CONFIG).context(format!(
                    "Failed to create config file at {}",
                    path.display()
                ))?;

                Self::embedded_default()
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            )),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.model.provider.is_empty() {
            return Err(anyhow::anyhow!("Model provider cannot be empty"));
        }
        // Known provider names, independent of compile-time feature flags
        {
            let p = self.model.provider.to_lowercase();
            let known = ["mock", "openai", "lmstudio"];
            if !known.contains(&p.as_str()) {
                return Err(anyhow::anyhow!(
                    "Invalid model provider: {}",
                    self.model.provider
                ));
            }
        }

        if self.model.temperature < 0.0 || self.model.temperature > 2.0 {
            return Err(anyhow::anyhow!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.model.temperature
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => return Err(anyhow::anyhow!("Invalid log level: {}", self.logging.level)),
        }

        if self.agent.max_tool_rounds == 0 {
            return Err(anyhow::anyhow!("agent.max_tool_rounds must be at least 1"));
        }

        if self.agent.model_timeout_secs == 0 {
            return Err(anyhow::anyhow!("agent.model_timeout_secs must be at least 1"));
        }
        if self.agent.tool_timeout_secs == 0 {
            return Err(anyhow::anyhow!("agent.tool_timeout_secs must be at least 1"));
        }

        for name in &self.tools.enabled {
            if BuiltinTool::from_str(name).is_none() {
                return Err(anyhow::anyhow!("Unknown tool in tools.enabled: {}", name));
            }
        }

        Ok(())
    }

    /// Fail fast when credentials the selected components need are missing
    pub fn require_runtime_credentials(&self) -> Result<(), AgentError> {
        let mut missing = Vec::new();

        if self.model.provider.eq_ignore_ascii_case("openai") {
            let source = self
                .model
                .api_key_source
                .as_deref()
                .unwrap_or("env:OPENAI_API_KEY");
            if resolve_api_key(source).is_err() {
                missing.push(format!("model API key ({})", source));
            }
        }

        if self.tools.is_enabled(BuiltinTool::KnowledgeBase) {
            if self
                .knowledge
                .url
                .as_deref()
                .map_or(true, |url| url.trim().is_empty())
            {
                missing.push("knowledge.url (SUPABASE_URL)".to_string());
            }
            if resolve_api_key(&self.knowledge.api_key_source).is_err() {
                missing.push(format!(
                    "knowledge base key ({})",
                    self.knowledge.api_key_source
                ));
            }
            let embeddings_source = self
                .knowledge
                .embeddings_api_key_source
                .as_deref()
                .unwrap_or("env:OPENAI_API_KEY");
            if resolve_api_key(embeddings_source).is_err() {
                missing.push(format!("embeddings API key ({})", embeddings_source));
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AgentError::Configuration(format!(
                "missing required settings: {}",
                missing.join(", ")
            )))
        }
    }

    /// Apply environment variable overrides to the configuration
    pub fn apply_env_overrides(&mut self) {
        // Helper: prefer AGENT_* over DATABOT_* if both present
        fn first(a: &str, b: &str) -> Option<String> {
            std::env::var(a).ok().or_else(|| std::env::var(b).ok())
        }

        if let Some(provider) = first("AGENT_MODEL_PROVIDER", "DATABOT_PROVIDER") {
            self.model.provider = provider;
        }
        if let Some(model_name) = first("AGENT_MODEL_NAME", "DATABOT_MODEL") {
            self.model.model_name = Some(model_name);
        }
        if let Some(api_key_source) = first("AGENT_API_KEY_SOURCE", "DATABOT_API_KEY_SOURCE") {
            self.model.api_key_source = Some(api_key_source);
        }
        if let Some(temp_str) = first("AGENT_MODEL_TEMPERATURE", "DATABOT_TEMPERATURE") {
            if let Ok(temp) = temp_str.parse::<f32>() {
                self.model.temperature = temp;
            }
        }
        if let Some(level) = first("AGENT_LOG_LEVEL", "DATABOT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(db_path) = first("AGENT_DB_PATH", "DATABOT_DB_PATH") {
            self.database.path = PathBuf::from(db_path);
        }
        if let Some(rounds) = first("AGENT_MAX_TOOL_ROUNDS", "DATABOT_MAX_TOOL_ROUNDS") {
            if let Ok(rounds) = rounds.parse::<usize>() {
                self.agent.max_tool_rounds = rounds;
            }
        }
        if let Some(tools) = first("AGENT_TOOLS", "DATABOT_TOOLS") {
            self.tools.enabled = tools
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(url) = first("SUPABASE_URL", "DATABOT_KNOWLEDGE_URL") {
            self.knowledge.url = Some(url);
        }
    }

    /// Get a summary of the configuration
    pub fn summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str("Configuration loaded:\n");
        summary.push_str(&format!("Database: {}\n", self.database.path.display()));
        summary.push_str(&format!("Model Provider: {}\n", self.model.provider));
        if let Some(model) = &self.model.model_name {
            summary.push_str(&format!("Model Name: {}\n", model));
        }
        summary.push_str(&format!("Temperature: {}\n", self.model.temperature));
        summary.push_str(&format!("Tool Rounds: {}\n", self.agent.max_tool_rounds));
        if self.tools.enabled.is_empty() {
            summary.push_str("Tools: (none)\n");
        } else {
            summary.push_str(&format!("Tools: {}\n", self.tools.enabled.join(", ")));
        }
        summary.push_str(&format!("Logging Level: {}\n", self.logging.level));
        summary
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("databot.duckdb"),
        }
    }
}

/// Model provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider name ("openai", "lmstudio", "mock")
    pub provider: String,
    /// Model name to use (e.g., "gpt-4.1")
    #[serde(default)]
    pub model_name: Option<String>,
    /// API key source (`env:VAR`, `file:PATH`, or the key itself)
    #[serde(default)]
    pub api_key_source: Option<String>,
    /// Custom endpoint for OpenAI-compatible servers
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Default temperature for model completions (0.0 to 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum completion tokens
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model_name: None,
            api_key_source: None,
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// Resolution loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name used in the shell and tool telemetry
    #[serde(default = "default_agent_name")]
    pub name: String,
    /// System instruction; the built-in DataBot prompt when unset
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Capability rounds allowed per cycle (1 = a single follow-up completion)
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    /// Timeout for each model completion, in seconds
    #[serde(default = "default_model_timeout")]
    pub model_timeout_secs: u64,
    /// Timeout for each capability invocation, in seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_agent_name() -> String {
    "DataBot".to_string()
}

fn default_max_tool_rounds() -> usize {
    1
}

fn default_model_timeout() -> u64 {
    60
}

fn default_tool_timeout() -> u64 {
    30
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            system_prompt: None,
            max_tool_rounds: default_max_tool_rounds(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

/// Supabase vector store settings for the knowledge base capability
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeConfig {
    /// Project URL, e.g. https://xyz.supabase.co
    #[serde(default)]
    pub url: Option<String>,
    /// Source of the service key
    #[serde(default = "default_knowledge_key_source")]
    pub api_key_source: String,
    /// RPC function performing the similarity match
    #[serde(default = "default_match_function")]
    pub match_function: String,
    /// Passages returned per lookup
    #[serde(default = "default_match_count")]
    pub match_count: usize,
    /// Embeddings model the index was built with
    #[serde(default = "default_embeddings_model")]
    pub embeddings_model: String,
    /// Source of the embeddings API key (defaults to OPENAI_API_KEY)
    #[serde(default)]
    pub embeddings_api_key_source: Option<String>,
    #[serde(default = "default_knowledge_timeout")]
    pub timeout_secs: u64,
}

fn default_knowledge_key_source() -> String {
    "env:SUPABASE_SERVICE_KEY".to_string()
}

fn default_match_function() -> String {
    "match_documents".to_string()
}

fn default_match_count() -> usize {
    4
}

fn default_embeddings_model() -> String {
    crate::embeddings::DEFAULT_EMBEDDINGS_MODEL.to_string()
}

fn default_knowledge_timeout() -> u64 {
    15
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key_source: default_knowledge_key_source(),
            match_function: default_match_function(),
            match_count: default_match_count(),
            embeddings_model: default_embeddings_model(),
            embeddings_api_key_source: None,
            timeout_secs: default_knowledge_timeout(),
        }
    }
}

/// DuckDuckGo search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_endpoint() -> String {
    "https://api.duckduckgo.com/".to_string()
}

fn default_search_results() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    10
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            max_results: default_search_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

/// Which built-in capabilities are offered to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_enabled_tools")]
    pub enabled: Vec<String>,
}

fn default_enabled_tools() -> Vec<String> {
    vec![BuiltinTool::KnowledgeBase.as_str().to_string()]
}

impl ToolsConfig {
    pub fn is_enabled(&self, tool: BuiltinTool) -> bool {
        self.enabled
            .iter()
            .any(|name| BuiltinTool::from_str(name) == Some(tool))
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled_tools(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// Input prompt string
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// Print tool calls and token usage after each reply
    #[serde(default)]
    pub show_stats: bool,
}

fn default_prompt() -> String {
    "Tú: ".to_string()
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            show_stats: false,
        }
    }
}
