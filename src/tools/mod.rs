pub mod builtin;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use self::builtin::{KnowledgeBaseTool, WebSearchTool};
use crate::config::AppConfig;

/// Result of tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether execution succeeded
    pub success: bool,
    /// Output from the tool
    pub output: String,
    /// Error message if execution failed
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// Create a failure result
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

/// What the model is told about a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument payload
    pub parameters: Value,
}

/// Trait for all tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool
    fn name(&self) -> &str;

    /// Human-readable description of what the tool does
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments
    async fn execute(&self, args: Value) -> Result<ToolResult>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// The closed set of capabilities shipped with the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BuiltinTool {
    KnowledgeBase,
    WebSearch,
}

impl BuiltinTool {
    pub const ALL: [BuiltinTool; 2] = [BuiltinTool::KnowledgeBase, BuiltinTool::WebSearch];

    pub fn as_str(&self) -> &'static str {
        match self {
            BuiltinTool::KnowledgeBase => "search_knowledge_base",
            BuiltinTool::WebSearch => "web_search",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "search_knowledge_base" | "knowledge_base" => Some(BuiltinTool::KnowledgeBase),
            "web_search" => Some(BuiltinTool::WebSearch),
            _ => None,
        }
    }
}

/// Registry for managing and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Build the registry from the tools enabled in configuration.
    ///
    /// The name-to-handler mapping is fixed here at startup; nothing is added
    /// while the agent runs.
    pub fn with_builtin_tools(config: &AppConfig) -> Result<Self> {
        let mut registry = Self::new();

        for name in &config.tools.enabled {
            let kind = BuiltinTool::from_str(name)
                .ok_or_else(|| anyhow!("Unknown tool in configuration: {}", name))?;
            match kind {
                BuiltinTool::KnowledgeBase => {
                    registry.register(Arc::new(KnowledgeBaseTool::from_config(config)?));
                }
                BuiltinTool::WebSearch => {
                    registry.register(Arc::new(WebSearchTool::from_config(&config.web_search)?));
                }
            }
        }

        debug!("ToolRegistry created with {} tools", registry.tools.len());
        for name in registry.tools.keys() {
            debug!("  - Tool: {}", name);
        }

        Ok(registry)
    }

    /// Register a tool in the registry
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by exact name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// List all registered tool names, sorted
    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors for every registered tool, in name order
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.list()
            .into_iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.descriptor())
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
