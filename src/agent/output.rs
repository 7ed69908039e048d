//! Shared agent output data types used by the core loop and CLI

use crate::agent::model::TokenUsage;
use crate::tools::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output from one resolution cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The reply shown to the user
    pub response: String,
    /// Session the turns were appended to
    pub session_id: String,
    /// Unique identifier for correlating this run with logs/telemetry
    pub run_id: String,
    /// Token usage summed over every completion in the cycle
    pub token_usage: Option<TokenUsage>,
    /// Capability invocations performed during this cycle
    pub tool_invocations: Vec<ToolInvocation>,
    /// Finish reason of the final completion
    pub finish_reason: Option<String>,
    /// Number of completions requested from the model
    pub model_calls: usize,
    /// Capability requests left unanswered because the round cap was reached
    pub ignored_tool_calls: usize,
    /// Model's thinking process (extracted from <think> tags)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// A single tool invocation, including arguments and outcome metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Correlation id of the model's request
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolInvocation {
    pub fn from_result(call_id: &str, name: &str, arguments: Value, result: &ToolResult) -> Self {
        let output = if result.output.trim().is_empty() {
            None
        } else {
            Some(result.output.clone())
        };

        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments,
            success: result.success,
            output,
            error: result.error.clone(),
        }
    }

    pub fn failed(call_id: &str, name: &str, arguments: Value, error: impl Into<String>) -> Self {
        Self {
            call_id: call_id.to_string(),
            name: name.to_string(),
            arguments,
            success: false,
            output: None,
            error: Some(error.into()),
        }
    }

    /// Text handed back to the model as this invocation's result turn
    pub fn model_feedback(&self) -> String {
        if self.success {
            self.output
                .clone()
                .unwrap_or_else(|| "(the tool returned no output)".to_string())
        } else {
            format!(
                "ERROR: {}",
                self.error.as_deref().unwrap_or("tool execution failed")
            )
        }
    }
}
