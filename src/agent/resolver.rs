//! Turn resolution
//!
//! Produces the assistant's reply to one user utterance given the prior
//! history. The model decides whether to request capabilities; requested
//! capabilities run one at a time, their results are correlated back by call
//! id, and a follow-up completion produces the reply. Rounds are capped by
//! `max_tool_rounds`; the last allowed follow-up is sent without tool
//! descriptors so it has to come back as text.
//!
//! The resolver never touches history storage. Callers load history before
//! and append the returned turns after, so a failed cycle writes nothing.

use crate::agent::model::{
    ChatMessage, ChatRequest, GenerationConfig, ModelProvider, ModelResponse, TokenUsage, ToolCall,
};
use crate::agent::output::ToolInvocation;
use crate::error::{AgentError, AgentResult};
use crate::tools::ToolRegistry;
use crate::types::{MessageRole, Turn};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shown when the model answers a tool round with no text at all
pub const EMPTY_FOLLOW_UP_REPLY: &str =
    "Lo siento, no pude elaborar una respuesta con la información encontrada. ¿Puedes reformular tu pregunta?";

/// Stages a resolution cycle passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionState {
    AwaitingFirstCompletion,
    DirectReply,
    AwaitingCapabilityResults,
    AwaitingFollowUpCompletion,
    Done,
}

/// Outcome of one successful cycle
#[derive(Debug, Clone)]
pub struct Resolution {
    pub reply: String,
    /// Every state visited, in order
    pub states: Vec<ResolutionState>,
    pub invocations: Vec<ToolInvocation>,
    pub model_calls: usize,
    /// Requests dropped because the round cap was reached
    pub ignored_tool_calls: usize,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<String>,
    pub reasoning: Option<String>,
}

impl Resolution {
    /// The two turns this cycle adds to history
    pub fn turns(&self, utterance: &str) -> [Turn; 2] {
        [Turn::user(utterance), Turn::assistant(self.reply.clone())]
    }

    pub fn used_tools(&self) -> bool {
        !self.invocations.is_empty()
    }
}

pub struct TurnResolver {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    system_prompt: String,
    generation: GenerationConfig,
    max_tool_rounds: usize,
    model_timeout: Duration,
    tool_timeout: Duration,
}

impl TurnResolver {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            tools,
            system_prompt: system_prompt.into(),
            generation: GenerationConfig::default(),
            max_tool_rounds: 1,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_generation_config(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    /// Values below one are raised to one
    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn max_tool_rounds(&self) -> usize {
        self.max_tool_rounds
    }

    /// System instruction, prior turns in order, then the new utterance
    pub fn build_context(&self, history: &[Turn], utterance: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt.clone()));
        for turn in history {
            messages.push(match turn.role {
                MessageRole::User => ChatMessage::user(turn.content.clone()),
                MessageRole::Assistant => ChatMessage::assistant(turn.content.clone()),
            });
        }
        messages.push(ChatMessage::user(utterance));
        messages
    }

    /// Resolve one utterance against `history`
    pub async fn resolve(&self, history: &[Turn], utterance: &str) -> AgentResult<Resolution> {
        let mut messages = self.build_context(history, utterance);
        let mut states = vec![ResolutionState::AwaitingFirstCompletion];
        let mut invocations = Vec::new();
        let mut usage: Option<TokenUsage> = None;

        let mut response = self.complete(&messages, true).await?;
        let mut model_calls = 1;
        usage = accumulate(usage, response.usage);

        let mut rounds = 0;
        let mut ignored_tool_calls = 0;
        if response.requested_tools().is_empty() {
            states.push(ResolutionState::DirectReply);
        }

        loop {
            let calls = dedupe_calls(response.requested_tools());
            if calls.is_empty() {
                break;
            }
            if rounds >= self.max_tool_rounds {
                ignored_tool_calls = calls.len();
                warn!(
                    "Tool round limit ({}) reached; ignoring {} further request(s)",
                    self.max_tool_rounds, ignored_tool_calls
                );
                break;
            }
            rounds += 1;
            states.push(ResolutionState::AwaitingCapabilityResults);

            messages.push(ChatMessage::Assistant {
                content: response.content.clone(),
                tool_calls: calls.clone(),
            });
            for call in &calls {
                let invocation = self.invoke(call).await;
                messages.push(ChatMessage::tool(call.id.clone(), invocation.model_feedback()));
                invocations.push(invocation);
            }

            states.push(ResolutionState::AwaitingFollowUpCompletion);
            // The last allowed follow-up offers no tools, so the model has to answer in text
            let offer_tools = rounds < self.max_tool_rounds;
            response = self.complete(&messages, offer_tools).await?;
            model_calls += 1;
            usage = accumulate(usage, response.usage);
        }

        let mut reply = response.content.trim().to_string();
        if reply.is_empty() {
            if invocations.is_empty() {
                return Err(AgentError::ModelInvocation(
                    "model returned an empty reply".to_string(),
                ));
            }
            warn!(
                "Follow-up completion was empty after {} tool call(s); using fallback reply",
                invocations.len()
            );
            reply = EMPTY_FOLLOW_UP_REPLY.to_string();
        }
        states.push(ResolutionState::Done);

        info!(
            "Resolved turn: model_calls={}, tools={}, ignored={}",
            model_calls,
            invocations.len(),
            ignored_tool_calls
        );

        Ok(Resolution {
            reply,
            states,
            invocations,
            model_calls,
            ignored_tool_calls,
            usage,
            finish_reason: response.finish_reason,
            reasoning: response.reasoning,
        })
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        offer_tools: bool,
    ) -> AgentResult<ModelResponse> {
        let request = ChatRequest {
            messages: messages.to_vec(),
            tools: if offer_tools {
                self.tools.descriptors()
            } else {
                Vec::new()
            },
        };
        debug!(
            "Requesting completion: {} messages, {} tools",
            request.messages.len(),
            request.tools.len()
        );

        match tokio::time::timeout(
            self.model_timeout,
            self.provider.complete(&request, &self.generation),
        )
        .await
        {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(err)) => Err(AgentError::model(err)),
            Err(_) => Err(AgentError::ModelInvocation(format!(
                "no completion within {}s",
                self.model_timeout.as_secs()
            ))),
        }
    }

    /// Run one request; failures become error results for the model
    async fn invoke(&self, call: &ToolCall) -> ToolInvocation {
        let name = call.function_name.as_str();
        let Some(tool) = self.tools.get(name) else {
            let available = self.tools.list();
            let available = if available.is_empty() {
                "(none)".to_string()
            } else {
                available.join(", ")
            };
            warn!("Model requested unknown tool '{}'", name);
            return ToolInvocation::failed(
                &call.id,
                name,
                call.arguments.clone(),
                format!(
                    "{}. Available tools: {}",
                    AgentError::UnknownCapability(name.to_string()),
                    available
                ),
            );
        };

        debug!("Invoking tool '{}' ({})", name, call.id);
        let outcome = tokio::time::timeout(self.tool_timeout, tool.execute(call.arguments.clone()))
            .await;
        match outcome {
            Ok(Ok(result)) => {
                if !result.success {
                    warn!("Tool '{}' reported failure: {:?}", name, result.error);
                }
                ToolInvocation::from_result(&call.id, name, call.arguments.clone(), &result)
            }
            Ok(Err(err)) => {
                let err = AgentError::CapabilityInvocation {
                    name: name.to_string(),
                    message: format!("{:#}", err),
                };
                warn!("{}", err);
                ToolInvocation::failed(&call.id, name, call.arguments.clone(), err.to_string())
            }
            Err(_) => {
                let err = AgentError::CapabilityInvocation {
                    name: name.to_string(),
                    message: format!("timed out after {}s", self.tool_timeout.as_secs()),
                };
                warn!("{}", err);
                ToolInvocation::failed(&call.id, name, call.arguments.clone(), err.to_string())
            }
        }
    }
}

fn accumulate(total: Option<TokenUsage>, next: Option<TokenUsage>) -> Option<TokenUsage> {
    match (total, next) {
        (Some(a), Some(b)) => Some(a.accumulate(b)),
        (a, b) => a.or(b),
    }
}

/// Keeps the first request for each call id
fn dedupe_calls(calls: &[ToolCall]) -> Vec<ToolCall> {
    let mut seen = HashSet::new();
    calls
        .iter()
        .filter(|call| seen.insert(call.id.clone()))
        .cloned()
        .collect()
}
