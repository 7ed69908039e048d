//! Agent Core Execution Loop
//!
//! Ties a session to the history store and the turn resolver. One call to
//! [`AgentCore::run_step`] is one resolution cycle: load history, resolve,
//! append the user turn and reply together.

use crate::agent::output::AgentOutput;
use crate::agent::resolver::{Resolution, TurnResolver};
use crate::error::{AgentError, AgentResult};
use crate::persistence::HistoryStore;
use crate::session::SessionId;
use crate::tools::ToolRegistry;
use crate::types::Turn;
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

/// Core agent that executes resolution cycles for one session at a time
pub struct AgentCore {
    /// Turn resolver (model + capabilities)
    resolver: TurnResolver,
    /// History store
    store: Arc<dyn HistoryStore>,
    /// Current session ID
    session_id: SessionId,
    /// Name used in tool telemetry
    agent_name: String,
}

impl AgentCore {
    /// Create a new agent core
    pub fn new(
        resolver: TurnResolver,
        store: Arc<dyn HistoryStore>,
        session_id: SessionId,
        agent_name: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            store,
            session_id,
            agent_name: agent_name.into(),
        }
    }

    /// Execute a single interaction step.
    ///
    /// Takes `&mut self` so cycles on one agent are strictly sequential.
    pub async fn run_step(&mut self, input: &str) -> AgentResult<AgentOutput> {
        let run_id = format!("run-{}", Utc::now().timestamp_micros());

        let history = self
            .store
            .load(&self.session_id)
            .map_err(AgentError::persistence)?;

        let resolution = self.resolver.resolve(&history, input).await?;

        if let Err(err) = self
            .store
            .append(&self.session_id, &resolution.turns(input))
        {
            warn!("Reply for session {} was not saved: {:#}", self.session_id, err);
            return Err(AgentError::ReplyNotPersisted {
                reply: resolution.reply,
                message: format!("{:#}", err),
            });
        }

        if let Err(err) = self.store.record_tool_invocations(
            &self.session_id,
            &self.agent_name,
            &run_id,
            &resolution.invocations,
        ) {
            warn!("Failed to log tool invocations: {:#}", err);
        }

        info!(
            "Session {} completed {} ({} model calls)",
            self.session_id, run_id, resolution.model_calls
        );

        Ok(self.output(run_id, resolution))
    }

    fn output(&self, run_id: String, resolution: Resolution) -> AgentOutput {
        AgentOutput {
            response: resolution.reply,
            session_id: self.session_id.to_string(),
            run_id,
            token_usage: resolution.usage,
            tool_invocations: resolution.invocations,
            finish_reason: resolution.finish_reason,
            model_calls: resolution.model_calls,
            ignored_tool_calls: resolution.ignored_tool_calls,
            reasoning: resolution.reasoning,
        }
    }

    /// Continue in another session; nothing is cached, so this is cheap
    pub fn switch_session(&mut self, session_id: SessionId) {
        info!("Switching to session {}", session_id);
        self.session_id = session_id;
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Full history of the current session
    pub fn history(&self) -> AgentResult<Vec<Turn>> {
        self.store
            .load(&self.session_id)
            .map_err(AgentError::persistence)
    }

    pub fn tool_registry(&self) -> &ToolRegistry {
        self.resolver.tools()
    }

    pub fn resolver(&self) -> &TurnResolver {
        &self.resolver
    }
}
