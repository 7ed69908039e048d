//! Error taxonomy for a resolution cycle and its collaborators

use thiserror::Error;

/// Errors surfaced to the caller of the agent (shell or embedding application)
#[derive(Error, Debug)]
pub enum AgentError {
    /// Required configuration or credentials are missing; fatal at startup
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The model endpoint was unreachable, timed out, or returned unusable output
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// A requested capability failed to execute
    #[error("capability '{name}' failed: {message}")]
    CapabilityInvocation { name: String, message: String },

    /// The model requested a capability that is not registered
    #[error("unknown tool '{0}'")]
    UnknownCapability(String),

    /// A resumed session identifier was not a well-formed UUID
    #[error("invalid session identifier '{0}'")]
    InvalidSessionFormat(String),

    /// History could not be loaded or written
    #[error("history persistence failed: {0}")]
    Persistence(String),

    /// The reply was computed but the cycle's turns could not be written
    #[error("reply computed but history could not be saved: {message}")]
    ReplyNotPersisted { reply: String, message: String },
}

impl AgentError {
    pub fn persistence(err: anyhow::Error) -> Self {
        AgentError::Persistence(format!("{:#}", err))
    }

    pub fn model(err: anyhow::Error) -> Self {
        AgentError::ModelInvocation(format!("{:#}", err))
    }

    /// Whether the error leaves the session's history untouched for this cycle
    pub fn history_unchanged(&self) -> bool {
        !matches!(self, AgentError::ReplyNotPersisted { .. })
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;
