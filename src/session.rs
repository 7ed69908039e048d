//! Session identifiers
//!
//! A session is an opaque UUID used only as a lookup key into the history
//! store. Identifiers are minted here or validated when a user resumes one.

use crate::error::{AgentError, AgentResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, the same form users paste back in
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = AgentError;

    fn from_str(s: &str) -> AgentResult<Self> {
        let candidate = s.trim();
        Uuid::parse_str(candidate)
            .map(SessionId)
            .map_err(|_| AgentError::InvalidSessionFormat(candidate.to_string()))
    }
}

/// Outcome of choosing a session at the start of an interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSelection {
    pub id: SessionId,
    /// True when an existing identifier was accepted
    pub resumed: bool,
    /// The rejected input, when a malformed identifier forced a fresh session
    pub rejected: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionManager;

impl SessionManager {
    pub fn new() -> Self {
        Self
    }

    /// Mint a fresh, globally unique identifier
    pub fn new_session(&self) -> SessionId {
        SessionId::generate()
    }

    /// Accept only well-formed UUIDs; nothing is coerced
    pub fn validate(&self, candidate: &str) -> AgentResult<SessionId> {
        candidate.parse()
    }

    /// Resume `candidate` if valid, otherwise recover by minting a new session
    pub fn resume_or_new(&self, candidate: &str) -> SessionSelection {
        match self.validate(candidate) {
            Ok(id) => SessionSelection {
                id,
                resumed: true,
                rejected: None,
            },
            Err(err) => {
                warn!("{}; starting a new session", err);
                SessionSelection {
                    id: self.new_session(),
                    resumed: false,
                    rejected: Some(candidate.trim().to_string()),
                }
            }
        }
    }
}
