pub mod agent;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod persistence;
pub mod session;
pub mod test_utils;
pub mod tools;
pub mod types;

pub use error::{AgentError, AgentResult};
