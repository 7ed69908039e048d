pub mod builder;
pub mod core;
pub mod factory;
pub mod function_calling;
pub mod model;
pub mod output;
pub mod prompt;
pub mod providers;
pub mod resolver;

pub use builder::AgentBuilder;
pub use core::AgentCore;
pub use factory::create_provider;
pub use model::{
    ChatMessage, ChatRequest, GenerationConfig, ModelProvider, ModelResponse, ProviderKind,
    ProviderMetadata, ToolCall,
};
pub use output::{AgentOutput, ToolInvocation};
pub use resolver::{Resolution, ResolutionState, TurnResolver, EMPTY_FOLLOW_UP_REPLY};
