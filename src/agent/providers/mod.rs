pub mod mock;

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(feature = "lmstudio")]
pub mod lmstudio;

pub use mock::MockProvider;

#[cfg(feature = "openai")]
pub use openai::OpenAIProvider;

#[cfg(feature = "lmstudio")]
pub use lmstudio::LMStudioProvider;
