//! intentgate-llm - AI text classifier providers for intentgate.
//!
//! Implementations of the core [`Llm`] trait used by the intention validator
//! and matcher.
//!
//! # Supported Providers
//!
//! - **OpenAI** (feature: `openai`) - GPT-4.1 and friends
//! - **Anthropic** (feature: `anthropic`) - Claude models
//!
//! # Example
//!
//! ```ignore
//! use intentgate_llm::LlmFactory;
//!
//! let llm = LlmFactory::openai()?;
//! let llm = LlmFactory::anthropic_with_model("claude-3-5-haiku-20241022")?;
//! ```

mod anthropic;
mod factory;
mod openai;

pub use anthropic::AnthropicLlm;
pub use factory::LlmFactory;
pub use openai::OpenAIProvider;

// Re-export core types for convenience
pub use intentgate_core::config::LlmProvider;
pub use intentgate_core::traits::{GenerationOptions, Llm, LlmConfig, LlmResponse, ResponseFormat};
