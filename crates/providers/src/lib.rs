//! LLM Provider implementations for Glimpse.
//!
//! All providers implement the `glimpse_core::Provider` trait.
//! The router selects the correct provider based on configuration.

pub mod anthropic;
pub mod gemini;
mod http;
pub mod openai_compat;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use openai_compat::OpenAiCompatProvider;
pub use router::{ProviderRouter, SUPPORTED_PROVIDERS, build_from_config};
