//! LLM client layer
//!
//! Provides the completion-gateway boundary: a stateless client trait, an
//! OpenAI-compatible implementation, and helpers for digging JSON out of model
//! output.

use std::sync::Arc;

use tracing::debug;

pub mod client;
mod error;
pub mod json;
mod openai;
mod types;

pub use client::LlmClient;
pub use error::LlmError;
pub use openai::OpenAiClient;
pub use types::{Completion, CompletionRequest, LlmOptions, TokenUsage};

use crate::config::LlmConfig;

/// Create an LLM client based on the provider specified in config
///
/// Currently only OpenAI-compatible gateways are supported.
pub fn create_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    debug!(provider = %config.provider, model = %config.model, "create_client: called");
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        other => Err(LlmError::InvalidResponse(format!(
            "Unknown LLM provider: '{}'. Supported: openai",
            other
        ))),
    }
}
