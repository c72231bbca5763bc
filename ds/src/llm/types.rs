//! LLM request/response types
//!
//! These types model a single-turn chat completion: one system prompt, one user
//! prompt, optional vision input. Blocks never hold multi-turn conversations -
//! every call is independent, matching the host platform's completion gateway.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sampling options a block receives from the flow host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmOptions {
    /// Model identifier (empty string means the client's configured default)
    #[serde(default)]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token budget for the response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for LlmOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// A completion request - everything needed for one LLM call
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System prompt
    pub system_prompt: String,

    /// User prompt
    pub user_prompt: String,

    /// Optional image (data URL or https URL) attached to the user turn
    pub image_url: Option<String>,

    /// Model override; None uses the client's configured default
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Max tokens for the response
    pub max_tokens: u32,
}

impl CompletionRequest {
    /// Create a text-only request
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        debug!("CompletionRequest::new: called");
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            image_url: None,
            model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }

    /// Apply host-supplied sampling options
    pub fn with_options(mut self, options: &LlmOptions) -> Self {
        if !options.model.is_empty() {
            self.model = Some(options.model.clone());
        }
        self.temperature = options.temperature;
        self.max_tokens = options.max_tokens;
        self
    }

    /// Override the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Override the token budget
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Attach an image to the user turn
    pub fn with_image(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text
    pub content: String,

    /// Token usage for cost tracking
    pub usage: TokenUsage,
}

impl Completion {
    /// Completion with text content and no usage accounting
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Token usage for cost tracking
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Total tokens consumed
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let options = LlmOptions {
            model: "scout-chat".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
        };

        let request = CompletionRequest::new("system", "user").with_options(&options);
        assert_eq!(request.model.as_deref(), Some("scout-chat"));
        assert_eq!(request.temperature, 0.7);
        assert_eq!(request.max_tokens, 2000);
        assert!(request.image_url.is_none());
    }

    #[test]
    fn test_empty_model_keeps_client_default() {
        let options = LlmOptions::default();
        let request = CompletionRequest::new("s", "u").with_options(&options);
        assert!(request.model.is_none());
    }

    #[test]
    fn test_per_call_overrides() {
        let request = CompletionRequest::new("s", "u")
            .with_temperature(0.0)
            .with_max_tokens(500);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 500);
    }

    #[test]
    fn test_token_usage_total() {
        let usage = TokenUsage {
            input_tokens: 1000,
            output_tokens: 250,
        };
        assert_eq!(usage.total(), 1250);
    }

    #[test]
    fn test_llm_options_deserialize_defaults() {
        let options: LlmOptions = serde_json::from_str("{}").unwrap();
        assert!(options.model.is_empty());
        assert_eq!(options.temperature, 0.3);
        assert_eq!(options.max_tokens, 4096);
    }
}
