//! LlmClient trait definition

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Completion, CompletionRequest, LlmError};

/// Stateless completion client - each call is independent
///
/// This is the boundary to the host platform's completion gateway. Every request
/// is a fresh single-turn conversation; no state is carried between calls.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a completion request and wait for the full response
    async fn complete(&self, request: CompletionRequest) -> Result<Completion, LlmError>;

    /// Streaming completion
    ///
    /// Text fragments are sent to `chunk_tx` in delivery order; the returned
    /// completion holds the fragments concatenated in that same order. Fragment
    /// boundaries carry no semantic meaning - a JSON object may span many chunks.
    async fn stream(
        &self,
        request: CompletionRequest,
        chunk_tx: mpsc::Sender<String>,
    ) -> Result<Completion, LlmError>;
}
