//! Exploration error types
//!
//! Only two conditions are fatal to a run: an empty input table and a plan the
//! loop cannot parse (there is no sane default next action to substitute).
//! Everything that goes wrong while *discovering* - failed queries, failed
//! insight calls, failed chart renders, failed summarization - is absorbed into
//! degraded-but-present results by the engine.

use thiserror::Error;

use crate::llm::LlmError;

/// Fatal exploration failures
#[derive(Debug, Error)]
pub enum ExploreError {
    /// The input table has no data rows
    #[error("Input table has no data rows")]
    EmptyInput,

    /// The planning response could not be parsed as a plan
    #[error("Could not parse exploration plan: {message}")]
    PlanParse {
        message: String,
        /// The offending response payload (truncated), kept for debuggability
        payload: String,
    },

    /// The planning call itself failed
    #[error("Failed to generate exploration plan: {0}")]
    Planning(#[from] LlmError),
}

impl ExploreError {
    /// Build a parse error carrying a truncated copy of the response
    pub fn plan_parse(message: impl Into<String>, payload: &str) -> Self {
        ExploreError::PlanParse {
            message: message.into(),
            payload: payload.chars().take(200).collect(),
        }
    }
}
