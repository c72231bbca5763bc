//! Exploration plan - one iteration's proposed action
//!
//! The planner returns a JSON object; parsing strips markdown fences and takes
//! the first well-formed object in the text. Shape violations become
//! [`ExploreError::PlanParse`] immediately rather than surfacing as missing-key
//! failures later in the loop.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ExploreError;
use crate::llm::json::extract_object;

/// What the planner wants to do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    /// Run another transformation step
    Explore,
    /// Stop - enough insight has been gathered
    Conclude,
}

/// One iteration's LLM-proposed plan (transient; never outlives its iteration)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorationPlan {
    pub action: PlanAction,
    pub sql_query: String,
    pub explanation: String,
    pub expected_insight: String,
}

impl ExplorationPlan {
    /// Whether the plan carries a query to execute
    pub fn has_query(&self) -> bool {
        !self.sql_query.trim().is_empty()
    }
}

/// Parse a planning response into a plan
pub fn parse_plan(text: &str) -> Result<ExplorationPlan, ExploreError> {
    debug!(text_len = text.len(), "parse_plan: called");
    let value = extract_object(text).map_err(|e| ExploreError::plan_parse(e.to_string(), text))?;

    let action = match value.get("action").and_then(|v| v.as_str()) {
        Some("explore") => PlanAction::Explore,
        Some("conclude") => PlanAction::Conclude,
        Some(other) => {
            return Err(ExploreError::plan_parse(format!("unknown action '{}'", other), text));
        }
        None => return Err(ExploreError::plan_parse("plan is missing the 'action' key", text)),
    };

    let text_field = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string()
    };

    Ok(ExplorationPlan {
        action,
        sql_query: text_field("sql_query"),
        explanation: text_field("explanation"),
        expected_insight: text_field("expected_insight"),
    })
}
