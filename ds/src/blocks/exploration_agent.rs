//! exploration-agent block
//!
//! Multi-round exploration agent that autonomously discovers insights. Thin
//! wrapper over [`ExplorationEngine`]; charting activates when the host
//! attached a renderer.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use tablequery::Table;

use super::{Block, BlockContext, BlockError, parse_params};
use crate::charts::DefaultPolicy;
use crate::explore::{DEFAULT_MAX_ITERATIONS, ExplorationEngine, ExplorationOptions};
use crate::llm::LlmOptions;

/// exploration-agent inputs
#[derive(Debug, Deserialize)]
pub struct ExplorationParams {
    pub input_table: Table,
    pub exploration_goal: String,
    #[serde(default)]
    pub max_iterations: Option<u32>,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// Run the exploration loop against the block context's collaborators
pub async fn explore(params: &ExplorationParams, ctx: &BlockContext) -> Result<Value, BlockError> {
    debug!(goal = %params.exploration_goal, max_iterations = ?params.max_iterations, "explore: called");

    let mut engine = ExplorationEngine::new(ctx.llm.clone(), ctx.engine.clone(), ctx.host.clone());
    if let Some(renderer) = &ctx.renderer {
        engine = engine.with_charts(Arc::new(DefaultPolicy), renderer.clone());
    }

    let options = ExplorationOptions {
        max_iterations: params.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
        llm: params.llm.clone(),
    };

    let outcome = engine.run(&params.input_table, &params.exploration_goal, &options).await?;

    Ok(json!({
        "exploration_steps": outcome.steps,
        "final_report": outcome.final_report,
    }))
}

/// Block wrapper for the registry
pub struct ExplorationAgentBlock;

#[async_trait]
impl Block for ExplorationAgentBlock {
    fn name(&self) -> &'static str {
        "exploration-agent"
    }

    fn description(&self) -> &'static str {
        "Multi-round exploration agent that autonomously discovers insights"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: ExplorationParams = parse_params(inputs)?;
        explore(&params, ctx).await
    }
}
