//! Analysis blocks
//!
//! A block is a thin function the flow host wires into flows: deserialize the
//! host's JSON inputs, do one piece of work (load data, call the LLM, run a
//! transformation, build a chart), emit a preview, return JSON outputs. The
//! registry dispatches blocks by name the way the host addresses them.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use tablequery::{QueryEngine, QueryError};

use crate::charts::{ChartRenderer, RenderError};
use crate::explore::ExploreError;
use crate::host::HostContext;
use crate::llm::{LlmClient, LlmError};

pub mod chart_array;
pub mod chart_generator;
pub mod chart_recommender;
pub mod chart_selector;
pub mod data_extractor;
pub mod data_loader;
pub mod exploration_agent;
pub mod nl_to_sql;
pub mod quality;
pub mod report;
pub mod stats;

/// Errors a block can raise to the host
#[derive(Debug, Error)]
pub enum BlockError {
    /// Empty or malformed input; fatal, no retry
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Completion gateway failure
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Query engine failure
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Exploration run failure
    #[error(transparent)]
    Explore(#[from] ExploreError),

    /// Chart rendering failure
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Filesystem failure (report writing, data loading)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The host's inputs did not match the block's parameter shape
    #[error("Failed to parse block inputs: {0}")]
    Params(serde_json::Error),
}

/// Collaborators every block receives from the host
pub struct BlockContext {
    /// Completion gateway
    pub llm: Arc<dyn LlmClient>,

    /// Query engine (registers the working table as `data`)
    pub engine: Arc<dyn QueryEngine>,

    /// Progress and preview sinks
    pub host: Arc<dyn HostContext>,

    /// Chart rasterizer, when the host provides one
    pub renderer: Option<Arc<dyn ChartRenderer>>,

    /// Directory for generated artifacts
    pub session_dir: PathBuf,
}

/// A block the flow host can wire into a flow
#[async_trait]
pub trait Block: Send + Sync {
    /// Block name (matches the host's addressing)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Execute with the host's JSON inputs
    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError>;
}

/// Registry of available blocks
pub struct BlockRegistry {
    blocks: Vec<Box<dyn Block>>,
}

impl BlockRegistry {
    /// Registry with the standard block set
    pub fn standard() -> Self {
        debug!("BlockRegistry::standard: called");
        Self {
            blocks: vec![
                Box::new(data_loader::DataLoaderBlock),
                Box::new(data_extractor::DataExtractorBlock),
                Box::new(nl_to_sql::NlToSqlBlock),
                Box::new(exploration_agent::ExplorationAgentBlock),
                Box::new(chart_recommender::ChartRecommenderBlock),
                Box::new(chart_selector::ChartSelectorBlock),
                Box::new(chart_generator::ChartGeneratorBlock),
                Box::new(chart_array::ChartArrayBlock),
                Box::new(quality::DataQualityBlock),
                Box::new(stats::StatisticalAnalyzerBlock),
                Box::new(report::ReportGeneratorBlock),
            ],
        }
    }

    /// Look up a block by name
    pub fn get(&self, name: &str) -> Option<&dyn Block> {
        self.blocks.iter().find(|b| b.name() == name).map(|b| b.as_ref())
    }

    /// All registered block names
    pub fn names(&self) -> Vec<&'static str> {
        self.blocks.iter().map(|b| b.name()).collect()
    }

    /// All registered blocks
    pub fn iter(&self) -> impl Iterator<Item = &dyn Block> {
        self.blocks.iter().map(|b| b.as_ref())
    }

    /// Dispatch by name
    pub async fn run(&self, name: &str, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        debug!(%name, "BlockRegistry::run: called");
        let block = self
            .get(name)
            .ok_or_else(|| BlockError::InvalidInput(format!("Unknown block: {}", name)))?;
        block.run(inputs, ctx).await
    }
}

/// Deserialize host inputs into a block's typed parameters
pub(crate) fn parse_params<T: serde::de::DeserializeOwned>(inputs: Value) -> Result<T, BlockError> {
    serde_json::from_value(inputs).map_err(BlockError::Params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_names() {
        let registry = BlockRegistry::standard();
        let names = registry.names();

        for expected in [
            "data-loader",
            "nl-to-sql",
            "exploration-agent",
            "chart-recommender",
            "chart-selector",
            "chart-generator",
            "chart-array-builder",
            "data-quality-checker",
            "statistical-analyzer",
            "data-extractor",
            "report-generator",
        ] {
            assert!(names.contains(&expected), "missing block {expected}");
        }
    }

    #[test]
    fn test_get_unknown_block() {
        let registry = BlockRegistry::standard();
        assert!(registry.get("nl-to-pandas").is_none());
    }
}
