//! chart-selector block
//!
//! Bridges the recommender and the generator: picks one recommendation by
//! index and flattens it into the generator's input fields.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::chart_recommender::ChartRecommendation;
use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;

/// chart-selector inputs
#[derive(Debug, Deserialize)]
pub struct SelectParams {
    pub recommendations: Vec<ChartRecommendation>,
    #[serde(default)]
    pub selection_index: Option<usize>,
}

/// Pick a recommendation and surface its configuration
pub fn select_chart(params: &SelectParams, ctx: &BlockContext) -> Result<Value, BlockError> {
    debug!(
        count = params.recommendations.len(),
        index = ?params.selection_index,
        "select_chart: called"
    );

    if params.recommendations.is_empty() {
        return Err(BlockError::InvalidInput(
            "No recommendations provided. The recommendations array is empty.".to_string(),
        ));
    }

    let index = params.selection_index.unwrap_or(0);
    if index >= params.recommendations.len() {
        return Err(BlockError::InvalidInput(format!(
            "Invalid selection_index {}. Must be between 0 and {}.",
            index,
            params.recommendations.len() - 1
        )));
    }

    let selected = &params.recommendations[index];
    for (field, value) in [
        ("chart_type", &selected.chart_type),
        ("x_field", &selected.x_field),
        ("y_field", &selected.y_field),
    ] {
        if value.is_empty() {
            return Err(BlockError::InvalidInput(format!(
                "Selected recommendation (index {}) is missing '{}'.",
                index, field
            )));
        }
    }

    let color_field = (!selected.color_field.is_empty()).then(|| selected.color_field.clone());
    let size_field = (!selected.size_field.is_empty()).then(|| selected.size_field.clone());

    ctx.host.preview(Preview::Html(format!(
        "<div>\n<h3>Selected Chart Configuration</h3>\n\
         <p>Recommendation #{} (priority {}): <strong>{}</strong></p>\n\
         <p>X: {} | Y: {}</p>\n<p>{}</p>\n</div>",
        index + 1,
        selected.priority,
        selected.chart_type.to_uppercase(),
        selected.x_field,
        selected.y_field,
        selected.reason,
    )));

    Ok(json!({
        "chart_type": selected.chart_type,
        "x_field": selected.x_field,
        "y_field": selected.y_field,
        "color_field": color_field,
        "size_field": size_field,
        "selected_recommendation": selected,
    }))
}

/// Block wrapper for the registry
pub struct ChartSelectorBlock;

#[async_trait]
impl Block for ChartSelectorBlock {
    fn name(&self) -> &'static str {
        "chart-selector"
    }

    fn description(&self) -> &'static str {
        "Select one chart recommendation and extract its configuration"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: SelectParams = parse_params(inputs)?;
        select_chart(&params, ctx)
    }
}
