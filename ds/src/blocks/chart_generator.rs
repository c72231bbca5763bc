//! chart-generator block
//!
//! Builds a Vega-Lite spec from explicit chart configuration and renders it
//! through the host's renderer. Unlike the exploration loop, this block
//! *requires* rendering - a missing or failing renderer is an error here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use tablequery::Table;

use super::{Block, BlockContext, BlockError, parse_params};
use crate::charts::{ChartKind, RenderError, build_chart_spec};
use crate::host::Preview;

/// chart-generator inputs
#[derive(Debug, Deserialize)]
pub struct GenerateParams {
    pub data_table: Table,
    pub chart_type: String,
    pub x_field: String,
    pub y_field: String,
    #[serde(default)]
    pub color_field: Option<String>,
    #[serde(default)]
    pub size_field: Option<String>,
}

/// Build and render a chart
pub async fn generate_chart(params: &GenerateParams, ctx: &BlockContext) -> Result<Value, BlockError> {
    debug!(chart_type = %params.chart_type, x = %params.x_field, y = %params.y_field, "generate_chart: called");

    if params.data_table.is_empty() {
        return Err(BlockError::InvalidInput("Data table is empty or invalid".to_string()));
    }
    if params.x_field.is_empty() || params.y_field.is_empty() {
        return Err(BlockError::InvalidInput("X and Y fields are required".to_string()));
    }

    let kind: ChartKind = params.chart_type.parse().map_err(BlockError::InvalidInput)?;

    // Every referenced field must exist in the data
    let mut required = vec![("X", &params.x_field), ("Y", &params.y_field)];
    if let Some(color) = &params.color_field {
        required.push(("Color", color));
    }
    if let Some(size) = &params.size_field {
        required.push(("Size", size));
    }
    for (label, field) in required {
        if !params.data_table.columns.iter().any(|c| c == field) {
            return Err(BlockError::InvalidInput(format!(
                "{} field '{}' not found in data columns: {:?}",
                label, field, params.data_table.columns
            )));
        }
    }

    ctx.host.report_progress(20);
    ctx.host.report_progress(40);

    let vega_spec = build_chart_spec(
        &params.data_table,
        kind,
        &params.x_field,
        &params.y_field,
        params.color_field.as_deref(),
        params.size_field.as_deref(),
    );

    ctx.host.report_progress(60);

    let renderer = ctx.renderer.as_ref().ok_or(BlockError::Render(RenderError::Unavailable))?;
    let chart_image = renderer.render(&vega_spec)?;

    ctx.host.report_progress(80);

    ctx.host
        .preview(Preview::Image(format!("data:image/png;base64,{}", chart_image)));

    ctx.host.report_progress(100);

    Ok(json!({
        "vega_spec": vega_spec,
        "chart_image": chart_image,
    }))
}

/// Block wrapper for the registry
pub struct ChartGeneratorBlock;

#[async_trait]
impl Block for ChartGeneratorBlock {
    fn name(&self) -> &'static str {
        "chart-generator"
    }

    fn description(&self) -> &'static str {
        "Generate charts as Vega-Lite specs rendered to images"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: GenerateParams = parse_params(inputs)?;
        generate_chart(&params, ctx).await
    }
}
