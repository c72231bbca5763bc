//! chart-recommender block
//!
//! Asks the LLM for 2-3 chart recommendations given the data's field
//! statistics and an analysis goal, validates the response shape, and returns
//! the recommendations sorted by priority.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use tablequery::{Table, infer_schema};

use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;
use crate::llm::{CompletionRequest, LlmOptions, json::extract_array};
use crate::prompts::embedded;

const DEFAULT_GOAL: &str = "Explore the data and find insights";

/// chart-recommender inputs
#[derive(Debug, Deserialize)]
pub struct RecommendParams {
    pub data_table: Table,
    #[serde(default)]
    pub analysis_goal: Option<String>,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// One validated chart recommendation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartRecommendation {
    pub chart_type: String,
    pub x_field: String,
    pub y_field: String,
    #[serde(default)]
    pub color_field: String,
    #[serde(default)]
    pub size_field: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    1
}

/// Recommend chart configurations for a table
pub async fn recommend_charts(
    params: &RecommendParams,
    ctx: &BlockContext,
) -> Result<Vec<ChartRecommendation>, BlockError> {
    debug!(rows = params.data_table.row_count(), "recommend_charts: called");
    ctx.host.report_progress(0);

    if params.data_table.is_empty() {
        return Err(BlockError::InvalidInput("Data table is empty or invalid".to_string()));
    }
    let goal = params.analysis_goal.clone().filter(|g| !g.is_empty()).unwrap_or_else(|| DEFAULT_GOAL.to_string());

    ctx.host.report_progress(20);

    let field_stats = field_stats_text(&params.data_table);

    ctx.host.report_progress(40);

    let (rows, columns) = params.data_table.shape();
    let user_prompt = format!(
        "Data Overview:\n- Rows: {}\n- Columns: {}\n\n\
         Field Details:\n{}\n\n\
         Analysis Goal: {}\n\n\
         Recommend 2-3 most effective visualizations for this data and goal.",
        rows, columns, field_stats, goal,
    );

    ctx.host.report_progress(50);

    let request = CompletionRequest::new(embedded::CHARTS, user_prompt).with_options(&params.llm);
    let completion = ctx.llm.complete(request).await?;

    ctx.host.report_progress(80);

    let items = extract_array(&completion.content)?;
    let mut recommendations = Vec::with_capacity(items.len());
    for item in items {
        let rec: ChartRecommendation = serde_json::from_value(normalize_nulls(item.clone()))
            .map_err(|e| BlockError::InvalidInput(format!("Recommendation has invalid shape: {} ({})", item, e)))?;

        let mut missing = Vec::new();
        if rec.chart_type.is_empty() {
            missing.push("chart_type");
        }
        if rec.x_field.is_empty() {
            missing.push("x_field");
        }
        if rec.y_field.is_empty() {
            missing.push("y_field");
        }
        if !missing.is_empty() {
            return Err(BlockError::InvalidInput(format!(
                "Recommendation missing required fields {:?}: {}",
                missing, item
            )));
        }
        recommendations.push(rec);
    }

    recommendations.sort_by_key(|r| r.priority);

    let preview = recommendations
        .iter()
        .map(|r| {
            format!(
                "<div class=\"recommendation\"><strong>#{} {} chart</strong> \
                 (x: {}, y: {})<p>{}</p></div>",
                r.priority, r.chart_type, r.x_field, r.y_field, r.reason,
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    ctx.host.preview(Preview::Html(format!(
        "<div>\n<h3>Chart Recommendations</h3>\n<p><strong>Analysis Goal:</strong> {}</p>\n{}\n</div>",
        goal, preview,
    )));

    ctx.host.report_progress(100);

    Ok(recommendations)
}

/// Human-readable field statistics for the prompt
fn field_stats_text(table: &Table) -> String {
    let schema = match &table.schema {
        Some(schema) => schema.clone(),
        None => infer_schema(table),
    };

    let mut lines = Vec::new();
    for column in &table.columns {
        let Some(info) = schema.get(column) else { continue };
        let mut parts = vec![
            format!("- **{}**", column),
            format!("({})", info.semantic_type.as_str()),
            format!("[{} unique values]", info.unique_count),
        ];
        if let Some(stats) = &info.stats {
            parts.push(format!("Range: {} to {}", stats.min, stats.max));
            parts.push(format!("Mean: {:.2}", stats.mean));
        }
        if !info.sample_values.is_empty() {
            let samples: Vec<String> = info
                .sample_values
                .iter()
                .take(5)
                .map(tablequery::table::display_value)
                .collect();
            parts.push(format!("Values: {}", samples.join(", ")));
        }
        lines.push(parts.join(" "));
    }

    lines.join("\n")
}

/// Models emit `null` for unused encodings; map those to empty strings
fn normalize_nulls(mut value: Value) -> Value {
    if let Some(map) = value.as_object_mut() {
        for key in ["color_field", "size_field", "reason"] {
            if map.get(key).is_some_and(|v| v.is_null()) {
                map.insert(key.to_string(), json!(""));
            }
        }
        if map.get("priority").is_some_and(|v| v.is_null()) {
            map.insert("priority".to_string(), json!(1));
        }
    }
    value
}

/// Block wrapper for the registry
pub struct ChartRecommenderBlock;

#[async_trait]
impl Block for ChartRecommenderBlock {
    fn name(&self) -> &'static str {
        "chart-recommender"
    }

    fn description(&self) -> &'static str {
        "Recommend optimal chart types based on data characteristics"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: RecommendParams = parse_params(inputs)?;
        let recommendations = recommend_charts(&params, ctx).await?;
        Ok(json!({ "recommended_charts": recommendations }))
    }
}
