//! chart-array-builder block
//!
//! Collects individual chart outputs into the array shape the report
//! generator consumes, dropping slots that carry no image.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;

/// One chart slot, possibly empty
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartSlot {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// chart-array-builder inputs
#[derive(Debug, Deserialize)]
pub struct ChartArrayParams {
    pub charts: Vec<ChartSlot>,
}

/// A chart ready for report embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartEntry {
    pub title: String,
    pub image: String,
    pub description: String,
}

/// Filter slots into the chart array
pub fn build_chart_array(params: &ChartArrayParams, ctx: &BlockContext) -> Result<Vec<ChartEntry>, BlockError> {
    debug!(slots = params.charts.len(), "build_chart_array: called");

    let mut charts = Vec::new();
    for (i, slot) in params.charts.iter().enumerate() {
        let Some(image) = slot.image.as_ref().filter(|img| !img.is_empty()) else {
            continue;
        };
        charts.push(ChartEntry {
            title: slot.title.clone().filter(|t| !t.is_empty()).unwrap_or_else(|| format!("Chart {}", i + 1)),
            image: image.clone(),
            description: slot.description.clone().unwrap_or_default(),
        });
    }

    if charts.is_empty() {
        return Err(BlockError::InvalidInput(
            "No charts provided. At least one chart image is required.".to_string(),
        ));
    }

    let listing = charts
        .iter()
        .map(|c| {
            if c.description.is_empty() {
                format!("<li><strong>{}</strong></li>", c.title)
            } else {
                format!("<li><strong>{}</strong> - {}</li>", c.title, c.description)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    ctx.host.preview(Preview::Html(format!(
        "<div>\n<h3>Chart Array Builder</h3>\n<p><strong>Total charts:</strong> {}</p>\n<ul>\n{}\n</ul>\n</div>",
        charts.len(),
        listing,
    )));

    Ok(charts)
}

/// Block wrapper for the registry
pub struct ChartArrayBlock;

#[async_trait]
impl Block for ChartArrayBlock {
    fn name(&self) -> &'static str {
        "chart-array-builder"
    }

    fn description(&self) -> &'static str {
        "Build an array of chart objects, filtering out empty slots"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: ChartArrayParams = parse_params(inputs)?;
        let charts = build_chart_array(&params, ctx)?;
        Ok(json!({ "charts_array": charts }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::llm::client::mock::MockLlmClient;
    use std::sync::Arc;
    use tablequery::SqliteEngine;

    fn context() -> BlockContext {
        BlockContext {
            llm: Arc::new(MockLlmClient::with_texts(vec![])),
            engine: Arc::new(SqliteEngine::new()),
            host: Arc::new(MemoryHost::new()),
            renderer: None,
            session_dir: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_filters_imageless_slots_and_defaults_titles() {
        let params = ChartArrayParams {
            charts: vec![
                ChartSlot {
                    image: Some("AAA".to_string()),
                    title: Some("Sales by Region".to_string()),
                    description: Some("bar chart".to_string()),
                },
                ChartSlot::default(),
                ChartSlot {
                    image: Some("BBB".to_string()),
                    title: None,
                    description: None,
                },
            ],
        };

        let charts = build_chart_array(&params, &context()).unwrap();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title, "Sales by Region");
        // Slot index, not output index, names the default title
        assert_eq!(charts[1].title, "Chart 3");
        assert_eq!(charts[1].description, "");
    }

    #[test]
    fn test_empty_string_image_is_filtered() {
        let params = ChartArrayParams {
            charts: vec![ChartSlot {
                image: Some(String::new()),
                title: None,
                description: None,
            }],
        };
        let err = build_chart_array(&params, &context()).unwrap_err();
        assert!(err.to_string().contains("At least one chart image is required"));
    }

    #[test]
    fn test_no_slots_is_error() {
        let params = ChartArrayParams { charts: vec![] };
        assert!(build_chart_array(&params, &context()).is_err());
    }
}
