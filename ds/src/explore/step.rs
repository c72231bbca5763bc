//! Exploration step - the recorded outcome of one loop iteration
//!
//! Steps are append-only; once recorded they are never edited. A step whose
//! query failed keeps the query text and carries the failure message in place
//! of an insight.

use serde::{Deserialize, Serialize};

/// One iteration's record in the exploration trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorationStep {
    /// 1-based iteration index at recording time
    pub step_number: u32,

    /// The plan's explanation of analytical intent
    pub transformation: String,

    /// The SQL that was executed (or attempted)
    pub sql_query: String,

    /// Natural-language finding, or the failure message for failed queries
    pub insight: String,

    /// Encoded chart image, when one was produced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_image: Option<String>,

    /// Chart-type tag ("bar", "histogram", "scatter", or "none" on render failure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
}

impl ExplorationStep {
    /// Step with no chart attached
    pub fn new(
        step_number: u32,
        transformation: impl Into<String>,
        sql_query: impl Into<String>,
        insight: impl Into<String>,
    ) -> Self {
        Self {
            step_number,
            transformation: transformation.into(),
            sql_query: sql_query.into(),
            insight: insight.into(),
            chart_image: None,
            chart_type: None,
        }
    }

    /// Attach a rendered chart
    pub fn with_chart(mut self, image: impl Into<String>, chart_type: impl Into<String>) -> Self {
        self.chart_image = Some(image.into());
        self.chart_type = Some(chart_type.into());
        self
    }
}
