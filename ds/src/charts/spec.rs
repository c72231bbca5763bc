//! Vega-Lite spec construction
//!
//! Specs are plain JSON values in the Vega-Lite v5 dialect, built either from a
//! [`ChartPlan`] chosen by a policy (exploration loop) or from explicit chart
//! configuration (chart-generator block).

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde_json::{Map, Value, json};
use tablequery::{SemanticType, Table, table::display_value};
use tracing::debug;

use super::field::field_kinds;
use super::policy::ChartPlan;

const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";
const CHART_WIDTH: u32 = 600;
const CHART_HEIGHT: u32 = 400;

/// Chart types the generator block accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Area,
    Pie,
    Heatmap,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
            ChartKind::Area => "area",
            ChartKind::Pie => "pie",
            ChartKind::Heatmap => "heatmap",
        }
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "scatter" => Ok(ChartKind::Scatter),
            "area" => Ok(ChartKind::Area),
            "pie" => Ok(ChartKind::Pie),
            "heatmap" => Ok(ChartKind::Heatmap),
            other => Err(format!("Unsupported chart type: {}", other)),
        }
    }
}

/// Build a spec for a policy decision
pub fn spec_for_plan(plan: &ChartPlan, table: &Table) -> Value {
    debug!(?plan, "spec_for_plan: called");
    match plan {
        ChartPlan::FrequencyBar { field, top } => frequency_bar(table, field, *top),
        ChartPlan::Histogram { field } => histogram(table, field),
        ChartPlan::Bar { x, y, limit } => {
            let head = table.head(*limit);
            base_spec(&head, "bar")
                .with_encoding("x", field_encoding(x, SemanticType::Nominal))
                .with_encoding("y", field_encoding(y, SemanticType::Quantitative))
                .build()
        }
        ChartPlan::Scatter { x, y, limit } => {
            let head = table.head(*limit);
            base_spec(&head, "point")
                .with_encoding("x", field_encoding(x, SemanticType::Quantitative))
                .with_encoding("y", field_encoding(y, SemanticType::Quantitative))
                .build()
        }
    }
}

/// Build a spec from explicit chart configuration (chart-generator block)
pub fn build_chart_spec(
    table: &Table,
    kind: ChartKind,
    x_field: &str,
    y_field: &str,
    color_field: Option<&str>,
    size_field: Option<&str>,
) -> Value {
    debug!(kind = kind.as_str(), %x_field, %y_field, "build_chart_spec: called");
    let kinds = field_kinds(table);
    let kind_of = |name: &str| kinds.get(name).copied().unwrap_or(SemanticType::Nominal);

    let mark = match kind {
        ChartKind::Bar => json!("bar"),
        ChartKind::Line => json!({"type": "line", "point": true}),
        ChartKind::Scatter => json!("circle"),
        ChartKind::Area => json!("area"),
        ChartKind::Pie => json!("arc"),
        ChartKind::Heatmap => json!("rect"),
    };

    let mut encoding = Map::new();
    match kind {
        ChartKind::Pie => {
            encoding.insert("theta".to_string(), field_encoding(y_field, SemanticType::Quantitative));
            encoding.insert("color".to_string(), field_encoding(x_field, kind_of(x_field)));
        }
        ChartKind::Heatmap => {
            encoding.insert("x".to_string(), field_encoding(x_field, kind_of(x_field)));
            encoding.insert("y".to_string(), field_encoding(y_field, kind_of(y_field)));
            let heat = color_field.unwrap_or(y_field);
            encoding.insert(
                "color".to_string(),
                json!({"field": heat, "type": "quantitative", "scale": {"scheme": "viridis"}}),
            );
        }
        _ => {
            encoding.insert("x".to_string(), field_encoding(x_field, kind_of(x_field)));
            encoding.insert("y".to_string(), field_encoding(y_field, kind_of(y_field)));
            if let Some(color) = color_field {
                encoding.insert("color".to_string(), field_encoding(color, kind_of(color)));
            }
            if kind == ChartKind::Scatter
                && let Some(size) = size_field
            {
                encoding.insert("size".to_string(), field_encoding(size, SemanticType::Quantitative));
            }
        }
    }

    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "width": CHART_WIDTH,
        "height": CHART_HEIGHT,
        "title": format!("{} Chart", capitalize(kind.as_str())),
        "data": {"values": data_values(table)},
        "mark": mark,
        "encoding": encoding,
    })
}

fn frequency_bar(table: &Table, field: &str, top: usize) -> Value {
    // Count in first-seen order, then keep the top N by count
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for value in table.column_values(field) {
        if value.is_null() {
            continue;
        }
        let key = display_value(value);
        if !counts.contains_key(&key) {
            order.push(key.clone());
        }
        *counts.entry(key).or_insert(0) += 1;
    }

    let mut ranked: Vec<(String, u64)> = order.into_iter().map(|k| (k.clone(), counts[&k])).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top);

    let values: Vec<Value> = ranked
        .into_iter()
        .map(|(value, count)| json!({field: value, "count": count}))
        .collect();

    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "width": CHART_WIDTH,
        "height": CHART_HEIGHT,
        "title": format!("Top values of {}", field),
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": field, "type": "nominal", "sort": "-y", "title": field},
            "y": {"field": "count", "type": "quantitative", "title": "count"},
        },
    })
}

fn histogram(table: &Table, field: &str) -> Value {
    json!({
        "$schema": VEGA_LITE_SCHEMA,
        "width": CHART_WIDTH,
        "height": CHART_HEIGHT,
        "title": format!("Distribution of {}", field),
        "data": {"values": data_values(table)},
        "mark": "bar",
        "encoding": {
            "x": {"field": field, "type": "quantitative", "bin": true, "title": field},
            "y": {"aggregate": "count", "type": "quantitative", "title": "count"},
        },
    })
}

fn data_values(table: &Table) -> Vec<Value> {
    table.rows.iter().map(|row| Value::Object(row.clone())).collect()
}

fn field_encoding(field: &str, semantic_type: SemanticType) -> Value {
    json!({"field": field, "type": semantic_type.as_str(), "title": field})
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

struct SpecBuilder {
    spec: Value,
    encoding: BTreeMap<String, Value>,
}

fn base_spec(table: &Table, mark: &str) -> SpecBuilder {
    SpecBuilder {
        spec: json!({
            "$schema": VEGA_LITE_SCHEMA,
            "width": CHART_WIDTH,
            "height": CHART_HEIGHT,
            "data": {"values": data_values(table)},
            "mark": mark,
        }),
        encoding: BTreeMap::new(),
    }
}

impl SpecBuilder {
    fn with_encoding(mut self, channel: &str, encoding: Value) -> Self {
        self.encoding.insert(channel.to_string(), encoding);
        self
    }

    fn build(mut self) -> Value {
        let encoding: Map<String, Value> = self.encoding.into_iter().collect();
        self.spec["encoding"] = Value::Object(encoding);
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_table() -> Table {
        let rows = vec![("east", 10), ("west", 20), ("east", 5)]
            .into_iter()
            .map(|(region, sales)| {
                let mut row = Map::new();
                row.insert("region".to_string(), json!(region));
                row.insert("sales".to_string(), json!(sales));
                row
            })
            .collect();
        Table::from_rows(rows)
    }

    #[test]
    fn test_frequency_bar_counts_and_ranks() {
        let plan = ChartPlan::FrequencyBar {
            field: "region".to_string(),
            top: 10,
        };
        let spec = spec_for_plan(&plan, &sales_table());

        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        // "east" appears twice, so it ranks first
        assert_eq!(values[0]["region"], json!("east"));
        assert_eq!(values[0]["count"], json!(2));
        assert_eq!(spec["mark"], json!("bar"));
    }

    #[test]
    fn test_frequency_bar_truncates_to_top() {
        let rows = (0..30)
            .map(|i| {
                let mut row = Map::new();
                row.insert("id".to_string(), json!(format!("v{}", i)));
                row
            })
            .collect();
        let table = Table::from_rows(rows);

        let plan = ChartPlan::FrequencyBar {
            field: "id".to_string(),
            top: 10,
        };
        let spec = spec_for_plan(&plan, &table);
        assert_eq!(spec["data"]["values"].as_array().unwrap().len(), 10);
    }

    #[test]
    fn test_histogram_bins_x() {
        let plan = ChartPlan::Histogram {
            field: "sales".to_string(),
        };
        let spec = spec_for_plan(&plan, &sales_table());
        assert_eq!(spec["encoding"]["x"]["bin"], json!(true));
        assert_eq!(spec["encoding"]["y"]["aggregate"], json!("count"));
    }

    #[test]
    fn test_bar_plan_limits_rows() {
        let rows = (0..50)
            .map(|i| {
                let mut row = Map::new();
                row.insert("k".to_string(), json!(format!("k{}", i)));
                row.insert("v".to_string(), json!(i));
                row
            })
            .collect();
        let table = Table::from_rows(rows);

        let plan = ChartPlan::Bar {
            x: "k".to_string(),
            y: "v".to_string(),
            limit: 20,
        };
        let spec = spec_for_plan(&plan, &table);
        assert_eq!(spec["data"]["values"].as_array().unwrap().len(), 20);
        assert_eq!(spec["encoding"]["x"]["type"], json!("nominal"));
        assert_eq!(spec["encoding"]["y"]["type"], json!("quantitative"));
    }

    #[test]
    fn test_build_chart_spec_pie_uses_theta() {
        let spec = build_chart_spec(&sales_table(), ChartKind::Pie, "region", "sales", None, None);
        assert_eq!(spec["mark"], json!("arc"));
        assert_eq!(spec["encoding"]["theta"]["field"], json!("sales"));
        assert_eq!(spec["encoding"]["color"]["field"], json!("region"));
    }

    #[test]
    fn test_build_chart_spec_heatmap_color_scale() {
        let spec = build_chart_spec(&sales_table(), ChartKind::Heatmap, "region", "sales", None, None);
        assert_eq!(spec["mark"], json!("rect"));
        assert_eq!(spec["encoding"]["color"]["scale"]["scheme"], json!("viridis"));
    }

    #[test]
    fn test_build_chart_spec_scatter_size_encoding() {
        let spec = build_chart_spec(
            &sales_table(),
            ChartKind::Scatter,
            "sales",
            "sales",
            None,
            Some("sales"),
        );
        assert_eq!(spec["encoding"]["size"]["field"], json!("sales"));
    }

    #[test]
    fn test_chart_kind_round_trip() {
        for name in ["bar", "line", "scatter", "area", "pie", "heatmap"] {
            let kind: ChartKind = name.parse().unwrap();
            assert_eq!(kind.as_str(), name);
        }
        assert!("sparkline".parse::<ChartKind>().is_err());
    }
}
