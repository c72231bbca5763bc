//! Chart selection policy
//!
//! The exploration loop asks a policy what (if anything) to draw for a result
//! table. The default policy is a fixed decision table over column count and
//! field kinds; smarter policies can be swapped in without touching the loop.

use tablequery::Table;
use tracing::debug;

use super::field::{field_kinds, is_categorical};

/// Rows kept for bar charts built from raw rows
const BAR_ROW_LIMIT: usize = 20;

/// Rows kept for scatter plots
const SCATTER_ROW_LIMIT: usize = 100;

/// Distinct values kept for frequency bars
const FREQUENCY_TOP: usize = 10;

/// A concrete charting decision for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartPlan {
    /// Bar chart of the most frequent values of one categorical field
    FrequencyBar { field: String, top: usize },

    /// Auto-binned histogram of one numeric field
    Histogram { field: String },

    /// Bar chart of a category field against a numeric field
    Bar { x: String, y: String, limit: usize },

    /// Scatter plot of two numeric fields
    Scatter { x: String, y: String, limit: usize },
}

impl ChartPlan {
    /// Chart-type tag recorded alongside rendered images
    pub fn kind_tag(&self) -> &'static str {
        match self {
            ChartPlan::FrequencyBar { .. } | ChartPlan::Bar { .. } => "bar",
            ChartPlan::Histogram { .. } => "histogram",
            ChartPlan::Scatter { .. } => "scatter",
        }
    }
}

/// Decides what chart, if any, suits a result table
pub trait ChartPolicy: Send + Sync {
    fn choose(&self, table: &Table) -> Option<ChartPlan>;
}

/// The fixed decision table over column count and field kinds
pub struct DefaultPolicy;

impl ChartPolicy for DefaultPolicy {
    fn choose(&self, table: &Table) -> Option<ChartPlan> {
        debug!(shape = ?table.shape(), "DefaultPolicy::choose: called");
        if table.is_empty() || table.columns.is_empty() {
            return None;
        }

        let kinds = field_kinds(table);
        let categorical =
            |name: &str| kinds.get(name).copied().map(is_categorical).unwrap_or(true);

        match table.columns.as_slice() {
            [only] => {
                if categorical(only) {
                    Some(ChartPlan::FrequencyBar {
                        field: only.clone(),
                        top: FREQUENCY_TOP,
                    })
                } else {
                    Some(ChartPlan::Histogram { field: only.clone() })
                }
            }
            [first, second] => match (categorical(first), categorical(second)) {
                (true, false) => Some(ChartPlan::Bar {
                    x: first.clone(),
                    y: second.clone(),
                    limit: BAR_ROW_LIMIT,
                }),
                (false, true) => Some(ChartPlan::Bar {
                    x: second.clone(),
                    y: first.clone(),
                    limit: BAR_ROW_LIMIT,
                }),
                (false, false) => Some(ChartPlan::Scatter {
                    x: first.clone(),
                    y: second.clone(),
                    limit: SCATTER_ROW_LIMIT,
                }),
                (true, true) => Some(ChartPlan::Bar {
                    x: first.clone(),
                    y: second.clone(),
                    limit: BAR_ROW_LIMIT,
                }),
            },
            columns => Some(ChartPlan::Bar {
                x: columns[0].clone(),
                y: columns[1].clone(),
                limit: BAR_ROW_LIMIT,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value, json};

    fn table_with(columns: Vec<(&str, Vec<Value>)>) -> Table {
        let row_count = columns.first().map(|(_, v)| v.len()).unwrap_or(0);
        let rows = (0..row_count)
            .map(|i| {
                let mut row = Map::new();
                for (name, values) in &columns {
                    row.insert(name.to_string(), values[i].clone());
                }
                row
            })
            .collect();
        Table::from_rows(rows)
    }

    #[test]
    fn test_single_categorical_column_frequency_bar() {
        let table = table_with(vec![("region", vec![json!("east"), json!("west"), json!("east")])]);
        let plan = DefaultPolicy.choose(&table).unwrap();
        assert_eq!(
            plan,
            ChartPlan::FrequencyBar {
                field: "region".to_string(),
                top: 10
            }
        );
        assert_eq!(plan.kind_tag(), "bar");
    }

    #[test]
    fn test_single_numeric_column_histogram() {
        let values: Vec<Value> = (0..30).map(|i| json!(i)).collect();
        let table = table_with(vec![("amount", values)]);
        let plan = DefaultPolicy.choose(&table).unwrap();
        assert_eq!(plan, ChartPlan::Histogram { field: "amount".to_string() });
    }

    #[test]
    fn test_categorical_numeric_pair_bar() {
        let table = table_with(vec![
            ("region", vec![json!("east"), json!("west")]),
            ("sales", vec![json!(10), json!(20)]),
        ]);
        let plan = DefaultPolicy.choose(&table).unwrap();
        assert_eq!(
            plan,
            ChartPlan::Bar {
                x: "region".to_string(),
                y: "sales".to_string(),
                limit: 20
            }
        );
    }

    #[test]
    fn test_numeric_categorical_pair_swaps_axes() {
        let table = table_with(vec![
            ("sales", vec![json!(10), json!(20)]),
            ("region", vec![json!("east"), json!("west")]),
        ]);
        let plan = DefaultPolicy.choose(&table).unwrap();
        assert_eq!(
            plan,
            ChartPlan::Bar {
                x: "region".to_string(),
                y: "sales".to_string(),
                limit: 20
            }
        );
    }

    #[test]
    fn test_numeric_pair_scatter() {
        let xs: Vec<Value> = (0..40).map(|i| json!(i)).collect();
        let ys: Vec<Value> = (0..40).map(|i| json!(i * 2 + 1)).collect();
        let table = table_with(vec![("x", xs), ("y", ys)]);
        let plan = DefaultPolicy.choose(&table).unwrap();
        assert_eq!(
            plan,
            ChartPlan::Scatter {
                x: "x".to_string(),
                y: "y".to_string(),
                limit: 100
            }
        );
    }

    #[test]
    fn test_wide_table_bars_first_two_columns() {
        let table = table_with(vec![
            ("a", vec![json!("x")]),
            ("b", vec![json!(1)]),
            ("c", vec![json!(2)]),
        ]);
        let plan = DefaultPolicy.choose(&table).unwrap();
        assert_eq!(
            plan,
            ChartPlan::Bar {
                x: "a".to_string(),
                y: "b".to_string(),
                limit: 20
            }
        );
    }

    #[test]
    fn test_empty_table_no_chart() {
        let table = Table::new(vec!["a".to_string()], vec![]);
        assert!(DefaultPolicy.choose(&table).is_none());
    }
}
