//! Semantic column types and schema inference
//!
//! Columns are classified into the four Vega-Lite-style semantic types. Numeric
//! columns with low cardinality (fewer than 20 distinct values and fewer distinct
//! values than half the row count) classify as ordinal; other numeric columns are
//! quantitative. Values parseable as dates or datetimes are temporal. Everything
//! else is nominal.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::table::{Table, as_f64};

/// Cardinality cutoff below which a numeric column reads as ordinal
const ORDINAL_MAX_UNIQUE: usize = 20;

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    Quantitative,
    Ordinal,
    Nominal,
    Temporal,
}

impl SemanticType {
    /// Display name matching the wire format
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::Quantitative => "quantitative",
            SemanticType::Ordinal => "ordinal",
            SemanticType::Nominal => "nominal",
            SemanticType::Temporal => "temporal",
        }
    }
}

/// Min/max/mean summary for numeric columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Inferred description of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name
    pub name: String,

    /// Semantic type
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,

    /// Whether any row is missing a value for this column
    pub nullable: bool,

    /// Number of distinct non-null values
    pub unique_count: usize,

    /// Summary statistics for quantitative/ordinal columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<NumericStats>,

    /// Up to 10 distinct values for low-cardinality nominal columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<Value>,
}

/// Schema: column name -> inferred description
pub type Schema = BTreeMap<String, ColumnSchema>;

/// Infer a schema for every column of `table`
pub fn infer_schema(table: &Table) -> Schema {
    debug!(columns = table.column_count(), rows = table.row_count(), "infer_schema: called");
    let mut schema = Schema::new();

    for column in &table.columns {
        let info = infer_column(table, column);
        schema.insert(column.clone(), info);
    }

    schema
}

fn infer_column(table: &Table, column: &str) -> ColumnSchema {
    let row_count = table.row_count();
    let values: Vec<&Value> = table.column_values(column).collect();
    let non_null: Vec<&Value> = values.iter().copied().filter(|v| !v.is_null()).collect();
    let nullable = non_null.len() < row_count;
    let unique = table.unique_values(column);
    let unique_count = unique.len();

    let numeric: Vec<f64> = non_null.iter().filter_map(|v| numeric_only(v)).collect();
    let all_numeric = !non_null.is_empty() && numeric.len() == non_null.len();
    let all_temporal = !non_null.is_empty() && non_null.iter().all(|v| is_temporal(v));

    if all_numeric {
        let semantic_type = if unique_count < ORDINAL_MAX_UNIQUE && unique_count * 2 < row_count {
            SemanticType::Ordinal
        } else {
            SemanticType::Quantitative
        };
        let min = numeric.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = numeric.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mean = numeric.iter().sum::<f64>() / numeric.len() as f64;
        return ColumnSchema {
            name: column.to_string(),
            semantic_type,
            nullable,
            unique_count,
            stats: Some(NumericStats { min, max, mean }),
            sample_values: Vec::new(),
        };
    }

    if all_temporal {
        return ColumnSchema {
            name: column.to_string(),
            semantic_type: SemanticType::Temporal,
            nullable,
            unique_count,
            stats: None,
            sample_values: Vec::new(),
        };
    }

    let sample_values = if unique_count <= 10 { unique } else { Vec::new() };
    ColumnSchema {
        name: column.to_string(),
        semantic_type: SemanticType::Nominal,
        nullable,
        unique_count,
        stats: None,
        sample_values,
    }
}

/// Numeric interpretation for typing purposes: JSON numbers only
///
/// Numeric strings stay nominal here - "01234" zip codes should not turn a text
/// column quantitative.
fn numeric_only(value: &Value) -> Option<f64> {
    match value {
        Value::Number(_) => as_f64(value),
        _ => None,
    }
}

/// Whether a value parses as a date or datetime
pub fn is_temporal(value: &Value) -> bool {
    let Value::String(s) = value else {
        return false;
    };
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok()
        || chrono::DateTime::parse_from_rfc3339(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, json};

    fn table_of(column: &str, values: Vec<Value>) -> Table {
        let rows = values
            .into_iter()
            .map(|v| {
                let mut row = Map::new();
                row.insert(column.to_string(), v);
                row
            })
            .collect();
        Table::from_rows(rows)
    }

    #[test]
    fn test_quantitative_column_with_stats() {
        let values: Vec<Value> = (0..50).map(|i| json!(i)).collect();
        let table = table_of("x", values);

        let schema = infer_schema(&table);
        let col = &schema["x"];
        assert_eq!(col.semantic_type, SemanticType::Quantitative);
        let stats = col.stats.as_ref().unwrap();
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 49.0);
        assert!((stats.mean - 24.5).abs() < 1e-9);
    }

    #[test]
    fn test_low_cardinality_numeric_is_ordinal() {
        // 3 distinct values over 50 rows: ordinal
        let values: Vec<Value> = (0..50).map(|i| json!(i % 3)).collect();
        let table = table_of("rank", values);

        let schema = infer_schema(&table);
        assert_eq!(schema["rank"].semantic_type, SemanticType::Ordinal);
        assert_eq!(schema["rank"].unique_count, 3);
    }

    #[test]
    fn test_numeric_with_high_relative_cardinality_stays_quantitative() {
        // 2 distinct values over 3 rows: 2*2 >= 3, so quantitative
        let table = table_of("x", vec![json!(1), json!(2), json!(1)]);

        let schema = infer_schema(&table);
        assert_eq!(schema["x"].semantic_type, SemanticType::Quantitative);
    }

    #[test]
    fn test_temporal_column() {
        let table = table_of(
            "day",
            vec![json!("2024-01-01"), json!("2024-01-02"), json!("2024-02-01")],
        );

        let schema = infer_schema(&table);
        assert_eq!(schema["day"].semantic_type, SemanticType::Temporal);
    }

    #[test]
    fn test_nominal_column_samples_low_cardinality() {
        let table = table_of("region", vec![json!("east"), json!("west"), json!("east")]);

        let schema = infer_schema(&table);
        let col = &schema["region"];
        assert_eq!(col.semantic_type, SemanticType::Nominal);
        assert_eq!(col.unique_count, 2);
        assert_eq!(col.sample_values, vec![json!("east"), json!("west")]);
    }

    #[test]
    fn test_nullable_detection() {
        let table = table_of("x", vec![json!(1), Value::Null, json!(3)]);

        let schema = infer_schema(&table);
        assert!(schema["x"].nullable);
    }

    #[test]
    fn test_numeric_strings_stay_nominal() {
        let table = table_of("zip", vec![json!("01234"), json!("98765")]);

        let schema = infer_schema(&table);
        assert_eq!(schema["zip"].semantic_type, SemanticType::Nominal);
    }
}
