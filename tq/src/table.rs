//! Table value type
//!
//! An ordered set of named columns plus a sequence of rows. Rows are JSON objects
//! keyed by column name; rows need not carry every key (missing keys read as null).
//! Tables are value snapshots - transformations build new tables.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::Schema;

/// Immutable snapshot of columnar data with an optional inferred schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    /// Column names in display order
    pub columns: Vec<String>,

    /// Data rows, keyed by column name
    pub rows: Vec<Map<String, Value>>,

    /// Inferred schema, if inference has been run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

impl Table {
    /// Create a table from explicit columns and rows
    pub fn new(columns: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        debug!(column_count = columns.len(), row_count = rows.len(), "Table::new: called");
        Self {
            columns,
            rows,
            schema: None,
        }
    }

    /// Create a table from rows alone, deriving column order
    ///
    /// Column order follows the first row's key order; keys that only appear in
    /// later rows are appended in first-seen order.
    pub fn from_rows(rows: Vec<Map<String, Value>>) -> Self {
        debug!(row_count = rows.len(), "Table::from_rows: called");
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self {
            columns,
            rows,
            schema: None,
        }
    }

    /// Attach an inferred schema
    pub fn with_schema(mut self, schema: Schema) -> Self {
        debug!(column_count = schema.len(), "Table::with_schema: called");
        self.schema = Some(schema);
        self
    }

    /// Number of data rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// (rows, columns) pair
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    /// Whether the table has no data rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// New table containing at most the first `n` rows (schema not carried over)
    pub fn head(&self, n: usize) -> Table {
        debug!(n, row_count = self.rows.len(), "Table::head: called");
        Table::new(self.columns.clone(), self.rows.iter().take(n).cloned().collect())
    }

    /// Value of `column` in each row; missing keys read as `Value::Null`
    pub fn column_values<'a>(&'a self, column: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| row.get(column).unwrap_or(&Value::Null))
    }

    /// Non-null values of `column` parsed as f64 (integers widen; numeric strings parse)
    pub fn numeric_values(&self, column: &str) -> Vec<f64> {
        self.column_values(column).filter_map(as_f64).collect()
    }

    /// Distinct values of `column` (by JSON string form), in first-seen order
    pub fn unique_values(&self, column: &str) -> Vec<Value> {
        let mut seen: Vec<String> = Vec::new();
        let mut unique = Vec::new();
        for value in self.column_values(column) {
            if value.is_null() {
                continue;
            }
            let key = value.to_string();
            if !seen.contains(&key) {
                seen.push(key);
                unique.push(value.clone());
            }
        }
        unique
    }
}

/// Interpret a JSON value as f64 where possible
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Render a scalar value for display (strings unquoted, others in JSON form)
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
