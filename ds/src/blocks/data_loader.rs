//! data-loader block
//!
//! Loads tabular data from CSV, JSON, or SQLite sources into the standard
//! table format with schema inference and an HTML preview.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use tablequery::{Table, infer_schema, summary};

use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;

const PREVIEW_ROWS: usize = 10;

const PREVIEW_STYLE: &str = r#"<style>
.data-table { border-collapse: collapse; width: 100%; font-size: 12px; }
.data-table th { background-color: #4CAF50; color: white; padding: 8px; text-align: left; }
.data-table td { border: 1px solid #ddd; padding: 8px; }
.info-box { background: #e3f2fd; padding: 12px; border-radius: 4px; margin-bottom: 16px; font-size: 14px; }
</style>"#;

/// Supported data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Csv,
    Json,
    Sqlite,
}

impl SourceType {
    fn as_str(&self) -> &'static str {
        match self {
            SourceType::Csv => "CSV",
            SourceType::Json => "JSON",
            SourceType::Sqlite => "SQLITE",
        }
    }
}

/// data-loader inputs
#[derive(Debug, Deserialize)]
pub struct LoadParams {
    pub source_type: SourceType,
    pub file_path: String,
    /// SQL query for sqlite sources
    #[serde(default)]
    pub query: Option<String>,
}

/// data-loader outputs
#[derive(Debug, Serialize)]
pub struct LoadOutput {
    pub data_table: Table,
    pub preview_html: String,
}

/// Load tabular data and emit a preview
pub async fn load_data(params: &LoadParams, ctx: &BlockContext) -> Result<LoadOutput, BlockError> {
    debug!(source_type = ?params.source_type, file_path = %params.file_path, "load_data: called");
    ctx.host.report_progress(0);

    if params.file_path.is_empty() {
        return Err(BlockError::InvalidInput(format!(
            "File path is required for {} source",
            params.source_type.as_str().to_lowercase()
        )));
    }

    ctx.host.report_progress(20);

    let table = match params.source_type {
        SourceType::Csv => load_csv(&params.file_path)?,
        SourceType::Json => load_json(&params.file_path)?,
        SourceType::Sqlite => load_sqlite(&params.file_path, params.query.as_deref())?,
    };

    ctx.host.report_progress(60);

    if table.is_empty() {
        return Err(BlockError::InvalidInput("Loaded data is empty".to_string()));
    }

    let schema = infer_schema(&table);
    let table = table.with_schema(schema);

    ctx.host.report_progress(80);

    let preview_html = summary::to_html(&table, PREVIEW_ROWS, "data-table");
    let (rows, columns) = table.shape();
    let full_preview = format!(
        "{}\n<div class=\"info-box\">\
         <strong>Source:</strong> {} file: {}<br>\
         <strong>Data:</strong> {} rows &times; {} columns\
         </div>\n<h3>Data Preview (First {} rows)</h3>\n{}",
        PREVIEW_STYLE,
        params.source_type.as_str(),
        summary::escape(&params.file_path),
        rows,
        columns,
        PREVIEW_ROWS,
        preview_html,
    );
    ctx.host.preview(Preview::Html(full_preview));

    ctx.host.report_progress(100);

    Ok(LoadOutput {
        data_table: table,
        preview_html,
    })
}

/// Load a CSV file, coercing cells to numbers/booleans where they parse
pub fn load_csv(path: &str) -> Result<Table, BlockError> {
    debug!(%path, "load_csv: called");
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| BlockError::InvalidInput(format!("Failed to load data from csv: {}", e)))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| BlockError::InvalidInput(format!("Failed to read CSV headers: {}", e)))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| BlockError::InvalidInput(format!("Failed to read CSV record: {}", e)))?;
        let mut row = Map::new();
        for (header, field) in headers.iter().zip(record.iter()) {
            row.insert(header.clone(), coerce_scalar(field));
        }
        rows.push(row);
    }

    Ok(Table::new(headers, rows))
}

/// Load a JSON file holding an array of row objects
pub fn load_json(path: &str) -> Result<Table, BlockError> {
    debug!(%path, "load_json: called");
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| BlockError::InvalidInput(format!("Failed to load data from json: {}", e)))?;

    let Value::Array(items) = value else {
        return Err(BlockError::InvalidInput(
            "JSON source must be an array of row objects".to_string(),
        ));
    };

    let mut rows = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Object(row) => rows.push(row),
            other => {
                return Err(BlockError::InvalidInput(format!(
                    "JSON source rows must be objects, found: {}",
                    other
                )));
            }
        }
    }

    Ok(Table::from_rows(rows))
}

/// Run a query against a SQLite database file
pub fn load_sqlite(path: &str, query: Option<&str>) -> Result<Table, BlockError> {
    debug!(%path, "load_sqlite: called");
    let query = query
        .filter(|q| !q.is_empty())
        .ok_or_else(|| BlockError::InvalidInput("SQL query is required for sqlite source".to_string()))?;

    let conn = rusqlite::Connection::open(path)
        .map_err(|e| BlockError::InvalidInput(format!("Failed to open sqlite database: {}", e)))?;
    let mut stmt = conn
        .prepare(query)
        .map_err(|e| BlockError::InvalidInput(format!("Database query failed: {}", e)))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();

    let mut rows = Vec::new();
    let mut result = stmt
        .query([])
        .map_err(|e| BlockError::InvalidInput(format!("Database query failed: {}", e)))?;
    while let Some(row) = result
        .next()
        .map_err(|e| BlockError::InvalidInput(format!("Database query failed: {}", e)))?
    {
        let mut out = Map::new();
        for (i, name) in columns.iter().enumerate() {
            let value = row
                .get_ref(i)
                .map_err(|e| BlockError::InvalidInput(format!("Database query failed: {}", e)))?;
            out.insert(name.clone(), sqlite_value_to_json(value));
        }
        rows.push(out);
    }

    Ok(Table::new(columns, rows))
}

fn sqlite_value_to_json(value: rusqlite::types::ValueRef<'_>) -> Value {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => json!(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

/// Parse a CSV cell: integer, float, boolean, empty -> null, else string
fn coerce_scalar(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return json!(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return json!(f);
    }
    match trimmed {
        "true" | "True" | "TRUE" => return json!(true),
        "false" | "False" | "FALSE" => return json!(false),
        _ => {}
    }
    Value::String(field.to_string())
}

/// Block wrapper for the registry
pub struct DataLoaderBlock;

#[async_trait]
impl Block for DataLoaderBlock {
    fn name(&self) -> &'static str {
        "data-loader"
    }

    fn description(&self) -> &'static str {
        "Load tabular data from CSV, JSON, or SQLite with schema inference"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: LoadParams = parse_params(inputs)?;
        let output = load_data(&params, ctx).await?;
        Ok(json!({
            "data_table": output.data_table,
            "preview_html": output.preview_html,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_coerces_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "region,sales,active").unwrap();
        writeln!(file, "east,10,true").unwrap();
        writeln!(file, "west,20.5,false").unwrap();
        writeln!(file, "north,,true").unwrap();

        let table = load_csv(path.to_str().unwrap()).unwrap();
        assert_eq!(table.columns, vec!["region", "sales", "active"]);
        assert_eq!(table.rows[0]["sales"], json!(10));
        assert_eq!(table.rows[1]["sales"], json!(20.5));
        assert_eq!(table.rows[2]["sales"], Value::Null);
        assert_eq!(table.rows[0]["active"], json!(true));
        assert_eq!(table.rows[0]["region"], json!("east"));
    }

    #[test]
    fn test_load_json_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"[{"a": 1, "b": "x"}, {"a": 2, "b": "y"}]"#).unwrap();

        let table = load_json(path.to_str().unwrap()).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1]["a"], json!(2));
    }

    #[test]
    fn test_load_json_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        let err = load_json(path.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, BlockError::InvalidInput(_)));
    }

    #[test]
    fn test_load_sqlite_requires_query() {
        let err = load_sqlite("/tmp/whatever.db", None).unwrap_err();
        assert!(err.to_string().contains("SQL query is required"));
    }

    #[test]
    fn test_load_sqlite_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.db");
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute("CREATE TABLE t (region TEXT, sales INTEGER)", []).unwrap();
        conn.execute("INSERT INTO t VALUES ('east', 10), ('west', 20)", []).unwrap();
        drop(conn);

        let table = load_sqlite(path.to_str().unwrap(), Some("SELECT * FROM t ORDER BY sales")).unwrap();
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1]["region"], json!("west"));
    }

    #[test]
    fn test_missing_file_is_invalid_input() {
        let err = load_csv("/nonexistent/data.csv").unwrap_err();
        assert!(matches!(err, BlockError::InvalidInput(_)));
    }
}
