//! QueryEngine trait and the SQLite implementation
//!
//! The engine boundary is a single call: a table in, a SQL string in, a new table
//! out. [`SqliteEngine`] loads the table into an in-memory SQLite database under a
//! fixed registration name, runs the query, and reads the result back. Each call
//! uses a fresh connection; nothing persists between queries.

use rusqlite::Connection;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::QueryError;
use crate::table::Table;

/// SQL execution over an in-memory table
pub trait QueryEngine: Send + Sync {
    /// Execute `sql` against `table`, producing a new table
    ///
    /// The input table is visible to the query under the engine's registration
    /// name. The input is never modified.
    fn query(&self, table: &Table, sql: &str) -> Result<Table, QueryError>;

    /// Name under which the input table is registered
    fn table_name(&self) -> &str;
}

/// SQLite-backed query engine
pub struct SqliteEngine {
    table_name: String,
}

impl SqliteEngine {
    /// Engine registering the input table as `data`
    pub fn new() -> Self {
        Self::named("data")
    }

    /// Engine registering the input table under a custom name
    pub fn named(table_name: impl Into<String>) -> Self {
        let table_name = table_name.into();
        debug!(%table_name, "SqliteEngine::named: called");
        Self { table_name }
    }

    fn load(&self, conn: &Connection, table: &Table) -> Result<(), QueryError> {
        if table.columns.is_empty() {
            return Err(QueryError::Load("table has no columns".to_string()));
        }

        // Columns are declared without a type: SQLite then stores every value
        // with its own affinity, matching the dynamic rows we hold
        let column_list: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
        let create = format!("CREATE TABLE {} ({})", quote_ident(&self.table_name), column_list.join(", "));
        conn.execute(&create, [])
            .map_err(|e| QueryError::Load(e.to_string()))?;

        let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{}", i)).collect();
        let insert = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(&self.table_name),
            column_list.join(", "),
            placeholders.join(", ")
        );
        let mut stmt = conn.prepare(&insert).map_err(|e| QueryError::Load(e.to_string()))?;

        for row in &table.rows {
            let values: Vec<SqlValue> = table
                .columns
                .iter()
                .map(|c| to_sql_value(row.get(c).unwrap_or(&Value::Null)))
                .collect();
            stmt.execute(rusqlite::params_from_iter(values))
                .map_err(|e| QueryError::Load(e.to_string()))?;
        }

        Ok(())
    }
}

impl Default for SqliteEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryEngine for SqliteEngine {
    fn query(&self, table: &Table, sql: &str) -> Result<Table, QueryError> {
        debug!(table_name = %self.table_name, rows = table.row_count(), %sql, "SqliteEngine::query: called");
        let conn = Connection::open_in_memory().map_err(|e| QueryError::Load(e.to_string()))?;
        self.load(&conn, table)?;

        let mut stmt = conn.prepare(sql).map_err(|e| QueryError::execution(e.to_string(), sql))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let column_count = columns.len();

        let mut out_rows: Vec<Map<String, Value>> = Vec::new();
        let mut rows = stmt.query([]).map_err(|e| QueryError::execution(e.to_string(), sql))?;
        while let Some(row) = rows.next().map_err(|e| QueryError::execution(e.to_string(), sql))? {
            let mut out = Map::new();
            for (i, name) in columns.iter().enumerate().take(column_count) {
                let value = row.get_ref(i).map_err(|e| QueryError::execution(e.to_string(), sql))?;
                out.insert(name.clone(), from_sql_value(value));
            }
            out_rows.push(out);
        }

        debug!(result_rows = out_rows.len(), result_columns = column_count, "SqliteEngine::query: complete");
        Ok(Table::new(columns, out_rows))
    }

    fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// Quote an identifier for SQLite (embedded quotes doubled)
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// JSON scalar -> SQLite value (arrays/objects stored as JSON text)
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// SQLite value -> JSON scalar
fn from_sql_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Number(i.into()),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales_table() -> Table {
        let rows = vec![("east", 10), ("west", 20), ("north", 15)]
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
    fn test_select_order_limit() {
        let engine = SqliteEngine::new();
        let result = engine
            .query(&sales_table(), "SELECT region, sales FROM data ORDER BY sales DESC LIMIT 1")
            .unwrap();

        assert_eq!(result.columns, vec!["region", "sales"]);
        assert_eq!(result.row_count(), 1);
        assert_eq!(result.rows[0]["region"], json!("west"));
        assert_eq!(result.rows[0]["sales"], json!(20));
    }

    #[test]
    fn test_aggregate_with_alias() {
        let engine = SqliteEngine::new();
        let result = engine
            .query(&sales_table(), "SELECT COUNT(*) AS n, SUM(sales) AS total FROM data")
            .unwrap();

        assert_eq!(result.rows[0]["n"], json!(3));
        assert_eq!(result.rows[0]["total"], json!(45));
    }

    #[test]
    fn test_malformed_sql_carries_query_text() {
        let engine = SqliteEngine::new();
        let err = engine.query(&sales_table(), "SELEC oops").unwrap_err();

        match err {
            QueryError::Execution { sql, .. } => assert_eq!(sql, "SELEC oops"),
            other => panic!("expected Execution error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_column_fails() {
        let engine = SqliteEngine::new();
        let err = engine.query(&sales_table(), "SELECT nope FROM data").unwrap_err();
        assert!(err.to_string().contains("SELECT nope FROM data"));
    }

    #[test]
    fn test_input_table_unchanged() {
        let engine = SqliteEngine::new();
        let table = sales_table();
        let before = table.clone();

        let _ = engine.query(&table, "SELECT region FROM data WHERE sales > 10").unwrap();
        assert_eq!(table, before);
    }

    #[test]
    fn test_same_query_twice_is_structurally_equal() {
        let engine = SqliteEngine::new();
        let table = sales_table();
        let sql = "SELECT region, sales FROM data ORDER BY sales";

        let first = engine.query(&table, sql).unwrap();
        let second = engine.query(&table, sql).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_keys_read_as_null() {
        let mut full = Map::new();
        full.insert("a".to_string(), json!(1));
        full.insert("b".to_string(), json!(2));
        let mut partial = Map::new();
        partial.insert("a".to_string(), json!(3));
        let table = Table::from_rows(vec![full, partial]);

        let engine = SqliteEngine::new();
        let result = engine.query(&table, "SELECT b FROM data ORDER BY a").unwrap();
        assert_eq!(result.rows[0]["b"], json!(2));
        assert_eq!(result.rows[1]["b"], Value::Null);
    }

    #[test]
    fn test_custom_registration_name() {
        let engine = SqliteEngine::named("input_data");
        let result = engine.query(&sales_table(), "SELECT COUNT(*) AS n FROM input_data").unwrap();
        assert_eq!(result.rows[0]["n"], json!(3));
    }

    #[test]
    fn test_empty_table_loads() {
        let engine = SqliteEngine::new();
        let table = Table::new(vec!["x".to_string()], vec![]);
        let result = engine.query(&table, "SELECT COUNT(*) AS n FROM data").unwrap();
        assert_eq!(result.rows[0]["n"], json!(0));
    }

    #[test]
    fn test_no_columns_is_load_error() {
        let engine = SqliteEngine::new();
        let err = engine.query(&Table::new(vec![], vec![]), "SELECT 1").unwrap_err();
        assert!(matches!(err, QueryError::Load(_)));
    }
}
