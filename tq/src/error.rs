//! Query error types

use thiserror::Error;

/// Errors that can occur while executing a query against a table
#[derive(Debug, Error)]
pub enum QueryError {
    /// The query failed to parse or execute; carries the offending SQL
    #[error("SQL execution failed: {message}\nQuery: {sql}")]
    Execution { message: String, sql: String },

    /// The input table cannot be loaded into the engine
    #[error("Cannot load table: {0}")]
    Load(String),
}

impl QueryError {
    /// Wrap an engine failure together with the query that caused it
    pub fn execution(message: impl Into<String>, sql: impl Into<String>) -> Self {
        QueryError::Execution {
            message: message.into(),
            sql: sql.into(),
        }
    }
}
