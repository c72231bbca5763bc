//! TableQuery - In-memory tabular data model with SQLite-backed query execution
//!
//! TableQuery provides the data layer for DataScout analysis blocks: an immutable
//! columnar table snapshot, semantic-type schema inference, LLM-facing summaries,
//! and a SQL execution boundary backed by an in-memory SQLite database.
//!
//! # Core Concepts
//!
//! - **Tables Are Snapshots**: every transformation produces a new [`Table`];
//!   nothing mutates a table in place
//! - **Schema Is Optional**: inference is a separate, explicit step
//! - **SQL Is a Boundary**: callers depend on the [`QueryEngine`] trait, not on
//!   SQLite directly
//!
//! # Modules
//!
//! - [`table`] - the Table value type
//! - [`schema`] - semantic types and schema inference
//! - [`summary`] - text/HTML summaries for prompts and previews
//! - [`engine`] - QueryEngine trait and the SQLite implementation
//! - [`error`] - error types

pub mod engine;
pub mod error;
pub mod schema;
pub mod summary;
pub mod table;

// Re-export commonly used types
pub use engine::{QueryEngine, SqliteEngine};
pub use error::QueryError;
pub use schema::{ColumnSchema, NumericStats, Schema, SemanticType, infer_schema};
pub use summary::{preview_text, summarize, to_html};
pub use table::Table;
