//! Field-kind inference for charting
//!
//! Charting reuses the semantic types from the schema layer. The ordinal rule
//! matters here: a numeric column with fewer than 20 distinct values and fewer
//! distinct values than half the row count plots as a category axis, not a
//! measure.

use std::collections::BTreeMap;

use tablequery::{SemanticType, Table, infer_schema};
use tracing::debug;

/// Semantic kind of every column, from the attached schema or fresh inference
pub fn field_kinds(table: &Table) -> BTreeMap<String, SemanticType> {
    debug!(columns = table.column_count(), "field_kinds: called");
    let schema = match &table.schema {
        Some(schema) => schema.clone(),
        None => infer_schema(table),
    };
    schema.into_iter().map(|(name, info)| (name, info.semantic_type)).collect()
}

/// Whether a field plots as a category axis
pub fn is_categorical(kind: SemanticType) -> bool {
    !matches!(kind, SemanticType::Quantitative)
}
