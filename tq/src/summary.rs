//! Table summaries for prompts and previews
//!
//! [`summarize`] produces the LLM-facing description of a table: schema lines,
//! sample rows, and numeric statistics. [`preview_text`] renders an aligned text
//! grid, [`to_html`] a plain HTML table for host previews.

use serde_json::Value;
use tracing::debug;

use crate::schema::{SemanticType, infer_schema};
use crate::table::{Table, display_value};

/// Sample rows shown in the LLM summary
const SUMMARY_SAMPLE_ROWS: usize = 5;

/// Summarize table structure, sample data, and numeric stats for LLM context
pub fn summarize(table: &Table) -> String {
    debug!(rows = table.row_count(), columns = table.column_count(), "summarize: called");
    let schema = match &table.schema {
        Some(schema) => schema.clone(),
        None => infer_schema(table),
    };

    let mut parts = Vec::new();

    parts.push("Table Schema:".to_string());
    for column in &table.columns {
        let Some(info) = schema.get(column) else { continue };
        let nulls = table.column_values(column).filter(|v| v.is_null()).count();
        let mut line = format!(
            "  - {} ({}): {} unique values, {} nulls",
            column,
            info.semantic_type.as_str(),
            info.unique_count,
            nulls
        );
        if let Some(stats) = &info.stats {
            line.push_str(&format!(", range: {} to {}", fmt_num(stats.min), fmt_num(stats.max)));
        }
        if !info.sample_values.is_empty() {
            let samples: Vec<String> = info.sample_values.iter().take(5).map(display_value).collect();
            line.push_str(&format!(", values: {}", samples.join(", ")));
        }
        parts.push(line);
    }

    parts.push(format!("\nSample rows (first {}):", SUMMARY_SAMPLE_ROWS));
    parts.push(preview_text(table, SUMMARY_SAMPLE_ROWS));

    let numeric: Vec<&String> = table
        .columns
        .iter()
        .filter(|c| {
            schema
                .get(*c)
                .is_some_and(|i| matches!(i.semantic_type, SemanticType::Quantitative | SemanticType::Ordinal))
        })
        .collect();
    if !numeric.is_empty() {
        parts.push("\nNumeric column statistics:".to_string());
        for column in numeric {
            if let Some(stats) = schema.get(column).and_then(|i| i.stats.as_ref()) {
                parts.push(format!(
                    "  {}: min={} max={} mean={}",
                    column,
                    fmt_num(stats.min),
                    fmt_num(stats.max),
                    fmt_num(stats.mean)
                ));
            }
        }
    }

    parts.join("\n")
}

/// Render the first `n` rows as an aligned plain-text grid
pub fn preview_text(table: &Table, n: usize) -> String {
    debug!(n, rows = table.row_count(), "preview_text: called");
    if table.columns.is_empty() {
        return "(no columns)".to_string();
    }

    let head = table.head(n);
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.len()).collect();
    let mut cells: Vec<Vec<String>> = Vec::with_capacity(head.rows.len());

    for row in &head.rows {
        let rendered: Vec<String> = table
            .columns
            .iter()
            .map(|c| display_value(row.get(c).unwrap_or(&Value::Null)))
            .collect();
        for (i, cell) in rendered.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
        cells.push(rendered);
    }

    let mut lines = Vec::with_capacity(cells.len() + 1);
    let header: Vec<String> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{:<width$}", c, width = widths[i]))
        .collect();
    lines.push(header.join("  "));

    for row in &cells {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        lines.push(line.join("  ").trim_end().to_string());
    }

    lines.join("\n")
}

/// Render the first `n` rows as a plain HTML table with the given CSS class
pub fn to_html(table: &Table, n: usize, class: &str) -> String {
    debug!(n, %class, "to_html: called");
    let head = table.head(n);
    let mut html = format!("<table class=\"{}\">\n<thead><tr>", escape(class));
    for column in &table.columns {
        html.push_str(&format!("<th>{}</th>", escape(column)));
    }
    html.push_str("</tr></thead>\n<tbody>\n");
    for row in &head.rows {
        html.push_str("<tr>");
        for column in &table.columns {
            let cell = display_value(row.get(column).unwrap_or(&Value::Null));
            html.push_str(&format!("<td>{}</td>", escape(&cell)));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</tbody>\n</table>");
    html
}

/// Escape text for HTML interpolation
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Format a float without a trailing `.0` for whole numbers
fn fmt_num(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}
