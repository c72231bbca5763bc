//! data-quality-checker block
//!
//! Detects missing values, IQR outliers, duplicate rows, and
//! numbers-stored-as-text; scores overall quality; optionally auto-cleans the
//! table; and asks the LLM for cleaning suggestions (with a templated fallback
//! when the call fails).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use tablequery::{Table, infer_schema, table::as_f64};

use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;
use crate::llm::{CompletionRequest, LlmOptions};
use crate::prompts::embedded;

const SUGGESTION_TEMPERATURE: f32 = 0.5;
const SUGGESTION_MAX_TOKENS: u32 = 1000;

/// data-quality-checker inputs
#[derive(Debug, Deserialize)]
pub struct QualityParams {
    pub data_table: Table,
    #[serde(default)]
    pub auto_clean: bool,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// Missing-value summary for one column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingInfo {
    pub count: usize,
    pub percentage: f64,
}

/// Outlier summary for one numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierInfo {
    pub count: usize,
    pub percentage: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

/// A type-consistency finding
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeIssue {
    pub column: String,
    pub issue: String,
    pub recommendation: String,
}

/// Full quality report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub overall_score: f64,
    pub missing_values: BTreeMap<String, MissingInfo>,
    pub outliers: BTreeMap<String, OutlierInfo>,
    pub type_issues: Vec<TypeIssue>,
    pub duplicate_rows: usize,
}

/// data-quality-checker outputs
#[derive(Debug, Serialize)]
pub struct QualityOutput {
    pub quality_report: QualityReport,
    pub cleaning_suggestions: String,
    pub cleaned_table: Table,
    pub quality_visualization: Option<String>,
}

/// Analyze data quality and provide cleaning recommendations
pub async fn check_quality(params: &QualityParams, ctx: &BlockContext) -> Result<QualityOutput, BlockError> {
    debug!(rows = params.data_table.row_count(), auto_clean = params.auto_clean, "check_quality: called");
    ctx.host.report_progress(10);

    let table = &params.data_table;
    if table.is_empty() {
        return Err(BlockError::InvalidInput("Input data table is empty".to_string()));
    }

    ctx.host.report_progress(20);
    let missing = analyze_missing_values(table);

    ctx.host.report_progress(35);
    let outliers = detect_outliers(table);

    ctx.host.report_progress(50);
    let type_issues = check_type_consistency(table);
    let duplicate_rows = count_duplicates(table);
    let overall_score = quality_score(&missing, &outliers, duplicate_rows, table.row_count());

    let report = QualityReport {
        overall_score,
        missing_values: missing,
        outliers,
        type_issues,
        duplicate_rows,
    };

    ctx.host.report_progress(60);
    ctx.host.report_progress(70);
    let cleaning_suggestions = suggestions(&report, table.row_count(), params, ctx).await;

    ctx.host.report_progress(80);
    let quality_visualization = visualize(&report, ctx);

    let (cleaned_table, rows_removed) = if params.auto_clean {
        let cleaned = clean_table(table, &report);
        let removed = table.row_count().saturating_sub(cleaned.row_count());
        let schema = infer_schema(&cleaned);
        (cleaned.with_schema(schema), removed)
    } else {
        (table.clone(), 0)
    };

    ctx.host.report_progress(90);

    ctx.host.preview(Preview::Html(format!(
        "<div>\n<h3>Data Quality Report</h3>\n\
         <p><strong>Quality Score:</strong> {:.1} / 100</p>\n\
         <ul>\n\
         <li>{} columns with missing values</li>\n\
         <li>{} columns with outliers</li>\n\
         <li>{} duplicate rows</li>\n\
         <li>{} rows cleaned</li>\n\
         </ul>\n\
         <h4>AI Recommendations</h4>\n<pre>{}</pre>\n</div>",
        report.overall_score,
        report.missing_values.len(),
        report.outliers.len(),
        report.duplicate_rows,
        rows_removed,
        tablequery::summary::escape(&cleaning_suggestions),
    )));

    ctx.host.report_progress(100);

    Ok(QualityOutput {
        quality_report: report,
        cleaning_suggestions,
        cleaned_table,
        quality_visualization,
    })
}

/// Per-column missing value counts (columns with none are omitted)
pub fn analyze_missing_values(table: &Table) -> BTreeMap<String, MissingInfo> {
    let total = table.row_count();
    let mut missing = BTreeMap::new();
    for column in &table.columns {
        let count = table.column_values(column).filter(|v| v.is_null()).count();
        if count > 0 {
            missing.insert(
                column.clone(),
                MissingInfo {
                    count,
                    percentage: count as f64 / total as f64 * 100.0,
                },
            );
        }
    }
    missing
}

/// IQR outlier detection over numeric columns (columns with none are omitted)
pub fn detect_outliers(table: &Table) -> BTreeMap<String, OutlierInfo> {
    let total = table.row_count();
    let mut outliers = BTreeMap::new();

    for column in &table.columns {
        if !is_numeric_column(table, column) {
            continue;
        }
        let mut values = table.numeric_values(column);
        if values.is_empty() {
            continue;
        }
        values.sort_by(|a, b| a.partial_cmp(b).expect("NaN in numeric column"));

        let q1 = quantile(&values, 0.25);
        let q3 = quantile(&values, 0.75);
        let iqr = q3 - q1;
        let lower_bound = q1 - 1.5 * iqr;
        let upper_bound = q3 + 1.5 * iqr;

        let count = values.iter().filter(|v| **v < lower_bound || **v > upper_bound).count();
        if count > 0 {
            outliers.insert(
                column.clone(),
                OutlierInfo {
                    count,
                    percentage: count as f64 / total as f64 * 100.0,
                    lower_bound,
                    upper_bound,
                },
            );
        }
    }

    outliers
}

/// Columns stored as text whose every value parses as a number
pub fn check_type_consistency(table: &Table) -> Vec<TypeIssue> {
    let mut issues = Vec::new();
    for column in &table.columns {
        if is_numeric_column(table, column) {
            continue;
        }
        let non_null: Vec<&Value> = table.column_values(column).filter(|v| !v.is_null()).collect();
        if !non_null.is_empty() && non_null.iter().all(|v| as_f64(v).is_some()) {
            issues.push(TypeIssue {
                column: column.clone(),
                issue: "Column appears numeric but stored as string".to_string(),
                recommendation: "Convert to numeric type".to_string(),
            });
        }
    }
    issues
}

/// Number of rows that duplicate an earlier row
pub fn count_duplicates(table: &Table) -> usize {
    let mut seen: Vec<String> = Vec::new();
    let mut duplicates = 0;
    for row in &table.rows {
        let key = Value::Object(row.clone()).to_string();
        if seen.contains(&key) {
            duplicates += 1;
        } else {
            seen.push(key);
        }
    }
    duplicates
}

/// Overall 0-100 quality score with fixed deduction weights
pub fn quality_score(
    missing: &BTreeMap<String, MissingInfo>,
    outliers: &BTreeMap<String, OutlierInfo>,
    duplicates: usize,
    total_rows: usize,
) -> f64 {
    let mut score: f64 = 100.0;

    if !missing.is_empty() {
        let avg = missing.values().map(|m| m.percentage).sum::<f64>() / missing.len() as f64;
        score -= (avg * 0.5).min(30.0);
    }
    if !outliers.is_empty() {
        let avg = outliers.values().map(|o| o.percentage).sum::<f64>() / outliers.len() as f64;
        score -= (avg * 0.3).min(20.0);
    }
    if duplicates > 0 && total_rows > 0 {
        let pct = duplicates as f64 / total_rows as f64 * 100.0;
        score -= (pct * 0.5).min(20.0);
    }

    score.max(0.0)
}

/// Auto-clean: drop sparse rows, fill remaining gaps, clip outliers, dedup
pub fn clean_table(table: &Table, report: &QualityReport) -> Table {
    let column_count = table.column_count();
    let threshold = (column_count as f64 * 0.5).ceil() as usize;

    // Drop rows missing more than half their values
    let mut rows: Vec<Map<String, Value>> = table
        .rows
        .iter()
        .filter(|row| {
            let present = table.columns.iter().filter(|c| row.get(*c).is_some_and(|v| !v.is_null())).count();
            present >= threshold
        })
        .cloned()
        .collect();

    // Fill values per column: median for numeric, mode for everything else
    for column in &table.columns {
        let has_missing = rows.iter().any(|r| r.get(column).is_none_or(Value::is_null));
        if !has_missing {
            continue;
        }
        let fill = if is_numeric_column(table, column) {
            let mut values: Vec<f64> = rows.iter().filter_map(|r| r.get(column).and_then(as_f64)).collect();
            values.sort_by(|a, b| a.partial_cmp(b).expect("NaN in numeric column"));
            if values.is_empty() {
                Value::Null
            } else {
                number(quantile(&values, 0.5))
            }
        } else {
            mode_value(rows.iter().filter_map(|r| r.get(column)).filter(|v| !v.is_null()))
        };
        if fill.is_null() {
            continue;
        }
        for row in rows.iter_mut() {
            if row.get(column).is_none_or(Value::is_null) {
                row.insert(column.clone(), fill.clone());
            }
        }
    }

    // Clip outliers to their IQR bounds (Winsorization)
    for (column, info) in &report.outliers {
        for row in rows.iter_mut() {
            if let Some(value) = row.get(column).and_then(as_f64) {
                let clipped = value.clamp(info.lower_bound, info.upper_bound);
                if clipped != value {
                    row.insert(column.clone(), number(clipped));
                }
            }
        }
    }

    // Remove duplicate rows
    let mut seen: Vec<String> = Vec::new();
    rows.retain(|row| {
        let key = Value::Object(row.clone()).to_string();
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });

    Table::new(table.columns.clone(), rows)
}

async fn suggestions(report: &QualityReport, total_rows: usize, params: &QualityParams, ctx: &BlockContext) -> String {
    let summary = format!(
        "Data Quality Analysis:\n\
         - Total rows: {}\n\
         - Overall quality score: {:.1}/100\n\
         - Missing values: {} columns affected\n\
         - Outliers: {} columns affected\n\
         - Duplicate rows: {}\n\
         - Type issues: {}\n\n\
         Details:\n{}",
        total_rows,
        report.overall_score,
        report.missing_values.len(),
        report.outliers.len(),
        report.duplicate_rows,
        report.type_issues.len(),
        serde_json::to_string_pretty(report).unwrap_or_default(),
    );

    let request = CompletionRequest::new(embedded::QUALITY, summary)
        .with_options(&params.llm)
        .with_temperature(SUGGESTION_TEMPERATURE)
        .with_max_tokens(SUGGESTION_MAX_TOKENS);

    match ctx.llm.complete(request).await {
        Ok(completion) => completion.content.trim().to_string(),
        Err(e) => {
            warn!(error = %e, "Suggestion call failed, using basic recommendations");
            format!(
                "Failed to generate AI suggestions: {}\n\n\
                 Basic recommendations:\n\
                 - Address missing values in {} columns\n\
                 - Review outliers in {} columns\n\
                 - Remove {} duplicate rows",
                e,
                report.missing_values.len(),
                report.outliers.len(),
                report.duplicate_rows,
            )
        }
    }
}

/// Bar chart of issue percentages by column; absent without a renderer
fn visualize(report: &QualityReport, ctx: &BlockContext) -> Option<String> {
    let renderer = ctx.renderer.as_ref()?;

    let mut values = Vec::new();
    for (column, info) in &report.missing_values {
        values.push(json!({"column": column, "issue_type": "Missing Values", "percentage": info.percentage}));
    }
    for (column, info) in &report.outliers {
        values.push(json!({"column": column, "issue_type": "Outliers", "percentage": info.percentage}));
    }
    if values.is_empty() {
        return None;
    }

    let spec = json!({
        "$schema": "https://vega.github.io/schema/vega-lite/v5.json",
        "width": 600,
        "height": 300,
        "title": "Data Quality Issues by Column",
        "data": {"values": values},
        "mark": "bar",
        "encoding": {
            "x": {"field": "column", "type": "nominal", "sort": "-y", "title": "Column"},
            "y": {"field": "percentage", "type": "quantitative", "title": "Issue Percentage (%)"},
            "color": {"field": "issue_type", "type": "nominal", "title": "Issue Type"},
        },
    });

    match renderer.render(&spec) {
        Ok(image) => Some(image),
        Err(e) => {
            warn!(error = %e, "Quality visualization render failed");
            Some(String::new())
        }
    }
}

/// Whether every non-null value of a column is a JSON number
fn is_numeric_column(table: &Table, column: &str) -> bool {
    let mut any = false;
    for value in table.column_values(column) {
        match value {
            Value::Null => continue,
            Value::Number(_) => any = true,
            _ => return false,
        }
    }
    any
}

/// Linearly interpolated quantile over sorted values
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
    }
}

fn mode_value<'a>(values: impl Iterator<Item = &'a Value>) -> Value {
    let mut order: Vec<&Value> = Vec::new();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for value in values {
        let key = value.to_string();
        if !counts.contains_key(&key) {
            order.push(value);
        }
        *counts.entry(key).or_insert(0) += 1;
    }
    order
        .into_iter()
        .max_by_key(|v| counts[&v.to_string()])
        .cloned()
        .unwrap_or(Value::Null)
}

fn number(value: f64) -> Value {
    // Whole floats go back as integers so filled cells match their column
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

/// Block wrapper for the registry
pub struct DataQualityBlock;

#[async_trait]
impl Block for DataQualityBlock {
    fn name(&self) -> &'static str {
        "data-quality-checker"
    }

    fn description(&self) -> &'static str {
        "Analyze data quality and provide cleaning recommendations"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: QualityParams = parse_params(inputs)?;
        let output = check_quality(&params, ctx).await?;
        Ok(json!({
            "quality_report": output.quality_report,
            "cleaning_suggestions": output.cleaning_suggestions,
            "cleaned_table": output.cleaned_table,
            "quality_visualization": output.quality_visualization,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use std::sync::Arc;
    use tablequery::SqliteEngine;

    fn row(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn context(llm: Arc<MockLlmClient>) -> BlockContext {
        BlockContext {
            llm,
            engine: Arc::new(SqliteEngine::new()),
            host: Arc::new(MemoryHost::new()),
            renderer: None,
            session_dir: std::env::temp_dir(),
        }
    }

    #[test]
    fn test_analyze_missing_values() {
        let table = Table::from_rows(vec![
            row(&[("a", json!(1)), ("b", json!("x"))]),
            row(&[("a", Value::Null), ("b", json!("y"))]),
            row(&[("a", json!(3)), ("b", Value::Null)]),
            row(&[("a", json!(4)), ("b", json!("z"))]),
        ]);

        let missing = analyze_missing_values(&table);
        assert_eq!(missing["a"].count, 1);
        assert_eq!(missing["a"].percentage, 25.0);
        assert_eq!(missing["b"].count, 1);
    }

    #[test]
    fn test_detect_outliers_iqr() {
        // 19 tight values plus one wild outlier
        let mut rows: Vec<Map<String, Value>> = (1..=19).map(|i| row(&[("x", json!(i))])).collect();
        rows.push(row(&[("x", json!(1000))]));
        let table = Table::from_rows(rows);

        let outliers = detect_outliers(&table);
        let info = &outliers["x"];
        assert_eq!(info.count, 1);
        assert_eq!(info.percentage, 5.0);
        assert!(info.upper_bound < 1000.0);
    }

    #[test]
    fn test_no_outliers_in_uniform_data() {
        let rows: Vec<Map<String, Value>> = (1..=20).map(|i| row(&[("x", json!(i))])).collect();
        let table = Table::from_rows(rows);
        assert!(detect_outliers(&table).is_empty());
    }

    #[test]
    fn test_type_consistency_flags_numeric_strings() {
        let table = Table::from_rows(vec![
            row(&[("amount", json!("10")), ("name", json!("alice"))]),
            row(&[("amount", json!("20.5")), ("name", json!("bob"))]),
        ]);

        let issues = check_type_consistency(&table);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column, "amount");
    }

    #[test]
    fn test_count_duplicates() {
        let table = Table::from_rows(vec![
            row(&[("a", json!(1))]),
            row(&[("a", json!(1))]),
            row(&[("a", json!(2))]),
            row(&[("a", json!(1))]),
        ]);
        assert_eq!(count_duplicates(&table), 2);
    }

    #[test]
    fn test_quality_score_clean_data() {
        let score = quality_score(&BTreeMap::new(), &BTreeMap::new(), 0, 100);
        assert_eq!(score, 100.0);
    }

    #[test]
    fn test_quality_score_deductions_capped() {
        let mut missing = BTreeMap::new();
        missing.insert(
            "a".to_string(),
            MissingInfo {
                count: 90,
                percentage: 90.0,
            },
        );
        // 90% missing deducts the full 30-point cap
        let score = quality_score(&missing, &BTreeMap::new(), 0, 100);
        assert_eq!(score, 70.0);
    }

    #[test]
    fn test_clean_table_fills_and_dedups() {
        let table = Table::from_rows(vec![
            row(&[("x", json!(1)), ("k", json!("a"))]),
            row(&[("x", Value::Null), ("k", json!("a"))]),
            row(&[("x", json!(3)), ("k", json!("b"))]),
            row(&[("x", json!(1)), ("k", json!("a"))]),
        ]);
        let report = QualityReport {
            overall_score: 0.0,
            missing_values: analyze_missing_values(&table),
            outliers: BTreeMap::new(),
            type_issues: vec![],
            duplicate_rows: count_duplicates(&table),
        };

        let cleaned = clean_table(&table, &report);
        // Null x filled with median (1, 3, 1 -> 1); the filled row then
        // duplicates row 0 and is dropped along with the original duplicate
        assert!(cleaned.rows.iter().all(|r| !r["x"].is_null()));
        assert_eq!(count_duplicates(&cleaned), 0);
    }

    #[test]
    fn test_clean_table_clips_outliers() {
        let mut rows: Vec<Map<String, Value>> = (1..=19).map(|i| row(&[("x", json!(i))])).collect();
        rows.push(row(&[("x", json!(1000))]));
        let table = Table::from_rows(rows);
        let report = QualityReport {
            overall_score: 0.0,
            missing_values: BTreeMap::new(),
            outliers: detect_outliers(&table),
            type_issues: vec![],
            duplicate_rows: 0,
        };

        let cleaned = clean_table(&table, &report);
        let max = cleaned.numeric_values("x").into_iter().fold(f64::MIN, f64::max);
        assert!(max < 1000.0);
    }

    #[tokio::test]
    async fn test_check_quality_suggestion_fallback() {
        let llm = Arc::new(MockLlmClient::new(vec![MockReply::Err("down".to_string())]));
        let ctx = context(llm);

        let params = QualityParams {
            data_table: Table::from_rows(vec![
                row(&[("a", json!(1))]),
                row(&[("a", Value::Null)]),
            ]),
            auto_clean: false,
            llm: LlmOptions::default(),
        };
        let output = check_quality(&params, &ctx).await.unwrap();

        assert!(output.cleaning_suggestions.contains("Basic recommendations"));
        assert!(output.quality_report.missing_values.contains_key("a"));
        // auto_clean off: table passes through unchanged
        assert_eq!(output.cleaned_table.row_count(), 2);
    }

    #[tokio::test]
    async fn test_check_quality_auto_clean() {
        let llm = Arc::new(MockLlmClient::with_texts(vec!["Fix the nulls."]));
        let ctx = context(llm);

        let params = QualityParams {
            data_table: Table::from_rows(vec![
                row(&[("a", json!(1)), ("b", json!("x"))]),
                row(&[("a", json!(1)), ("b", json!("x"))]),
                row(&[("a", json!(2)), ("b", json!("y"))]),
            ]),
            auto_clean: true,
            llm: LlmOptions::default(),
        };
        let output = check_quality(&params, &ctx).await.unwrap();

        assert_eq!(output.cleaning_suggestions, "Fix the nulls.");
        assert_eq!(output.cleaned_table.row_count(), 2);
        assert!(output.cleaned_table.schema.is_some());
    }

    #[tokio::test]
    async fn test_empty_table_rejected() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![]));
        let ctx = context(llm);

        let params = QualityParams {
            data_table: Table::new(vec!["a".to_string()], vec![]),
            auto_clean: false,
            llm: LlmOptions::default(),
        };
        assert!(check_quality(&params, &ctx).await.is_err());
    }
}
