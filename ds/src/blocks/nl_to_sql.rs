//! nl-to-sql block
//!
//! Transforms a natural-language instruction into a SQL query via the LLM,
//! executes it against the input table, and returns the result with the
//! generated query and its explanation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use tablequery::{QueryEngine, SqliteEngine, Table, infer_schema, summary};

use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;
use crate::llm::{CompletionRequest, LlmOptions, json::extract_object};
use crate::prompts::embedded;

/// The prompt contract caps SQL generation at this budget
const SQL_MAX_TOKENS: u32 = 4096;

/// Name the input table is registered under, as promised by the prompt
const INPUT_TABLE_NAME: &str = "input_data";

/// nl-to-sql inputs
#[derive(Debug, Deserialize)]
pub struct NlToSqlParams {
    pub input_table: Table,
    pub instruction: String,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// nl-to-sql outputs
#[derive(Debug, Serialize)]
pub struct NlToSqlOutput {
    pub sql_query: String,
    pub result_table: Table,
    pub explanation: String,
}

/// Generate and execute a SQL query from a natural-language instruction
pub async fn nl_to_sql(params: &NlToSqlParams, ctx: &BlockContext) -> Result<NlToSqlOutput, BlockError> {
    debug!(instruction = %params.instruction, "nl_to_sql: called");

    if params.instruction.is_empty() {
        return Err(BlockError::InvalidInput("Instruction is required".to_string()));
    }
    if params.input_table.is_empty() {
        return Err(BlockError::InvalidInput("Input table is empty or invalid".to_string()));
    }

    ctx.host.report_progress(10);

    let table_summary = table_summary(&params.input_table);
    let user_prompt = format!(
        "Input Table Summary:\n{}\n\n\
         User Goal: {}\n\n\
         Generate a SQLite SQL query to achieve this goal.\n\
         Output JSON format: {{\"sql_query\": \"...\", \"explanation\": \"...\"}}",
        table_summary, params.instruction,
    );

    ctx.host.report_progress(30);

    let request = CompletionRequest::new(embedded::SQL, user_prompt)
        .with_options(&params.llm)
        .with_max_tokens(params.llm.max_tokens.min(SQL_MAX_TOKENS));
    let completion = ctx.llm.complete(request).await?;

    ctx.host.report_progress(60);

    let parsed = extract_object(&completion.content)?;
    let sql_query = parsed
        .get("sql_query")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| BlockError::InvalidInput(format!("Invalid LLM response format: {}", completion.content)))?
        .to_string();
    let explanation = parsed
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or("No explanation provided")
        .to_string();

    let engine = SqliteEngine::named(INPUT_TABLE_NAME);
    let result_table = engine.query(&params.input_table, &sql_query)?;

    ctx.host.report_progress(90);

    if result_table.is_empty() {
        return Err(BlockError::InvalidInput("Query returned no results".to_string()));
    }

    let preview = format!(
        "<div>\n<h3>SQL Query Result</h3>\n\
         <h4>Generated SQL:</h4>\n<code>{}</code>\n\
         <h4>Explanation:</h4>\n<p>{}</p>\n\
         <h4>Results ({} rows):</h4>\n{}\n</div>",
        summary::escape(&sql_query),
        summary::escape(&explanation),
        result_table.row_count(),
        summary::to_html(&result_table, 20, "result-table"),
    );
    ctx.host.preview(Preview::Html(preview));

    ctx.host.report_progress(100);

    Ok(NlToSqlOutput {
        sql_query,
        result_table,
        explanation,
    })
}

/// Concise table summary for the SQL-generation prompt
fn table_summary(table: &Table) -> String {
    let schema = match &table.schema {
        Some(schema) => schema.clone(),
        None => infer_schema(table),
    };

    let mut parts = vec![
        format!("Table: {} ({} rows)", INPUT_TABLE_NAME, table.row_count()),
        "Columns:".to_string(),
    ];

    for column in &table.columns {
        let Some(info) = schema.get(column) else { continue };
        let mut line = format!("  - {} ({})", column, info.semantic_type.as_str());
        if let Some(stats) = &info.stats {
            line.push_str(&format!(", range: {} to {}", stats.min, stats.max));
        } else {
            line.push_str(&format!(", {} unique values", info.unique_count));
        }
        parts.push(line);
    }

    if !table.rows.is_empty() {
        parts.push("\nSample data (first 2 rows):".to_string());
        for (i, row) in table.rows.iter().take(2).enumerate() {
            parts.push(format!("  Row {}: {}", i + 1, Value::Object(row.clone())));
        }
    }

    parts.join("\n")
}

/// Block wrapper for the registry
pub struct NlToSqlBlock;

#[async_trait]
impl Block for NlToSqlBlock {
    fn name(&self) -> &'static str {
        "nl-to-sql"
    }

    fn description(&self) -> &'static str {
        "Transform natural language instructions into executed SQL queries"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: NlToSqlParams = parse_params(inputs)?;
        let output = nl_to_sql(&params, ctx).await?;
        Ok(json!({
            "sql_query": output.sql_query,
            "result_table": output.result_table,
            "explanation": output.explanation,
        }))
    }
}
