//! data-extractor block
//!
//! Extracts structured tabular data from images, text, or HTML via the LLM.
//! Image sources travel as vision content; the response contract is a JSON
//! object with columns, rows, confidence, and notes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use tablequery::{Table, infer_schema, summary};

use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;
use crate::llm::{CompletionRequest, LlmOptions, json::extract_object};
use crate::prompts::embedded;

const DEFAULT_CONFIDENCE: f64 = 0.8;
const PREVIEW_ROWS: usize = 10;

/// Extraction sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractSource {
    Image,
    Text,
    Html,
}

impl ExtractSource {
    fn as_str(&self) -> &'static str {
        match self {
            ExtractSource::Image => "image",
            ExtractSource::Text => "text",
            ExtractSource::Html => "html",
        }
    }
}

/// data-extractor inputs
#[derive(Debug, Deserialize)]
pub struct ExtractParams {
    pub source_type: ExtractSource,
    pub source_content: String,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// data-extractor outputs
#[derive(Debug)]
pub struct ExtractOutput {
    pub extracted_table: Table,
    pub extraction_confidence: f64,
    pub notes: Option<String>,
}

/// Extract a table from unstructured content
pub async fn extract_table(params: &ExtractParams, ctx: &BlockContext) -> Result<ExtractOutput, BlockError> {
    debug!(source_type = params.source_type.as_str(), "extract_table: called");
    ctx.host.report_progress(0);

    if params.source_content.is_empty() {
        return Err(BlockError::InvalidInput("Source content is required".to_string()));
    }

    let request = match params.source_type {
        ExtractSource::Image => CompletionRequest::new(embedded::EXTRACT_IMAGE, "Extract all tabular data from this image")
            .with_image(params.source_content.clone()),
        ExtractSource::Text => CompletionRequest::new(embedded::EXTRACT_TEXT, params.source_content.clone()),
        ExtractSource::Html => CompletionRequest::new(embedded::EXTRACT_HTML, params.source_content.clone()),
    }
    .with_options(&params.llm);

    ctx.host.report_progress(20);

    let completion = ctx.llm.complete(request).await?;

    ctx.host.report_progress(60);

    let parsed = extract_object(&completion.content)?;
    let (Some(columns), Some(rows)) = (parsed.get("columns"), parsed.get("rows")) else {
        return Err(BlockError::InvalidInput(format!(
            "LLM response missing required fields 'columns' or 'rows'\n\nResponse: {}",
            completion.content
        )));
    };

    let columns: Vec<String> = columns
        .as_array()
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let rows: Vec<Map<String, Value>> = rows
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect()
        })
        .unwrap_or_default();
    if columns.is_empty() || rows.is_empty() {
        return Err(BlockError::InvalidInput(format!(
            "Extracted table is empty\n\nResponse: {}",
            completion.content
        )));
    }

    let table = Table::new(columns, rows);
    let schema = infer_schema(&table);
    let table = table.with_schema(schema);

    ctx.host.report_progress(80);

    let confidence = parsed.get("confidence").and_then(|v| v.as_f64()).unwrap_or(DEFAULT_CONFIDENCE);
    let notes = parsed.get("notes").and_then(|v| v.as_str()).map(str::to_string);

    let (rows_n, cols_n) = table.shape();
    let mut preview = format!(
        "<div>\n<h3>Extracted Data</h3>\n\
         <p><strong>Source:</strong> {} | <strong>Rows:</strong> {} | \
         <strong>Columns:</strong> {} | <strong>Confidence:</strong> {:.1}%</p>\n{}\n",
        params.source_type.as_str(),
        rows_n,
        cols_n,
        confidence * 100.0,
        summary::to_html(&table, PREVIEW_ROWS, "data-table"),
    );
    if let Some(notes) = &notes {
        preview.push_str(&format!("<p><strong>Notes:</strong> {}</p>\n", summary::escape(notes)));
    }
    preview.push_str("</div>");
    ctx.host.preview(Preview::Html(preview));

    ctx.host.report_progress(100);

    Ok(ExtractOutput {
        extracted_table: table,
        extraction_confidence: confidence,
        notes,
    })
}

/// Block wrapper for the registry
pub struct DataExtractorBlock;

#[async_trait]
impl Block for DataExtractorBlock {
    fn name(&self) -> &'static str {
        "data-extractor"
    }

    fn description(&self) -> &'static str {
        "Extract structured table data from images, text, or HTML"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: ExtractParams = parse_params(inputs)?;
        let output = extract_table(&params, ctx).await?;
        Ok(json!({
            "extracted_table": output.extracted_table,
            "extraction_confidence": output.extraction_confidence,
        }))
    }
}
