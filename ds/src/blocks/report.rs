//! report-generator block
//!
//! Streams a markdown report from the LLM, substitutes chart placeholders
//! with embedded images, writes the report to the session directory, and
//! previews it.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::debug;

use super::chart_array::ChartEntry;
use super::{Block, BlockContext, BlockError, parse_params};
use crate::host::Preview;
use crate::llm::{CompletionRequest, LlmOptions};
use crate::prompts::embedded;

const REPORT_TEMPERATURE: f32 = 0.5;
const REPORT_FILE_NAME: &str = "analysis_report.md";

/// report-generator inputs
#[derive(Debug, Deserialize)]
pub struct ReportParams {
    #[serde(default)]
    pub charts: Vec<ChartEntry>,
    pub analysis_goal: String,
    #[serde(default)]
    pub llm: LlmOptions,
}

/// report-generator outputs
#[derive(Debug)]
pub struct ReportOutput {
    pub markdown_report: String,
    pub report_file: String,
}

/// Generate a markdown report with embedded charts
pub async fn generate_report(params: &ReportParams, ctx: &BlockContext) -> Result<ReportOutput, BlockError> {
    debug!(charts = params.charts.len(), goal = %params.analysis_goal, "generate_report: called");
    ctx.host.report_progress(10);

    let chart_summaries: Vec<String> = if params.charts.is_empty() {
        vec!["No visualizations were generated for this analysis.".to_string()]
    } else {
        params
            .charts
            .iter()
            .enumerate()
            .map(|(i, chart)| {
                let mut line = format!("Chart {}: {}", i + 1, chart.title);
                if !chart.description.is_empty() {
                    line.push_str(&format!(" - {}", chart.description));
                }
                line
            })
            .collect()
    };

    ctx.host.report_progress(20);

    let user_prompt = if params.charts.is_empty() {
        format!(
            "Analysis Goal: {}\n\n\
             Note: No visualizations were generated for this analysis. \
             Please create a text-based report based on the analysis goal.\n\n\
             Generate a comprehensive markdown report following the required structure.\n\n\
             The report should be insightful, actionable, and well-structured.\n",
            params.analysis_goal,
        )
    } else {
        format!(
            "Analysis Goal: {}\n\n\
             Available Charts:\n{}\n\n\
             Generate a comprehensive markdown report following the required structure.\n\
             Reference charts using placeholders: {{{{chart_1}}}}, {{{{chart_2}}}}, etc.\n\n\
             The report should be insightful, actionable, and well-structured.\n",
            params.analysis_goal,
            chart_summaries.join("\n"),
        )
    };

    ctx.host.report_progress(30);

    // Stream the report, stepping progress as chunks arrive
    let request = CompletionRequest::new(embedded::REPORT, user_prompt)
        .with_options(&params.llm)
        .with_temperature(REPORT_TEMPERATURE);
    let (tx, mut rx) = mpsc::channel::<String>(64);
    let host = ctx.host.clone();
    let progress_task = tokio::spawn(async move {
        let mut chunk_count: u64 = 0;
        while rx.recv().await.is_some() {
            chunk_count += 1;
            if chunk_count % 10 == 0 {
                let progress = (30 + (chunk_count / 10) * 2).min(70) as u8;
                host.report_progress(progress);
            }
        }
    });
    let completion = ctx.llm.stream(request, tx).await?;
    let _ = progress_task.await;

    ctx.host.report_progress(70);

    let mut markdown = completion.content.trim().to_string();
    if markdown.is_empty() {
        return Err(BlockError::InvalidInput("LLM returned empty report content".to_string()));
    }

    for (i, chart) in params.charts.iter().enumerate() {
        let placeholder = format!("{{{{chart_{}}}}}", i + 1);
        let replacement = if chart.image.is_empty() {
            format!("\n**{}**\n", chart.title)
        } else {
            format!("\n![{}](data:image/png;base64,{})\n", chart.title, chart.image)
        };
        markdown = markdown.replace(&placeholder, &replacement);
    }

    ctx.host.report_progress(80);

    let report_path = ctx.session_dir.join(REPORT_FILE_NAME);
    std::fs::write(&report_path, &markdown)?;

    ctx.host.report_progress(90);

    ctx.host.preview(Preview::Markdown(markdown.clone()));

    ctx.host.report_progress(100);

    Ok(ReportOutput {
        markdown_report: markdown,
        report_file: report_path.display().to_string(),
    })
}

/// Block wrapper for the registry
pub struct ReportGeneratorBlock;

#[async_trait]
impl Block for ReportGeneratorBlock {
    fn name(&self) -> &'static str {
        "report-generator"
    }

    fn description(&self) -> &'static str {
        "Generate a comprehensive markdown report with embedded charts"
    }

    async fn run(&self, inputs: Value, ctx: &BlockContext) -> Result<Value, BlockError> {
        let params: ReportParams = parse_params(inputs)?;
        let output = generate_report(&params, ctx).await?;
        Ok(json!({
            "markdown_report": output.markdown_report,
            "report_file": output.report_file,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::llm::client::mock::MockLlmClient;
    use std::sync::Arc;
    use tablequery::SqliteEngine;

    fn context(llm: Arc<MockLlmClient>, session_dir: std::path::PathBuf) -> BlockContext {
        BlockContext {
            llm,
            engine: Arc::new(SqliteEngine::new()),
            host: Arc::new(MemoryHost::new()),
            renderer: None,
            session_dir,
        }
    }

    fn chart(title: &str, image: &str) -> ChartEntry {
        ChartEntry {
            title: title.to_string(),
            image: image.to_string(),
            description: "a chart".to_string(),
        }
    }

    #[tokio::test]
    async fn test_report_replaces_placeholders_and_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            "# Report\n\nSee {{chart_1}} for details.",
        ]));
        let ctx = context(llm.clone(), dir.path().to_path_buf());

        let params = ReportParams {
            charts: vec![chart("Sales by Region", "AAAA")],
            analysis_goal: "analyze sales".to_string(),
            llm: LlmOptions::default(),
        };
        let output = generate_report(&params, &ctx).await.unwrap();

        assert!(output.markdown_report.contains("![Sales by Region](data:image/png;base64,AAAA)"));
        assert!(!output.markdown_report.contains("{{chart_1}}"));

        let written = std::fs::read_to_string(&output.report_file).unwrap();
        assert_eq!(written, output.markdown_report);

        // Chart summaries reach the prompt
        let requests = llm.requests();
        assert!(requests[0].user_prompt.contains("Chart 1: Sales by Region - a chart"));
    }

    #[tokio::test]
    async fn test_report_without_charts_uses_text_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec!["# Text Report"]));
        let ctx = context(llm.clone(), dir.path().to_path_buf());

        let params = ReportParams {
            charts: vec![],
            analysis_goal: "summarize findings".to_string(),
            llm: LlmOptions::default(),
        };
        let output = generate_report(&params, &ctx).await.unwrap();

        assert_eq!(output.markdown_report, "# Text Report");
        assert!(llm.requests()[0].user_prompt.contains("No visualizations were generated"));
    }

    #[tokio::test]
    async fn test_imageless_chart_placeholder_becomes_title() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec!["Intro {{chart_1}} outro"]));
        let ctx = context(llm, dir.path().to_path_buf());

        let params = ReportParams {
            charts: vec![chart("Ghost Chart", "")],
            analysis_goal: "goal".to_string(),
            llm: LlmOptions::default(),
        };
        let output = generate_report(&params, &ctx).await.unwrap();
        assert!(output.markdown_report.contains("**Ghost Chart**"));
    }

    #[tokio::test]
    async fn test_empty_report_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::with_texts(vec!["   "]));
        let ctx = context(llm, dir.path().to_path_buf());

        let params = ReportParams {
            charts: vec![],
            analysis_goal: "goal".to_string(),
            llm: LlmOptions::default(),
        };
        let err = generate_report(&params, &ctx).await.unwrap_err();
        assert!(err.to_string().contains("empty report content"));
    }
}
