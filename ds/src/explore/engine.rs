//! ExplorationEngine - the plan/execute/explain loop
//!
//! Drives a bounded sequence of iterations over a mutable working table. Each
//! iteration asks the planner for a SQL step, executes it, asks for an insight
//! describing the result, and records a step. The loop is an explicit state
//! machine so every suspension point and fallback edge is a single match arm.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tablequery::{QueryEngine, Table, preview_text, summarize};

use crate::charts::{ChartPolicy, ChartRenderer, spec_for_plan};
use crate::host::{HostContext, Preview};
use crate::llm::{CompletionRequest, LlmClient, LlmOptions};
use crate::prompts::embedded;

use super::error::ExploreError;
use super::plan::{ExplorationPlan, PlanAction, parse_plan};
use super::report::{fallback_report, findings_digest, minimal_report};
use super::step::ExplorationStep;

/// Default iteration budget when the caller does not supply one
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;

/// Temperature and token budget for insight extraction
const INSIGHT_TEMPERATURE: f32 = 0.3;
const INSIGHT_MAX_TOKENS: u32 = 500;

/// Temperature and token budget for report summarization
const SUMMARY_TEMPERATURE: f32 = 0.5;
const SUMMARY_MAX_TOKENS: u32 = 2000;

/// Rows of the result table shown to the insight prompt
const RESULT_PREVIEW_ROWS: usize = 10;

/// Per-run options
#[derive(Debug, Clone)]
pub struct ExplorationOptions {
    /// Iteration budget (positive)
    pub max_iterations: u32,

    /// Sampling options for the planning calls
    pub llm: LlmOptions,
}

impl Default for ExplorationOptions {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            llm: LlmOptions::default(),
        }
    }
}

/// Result of a completed run
#[derive(Debug, Clone)]
pub struct ExplorationOutcome {
    /// Unique run identifier
    pub run_id: String,

    /// The recorded trace, in step order
    pub steps: Vec<ExplorationStep>,

    /// Markdown report handed back to the caller
    pub final_report: String,
}

/// Loop state; terminal states proceed to report synthesis
#[derive(Debug)]
enum ExplorePhase {
    Planning,
    Executing(ExplorationPlan),
    Explaining { plan: ExplorationPlan, result: Table },
    Concluded,
    Exhausted,
}

/// The exploration loop controller
pub struct ExplorationEngine {
    llm: Arc<dyn LlmClient>,
    engine: Arc<dyn QueryEngine>,
    host: Arc<dyn HostContext>,
    charts: Option<(Arc<dyn ChartPolicy>, Arc<dyn ChartRenderer>)>,
}

impl ExplorationEngine {
    /// Create an engine wired to its three collaborators
    pub fn new(llm: Arc<dyn LlmClient>, engine: Arc<dyn QueryEngine>, host: Arc<dyn HostContext>) -> Self {
        debug!("ExplorationEngine::new: called");
        Self {
            llm,
            engine,
            host,
            charts: None,
        }
    }

    /// Attach a chart policy and renderer; steps then carry rendered charts
    pub fn with_charts(mut self, policy: Arc<dyn ChartPolicy>, renderer: Arc<dyn ChartRenderer>) -> Self {
        debug!("ExplorationEngine::with_charts: called");
        self.charts = Some((policy, renderer));
        self
    }

    /// Run the exploration to completion
    pub async fn run(
        &self,
        input: &Table,
        goal: &str,
        options: &ExplorationOptions,
    ) -> Result<ExplorationOutcome, ExploreError> {
        let run_id = Uuid::now_v7().to_string();
        debug!(%run_id, %goal, max_iterations = options.max_iterations, "run: called");

        if input.is_empty() {
            return Err(ExploreError::EmptyInput);
        }
        self.host.report_progress(5);

        let max_iterations = options.max_iterations.max(1);
        let mut working = input.clone();
        let mut steps: Vec<ExplorationStep> = Vec::new();
        let mut iteration: u32 = 1;
        let mut phase = ExplorePhase::Planning;

        self.host.report_progress(10);
        info!(%run_id, %goal, max_iterations, "Starting exploration");

        loop {
            match phase {
                ExplorePhase::Planning => {
                    if iteration > max_iterations {
                        debug!(%run_id, iteration, "run: iteration budget exhausted");
                        phase = ExplorePhase::Exhausted;
                        continue;
                    }
                    let progress = 10 + ((iteration as u64 * 60) / max_iterations as u64) as u8;
                    self.host.report_progress(progress);

                    let plan = self.plan(goal, &working, iteration, max_iterations, &steps, options).await?;
                    debug!(%run_id, iteration, action = ?plan.action, "run: plan received");

                    if plan.action == PlanAction::Conclude {
                        info!(%run_id, iteration, "Planner concluded the exploration");
                        phase = ExplorePhase::Concluded;
                    } else if !plan.has_query() {
                        // No query to run: the iteration is spent without a trace
                        debug!(%run_id, iteration, "run: plan has no query, skipping iteration");
                        iteration += 1;
                        phase = ExplorePhase::Planning;
                    } else {
                        phase = ExplorePhase::Executing(plan);
                    }
                }

                ExplorePhase::Executing(plan) => {
                    match self.engine.query(&working, &plan.sql_query) {
                        Ok(result) => {
                            debug!(%run_id, iteration, result_shape = ?result.shape(), "run: query succeeded");
                            phase = ExplorePhase::Explaining { plan, result };
                        }
                        Err(e) => {
                            // A bad query is a data point, not a fault: record it
                            // and keep the working table untouched
                            warn!(%run_id, iteration, error = %e, "Query failed, recording and continuing");
                            steps.push(ExplorationStep::new(
                                iteration,
                                plan.explanation.clone(),
                                plan.sql_query.clone(),
                                format!("Query failed: {}", e),
                            ));
                            iteration += 1;
                            phase = ExplorePhase::Planning;
                        }
                    }
                }

                ExplorePhase::Explaining { plan, result } => {
                    let insight = self.explain(&plan, &result, options).await;
                    let mut step =
                        ExplorationStep::new(iteration, plan.explanation.clone(), plan.sql_query.clone(), insight);
                    if let Some((image, tag)) = self.chart_for(&result) {
                        step = step.with_chart(image, tag);
                    }
                    steps.push(step);

                    working = result;
                    iteration += 1;
                    phase = ExplorePhase::Planning;
                }

                ExplorePhase::Concluded | ExplorePhase::Exhausted => break,
            }
        }

        self.host.report_progress(70);
        let final_report = self.synthesize_report(goal, &steps, options).await;
        self.host.report_progress(90);

        self.host.preview(Preview::Markdown(final_report.clone()));
        self.host.report_progress(100);

        info!(%run_id, steps = steps.len(), "Exploration complete");
        Ok(ExplorationOutcome {
            run_id,
            steps,
            final_report,
        })
    }

    /// Ask the planner for the next step
    async fn plan(
        &self,
        goal: &str,
        working: &Table,
        iteration: u32,
        max_iterations: u32,
        steps: &[ExplorationStep],
        options: &ExplorationOptions,
    ) -> Result<ExplorationPlan, ExploreError> {
        debug!(iteration, "plan: called");
        let summary = summarize(working);
        let prior: Vec<serde_json::Value> = steps
            .iter()
            .map(|s| json!({"step": s.step_number, "finding": s.insight}))
            .collect();

        let prompt = format!(
            "Exploration Goal: {}\n\n\
             Current data state:\n{}\n\n\
             This is step {} of {}.\n\n\
             Previous steps:\n{}\n\n\
             Plan the next analytical step to discover insights.\n",
            goal,
            summary,
            iteration,
            max_iterations,
            serde_json::to_string_pretty(&prior).unwrap_or_else(|_| "[]".to_string()),
        );

        let request = CompletionRequest::new(embedded::EXPLORE, prompt).with_options(&options.llm);
        let completion = self.llm.complete(request).await?;
        parse_plan(&completion.content)
    }

    /// Ask for an insight describing the result; absorbs failures
    async fn explain(&self, plan: &ExplorationPlan, result: &Table, options: &ExplorationOptions) -> String {
        debug!("explain: called");
        let (rows, cols) = result.shape();
        let prompt = format!(
            "You executed this SQL query:\n{}\n\n\
             Expected to find: {}\n\n\
             Result data:\n{}\n\n\
             Result shape: {} rows, {} columns\n\n\
             What insight does this reveal? Provide a concise 1-2 sentence finding with specific numbers.\n",
            plan.sql_query,
            plan.expected_insight,
            preview_text(result, RESULT_PREVIEW_ROWS),
            rows,
            cols,
        );

        let request = CompletionRequest::new(embedded::INSIGHT, prompt)
            .with_options(&options.llm)
            .with_temperature(INSIGHT_TEMPERATURE)
            .with_max_tokens(INSIGHT_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(completion) => completion.content.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Insight call failed, falling back to expected insight");
                if plan.expected_insight.is_empty() {
                    "Analysis completed".to_string()
                } else {
                    plan.expected_insight.clone()
                }
            }
        }
    }

    /// Derive a chart for a result table; absorbs render failures
    fn chart_for(&self, result: &Table) -> Option<(String, String)> {
        let (policy, renderer) = self.charts.as_ref()?;
        let plan = policy.choose(result)?;
        let spec = spec_for_plan(&plan, result);
        match renderer.render(&spec) {
            Ok(image) => Some((image, plan.kind_tag().to_string())),
            Err(e) => {
                warn!(error = %e, "Chart render failed, substituting placeholder");
                Some((String::new(), "none".to_string()))
            }
        }
    }

    /// Produce the final markdown report; absorbs summarization failures
    async fn synthesize_report(&self, goal: &str, steps: &[ExplorationStep], options: &ExplorationOptions) -> String {
        debug!(step_count = steps.len(), "synthesize_report: called");
        if steps.is_empty() {
            return minimal_report(goal);
        }

        let digest = findings_digest(steps);
        let prompt = format!(
            "Exploration Goal: {}\n\n\
             Exploration Steps:\n{}\n\n\
             Generate a comprehensive markdown report summarizing the key findings.\n",
            goal, digest,
        );

        let request = CompletionRequest::new(embedded::SUMMARIZE, prompt)
            .with_options(&options.llm)
            .with_temperature(SUMMARY_TEMPERATURE)
            .with_max_tokens(SUMMARY_MAX_TOKENS);

        match self.llm.complete(request).await {
            Ok(completion) => completion.content.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Summarization failed, assembling fallback report");
                fallback_report(goal, steps)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::DefaultPolicy;
    use crate::charts::render::mock::{FailingRenderer, FixedRenderer};
    use crate::host::MemoryHost;
    use crate::llm::client::mock::{MockLlmClient, MockReply};
    use serde_json::{Map, json};
    use tablequery::SqliteEngine;

    fn sales_table() -> Table {
        let rows = vec![("east", 10), ("west", 20)]
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

    fn engine_with(llm: Arc<MockLlmClient>, host: Arc<MemoryHost>) -> ExplorationEngine {
        ExplorationEngine::new(llm, Arc::new(SqliteEngine::new()), host)
    }

    fn options(max_iterations: u32) -> ExplorationOptions {
        ExplorationOptions {
            max_iterations,
            llm: LlmOptions::default(),
        }
    }

    const EXPLORE_PLAN: &str = r#"{"action":"explore","sql_query":"SELECT region, sales FROM data ORDER BY sales DESC LIMIT 1","explanation":"rank by sales","expected_insight":"west leads"}"#;

    #[tokio::test]
    async fn test_single_step_run_records_insight() {
        // One explore plan, one insight, then the summarize call
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            EXPLORE_PLAN,
            "West leads with 20.",
            "# Report\n\nWest is the sales leader.",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host.clone());

        let outcome = engine
            .run(&sales_table(), "find sales leader", &options(1))
            .await
            .unwrap();

        assert_eq!(outcome.steps.len(), 1);
        let step = &outcome.steps[0];
        assert_eq!(step.step_number, 1);
        assert_eq!(step.transformation, "rank by sales");
        assert_eq!(step.insight, "West leads with 20.");
        assert_eq!(outcome.final_report, "# Report\n\nWest is the sales leader.");
        assert_eq!(llm.call_count(), 3);
    }

    #[tokio::test]
    async fn test_step_count_never_exceeds_budget() {
        // Three iterations of plans, insights, then the summary
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            EXPLORE_PLAN,
            "insight 1",
            EXPLORE_PLAN,
            "insight 2",
            EXPLORE_PLAN,
            "insight 3",
            "summary",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host);

        let outcome = engine.run(&sales_table(), "goal", &options(3)).await.unwrap();

        assert_eq!(outcome.steps.len(), 3);
        let numbers: Vec<u32> = outcome.steps.iter().map(|s| s.step_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_conclude_on_first_iteration_records_no_steps() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![r#"{"action":"conclude"}"#]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host);

        let outcome = engine.run(&sales_table(), "goal", &options(5)).await.unwrap();

        assert!(outcome.steps.is_empty());
        assert!(outcome.final_report.contains("No exploration steps were completed."));
        // Exactly one planning call; no insight or summary calls follow
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_query_is_recorded_and_working_table_unchanged() {
        let bad_plan = r#"{"action":"explore","sql_query":"SELECT nope FROM data","explanation":"typo","expected_insight":""}"#;
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            bad_plan,
            r#"{"action":"conclude"}"#,
            "summary",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host);

        let outcome = engine.run(&sales_table(), "goal", &options(3)).await.unwrap();

        assert_eq!(outcome.steps.len(), 1);
        let step = &outcome.steps[0];
        assert_eq!(step.step_number, 1);
        assert_eq!(step.sql_query, "SELECT nope FROM data");
        assert!(step.insight.starts_with("Query failed:"));
        assert!(step.insight.contains("SELECT nope FROM data"));

        // The second planning prompt still summarizes the ORIGINAL table,
        // proving the working table survived the failed query untouched
        let requests = llm.requests();
        assert!(requests[1].user_prompt.contains("east"));
        assert!(requests[1].user_prompt.contains("west"));
    }

    #[tokio::test]
    async fn test_insight_failure_falls_back_to_expected_insight() {
        let llm = Arc::new(MockLlmClient::new(vec![
            MockReply::Ok(EXPLORE_PLAN.to_string()),
            MockReply::Err("insight service down".to_string()),
            MockReply::Ok("summary".to_string()),
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host);

        let outcome = engine.run(&sales_table(), "goal", &options(1)).await.unwrap();

        assert_eq!(outcome.steps[0].insight, "west leads");
    }

    #[tokio::test]
    async fn test_summarize_failure_falls_back_to_templated_report() {
        let llm = Arc::new(MockLlmClient::new(vec![
            MockReply::Ok(EXPLORE_PLAN.to_string()),
            MockReply::Ok("West leads with 20.".to_string()),
            MockReply::Err("summarizer down".to_string()),
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host);

        let outcome = engine.run(&sales_table(), "find sales leader", &options(1)).await.unwrap();

        assert!(!outcome.final_report.is_empty());
        assert!(outcome.final_report.contains("find sales leader"));
        assert!(outcome.final_report.contains("West leads with 20."));
        assert!(outcome.final_report.contains("Completed 1 exploration steps."));
    }

    #[tokio::test]
    async fn test_malformed_plan_is_fatal_before_any_step() {
        let llm = Arc::new(MockLlmClient::with_texts(vec!["not json"]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host.clone());

        let err = engine.run(&sales_table(), "goal", &options(3)).await.unwrap_err();

        assert!(matches!(err, ExploreError::PlanParse { .. }));
        assert_eq!(llm.call_count(), 1);
        // Aborted before report synthesis: no preview was shown
        assert!(host.previews().is_empty());
    }

    #[tokio::test]
    async fn test_planning_call_failure_is_fatal() {
        let llm = Arc::new(MockLlmClient::new(vec![MockReply::Err("gateway down".to_string())]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host);

        let err = engine.run(&sales_table(), "goal", &options(3)).await.unwrap_err();
        assert!(matches!(err, ExploreError::Planning(_)));
    }

    #[tokio::test]
    async fn test_empty_input_is_fatal_before_any_call() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host);

        let empty = Table::new(vec!["region".to_string()], vec![]);
        let err = engine.run(&empty, "goal", &options(3)).await.unwrap_err();

        assert!(matches!(err, ExploreError::EmptyInput));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_no_query_plan_spends_iteration_without_trace() {
        let no_query = r#"{"action":"explore","explanation":"thinking"}"#;
        let llm = Arc::new(MockLlmClient::with_texts(vec![no_query, no_query]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host);

        let outcome = engine.run(&sales_table(), "goal", &options(2)).await.unwrap();

        assert!(outcome.steps.is_empty());
        // Two planning calls, no insight calls, no summary (zero steps)
        assert_eq!(llm.call_count(), 2);
        assert!(outcome.final_report.contains("No exploration steps"));
    }

    #[tokio::test]
    async fn test_working_table_advances_after_successful_step() {
        let second_plan = r#"{"action":"explore","sql_query":"SELECT COUNT(*) AS n FROM data","explanation":"count","expected_insight":""}"#;
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            EXPLORE_PLAN,
            "West leads with 20.",
            second_plan,
            "One row remains.",
            "summary",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm.clone(), host);

        let outcome = engine.run(&sales_table(), "goal", &options(2)).await.unwrap();

        assert_eq!(outcome.steps.len(), 2);
        // After step 1 the working table is the single west row; the second
        // planning prompt must describe that table, not the input
        let requests = llm.requests();
        assert!(requests[2].user_prompt.contains("west"));
        assert!(!requests[2].user_prompt.contains("east"));
        // And the second query ran against it: COUNT(*) of one row
        assert!(requests[3].user_prompt.contains("1 rows, 1 columns"));
    }

    #[tokio::test]
    async fn test_progress_checkpoints_and_preview() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            EXPLORE_PLAN,
            "West leads with 20.",
            "# Report",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host.clone());

        engine.run(&sales_table(), "goal", &options(1)).await.unwrap();

        let progress = host.progress_values();
        assert_eq!(progress.first(), Some(&5));
        assert_eq!(progress.last(), Some(&100));
        assert!(progress.contains(&70));
        assert!(progress.contains(&90));

        let previews = host.previews();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0], Preview::Markdown("# Report".to_string()));
    }

    #[tokio::test]
    async fn test_chart_attached_when_renderer_succeeds() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            EXPLORE_PLAN,
            "West leads with 20.",
            "summary",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host)
            .with_charts(Arc::new(DefaultPolicy), Arc::new(FixedRenderer("IMAGEBYTES")));

        let outcome = engine.run(&sales_table(), "goal", &options(1)).await.unwrap();

        let step = &outcome.steps[0];
        assert_eq!(step.chart_image.as_deref(), Some("IMAGEBYTES"));
        assert_eq!(step.chart_type.as_deref(), Some("bar"));
    }

    #[tokio::test]
    async fn test_chart_render_failure_substitutes_placeholder() {
        let llm = Arc::new(MockLlmClient::with_texts(vec![
            EXPLORE_PLAN,
            "West leads with 20.",
            "summary",
        ]));
        let host = Arc::new(MemoryHost::new());
        let engine = engine_with(llm, host).with_charts(Arc::new(DefaultPolicy), Arc::new(FailingRenderer));

        let outcome = engine.run(&sales_table(), "goal", &options(1)).await.unwrap();

        let step = &outcome.steps[0];
        assert_eq!(step.chart_image.as_deref(), Some(""));
        assert_eq!(step.chart_type.as_deref(), Some("none"));
    }
}
