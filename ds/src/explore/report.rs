//! Report assembly
//!
//! The findings digest feeds both the summarization prompt and the local
//! fallback report used when the summarization call fails.

use tracing::debug;

use super::step::ExplorationStep;

/// One paragraph per step: explanation plus finding
pub fn findings_digest(steps: &[ExplorationStep]) -> String {
    debug!(step_count = steps.len(), "findings_digest: called");
    steps
        .iter()
        .map(|s| format!("**Step {}**: {}\n- Finding: {}", s.step_number, s.transformation, s.insight))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Report for runs that recorded no steps at all
pub fn minimal_report(goal: &str) -> String {
    format!(
        "# Exploration Report\n\nGoal: {}\n\nNo exploration steps were completed.",
        goal
    )
}

/// Locally assembled report used when summarization fails
pub fn fallback_report(goal: &str, steps: &[ExplorationStep]) -> String {
    debug!(step_count = steps.len(), "fallback_report: called");
    format!(
        "# Data Exploration Report\n\n\
         ## Goal\n{}\n\n\
         ## Findings\n\n{}\n\n\
         ## Conclusion\nCompleted {} exploration steps.\n",
        goal,
        findings_digest(steps),
        steps.len()
    )
}
