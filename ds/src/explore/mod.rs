//! Exploration loop controller
//!
//! A bounded plan/execute/explain loop over a mutable tabular working set,
//! producing a structured trace and a final narrative report.

mod engine;
mod error;
mod plan;
mod report;
mod step;

pub use engine::{DEFAULT_MAX_ITERATIONS, ExplorationEngine, ExplorationOptions, ExplorationOutcome};
pub use error::ExploreError;
pub use plan::{ExplorationPlan, PlanAction, parse_plan};
pub use report::{fallback_report, findings_digest, minimal_report};
pub use step::ExplorationStep;
