//! DataScout - LLM-driven data exploration and analysis blocks
//!
//! DataScout is a collection of data-analysis blocks designed to be wired into
//! flows by a host platform: load data, transform it with LLM-generated SQL,
//! recommend and build charts, check quality, run statistics, and write
//! reports. The centerpiece is the exploration agent: a bounded
//! plan/execute/explain loop that autonomously discovers insights in tabular
//! data.
//!
//! # Core Concepts
//!
//! - **Blocks Are Thin**: each block does one piece of work and returns JSON
//! - **Collaborators Are Injected**: the completion gateway, query engine,
//!   progress/preview sinks, and chart renderer are all trait objects, so every
//!   block runs deterministically under test
//! - **Discovery Errors Degrade, Control Errors Abort**: a failed query or
//!   render becomes a degraded result; an unparseable plan ends the run
//!
//! # Modules
//!
//! - [`explore`] - the exploration loop controller
//! - [`blocks`] - the analysis blocks and registry
//! - [`llm`] - completion gateway boundary
//! - [`charts`] - chart policy, Vega-Lite specs, renderer boundary
//! - [`host`] - progress/preview sinks
//! - [`config`] - configuration types and loading
//! - [`prompts`] - embedded system prompts
//! - [`cli`] - command-line interface

pub mod blocks;
pub mod charts;
pub mod cli;
pub mod config;
pub mod explore;
pub mod host;
pub mod llm;
pub mod prompts;

// Re-export commonly used types
pub use blocks::{Block, BlockContext, BlockError, BlockRegistry};
pub use charts::{ChartPlan, ChartPolicy, ChartRenderer, DefaultPolicy, RenderError};
pub use config::{Config, LlmConfig};
pub use explore::{
    ExplorationEngine, ExplorationOptions, ExplorationOutcome, ExplorationStep, ExploreError, PlanAction,
};
pub use host::{ConsoleHost, HostContext, MemoryHost, Preview};
pub use llm::{Completion, CompletionRequest, LlmClient, LlmError, LlmOptions, OpenAiClient, create_client};
