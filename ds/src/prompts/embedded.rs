//! Embedded prompts
//!
//! System prompts are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Exploration planner prompt
pub const EXPLORE: &str = include_str!("../../prompts/explore.pmt");

/// Insight extractor prompt
pub const INSIGHT: &str = include_str!("../../prompts/insight.pmt");

/// Findings summarizer prompt
pub const SUMMARIZE: &str = include_str!("../../prompts/summarize.pmt");

/// SQL generator prompt
pub const SQL: &str = include_str!("../../prompts/sql.pmt");

/// Chart recommender prompt
pub const CHARTS: &str = include_str!("../../prompts/charts.pmt");

/// Report generator prompt
pub const REPORT: &str = include_str!("../../prompts/report.pmt");

/// Data quality advisor prompt
pub const QUALITY: &str = include_str!("../../prompts/quality.pmt");

/// Statistical interpreter prompt
pub const STATS: &str = include_str!("../../prompts/stats.pmt");

/// Table extraction from plain text
pub const EXTRACT_TEXT: &str = include_str!("../../prompts/extract-text.pmt");

/// Table extraction from HTML
pub const EXTRACT_HTML: &str = include_str!("../../prompts/extract-html.pmt");

/// Table extraction from images
pub const EXTRACT_IMAGE: &str = include_str!("../../prompts/extract-image.pmt");

/// Get an embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "explore" => Some(EXPLORE),
        "insight" => Some(INSIGHT),
        "summarize" => Some(SUMMARIZE),
        "sql" => Some(SQL),
        "charts" => Some(CHARTS),
        "report" => Some(REPORT),
        "quality" => Some(QUALITY),
        "stats" => Some(STATS),
        "extract-text" => Some(EXTRACT_TEXT),
        "extract-html" => Some(EXTRACT_HTML),
        "extract-image" => Some(EXTRACT_IMAGE),
        _ => None,
    }
}
