//! Chart renderer boundary
//!
//! Rasterizing a Vega-Lite spec is the host platform's job. Blocks receive a
//! renderer as an injected collaborator; the exploration loop treats rendering
//! failures as degraded output, never as run failures.

use serde_json::Value;
use thiserror::Error;

/// Errors from the rendering collaborator
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Chart rendering failed: {0}")]
    Failed(String),

    #[error("No chart renderer is attached")]
    Unavailable,
}

/// Renders a Vega-Lite spec into an encoded image
///
/// The returned string is the encoded image payload (base64 PNG by convention),
/// suitable for embedding in a data URL.
pub trait ChartRenderer: Send + Sync {
    fn render(&self, spec: &Value) -> Result<String, RenderError>;
}
