//! Host context - progress and preview sinks
//!
//! Blocks run inside a flow host that displays progress and rendered previews.
//! The host is injected as an explicit collaborator so every block (and the
//! exploration loop) can run deterministically under test without a live host.

use std::sync::Mutex;

use tracing::{debug, info};

/// A rendered document handed to the host for display
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Markdown(String),
    Html(String),
    /// Encoded image, typically a data URL
    Image(String),
}

impl Preview {
    /// Kind tag matching the host wire format
    pub fn kind(&self) -> &'static str {
        match self {
            Preview::Markdown(_) => "markdown",
            Preview::Html(_) => "html",
            Preview::Image(_) => "image",
        }
    }

    /// The document payload
    pub fn payload(&self) -> &str {
        match self {
            Preview::Markdown(s) | Preview::Html(s) | Preview::Image(s) => s,
        }
    }
}

/// Progress and preview sinks provided by the flow host
///
/// Both calls are side-effect only; the caller never consumes a return value.
/// Progress is a 0-100 percentage, expected (not enforced) to be non-decreasing
/// within a run.
pub trait HostContext: Send + Sync {
    /// Report run progress as a percentage
    fn report_progress(&self, percent: u8);

    /// Hand a rendered document to the host for display
    fn preview(&self, preview: Preview);
}

/// Host for CLI runs: progress goes to the log, previews to stdout
pub struct ConsoleHost {
    /// When false, HTML and image previews are suppressed (markdown still prints)
    pub print_rich_previews: bool,
}

impl ConsoleHost {
    pub fn new() -> Self {
        Self {
            print_rich_previews: false,
        }
    }
}

impl Default for ConsoleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostContext for ConsoleHost {
    fn report_progress(&self, percent: u8) {
        info!(percent, "progress");
    }

    fn preview(&self, preview: Preview) {
        debug!(kind = preview.kind(), "ConsoleHost::preview: called");
        match &preview {
            Preview::Markdown(text) => println!("{}", text),
            Preview::Html(text) | Preview::Image(text) => {
                if self.print_rich_previews {
                    println!("{}", text);
                }
            }
        }
    }
}

/// Recording host for tests and embedders
///
/// Captures every progress value and preview in call order.
#[derive(Default)]
pub struct MemoryHost {
    progress: Mutex<Vec<u8>>,
    previews: Mutex<Vec<Preview>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress values reported so far, in order
    pub fn progress_values(&self) -> Vec<u8> {
        self.progress.lock().expect("progress poisoned").clone()
    }

    /// Previews shown so far, in order
    pub fn previews(&self) -> Vec<Preview> {
        self.previews.lock().expect("previews poisoned").clone()
    }
}

impl HostContext for MemoryHost {
    fn report_progress(&self, percent: u8) {
        self.progress.lock().expect("progress poisoned").push(percent);
    }

    fn preview(&self, preview: Preview) {
        self.previews.lock().expect("previews poisoned").push(preview);
    }
}
