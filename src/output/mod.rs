//! Summary renderers.
//!
//! stdout carries exactly one rendered document per run; everything
//! else (progress, warnings) goes to stderr.

pub mod json;
pub mod markdown;
pub mod terminal;

use crate::summarize::Summary;

/// Output format, resolved from the CLI flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Terminal,
    Markdown,
    Json,
}

/// Render a summary in the requested format.
pub fn render(summary: &Summary, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Terminal => Ok(terminal::render(summary)),
        OutputFormat::Markdown => Ok(markdown::render(summary)),
        OutputFormat::Json => json::render(summary),
    }
}
