//! JSON rendering for machine consumers.

use crate::summarize::Summary;

/// Serialize the full summary, stats included.
pub fn render(summary: &Summary) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(summary)
}
