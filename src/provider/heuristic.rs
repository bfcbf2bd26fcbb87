//! Deterministic fallback backend.
//!
//! Builds the bullet from the unit title alone. Always available and
//! never fails, which makes it both the zero-credential default and the
//! landing spot when remote attempts are exhausted.

use crate::error::ProviderError;
use crate::provider::{Summarizer, UnitContext};
use crate::unit::ChangeUnit;

pub struct HeuristicProvider;

#[async_trait::async_trait]
impl Summarizer for HeuristicProvider {
    fn id(&self) -> &'static str {
        "heuristic"
    }

    fn model(&self) -> &str {
        "title"
    }

    async fn summarize(&self, ctx: &UnitContext<'_>) -> Result<String, ProviderError> {
        Ok(bullet_from_title(ctx.unit))
    }
}

/// Title to bullet: conventional prefix off, trailing period off, first
/// letter up. An empty title becomes "Update".
pub fn bullet_from_title(unit: &ChangeUnit) -> String {
    let re = regex_lite::Regex::new(r"^\w+(?:\([^)]+\))?!?\s*:\s*").unwrap();
    let stripped = re.replace(unit.title.trim(), "");
    let cleaned = stripped.trim().trim_end_matches('.').trim();
    if cleaned.is_empty() {
        return "Update".to_string();
    }

    let mut chars = cleaned.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Update".to_string(),
    }
}
