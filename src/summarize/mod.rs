//! Map/reduce summarization.
//!
//! The map phase turns each change unit into one bullet, consulting the
//! cache and the selected provider. The reduce phase merges bullets
//! into the final Summary.

pub mod map;
pub mod prompt;
pub mod reduce;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::git::commits::CommitType;

pub use map::{MapOutcome, MapStats, run_map};
pub use reduce::{ReduceOptions, reduce};

/// Which part of the changelog a bullet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Feature,
    Fix,
    Internal,
    Other,
}

impl SectionKind {
    /// Canonical presentation order.
    pub const ORDER: [SectionKind; 4] = [
        SectionKind::Feature,
        SectionKind::Fix,
        SectionKind::Internal,
        SectionKind::Other,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            SectionKind::Feature => "Features",
            SectionKind::Fix => "Fixes",
            SectionKind::Internal => "Internal",
            SectionKind::Other => "Other",
        }
    }

    /// Route a conventional-commit category to its section. Unknown or
    /// absent categories land in Other.
    pub fn from_category(category: Option<CommitType>) -> SectionKind {
        match category {
            Some(CommitType::Feat) => SectionKind::Feature,
            Some(CommitType::Fix) => SectionKind::Fix,
            Some(
                CommitType::Chore
                | CommitType::Ci
                | CommitType::Build
                | CommitType::Test
                | CommitType::Style
                | CommitType::Refactor,
            ) => SectionKind::Internal,
            Some(CommitType::Docs | CommitType::Perf) | None => SectionKind::Other,
        }
    }
}

/// One summarized change, ready for aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct Bullet {
    pub unit_id: String,
    pub text: String,
    pub section: SectionKind,
    pub is_internal: bool,
    pub category: Option<CommitType>,
    /// Merge chronology carried from the unit so ordering never depends
    /// on how the map phase interleaved.
    pub merged_at: DateTime<Utc>,
    /// Display references: PR number or short SHA, then linked issues.
    pub refs: Vec<String>,
}

/// Aggregated output of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// `from..to` as resolved, e.g. `v1.2.0..v1.3.0`.
    pub range: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub sections: Vec<SummarySection>,
    pub stats: SummaryStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummarySection {
    pub kind: SectionKind,
    pub title: &'static str,
    pub bullets: Vec<Bullet>,
}

/// Run accounting, also used by tests to pin cache and fallback
/// behavior.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SummaryStats {
    pub units: usize,
    pub bullets: usize,
    pub deduplicated: usize,
    pub capped: usize,
    pub internal_dropped: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Remote summarize invocations (attempts), not retries collapsed.
    pub provider_calls: usize,
    pub fallback_units: usize,
    pub provider_used: String,
}
