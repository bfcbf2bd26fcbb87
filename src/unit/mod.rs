//! Change units and the evidence attached to them.

pub mod evidence;
pub mod extract;

pub use evidence::{DiffHunk, EvidenceSet, HunkCategory, PreparedUnit, select_evidence};
pub use extract::{ChangeUnit, ExtractedUnit, UnitKind, extract_units};
