//! Git operations using git2-rs.

pub mod commits;
pub mod diffs;
pub mod range;
pub mod tags;

pub use commits::{CommitType, ParsedCommit, fetch_commits, parse_commit_message};
pub use diffs::{CommitDiff, FileDiff, collect_commit_diff};
pub use range::{RangeRequest, ResolvedRange, resolve_range};
pub use tags::{TagInfo, get_version_from_tag};
