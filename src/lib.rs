//! gazette - A CLI tool that turns git history into structured release notes.
//!
//! # Overview
//!
//! gazette resolves a commit range (tag, SHA pair, date or duration
//! window), groups the commits into change units (one per merged PR
//! where detectable), selects the most informative diff hunks as
//! evidence, summarizes each unit into one bullet (remote model or
//! deterministic heuristic, with a persistent cache), and reduces the
//! bullets into a deduplicated, capped summary rendered as terminal
//! text, Markdown, or JSON.

pub mod cache;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod output;
pub mod provider;
pub mod summarize;
pub mod unit;

// Re-export commonly used types
pub use config::Config;
pub use error::{CacheError, ConfigError, GitError, GitHubError, ProviderError, RangeError};
pub use git::{CommitType, ParsedCommit, RangeRequest, ResolvedRange};
pub use github::PullRequest;
pub use summarize::{Bullet, SectionKind, Summary, SummaryStats};
pub use unit::{ChangeUnit, PreparedUnit, UnitKind};
