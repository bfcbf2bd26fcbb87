//! Commit fetching and conventional commit parsing.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Commit, Oid, Repository};

use crate::error::GitError;

use super::range::ResolvedRange;

/// Conventional commit types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitType {
    Feat,
    Fix,
    Docs,
    Style,
    Refactor,
    Perf,
    Test,
    Build,
    Ci,
    Chore,
}

impl CommitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Feat => "feat",
            Self::Fix => "fix",
            Self::Docs => "docs",
            Self::Style => "style",
            Self::Refactor => "refactor",
            Self::Perf => "perf",
            Self::Test => "test",
            Self::Build => "build",
            Self::Ci => "ci",
            Self::Chore => "chore",
        }
    }
}

impl std::str::FromStr for CommitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "feat" => Ok(Self::Feat),
            "fix" => Ok(Self::Fix),
            "docs" => Ok(Self::Docs),
            "style" => Ok(Self::Style),
            "refactor" => Ok(Self::Refactor),
            "perf" => Ok(Self::Perf),
            "test" => Ok(Self::Test),
            "build" => Ok(Self::Build),
            "ci" => Ok(Self::Ci),
            "chore" => Ok(Self::Chore),
            _ => Err(format!("Unknown commit type: {}", s)),
        }
    }
}

/// A commit in the range, with conventional commit parsing applied.
#[derive(Debug, Clone)]
pub struct ParsedCommit {
    pub sha: String,
    /// First line of the message.
    pub summary: String,
    pub message: String,
    pub author: String,
    pub commit_type: Option<CommitType>,
    pub scope: Option<String>,
    pub breaking: bool,
    pub timestamp: DateTime<Utc>,
    pub parent_ids: Vec<Oid>,
}

impl ParsedCommit {
    /// Create a ParsedCommit from a git2 Commit.
    pub fn from_git2_commit(commit: &Commit) -> Result<Self, GitError> {
        let sha = commit.id().to_string();
        let message = commit.message().unwrap_or("").to_string();
        let summary = message.lines().next().unwrap_or("").to_string();
        let author = commit.author().name().unwrap_or("unknown").to_string();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .ok_or(GitError::InvalidTimestamp {
                hash: sha.clone(),
                seconds: time.seconds(),
            })?;

        let (commit_type, scope, breaking) = parse_commit_message(&message);
        let parent_ids = commit.parent_ids().collect();

        Ok(Self {
            sha,
            summary,
            message,
            author,
            commit_type,
            scope,
            breaking,
            timestamp,
            parent_ids,
        })
    }

    pub fn is_merge(&self) -> bool {
        self.parent_ids.len() > 1
    }

    /// Abbreviated hash for display.
    pub fn short_sha(&self) -> &str {
        &self.sha[..self.sha.len().min(7)]
    }
}

/// Parse a conventional commit message.
/// Returns (commit_type, scope, breaking).
pub fn parse_commit_message(message: &str) -> (Option<CommitType>, Option<String>, bool) {
    let first_line = message.lines().next().unwrap_or("");

    // Check for BREAKING CHANGE in footer
    let breaking_in_footer =
        message.contains("BREAKING CHANGE:") || message.contains("BREAKING-CHANGE:");

    // Pattern: type(scope)!: description or type!: description or type(scope): description or type: description
    let re_pattern = r"^(\w+)(?:\(([^)]+)\))?(!)?\s*:\s*";

    let re = regex_lite::Regex::new(re_pattern).unwrap();

    if let Some(caps) = re.captures(first_line) {
        let type_str = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let scope = caps.get(2).map(|m| m.as_str().to_string());
        let breaking_mark = caps.get(3).is_some();

        let commit_type = type_str.parse::<CommitType>().ok();
        let breaking = breaking_mark || breaking_in_footer;

        return (commit_type, scope, breaking);
    }

    (None, None, breaking_in_footer)
}

/// Fetch the commits inside a resolved range, oldest first.
///
/// The `from` boundary is excluded unless the range marks it inclusive,
/// in which case the parents of `from` are hidden instead so `from`
/// itself (and a whole-history walk from the root) is emitted.
pub fn fetch_commits(
    repo: &Repository,
    range: &ResolvedRange,
) -> Result<Vec<ParsedCommit>, GitError> {
    if range.is_empty() {
        return Ok(Vec::new());
    }

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(range.to).map_err(GitError::RevwalkError)?;

    if range.from_inclusive {
        let from_commit = repo.find_commit(range.from).map_err(GitError::ParseCommit)?;
        for parent in from_commit.parent_ids() {
            revwalk.hide(parent).map_err(GitError::RevwalkError)?;
        }
    } else {
        revwalk.hide(range.from).map_err(GitError::RevwalkError)?;
    }

    revwalk
        .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME | git2::Sort::REVERSE)
        .map_err(GitError::RevwalkError)?;

    let mut commits = Vec::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(GitError::RevwalkError)?;
        let commit = repo.find_commit(oid).map_err(GitError::ParseCommit)?;
        commits.push(ParsedCommit::from_git2_commit(&commit)?);
    }

    Ok(commits)
}

/// Commits reachable from a merge's second parent but not its first:
/// the branch side of a merge, i.e. the PR's own commits.
pub fn merge_branch_commits(
    repo: &Repository,
    merge: &ParsedCommit,
) -> Result<Vec<String>, GitError> {
    let [first, second, ..] = merge.parent_ids.as_slice() else {
        return Ok(Vec::new());
    };

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(*second).map_err(GitError::RevwalkError)?;
    revwalk.hide(*first).map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME | git2::Sort::REVERSE)
        .map_err(GitError::RevwalkError)?;

    let mut shas = Vec::new();
    for oid_result in revwalk {
        let oid = oid_result.map_err(GitError::RevwalkError)?;
        shas.push(oid.to_string());
    }
    Ok(shas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feat_commit() {
        let (ty, scope, breaking) = parse_commit_message("feat: add new feature");
        assert_eq!(ty, Some(CommitType::Feat));
        assert_eq!(scope, None);
        assert!(!breaking);
    }

    #[test]
    fn test_parse_fix_with_scope() {
        let (ty, scope, breaking) = parse_commit_message("fix(auth): resolve login bug");
        assert_eq!(ty, Some(CommitType::Fix));
        assert_eq!(scope, Some("auth".to_string()));
        assert!(!breaking);
    }

    #[test]
    fn test_parse_breaking_with_exclamation() {
        let (ty, scope, breaking) = parse_commit_message("feat!: breaking change");
        assert_eq!(ty, Some(CommitType::Feat));
        assert_eq!(scope, None);
        assert!(breaking);
    }

    #[test]
    fn test_parse_breaking_in_footer() {
        let msg = "feat: add feature\n\nBREAKING CHANGE: this breaks things";
        let (ty, _, breaking) = parse_commit_message(msg);
        assert_eq!(ty, Some(CommitType::Feat));
        assert!(breaking);
    }

    #[test]
    fn test_parse_non_conventional() {
        let (ty, scope, breaking) = parse_commit_message("just a normal commit message");
        assert_eq!(ty, None);
        assert_eq!(scope, None);
        assert!(!breaking);
    }

    #[test]
    fn test_commit_type_round_trips_through_as_str() {
        for ty in [
            CommitType::Feat,
            CommitType::Fix,
            CommitType::Docs,
            CommitType::Chore,
        ] {
            assert_eq!(ty.as_str().parse::<CommitType>(), Ok(ty));
        }
    }
}
