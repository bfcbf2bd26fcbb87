//! Change unit extraction.
//!
//! Groups the commits of a resolved range into units: one per merged PR
//! where the PR is detectable (platform metadata, merge-commit message,
//! or squash-title convention), one per leftover commit otherwise.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};
use git2::Repository;
use tracing::{debug, warn};

use crate::config::InternalRules;
use crate::git::commits::{CommitType, ParsedCommit, merge_branch_commits, parse_commit_message};
use crate::git::diffs::{CommitDiff, collect_commit_diff};
use crate::github::prs::{PullRequest, issue_refs};

/// What kind of history object a unit came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    PullRequest,
    Commit,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::PullRequest => "pull_request",
            UnitKind::Commit => "commit",
        }
    }
}

/// The atom of summarization: a merged PR or a standalone commit.
#[derive(Debug, Clone)]
pub struct ChangeUnit {
    /// `pr-123` for PR units, the abbreviated SHA otherwise.
    pub id: String,
    pub kind: UnitKind,
    pub title: String,
    pub author: String,
    /// Member commits, oldest first.
    pub commit_shas: Vec<String>,
    pub files: BTreeSet<String>,
    pub linked_issues: BTreeSet<u64>,
    pub is_internal: bool,
    /// Conventional type from the title, refined by PR labels.
    pub category: Option<CommitType>,
    pub breaking: bool,
    /// When the unit landed on the main line. Chronological anchor for
    /// ordering and dedup survival.
    pub merged_at: DateTime<Utc>,
}

impl ChangeUnit {
    /// Display references for rendered bullets: the PR number or short
    /// SHA, then linked issues.
    pub fn refs(&self) -> Vec<String> {
        let mut refs = vec![match self.kind {
            UnitKind::PullRequest => format!("#{}", self.id.trim_start_matches("pr-")),
            UnitKind::Commit => self.id.clone(),
        }];
        refs.extend(self.linked_issues.iter().map(|n| format!("#{n}")));
        refs
    }
}

/// A unit plus the raw diffs evidence selection will consume.
#[derive(Debug)]
pub struct ExtractedUnit {
    pub unit: ChangeUnit,
    pub diffs: Vec<CommitDiff>,
}

/// Group range commits (oldest first) into change units, ordered by
/// merge chronology.
///
/// `prs` may be empty: metadata fetch failures degrade to grouping by
/// message conventions alone.
pub fn extract_units(
    repo: &Repository,
    commits: &[ParsedCommit],
    prs: &[PullRequest],
    rules: &InternalRules,
) -> Vec<ExtractedUnit> {
    if commits.is_empty() {
        return Vec::new();
    }

    let by_sha: HashMap<&str, &ParsedCommit> =
        commits.iter().map(|c| (c.sha.as_str(), c)).collect();
    let prs_by_merge_sha: HashMap<&str, &PullRequest> = prs
        .iter()
        .filter_map(|pr| pr.merge_commit_sha.as_deref().map(|sha| (sha, pr)))
        .collect();

    let mut claimed: HashSet<String> = HashSet::new();
    let mut units: Vec<ExtractedUnit> = Vec::new();

    // First pass: PR units. Each claims its member commits so the
    // second pass only sees what is left.
    for commit in commits {
        if claimed.contains(&commit.sha) {
            continue;
        }

        let (pr_number, metadata) = match prs_by_merge_sha.get(commit.sha.as_str()) {
            Some(pr) => (Some(pr.number), Some(*pr)),
            None => (detect_pr_number(commit), None),
        };
        let Some(number) = pr_number else {
            continue;
        };

        let mut members: Vec<String> = if commit.is_merge() {
            match merge_branch_commits(repo, commit) {
                Ok(shas) => shas
                    .into_iter()
                    .filter(|sha| by_sha.contains_key(sha.as_str()) && !claimed.contains(sha))
                    .collect(),
                Err(e) => {
                    warn!(sha = %commit.short_sha(), "Could not walk merge lineage: {e}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };
        if members.is_empty() {
            // Squash merge, or a merge whose branch commits fall outside
            // the range: the anchor commit carries the whole change.
            members.push(commit.sha.clone());
        }
        claimed.insert(commit.sha.clone());
        claimed.extend(members.iter().cloned());

        let member_commits: Vec<&ParsedCommit> = members
            .iter()
            .filter_map(|sha| by_sha.get(sha.as_str()).copied())
            .collect();

        units.push(build_pr_unit(
            repo,
            number,
            commit,
            metadata,
            &members,
            &member_commits,
            rules,
        ));
    }

    // Second pass: everything unclaimed becomes a standalone unit.
    for commit in commits {
        if claimed.contains(&commit.sha) {
            continue;
        }
        units.push(build_commit_unit(repo, commit, rules));
    }

    units.sort_by(|a, b| {
        a.unit
            .merged_at
            .cmp(&b.unit.merged_at)
            .then_with(|| a.unit.id.cmp(&b.unit.id))
    });

    debug!(units = units.len(), commits = commits.len(), "Extracted change units");
    units
}

fn build_pr_unit(
    repo: &Repository,
    number: u64,
    anchor: &ParsedCommit,
    metadata: Option<&PullRequest>,
    members: &[String],
    member_commits: &[&ParsedCommit],
    rules: &InternalRules,
) -> ExtractedUnit {
    let title = metadata
        .map(|pr| pr.title.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| derive_merge_title(anchor, member_commits));

    let author = metadata
        .and_then(|pr| pr.author.clone())
        .unwrap_or_else(|| anchor.author.clone());

    let labels: Vec<String> = metadata.map(|pr| pr.labels.clone()).unwrap_or_default();

    // The merge commit itself only contributes a diff when it stands in
    // for the whole PR; otherwise member diffs already cover the change.
    let diffs = collect_diffs(repo, members);
    let files = files_of(&diffs);

    let mut linked_issues = issue_refs(&title);
    if let Some(pr) = metadata
        && let Some(body) = &pr.body
    {
        linked_issues.extend(issue_refs(body));
    }
    for member in member_commits {
        linked_issues.extend(issue_refs(&member.message));
    }
    linked_issues.remove(&number);

    let (title_type, _, title_breaking) = parse_commit_message(&title);
    let category = title_type.or_else(|| category_from_labels(&labels));
    let breaking = title_breaking || member_commits.iter().any(|c| c.breaking);

    let member_types: Vec<Option<CommitType>> =
        member_commits.iter().map(|c| c.commit_type).collect();
    let is_internal = classify_internal(&files, &member_types, &labels, rules);

    ExtractedUnit {
        unit: ChangeUnit {
            id: format!("pr-{number}"),
            kind: UnitKind::PullRequest,
            title: clean_title(&title),
            author,
            commit_shas: members.to_vec(),
            files,
            linked_issues,
            is_internal,
            category,
            breaking,
            merged_at: metadata
                .and_then(|pr| pr.merged_at)
                .unwrap_or(anchor.timestamp),
        },
        diffs,
    }
}

fn build_commit_unit(
    repo: &Repository,
    commit: &ParsedCommit,
    rules: &InternalRules,
) -> ExtractedUnit {
    let diffs = collect_diffs(repo, std::slice::from_ref(&commit.sha));
    let files = files_of(&diffs);

    let linked_issues = issue_refs(&commit.message);
    let member_types = [commit.commit_type];
    let is_internal = classify_internal(&files, &member_types, &[], rules);

    ExtractedUnit {
        unit: ChangeUnit {
            id: commit.short_sha().to_string(),
            kind: UnitKind::Commit,
            title: clean_title(&commit.summary),
            author: commit.author.clone(),
            commit_shas: vec![commit.sha.clone()],
            files,
            linked_issues,
            is_internal,
            category: commit.commit_type,
            breaking: commit.breaking,
            merged_at: commit.timestamp,
        },
        diffs,
    }
}

fn collect_diffs(repo: &Repository, shas: &[String]) -> Vec<CommitDiff> {
    let mut diffs = Vec::new();
    for sha in shas {
        match git2::Oid::from_str(sha) {
            Ok(oid) => match collect_commit_diff(repo, oid) {
                Ok(diff) => diffs.push(diff),
                Err(e) => warn!(sha = %sha, "Skipping diff for commit: {e}"),
            },
            Err(e) => warn!(sha = %sha, "Skipping malformed SHA: {e}"),
        }
    }
    diffs
}

fn files_of(diffs: &[CommitDiff]) -> BTreeSet<String> {
    diffs
        .iter()
        .flat_map(|d| d.paths().map(str::to_string))
        .collect()
}

/// PR number from message conventions: a `Merge pull request #N` merge
/// or a squash title ending in `(#N)`.
pub fn detect_pr_number(commit: &ParsedCommit) -> Option<u64> {
    if commit.is_merge() {
        let re = regex_lite::Regex::new(r"^Merge pull request #(\d+)").unwrap();
        if let Some(caps) = re.captures(&commit.summary) {
            return caps[1].parse().ok();
        }
        return None;
    }

    let re = regex_lite::Regex::new(r"\(#(\d+)\)\s*$").unwrap();
    re.captures(&commit.summary)
        .and_then(|caps| caps[1].parse().ok())
}

/// Title for a convention-detected merge: the merge body carries the PR
/// title on GitHub merges; the first member commit is the next best.
fn derive_merge_title(merge: &ParsedCommit, members: &[&ParsedCommit]) -> String {
    if let Some(body_title) = merge
        .message
        .split_once("\n\n")
        .map(|(_, body)| body.lines().next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
    {
        return body_title.to_string();
    }
    if let Some(first) = members.first() {
        return first.summary.clone();
    }
    merge.summary.clone()
}

/// Strip a trailing squash `(#N)` marker; it reappears in refs.
fn clean_title(title: &str) -> String {
    let re = regex_lite::Regex::new(r"\s*\(#\d+\)\s*$").unwrap();
    re.replace(title.trim(), "").to_string()
}

/// Label-derived category when the title has no conventional prefix.
fn category_from_labels(labels: &[String]) -> Option<CommitType> {
    for label in labels {
        let label = label.to_lowercase();
        match label.as_str() {
            "bug" | "bugfix" | "fix" => return Some(CommitType::Fix),
            "feature" | "enhancement" => return Some(CommitType::Feat),
            "documentation" | "docs" => return Some(CommitType::Docs),
            "performance" => return Some(CommitType::Perf),
            _ => {}
        }
    }
    None
}

/// A unit is internal when users of the project would not observe it:
/// every touched path matches an internal prefix, or every member commit
/// carries an internal marker type, or an internal PR label is present.
pub fn classify_internal(
    files: &BTreeSet<String>,
    member_types: &[Option<CommitType>],
    labels: &[String],
    rules: &InternalRules,
) -> bool {
    if labels.iter().any(|label| {
        rules
            .labels
            .iter()
            .any(|rule| rule.eq_ignore_ascii_case(label))
    }) {
        return true;
    }

    if !files.is_empty()
        && files
            .iter()
            .all(|path| rules.paths.iter().any(|prefix| path.starts_with(prefix)))
    {
        return true;
    }

    !member_types.is_empty()
        && member_types.iter().all(|ty| {
            ty.is_some_and(|ty| rules.markers.iter().any(|marker| marker == ty.as_str()))
        })
}
