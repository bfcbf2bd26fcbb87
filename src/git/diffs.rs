//! Per-commit diff collection using git2.

use std::collections::BTreeMap;

use git2::{DiffFormat, DiffOptions, Oid, Repository, Tree};
use tracing::warn;

use crate::error::GitError;

/// Cap on one file's accumulated patch text. Generated files can produce
/// megabyte diffs; evidence selection never needs more than this.
const MAX_FILE_PATCH_BYTES: usize = 30_000;

/// One changed file within a commit, with its unified patch text.
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    pub additions: usize,
    pub deletions: usize,
    /// Hunk headers plus prefixed content lines, as printed by git.
    pub patch: String,
    pub truncated: bool,
}

/// All file changes introduced by one commit, relative to its first
/// parent (or the empty tree for a root commit).
#[derive(Debug, Clone)]
pub struct CommitDiff {
    pub sha: String,
    pub files: Vec<FileDiff>,
}

impl CommitDiff {
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|file| file.path.as_str())
    }
}

/// Collect the diff a commit introduces.
///
/// Merge commits diff against their first parent, which shows the net
/// change the merge landed on the main line.
pub fn collect_commit_diff(repo: &Repository, oid: Oid) -> Result<CommitDiff, GitError> {
    let sha = oid.to_string();
    let commit = repo.find_commit(oid).map_err(GitError::ParseCommit)?;
    let tree = commit.tree().map_err(|source| GitError::DiffFailed {
        sha: sha.clone(),
        source,
    })?;

    let parent_tree: Option<Tree<'_>> = match commit.parent(0) {
        Ok(parent) => Some(parent.tree().map_err(|source| GitError::DiffFailed {
            sha: sha.clone(),
            source,
        })?),
        Err(_) => None, // root commit
    };

    let mut opts = DiffOptions::new();
    let diff = repo
        .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
        .map_err(|source| GitError::DiffFailed {
            sha: sha.clone(),
            source,
        })?;

    let mut files: BTreeMap<String, FileDiff> = BTreeMap::new();

    let print_result = diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default();
        if path.is_empty() {
            return true;
        }

        let entry = files.entry(path.clone()).or_insert_with(|| FileDiff {
            path,
            additions: 0,
            deletions: 0,
            patch: String::new(),
            truncated: false,
        });

        let origin = line.origin();
        match origin {
            '+' => entry.additions += 1,
            '-' => entry.deletions += 1,
            _ => {}
        }

        // File headers carry no evidence; line counts above still run.
        if origin == 'F' || origin == 'B' {
            return true;
        }

        let content = std::str::from_utf8(line.content()).unwrap_or("");
        if entry.patch.len() + content.len() + 1 > MAX_FILE_PATCH_BYTES {
            entry.truncated = true;
            return true;
        }

        if origin == '+' || origin == '-' || origin == ' ' {
            entry.patch.push(origin);
        }
        entry.patch.push_str(content);

        true
    });

    if let Err(e) = print_result {
        warn!(sha = %sha, "Failed to collect diff text: {e}");
    }

    Ok(CommitDiff {
        sha,
        files: files.into_values().collect(),
    })
}
