//! Merged-PR metadata via octocrab.
//!
//! The extractor only needs enough to associate commits with the PR
//! that landed them: number, title, labels, author, and crucially the
//! merge commit SHA. Fetch failures degrade to commit-only grouping.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use octocrab::Octocrab;
use tracing::warn;

use crate::error::GitHubError;

/// Merged pull request metadata.
#[derive(Debug, Clone)]
pub struct PullRequest {
    pub number: u64,
    pub title: String,
    pub body: Option<String>,
    pub author: Option<String>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merge_commit_sha: Option<String>,
    pub labels: Vec<String>,
}

/// Maximum PR body length kept for issue-reference scanning.
const MAX_BODY_LENGTH: usize = 10 * 1024;

/// Pagination safety limit.
const MAX_PAGES: u32 = 50;

/// Fetch merged PRs from a GitHub repository.
///
/// Builds its own octocrab client; without a token the calls go out
/// anonymously, subject to the lower rate limit.
pub async fn fetch_merged_prs(
    token: Option<&str>,
    owner: &str,
    repo: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<PullRequest>, GitHubError> {
    let mut builder = Octocrab::builder();
    if let Some(token) = token {
        builder = builder.personal_token(token.to_string());
    }
    let octocrab = builder
        .build()
        .map_err(|e| GitHubError::FetchPRs(Box::new(e)))?;

    fetch_merged_prs_with_client(&octocrab, owner, repo, since).await
}

/// Fetch merged PRs using a pre-configured octocrab client.
///
/// The client decides which server the calls hit, which is also the
/// testing seam.
pub async fn fetch_merged_prs_with_client(
    octocrab: &Octocrab,
    owner: &str,
    repo: &str,
    since: Option<DateTime<Utc>>,
) -> Result<Vec<PullRequest>, GitHubError> {
    let mut all_prs = Vec::new();
    let mut page = 1u32;

    loop {
        let result = octocrab
            .pulls(owner, repo)
            .list()
            .state(octocrab::params::State::Closed)
            .sort(octocrab::params::pulls::Sort::Updated)
            .direction(octocrab::params::Direction::Descending)
            .per_page(100)
            .page(page)
            .send()
            .await;

        let prs_page = match result {
            Ok(page) => page,
            Err(e) => {
                // octocrab surfaces GitHub failures in several shapes;
                // classify on the rendered text.
                let err_display = e.to_string();
                let err_debug = format!("{:?}", e);
                let err_lower = err_display.to_lowercase();
                let debug_lower = err_debug.to_lowercase();

                if err_lower.contains("rate limit") || debug_lower.contains("rate limit") {
                    return Err(GitHubError::RateLimited {
                        reset_time: "unknown".to_string(),
                    });
                }
                if err_display.contains("Not Found") || err_debug.contains("Not Found") {
                    return Err(GitHubError::RepositoryNotFound {
                        owner: owner.to_string(),
                        repo: repo.to_string(),
                    });
                }
                return Err(GitHubError::FetchPRs(Box::new(e)));
            }
        };

        let items = prs_page.items;
        if items.is_empty() {
            break;
        }

        for pr in items {
            // Only include merged PRs
            let merged_at = match pr.merged_at {
                Some(merged) => merged,
                None => continue,
            };

            if let Some(since_date) = since
                && merged_at < since_date
            {
                continue;
            }

            let body = pr.body.map(|b| truncate_at_boundary(&b, MAX_BODY_LENGTH));
            let labels = pr
                .labels
                .unwrap_or_default()
                .into_iter()
                .map(|l| l.name)
                .collect();

            all_prs.push(PullRequest {
                number: pr.number,
                title: pr.title.unwrap_or_default(),
                body,
                author: pr.user.map(|u| u.login),
                merged_at: Some(merged_at),
                merge_commit_sha: pr.merge_commit_sha,
                labels,
            });
        }

        if prs_page.next.is_none() {
            break;
        }

        page += 1;

        if page > MAX_PAGES {
            warn!(
                "Reached {}-page safety limit while fetching PRs for {}/{}",
                MAX_PAGES, owner, repo
            );
            break;
        }
    }

    Ok(all_prs)
}

/// Extract `#123`-style issue references from free text.
pub fn issue_refs(text: &str) -> BTreeSet<u64> {
    let re = regex_lite::Regex::new(r"#(\d+)").unwrap();
    re.captures_iter(text)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Extract owner and repo from a git remote URL.
pub fn parse_github_remote(url: &str) -> Result<(String, String), GitHubError> {
    // Handle SSH format: git@github.com:owner/repo.git
    if url.starts_with("git@github.com:") {
        let path = url
            .strip_prefix("git@github.com:")
            .ok_or(GitHubError::InvalidRepositoryUrl)?;
        return parse_owner_repo_path(path);
    }

    // Handle HTTPS format: https://github.com/owner/repo.git
    if url.contains("github.com/") {
        let path = url
            .split("github.com/")
            .nth(1)
            .ok_or(GitHubError::InvalidRepositoryUrl)?;
        return parse_owner_repo_path(path);
    }

    Err(GitHubError::InvalidRepositoryUrl)
}

/// Read the origin remote of a local repository as (owner, repo).
pub fn detect_remote(repo: &git2::Repository) -> Result<(String, String), GitHubError> {
    let remote = repo
        .find_remote("origin")
        .map_err(|_| GitHubError::InvalidRepositoryUrl)?;
    let url = remote.url().ok_or(GitHubError::InvalidRepositoryUrl)?;
    parse_github_remote(url)
}

fn parse_owner_repo_path(path: &str) -> Result<(String, String), GitHubError> {
    let path = path.strip_suffix(".git").unwrap_or(path);
    let parts: Vec<&str> = path.split('/').collect();

    if parts.len() >= 2 {
        Ok((parts[0].to_string(), parts[1].to_string()))
    } else {
        Err(GitHubError::InvalidRepositoryUrl)
    }
}

fn truncate_at_boundary(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut idx = max;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    format!("{}... [truncated]", &s[..idx])
}
