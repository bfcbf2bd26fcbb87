//! GitHub authentication detection.
//!
//! Sources, in order: the gh CLI, then GITHUB_TOKEN, then GH_TOKEN.
//! A token is optional; without one PR metadata is fetched anonymously
//! (subject to rate limits) or skipped entirely.

use std::env;
use std::process::Command;

use crate::error::GitHubError;

/// Get a GitHub token.
///
/// Checks in order:
/// 1. gh CLI auth (via `gh auth token`)
/// 2. GITHUB_TOKEN environment variable
/// 3. GH_TOKEN environment variable
pub fn get_github_token() -> Result<String, GitHubError> {
    if let Some(token) = get_token_from_gh_cli() {
        return Ok(token);
    }

    if let Some((token, _)) = get_token_from_env() {
        return Ok(token);
    }

    Err(GitHubError::AuthenticationFailed)
}

/// Which source would provide a token, for diagnostics output.
pub fn token_source() -> Option<&'static str> {
    if get_token_from_gh_cli().is_some() {
        return Some("gh CLI");
    }
    get_token_from_env().map(|(_, source)| source)
}

/// Try to get a token from the gh CLI.
fn get_token_from_gh_cli() -> Option<String> {
    // First check if gh is authenticated
    let status = Command::new("gh").args(["auth", "status"]).output().ok()?;

    if !status.status.success() {
        return None;
    }

    // Get the actual token
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;

    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }

    None
}

fn get_token_from_env() -> Option<(String, &'static str)> {
    for var in ["GITHUB_TOKEN", "GH_TOKEN"] {
        if let Ok(token) = env::var(var)
            && !token.is_empty()
        {
            return Some((token, var));
        }
    }
    None
}
