//! Error types for gazette modules using thiserror.

use thiserror::Error;

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Failed to open repository: {0}")]
    OpenRepository(#[source] git2::Error),

    #[error("Failed to find reference '{0}': {1}")]
    ReferenceNotFound(String, #[source] git2::Error),

    #[error("Failed to parse commit: {0}")]
    ParseCommit(#[source] git2::Error),

    #[error("Failed to walk commit history: {0}")]
    RevwalkError(#[source] git2::Error),

    #[error("Failed to collect diff for {sha}: {source}")]
    DiffFailed {
        sha: String,
        #[source]
        source: git2::Error,
    },

    #[error("Commit {hash} has invalid timestamp (seconds={seconds})")]
    InvalidTimestamp { hash: String, seconds: i64 },

    #[error("Repository has no commits on the current branch")]
    EmptyRepository,
}

/// Errors from resolving the commit range to summarize.
#[derive(Error, Debug)]
pub enum RangeError {
    #[error(
        "Conflicting range options ({0}). --tag, --from-sha/--to-sha, --since-date/--until-date, and --window are mutually exclusive"
    )]
    ConflictingSpec(String),

    #[error("Invalid range: '{reference}' does not resolve to a commit: {source}")]
    UnknownReference {
        reference: String,
        #[source]
        source: git2::Error,
    },

    #[error("Invalid range: {from} is not an ancestor of {to}")]
    NotAncestor { from: String, to: String },

    #[error("Tag '{0}' not found")]
    TagNotFound(String),

    #[error("Invalid date '{0}': expected YYYY-MM-DD")]
    InvalidDate(String),

    #[error("--since-date must be earlier than --until-date")]
    SinceAfterUntil,

    #[error("Invalid window '{0}': expected a number followed by d, h, or w (e.g. 7d)")]
    InvalidWindow(String),

    #[error(transparent)]
    Git(#[from] GitError),
}

/// Errors from GitHub API operations.
#[derive(Error, Debug)]
pub enum GitHubError {
    #[error(
        "GitHub authentication failed: no valid auth found. Run 'gh auth login' or set GITHUB_TOKEN environment variable"
    )]
    AuthenticationFailed,

    #[error("Failed to fetch PRs: {0}")]
    FetchPRs(#[source] Box<octocrab::Error>),

    #[error("Rate limited by GitHub API. Resets at: {reset_time}")]
    RateLimited { reset_time: String },

    #[error("Repository not found: {owner}/{repo}")]
    RepositoryNotFound { owner: String, repo: String },

    #[error("Failed to parse repository URL")]
    InvalidRepositoryUrl,
}

/// Errors from loading the config file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    ParseFailed {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Config file not found at '{0}'")]
    NotFound(String),
}

/// Errors from the bullet cache. Never fatal to a run: callers log and
/// degrade to a cache miss.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to create cache directory '{path}': {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read cache entry {fingerprint}: {source}")]
    ReadFailed {
        fingerprint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache entry {fingerprint} is not valid JSON: {source}")]
    Corrupt {
        fingerprint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write cache entry {fingerprint}: {source}")]
    WriteFailed {
        fingerprint: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from summary providers.
///
/// Split into transient failures (worth retrying) and fatal ones
/// (short-circuit straight to the heuristic fallback).
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("No API key for provider '{provider}': set {env_var} or configure providers.{provider}.api_key")]
    MissingCredentials {
        provider: &'static str,
        env_var: &'static str,
    },

    #[error("Provider '{provider}' request failed: {source}")]
    Request {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Provider '{provider}' returned HTTP {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("Provider '{provider}' timed out after {seconds} seconds")]
    Timeout {
        provider: &'static str,
        seconds: u64,
    },

    #[error("Provider '{provider}' returned an unusable response: {detail}")]
    InvalidResponse {
        provider: &'static str,
        detail: String,
    },
}

impl ProviderError {
    /// Whether a retry could plausibly succeed. Missing credentials and
    /// client-side HTTP errors (other than 408/429) cannot.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::MissingCredentials { .. } => false,
            ProviderError::Request { .. } => true,
            ProviderError::Api { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            ProviderError::Timeout { .. } => true,
            ProviderError::InvalidResponse { .. } => true,
        }
    }

    /// Which provider produced this error.
    pub fn provider(&self) -> &'static str {
        match self {
            ProviderError::MissingCredentials { provider, .. }
            | ProviderError::Request { provider, .. }
            | ProviderError::Api { provider, .. }
            | ProviderError::Timeout { provider, .. }
            | ProviderError::InvalidResponse { provider, .. } => provider,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let rate_limited = ProviderError::Api {
            provider: "openai",
            status: 429,
            body: "slow down".to_string(),
        };
        assert!(rate_limited.is_transient());

        let server_error = ProviderError::Api {
            provider: "openai",
            status: 503,
            body: "unavailable".to_string(),
        };
        assert!(server_error.is_transient());

        let unauthorized = ProviderError::Api {
            provider: "cerebras",
            status: 401,
            body: "bad key".to_string(),
        };
        assert!(!unauthorized.is_transient());

        let no_key = ProviderError::MissingCredentials {
            provider: "openai",
            env_var: "OPENAI_API_KEY",
        };
        assert!(!no_key.is_transient());

        let timeout = ProviderError::Timeout {
            provider: "openai",
            seconds: 30,
        };
        assert!(timeout.is_transient());
    }

    #[test]
    fn test_conflicting_spec_message_names_flags() {
        let err = RangeError::ConflictingSpec("--tag, --window".to_string());
        let msg = err.to_string();
        assert!(msg.contains("mutually exclusive"));
        assert!(msg.contains("--tag, --window"));
    }
}
