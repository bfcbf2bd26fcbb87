//! Commit range resolution.
//!
//! Turns user intent (a tag, a SHA pair, a date window, a duration
//! window, or nothing at all) into a concrete `from..to` commit range.
//! Modes are mutually exclusive and checked before any repository work.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use git2::{Oid, Repository};
use tracing::{debug, warn};

use crate::error::{GitError, RangeError};

use super::tags::{find_previous_tag, find_tag_by_name, get_latest_reachable_tag};

/// Range intent as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct RangeRequest {
    pub tag: Option<String>,
    pub from_sha: Option<String>,
    pub to_sha: Option<String>,
    pub since_date: Option<String>,
    pub until_date: Option<String>,
    pub window: Option<String>,
}

/// Resolved commit range with start and end OIDs.
#[derive(Debug, Clone)]
pub struct ResolvedRange {
    pub from: Oid,
    pub to: Oid,
    pub from_ref: String,
    pub to_ref: String,
    pub from_tag: Option<String>,
    pub to_tag: Option<String>,
    /// Include `from` itself when walking. Set for whole-history ranges
    /// and date lower bounds, where `from` is the oldest in-range commit
    /// rather than an exclusive boundary.
    pub from_inclusive: bool,
}

impl ResolvedRange {
    pub fn is_empty(&self) -> bool {
        self.from == self.to && !self.from_inclusive
    }

    /// Human-readable form for progress output, e.g. `v1.1.0..v1.2.0`.
    pub fn describe(&self) -> String {
        format!("{}..{}", self.from_ref, self.to_ref)
    }
}

/// Resolve a commit range from user intent, using the current time for
/// date and window arithmetic.
pub fn resolve_range(
    repo: &Repository,
    request: &RangeRequest,
    fallback_window_days: u32,
) -> Result<ResolvedRange, RangeError> {
    resolve_range_at(repo, request, fallback_window_days, Utc::now())
}

/// [`resolve_range`] with an injectable clock.
pub fn resolve_range_at(
    repo: &Repository,
    request: &RangeRequest,
    fallback_window_days: u32,
    now: DateTime<Utc>,
) -> Result<ResolvedRange, RangeError> {
    let modes = selected_modes(request);
    if modes.len() > 1 {
        return Err(RangeError::ConflictingSpec(modes.join(", ")));
    }

    match modes.first().copied() {
        Some("--tag") => resolve_tag_mode(repo, request.tag.as_deref().unwrap_or_default()),
        Some("--from-sha/--to-sha") => {
            let Some(from) = request.from_sha.as_deref() else {
                return Err(RangeError::ConflictingSpec(
                    "--to-sha requires --from-sha".to_string(),
                ));
            };
            resolve_sha_mode(repo, from, request.to_sha.as_deref())
        }
        Some("--since-date/--until-date") => resolve_date_mode(
            repo,
            request.since_date.as_deref(),
            request.until_date.as_deref(),
            fallback_window_days,
            now,
        ),
        Some("--window") => {
            let spec = request.window.as_deref().unwrap_or_default();
            resolve_window_mode(repo, spec, parse_window(spec)?, now)
        }
        _ => resolve_default(repo, fallback_window_days, now),
    }
}

fn selected_modes(request: &RangeRequest) -> Vec<&'static str> {
    let mut modes = Vec::new();
    if request.tag.is_some() {
        modes.push("--tag");
    }
    if request.from_sha.is_some() || request.to_sha.is_some() {
        modes.push("--from-sha/--to-sha");
    }
    if request.since_date.is_some() || request.until_date.is_some() {
        modes.push("--since-date/--until-date");
    }
    if request.window.is_some() {
        modes.push("--window");
    }
    modes
}

/// Tag mode: summarize the release that `tag_name` points at, back to
/// the previous tag (or the root commit for a first release).
fn resolve_tag_mode(repo: &Repository, tag_name: &str) -> Result<ResolvedRange, RangeError> {
    let tag = find_tag_by_name(repo, tag_name)?
        .ok_or_else(|| RangeError::TagNotFound(tag_name.to_string()))?;

    match find_previous_tag(repo, tag.oid, tag_name)? {
        Some(previous) => Ok(ResolvedRange {
            from: previous.oid,
            to: tag.oid,
            from_ref: previous.name.clone(),
            to_ref: tag_name.to_string(),
            from_tag: Some(previous.name),
            to_tag: Some(tag_name.to_string()),
            from_inclusive: false,
        }),
        None => {
            // First release: the whole history up to the tag.
            let root = find_root_commit(repo, tag.oid)?;
            Ok(ResolvedRange {
                from: root,
                to: tag.oid,
                from_ref: "root".to_string(),
                to_ref: tag_name.to_string(),
                from_tag: None,
                to_tag: Some(tag_name.to_string()),
                from_inclusive: true,
            })
        }
    }
}

fn resolve_sha_mode(
    repo: &Repository,
    from_str: &str,
    to_str: Option<&str>,
) -> Result<ResolvedRange, RangeError> {
    let from = resolve_reference(repo, from_str)?;
    let (to, to_ref) = match to_str {
        Some(s) => (resolve_reference(repo, s)?, s.to_string()),
        None => (head_oid(repo)?, "HEAD".to_string()),
    };

    if from != to
        && !repo
            .graph_descendant_of(to, from)
            .map_err(GitError::RevwalkError)?
    {
        return Err(RangeError::NotAncestor {
            from: from_str.to_string(),
            to: to_ref,
        });
    }

    Ok(ResolvedRange {
        from,
        to,
        from_ref: from_str.to_string(),
        to_ref,
        from_tag: None,
        to_tag: None,
        from_inclusive: false,
    })
}

/// Date mode: the newest first-parent commit at or before the end of
/// `until` becomes `to`; the oldest at or after the start of `since`
/// becomes `from` (inclusive).
fn resolve_date_mode(
    repo: &Repository,
    since: Option<&str>,
    until: Option<&str>,
    fallback_window_days: u32,
    now: DateTime<Utc>,
) -> Result<ResolvedRange, RangeError> {
    let since_time = match since {
        Some(s) => parse_date(s)?
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default()
            .and_utc(),
        None => now - Duration::days(i64::from(fallback_window_days)),
    };
    let until_time = match until {
        Some(s) => parse_date(s)?
            .and_hms_opt(23, 59, 59)
            .unwrap_or_default()
            .and_utc(),
        None => now,
    };

    if since_time >= until_time {
        return Err(RangeError::SinceAfterUntil);
    }

    let head = head_oid(repo)?;
    let from_ref = since.map(str::to_string).unwrap_or_else(|| {
        format!("{}", since_time.format("%Y-%m-%d"))
    });
    let to_ref = until.unwrap_or("HEAD").to_string();

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(head).map_err(GitError::RevwalkError)?;
    revwalk.simplify_first_parent().map_err(GitError::RevwalkError)?;

    let mut to_commit: Option<Oid> = None;
    let mut from_commit: Option<Oid> = None;

    for oid in revwalk {
        let oid = oid.map_err(GitError::RevwalkError)?;
        let time = commit_time(repo, oid)?;

        if time > until_time.timestamp() {
            continue;
        }
        if to_commit.is_none() {
            to_commit = Some(oid);
        }
        if time < since_time.timestamp() {
            break;
        }
        from_commit = Some(oid);
    }

    match (from_commit, to_commit) {
        (Some(from), Some(to)) => Ok(ResolvedRange {
            from,
            to,
            from_ref,
            to_ref,
            from_tag: None,
            to_tag: None,
            from_inclusive: true,
        }),
        _ => {
            debug!("No first-parent commits inside the requested dates");
            Ok(empty_range(head, from_ref, to_ref))
        }
    }
}

/// Window mode: everything newer than `now - window`, up to HEAD.
fn resolve_window_mode(
    repo: &Repository,
    spec: &str,
    window: Duration,
    now: DateTime<Utc>,
) -> Result<ResolvedRange, RangeError> {
    let cutoff = (now - window).timestamp();
    let head = head_oid(repo)?;
    let from_ref = format!("HEAD@{{{spec}}}");

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(head).map_err(GitError::RevwalkError)?;
    revwalk.simplify_first_parent().map_err(GitError::RevwalkError)?;

    let mut last = head;
    for oid in revwalk {
        let oid = oid.map_err(GitError::RevwalkError)?;
        if commit_time(repo, oid)? < cutoff {
            // Newest commit older than the cutoff: exclusive boundary.
            return Ok(ResolvedRange {
                from: oid,
                to: head,
                from_ref,
                to_ref: "HEAD".to_string(),
                from_tag: None,
                to_tag: None,
                from_inclusive: false,
            });
        }
        last = oid;
    }

    // The window predates the root commit: whole history.
    Ok(ResolvedRange {
        from: last,
        to: head,
        from_ref: "root".to_string(),
        to_ref: "HEAD".to_string(),
        from_tag: None,
        to_tag: None,
        from_inclusive: true,
    })
}

/// Default: the latest release (previous tag up to the most recent
/// reachable tag), or the fallback window when the repository has no
/// tags at all.
fn resolve_default(
    repo: &Repository,
    fallback_window_days: u32,
    now: DateTime<Utc>,
) -> Result<ResolvedRange, RangeError> {
    if let Some(latest) = get_latest_reachable_tag(repo)? {
        debug!(tag = %latest.name, "No range flags; summarizing the latest release");
        return resolve_tag_mode(repo, &latest.name);
    }

    let spec = format!("{fallback_window_days}d");
    debug!(window = %spec, "No tags in repository; falling back to a time window");
    let window = Duration::days(i64::from(fallback_window_days));
    resolve_window_mode(repo, &spec, window, now)
}

fn empty_range(at: Oid, from_ref: String, to_ref: String) -> ResolvedRange {
    ResolvedRange {
        from: at,
        to: at,
        from_ref,
        to_ref,
        from_tag: None,
        to_tag: None,
        from_inclusive: false,
    }
}

/// Resolve a reference (tag, branch, commit hash) to an OID.
fn resolve_reference(repo: &Repository, reference: &str) -> Result<Oid, RangeError> {
    // Try as a direct OID first
    if let Ok(oid) = Oid::from_str(reference)
        && repo.find_commit(oid).is_ok()
    {
        return Ok(oid);
    }

    // Try as a reference (branch, tag, abbreviated hash)
    match repo.revparse_single(reference) {
        Ok(obj) => Ok(obj
            .peel_to_commit()
            .map_err(GitError::ParseCommit)?
            .id()),
        Err(source) => Err(RangeError::UnknownReference {
            reference: reference.to_string(),
            source,
        }),
    }
}

fn head_oid(repo: &Repository) -> Result<Oid, RangeError> {
    let head = repo
        .head()
        .map_err(|_| GitError::EmptyRepository)?;
    head.target().ok_or_else(|| GitError::EmptyRepository.into())
}

/// Find the root commit of the history leading to `start`.
fn find_root_commit(repo: &Repository, start: Oid) -> Result<Oid, GitError> {
    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(start).map_err(GitError::RevwalkError)?;

    let mut root_oid = start;
    for oid_result in revwalk {
        match oid_result {
            Ok(oid) => root_oid = oid,
            Err(e) => {
                warn!(
                    "Error during revwalk traversal: {}. Continuing with last valid commit.",
                    e
                );
            }
        }
    }

    Ok(root_oid)
}

fn commit_time(repo: &Repository, oid: Oid) -> Result<i64, GitError> {
    Ok(repo
        .find_commit(oid)
        .map_err(GitError::ParseCommit)?
        .time()
        .seconds())
}

/// Parse a window spec such as `7d`, `24h` or `2w`.
pub fn parse_window(spec: &str) -> Result<Duration, RangeError> {
    let re = regex_lite::Regex::new(r"^(\d+)([dhw])$").unwrap();
    let caps = re
        .captures(spec.trim())
        .ok_or_else(|| RangeError::InvalidWindow(spec.to_string()))?;

    let count: i64 = caps[1]
        .parse()
        .map_err(|_| RangeError::InvalidWindow(spec.to_string()))?;

    let duration = match &caps[2] {
        "d" => Duration::try_days(count),
        "h" => Duration::try_hours(count),
        "w" => Duration::try_weeks(count),
        _ => None,
    };
    duration.ok_or_else(|| RangeError::InvalidWindow(spec.to_string()))
}

fn parse_date(s: &str) -> Result<NaiveDate, RangeError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|_| RangeError::InvalidDate(s.to_string()))
}
