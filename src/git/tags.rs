//! Tag enumeration and boundary-tag lookup.

use std::collections::HashMap;

use git2::{Oid, Repository};
use semver::Version;
use tracing::{debug, warn};

use crate::error::GitError;

/// A git tag with optional semver version.
#[derive(Debug, Clone)]
pub struct TagInfo {
    pub name: String,
    pub oid: Oid,
    pub version: Option<Version>,
}

/// Get all tags from the repository, resolved to their target commits.
pub fn get_all_tags(repo: &Repository) -> Result<Vec<TagInfo>, GitError> {
    let mut tags = Vec::new();

    repo.tag_foreach(|oid, name_bytes| {
        if let Ok(name_str) = std::str::from_utf8(name_bytes) {
            // Remove refs/tags/ prefix
            let name = name_str
                .strip_prefix("refs/tags/")
                .unwrap_or(name_str)
                .to_string();

            let version = get_version_from_tag(&name);

            // Resolve tag to commit (handle annotated tags)
            let resolved_oid = match repo.find_tag(oid) {
                Ok(tag_obj) => tag_obj.target_id(),
                Err(e) => {
                    debug!(
                        tag = %name,
                        error = %e,
                        "Could not resolve annotated tag, using raw OID. \
                         This is normal for lightweight tags."
                    );
                    oid
                }
            };

            tags.push(TagInfo {
                name,
                oid: resolved_oid,
                version,
            });
        } else {
            warn!("Skipping tag with OID {} - name is not valid UTF-8", oid);
        }
        true // Continue iteration
    })
    .map_err(GitError::RevwalkError)?;

    Ok(tags)
}

/// Find a tag by exact name.
pub fn find_tag_by_name(repo: &Repository, name: &str) -> Result<Option<TagInfo>, GitError> {
    Ok(get_all_tags(repo)?.into_iter().find(|tag| tag.name == name))
}

/// Get the most recent tag reachable from HEAD.
///
/// Walks commits reachable from `HEAD` in topological/time order and
/// returns the first tagged commit. Any tag name counts; summaries are
/// not limited to semver release schemes.
pub fn get_latest_reachable_tag(repo: &Repository) -> Result<Option<TagInfo>, GitError> {
    let head_oid = match repo.head().ok().and_then(|head| head.target()) {
        Some(oid) => oid,
        None => return Ok(None),
    };

    let tags_by_commit = tags_by_commit(repo)?;
    if tags_by_commit.is_empty() {
        debug!("No tags found in repository");
        return Ok(None);
    }

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(head_oid).map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
        .map_err(GitError::RevwalkError)?;

    for oid in revwalk {
        let oid = oid.map_err(GitError::RevwalkError)?;
        if let Some(candidates) = tags_by_commit.get(&oid)
            && let Some(tag) = best_tag(candidates)
        {
            debug!(tag = %tag.name, "Found latest reachable tag");
            return Ok(Some(tag));
        }
    }

    Ok(None)
}

/// Find the most recent ancestor tag of `to`, excluding `exclude`.
///
/// The walk includes `to` itself, so a second tag on the same commit
/// yields an empty range rather than reaching further back.
pub fn find_previous_tag(
    repo: &Repository,
    to: Oid,
    exclude: &str,
) -> Result<Option<TagInfo>, GitError> {
    let mut tags_by_commit = tags_by_commit(repo)?;
    for candidates in tags_by_commit.values_mut() {
        candidates.retain(|tag| tag.name != exclude);
    }

    let mut revwalk = repo.revwalk().map_err(GitError::RevwalkError)?;
    revwalk.push(to).map_err(GitError::RevwalkError)?;
    revwalk
        .set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::TIME)
        .map_err(GitError::RevwalkError)?;

    for oid in revwalk {
        let oid = oid.map_err(GitError::RevwalkError)?;
        if let Some(candidates) = tags_by_commit.get(&oid)
            && let Some(tag) = best_tag(candidates)
        {
            debug!(tag = %tag.name, "Found previous boundary tag");
            return Ok(Some(tag));
        }
    }

    Ok(None)
}

fn tags_by_commit(repo: &Repository) -> Result<HashMap<Oid, Vec<TagInfo>>, GitError> {
    let mut by_commit: HashMap<Oid, Vec<TagInfo>> = HashMap::new();
    for tag in get_all_tags(repo)? {
        by_commit.entry(tag.oid).or_default().push(tag);
    }
    Ok(by_commit)
}

/// Pick one tag when several point at the same commit: highest semver
/// first, then lexicographically last.
fn best_tag(candidates: &[TagInfo]) -> Option<TagInfo> {
    candidates
        .iter()
        .max_by(|a, b| a.version.cmp(&b.version).then_with(|| a.name.cmp(&b.name)))
        .cloned()
}

/// Extract semver version from a tag name.
/// Handles both "v1.2.3" and "1.2.3" formats.
pub fn get_version_from_tag(tag_name: &str) -> Option<Version> {
    let version_str = tag_name.strip_prefix('v').unwrap_or(tag_name);
    Version::parse(version_str).ok()
}
