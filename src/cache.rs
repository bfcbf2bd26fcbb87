//! Bullet cache.
//!
//! One JSON file per fingerprint under `.gazette/cache/`. A fingerprint
//! covers everything that shapes a bullet: the unit identity, its
//! selected evidence, the provider, and the prompt revision. Any drift
//! in those inputs lands on a different file, so stale entries are
//! never served and never need eviction.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::CacheError;
use crate::unit::{ChangeUnit, EvidenceSet};

pub const CACHE_DIR: &str = ".gazette/cache";

/// A cached map result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub bullet_text: String,
    pub provider_id: String,
    pub created_at: DateTime<Utc>,
}

/// Field order fixes the canonical encoding; do not reorder.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    unit_id: &'a str,
    title: &'a str,
    commit_shas: &'a [String],
    evidence: &'a EvidenceSet,
    provider_id: &'a str,
    prompt_version: &'a str,
}

/// SHA-256 over the canonical JSON encoding of the summarization
/// inputs.
pub fn fingerprint(
    unit: &ChangeUnit,
    evidence: &EvidenceSet,
    provider_id: &str,
    prompt_version: &str,
) -> String {
    let input = FingerprintInput {
        unit_id: &unit.id,
        title: &unit.title,
        commit_shas: &unit.commit_shas,
        evidence,
        provider_id,
        prompt_version,
    };
    // Struct serialization cannot fail.
    let encoded = serde_json::to_vec(&input).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    hex::encode(hasher.finalize())
}

/// File-per-entry store rooted in the repository.
#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Open (creating if needed) the cache under `repo_root`.
    pub fn open(repo_root: &Path) -> Result<Self, CacheError> {
        let dir = repo_root.join(CACHE_DIR);
        fs::create_dir_all(&dir).map_err(|source| CacheError::CreateDir {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        self.dir.join(format!("{fingerprint}.json"))
    }

    /// Look up a fingerprint. Unreadable or corrupt entries are logged
    /// and reported as misses.
    pub fn get(&self, fingerprint: &str) -> Option<CacheEntry> {
        let path = self.entry_path(fingerprint);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(fingerprint, "Cache read failed, treating as miss: {e}");
                return None;
            }
        };
        match serde_json::from_str::<CacheEntry>(&raw) {
            Ok(entry) => {
                debug!(fingerprint, "Cache hit");
                Some(entry)
            }
            Err(e) => {
                warn!(fingerprint, "Corrupt cache entry, treating as miss: {e}");
                None
            }
        }
    }

    /// Store an entry. Writes go through a temp file in the cache
    /// directory so a crash never leaves a partial entry; an existing
    /// entry wins, which makes concurrent writers idempotent.
    pub fn put(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        let path = self.entry_path(&entry.fingerprint);
        if path.exists() {
            return Ok(());
        }

        let write_failed = |source: std::io::Error| CacheError::WriteFailed {
            fingerprint: entry.fingerprint.clone(),
            source,
        };

        let encoded = serde_json::to_vec_pretty(entry).map_err(|e| CacheError::WriteFailed {
            fingerprint: entry.fingerprint.clone(),
            source: std::io::Error::other(e),
        })?;

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(write_failed)?;
        std::io::Write::write_all(&mut tmp, &encoded).map_err(write_failed)?;
        tmp.persist(&path).map_err(|e| write_failed(e.error))?;
        debug!(fingerprint = %entry.fingerprint, "Cache entry written");
        Ok(())
    }
}
