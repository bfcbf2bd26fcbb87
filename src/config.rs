//! Configuration for gazette, loaded from `gazette.config.yml` at the
//! repository root.
//!
//! Every field is optional; a missing file yields defaults, so the tool
//! works out of the box in any repository. Tunables the pipeline treats
//! as policy (evidence budget, category weights, dedup threshold, section
//! caps) live here rather than in code.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Candidate config file names, tried in order at the repository root.
const CONFIG_FILE_NAMES: [&str; 2] = ["gazette.config.yml", "gazette.config.yaml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Label used for the summary heading when no per-tag label matches
    /// and no `--label` flag is given.
    pub default_label: Option<String>,

    /// Per-tag label overrides, e.g. `v1.2.0: "Spring cleanup"`.
    pub labels: BTreeMap<String, String>,

    /// Window applied when no range flags are given and the repository
    /// has no tags, and as the default `--since-date` lower bound.
    pub fallback_window_days: u32,

    /// Keep internal bullets in the final summary.
    pub include_internal: bool,

    pub internal: InternalRules,
    pub evidence: EvidenceConfig,
    pub map: MapConfig,
    pub reduce: ReduceConfig,
    pub providers: ProvidersConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_label: None,
            labels: BTreeMap::new(),
            fallback_window_days: 7,
            include_internal: false,
            internal: InternalRules::default(),
            evidence: EvidenceConfig::default(),
            map: MapConfig::default(),
            reduce: ReduceConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Rules that classify a whole change unit as internal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InternalRules {
    /// Path prefixes. A unit touching only these paths is internal.
    pub paths: Vec<String>,
    /// Conventional-commit types. A unit whose every commit carries one
    /// of these is internal.
    pub markers: Vec<String>,
    /// PR labels that mark the whole unit internal.
    pub labels: Vec<String>,
}

impl Default for InternalRules {
    fn default() -> Self {
        Self {
            paths: vec![
                "tests/".to_string(),
                "test/".to_string(),
                ".github/".to_string(),
                "ci/".to_string(),
                "scripts/".to_string(),
                "benches/".to_string(),
            ],
            markers: vec![
                "chore".to_string(),
                "ci".to_string(),
                "build".to_string(),
                "test".to_string(),
                "style".to_string(),
                "refactor".to_string(),
            ],
            labels: vec![
                "internal".to_string(),
                "chore".to_string(),
                "skip-changelog".to_string(),
            ],
        }
    }
}

/// Diff evidence selection limits and scoring weights.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Byte budget for one unit's evidence.
    pub max_bytes: usize,
    /// Hunk count cap per unit.
    pub max_hunks_per_unit: usize,
    pub category_weights: CategoryWeights,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_bytes: 4000,
            max_hunks_per_unit: 2,
            category_weights: CategoryWeights::default(),
        }
    }
}

/// Score contribution of each path category during hunk ranking.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CategoryWeights {
    pub api: f64,
    pub cli: f64,
    pub ui: f64,
    pub docs: f64,
    pub internal: f64,
    pub other: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            api: 1.0,
            cli: 1.0,
            ui: 0.5,
            docs: 0.5,
            internal: 0.0,
            other: 0.25,
        }
    }
}

/// Map-phase execution limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Concurrent provider calls.
    pub concurrency: usize,
    /// Deadline per provider call.
    pub timeout_secs: u64,
    /// Total attempts per unit (first call plus retries).
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

/// Reduce-phase aggregation policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// Maximum bullets per section.
    pub section_cap: usize,
    /// Token-set similarity at or above which two bullets in a section
    /// are considered duplicates.
    pub dedup_threshold: f64,
    /// Priority by conventional-commit type, used when a section
    /// overflows its cap.
    pub type_weights: BTreeMap<String, u32>,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        let mut type_weights = BTreeMap::new();
        for (kind, weight) in [
            ("feat", 50),
            ("fix", 40),
            ("perf", 30),
            ("docs", 20),
            ("refactor", 15),
            ("build", 10),
            ("ci", 10),
            ("test", 10),
            ("style", 10),
            ("chore", 5),
        ] {
            type_weights.insert(kind.to_string(), weight);
        }
        Self {
            section_cap: 5,
            dedup_threshold: 0.8,
            type_weights,
        }
    }
}

/// Remote provider selection and per-provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Providers to try, in order. The first with credentials wins;
    /// none configured means the heuristic summarizer runs.
    pub prefer: Vec<String>,
    pub openai: RemoteProviderConfig,
    pub cerebras: RemoteProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            prefer: vec!["openai".to_string(), "cerebras".to_string()],
            openai: RemoteProviderConfig::default(),
            cerebras: RemoteProviderConfig::default(),
        }
    }
}

/// Settings for one OpenAI-compatible backend. `None` falls back to the
/// provider's built-in default; the API key is normally taken from the
/// environment instead.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteProviderConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    /// Load configuration for a repository.
    ///
    /// An explicit path must exist; otherwise the well-known file names
    /// are tried at the repository root and a missing file yields
    /// defaults.
    pub fn load(repo_root: &Path, explicit: Option<&Path>) -> Result<Config, ConfigError> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.display().to_string()));
                }
                path.to_path_buf()
            }
            None => match Self::discover(repo_root) {
                Some(path) => path,
                None => return Ok(Config::default()),
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;

        serde_yaml::from_str(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    fn discover(repo_root: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| repo_root.join(name))
            .find(|candidate| candidate.exists())
    }

    /// Label for the summary heading: per-tag override first, then the
    /// default label. An explicit `--label` flag is applied by the caller
    /// before this is consulted.
    pub fn label_for_tag(&self, tag: Option<&str>) -> Option<String> {
        if let Some(tag) = tag
            && let Some(label) = self.labels.get(tag)
        {
            return Some(label.clone());
        }
        self.default_label.clone()
    }
}
