//! Concurrent per-unit summarization.
//!
//! Each unit goes fingerprint, cache probe, provider call with retry,
//! heuristic fallback. No unit-level failure aborts the run; every unit
//! always yields a bullet. Results come back in unit order no matter
//! how the calls interleave.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStore, fingerprint};
use crate::config::MapConfig;
use crate::error::ProviderError;
use crate::provider::heuristic::bullet_from_title;
use crate::provider::{Summarizer, UnitContext, call_with_retry};
use crate::summarize::prompt::{PROMPT_VERSION, build_map_prompt};
use crate::summarize::{Bullet, SectionKind};
use crate::unit::{ChangeUnit, PreparedUnit};

/// Map-phase accounting, folded into the final Summary stats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapStats {
    pub units: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    /// Remote summarize invocations, retries included. Zero when the
    /// heuristic is the selected provider.
    pub provider_calls: usize,
    pub fallback_units: usize,
    pub provider_used: String,
}

#[derive(Debug)]
pub struct MapOutcome {
    /// One bullet per unit, in unit order.
    pub bullets: Vec<Bullet>,
    pub stats: MapStats,
    pub warnings: Vec<String>,
}

enum BulletSource {
    Cache,
    Provider,
    Fallback,
    Cancelled,
}

struct UnitOutcome {
    bullet: Bullet,
    source: BulletSource,
    fatal: Option<String>,
}

/// Counts summarize invocations across the concurrent phase.
struct CountingProvider<'a> {
    inner: &'a dyn Summarizer,
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Summarizer for CountingProvider<'_> {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn summarize(&self, ctx: &UnitContext<'_>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.summarize(ctx).await
    }
}

/// Summarize every unit with bounded concurrency.
///
/// `cancel` flips on Ctrl-C: cached results keep flowing but no new
/// provider call starts, and affected units take the heuristic path.
pub async fn run_map(
    units: &[PreparedUnit],
    provider: &dyn Summarizer,
    cache: Option<&CacheStore>,
    config: &MapConfig,
    cancel: &AtomicBool,
) -> MapOutcome {
    let counting = CountingProvider {
        inner: provider,
        calls: AtomicUsize::new(0),
    };
    let is_heuristic = provider.id() == "heuristic";
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));

    let tasks = units.iter().map(|prepared| {
        let semaphore = Arc::clone(&semaphore);
        let counting = &counting;
        async move {
            let _permit = semaphore
                .acquire()
                .await
                .expect("semaphore is never closed");
            summarize_unit(prepared, counting, cache, config, cancel).await
        }
    });
    let results = join_all(tasks).await;

    let mut stats = MapStats {
        units: units.len(),
        provider_used: provider.id().to_string(),
        ..MapStats::default()
    };
    let mut bullets = Vec::with_capacity(results.len());
    let mut warnings = Vec::new();
    let mut first_fatal = None;
    let mut provider_successes = 0usize;
    let mut cancelled_units = 0usize;

    for outcome in results {
        match outcome.source {
            BulletSource::Cache => stats.cache_hits += 1,
            BulletSource::Provider => {
                stats.cache_misses += 1;
                provider_successes += 1;
            }
            BulletSource::Fallback => {
                stats.cache_misses += 1;
                stats.fallback_units += 1;
            }
            BulletSource::Cancelled => {
                stats.cache_misses += 1;
                stats.fallback_units += 1;
                cancelled_units += 1;
            }
        }
        if first_fatal.is_none() {
            first_fatal = outcome.fatal;
        }
        bullets.push(outcome.bullet);
    }
    stats.provider_calls = if is_heuristic {
        0
    } else {
        counting.calls.into_inner()
    };

    if cancelled_units > 0 {
        warnings.push(format!(
            "Interrupted: {cancelled_units} units summarized from titles only"
        ));
    }
    if !is_heuristic
        && provider_successes == 0
        && let Some(error) = first_fatal
    {
        warnings.push(format!(
            "Provider '{}' produced no summaries ({error}); bullets built from titles",
            provider.id()
        ));
    }

    debug!(
        units = stats.units,
        cache_hits = stats.cache_hits,
        provider_calls = stats.provider_calls,
        fallback_units = stats.fallback_units,
        "Map phase complete"
    );

    MapOutcome { bullets, stats, warnings }
}

async fn summarize_unit(
    prepared: &PreparedUnit,
    provider: &dyn Summarizer,
    cache: Option<&CacheStore>,
    config: &MapConfig,
    cancel: &AtomicBool,
) -> UnitOutcome {
    let fp = fingerprint(&prepared.unit, &prepared.evidence, provider.id(), PROMPT_VERSION);

    if let Some(store) = cache
        && let Some(entry) = store.get(&fp)
    {
        return UnitOutcome {
            bullet: make_bullet(&prepared.unit, entry.bullet_text),
            source: BulletSource::Cache,
            fatal: None,
        };
    }

    if cancel.load(Ordering::SeqCst) {
        return UnitOutcome {
            bullet: make_bullet(&prepared.unit, bullet_from_title(&prepared.unit)),
            source: BulletSource::Cancelled,
            fatal: None,
        };
    }

    let ctx = UnitContext {
        unit: &prepared.unit,
        evidence: &prepared.evidence,
        prompt: build_map_prompt(&prepared.unit, &prepared.evidence),
    };

    match call_with_retry(provider, &ctx, config).await {
        Ok(text) => {
            if let Some(store) = cache {
                let entry = CacheEntry {
                    fingerprint: fp,
                    bullet_text: text.clone(),
                    provider_id: provider.id().to_string(),
                    created_at: Utc::now(),
                };
                if let Err(e) = store.put(&entry) {
                    warn!(unit = %prepared.unit.id, "Cache write failed: {e}");
                }
            }
            UnitOutcome {
                bullet: make_bullet(&prepared.unit, text),
                source: BulletSource::Provider,
                fatal: None,
            }
        }
        Err(e) => {
            // Fallback text is never cached under this fingerprint: the
            // provider did not produce it.
            let fatal = (!e.is_transient()).then(|| e.to_string());
            warn!(unit = %prepared.unit.id, "Summarization failed, using title: {e}");
            UnitOutcome {
                bullet: make_bullet(&prepared.unit, bullet_from_title(&prepared.unit)),
                source: BulletSource::Fallback,
                fatal,
            }
        }
    }
}

fn make_bullet(unit: &ChangeUnit, text: String) -> Bullet {
    Bullet {
        unit_id: unit.id.clone(),
        text,
        section: SectionKind::from_category(unit.category),
        is_internal: unit.is_internal,
        category: unit.category,
        merged_at: unit.merged_at,
        refs: unit.refs(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::commits::CommitType;
    use crate::unit::evidence::EvidenceSet;
    use crate::unit::extract::UnitKind;
    use std::collections::BTreeSet;
    use std::time::Duration;

    struct FakeRemote {
        fail_status: Option<u16>,
        fatal: bool,
    }

    impl FakeRemote {
        fn healthy() -> Self {
            Self { fail_status: None, fatal: false }
        }
    }

    #[async_trait::async_trait]
    impl Summarizer for FakeRemote {
        fn id(&self) -> &'static str {
            "openai"
        }

        fn model(&self) -> &str {
            "fake"
        }

        async fn summarize(&self, ctx: &UnitContext<'_>) -> Result<String, ProviderError> {
            if self.fatal {
                return Err(ProviderError::MissingCredentials {
                    provider: "openai",
                    env_var: "OPENAI_API_KEY",
                });
            }
            if let Some(status) = self.fail_status {
                return Err(ProviderError::Api {
                    provider: "openai",
                    status,
                    body: "boom".to_string(),
                });
            }
            Ok(format!("Summarized {}", ctx.unit.id))
        }
    }

    fn prepared(id: &str, title: &str) -> PreparedUnit {
        PreparedUnit {
            unit: ChangeUnit {
                id: id.to_string(),
                kind: UnitKind::Commit,
                title: title.to_string(),
                author: "dev".to_string(),
                commit_shas: vec!["a".repeat(40)],
                files: BTreeSet::new(),
                linked_issues: BTreeSet::new(),
                is_internal: false,
                category: Some(CommitType::Feat),
                breaking: false,
                merged_at: Utc::now(),
            },
            evidence: EvidenceSet::default(),
        }
    }

    fn not_cancelled() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[tokio::test]
    async fn test_cold_then_warm_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let units = vec![prepared("abc1234", "feat: one"), prepared("def5678", "fix: two")];
        let provider = FakeRemote::healthy();
        let config = MapConfig::default();

        let cold = run_map(&units, &provider, Some(&store), &config, &not_cancelled()).await;
        assert_eq!(cold.stats.cache_hits, 0);
        assert_eq!(cold.stats.cache_misses, 2);
        assert_eq!(cold.stats.provider_calls, 2);
        assert_eq!(cold.stats.fallback_units, 0);
        assert_eq!(cold.bullets[0].text, "Summarized abc1234");

        let warm = run_map(&units, &provider, Some(&store), &config, &not_cancelled()).await;
        assert_eq!(warm.stats.cache_hits, 2);
        assert_eq!(warm.stats.cache_misses, 0);
        assert_eq!(warm.stats.provider_calls, 0);
        let texts = |o: &MapOutcome| o.bullets.iter().map(|b| b.text.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&cold), texts(&warm));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_fall_back_without_caching() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let units = vec![prepared("abc1234", "feat: add fuzzy search")];
        let provider = FakeRemote { fail_status: Some(500), fatal: false };
        let config = MapConfig::default();

        let outcome = run_map(&units, &provider, Some(&store), &config, &not_cancelled()).await;
        assert_eq!(outcome.stats.fallback_units, 1);
        assert_eq!(outcome.stats.provider_calls, config.max_attempts as usize);
        assert_eq!(outcome.bullets[0].text, "Add fuzzy search");

        // The fallback text must not be served as a provider result
        // later: a second run still misses.
        let again = run_map(&units, &provider, Some(&store), &config, &not_cancelled()).await;
        assert_eq!(again.stats.cache_hits, 0);
        assert_eq!(again.stats.fallback_units, 1);
    }

    #[tokio::test]
    async fn test_fatal_failure_warns_once_per_run() {
        let units = vec![prepared("abc1234", "feat: one"), prepared("def5678", "fix: two")];
        let provider = FakeRemote { fail_status: None, fatal: true };
        let config = MapConfig::default();

        let outcome = run_map(&units, &provider, None, &config, &not_cancelled()).await;
        assert_eq!(outcome.stats.fallback_units, 2);
        // Fatal errors short-circuit the retry loop.
        assert_eq!(outcome.stats.provider_calls, 2);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("openai"));
    }

    #[tokio::test]
    async fn test_cancellation_skips_provider_calls() {
        let units = vec![prepared("abc1234", "feat: one"), prepared("def5678", "fix: two")];
        let provider = FakeRemote::healthy();
        let cancel = AtomicBool::new(true);

        let outcome = run_map(&units, &provider, None, &MapConfig::default(), &cancel).await;
        assert_eq!(outcome.stats.provider_calls, 0);
        assert_eq!(outcome.stats.fallback_units, 2);
        assert!(outcome.warnings.iter().any(|w| w.contains("Interrupted")));
    }

    #[tokio::test]
    async fn test_heuristic_provider_counts_no_calls_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let units = vec![prepared("abc1234", "feat: add fuzzy search")];
        let provider = crate::provider::HeuristicProvider;
        let config = MapConfig::default();

        let outcome = run_map(&units, &provider, Some(&store), &config, &not_cancelled()).await;
        assert_eq!(outcome.stats.provider_calls, 0);
        assert_eq!(outcome.stats.fallback_units, 0);
        assert_eq!(outcome.bullets[0].text, "Add fuzzy search");

        // Heuristic output is a provider result and is cached.
        let warm = run_map(&units, &provider, Some(&store), &config, &not_cancelled()).await;
        assert_eq!(warm.stats.cache_hits, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bullets_come_back_in_unit_order() {
        struct SlowFirst;

        #[async_trait::async_trait]
        impl Summarizer for SlowFirst {
            fn id(&self) -> &'static str {
                "openai"
            }

            fn model(&self) -> &str {
                "fake"
            }

            async fn summarize(&self, ctx: &UnitContext<'_>) -> Result<String, ProviderError> {
                if ctx.unit.id == "first00" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Ok(format!("Summarized {}", ctx.unit.id))
            }
        }

        let units = vec![
            prepared("first00", "feat: one"),
            prepared("second0", "fix: two"),
            prepared("third00", "fix: three"),
        ];
        let outcome =
            run_map(&units, &SlowFirst, None, &MapConfig::default(), &not_cancelled()).await;

        let ids: Vec<&str> = outcome.bullets.iter().map(|b| b.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["first00", "second0", "third00"]);
    }
}
