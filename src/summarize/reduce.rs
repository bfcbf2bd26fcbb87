//! Bullet aggregation into the final Summary.
//!
//! Order of operations: internal filter, section grouping, near-duplicate
//! collapse, priority capping, then chronological presentation. Bullets
//! carry their merge timestamps, so the outcome is identical no matter
//! what order the map phase delivered them in.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::ReduceConfig;
use crate::summarize::map::MapStats;
use crate::summarize::{Bullet, SectionKind, Summary, SummarySection, SummaryStats};

/// Run-level choices that shape aggregation.
#[derive(Debug, Clone, Default)]
pub struct ReduceOptions {
    pub include_internal: bool,
    pub label: Option<String>,
}

/// Merge map-phase bullets into a Summary.
pub fn reduce(
    range: &str,
    bullets: Vec<Bullet>,
    map_stats: &MapStats,
    config: &ReduceConfig,
    options: &ReduceOptions,
) -> Summary {
    let mut stats = SummaryStats {
        units: map_stats.units,
        cache_hits: map_stats.cache_hits,
        cache_misses: map_stats.cache_misses,
        provider_calls: map_stats.provider_calls,
        fallback_units: map_stats.fallback_units,
        provider_used: map_stats.provider_used.clone(),
        ..SummaryStats::default()
    };

    // Dedup survival and cap tie-breaks both want "earliest first", so
    // settle on merge chronology up front.
    let mut bullets = bullets;
    bullets.sort_by(|a, b| {
        a.merged_at
            .cmp(&b.merged_at)
            .then_with(|| a.unit_id.cmp(&b.unit_id))
    });

    let mut grouped: BTreeMap<SectionKind, Vec<Bullet>> = BTreeMap::new();
    for bullet in bullets {
        if bullet.is_internal && !options.include_internal {
            stats.internal_dropped += 1;
            continue;
        }
        grouped.entry(bullet.section).or_default().push(bullet);
    }

    let mut sections = Vec::new();
    for kind in SectionKind::ORDER {
        let Some(section_bullets) = grouped.remove(&kind) else {
            continue;
        };

        let kept = dedup_section(section_bullets, config.dedup_threshold, &mut stats.deduplicated);
        let mut kept = cap_section(kept, config, &mut stats.capped);

        kept.sort_by(|a, b| {
            a.merged_at
                .cmp(&b.merged_at)
                .then_with(|| a.unit_id.cmp(&b.unit_id))
        });

        if !kept.is_empty() {
            stats.bullets += kept.len();
            sections.push(SummarySection {
                kind,
                title: kind.title(),
                bullets: kept,
            });
        }
    }

    debug!(
        sections = sections.len(),
        bullets = stats.bullets,
        deduplicated = stats.deduplicated,
        capped = stats.capped,
        "Reduce complete"
    );

    Summary {
        range: range.to_string(),
        label: options.label.clone(),
        sections,
        stats,
    }
}

/// Collapse near-duplicate bullets; the chronologically earliest
/// survives. Input must already be in chronological order.
fn dedup_section(bullets: Vec<Bullet>, threshold: f64, dropped: &mut usize) -> Vec<Bullet> {
    let mut kept: Vec<(Bullet, HashSet<String>)> = Vec::new();
    for bullet in bullets {
        let tokens = token_set(&bullet.text);
        let duplicate = kept
            .iter()
            .any(|(_, existing)| jaccard(existing, &tokens) >= threshold);
        if duplicate {
            *dropped += 1;
        } else {
            kept.push((bullet, tokens));
        }
    }
    kept.into_iter().map(|(bullet, _)| bullet).collect()
}

/// Enforce the per-section cap, keeping the highest-priority bullets.
/// Ties go to the earlier merge.
fn cap_section(bullets: Vec<Bullet>, config: &ReduceConfig, capped: &mut usize) -> Vec<Bullet> {
    if bullets.len() <= config.section_cap {
        return bullets;
    }

    let mut ranked = bullets;
    ranked.sort_by(|a, b| {
        priority(b, config)
            .cmp(&priority(a, config))
            .then_with(|| a.merged_at.cmp(&b.merged_at))
            .then_with(|| a.unit_id.cmp(&b.unit_id))
    });
    *capped += ranked.len() - config.section_cap;
    ranked.truncate(config.section_cap);
    ranked
}

fn priority(bullet: &Bullet, config: &ReduceConfig) -> u32 {
    bullet
        .category
        .and_then(|category| config.type_weights.get(category.as_str()))
        .copied()
        .unwrap_or(0)
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Token-set similarity. Two empty sets are identical.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
