//! Diff hunk selection.
//!
//! Splits unit diffs into hunks, scores them by where they live and
//! what they add, and keeps the best few under a byte budget so the
//! summarizer prompt stays small and deterministic.

use serde::Serialize;
use tracing::debug;

use crate::config::{CategoryWeights, EvidenceConfig};
use crate::unit::extract::{ChangeUnit, ExtractedUnit};

/// Hunk length contribution saturates here so one giant hunk cannot
/// outrank a declaration change.
const LENGTH_CAP: usize = 500;
const LENGTH_NORM: f64 = 1000.0;
const DECLARATION_BONUS: f64 = 1.5;
/// Git names the enclosing item in the hunk header context when it can.
const HEADER_CONTEXT_BONUS: f64 = 0.5;

/// Added-line prefixes that signal a surface change rather than body
/// churn.
const DECLARATION_MARKERS: &[&str] = &[
    "fn ",
    "pub ",
    "struct ",
    "enum ",
    "trait ",
    "impl ",
    "def ",
    "class ",
    "function ",
    "export ",
    "interface ",
    "type ",
];

const NOISE_SEGMENTS: &[&str] = &[
    "vendor",
    "node_modules",
    "dist",
    "target",
    "third_party",
    "generated",
];

const NOISE_FILES: &[&str] = &["package-lock.json", "pnpm-lock.yaml", "yarn.lock"];

const NOISE_SUFFIXES: &[&str] = &[
    ".lock", ".min.js", ".min.css", ".map", ".snap", ".sum", ".png", ".jpg", ".jpeg", ".gif",
    ".ico", ".pdf", ".woff", ".woff2", ".ttf", ".zip", ".gz", ".jar",
];

/// Where a touched path sits in the project, used to weight its hunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkCategory {
    Api,
    Cli,
    Ui,
    Docs,
    Internal,
    Other,
}

impl HunkCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HunkCategory::Api => "api",
            HunkCategory::Cli => "cli",
            HunkCategory::Ui => "ui",
            HunkCategory::Docs => "docs",
            HunkCategory::Internal => "internal",
            HunkCategory::Other => "other",
        }
    }

    fn weight(&self, weights: &CategoryWeights) -> f64 {
        match self {
            HunkCategory::Api => weights.api,
            HunkCategory::Cli => weights.cli,
            HunkCategory::Ui => weights.ui,
            HunkCategory::Docs => weights.docs,
            HunkCategory::Internal => weights.internal,
            HunkCategory::Other => weights.other,
        }
    }
}

/// One selected hunk, header line included in `hunk_text`.
#[derive(Debug, Clone, Serialize)]
pub struct DiffHunk {
    pub path: String,
    pub hunk_text: String,
    pub added_lines: usize,
    pub removed_lines: usize,
    pub category: HunkCategory,
}

/// The evidence handed to the summarizer for one unit, hunks in
/// descending score order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EvidenceSet {
    pub hunks: Vec<DiffHunk>,
    pub total_bytes: usize,
    /// The top hunk was clipped to fit the budget.
    pub truncated: bool,
    /// Candidates that scored too low or did not fit.
    pub omitted_hunks: usize,
}

/// A unit with its evidence attached, ready for the map phase.
#[derive(Debug, Clone)]
pub struct PreparedUnit {
    pub unit: ChangeUnit,
    pub evidence: EvidenceSet,
}

/// Pick the evidence for one unit. With `include_code` off the hunks
/// keep their path and line counts but carry no patch text.
pub fn select_evidence(
    extracted: ExtractedUnit,
    config: &EvidenceConfig,
    include_code: bool,
) -> PreparedUnit {
    let ExtractedUnit { unit, diffs } = extracted;

    let mut candidates: Vec<(f64, DiffHunk)> = Vec::new();
    for diff in &diffs {
        for file in &diff.files {
            if is_noise_path(&file.path) {
                continue;
            }
            let category = classify_path(&file.path);
            for chunk in split_hunks(&file.patch) {
                let score = score_hunk(&chunk, category, &config.category_weights);
                candidates.push((
                    score,
                    DiffHunk {
                        path: file.path.clone(),
                        hunk_text: chunk.text,
                        added_lines: chunk.added,
                        removed_lines: chunk.removed,
                        category,
                    },
                ));
            }
        }
    }

    // Stable order regardless of how diffs arrived: score, then path,
    // then text.
    candidates.sort_by(|(sa, a), (sb, b)| {
        sb.partial_cmp(sa)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.hunk_text.cmp(&b.hunk_text))
    });

    let total_candidates = candidates.len();
    let mut evidence = EvidenceSet::default();

    for (_, hunk) in candidates {
        if evidence.hunks.len() >= config.max_hunks_per_unit {
            break;
        }
        let len = hunk.hunk_text.len();
        if evidence.total_bytes + len > config.max_bytes {
            if evidence.hunks.is_empty() {
                // The best hunk always survives, clipped to the budget.
                let mut hunk = hunk;
                hunk.hunk_text = truncate_to_boundary(&hunk.hunk_text, config.max_bytes);
                evidence.total_bytes = hunk.hunk_text.len();
                evidence.truncated = true;
                evidence.hunks.push(hunk);
            }
            continue;
        }
        evidence.total_bytes += len;
        evidence.hunks.push(hunk);
    }

    evidence.omitted_hunks = total_candidates - evidence.hunks.len();

    if !include_code {
        for hunk in &mut evidence.hunks {
            hunk.hunk_text.clear();
        }
        evidence.total_bytes = 0;
        evidence.truncated = false;
    }

    debug!(
        unit = %unit.id,
        hunks = evidence.hunks.len(),
        omitted = evidence.omitted_hunks,
        bytes = evidence.total_bytes,
        "Selected evidence"
    );

    PreparedUnit { unit, evidence }
}

struct HunkChunk {
    text: String,
    added: usize,
    removed: usize,
}

/// Split a file patch into per-hunk chunks at `@@` headers.
fn split_hunks(patch: &str) -> Vec<HunkChunk> {
    let mut hunks: Vec<HunkChunk> = Vec::new();
    let mut current: Option<HunkChunk> = None;

    for line in patch.lines() {
        if line.starts_with("@@") {
            if let Some(done) = current.take() {
                hunks.push(done);
            }
            current = Some(HunkChunk {
                text: format!("{line}\n"),
                added: 0,
                removed: 0,
            });
            continue;
        }
        let Some(chunk) = current.as_mut() else {
            continue;
        };
        if line.starts_with('+') {
            chunk.added += 1;
        } else if line.starts_with('-') {
            chunk.removed += 1;
        }
        chunk.text.push_str(line);
        chunk.text.push('\n');
    }
    if let Some(done) = current.take() {
        hunks.push(done);
    }
    hunks
}

fn score_hunk(chunk: &HunkChunk, category: HunkCategory, weights: &CategoryWeights) -> f64 {
    let mut score = category.weight(weights);
    if has_added_declaration(&chunk.text) {
        score += DECLARATION_BONUS;
    }
    if header_names_declaration(&chunk.text) {
        score += HEADER_CONTEXT_BONUS;
    }
    score += chunk.text.len().min(LENGTH_CAP) as f64 / LENGTH_NORM;
    score
}

fn has_added_declaration(text: &str) -> bool {
    text.lines()
        .filter_map(|line| line.strip_prefix('+'))
        .map(str::trim_start)
        .any(|added| DECLARATION_MARKERS.iter().any(|m| added.starts_with(m)))
}

/// True when the `@@ -a,b +c,d @@ <context>` trailer mentions a
/// declaration, meaning the change sits inside a named item.
fn header_names_declaration(text: &str) -> bool {
    let Some(header) = text.lines().next() else {
        return false;
    };
    let Some(context) = header.splitn(3, "@@").nth(2) else {
        return false;
    };
    let context = context.trim_start();
    DECLARATION_MARKERS.iter().any(|m| context.contains(m))
}

/// Lockfiles, vendored trees, minified and binary assets never make
/// useful evidence.
pub fn is_noise_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    if lower.split('/').any(|seg| NOISE_SEGMENTS.contains(&seg)) {
        return true;
    }
    let file = lower.rsplit('/').next().unwrap_or(&lower);
    if NOISE_FILES.contains(&file) {
        return true;
    }
    NOISE_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Route a path to its weighting category. Precedence: internal tree,
/// docs, api, cli, ui.
pub fn classify_path(path: &str) -> HunkCategory {
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower.split('/').collect();
    let file = segments.last().copied().unwrap_or_default();

    let has_segment =
        |names: &[&str]| segments.iter().any(|seg| names.contains(seg));

    if has_segment(&["tests", "test", ".github", "ci", "scripts", "benches"])
        || file == "makefile"
        || file == "dockerfile"
    {
        return HunkCategory::Internal;
    }
    if has_segment(&["docs", "doc"])
        || lower.ends_with(".md")
        || lower.ends_with(".rst")
        || lower.ends_with(".adoc")
        || file.starts_with("readme")
        || file.starts_with("changelog")
    {
        return HunkCategory::Docs;
    }
    if has_segment(&["api", "public", "schema", "proto", "openapi"])
        || lower.ends_with(".proto")
        || lower.ends_with(".graphql")
    {
        return HunkCategory::Api;
    }
    if has_segment(&["cli", "cmd", "bin", "commands"]) || file == "main.rs" {
        return HunkCategory::Cli;
    }
    if has_segment(&["ui", "web", "frontend", "components", "views", "pages"])
        || lower.ends_with(".tsx")
        || lower.ends_with(".jsx")
        || lower.ends_with(".vue")
        || lower.ends_with(".svelte")
        || lower.ends_with(".css")
        || lower.ends_with(".html")
    {
        return HunkCategory::Ui;
    }
    HunkCategory::Other
}

fn truncate_to_boundary(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
