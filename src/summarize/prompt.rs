//! Prompt construction for remote summarizers.

use std::fmt::Write as _;

use crate::unit::{ChangeUnit, EvidenceSet};

/// Bump whenever the prompt wording changes; part of the cache
/// fingerprint so stale bullets are never served.
pub const PROMPT_VERSION: &str = "v1";

pub const SYSTEM_PROMPT: &str = "You are writing release notes for a software project. \
Respond with exactly one plain-text bullet line describing the change for end users: \
no leading dash, no markdown, no code, at most 25 words. \
Describe what changed and why a user would care, not how it was implemented.";

/// Listed file paths are capped; the rest collapse into a count.
const MAX_LISTED_FILES: usize = 15;
/// Per-field line cap applied during sanitization.
const MAX_SANITIZED_LINES: usize = 50;

/// Build the user prompt for one unit.
pub fn build_map_prompt(unit: &ChangeUnit, evidence: &EvidenceSet) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Change to summarize:");
    let _ = writeln!(prompt, "kind: {}", unit.kind.as_str());
    let _ = writeln!(prompt, "title: {}", sanitize_for_prompt(&unit.title));
    let _ = writeln!(prompt, "author: {}", sanitize_for_prompt(&unit.author));
    if let Some(category) = unit.category {
        let _ = writeln!(prompt, "category: {}", category.as_str());
    }
    if unit.breaking {
        let _ = writeln!(prompt, "breaking: yes");
    }
    if !unit.linked_issues.is_empty() {
        let issues: Vec<String> = unit.linked_issues.iter().map(|n| format!("#{n}")).collect();
        let _ = writeln!(prompt, "linked issues: {}", issues.join(", "));
    }

    if !unit.files.is_empty() {
        let _ = writeln!(prompt, "\nFiles touched:");
        for path in unit.files.iter().take(MAX_LISTED_FILES) {
            let _ = writeln!(prompt, "  {path}");
        }
        if unit.files.len() > MAX_LISTED_FILES {
            let _ = writeln!(prompt, "  (+{} more)", unit.files.len() - MAX_LISTED_FILES);
        }
    }

    let code_hunks: Vec<_> = evidence
        .hunks
        .iter()
        .filter(|hunk| !hunk.hunk_text.is_empty())
        .collect();
    if code_hunks.is_empty() {
        let _ = writeln!(prompt, "\nNo code excerpts available; rely on the metadata above.");
    } else {
        let _ = writeln!(prompt, "\nCode excerpts:");
        for hunk in code_hunks {
            let _ = writeln!(
                prompt,
                "--- {} ({}, +{} -{})",
                hunk.path,
                hunk.category.as_str(),
                hunk.added_lines,
                hunk.removed_lines
            );
            let _ = writeln!(prompt, "{}", sanitize_for_prompt(hunk.hunk_text.trim_end()));
        }
        if evidence.omitted_hunks > 0 {
            let _ = writeln!(prompt, "(+{} hunks omitted)", evidence.omitted_hunks);
        }
    }

    let _ = write!(
        prompt,
        "\nWrite the one-line release note bullet for this change."
    );
    prompt
}

/// Defuse markdown fences and headings in untrusted text and cap its
/// length before it reaches a model.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("```", "'''")
        .replace("##", "//")
        .lines()
        .take(MAX_SANITIZED_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::commits::CommitType;
    use crate::unit::evidence::{DiffHunk, HunkCategory};
    use crate::unit::extract::UnitKind;
    use chrono::Utc;

    fn unit() -> ChangeUnit {
        ChangeUnit {
            id: "pr-12".to_string(),
            kind: UnitKind::PullRequest,
            title: "feat: add fuzzy search".to_string(),
            author: "dev".to_string(),
            commit_shas: vec!["a".repeat(40)],
            files: ["src/search.rs".to_string()].into_iter().collect(),
            linked_issues: [7].into_iter().collect(),
            is_internal: false,
            category: Some(CommitType::Feat),
            breaking: false,
            merged_at: Utc::now(),
        }
    }

    fn evidence(text: &str) -> EvidenceSet {
        EvidenceSet {
            hunks: vec![DiffHunk {
                path: "src/search.rs".to_string(),
                hunk_text: text.to_string(),
                added_lines: 1,
                removed_lines: 0,
                category: HunkCategory::Other,
            }],
            total_bytes: text.len(),
            truncated: false,
            omitted_hunks: 2,
        }
    }

    #[test]
    fn test_prompt_structure() {
        let prompt = build_map_prompt(&unit(), &evidence("@@ -1 +1,2 @@\n+fn search() {}"));

        assert!(prompt.contains("title: feat: add fuzzy search"));
        assert!(prompt.contains("category: feat"));
        assert!(prompt.contains("linked issues: #7"));
        assert!(prompt.contains("Files touched:"));
        assert!(prompt.contains("Code excerpts:"));
        assert!(prompt.contains("+fn search() {}"));
        assert!(prompt.contains("(+2 hunks omitted)"));
        assert!(prompt.ends_with("release note bullet for this change."));
    }

    #[test]
    fn test_prompt_without_code_flags_metadata_only() {
        let prompt = build_map_prompt(&unit(), &evidence(""));
        assert!(prompt.contains("No code excerpts available"));
        assert!(!prompt.contains("Code excerpts:"));
    }

    #[test]
    fn test_sanitize_defuses_fences_and_headings() {
        let text = "```rust\ncode\n```\n## heading";
        let sanitized = sanitize_for_prompt(text);
        assert!(!sanitized.contains("```"));
        assert!(!sanitized.contains("##"));
    }

    #[test]
    fn test_sanitize_caps_lines() {
        let text = "line\n".repeat(200);
        assert_eq!(sanitize_for_prompt(&text).lines().count(), 50);
    }
}
