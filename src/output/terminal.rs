//! Plain-text rendering for interactive use.

use crate::summarize::Summary;

/// Render the summary for a terminal: header, sections with indented
/// bullets, and a one-line accounting footer.
pub fn render(summary: &Summary) -> String {
    let mut out = String::new();

    match &summary.label {
        Some(label) => out.push_str(&format!("{label} ({})\n", summary.range)),
        None => out.push_str(&format!("Changes in {}\n", summary.range)),
    }

    if summary.sections.is_empty() {
        out.push_str("\nNo user-facing changes in this range.\n");
        return out;
    }

    for section in &summary.sections {
        out.push('\n');
        out.push_str(section.title);
        out.push('\n');
        for bullet in &section.bullets {
            if bullet.refs.is_empty() {
                out.push_str(&format!("  - {}\n", bullet.text));
            } else {
                out.push_str(&format!("  - {} ({})\n", bullet.text, bullet.refs.join(", ")));
            }
        }
    }

    let stats = &summary.stats;
    out.push_str(&format!(
        "\n{} bullets from {} units",
        stats.bullets, stats.units
    ));
    if stats.internal_dropped > 0 {
        out.push_str(&format!(", {} internal hidden", stats.internal_dropped));
    }
    out.push_str(&format!(
        ". Provider {}: {} cache hits, {} calls, {} fallbacks.\n",
        stats.provider_used, stats.cache_hits, stats.provider_calls, stats.fallback_units
    ));
    out
}
