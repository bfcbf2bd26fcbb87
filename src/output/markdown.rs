//! Markdown rendering, shaped for pasting into release notes.

use crate::summarize::Summary;

pub fn render(summary: &Summary) -> String {
    let mut out = String::new();

    match &summary.label {
        Some(label) => out.push_str(&format!("## {label}\n")),
        None => out.push_str(&format!("## {}\n", summary.range)),
    }

    if summary.sections.is_empty() {
        out.push_str("\n_No user-facing changes._\n");
        return out;
    }

    for section in &summary.sections {
        out.push_str(&format!("\n### {}\n\n", section.title));
        for bullet in &section.bullets {
            if bullet.refs.is_empty() {
                out.push_str(&format!("- {}\n", bullet.text));
            } else {
                out.push_str(&format!("- {} ({})\n", bullet.text, bullet.refs.join(", ")));
            }
        }
    }
    out
}
