use similar::TextDiff;

pub const PREVIEW_MAX_LINES: usize = 200;
const PREVIEW_CONTEXT: usize = 3;

/// Unified diff between `old` and `new`, capped at `PREVIEW_MAX_LINES` lines.
#[must_use]
pub fn diff_preview(old: &str, new: &str, path_label: &str) -> String {
    let from = format!("a/{path_label}");
    let to = format!("b/{path_label}");
    let diff = TextDiff::from_lines(old, new);
    let rendered = diff
        .unified_diff()
        .context_radius(PREVIEW_CONTEXT)
        .header(&from, &to)
        .to_string();

    if rendered.trim().is_empty() {
        return "No changes.".to_string();
    }

    let lines: Vec<&str> = rendered.lines().collect();
    if lines.len() <= PREVIEW_MAX_LINES {
        return lines.join("\n");
    }

    let mut preview = lines[..PREVIEW_MAX_LINES].join("\n");
    preview.push_str(&format!(
        "\n...[diff truncated: {} more lines]...",
        lines.len() - PREVIEW_MAX_LINES
    ));
    preview
}
