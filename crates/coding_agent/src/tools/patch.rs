//! Unified-diff hunk parsing and application for `apply_patch`.

use std::sync::OnceLock;

use regex::Regex;

fn hunk_header_regex() -> &'static Regex {
    static CACHED: OnceLock<Regex> = OnceLock::new();
    CACHED.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("hunk regex must compile")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("patch parse failed: no hunks found")]
    NoHunks,
    #[error("patch context mismatch at line {line}: expected {expected:?}, found {found:?}")]
    Mismatch {
        line: usize,
        expected: String,
        found: String,
    },
    #[error("patch goes past end of file at line {line}")]
    PastEnd { line: usize },
    #[error("patch hunks overlap or are out of order at line {line}")]
    OutOfOrder { line: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: usize,
    pub old_count: usize,
    pub new_start: usize,
    pub new_count: usize,
    pub lines: Vec<String>,
}

/// Extracts every `@@` hunk from `patch`. File headers are skipped.
#[must_use]
pub fn parse_hunks(patch: &str) -> Vec<Hunk> {
    let mut hunks: Vec<Hunk> = Vec::new();

    for line in patch.lines() {
        if let Some(captures) = hunk_header_regex().captures(line) {
            let number = |index: usize, default: usize| {
                captures
                    .get(index)
                    .and_then(|value| value.as_str().parse().ok())
                    .unwrap_or(default)
            };
            hunks.push(Hunk {
                old_start: number(1, 0),
                old_count: number(2, 1),
                new_start: number(3, 0),
                new_count: number(4, 1),
                lines: Vec::new(),
            });
            continue;
        }

        let Some(hunk) = hunks.last_mut() else {
            continue;
        };
        if line.starts_with("--- ") || line.starts_with("+++ ") || line.starts_with("diff ") {
            continue;
        }
        hunk.lines.push(line.to_string());
    }

    hunks
}

/// Applies `patch` to `original`, returning the updated text.
pub fn apply_unified_patch(original: &str, patch: &str) -> Result<String, PatchError> {
    let hunks = parse_hunks(patch);
    if hunks.is_empty() {
        return Err(PatchError::NoHunks);
    }

    let source: Vec<&str> = original.split_inclusive('\n').collect();
    let mut out = String::with_capacity(original.len());
    let mut cursor = 0;

    for hunk in &hunks {
        let start = hunk.old_start.saturating_sub(1);
        if start < cursor {
            return Err(PatchError::OutOfOrder {
                line: hunk.old_start,
            });
        }
        while cursor < start && cursor < source.len() {
            out.push_str(source[cursor]);
            cursor += 1;
        }

        for line in &hunk.lines {
            let (prefix, text) = match line.chars().next() {
                Some(prefix) => (prefix, &line[prefix.len_utf8()..]),
                // Editors often strip the single space of a blank context line.
                None => (' ', ""),
            };

            match prefix {
                ' ' | '-' => {
                    let Some(current) = source.get(cursor) else {
                        return Err(PatchError::PastEnd { line: cursor + 1 });
                    };
                    let current_text = current.trim_end_matches(['\n', '\r']);
                    if current_text != text.trim_end_matches('\r') {
                        return Err(PatchError::Mismatch {
                            line: cursor + 1,
                            expected: text.to_string(),
                            found: current_text.to_string(),
                        });
                    }
                    if prefix == ' ' {
                        out.push_str(current);
                    }
                    cursor += 1;
                }
                '+' => {
                    out.push_str(text);
                    out.push('\n');
                }
                _ => {}
            }
        }
    }

    for line in &source[cursor.min(source.len())..] {
        out.push_str(line);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const ORIGINAL: &str = "one\ntwo\nthree\nfour\nfive\n";

    #[test]
    fn applies_single_hunk_with_headers() {
        let patch = "--- a/numbers.txt\n+++ b/numbers.txt\n@@ -2,2 +2,2 @@\n two\n-three\n+THREE\n";
        let updated = apply_unified_patch(ORIGINAL, patch).expect("patch applies");
        assert_eq!(updated, "one\ntwo\nTHREE\nfour\nfive\n");
    }

    #[test]
    fn applies_multiple_hunks_in_order() {
        let patch = "@@ -1 +1,2 @@\n one\n+one-and-a-half\n@@ -5 +6 @@\n-five\n+5\n";
        let updated = apply_unified_patch(ORIGINAL, patch).expect("patch applies");
        assert_eq!(updated, "one\none-and-a-half\ntwo\nthree\nfour\n5\n");
    }

    #[test]
    fn reports_context_mismatch_without_partial_output() {
        let patch = "@@ -2,1 +2,1 @@\n-deux\n+2\n";
        let error = apply_unified_patch(ORIGINAL, patch).expect_err("mismatch");
        assert_eq!(
            error,
            PatchError::Mismatch {
                line: 2,
                expected: "deux".to_string(),
                found: "two".to_string(),
            }
        );
    }

    #[test]
    fn rejects_patch_without_hunks() {
        assert_eq!(
            apply_unified_patch(ORIGINAL, "just some text"),
            Err(PatchError::NoHunks)
        );
    }

    #[test]
    fn rejects_removal_past_end_of_file() {
        let patch = "@@ -5,2 +5,0 @@\n-five\n-six\n";
        assert_eq!(
            apply_unified_patch(ORIGINAL, patch),
            Err(PatchError::PastEnd { line: 6 })
        );
    }

    #[test]
    fn rejects_overlapping_hunks() {
        let patch = "@@ -3 +3 @@\n-three\n+3\n@@ -1 +1 @@\n-one\n+1\n";
        assert_eq!(
            apply_unified_patch(ORIGINAL, patch),
            Err(PatchError::OutOfOrder { line: 1 })
        );
    }

    #[test]
    fn parse_reads_counts_with_defaults() {
        let hunks = parse_hunks("@@ -3 +4,2 @@\n-a\n+b\n+c\n");
        assert_eq!(hunks.len(), 1);
        assert_eq!(
            (hunks[0].old_start, hunks[0].old_count, hunks[0].new_start, hunks[0].new_count),
            (3, 1, 4, 2)
        );
        assert_eq!(hunks[0].lines, vec!["-a", "+b", "+c"]);
    }
}
