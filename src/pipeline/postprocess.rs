//! Post-processing: deterministic cleanup of raw VLM table output.
//!
//! The prompt asks for bare pipe-delimited rows, but models still wrap the
//! answer in ```` ``` ```` fences, answer with Windows line endings, or sprinkle
//! zero-width characters into cells. Left alone, a fence line parses as a
//! one-cell row and gets picked as the table header. These rules strip the
//! wrapping without touching cell content.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so the fence rules see `\n` only.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to one chunk's raw model output.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip an outer code fence wrapping the whole answer
/// 3. Drop stray fence lines left inside the answer
/// 4. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens, etc.)
/// 5. Trim surrounding blank lines
pub fn clean_model_text(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fences(&s);
    let s = drop_fence_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer fences ──────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z0-9_-]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Drop stray fence lines ──────────────────────────────────────────

static RE_FENCE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*```[A-Za-z0-9_-]*\s*$").unwrap());

fn drop_fence_lines(input: &str) -> String {
    input
        .lines()
        .filter(|line| !RE_FENCE_LINE.is_match(line))
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences_with_lang() {
        let input = "```text\nA|B\n1|2\n```";
        assert_eq!(strip_outer_fences(input), "A|B\n1|2");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        assert_eq!(strip_outer_fences("```\nA|B\n```\n"), "A|B");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_outer_fences("A|B\n1|2"), "A|B\n1|2");
    }

    #[test]
    fn test_drop_inner_fence_lines() {
        let input = "A|B\n```\n1|2\n  ```csv  \n3|4";
        assert_eq!(drop_fence_lines(input), "A|B\n1|2\n3|4");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "Qty\u{200B}|Price\u{FEFF}";
        assert_eq!(remove_invisible_chars(input), "Qty|Price");
    }

    #[test]
    fn test_clean_model_text_full_pipeline() {
        let input = "\r\n```markdown\r\n| Name | Qty |\r\n|---|---|\r\n| Bolt\u{200B} | 4 |\r\n```\r\n";
        assert_eq!(
            clean_model_text(input),
            "| Name | Qty |\n|---|---|\n| Bolt | 4 |"
        );
    }

    #[test]
    fn test_clean_keeps_error_free_plain_rows() {
        assert_eq!(clean_model_text("a|b\n\nc|d\n"), "a|b\n\nc|d");
    }
}
