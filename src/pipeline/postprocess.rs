//! Post-processing: deterministic cleanup of LLM-generated study material.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models add things that break the next stage or look
//! sloppy in the handout:
//!
//! - Wrapping the whole answer in ` ```markdown ... ``` ` fences, which
//!   Pandoc then typesets as one giant code block
//! - A chatty preamble ("Sure! Here is your study guide:") before the title
//! - `![diagram](diagram.png)` links to files that do not exist, which make
//!   Pandoc abort the PDF
//! - Windows line endings and zero-width characters that LaTeX chokes on
//!
//! Each rule is a pure `&str → String` function and independently testable.
//!
//! ## Rule Order
//!
//! Fences are stripped before line endings are normalised so the fence regex
//! sees the raw answer; the preamble is dropped before heading spacing so the
//! title becomes the first line; the final-newline pass runs last.

use crate::prompts::STUDY_SECTIONS;
use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to raw model output.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences
/// 2. Normalise line endings (CRLF → LF)
/// 3. Trim trailing whitespace per line
/// 4. Drop conversational preamble before the first `# ` title
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Ensure heading lines have a blank line before them
/// 7. Replace image links to local or placeholder files with their alt text
/// 8. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 9. Ensure the document ends with exactly one newline
pub fn clean_markdown(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = trim_trailing_whitespace(&s);
    let s = drop_preamble(&s);
    let s = collapse_blank_lines(&s);
    let s = normalise_heading_spacing(&s);
    let s = remove_unresolvable_images(&s);
    let s = remove_invisible_chars(&s);
    ensure_final_newline(&s)
}

/// Expected sections absent from `markdown`, in template order.
///
/// A document with no `# ` title reports `"Title"` first. Matching is a
/// case-insensitive substring test against heading lines, so "## 3. Core
/// Concepts & Technical Definitions" satisfies "Core Concepts".
pub fn missing_sections(markdown: &str) -> Vec<&'static str> {
    let headings: Vec<String> = markdown
        .lines()
        .map(str::trim_start)
        .filter(|l| l.starts_with('#'))
        .map(str::to_lowercase)
        .collect();

    let mut missing = Vec::new();
    if !headings.iter().any(|h| h.starts_with("# ")) {
        missing.push("Title");
    }
    for section in STUDY_SECTIONS {
        let needle = section.to_lowercase();
        if !headings.iter().any(|h| h.contains(&needle)) {
            missing.push(section);
        }
    }
    missing
}

// ── Rule 1: Strip outer markdown fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Drop conversational preamble ─────────────────────────────────────
//
// Only short preambles (a few lines, no headings) are dropped. If the text
// before the title is long it is probably real content, and a guide with no
// title at all is left untouched.

const MAX_PREAMBLE_LINES: usize = 3;

fn drop_preamble(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let Some(title) = lines.iter().position(|l| l.starts_with("# ")) else {
        return input.to_string();
    };
    let before = &lines[..title];
    let non_blank = before.iter().filter(|l| !l.trim().is_empty()).count();
    if non_blank == 0 || non_blank > MAX_PREAMBLE_LINES || before.iter().any(|l| l.starts_with('#')) {
        return input.to_string();
    }
    lines[title..].join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Normalise heading spacing ────────────────────────────────────────

static RE_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6} \S").unwrap());

fn normalise_heading_spacing(input: &str) -> String {
    let mut result = String::with_capacity(input.len() + 64);
    let mut in_code = false;
    for (i, line) in input.lines().enumerate() {
        if line.trim_start().starts_with("```") {
            in_code = !in_code;
        }
        if !in_code && i > 0 && RE_HEADING.is_match(line) {
            let trimmed = result.trim_end_matches('\n');
            result.truncate(trimmed.len());
            result.push_str("\n\n");
        }
        result.push_str(line);
        result.push('\n');
    }
    result
}

// ── Rule 7: Replace unresolvable image links ─────────────────────────────────
//
// The study document is rendered from its own directory, so any relative
// image path the model invents makes Pandoc fail with "could not fetch
// resource". Only absolute http(s) links on non-placeholder hosts survive.

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap());

fn is_placeholder_url(url: &str) -> bool {
    let u = url.trim();
    if !u.starts_with("http://") && !u.starts_with("https://") {
        return true;
    }
    const FAKE_HOSTS: [&str; 5] = [
        "example.com",
        "placeholder.com",
        "dummyimage.com",
        "placehold.it",
        "picsum.photos",
    ];
    FAKE_HOSTS.iter().any(|d| u.contains(d))
}

fn remove_unresolvable_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let alt = caps[1].trim();
            if !is_placeholder_url(&caps[2]) {
                caps[0].to_string()
            } else if alt.is_empty() {
                String::new()
            } else {
                format!("*{alt}*")
            }
        })
        .to_string()
}

// ── Rule 8: Remove invisible Unicode characters ─────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'],
        "",
    )
}

// ── Rule 9: Ensure file ends with single newline ─────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}\n")
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_GUIDE: &str = "# Thermodynamics\n\n## 1. Learning Objectives\n\n## 2. Executive Overview\n\n\
## 3. Core Concepts & Technical Definitions\n\n## 4. In-Depth Subject Matter Coverage\n\n\
## 5. Summary & Actionable Takeaways\n\n## 6. Glossary of Terms\n\n\
## 7. Knowledge Assessment (Bloom's Taxonomy Based)\n";

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_markdown_fences("```markdown\n# Hello\nWorld\n```"), "# Hello\nWorld");
        assert_eq!(strip_markdown_fences("```md\n# Hello\n```"), "# Hello");
    }

    #[test]
    fn test_inner_code_fence_untouched() {
        let input = "# T\n\n```rust\nfn main() {}\n```\n\nText";
        assert_eq!(strip_markdown_fences(input), input);
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_drop_short_preamble() {
        let input = "Sure! Here is your study guide:\n\n# Topic\nBody";
        assert_eq!(drop_preamble(input), "# Topic\nBody");
    }

    #[test]
    fn test_keep_long_preamble() {
        let input = "one\ntwo\nthree\nfour\n# Topic";
        assert_eq!(drop_preamble(input), input);
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_heading_spacing_skips_code() {
        let input = "text\n## Heading\n```bash\n# comment\n```";
        let result = normalise_heading_spacing(input);
        assert!(result.contains("text\n\n## Heading\n"));
        assert!(result.contains("```bash\n# comment\n"));
    }

    #[test]
    fn test_local_image_becomes_caption() {
        let result = remove_unresolvable_images("See\n![Carnot cycle](carnot.png)\nnext");
        assert!(!result.contains("!["));
        assert!(result.contains("*Carnot cycle*"));
    }

    #[test]
    fn test_keep_real_image_link() {
        let input = "![Figure](https://upload.wikimedia.org/fig1.png)";
        assert_eq!(remove_unresolvable_images(input), input);
    }

    #[test]
    fn test_remove_invisible() {
        assert_eq!(remove_invisible_chars("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn test_empty_output_stays_empty() {
        assert_eq!(clean_markdown("```markdown\n\n```"), "");
        assert_eq!(clean_markdown("  \n\n "), "");
    }

    #[test]
    fn test_clean_markdown_full_pipeline() {
        let input = "```markdown\nHere you go:\r\n# Title\r\n\r\nSome text   \n\n\n\n\n\n## Section\n```";
        let result = clean_markdown(input);
        assert!(result.starts_with("# Title"));
        assert!(result.ends_with("## Section\n"));
        assert!(!result.contains("\n\n\n\n"));
    }

    #[test]
    fn test_complete_guide_has_no_missing_sections() {
        assert!(missing_sections(FULL_GUIDE).is_empty());
    }

    #[test]
    fn test_missing_sections_reported_in_order() {
        let partial = "## Learning Objectives\n## Glossary\n";
        assert_eq!(
            missing_sections(partial),
            vec![
                "Title",
                "Executive Overview",
                "Core Concepts",
                "In-Depth",
                "Summary",
                "Knowledge Assessment"
            ]
        );
    }
}
