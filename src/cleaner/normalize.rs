//! Text repair: fixed sequence of deterministic passes.
//!
//! Pass order is part of the contract. URLs and artifacts go first so that
//! paragraphs differing only by stripped noise collapse as duplicates;
//! whitespace collapse precedes title removal so whitespace cannot defeat
//! exact title matching; paragraph de-duplication runs last.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());
static NEWLINE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static SPACE_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {3,}").unwrap());

/// Repair a story body. Returns the input unchanged when there is nothing
/// to do; never fails.
pub fn normalize(title: &str, text: &str) -> String {
    if text.is_empty() {
        return text.to_string();
    }
    let text = strip_urls(text);
    let text = strip_artifacts(&text);
    let text = collapse_whitespace(&text);
    let text = dedup_title(title, &text);
    let text = dedup_paragraphs(&text);
    text.trim().to_string()
}

/// Delete every maximal `http(s)://...` run, no replacement.
pub fn strip_urls(text: &str) -> String {
    URL_RE.replace_all(text, "").into_owned()
}

/// Remove scraping artifacts: object replacement character and NUL.
pub fn strip_artifacts(text: &str) -> String {
    text.replace('\u{FFFC}', "").replace('\0', "")
}

/// Runs of 3+ newlines become a paragraph break, runs of 3+ spaces a
/// single space.
pub fn collapse_whitespace(text: &str) -> String {
    let text = NEWLINE_RUN_RE.replace_all(text, "\n\n");
    SPACE_RUN_RE.replace_all(&text, " ").into_owned()
}

/// Remove repeated copies of the title. A copy at the very start is the
/// legitimate one and is kept; if the title only shows up later, every
/// occurrence is scraping residue.
pub fn dedup_title(title: &str, text: &str) -> String {
    if title.is_empty() || !text.contains(title) {
        return text.to_string();
    }
    match text.strip_prefix(title) {
        Some(rest) => format!("{}{}", title, rest.replace(title, "")),
        None => text.replace(title, ""),
    }
}

/// Keep the first occurrence of each paragraph, in order. Comparison is on
/// the trimmed form; paragraphs that trim to nothing are dropped.
pub fn dedup_paragraphs(text: &str) -> String {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut kept: Vec<&str> = Vec::new();
    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if !trimmed.is_empty() && seen.insert(trimmed) {
            kept.push(para);
        }
    }
    kept.join("\n\n")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_pass_removes_whole_run() {
        assert_eq!(
            strip_urls("Read more at https://fairytalez.com/story visit us"),
            "Read more at  visit us"
        );
        assert_eq!(strip_urls("a http://x.test/p?q=1 b"), "a  b");
        assert_eq!(strip_urls("no links here"), "no links here");
    }

    #[test]
    fn artifact_pass() {
        assert_eq!(strip_artifacts("on\u{FFFC}ce\0 upon"), "once upon");
    }

    #[test]
    fn whitespace_pass() {
        assert_eq!(collapse_whitespace("a\n\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_whitespace("a     b"), "a b");
        // Two-long runs are already fine
        assert_eq!(collapse_whitespace("a\n\nb  c"), "a\n\nb  c");
    }

    #[test]
    fn leading_title_kept_later_copies_removed() {
        let out = dedup_title("The Fox", "The Fox\n\nstory text\n\nThe Fox more");
        assert_eq!(out, "The Fox\n\nstory text\n\n more");
    }

    #[test]
    fn non_leading_title_removed_everywhere() {
        let out = dedup_title("The Fox", "intro The Fox middle The Fox end");
        assert_eq!(out, "intro  middle  end");
    }

    #[test]
    fn paragraph_dedup_is_order_preserving() {
        let text = "A\n\nB\n\nA\n\nC";
        assert_eq!(dedup_paragraphs(text), "A\n\nB\n\nC");
    }

    #[test]
    fn paragraph_dedup_compares_trimmed_form() {
        let text = "A\n\n  A  \n\nB";
        assert_eq!(dedup_paragraphs(text), "A\n\nB");
    }

    #[test]
    fn full_pipeline_fox_story() {
        let title = "The Fox";
        let text = "The Fox\n\nOnce upon a time...\n\n\n\nThe Fox\n\nThe end.";
        let out = normalize(title, text);
        assert_eq!(out, "The Fox\n\nOnce upon a time...\n\nThe end.");
        assert!(!out[title.len()..].contains(title));
        assert!(!out.contains("\n\n\n"));
    }

    #[test]
    fn leading_title_without_repeats_is_only_trimmed() {
        let title = "The Fox";
        let text = "The Fox\n\nOnce upon a time the fox ran far away.\n\nThe end came soon.\n";
        assert_eq!(normalize(title, text), text.trim());
    }

    #[test]
    fn repeated_title_not_at_start_is_fully_removed() {
        let title = "The Clever Crow";
        let text = format!(
            "Once there was a bird. {} waited in a tree.\n\n{}\n\nShe flew home.",
            "x".repeat(60),
            title
        );
        let out = normalize(title, &text);
        assert!(!out.contains(title));
    }

    #[test]
    fn empty_text_passes_through() {
        assert_eq!(normalize("Any Title", ""), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let cases = [
            ("The Fox", "The Fox\n\nOnce upon a time...\n\n\n\nThe Fox\n\nThe end."),
            ("", "a   b\n\n\n\nc\n\nc\n\nd https://x.test/y e"),
            ("Tale", "Tale told twice Tale"),
        ];
        for (title, text) in cases {
            let once = normalize(title, text);
            let twice = normalize(title, &once);
            assert_eq!(once, twice, "normalize not stable for {:?}", text);
        }
    }

    #[test]
    fn near_duplicate_paragraphs_collapse_after_url_strip() {
        // Two paragraphs differ only by a URL remnant; stripping first makes
        // them exact duplicates
        let text = "The end. https://fairytalez.com/s\n\nThe end.";
        let out = normalize("", text);
        assert_eq!(out, "The end.");
    }
}
