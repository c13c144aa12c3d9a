//! Defect detection: classify a story's textual problems.
//!
//! Read-only companion to the normalizer. Each check is independent and
//! never faults, whatever the input.

use std::collections::{BTreeSet, HashSet};

/// Known scraped-source domain that leaks into story bodies.
const SOURCE_DOMAIN: &str = "fairytalez.com";

/// Offset slack after the title before a second occurrence counts as a repeat.
const TITLE_REPEAT_SLACK: usize = 50;

const MIN_STORY_CHARS: usize = 100;
const MAX_STORY_CHARS: usize = 50_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DefectTag {
    TitleRepeated,
    ExcessiveWhitespace,
    ContainsUrl,
    FormattingArtifact,
    TooShort,
    TooLong,
    DuplicateParagraphs,
}

impl DefectTag {
    pub fn label(&self) -> &'static str {
        match self {
            DefectTag::TitleRepeated => "Title appears in middle of text",
            DefectTag::ExcessiveWhitespace => "Excessive whitespace",
            DefectTag::ContainsUrl => "Contains URLs",
            DefectTag::FormattingArtifact => "Contains formatting artifacts",
            DefectTag::TooShort => "Story too short (possibly incomplete)",
            DefectTag::TooLong => "Story very long (possibly duplicated content)",
            DefectTag::DuplicateParagraphs => "Contains repeated paragraphs",
        }
    }

    pub const ALL: &'static [DefectTag] = &[
        DefectTag::TitleRepeated,
        DefectTag::ExcessiveWhitespace,
        DefectTag::ContainsUrl,
        DefectTag::FormattingArtifact,
        DefectTag::TooShort,
        DefectTag::TooLong,
        DefectTag::DuplicateParagraphs,
    ];
}

/// Inspect a story and return every defect tag that applies.
pub fn detect(title: &str, text: &str) -> BTreeSet<DefectTag> {
    let mut tags = BTreeSet::new();
    let char_count = text.chars().count();

    if title_repeated(title, text) {
        tags.insert(DefectTag::TitleRepeated);
    }
    if text.contains("\n\n\n") || text.contains("   ") {
        tags.insert(DefectTag::ExcessiveWhitespace);
    }
    if text.contains("http://") || text.contains("https://") || text.contains(SOURCE_DOMAIN) {
        tags.insert(DefectTag::ContainsUrl);
    }
    if text.contains('\u{FFFC}') || text.contains('\0') {
        tags.insert(DefectTag::FormattingArtifact);
    }
    if char_count < MIN_STORY_CHARS {
        tags.insert(DefectTag::TooShort);
    }
    if char_count > MAX_STORY_CHARS {
        tags.insert(DefectTag::TooLong);
    }
    if has_duplicate_paragraphs(text) {
        tags.insert(DefectTag::DuplicateParagraphs);
    }

    tags
}

/// True if `title` occurs again past the leading-title window.
/// The window is `title` length + slack, counted in chars; texts shorter
/// than the window cannot repeat.
fn title_repeated(title: &str, text: &str) -> bool {
    if title.is_empty() {
        return false;
    }
    let skip = title.chars().count() + TITLE_REPEAT_SLACK;
    match text.char_indices().nth(skip) {
        Some((byte_offset, _)) => text[byte_offset..].contains(title),
        None => false,
    }
}

/// Exact-match duplicate check over blank-line separated paragraphs.
fn has_duplicate_paragraphs(text: &str) -> bool {
    let mut seen = HashSet::new();
    text.split("\n\n").any(|para| !seen.insert(para))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_is_total() {
        // Empty text is below the minimum length, nothing else applies
        let tags = detect("", "");
        assert_eq!(tags.len(), 1);
        assert!(tags.contains(&DefectTag::TooShort));
    }

    #[test]
    fn title_repeat_past_window() {
        let title = "The Fox";
        let text = format!("The Fox\n\n{}The Fox", "a".repeat(60));
        let tags = detect(title, &text);
        assert!(tags.contains(&DefectTag::TitleRepeated));
    }

    #[test]
    fn title_repeat_inside_window_ignored() {
        // Second occurrence sits before the slack window ends
        let title = "The Fox";
        let text = "The Fox The Fox again";
        assert!(!detect(title, text).contains(&DefectTag::TitleRepeated));
    }

    #[test]
    fn short_text_never_faults_title_check() {
        let tags = detect("A Very Long Story Title", "tiny");
        assert!(!tags.contains(&DefectTag::TitleRepeated));
        assert!(tags.contains(&DefectTag::TooShort));
    }

    #[test]
    fn whitespace_runs() {
        assert!(detect("", "a\n\n\nb").contains(&DefectTag::ExcessiveWhitespace));
        assert!(detect("", "a   b").contains(&DefectTag::ExcessiveWhitespace));
        assert!(!detect("", "a\n\nb  c").contains(&DefectTag::ExcessiveWhitespace));
    }

    #[test]
    fn urls_and_source_domain() {
        assert!(detect("", "read http://x.test/page now").contains(&DefectTag::ContainsUrl));
        assert!(detect("", "read https://x.test now").contains(&DefectTag::ContainsUrl));
        assert!(detect("", "from fairytalez.com archive").contains(&DefectTag::ContainsUrl));
    }

    #[test]
    fn formatting_artifacts() {
        assert!(detect("", "once\u{FFFC}upon").contains(&DefectTag::FormattingArtifact));
        assert!(detect("", "once\0upon").contains(&DefectTag::FormattingArtifact));
    }

    #[test]
    fn length_bounds_are_char_counts() {
        let tags = detect("", &"é".repeat(99));
        assert!(tags.contains(&DefectTag::TooShort));
        let tags = detect("", &"é".repeat(100));
        assert!(!tags.contains(&DefectTag::TooShort));
        let tags = detect("", &"a".repeat(50_001));
        assert!(tags.contains(&DefectTag::TooLong));
    }

    #[test]
    fn duplicate_paragraphs_exact_match() {
        let text = "Para one\n\nPara two\n\nPara one";
        assert!(detect("", text).contains(&DefectTag::DuplicateParagraphs));
        // Case differences are distinct paragraphs
        let text = "Para one\n\npara one";
        assert!(!detect("", text).contains(&DefectTag::DuplicateParagraphs));
    }

    #[test]
    fn clean_story_has_no_tags() {
        let text = "Once upon a time a small fox lived at the edge of a quiet forest. \
                    Every morning she trotted down to the river to watch the fish.";
        assert!(detect("The Fox", text).is_empty());
    }
}
