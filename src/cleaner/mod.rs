pub mod detect;
pub mod normalize;
pub mod validate;

pub use detect::{detect, DefectTag};
pub use normalize::normalize;
pub use validate::validate;

/// Result of running the repair pipeline on one story.
///
/// Callers must branch on all three: `Unchanged` means nothing to persist,
/// `Rejected` means the repaired text is unsafe to use and the original row
/// must be left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleaningOutcome {
    Cleaned(String),
    Unchanged,
    Rejected(&'static str),
}

/// Normalize a story body and decide whether the result is usable.
pub fn clean_story(title: &str, text: &str) -> CleaningOutcome {
    let cleaned = normalize(title, text);
    if cleaned == text {
        return CleaningOutcome::Unchanged;
    }
    match validate(&cleaned) {
        Ok(()) => CleaningOutcome::Cleaned(cleaned),
        Err(reason) => CleaningOutcome::Rejected(reason),
    }
}

// ── Tests ──
