//! Post-repair acceptance check.
//!
//! Applied to normalizer output only, never to raw input. Thresholds are
//! behavioral contracts shared with downstream reporting; do not retune.

const MIN_CHARS: usize = 50;
const MIN_WORDS: usize = 20;
const MIN_ALPHA_RATIO: f64 = 0.6;

pub const REASON_TOO_SHORT: &str = "Story too short after cleaning";
pub const REASON_TOO_FEW_WORDS: &str = "Too few words after cleaning";
pub const REASON_NON_ALPHABETIC: &str = "Too many non-alphabetic characters";

/// Accept or reject a cleaned story body. Rules run in order, first
/// failure wins.
pub fn validate(text: &str) -> Result<(), &'static str> {
    let char_count = text.chars().count();
    if char_count < MIN_CHARS {
        return Err(REASON_TOO_SHORT);
    }
    if text.split_whitespace().count() < MIN_WORDS {
        return Err(REASON_TOO_FEW_WORDS);
    }
    let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
    if (alpha as f64) / (char_count as f64) < MIN_ALPHA_RATIO {
        return Err(REASON_NON_ALPHABETIC);
    }
    Ok(())
}

// ── Tests ──
