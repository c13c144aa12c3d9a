//! Analysis report rendering: distributions, defect groupings, synthesis
//! cost estimates. Pure string building; callers decide where it goes.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cleaner::DefectTag;
use crate::db::Story;

pub const STANDARD_RATE_PER_MILLION: f64 = 4.0;
pub const PREMIUM_RATE_PER_MILLION: f64 = 16.0;

/// Characters of premium synthesis covered by the free credit budget.
const CREDIT_CHARS: f64 = 75_000_000.0;

const RULE_WIDTH: usize = 70;
const MAX_LISTED: usize = 20;

/// Detector output for one story, kept alongside the row fields the report
/// needs.
pub struct StoryFindings {
    pub story_id: String,
    pub title: String,
    pub grade_level: String,
    pub tags: BTreeSet<DefectTag>,
}

pub fn tier_cost(chars: usize, rate_per_million: f64) -> f64 {
    chars as f64 / 1_000_000.0 * rate_per_million
}

fn rule(out: &mut String, heading: &str) {
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
    let _ = writeln!(out, "{}", heading);
    let _ = writeln!(out, "{}", "=".repeat(RULE_WIDTH));
}

/// Render the full analysis over a batch of stories and their detector
/// findings (`findings` holds only stories with at least one tag).
pub fn render(stories: &[Story], findings: &[StoryFindings]) -> String {
    let mut out = String::new();

    // Grade distribution
    let mut by_grade: BTreeMap<&str, usize> = BTreeMap::new();
    for s in stories {
        *by_grade.entry(s.grade_level.as_str()).or_default() += 1;
    }
    rule(&mut out, "GRADE LEVEL DISTRIBUTION");
    for (grade, count) in &by_grade {
        let _ = writeln!(out, "{:<10} : {:>4} stories", grade, count);
    }
    let _ = writeln!(out, "\n{:<10} : {:>4} stories", "Total K-5", stories.len());

    // Region distribution, most common first
    let mut by_region: BTreeMap<&str, usize> = BTreeMap::new();
    for s in stories {
        let region = if s.region.is_empty() { "Unknown" } else { &s.region };
        *by_region.entry(region).or_default() += 1;
    }
    let mut regions: Vec<_> = by_region.into_iter().collect();
    regions.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    let _ = writeln!(out);
    rule(&mut out, "REGION DISTRIBUTION");
    for (region, count) in regions {
        let _ = writeln!(out, "{:<20} : {:>4} stories", region, count);
    }

    // Aggregate counts per defect tag
    let _ = writeln!(out);
    rule(&mut out, "DEFECT SUMMARY");
    for tag in DefectTag::ALL {
        let count = findings.iter().filter(|f| f.tags.contains(tag)).count();
        let _ = writeln!(out, "{:<45} : {:>4} stories", tag.label(), count);
    }

    // Per-story listing, capped
    let _ = writeln!(out);
    rule(&mut out, &format!("STORIES WITH ISSUES: {}", findings.len()));
    if !findings.is_empty() {
        let _ = writeln!(
            out,
            "\nShowing first {} stories with issues:\n",
            findings.len().min(MAX_LISTED)
        );
        for (i, f) in findings.iter().take(MAX_LISTED).enumerate() {
            let _ = writeln!(
                out,
                "{}. [{}] {} (id: {})",
                i + 1,
                f.grade_level,
                truncate(&f.title, 50),
                f.story_id
            );
            for tag in &f.tags {
                let _ = writeln!(out, "   - {}", tag.label());
            }
        }
    }

    // Synthesis cost estimates
    let total_chars: usize = stories.iter().map(|s| s.text.chars().count()).sum();
    let total_words: usize = stories.iter().map(|s| s.text.split_whitespace().count()).sum();
    let _ = writeln!(out);
    rule(&mut out, "TEXT-TO-SPEECH ESTIMATES");
    let _ = writeln!(out, "Total characters: {}", total_chars);
    let _ = writeln!(out, "Total words:      {}", total_words);
    let _ = writeln!(out, "\nEstimated synthesis cost:");
    let _ = writeln!(
        out,
        "  Standard voices: ${:.2}  (${}/1M chars)",
        tier_cost(total_chars, STANDARD_RATE_PER_MILLION),
        STANDARD_RATE_PER_MILLION
    );
    let _ = writeln!(
        out,
        "  Premium voices:  ${:.2}  (${}/1M chars, Neural2/Studio/Chirp)",
        tier_cost(total_chars, PREMIUM_RATE_PER_MILLION),
        PREMIUM_RATE_PER_MILLION
    );
    if total_chars > 0 {
        let stories_on_credits = (CREDIT_CHARS / total_chars as f64) * stories.len() as f64;
        let _ = writeln!(
            out,
            "With $300 credits: ~{} stories at current average length",
            stories_on_credits as usize
        );
    }

    out
}

/// Write the report to disk with a generation timestamp header.
pub fn save(path: &Path, report: &str) -> Result<()> {
    let stamped = format!(
        "Generated: {}\n\n{}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        report
    );
    std::fs::write(path, stamped)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::detect;

    fn story(id: &str, grade: &str, region: &str, text: &str) -> Story {
        Story {
            story_id: id.to_string(),
            title: format!("Story {}", id),
            text: text.to_string(),
            grade_level: grade.to_string(),
            region: region.to_string(),
            audio_url: None,
        }
    }

    fn findings_for(stories: &[Story]) -> Vec<StoryFindings> {
        stories
            .iter()
            .filter_map(|s| {
                let tags = detect(&s.title, &s.text);
                if tags.is_empty() {
                    None
                } else {
                    Some(StoryFindings {
                        story_id: s.story_id.clone(),
                        title: s.title.clone(),
                        grade_level: s.grade_level.clone(),
                        tags,
                    })
                }
            })
            .collect()
    }

    #[test]
    fn report_groups_by_grade_region_and_tag() {
        let long_clean = "word ".repeat(40);
        let stories = vec![
            story("s1", "K-1", "Europe", "short http://x.test"),
            story("s2", "K-1", "Asia", &long_clean),
            story("s3", "2-3", "Europe", &format!("{}   extra", long_clean)),
        ];
        let findings = findings_for(&stories);
        let out = render(&stories, &findings);

        assert!(out.contains("GRADE LEVEL DISTRIBUTION"));
        assert!(out.contains("K-1        :    2 stories"));
        assert!(out.contains("Europe               :    2 stories"));
        assert!(out.contains("STORIES WITH ISSUES: 2"));
        assert!(out.contains("Contains URLs"));
        assert!(out.contains("Excessive whitespace"));
        assert!(out.contains("TEXT-TO-SPEECH ESTIMATES"));
    }

    #[test]
    fn cost_scales_with_characters() {
        assert_eq!(tier_cost(1_000_000, STANDARD_RATE_PER_MILLION), 4.0);
        assert_eq!(tier_cost(500_000, PREMIUM_RATE_PER_MILLION), 8.0);
    }

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a very long title here", 6), "a very...");
    }

    #[test]
    fn save_stamps_the_report() {
        let path = std::env::temp_dir().join(format!(
            "story_report_test_{}.txt",
            std::process::id()
        ));
        save(&path, "body line").unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("Generated: "));
        assert!(written.ends_with("body line"));
        std::fs::remove_file(&path).unwrap();
    }
}
