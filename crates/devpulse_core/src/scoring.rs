//! Productivity, quality and efficiency scoring.
//!
//! Weights and thresholds are fixed; stored scores are compared across
//! releases.

use crate::types::EfficiencyRating;

/// Productivity in [0, 1].
///
/// `0.4·min(lines/50, 1) + 0.3·min((lines/minutes)/2, 1) + 0.3·min(files/5, 1)`.
/// The rate term is omitted when the duration is not positive or no lines
/// were added.
pub fn productivity_score(lines_added: u64, duration_minutes: f64, files_modified: u64) -> f64 {
    let lines = lines_added as f64;
    let mut score = 0.4 * (lines / 50.0).min(1.0);

    if duration_minutes > 0.0 && lines_added > 0 {
        let per_minute = lines / duration_minutes;
        score += 0.3 * (per_minute / 2.0).min(1.0);
    }

    score += 0.3 * (files_modified as f64 / 5.0).min(1.0);
    clamp(score, 0.0, 1.0)
}

/// Quality in [0, 100]: base 50 plus bonuses for annotations, error handling and comments.
pub fn quality_score(has_type_annotations: bool, has_error_handling: bool, has_comments: bool) -> f64 {
    let mut score: f64 = 50.0;
    if has_type_annotations {
        score += 10.0;
    }
    if has_error_handling {
        score += 15.0;
    }
    if has_comments {
        score += 10.0;
    }
    score.min(100.0)
}

/// Weighted efficiency score from quality, AI share and complexity.
pub fn efficiency_score(quality: f64, ai_probability: f64, complexity: f64) -> f64 {
    let ai_band = if (0.3..=0.8).contains(&ai_probability) {
        30.0
    } else if ai_probability > 0.8 {
        15.0
    } else {
        10.0
    };
    let complexity_band = if complexity < 10.0 {
        20.0
    } else if complexity < 20.0 {
        10.0
    } else {
        0.0
    };
    0.4 * quality + ai_band + complexity_band
}

/// Label for [`efficiency_score`]: 80 and up excellent, 60 good, 40 average.
pub fn efficiency_rating(quality: f64, ai_probability: f64, complexity: f64) -> EfficiencyRating {
    EfficiencyRating::from_score(efficiency_score(quality, ai_probability, complexity))
}

// NaN collapses to the lower bound.
fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value.is_nan() {
        lo
    } else {
        value.clamp(lo, hi)
    }
}

/// Facts the session recommendation rules look at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionFacts {
    pub quality_score: f64,
    pub complexity_delta: i64,
    pub lines_added: u64,
    pub lines_deleted: u64,
    pub failed_files: usize,
    pub commits: usize,
}

type SessionRule = (fn(&SessionFacts) -> bool, &'static str);

const SESSION_RULES: [SessionRule; 5] = [
    (
        |f: &SessionFacts| f.quality_score < 60.0,
        "Add type annotations, error handling and comments to raise code quality.",
    ),
    (
        |f: &SessionFacts| f.complexity_delta > 5,
        "Complexity grew noticeably; consider splitting large functions.",
    ),
    (
        |f: &SessionFacts| f.lines_added > f.lines_deleted.saturating_mul(3),
        "Mostly new code was added; schedule a pass to refactor and remove dead code.",
    ),
    (
        |f: &SessionFacts| f.failed_files > 0,
        "Some file changes could not be analyzed; check that they are tracked text files.",
    ),
    (
        |f: &SessionFacts| f.commits == 0,
        "No commits were made during the session; commit in small, reviewable steps.",
    ),
];

/// Walks the ordered rule table and returns the messages whose rule fires.
pub fn session_recommendations(facts: &SessionFacts) -> Vec<String> {
    SESSION_RULES
        .iter()
        .filter(|(applies, _)| applies(facts))
        .map(|(_, message)| message.to_string())
        .collect()
}
