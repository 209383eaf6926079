//! Objective score: structural completeness of the resume.
//!
//! objective = round(0.35·required + 0.35·achievement + 0.20·verb + 0.10·length)

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::analysis::ObjectiveBreakdown;
use crate::models::sections::CanonicalRecord;
use crate::parsing::headings::{is_present, SectionKey};
use crate::scoring::{band_at_most, percent};

/// Sections every resume is expected to have.
pub const REQUIRED_SECTIONS: &[SectionKey] = &[
    SectionKey::Experience,
    SectionKey::Education,
    SectionKey::Skills,
];

/// First words that count as strong action verbs (lower-case).
pub const STRONG_VERBS: &[&str] = &[
    "built",
    "shipped",
    "improved",
    "increased",
    "reduced",
    "led",
    "designed",
    "implemented",
    "migrated",
    "optimized",
    "automated",
    "launched",
    "developed",
    "delivered",
    "created",
    "managed",
    "architected",
    "streamlined",
    "established",
    "spearheaded",
];

/// Verb score used when there are no bullet lines to judge.
pub const VERB_SCORE_WITHOUT_BULLETS: f64 = 50.0;

/// (max word count, score). Above the last band: `LENGTH_SCORE_OVER`.
pub const LENGTH_BANDS: &[(f64, f64)] = &[(100.0, 40.0), (350.0, 100.0), (800.0, 70.0)];
pub const LENGTH_SCORE_OVER: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveWeights {
    pub required: f64,
    pub achievement: f64,
    pub verb: f64,
    pub length: f64,
}

impl Default for ObjectiveWeights {
    fn default() -> Self {
        Self {
            required: 0.35,
            achievement: 0.35,
            verb: 0.20,
            length: 0.10,
        }
    }
}

pub(crate) static BULLET_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*[-–—•·*]\s+").expect("bullet line pattern is valid"));

/// Numbers, percentages and currency amounts.
static NUMERIC_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+(?:\.\d+)?%?|[$€£]\s?\d[\d,.]*").expect("numeric token pattern is valid")
});

/// Bullet-like lines: canonical experience details when present, otherwise raw lines
/// that start with a bullet glyph (glyph removed).
pub fn bullet_lines(text: &str, record: &CanonicalRecord) -> Vec<String> {
    let details: Vec<String> = record.detail_lines().map(String::from).collect();
    if !details.is_empty() {
        return details;
    }
    text.lines()
        .filter(|line| BULLET_LINE.is_match(line))
        .map(|line| BULLET_LINE.replace(line, "").trim().to_string())
        .collect()
}

pub fn has_numeric_token(line: &str) -> bool {
    NUMERIC_TOKEN.is_match(line)
}

/// Lower-cased first word with surrounding punctuation removed.
fn first_word(line: &str) -> Option<String> {
    line.split_whitespace().next().map(|w| {
        w.chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase()
    })
}

pub fn starts_with_strong_verb(line: &str) -> bool {
    first_word(line).is_some_and(|w| STRONG_VERBS.contains(&w.as_str()))
}

pub fn length_score(word_count: usize) -> f64 {
    band_at_most(word_count as f64, LENGTH_BANDS, LENGTH_SCORE_OVER)
}

pub fn compute_objective_breakdown(text: &str, record: &CanonicalRecord) -> ObjectiveBreakdown {
    let text = text.trim();

    let present = REQUIRED_SECTIONS
        .iter()
        .filter(|key| is_present(text, record, **key))
        .count();
    let required_score = percent(present, REQUIRED_SECTIONS.len());

    let bullets = bullet_lines(text, record);
    let numeric = bullets.iter().filter(|b| has_numeric_token(b)).count();
    let achievement_score = percent(numeric, bullets.len());

    let verb_score = if bullets.is_empty() {
        VERB_SCORE_WITHOUT_BULLETS
    } else {
        let strong = bullets.iter().filter(|b| starts_with_strong_verb(b)).count();
        percent(strong, bullets.len())
    };

    ObjectiveBreakdown {
        required_score,
        achievement_score,
        verb_score,
        length_score: length_score(text.split_whitespace().count()),
    }
}

pub fn weigh_objective(breakdown: &ObjectiveBreakdown, weights: &ObjectiveWeights) -> u8 {
    let total = weights.required * breakdown.required_score
        + weights.achievement * breakdown.achievement_score
        + weights.verb * breakdown.verb_score
        + weights.length * breakdown.length_score;
    total.round().clamp(0.0, 100.0) as u8
}
