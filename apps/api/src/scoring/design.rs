//! Design score: how readable the resume layout is, judged from text alone.
//!
//! design = round(0.40·density + 0.25·headings + 0.25·bullet + 0.10·caps)

use serde::{Deserialize, Serialize};

use crate::models::analysis::DesignBreakdown;
use crate::models::sections::CanonicalRecord;
use crate::parsing::headings::detect_sections;
use crate::scoring::objective::BULLET_LINE;
use crate::scoring::{band_at_least, band_at_most, percent};

/// (max average chars per line, score).
pub const DENSITY_BANDS: &[(f64, f64)] = &[(40.0, 100.0), (70.0, 85.0), (90.0, 70.0), (110.0, 55.0)];
pub const DENSITY_SCORE_OVER: f64 = 40.0;

/// Distinct headings needed for a full headings score.
pub const HEADINGS_FOR_FULL_SCORE: usize = 5;

/// Jobs need at least this many details to count as well-bulleted.
pub const MIN_DETAILS_PER_JOB: usize = 3;

/// (min bullet-line share, score), checked in order.
pub const BULLET_SHARE_BANDS: &[(f64, f64)] = &[(0.25, 100.0), (0.15, 85.0), (0.07, 70.0)];
pub const BULLET_SHARE_SCORE_UNDER: f64 = 55.0;

/// (max all-caps token ratio, score).
pub const CAPS_BANDS: &[(f64, f64)] = &[(0.02, 100.0), (0.04, 85.0), (0.08, 70.0)];
pub const CAPS_SCORE_OVER: f64 = 55.0;

/// Tokens shorter than this never count as shouting.
const MIN_CAPS_TOKEN_CHARS: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesignWeights {
    pub density: f64,
    pub headings: f64,
    pub bullet: f64,
    pub caps: f64,
}

impl Default for DesignWeights {
    fn default() -> Self {
        Self {
            density: 0.40,
            headings: 0.25,
            bullet: 0.25,
            caps: 0.10,
        }
    }
}

pub fn density_score(text: &str) -> f64 {
    let lines: Vec<&str> = text.split('\n').collect();
    let chars: usize = lines.iter().map(|l| l.chars().count()).sum();
    let avg = chars as f64 / lines.len().max(1) as f64;
    band_at_most(avg, DENSITY_BANDS, DENSITY_SCORE_OVER)
}

pub fn headings_score(text: &str, record: &CanonicalRecord) -> f64 {
    let found = detect_sections(text, record).len().min(HEADINGS_FOR_FULL_SCORE);
    percent(found, HEADINGS_FOR_FULL_SCORE)
}

pub fn bullet_score(text: &str, record: &CanonicalRecord) -> f64 {
    if record.has_experience() {
        let bulleted = record
            .experience
            .iter()
            .filter(|job| job.details.len() >= MIN_DETAILS_PER_JOB)
            .count();
        return percent(bulleted, record.experience.len());
    }

    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return BULLET_SHARE_SCORE_UNDER;
    }
    let bullets = lines.iter().filter(|l| BULLET_LINE.is_match(l)).count();
    let share = bullets as f64 / lines.len() as f64;
    band_at_least(share, BULLET_SHARE_BANDS, BULLET_SHARE_SCORE_UNDER)
}

fn is_caps_token(token: &str) -> bool {
    token.chars().count() >= MIN_CAPS_TOKEN_CHARS
        && token.chars().any(char::is_uppercase)
        && !token.chars().any(char::is_lowercase)
}

pub fn caps_score(text: &str) -> f64 {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.is_empty() {
        return band_at_most(0.0, CAPS_BANDS, CAPS_SCORE_OVER);
    }
    let caps = tokens.iter().filter(|t| is_caps_token(t)).count();
    band_at_most(caps as f64 / tokens.len() as f64, CAPS_BANDS, CAPS_SCORE_OVER)
}

pub fn compute_design_breakdown(text: &str, record: &CanonicalRecord) -> DesignBreakdown {
    let text = text.trim();
    DesignBreakdown {
        density_score: density_score(text),
        headings_score: headings_score(text, record),
        bullet_score: bullet_score(text, record),
        caps_score: caps_score(text),
    }
}

pub fn weigh_design(breakdown: &DesignBreakdown, weights: &DesignWeights) -> u8 {
    let total = weights.density * breakdown.density_score
        + weights.headings * breakdown.headings_score
        + weights.bullet * breakdown.bullet_score
        + weights.caps * breakdown.caps_score;
    total.round().clamp(0.0, 100.0) as u8
}
