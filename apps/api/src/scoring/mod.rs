//! Scoring: four scores per resume.
//!
//! objective and design are pure functions of the text and canonical record
//! (no I/O, same input gives the same output). subjective and employer come from
//! a single budgeted judgment call; see `judgment`.

pub mod design;
pub mod judgment;
pub mod objective;
pub mod prompts;

use serde::{Deserialize, Serialize};

use crate::models::analysis::{ScoreBreakdown, ScoreSet, Scores};
use crate::models::sections::CanonicalRecord;
use crate::scoring::design::{compute_design_breakdown, weigh_design, DesignWeights};
use crate::scoring::judgment::JudgmentOutcome;
use crate::scoring::objective::{compute_objective_breakdown, weigh_objective, ObjectiveWeights};

/// `100 · n / d`, clamped to [0, 100]; 0 when `d` is 0.
pub fn percent(n: usize, d: usize) -> f64 {
    if d == 0 {
        return 0.0;
    }
    (100.0 * n as f64 / d as f64).clamp(0.0, 100.0)
}

/// Score of the first band whose upper bound is >= `value`.
pub(crate) fn band_at_most(value: f64, bands: &[(f64, f64)], over: f64) -> f64 {
    bands
        .iter()
        .find(|(max, _)| value <= *max)
        .map_or(over, |(_, score)| *score)
}

/// Score of the first band whose lower bound is <= `value`.
pub(crate) fn band_at_least(value: f64, bands: &[(f64, f64)], under: f64) -> f64 {
    bands
        .iter()
        .find(|(min, _)| value >= *min)
        .map_or(under, |(_, score)| *score)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub objective: ObjectiveWeights,
    pub design: DesignWeights,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeterministicScores {
    pub objective: u8,
    pub design: u8,
    pub breakdown: ScoreBreakdown,
}

pub fn score_deterministic(
    text: &str,
    record: &CanonicalRecord,
    weights: &ScoringWeights,
) -> DeterministicScores {
    let objective = compute_objective_breakdown(text, record);
    let design = compute_design_breakdown(text, record);
    DeterministicScores {
        objective: weigh_objective(&objective, &weights.objective),
        design: weigh_design(&design, &weights.design),
        breakdown: ScoreBreakdown { objective, design },
    }
}

/// Combines both scorers into the persisted score set.
pub fn merge_scores(deterministic: DeterministicScores, judgment: JudgmentOutcome) -> ScoreSet {
    ScoreSet {
        scores: Scores {
            objective: deterministic.objective,
            design: deterministic.design,
            subjective: judgment.subjective,
            employer: judgment.employer,
        },
        breakdown: deterministic.breakdown,
        feedback: judgment.feedback,
    }
}
