use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::sections::CanonicalRecord;

/// Lifecycle of an uploaded resume: `uploaded → parsed → analyzed`, with `error`
/// reachable from any in-flight step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Uploaded,
    Parsed,
    Analyzed,
    Error,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Uploaded => "uploaded",
            RecordStatus::Parsed => "parsed",
            RecordStatus::Analyzed => "analyzed",
            RecordStatus::Error => "error",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(RecordStatus::Uploaded),
            "parsed" => Ok(RecordStatus::Parsed),
            "analyzed" => Ok(RecordStatus::Analyzed),
            "error" => Ok(RecordStatus::Error),
            other => Err(format!("unknown record status '{other}'")),
        }
    }
}

/// Metadata about the stored raw file. The bytes live in the `FileStore`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    pub path: String,
    pub content_type: String,
    pub size_bytes: i64,
}

/// The four headline scores, each an integer in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub objective: u8,
    pub design: u8,
    pub subjective: u8,
    pub employer: u8,
}

/// Sub-scores behind the objective score, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectiveBreakdown {
    pub required_score: f64,
    pub achievement_score: f64,
    pub verb_score: f64,
    pub length_score: f64,
}

/// Sub-scores behind the design score, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignBreakdown {
    pub density_score: f64,
    pub headings_score: f64,
    pub bullet_score: f64,
    pub caps_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub objective: ObjectiveBreakdown,
    pub design: DesignBreakdown,
}

/// Model-written feedback. Every list is deduplicated, order-preserving and capped at 8.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub subjective_feedback: Vec<String>,
    pub employer_feedback: Vec<String>,
    pub highlights: Vec<String>,
    pub risks: Vec<String>,
    pub suggestions: Vec<String>,
}

/// Merged output of the deterministic and judgment scorers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub scores: Scores,
    pub breakdown: ScoreBreakdown,
    pub feedback: Feedback,
}

/// The persisted `ai` block of an analyzed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    #[serde(flatten)]
    pub score_set: ScoreSet,
    pub model: String,
    pub updated_at: DateTime<Utc>,
}

/// One uploaded resume and everything the pipeline learned about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub file: FileMeta,
    pub status: RecordStatus,
    /// `None` until the Section Normalizer has succeeded once.
    pub sections: Option<CanonicalRecord>,
    /// Extracted plain text, kept so analysis can re-score without re-reading the file.
    #[serde(skip_serializing)]
    pub raw_text: Option<String>,
    pub ai: Option<AiAnalysis>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Text the scorers work from: stored extraction, else a rendering of the sections.
    pub fn scoring_text(&self) -> String {
        match (&self.raw_text, &self.sections) {
            (Some(text), _) if !text.trim().is_empty() => text.clone(),
            (_, Some(sections)) => sections.to_plain_text(),
            _ => String::new(),
        }
    }
}

/// Everything needed to create a new record in the `uploaded` state.
#[derive(Debug, Clone)]
pub struct NewRecord {
    /// Chosen by the caller so the raw file can be stored under it first.
    pub id: Uuid,
    pub owner_id: String,
    pub file: FileMeta,
}
