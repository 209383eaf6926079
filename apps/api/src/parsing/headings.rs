//! Heading table: the one place that knows which words name which resume section.
//!
//! Used by the normalizer prompt (synonym hints) and by the deterministic scorer
//! (required-section and headings detection), so both agree on what a heading is.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::models::sections::CanonicalRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKey {
    Contact,
    Summary,
    Objective,
    Experience,
    Education,
    Skills,
    Projects,
    Certifications,
    References,
}

impl SectionKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKey::Contact => "contact",
            SectionKey::Summary => "summary",
            SectionKey::Objective => "objective",
            SectionKey::Experience => "experience",
            SectionKey::Education => "education",
            SectionKey::Skills => "skills",
            SectionKey::Projects => "projects",
            SectionKey::Certifications => "certifications",
            SectionKey::References => "references",
        }
    }

    /// Whether the section has a dedicated field in `CanonicalRecord`.
    pub fn is_canonical(&self) -> bool {
        matches!(
            self,
            SectionKey::Contact
                | SectionKey::Experience
                | SectionKey::Education
                | SectionKey::Skills
                | SectionKey::References
        )
    }
}

pub struct HeadingRule {
    pub key: SectionKey,
    pub synonyms: &'static [&'static str],
}

/// Recognized section headings, one row per section.
pub const HEADING_TABLE: &[HeadingRule] = &[
    HeadingRule {
        key: SectionKey::Contact,
        synonyms: &["contact", "contact information", "contact details"],
    },
    HeadingRule {
        key: SectionKey::Summary,
        synonyms: &["summary", "professional summary", "about me"],
    },
    HeadingRule {
        key: SectionKey::Objective,
        synonyms: &["objective", "career objective"],
    },
    HeadingRule {
        key: SectionKey::Experience,
        synonyms: &[
            "experience",
            "work experience",
            "professional experience",
            "employment history",
            "work history",
            "employment",
        ],
    },
    HeadingRule {
        key: SectionKey::Education,
        synonyms: &["education", "academic background", "academic history"],
    },
    HeadingRule {
        key: SectionKey::Skills,
        synonyms: &["skills", "technical skills", "core competencies", "competencies"],
    },
    HeadingRule {
        key: SectionKey::Projects,
        synonyms: &["projects", "personal projects"],
    },
    HeadingRule {
        key: SectionKey::Certifications,
        synonyms: &["certifications", "certificates", "licenses"],
    },
    HeadingRule {
        key: SectionKey::References,
        synonyms: &["references", "referees"],
    },
];

/// Case-insensitive whole-word matcher per section, compiled once.
static MATCHERS: Lazy<Vec<(SectionKey, Regex)>> = Lazy::new(|| {
    HEADING_TABLE
        .iter()
        .filter_map(|rule| {
            let alternation = rule
                .synonyms
                .iter()
                .map(|s| regex::escape(s))
                .collect::<Vec<_>>()
                .join("|");
            Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
                .ok()
                .map(|rx| (rule.key, rx))
        })
        .collect()
});

/// True if any synonym of `key` appears as a whole word anywhere in `text`.
pub fn contains_heading(text: &str, key: SectionKey) -> bool {
    MATCHERS
        .iter()
        .find(|(k, _)| *k == key)
        .is_some_and(|(_, rx)| rx.is_match(text))
}

/// Whether the canonical record has content for `key`.
pub fn is_populated(record: &CanonicalRecord, key: SectionKey) -> bool {
    match key {
        SectionKey::Contact => record.has_contact(),
        SectionKey::Experience => record.has_experience(),
        SectionKey::Education => record.has_education(),
        SectionKey::Skills => record.has_skills(),
        SectionKey::References => record.has_references(),
        _ => false,
    }
}

/// A section counts as present when populated in the record or named in the raw text.
pub fn is_present(text: &str, record: &CanonicalRecord, key: SectionKey) -> bool {
    is_populated(record, key) || contains_heading(text, key)
}

/// Distinct sections present, in table order.
pub fn detect_sections(text: &str, record: &CanonicalRecord) -> Vec<SectionKey> {
    HEADING_TABLE
        .iter()
        .map(|rule| rule.key)
        .filter(|key| is_present(text, record, *key))
        .collect()
}

/// Synonym hints for the canonical fields, one line each, for the normalizer prompt.
pub fn synonym_hints() -> String {
    HEADING_TABLE
        .iter()
        .filter(|rule| rule.key.is_canonical())
        .map(|rule| {
            let quoted = rule
                .synonyms
                .iter()
                .map(|s| format!("\"{s}\""))
                .collect::<Vec<_>>()
                .join(", ");
            format!("- {}: headings such as {}", rule.key.as_str(), quoted)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
