use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of entries kept in `CanonicalRecord::skills`.
pub const MAX_SKILLS: usize = 64;
/// Maximum number of detail bullets kept per job.
pub const MAX_DETAILS_PER_JOB: usize = 16;
/// Maximum characters per detail bullet (ellipsis included).
pub const MAX_DETAIL_CHARS: usize = 300;

/// Contact block. Every field is optional; unknown values serialize as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        [
            &self.name,
            &self.email,
            &self.phone,
            &self.linkedin,
            &self.github,
            &self.website,
            &self.location,
        ]
        .iter()
        .all(|f| f.is_none())
    }
}

/// A single position in the experience section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub details: Vec<String>,
}

/// The structured resume.
///
/// INVARIANT: every top-level key is always present. "Unknown" is the empty string,
/// empty array or empty object, never `null`. Build instances through
/// `parsing::normalizer::normalize_sections` to get the caps and dedup guarantees.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalRecord {
    pub contact: Contact,
    pub education: String,
    pub skills: Vec<String>,
    pub skills_by_category: BTreeMap<String, Vec<String>>,
    pub experience: Vec<JobEntry>,
    pub references: String,
}

impl CanonicalRecord {
    pub fn has_experience(&self) -> bool {
        !self.experience.is_empty()
    }

    pub fn has_education(&self) -> bool {
        !self.education.trim().is_empty()
    }

    pub fn has_skills(&self) -> bool {
        !self.skills.is_empty() || self.skills_by_category.values().any(|v| !v.is_empty())
    }

    pub fn has_contact(&self) -> bool {
        !self.contact.is_empty()
    }

    pub fn has_references(&self) -> bool {
        !self.references.trim().is_empty()
    }

    /// All experience detail bullets in document order.
    pub fn detail_lines(&self) -> impl Iterator<Item = &str> {
        self.experience
            .iter()
            .flat_map(|job| job.details.iter().map(String::as_str))
    }

    /// Plain-text rendering used when the extracted raw text is unavailable.
    pub fn to_plain_text(&self) -> String {
        let mut parts = Vec::new();
        if self.has_contact() {
            if let Ok(contact) = serde_json::to_string(&self.contact) {
                parts.push(contact);
            }
        }
        if self.has_education() {
            parts.push(self.education.clone());
        }
        if !self.skills.is_empty() {
            parts.push(self.skills.join(", "));
        }
        if self.has_experience() {
            let jobs = self
                .experience
                .iter()
                .map(|job| {
                    [&job.title, &job.company, &job.location, &job.start, &job.end]
                        .into_iter()
                        .flatten()
                        .cloned()
                        .chain(job.details.iter().cloned())
                        .collect::<Vec<_>>()
                        .join("\n")
                })
                .collect::<Vec<_>>()
                .join("\n");
            parts.push(jobs);
        }
        if self.has_references() {
            parts.push(self.references.clone());
        }
        parts.join("\n\n")
    }
}
