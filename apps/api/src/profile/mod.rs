//! User profile: first-sign-in bootstrap and the targeting fields used by judgment.
//!
//! Role and balance are never client-writable here; balances move only through
//! the ledger (and external billing credits).

pub mod handlers;

use serde::Deserialize;

use crate::models::user::ProfileTargeting;
use crate::parsing::normalizer::dedup_trimmed;

/// A list field sent either as a JSON array or as one comma-separated string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    List(Vec<String>),
    Csv(String),
}

impl StringList {
    pub fn into_items(self) -> Vec<String> {
        match self {
            StringList::List(items) => dedup_trimmed(items),
            StringList::Csv(s) => dedup_trimmed(s.split(',').map(String::from)),
        }
    }
}

/// Partial update of the targeting fields. Absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetingPatch {
    pub target_role: Option<String>,
    pub seniority: Option<String>,
    pub industries: Option<StringList>,
    pub must_have_keywords: Option<StringList>,
    pub nice_to_have_keywords: Option<StringList>,
    pub locations: Option<StringList>,
    pub notes: Option<String>,
}

impl TargetingPatch {
    pub fn apply(self, current: &ProfileTargeting) -> ProfileTargeting {
        let text = |new: Option<String>, old: &str| {
            new.map(|s| s.trim().to_string())
                .unwrap_or_else(|| old.to_string())
        };
        let list = |new: Option<StringList>, old: &[String]| {
            new.map(StringList::into_items)
                .unwrap_or_else(|| old.to_vec())
        };
        ProfileTargeting {
            target_role: text(self.target_role, &current.target_role),
            seniority: text(self.seniority, &current.seniority),
            industries: list(self.industries, &current.industries),
            must_have_keywords: list(self.must_have_keywords, &current.must_have_keywords),
            nice_to_have_keywords: list(self.nice_to_have_keywords, &current.nice_to_have_keywords),
            locations: list(self.locations, &current.locations),
            notes: text(self.notes, &current.notes),
        }
    }
}
