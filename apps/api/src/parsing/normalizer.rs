//! Output normalization for the Section Normalizer.
//!
//! The model is asked for JSON matching the schema, but nothing here assumes it
//! complied. Every field is coerced or defaulted; nothing in this file can fail.
//! Normalizing an already-normalized record is a no-op.

use std::collections::{BTreeMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::sections::{
    CanonicalRecord, Contact, JobEntry, MAX_DETAILS_PER_JOB, MAX_DETAIL_CHARS, MAX_SKILLS,
};

static LEADING_BULLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\s\-–—•·*▪●◦‣>]+").expect("bullet glyph pattern is valid"));

/// Coerces arbitrary model output into a `CanonicalRecord`.
pub fn normalize_sections(raw: &Value) -> CanonicalRecord {
    let empty = serde_json::Map::new();
    let obj = raw.as_object().unwrap_or(&empty);

    let mut skills = string_list(obj.get("skills"));
    skills.truncate(MAX_SKILLS);

    CanonicalRecord {
        contact: normalize_contact(obj.get("contact")),
        education: text_block(obj.get("education")),
        skills,
        skills_by_category: normalize_categories(obj.get("skillsByCategory")),
        experience: normalize_experience(obj.get("experience")),
        references: text_block(obj.get("references")),
    }
}

fn normalize_contact(value: Option<&Value>) -> Contact {
    let Some(obj) = value.and_then(Value::as_object) else {
        return Contact::default();
    };
    let field = |key: &str| opt_string(obj.get(key));
    Contact {
        name: field("name"),
        email: field("email"),
        phone: field("phone"),
        linkedin: field("linkedin"),
        github: field("github"),
        website: field("website"),
        location: field("location"),
    }
}

fn normalize_categories(value: Option<&Value>) -> BTreeMap<String, Vec<String>> {
    let Some(obj) = value.and_then(Value::as_object) else {
        return BTreeMap::new();
    };
    obj.iter()
        .filter_map(|(category, items)| {
            let category = category.trim();
            let mut items = string_list(Some(items));
            items.truncate(MAX_SKILLS);
            (!category.is_empty() && !items.is_empty()).then(|| (category.to_string(), items))
        })
        .collect()
}

fn normalize_experience(value: Option<&Value>) -> Vec<JobEntry> {
    let Some(jobs) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    jobs.iter()
        .filter_map(Value::as_object)
        .map(|job| {
            let field = |key: &str| opt_string(job.get(key));
            JobEntry {
                title: field("title"),
                company: field("company"),
                location: field("location"),
                start: field("start"),
                end: field("end"),
                details: normalize_details(job.get("details")),
            }
        })
        .filter(|job| *job != JobEntry::default())
        .collect()
}

fn normalize_details(value: Option<&Value>) -> Vec<String> {
    let Some(items) = value.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(scalar_to_string)
        .map(|d| clean_detail(&d))
        .filter(|d| !d.is_empty())
        .take(MAX_DETAILS_PER_JOB)
        .collect()
}

/// Strips bullet glyphs, trims, and truncates to `MAX_DETAIL_CHARS` with an ellipsis.
pub fn clean_detail(detail: &str) -> String {
    let stripped = LEADING_BULLET.replace(detail, "");
    let trimmed = stripped.trim();
    if trimmed.chars().count() <= MAX_DETAIL_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_DETAIL_CHARS - 1).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push('…');
    truncated
}

/// Trimmed, non-empty, order-preserving, exact-match deduplicated strings.
/// Accepts an array of scalars or a comma-separated string.
fn string_list(value: Option<&Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
        Some(Value::String(s)) => s.split(',').map(String::from).collect(),
        _ => Vec::new(),
    };
    dedup_trimmed(items)
}

/// Order-preserving dedup of trimmed, non-empty strings.
pub fn dedup_trimmed<I>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

fn text_block(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(scalar_to_string)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn opt_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(scalar_to_string)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
