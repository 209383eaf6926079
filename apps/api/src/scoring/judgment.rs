//! Judgment Scorer: subjective and employer scores from one LLM call.
//!
//! The raw text is cut so the whole prompt fits the model's prompt budget;
//! sections and profile are always sent in full. The reply is trusted for
//! nothing: scores are coerced and clamped, lists cleaned, and anything
//! missing falls back to neutral defaults. Only a transport failure errors.

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::llm_client::prompts::{fill_template, untrusted_block, UNTRUSTED_DATA_RULE};
use crate::llm_client::{parse_json_object, CompletionClient, CompletionRequest};
use crate::models::analysis::Feedback;
use crate::models::sections::CanonicalRecord;
use crate::models::user::ProfileTargeting;
use crate::parsing::normalizer::dedup_trimmed;
use crate::parsing::truncate_chars;
use crate::scoring::prompts::{
    JUDGMENT_EXAMPLE, JUDGMENT_PROMPT_TEMPLATE, JUDGMENT_SCHEMA, JUDGMENT_SYSTEM,
    JUDGMENT_TEMPERATURE,
};

/// Score used when the model omits a score or returns something non-numeric.
pub const FALLBACK_SCORE: u8 = 70;

/// Cap on every feedback list.
pub const MAX_FEEDBACK_ITEMS: usize = 8;

/// Prompt sizing, in estimated tokens (chars / `chars_per_token`, rounded up).
#[derive(Debug, Clone, Copy)]
pub struct JudgmentBudget {
    pub prompt_tokens: usize,
    /// Floor on the raw-text allowance, however large the fixed overhead is.
    pub min_text_tokens: usize,
    pub chars_per_token: usize,
}

impl Default for JudgmentBudget {
    fn default() -> Self {
        Self {
            prompt_tokens: 7000,
            min_text_tokens: 500,
            chars_per_token: 4,
        }
    }
}

impl JudgmentBudget {
    pub fn estimate_tokens(&self, chars: usize) -> usize {
        chars.div_ceil(self.chars_per_token.max(1))
    }

    /// Characters of raw text allowed next to `overhead_chars` of fixed prompt.
    pub fn text_allowance(&self, overhead_chars: usize) -> usize {
        let remaining = self
            .prompt_tokens
            .saturating_sub(self.estimate_tokens(overhead_chars))
            .max(self.min_text_tokens);
        remaining * self.chars_per_token
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JudgmentOutcome {
    pub subjective: u8,
    pub employer: u8,
    pub feedback: Feedback,
}

impl Default for JudgmentOutcome {
    fn default() -> Self {
        Self {
            subjective: FALLBACK_SCORE,
            employer: FALLBACK_SCORE,
            feedback: Feedback::default(),
        }
    }
}

fn profile_json(targeting: &ProfileTargeting) -> Value {
    json!({
        "role": targeting.target_role,
        "seniority": targeting.seniority,
        "industries": targeting.industries,
        "mustHaveKeywords": targeting.must_have_keywords,
        "niceToHaveKeywords": targeting.nice_to_have_keywords,
        "locations": targeting.locations,
        "notes": targeting.notes,
    })
}

fn render_prompt(sections_json: &str, profile_json: &str, raw_text: &str) -> String {
    let profile_block = untrusted_block("USER_PROFILE", profile_json);
    let sections_block = untrusted_block("RESUME_SECTIONS", sections_json);
    let raw_text_block = untrusted_block("RAW_TEXT", raw_text);
    fill_template(
        JUDGMENT_PROMPT_TEMPLATE,
        &[
            ("schema", JUDGMENT_SCHEMA),
            ("example", JUDGMENT_EXAMPLE),
            ("untrusted_rule", UNTRUSTED_DATA_RULE),
            ("profile_block", &profile_block),
            ("sections_block", &sections_block),
            ("raw_text_block", &raw_text_block),
        ],
    )
}

/// Builds the judgment prompt with the raw text cut to fit `budget`.
pub fn build_judgment_prompt(
    raw_text: &str,
    sections: &CanonicalRecord,
    targeting: &ProfileTargeting,
    budget: &JudgmentBudget,
) -> String {
    let sections_json = serde_json::to_string(sections).unwrap_or_else(|_| "{}".to_string());
    let profile_json = profile_json(targeting).to_string();

    let overhead = render_prompt(&sections_json, &profile_json, "").chars().count()
        + JUDGMENT_SYSTEM.chars().count();
    let allowance = budget.text_allowance(overhead);
    let text = truncate_chars(raw_text, allowance);
    if text.len() < raw_text.len() {
        info!(
            "Raw text cut to {allowance} chars for judgment (fixed overhead ~{} tokens)",
            budget.estimate_tokens(overhead)
        );
    }

    render_prompt(&sections_json, &profile_json, text)
}

/// Numbers or numeric strings, rounded and clamped to [0, 100].
fn coerce_score(value: Option<&Value>) -> Option<u8> {
    let n = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then(|| n.round().clamp(0.0, 100.0) as u8)
}

fn feedback_list(value: Option<&Value>) -> Vec<String> {
    let items = value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();
    let mut items = dedup_trimmed(items);
    items.truncate(MAX_FEEDBACK_ITEMS);
    items
}

/// Maps a parsed reply (or nothing) onto a complete outcome.
pub fn normalize_judgment(reply: Option<&Map<String, Value>>) -> JudgmentOutcome {
    let Some(obj) = reply else {
        return JudgmentOutcome::default();
    };
    JudgmentOutcome {
        subjective: coerce_score(obj.get("subjectiveScore")).unwrap_or(FALLBACK_SCORE),
        employer: coerce_score(obj.get("employerScore")).unwrap_or(FALLBACK_SCORE),
        feedback: Feedback {
            subjective_feedback: feedback_list(obj.get("subjectiveFeedback")),
            employer_feedback: feedback_list(obj.get("employerFeedback")),
            highlights: feedback_list(obj.get("highlights")),
            risks: feedback_list(obj.get("risks")),
            suggestions: feedback_list(obj.get("suggestions")),
        },
    }
}

/// Runs the Judgment Scorer. Errors only when the completion call itself fails.
pub async fn score_judgment(
    llm: &dyn CompletionClient,
    raw_text: &str,
    sections: &CanonicalRecord,
    targeting: &ProfileTargeting,
    budget: &JudgmentBudget,
) -> Result<JudgmentOutcome, AppError> {
    let prompt = build_judgment_prompt(raw_text, sections, targeting, budget);
    let reply = llm
        .complete(CompletionRequest {
            system: JUDGMENT_SYSTEM,
            prompt: &prompt,
            temperature: JUDGMENT_TEMPERATURE,
        })
        .await
        .map_err(|e| AppError::JudgmentFailed(format!("Judgment call failed: {e}")))?;

    let parsed = parse_json_object(&reply);
    if parsed.is_none() {
        warn!("Judgment reply was not a JSON object; using default scores");
    }
    Ok(normalize_judgment(parsed.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{FakeClient, Scripted};

    fn targeting() -> ProfileTargeting {
        ProfileTargeting {
            target_role: "Backend Engineer".to_string(),
            must_have_keywords: vec!["Rust".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_allowance_has_floor() {
        let budget = JudgmentBudget::default();
        assert_eq!(budget.text_allowance(4000), 6000 * 4);
        assert_eq!(budget.text_allowance(1_000_000), 500 * 4);
        assert_eq!(budget.estimate_tokens(5), 2);
    }

    #[test]
    fn test_long_text_is_cut_to_budget() {
        let budget = JudgmentBudget::default();
        let raw = format!("{}END_OF_RESUME", "word ".repeat(20_000));
        let prompt = build_judgment_prompt(&raw, &CanonicalRecord::default(), &targeting(), &budget);
        assert!(!prompt.contains("END_OF_RESUME"));
        let total = prompt.chars().count() + JUDGMENT_SYSTEM.chars().count();
        assert!(budget.estimate_tokens(total) <= budget.prompt_tokens);
    }

    #[test]
    fn test_placeholders_in_user_content_stay_literal() {
        let budget = JudgmentBudget::default();
        let sections = CanonicalRecord {
            references: "{raw_text_block} ".repeat(10),
            education: "{sections_block}".to_string(),
            ..Default::default()
        };
        let mut targeting = targeting();
        targeting.notes = "{raw_text_block} {profile_block}".to_string();
        let raw = format!("RAW_START {}", "word ".repeat(20_000));

        let prompt = build_judgment_prompt(&raw, &sections, &targeting, &budget);
        assert_eq!(prompt.matches("RAW_START").count(), 1);
        assert_eq!(prompt.matches("<<<BEGIN_UNTRUSTED RAW_TEXT>>>").count(), 1);
        assert_eq!(prompt.matches("<<<BEGIN_UNTRUSTED RESUME_SECTIONS>>>").count(), 1);
        assert!(prompt.contains("{raw_text_block} {raw_text_block}"));
        let total = prompt.chars().count() + JUDGMENT_SYSTEM.chars().count();
        assert!(budget.estimate_tokens(total) <= budget.prompt_tokens);
    }

    #[test]
    fn test_short_text_sent_whole() {
        let prompt = build_judgment_prompt(
            "Short resume END",
            &CanonicalRecord::default(),
            &targeting(),
            &JudgmentBudget::default(),
        );
        assert!(prompt.contains("Short resume END"));
        assert!(prompt.contains("<<<BEGIN_UNTRUSTED USER_PROFILE>>>"));
        assert!(prompt.contains("\"Backend Engineer\""));
        assert!(prompt.contains("<<<BEGIN_UNTRUSTED RESUME_SECTIONS>>>"));
        assert!(prompt.contains("<<<BEGIN_UNTRUSTED RAW_TEXT>>>"));
    }

    #[test]
    fn test_scores_coerced_and_clamped() {
        let reply = json!({
            "subjectiveScore": "88.6",
            "employerScore": 140,
        });
        let out = normalize_judgment(reply.as_object());
        assert_eq!(out.subjective, 89);
        assert_eq!(out.employer, 100);

        let reply = json!({ "subjectiveScore": -5, "employerScore": "n/a" });
        let out = normalize_judgment(reply.as_object());
        assert_eq!(out.subjective, 0);
        assert_eq!(out.employer, FALLBACK_SCORE);
    }

    #[test]
    fn test_feedback_cleaned_and_capped() {
        let mut risks: Vec<Value> = (0..12).map(|i| json!(format!("risk {i}"))).collect();
        risks.insert(0, json!(" risk 0 "));
        risks.insert(1, json!(""));
        risks.insert(2, json!(3));
        let reply = json!({ "risks": risks, "highlights": "not a list" });
        let out = normalize_judgment(reply.as_object());
        assert_eq!(out.feedback.risks.len(), MAX_FEEDBACK_ITEMS);
        assert_eq!(out.feedback.risks[0], "risk 0");
        assert_eq!(out.feedback.risks[1], "risk 1");
        assert!(out.feedback.highlights.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_reply_gives_defaults() {
        let llm = FakeClient::replying(&["here are my thoughts: great resume!"]);
        let out = score_judgment(
            &llm,
            "text",
            &CanonicalRecord::default(),
            &targeting(),
            &JudgmentBudget::default(),
        )
        .await
        .unwrap();
        assert_eq!(out, JudgmentOutcome::default());
        assert_eq!(out.subjective, 70);
        assert!(out.feedback.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_valid_reply() {
        let llm = FakeClient::replying(&[r#"```json
        {"subjectiveScore": 82, "employerScore": 61, "highlights": ["Strong impact metrics"]}
        ```"#]);
        let out = score_judgment(
            &llm,
            "text",
            &CanonicalRecord::default(),
            &targeting(),
            &JudgmentBudget::default(),
        )
        .await
        .unwrap();
        assert_eq!((out.subjective, out.employer), (82, 61));
        assert_eq!(out.feedback.highlights, vec!["Strong impact metrics"]);
    }

    #[tokio::test]
    async fn test_transport_failure_is_judgment_failed() {
        let llm = FakeClient::new(vec![Scripted::Fail]);
        let err = score_judgment(
            &llm,
            "text",
            &CanonicalRecord::default(),
            &targeting(),
            &JudgmentBudget::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::JudgmentFailed(_)));
    }
}
