// Judgment scorer prompt templates.

pub const JUDGMENT_TEMPERATURE: f32 = 0.2;

pub const JUDGMENT_SYSTEM: &str = "\
You are a senior hiring manager reviewing a resume against a fixed rubric. \
Return ONLY valid JSON, no markdown and no commentary. \
Scores are integers from 0 to 100. \
subjectiveScore rates writing quality: clarity, specificity, action verbs, measurable impact, leadership. \
employerScore rates fit against USER_PROFILE: target role, seniority, keywords, industries, locations. \
Never invent facts that are not in the resume or profile. \
Keep every feedback list to at most 8 short, actionable items. \
When inputs are thin, still score on a best-effort basis and add a note to risks.";

pub const JUDGMENT_SCHEMA: &str = r#"{"type":"object","required":["subjectiveScore","employerScore","subjectiveFeedback","employerFeedback","highlights","risks","suggestions"],"properties":{"subjectiveScore":{"type":"integer","minimum":0,"maximum":100},"employerScore":{"type":"integer","minimum":0,"maximum":100},"subjectiveFeedback":{"type":"array","items":{"type":"string"},"maxItems":8},"employerFeedback":{"type":"array","items":{"type":"string"},"maxItems":8},"highlights":{"type":"array","items":{"type":"string"},"maxItems":8},"risks":{"type":"array","items":{"type":"string"},"maxItems":8},"suggestions":{"type":"array","items":{"type":"string"},"maxItems":8}},"additionalProperties":false}"#;

/// Shape example only; its values mean nothing.
pub const JUDGMENT_EXAMPLE: &str = r#"{"subjectiveScore":0,"employerScore":0,"subjectiveFeedback":["..."],"employerFeedback":["..."],"highlights":["..."],"risks":["..."],"suggestions":["..."]}"#;

/// Replace: {schema}, {example}, {untrusted_rule}, {profile_block}, {sections_block}, {raw_text_block}
pub const JUDGMENT_PROMPT_TEMPLATE: &str = r#"Score and critique the resume with the rubric. Return JSON matching this JSON SCHEMA:
{schema}

FORMAT EXAMPLE (shape only, do not copy values):
{example}

GUIDELINES:
- Scores are integers.
- Every feedback item says what to add or change.
- Claims without evidence belong in risks.
- Favor keywords aligned with the target role in USER_PROFILE; ignore noise.
- No extra keys.

{untrusted_rule}

{profile_block}

{sections_block}

{raw_text_block}"#;
