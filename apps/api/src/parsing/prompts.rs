// Section Normalizer LLM prompt templates.

/// Sampling temperature for section extraction. Low: the task is transcription, not writing.
pub const SECTION_PARSE_TEMPERATURE: f32 = 0.1;

pub const SECTION_PARSE_SYSTEM: &str = "\
You are a resume parsing engine. \
Return ONLY valid JSON that matches the provided JSON schema. \
Use only the given resume text. Do not invent facts. \
If a string field is unknown use null; if a list is unknown use []. \
Normalize whitespace; remove bullet glyphs from details. \
Structure experience as title/company/location/start/end/details.";

/// Target schema sent with every parse request.
pub const SECTION_SCHEMA: &str = r#"{
  "type": "object",
  "required": ["contact", "education", "skills", "skillsByCategory", "experience", "references"],
  "properties": {
    "contact": {
      "type": "object",
      "properties": {
        "name": {"type": ["string", "null"]},
        "email": {"type": ["string", "null"]},
        "phone": {"type": ["string", "null"]},
        "linkedin": {"type": ["string", "null"]},
        "github": {"type": ["string", "null"]},
        "website": {"type": ["string", "null"]},
        "location": {"type": ["string", "null"]}
      }
    },
    "education": {"type": "string"},
    "skills": {"type": "array", "items": {"type": "string"}},
    "skillsByCategory": {"type": "object", "additionalProperties": {"type": "array", "items": {"type": "string"}}},
    "experience": {
      "type": "array",
      "items": {
        "type": "object",
        "properties": {
          "title": {"type": ["string", "null"]},
          "company": {"type": ["string", "null"]},
          "location": {"type": ["string", "null"]},
          "start": {"type": ["string", "null"]},
          "end": {"type": ["string", "null"]},
          "details": {"type": "array", "items": {"type": "string"}}
        }
      }
    },
    "references": {"type": "string"}
  }
}"#;

/// Replace: {schema}, {heading_hints}, {json_only}, {untrusted_rule}, {resume_block}
pub const SECTION_PARSE_PROMPT_TEMPLATE: &str = r#"Extract the resume below into a JSON object matching this JSON SCHEMA:
{schema}

SECTION HEADINGS vary between resumes. Map them onto the schema fields:
{heading_hints}

RULES:
1. {json_only}
2. Copy facts exactly as written. Never guess dates, employers or contact details.
3. Put every experience bullet in `details`, one string per bullet, without leading glyphs.
4. `skills` is a flat list; also group skills in `skillsByCategory` when the resume groups them.
5. Education and references are free-text blocks; keep their original line breaks.

{untrusted_rule}

{resume_block}"#;
