// Prompt constants for the answer generator.

/// System prompt for application answers. Enforces JSON-only output.
pub const ANSWER_SYSTEM: &str = "You are filling in a job application on behalf of a candidate. \
    Answer each question truthfully from the candidate profile, in the first person. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Answer prompt template. Every `{placeholder}` is replaced before sending.
pub const ANSWER_PROMPT_TEMPLATE: &str = r#"Job: {title} at {company}
Posting: {url}

Candidate profile:
{profile}

Application question: "{label}"
Expected answer: {format}
Maximum length: {max_chars} characters.

{truthfulness}

Return a JSON object with this EXACT schema:
{"answer": "<your answer>", "confidence": <number between 0.0 and 1.0>}
"#;
