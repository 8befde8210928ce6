//! Answer Generator seam. The resolver only sees the trait; the production
//! implementation writes answers through `LlmClient`.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::answers::prompts::{ANSWER_PROMPT_TEMPLATE, ANSWER_SYSTEM};
use crate::llm_client::prompts::TRUTHFULNESS_INSTRUCTION;
use crate::llm_client::LlmClient;
use crate::models::{FieldKind, FormFieldDescriptor, JobPosting, Profile};

/// Everything the generator may use to answer one form field.
#[derive(Debug, Clone, Copy)]
pub struct AnswerRequest<'a> {
    pub posting: &'a JobPosting,
    pub profile: &'a Profile,
    pub field: &'a FormFieldDescriptor,
    /// Character budget for the answer; the resolver truncates anything longer.
    pub max_chars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub text: String,
    /// Self-reported confidence in 0.0 – 1.0, if the backend gives one.
    pub confidence: Option<f64>,
}

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("answer generator unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn generate(&self, request: AnswerRequest<'_>) -> Result<GeneratedAnswer, GeneratorError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed generator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AnswerPayload {
    answer: String,
    #[serde(default)]
    confidence: Option<f64>,
}

pub struct LlmAnswerGenerator {
    llm: LlmClient,
}

impl LlmAnswerGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl AnswerGenerator for LlmAnswerGenerator {
    async fn generate(&self, request: AnswerRequest<'_>) -> Result<GeneratedAnswer, GeneratorError> {
        let prompt = build_answer_prompt(&request);
        // ~4 chars per token, with headroom for the JSON envelope
        let max_tokens = (request.max_chars / 3).clamp(64, 2048) as u32;

        let payload: AnswerPayload = self
            .llm
            .call_json(&prompt, ANSWER_SYSTEM, max_tokens)
            .await
            .map_err(|e| GeneratorError::Unavailable(e.to_string()))?;

        debug!(
            "Generated {} chars for field '{}'",
            payload.answer.len(),
            request.field.label
        );

        Ok(GeneratedAnswer {
            text: payload.answer,
            confidence: payload.confidence.map(|c| c.clamp(0.0, 1.0)),
        })
    }
}

fn answer_format(field: &FormFieldDescriptor) -> String {
    match field.kind {
        FieldKind::ShortText => "a short single-line value (a few words)".to_string(),
        FieldKind::LongText => "one to three concise professional paragraphs".to_string(),
        FieldKind::Select | FieldKind::Radio => format!(
            "exactly one of these options, copied verbatim: {}",
            field.options.join(" | ")
        ),
        FieldKind::Checkbox => "\"yes\" or \"no\"".to_string(),
        FieldKind::File => "nothing; file uploads are not answered".to_string(),
    }
}

pub(crate) fn build_answer_prompt(request: &AnswerRequest<'_>) -> String {
    let profile_lines = request.profile.summary_lines();
    let profile_block = if profile_lines.is_empty() {
        "(no profile details available)".to_string()
    } else {
        profile_lines.join("\n")
    };

    ANSWER_PROMPT_TEMPLATE
        .replace("{title}", &request.posting.title)
        .replace("{company}", &request.posting.company)
        .replace("{url}", &request.posting.url)
        .replace("{label}", &request.field.label)
        .replace("{format}", &answer_format(request.field))
        .replace("{max_chars}", &request.max_chars.to_string())
        .replace("{profile}", &profile_block)
        .replace("{truthfulness}", TRUTHFULNESS_INSTRUCTION)
}
