//! Answer Resolver: completes mapped bindings.
//!
//! Flow per binding: keep profile values (constrained to options where the control
//! has them) → ask the generator for anything still unresolved → format/truncate.
//! Generated text is held to the budget the generator was given.
//! Individual failures stay `Unresolved`; the state machine decides what that means.

use tracing::{info, warn};

use crate::answers::generator::{AnswerGenerator, AnswerRequest, GeneratedAnswer};
use crate::answers::truncate::truncate_at_sentence;
use crate::mapping::fuzzy::{match_option, parse_flag};
use crate::mapping::normalize::normalize_label;
use crate::models::{BindingSource, BindingValue, FieldBinding, FieldKind, JobPosting, Profile};

pub const DEFAULT_OPTION_THRESHOLD: f64 = 0.8;
pub const DEFAULT_LONG_TEXT_MAX_CHARS: usize = 4000;
pub const DEFAULT_GENERATOR_CONFIDENCE: f64 = 0.5;
/// Budget passed to the generator for single-line answers.
const SHORT_TEXT_BUDGET: usize = 200;

/// Replies treated as the generator declining to answer.
const DECLINED_ANSWERS: &[&str] = &["unsure", "unknown", "n a", "na", "not sure", "i don t know"];

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub option_threshold: f64,
    pub long_text_max_chars: usize,
    pub default_confidence: f64,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            option_threshold: DEFAULT_OPTION_THRESHOLD,
            long_text_max_chars: DEFAULT_LONG_TEXT_MAX_CHARS,
            default_confidence: DEFAULT_GENERATOR_CONFIDENCE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnswerResolver {
    settings: ResolverSettings,
}

impl AnswerResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    /// Resolves bindings in order. Generator calls are made one at a time.
    pub async fn resolve(
        &self,
        bindings: Vec<FieldBinding>,
        posting: &JobPosting,
        profile: &Profile,
        generator: &dyn AnswerGenerator,
    ) -> Vec<FieldBinding> {
        let mut resolved = Vec::with_capacity(bindings.len());
        for binding in bindings {
            resolved.push(self.resolve_one(binding, posting, profile, generator).await);
        }

        let generated = resolved
            .iter()
            .filter(|b| b.source == BindingSource::Generator)
            .count();
        let unresolved = resolved.iter().filter(|b| !b.is_resolved()).count();
        info!(
            "Resolved bindings for job {}: {} generated, {} unresolved",
            posting.id, generated, unresolved
        );
        resolved
    }

    async fn resolve_one(
        &self,
        binding: FieldBinding,
        posting: &JobPosting,
        profile: &Profile,
        generator: &dyn AnswerGenerator,
    ) -> FieldBinding {
        match binding.field.kind {
            FieldKind::ShortText => {
                self.resolve_text(binding, posting, profile, generator, SHORT_TEXT_BUDGET)
                    .await
            }
            FieldKind::LongText => {
                let budget = self.settings.long_text_max_chars;
                let mut binding = self.resolve_text(binding, posting, profile, generator, budget).await;
                if let BindingValue::Text(text) = &binding.value {
                    binding.value = BindingValue::Text(truncate_at_sentence(text, budget));
                }
                binding
            }
            FieldKind::Select | FieldKind::Radio => {
                self.resolve_choice(binding, posting, profile, generator).await
            }
            FieldKind::Checkbox => self.resolve_flag(binding, posting, profile, generator).await,
            FieldKind::File => binding,
        }
    }

    async fn resolve_text(
        &self,
        binding: FieldBinding,
        posting: &JobPosting,
        profile: &Profile,
        generator: &dyn AnswerGenerator,
        budget: usize,
    ) -> FieldBinding {
        if binding.is_resolved() {
            return binding;
        }
        match self.ask(&binding, posting, profile, generator, budget).await {
            Ok(answer) => FieldBinding {
                value: BindingValue::Text(truncate_at_sentence(&answer.text, budget)),
                source: BindingSource::Generator,
                confidence: answer.confidence.unwrap_or(self.settings.default_confidence),
                note: None,
                ..binding
            },
            Err(note) => with_note(binding, note),
        }
    }

    async fn resolve_choice(
        &self,
        binding: FieldBinding,
        posting: &JobPosting,
        profile: &Profile,
        generator: &dyn AnswerGenerator,
    ) -> FieldBinding {
        if binding.field.options.is_empty() {
            return FieldBinding::unresolved(binding.field, "control lists no options");
        }
        let threshold = self.settings.option_threshold;

        if let (BindingSource::Profile, BindingValue::Text(value)) = (&binding.source, &binding.value) {
            if let Some(found) = match_option(value, &binding.field.options, threshold) {
                return FieldBinding {
                    value: BindingValue::Text(found.option),
                    confidence: binding.confidence.min(found.score),
                    ..binding
                };
            }
        }

        let answer = match self.ask(&binding, posting, profile, generator, SHORT_TEXT_BUDGET).await {
            Ok(answer) => answer,
            Err(note) => return with_note(binding, note),
        };
        match match_option(&answer.text, &binding.field.options, threshold) {
            Some(found) => FieldBinding {
                value: BindingValue::Text(found.option),
                source: BindingSource::Generator,
                confidence: answer.confidence.unwrap_or(self.settings.default_confidence),
                note: None,
                ..binding
            },
            None => with_note(
                binding,
                format!("answer '{}' matches none of the listed options", answer.text.trim()),
            ),
        }
    }

    async fn resolve_flag(
        &self,
        binding: FieldBinding,
        posting: &JobPosting,
        profile: &Profile,
        generator: &dyn AnswerGenerator,
    ) -> FieldBinding {
        if binding.is_resolved() {
            return binding;
        }
        let answer = match self.ask(&binding, posting, profile, generator, SHORT_TEXT_BUDGET).await {
            Ok(answer) => answer,
            Err(note) => return with_note(binding, note),
        };
        match parse_flag(&answer.text) {
            Some(flag) => FieldBinding {
                value: BindingValue::Flag(flag),
                source: BindingSource::Generator,
                confidence: answer.confidence.unwrap_or(self.settings.default_confidence),
                note: None,
                ..binding
            },
            None => with_note(binding, format!("answer '{}' is not yes/no", answer.text.trim())),
        }
    }

    /// One generator call. `Err` carries the note explaining why the field stays unresolved.
    async fn ask(
        &self,
        binding: &FieldBinding,
        posting: &JobPosting,
        profile: &Profile,
        generator: &dyn AnswerGenerator,
        max_chars: usize,
    ) -> Result<GeneratedAnswer, String> {
        let request = AnswerRequest {
            posting,
            profile,
            field: &binding.field,
            max_chars,
        };
        match generator.generate(request).await {
            Ok(answer) if is_declined(&answer.text) => {
                Err("generator declined to answer".to_string())
            }
            Ok(answer) => Ok(answer),
            Err(e) => {
                warn!("Field '{}' left unresolved: {e}", binding.field.label);
                Err(e.to_string())
            }
        }
    }
}

fn is_declined(text: &str) -> bool {
    let normalized = normalize_label(text);
    normalized.is_empty() || DECLINED_ANSWERS.contains(&normalized.as_str())
}

/// Back to `Unresolved` with an explanation; the matched key is kept for the audit trail.
fn with_note(binding: FieldBinding, note: String) -> FieldBinding {
    FieldBinding {
        source: BindingSource::Unresolved,
        value: BindingValue::None,
        confidence: 0.0,
        note: Some(note),
        ..binding
    }
}
