//! Field Mapper: matches form controls to profile answers.
//!
//! Pure function over its inputs. A control that cannot be matched is returned as
//! `Unresolved`; nothing is guessed here.

use crate::mapping::fuzzy::{parse_flag, token_overlap};
use crate::mapping::normalize::normalize_label;
use crate::mapping::synonyms::SYNONYMS;
use crate::models::{
    BindingSource, BindingValue, FieldBinding, FieldKind, FileRef, FormFieldDescriptor, Profile,
};

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.8;

/// Confidence of a file picked by its category word ("resume", "cv", "cover letter").
const FILE_CATEGORY_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct FieldMapper {
    threshold: f64,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct KeyMatch {
    key: String,
    confidence: f64,
}

impl FieldMapper {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Maps every descriptor, preserving declaration order.
    pub fn map(&self, fields: &[FormFieldDescriptor], profile: &Profile) -> Vec<FieldBinding> {
        fields
            .iter()
            .map(|field| self.map_field(field, profile))
            .collect()
    }

    fn map_field(&self, field: &FormFieldDescriptor, profile: &Profile) -> FieldBinding {
        let label = normalize_label(&field.label);
        match field.kind {
            FieldKind::File => map_file(field, &label, profile),
            FieldKind::ShortText
            | FieldKind::LongText
            | FieldKind::Select
            | FieldKind::Radio
            | FieldKind::Checkbox => self.map_answer(field, &label, profile),
        }
    }

    fn map_answer(&self, field: &FormFieldDescriptor, label: &str, profile: &Profile) -> FieldBinding {
        let Some(found) = self.best_key(label, profile) else {
            return FieldBinding::unresolved(field.clone(), "no profile field matches this label");
        };

        let Some(answer) = profile.answer_for(&found.key) else {
            let mut binding = FieldBinding::unresolved(
                field.clone(),
                format!("profile has no answer for '{}'", found.key),
            );
            binding.matched_key = Some(found.key);
            return binding;
        };

        let value = match field.kind {
            FieldKind::Checkbox => match parse_flag(answer) {
                Some(flag) => BindingValue::Flag(flag),
                None => {
                    let mut binding = FieldBinding::unresolved(
                        field.clone(),
                        format!("profile answer for '{}' is not a yes/no value", found.key),
                    );
                    binding.matched_key = Some(found.key);
                    return binding;
                }
            },
            // Select/Radio values are constrained to the listed options by the resolver.
            FieldKind::ShortText | FieldKind::LongText | FieldKind::Select | FieldKind::Radio => {
                BindingValue::Text(answer.to_string())
            }
            FieldKind::File => {
                return FieldBinding::unresolved(field.clone(), "uploads take profile files, not answers")
            }
        };

        FieldBinding {
            field: field.clone(),
            source: BindingSource::Profile,
            value,
            confidence: found.confidence,
            matched_key: Some(found.key),
            note: None,
        }
    }

    /// Exact synonym match first, then the best fuzzy score at or above the threshold.
    /// Equal scores keep the key declared first.
    fn best_key(&self, label: &str, profile: &Profile) -> Option<KeyMatch> {
        let candidates = candidate_phrases(profile);

        if let Some((key, _)) = candidates.iter().find(|(_, phrase)| phrase == label) {
            return Some(KeyMatch {
                key: key.clone(),
                confidence: 1.0,
            });
        }

        let mut best: Option<KeyMatch> = None;
        for (key, phrase) in &candidates {
            let score = token_overlap(label, phrase);
            if score >= self.threshold && best.as_ref().map_or(true, |b| score > b.confidence) {
                best = Some(KeyMatch {
                    key: key.clone(),
                    confidence: score,
                });
            }
        }
        best
    }
}

/// (key, normalized phrase) pairs: the synonym table in declaration order, then
/// structured answer keys the table does not know about.
fn candidate_phrases(profile: &Profile) -> Vec<(String, String)> {
    let mut candidates: Vec<(String, String)> = SYNONYMS
        .iter()
        .flat_map(|entry| {
            entry
                .phrases
                .iter()
                .map(|phrase| (entry.key.to_string(), normalize_label(phrase)))
        })
        .collect();

    for key in profile.structured_answers.keys() {
        if !SYNONYMS.iter().any(|entry| entry.key == key) {
            candidates.push((key.clone(), normalize_label(key)));
        }
    }
    candidates
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileCategory {
    Resume,
    CoverLetter,
}

fn file_category(normalized: &str) -> Option<FileCategory> {
    if normalized.contains("cover letter") {
        return Some(FileCategory::CoverLetter);
    }
    let resume_word = normalized.contains("resume")
        || normalized.contains("curriculum vitae")
        || normalized.split(' ').any(|t| t == "cv");
    resume_word.then_some(FileCategory::Resume)
}

fn map_file(field: &FormFieldDescriptor, label: &str, profile: &Profile) -> FieldBinding {
    let exact = profile
        .resume_files
        .iter()
        .find(|(name, _)| normalize_label(name) == label);

    let (chosen, confidence) = match exact {
        Some(found) => (Some(found), 1.0),
        None => {
            let by_category = file_category(label).and_then(|wanted| {
                profile
                    .resume_files
                    .iter()
                    .find(|(name, _)| file_category(&normalize_label(name)) == Some(wanted))
            });
            (by_category, FILE_CATEGORY_CONFIDENCE)
        }
    };

    match chosen {
        Some((name, path)) => FieldBinding {
            field: field.clone(),
            source: BindingSource::Profile,
            value: BindingValue::File(FileRef {
                label: name.clone(),
                path: path.clone(),
            }),
            confidence,
            matched_key: Some(name.clone()),
            note: None,
        },
        None => FieldBinding::unresolved(field.clone(), "no profile file matches this upload"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    use super::*;
    use crate::models::PersonalInfo;

    fn field(label: &str, kind: FieldKind, required: bool) -> FormFieldDescriptor {
        FormFieldDescriptor {
            selector_hint: format!("name={}", label.to_lowercase().replace(' ', "_")),
            label: label.to_string(),
            kind,
            required,
            options: Vec::new(),
        }
    }

    fn profile() -> Profile {
        let mut resume_files = BTreeMap::new();
        resume_files.insert("cover letter".to_string(), PathBuf::from("/docs/cover.pdf"));
        resume_files.insert("resume".to_string(), PathBuf::from("/docs/resume.pdf"));
        let mut structured_answers = BTreeMap::new();
        structured_answers.insert("work_authorization".to_string(), "Yes".to_string());
        structured_answers.insert("favourite_language".to_string(), "Rust".to_string());
        structured_answers.insert("relocation".to_string(), "depends".to_string());
        Profile {
            profile_id: "p-1".to_string(),
            personal_info: PersonalInfo {
                full_name: Some("Ada Lovelace".to_string()),
                email: Some("ada@example.com".to_string()),
                phone: Some("+44 20 0000".to_string()),
                ..Default::default()
            },
            resume_files,
            structured_answers,
        }
    }

    #[test]
    fn test_exact_synonym_match() {
        let bindings = FieldMapper::default().map(
            &[field("Full Name *", FieldKind::ShortText, true)],
            &profile(),
        );
        assert_eq!(bindings[0].source, BindingSource::Profile);
        assert_eq!(
            bindings[0].value,
            BindingValue::Text("Ada Lovelace".to_string())
        );
        assert_eq!(bindings[0].confidence, 1.0);
        assert_eq!(bindings[0].matched_key.as_deref(), Some("full_name"));
    }

    #[test]
    fn test_fuzzy_match_above_threshold() {
        let bindings = FieldMapper::default().map(
            &[field(
                "Are you legally authorized to work in the US?",
                FieldKind::Radio,
                true,
            )],
            &profile(),
        );
        assert_eq!(bindings[0].matched_key.as_deref(), Some("work_authorization"));
        assert_eq!(bindings[0].value, BindingValue::Text("Yes".to_string()));
        assert!(bindings[0].confidence >= 0.8);
    }

    #[test]
    fn test_fuzzy_threshold_is_configurable() {
        let strict = FieldMapper::new(0.99);
        let bindings = strict.map(
            &[field("Your primary phone contact", FieldKind::ShortText, false)],
            &profile(),
        );
        assert_eq!(bindings[0].source, BindingSource::Unresolved);
    }

    #[test]
    fn test_known_key_without_answer_stays_unresolved() {
        let bindings = FieldMapper::default().map(
            &[field("Years of experience", FieldKind::Select, true)],
            &profile(),
        );
        assert_eq!(bindings[0].source, BindingSource::Unresolved);
        assert_eq!(bindings[0].value, BindingValue::None);
        assert_eq!(bindings[0].matched_key.as_deref(), Some("years_experience"));
    }

    #[test]
    fn test_structured_key_outside_synonym_table() {
        let bindings = FieldMapper::default().map(
            &[field("Favourite language", FieldKind::ShortText, false)],
            &profile(),
        );
        assert_eq!(bindings[0].value, BindingValue::Text("Rust".to_string()));
    }

    #[test]
    fn test_file_fields_pick_by_category() {
        let mapper = FieldMapper::default();
        let bindings = mapper.map(
            &[
                field("Resume/CV", FieldKind::File, true),
                field("Upload cover letter", FieldKind::File, false),
                field("Portfolio PDF", FieldKind::File, false),
            ],
            &profile(),
        );
        match &bindings[0].value {
            BindingValue::File(file) => assert_eq!(file.path, PathBuf::from("/docs/resume.pdf")),
            other => panic!("expected resume file, got {other:?}"),
        }
        match &bindings[1].value {
            BindingValue::File(file) => assert_eq!(file.label, "cover letter"),
            other => panic!("expected cover letter, got {other:?}"),
        }
        assert_eq!(bindings[2].source, BindingSource::Unresolved);
    }

    #[test]
    fn test_checkbox_needs_yes_no_answer() {
        let bindings = FieldMapper::default().map(
            &[
                field("Willing to relocate", FieldKind::Checkbox, false),
                field("Work authorization", FieldKind::Checkbox, false),
            ],
            &profile(),
        );
        assert_eq!(bindings[0].source, BindingSource::Unresolved);
        assert_eq!(bindings[1].value, BindingValue::Flag(true));
    }

    #[test]
    fn test_unknown_label_is_never_fabricated() {
        let bindings = FieldMapper::default().map(
            &[field("Favourite colour", FieldKind::ShortText, true)],
            &profile(),
        );
        assert!(bindings[0].is_blocking());
        assert!(bindings[0].note.is_some());
    }

    #[test]
    fn test_order_is_preserved() {
        let fields = vec![
            field("Email", FieldKind::ShortText, true),
            field("Phone", FieldKind::ShortText, false),
            field("Name", FieldKind::ShortText, true),
        ];
        let bindings = FieldMapper::default().map(&fields, &profile());
        let labels: Vec<_> = bindings.iter().map(|b| b.field.label.as_str()).collect();
        assert_eq!(labels, vec!["Email", "Phone", "Name"]);
    }
}
