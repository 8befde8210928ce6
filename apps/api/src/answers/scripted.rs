//! Scripted answer generator for resolver and engine tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::answers::generator::{AnswerGenerator, AnswerRequest, GeneratedAnswer, GeneratorError};

/// Answers by field label; labels without a scripted answer behave like an outage.
#[derive(Default)]
pub struct ScriptedGenerator {
    answers: HashMap<String, GeneratedAnswer>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl ScriptedGenerator {
    pub fn new(answers: &[(&str, &str, Option<f64>)]) -> Self {
        Self {
            answers: answers
                .iter()
                .map(|(label, text, confidence)| {
                    (
                        label.to_string(),
                        GeneratedAnswer {
                            text: text.to_string(),
                            confidence: *confidence,
                        },
                    )
                })
                .collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// (label, max_chars) of every request, in order.
    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(&self, request: AnswerRequest<'_>) -> Result<GeneratedAnswer, GeneratorError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.field.label.clone(), request.max_chars));
        self.answers
            .get(&request.field.label)
            .cloned()
            .ok_or_else(|| GeneratorError::Unavailable("connection refused".to_string()))
    }
}
