use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use crate::ledger::{validate_append, validate_inputs, AttemptFilter, Ledger, LedgerError};
use crate::models::{ApplicationAttempt, AttemptInputs, Transition};

#[derive(Default)]
struct LedgerState {
    attempts: HashMap<Uuid, ApplicationAttempt>,
    transitions: HashMap<Uuid, Vec<Transition>>,
    inputs: HashMap<Uuid, AttemptInputs>,
    /// (job_id, profile_id) -> open attempt
    open: HashMap<(String, String), Uuid>,
}

/// Process-local ledger for tests and runs without a database.
#[derive(Default)]
pub struct InMemoryLedger {
    state: Mutex<LedgerState>,
}

impl InMemoryLedger {
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl LedgerState {
    fn apply(&mut self, transition: &Transition) -> Result<(), LedgerError> {
        let current = self.attempts.get(&transition.attempt_id);
        validate_append(current, transition)?;

        let attempt = &transition.attempt;
        let pair = (attempt.job_id.clone(), attempt.profile_id.clone());
        if transition.is_initial() {
            if let Some(existing) = self.open.get(&pair) {
                return Err(LedgerError::Conflict {
                    job_id: pair.0,
                    profile_id: pair.1,
                    existing: *existing,
                });
            }
            self.open.insert(pair.clone(), attempt.attempt_id);
        }
        if attempt.is_terminal() {
            self.open.remove(&pair);
        }

        self.attempts.insert(attempt.attempt_id, attempt.clone());
        self
            .transitions
            .entry(attempt.attempt_id)
            .or_default()
            .push(transition.clone());
        Ok(())
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn append(&self, transition: &Transition) -> Result<(), LedgerError> {
        self.state().apply(transition)
    }

    async fn create(
        &self,
        initial: &Transition,
        inputs: &AttemptInputs,
    ) -> Result<(), LedgerError> {
        validate_inputs(initial, inputs)?;
        let mut state = self.state();
        state.apply(initial)?;
        state.inputs.insert(initial.attempt_id, inputs.clone());
        Ok(())
    }

    async fn inputs(&self, attempt_id: Uuid) -> Result<AttemptInputs, LedgerError> {
        let state = self.state();
        match state.inputs.get(&attempt_id) {
            Some(inputs) => Ok(inputs.clone()),
            None if state.attempts.contains_key(&attempt_id) => {
                Err(LedgerError::MissingInputs(attempt_id))
            }
            None => Err(LedgerError::NotFound(attempt_id)),
        }
    }

    async fn get_open_attempt(
        &self,
        job_id: &str,
        profile_id: &str,
    ) -> Result<Option<ApplicationAttempt>, LedgerError> {
        let state = self.state();
        let key = (job_id.to_string(), profile_id.to_string());
        Ok(state
            .open
            .get(&key)
            .and_then(|id| state.attempts.get(id))
            .cloned())
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<ApplicationAttempt, LedgerError> {
        self.state()
            .attempts
            .get(&attempt_id)
            .cloned()
            .ok_or(LedgerError::NotFound(attempt_id))
    }

    async fn transitions(&self, attempt_id: Uuid) -> Result<Vec<Transition>, LedgerError> {
        self.state()
            .transitions
            .get(&attempt_id)
            .cloned()
            .ok_or(LedgerError::NotFound(attempt_id))
    }

    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
    ) -> Result<Vec<ApplicationAttempt>, LedgerError> {
        let state = self.state();
        let mut attempts: Vec<ApplicationAttempt> = state
            .attempts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        attempts.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.attempt_id.cmp(&b.attempt_id))
        });
        if let Some(limit) = filter.limit {
            attempts.truncate(limit);
        }
        Ok(attempts)
    }
}
