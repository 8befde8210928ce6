//! Ledger: append-only record of attempts and their transitions.
//!
//! Every lifecycle step is appended as a `Transition` carrying the attempt as it
//! stood afterwards. The posting and profile an attempt was created from are stored
//! with its first transition. Both implementations enforce the same rules: contiguous
//! sequence numbers, legal lifecycle edges, one open attempt per job/profile pair,
//! and no change once an attempt is terminal.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{ApplicationAttempt, AttemptInputs, AttemptStatus, Transition};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryLedger;
pub use postgres::PgLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("attempt {0} not found")]
    NotFound(Uuid),

    #[error("attempt {existing} is still open for job {job_id} and profile {profile_id}")]
    Conflict {
        job_id: String,
        profile_id: String,
        existing: Uuid,
    },

    #[error("transition {got} for attempt {attempt_id} is out of order (expected {expected})")]
    OutOfOrder {
        attempt_id: Uuid,
        expected: u32,
        got: u32,
    },

    #[error("attempt {0} is terminal and cannot change")]
    Immutable(Uuid),

    #[error("invalid transition for attempt {attempt_id}: {reason}")]
    InvalidTransition { attempt_id: Uuid, reason: String },

    #[error("no inputs stored for attempt {0}")]
    MissingInputs(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored attempt could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Query for `list_attempts`. Results are newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttemptFilter {
    pub job_id: Option<String>,
    pub profile_id: Option<String>,
    pub status: Option<AttemptStatus>,
    #[serde(default)]
    pub open_only: bool,
    pub limit: Option<usize>,
}

impl AttemptFilter {
    pub fn open() -> Self {
        Self {
            open_only: true,
            ..Default::default()
        }
    }

    pub fn matches(&self, attempt: &ApplicationAttempt) -> bool {
        self.job_id.as_ref().map_or(true, |j| *j == attempt.job_id)
            && self
                .profile_id
                .as_ref()
                .map_or(true, |p| *p == attempt.profile_id)
            && self.status.map_or(true, |s| s == attempt.status)
            && (!self.open_only || !attempt.is_terminal())
    }
}

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Durably records one transition and the attempt snapshot it carries.
    /// All-or-nothing: on error nothing was written.
    async fn append(&self, transition: &Transition) -> Result<(), LedgerError>;

    /// Records an attempt's initial transition together with the inputs it works
    /// from, in one write. Same rules as `append`.
    async fn create(&self, initial: &Transition, inputs: &AttemptInputs)
        -> Result<(), LedgerError>;

    /// Inputs stored by `create`.
    async fn inputs(&self, attempt_id: Uuid) -> Result<AttemptInputs, LedgerError>;

    async fn get_open_attempt(
        &self,
        job_id: &str,
        profile_id: &str,
    ) -> Result<Option<ApplicationAttempt>, LedgerError>;

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<ApplicationAttempt, LedgerError>;

    /// Transitions of one attempt in sequence order.
    async fn transitions(&self, attempt_id: Uuid) -> Result<Vec<Transition>, LedgerError>;

    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
    ) -> Result<Vec<ApplicationAttempt>, LedgerError>;
}

/// Checks `transition` against the attempt's current state (`None` if unknown).
/// The open-pair rule is checked by each implementation, where it can be made atomic.
pub fn validate_append(
    current: Option<&ApplicationAttempt>,
    transition: &Transition,
) -> Result<(), LedgerError> {
    let attempt_id = transition.attempt_id;
    let invalid = |reason: String| LedgerError::InvalidTransition { attempt_id, reason };

    if transition.attempt.attempt_id != attempt_id {
        return Err(invalid("snapshot belongs to another attempt".to_string()));
    }
    if transition.attempt.status != transition.to {
        return Err(invalid(format!(
            "snapshot status {} does not match target {}",
            transition.attempt.status, transition.to
        )));
    }
    if transition.attempt.revision != transition.sequence {
        return Err(invalid(format!(
            "snapshot revision {} does not match sequence {}",
            transition.attempt.revision, transition.sequence
        )));
    }

    match (current, transition.from) {
        (None, None) => {
            if transition.sequence != 0 {
                return Err(LedgerError::OutOfOrder {
                    attempt_id,
                    expected: 0,
                    got: transition.sequence,
                });
            }
            if transition.to != AttemptStatus::Created {
                return Err(invalid(format!("attempts start as created, not {}", transition.to)));
            }
            Ok(())
        }
        (None, Some(_)) => Err(LedgerError::NotFound(attempt_id)),
        (Some(current), from) => {
            if current.is_terminal() {
                return Err(LedgerError::Immutable(attempt_id));
            }
            let expected = current.revision + 1;
            if transition.sequence != expected {
                return Err(LedgerError::OutOfOrder {
                    attempt_id,
                    expected,
                    got: transition.sequence,
                });
            }
            let Some(from) = from else {
                return Err(invalid("attempt already exists".to_string()));
            };
            if from != current.status {
                return Err(invalid(format!(
                    "transition starts at {from} but the attempt is {}",
                    current.status
                )));
            }
            if !from.can_advance_to(transition.to) {
                return Err(invalid(format!("{from} cannot advance to {}", transition.to)));
            }
            if current.job_id != transition.attempt.job_id
                || current.profile_id != transition.attempt.profile_id
            {
                return Err(invalid("job or profile changed".to_string()));
            }
            Ok(())
        }
    }
}

/// Checks that `inputs` belong to the attempt `initial` creates.
pub fn validate_inputs(initial: &Transition, inputs: &AttemptInputs) -> Result<(), LedgerError> {
    let attempt = &initial.attempt;
    let invalid = |reason: String| LedgerError::InvalidTransition {
        attempt_id: initial.attempt_id,
        reason,
    };
    if !initial.is_initial() {
        return Err(invalid("inputs are only stored with the first transition".to_string()));
    }
    if inputs.posting.id != attempt.job_id || inputs.profile.profile_id != attempt.profile_id {
        return Err(invalid(format!(
            "inputs are for job {} and profile {}",
            inputs.posting.id, inputs.profile.profile_id
        )));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Statistics
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LedgerStats {
    pub total: usize,
    pub open: usize,
    pub by_status: BTreeMap<String, usize>,
    /// Submitted share of terminal attempts; `None` until one has finished.
    pub success_rate: Option<f64>,
}

impl LedgerStats {
    pub fn from_attempts(attempts: &[ApplicationAttempt]) -> Self {
        let mut stats = LedgerStats {
            total: attempts.len(),
            ..Default::default()
        };
        let mut terminal = 0usize;
        let mut submitted = 0usize;
        for attempt in attempts {
            *stats
                .by_status
                .entry(attempt.status.as_str().to_string())
                .or_default() += 1;
            if attempt.is_terminal() {
                terminal += 1;
                if attempt.status == AttemptStatus::Submitted {
                    submitted += 1;
                }
            } else {
                stats.open += 1;
            }
        }
        if terminal > 0 {
            stats.success_rate = Some(submitted as f64 / terminal as f64);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::{JobPosting, JobSource, Mode, Profile};

    fn inputs(job_id: &str, profile_id: &str) -> AttemptInputs {
        AttemptInputs {
            posting: JobPosting {
                id: job_id.to_string(),
                url: "https://jobs.example.com/apply".to_string(),
                title: "Engineer".to_string(),
                company: "Acme".to_string(),
                source: JobSource::Other,
                form_fields: Vec::new(),
            },
            profile: Profile {
                profile_id: profile_id.to_string(),
                personal_info: Default::default(),
                resume_files: Default::default(),
                structured_answers: Default::default(),
            },
        }
    }

    fn advance(
        attempt: &ApplicationAttempt,
        to: AttemptStatus,
    ) -> (ApplicationAttempt, Transition) {
        let mut next = attempt.clone();
        next.status = to;
        next.revision += 1;
        next.updated_at = Utc::now();
        let transition = Transition {
            attempt_id: next.attempt_id,
            sequence: next.revision,
            from: Some(attempt.status),
            to,
            recorded_at: next.updated_at,
            attempt: next.clone(),
        };
        (next, transition)
    }

    #[test]
    fn test_initial_transition_must_be_created_at_zero() {
        let attempt = ApplicationAttempt::new("job-1", "p-1", Mode::FullAuto);
        assert!(validate_append(None, &Transition::initial(&attempt)).is_ok());

        let (_, mapping) = advance(&attempt, AttemptStatus::Mapping);
        assert!(matches!(
            validate_append(None, &mapping),
            Err(LedgerError::NotFound(_))
        ));
    }

    #[test]
    fn test_sequence_must_be_contiguous() {
        let attempt = ApplicationAttempt::new("job-1", "p-1", Mode::FullAuto);
        let (mapping, _) = advance(&attempt, AttemptStatus::Mapping);
        let (_, resolving) = advance(&mapping, AttemptStatus::Resolving);
        assert!(matches!(
            validate_append(Some(&attempt), &resolving),
            Err(LedgerError::OutOfOrder {
                expected: 1,
                got: 2,
                ..
            })
        ));
    }

    #[test]
    fn test_illegal_edge_rejected() {
        let attempt = ApplicationAttempt::new("job-1", "p-1", Mode::FullAuto);
        let (_, submitted) = advance(&attempt, AttemptStatus::Submitted);
        assert!(matches!(
            validate_append(Some(&attempt), &submitted),
            Err(LedgerError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_terminal_attempt_is_immutable() {
        let attempt = ApplicationAttempt::new("job-1", "p-1", Mode::FullAuto);
        let (failed, _) = advance(&attempt, AttemptStatus::Failed);
        let (_, again) = advance(&failed, AttemptStatus::Failed);
        assert!(matches!(
            validate_append(Some(&failed), &again),
            Err(LedgerError::Immutable(_))
        ));
    }

    #[test]
    fn test_inputs_must_match_the_created_attempt() {
        let attempt = ApplicationAttempt::new("job-1", "p-1", Mode::FullAuto);
        let initial = Transition::initial(&attempt);
        assert!(validate_inputs(&initial, &inputs("job-1", "p-1")).is_ok());
        assert!(matches!(
            validate_inputs(&initial, &inputs("job-2", "p-1")),
            Err(LedgerError::InvalidTransition { .. })
        ));

        let (_, mapping) = advance(&attempt, AttemptStatus::Mapping);
        assert!(validate_inputs(&mapping, &inputs("job-1", "p-1")).is_err());
    }

    #[test]
    fn test_stats_success_rate() {
        let open = ApplicationAttempt::new("job-1", "p-1", Mode::FullAuto);
        let (failed, _) = advance(&open, AttemptStatus::Failed);
        let mut submitted = failed.clone();
        submitted.status = AttemptStatus::Submitted;
        let mut blocked = failed.clone();
        blocked.status = AttemptStatus::Blocked;

        let stats = LedgerStats::from_attempts(&[open, submitted, blocked, failed]);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.by_status.get("failed"), Some(&1));
        assert!((stats.success_rate.unwrap() - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(LedgerStats::from_attempts(&[]).success_rate, None);
    }
}
