//! Application attempt: the unit managed by the state machine and recorded in the ledger.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::posting::{FormFieldDescriptor, JobPosting};
use crate::models::profile::Profile;

// ────────────────────────────────────────────────────────────────────────────
// Lifecycle
// ────────────────────────────────────────────────────────────────────────────

/// Whether final submission needs a human in the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    SemiAuto,
    FullAuto,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::SemiAuto => "semi_auto",
            Mode::FullAuto => "full_auto",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Created,
    Mapping,
    Resolving,
    Filling,
    AwaitingReview,
    Submitting,
    Submitted,
    Failed,
    Blocked,
}

impl AttemptStatus {
    pub const TERMINAL: [AttemptStatus; 3] = [
        AttemptStatus::Submitted,
        AttemptStatus::Failed,
        AttemptStatus::Blocked,
    ];

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Created => "created",
            AttemptStatus::Mapping => "mapping",
            AttemptStatus::Resolving => "resolving",
            AttemptStatus::Filling => "filling",
            AttemptStatus::AwaitingReview => "awaiting_review",
            AttemptStatus::Submitting => "submitting",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Blocked => "blocked",
        }
    }

    /// Edges of the lifecycle graph. Any non-terminal state may fail
    /// (driver error, cancellation, interrupted submit).
    pub fn can_advance_to(&self, next: AttemptStatus) -> bool {
        use AttemptStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (_, Failed) => true,
            (Created, Mapping) => true,
            (Mapping, Resolving) => true,
            (Resolving, Filling) | (Resolving, Blocked) => true,
            (Filling, AwaitingReview) | (Filling, Submitting) | (Filling, Blocked) => true,
            (AwaitingReview, Submitting) | (AwaitingReview, Blocked) => true,
            (Submitting, Submitted) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use AttemptStatus::*;
        [
            Created,
            Mapping,
            Resolving,
            Filling,
            AwaitingReview,
            Submitting,
            Submitted,
            Failed,
            Blocked,
        ]
        .into_iter()
        .find(|status| status.as_str() == s)
        .ok_or_else(|| format!("unknown attempt status '{s}'"))
    }
}

/// Follow-up decision for an attempt parked in `AwaitingReview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Submit,
    Cancel,
}

// ────────────────────────────────────────────────────────────────────────────
// Bindings
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingSource {
    Profile,
    Generator,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    pub label: String,
    pub path: PathBuf,
}

/// Value that will be entered into a control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BindingValue {
    Text(String),
    File(FileRef),
    Flag(bool),
    None,
}

/// Mapping of one form control to the value that will be entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldBinding {
    pub field: FormFieldDescriptor,
    pub source: BindingSource,
    pub value: BindingValue,
    pub confidence: f64,
    /// Profile key the label matched, kept even when the profile had no value for it.
    #[serde(default)]
    pub matched_key: Option<String>,
    /// Why a binding is unresolved or degraded (generator outage, no option match...).
    #[serde(default)]
    pub note: Option<String>,
}

impl FieldBinding {
    pub fn unresolved(field: FormFieldDescriptor, note: impl Into<String>) -> Self {
        Self {
            field,
            source: BindingSource::Unresolved,
            value: BindingValue::None,
            confidence: 0.0,
            matched_key: None,
            note: Some(note.into()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.source != BindingSource::Unresolved
    }

    /// A required field nobody could answer. Never guessed.
    pub fn is_blocking(&self) -> bool {
        self.field.required && !self.is_resolved()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Fill audit
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillFailure {
    pub label: String,
    pub selector: String,
    pub required: bool,
    pub reason: String,
}

/// Outcome of applying bindings to the live form. Partial progress is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub filled: Vec<String>,
    /// Unresolved optional fields left untouched.
    pub skipped: Vec<String>,
    pub failures: Vec<FillFailure>,
}

impl FillReport {
    pub fn required_failures(&self) -> Vec<String> {
        self.failures
            .iter()
            .filter(|f| f.required)
            .map(|f| f.label.clone())
            .collect()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors recorded on the attempt
// ────────────────────────────────────────────────────────────────────────────

/// Structured reason an attempt stopped. Stored on the attempt, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptError {
    MissingRequiredField {
        fields: Vec<String>,
    },
    TransientError {
        action: String,
        attempts: u32,
        message: String,
    },
    FatalError {
        action: String,
        message: String,
    },
    Cancelled,
    /// The worker died while the attempt was in `status`; outcome unknown.
    Interrupted {
        status: AttemptStatus,
    },
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptError::MissingRequiredField { fields } => {
                write!(f, "required fields could not be answered: {}", fields.join(", "))
            }
            AttemptError::TransientError {
                action,
                attempts,
                message,
            } => write!(
                f,
                "automation kept failing during {action} after {attempts} attempts: {message}"
            ),
            AttemptError::FatalError { action, message } => {
                write!(f, "form is not usable ({action}): {message}")
            }
            AttemptError::Cancelled => f.write_str("cancelled by request"),
            AttemptError::Interrupted { status } => write!(
                f,
                "worker stopped while {status}; the form may have been sent, check the site before retrying"
            ),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Attempt + transition
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationAttempt {
    pub attempt_id: Uuid,
    pub job_id: String,
    pub profile_id: String,
    pub mode: Mode,
    pub status: AttemptStatus,
    /// Number of transitions persisted after creation; equals the sequence of the last one.
    pub revision: u32,
    #[serde(default)]
    pub bindings: Vec<FieldBinding>,
    #[serde(default)]
    pub fill_report: Option<FillReport>,
    #[serde(default)]
    pub error: Option<AttemptError>,
    #[serde(default)]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub finalized_at: Option<DateTime<Utc>>,
}

impl ApplicationAttempt {
    pub fn new(job_id: impl Into<String>, profile_id: impl Into<String>, mode: Mode) -> Self {
        let now = Utc::now();
        Self {
            attempt_id: Uuid::new_v4(),
            job_id: job_id.into(),
            profile_id: profile_id.into(),
            mode,
            status: AttemptStatus::Created,
            revision: 0,
            bindings: Vec::new(),
            fill_report: None,
            error: None,
            summary: None,
            created_at: now,
            updated_at: now,
            finalized_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Posting and profile as they were when the attempt was created. Stored once with
/// the attempt so a resumed attempt works from the same inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptInputs {
    pub posting: JobPosting,
    pub profile: Profile,
}

/// One persisted lifecycle step with the attempt as it stood afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub attempt_id: Uuid,
    pub sequence: u32,
    pub from: Option<AttemptStatus>,
    pub to: AttemptStatus,
    pub recorded_at: DateTime<Utc>,
    pub attempt: ApplicationAttempt,
}

impl Transition {
    pub fn initial(attempt: &ApplicationAttempt) -> Self {
        Self {
            attempt_id: attempt.attempt_id,
            sequence: attempt.revision,
            from: None,
            to: attempt.status,
            recorded_at: attempt.updated_at,
            attempt: attempt.clone(),
        }
    }

    pub fn is_initial(&self) -> bool {
        self.from.is_none()
    }
}
