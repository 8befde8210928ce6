//! Application State Machine: the only component that moves an attempt.
//!
//! Created → Mapping → Resolving → Filling → {AwaitingReview | Submitting}
//!         → {Submitted | Failed | Blocked}
//!
//! Each step is appended to the ledger before the next one starts, so a worker that
//! dies mid-attempt leaves a state `recover` can continue from. The posting and
//! profile are stored with the first step and a resumed attempt reads them back from
//! the ledger. Cancellation is observed between steps and while waiting for a
//! browser slot, never in the middle of a fill.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Notify;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::answers::{AnswerGenerator, AnswerResolver, ResolverSettings};
use crate::browser::{DriverError, DriverSettings, FillAborted, Session, SessionDriver, SubmitOutcome};
use crate::engine::{CatalogError, PostingProvider, ProfileProvider};
use crate::ledger::{AttemptFilter, Ledger, LedgerError};
use crate::mapping::{FieldMapper, DEFAULT_MATCH_THRESHOLD};
use crate::models::{
    ApplicationAttempt, AttemptError, AttemptInputs, AttemptStatus, BindingSource, FillReport,
    Mode, ReviewDecision, Transition,
};

/// Engine tunables. `Default` gives the documented defaults without touching the environment.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub field_match_threshold: f64,
    pub resolver: ResolverSettings,
    pub driver: DriverSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            field_match_threshold: DEFAULT_MATCH_THRESHOLD,
            resolver: ResolverSettings::default(),
            driver: DriverSettings::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("attempt {0} is being worked on right now")]
    Busy(Uuid),

    #[error("attempt {attempt_id} is {status}, not awaiting review")]
    NotAwaitingReview {
        attempt_id: Uuid,
        status: AttemptStatus,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// In-process bookkeeping
// ────────────────────────────────────────────────────────────────────────────

/// A SemiAuto attempt parked with its filled form still open.
struct ParkedReview {
    session: Session,
    inputs: AttemptInputs,
}

#[derive(Default)]
struct LiveState {
    /// Attempts driven by this process, with the signal that wakes their waits on cancel.
    running: HashMap<Uuid, Arc<Notify>>,
    cancel_requested: HashSet<Uuid>,
    reviews: HashMap<Uuid, ParkedReview>,
}

fn lock(live: &Mutex<LiveState>) -> MutexGuard<'_, LiveState> {
    live.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks an attempt as driven by this worker until dropped.
struct RunGuard {
    live: Arc<Mutex<LiveState>>,
    attempt_id: Uuid,
    cancelled: Arc<Notify>,
}

impl RunGuard {
    /// Completes once cancellation has been requested for the attempt.
    async fn cancelled(&self) {
        self.cancelled.notified().await
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut live = lock(&self.live);
        live.running.remove(&self.attempt_id);
        live.cancel_requested.remove(&self.attempt_id);
    }
}

/// Result of opening (or reusing) a session and filling the form.
enum FillStep {
    Ready(Session, FillReport),
    Stopped {
        status: AttemptStatus,
        error: AttemptError,
        report: Option<FillReport>,
    },
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

pub struct ApplicationEngine {
    ledger: Arc<dyn Ledger>,
    postings: Arc<dyn PostingProvider>,
    profiles: Arc<dyn ProfileProvider>,
    generator: Arc<dyn AnswerGenerator>,
    driver: SessionDriver,
    mapper: FieldMapper,
    resolver: AnswerResolver,
    live: Arc<Mutex<LiveState>>,
}

impl ApplicationEngine {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        postings: Arc<dyn PostingProvider>,
        profiles: Arc<dyn ProfileProvider>,
        generator: Arc<dyn AnswerGenerator>,
        driver: SessionDriver,
        settings: EngineSettings,
    ) -> Self {
        Self {
            ledger,
            postings,
            profiles,
            generator,
            driver,
            mapper: FieldMapper::new(settings.field_match_threshold),
            resolver: AnswerResolver::new(settings.resolver),
            live: Arc::new(Mutex::new(LiveState::default())),
        }
    }

    /// Runs one attempt for the pair and returns it in its resulting state. If an
    /// attempt is already open for the pair, that attempt is returned unchanged.
    pub async fn invoke(
        &self,
        job_id: &str,
        profile_id: &str,
        mode: Mode,
    ) -> Result<ApplicationAttempt, EngineError> {
        let (attempt, inputs) = match self.create(job_id, profile_id, mode).await? {
            Created::New { attempt, inputs } => (attempt, inputs),
            Created::Existing(open) => return Ok(open),
        };
        let guard = self.claim(attempt.attempt_id)?;
        self.drive(attempt, &inputs, None, &guard).await
    }

    /// Like `invoke`, but returns the freshly created attempt and runs it on a
    /// background task.
    pub async fn start(
        self: &Arc<Self>,
        job_id: &str,
        profile_id: &str,
        mode: Mode,
    ) -> Result<ApplicationAttempt, EngineError> {
        let (attempt, inputs) = match self.create(job_id, profile_id, mode).await? {
            Created::New { attempt, inputs } => (attempt, inputs),
            Created::Existing(open) => return Ok(open),
        };
        let guard = self.claim(attempt.attempt_id)?;
        let engine = Arc::clone(self);
        let created = attempt.clone();
        tokio::spawn(async move {
            let attempt_id = attempt.attempt_id;
            if let Err(e) = engine.drive(attempt, &inputs, None, &guard).await {
                error!("Attempt {attempt_id} stopped: {e}");
            }
        });
        Ok(created)
    }

    /// Follow-up for an attempt in `AwaitingReview`. A terminal attempt is returned
    /// unchanged and no session is opened.
    pub async fn resume_review(
        &self,
        attempt_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<ApplicationAttempt, EngineError> {
        let attempt = self.ledger.get_attempt(attempt_id).await?;
        if attempt.is_terminal() {
            info!("Review {decision:?} for finished attempt {attempt_id} ignored");
            return Ok(attempt);
        }
        if attempt.status != AttemptStatus::AwaitingReview {
            return Err(EngineError::NotAwaitingReview {
                attempt_id,
                status: attempt.status,
            });
        }

        let guard = self.claim(attempt_id)?;
        // re-read under the guard: a concurrent follow-up may have finished it
        let mut attempt = self.ledger.get_attempt(attempt_id).await?;
        if attempt.status != AttemptStatus::AwaitingReview {
            return Ok(attempt);
        }
        let parked = lock(&self.live).reviews.remove(&attempt_id);

        match decision {
            ReviewDecision::Cancel => {
                if let Some(parked) = parked {
                    self.driver.close(parked.session).await;
                }
                self.fail(&mut attempt, AttemptError::Cancelled).await?;
                Ok(attempt)
            }
            ReviewDecision::Submit => {
                let (session, inputs) = match parked {
                    Some(parked) => (Some(parked.session), parked.inputs),
                    None => match self.stored_inputs(&attempt).await {
                        Ok(inputs) => (None, inputs),
                        Err(error) => {
                            self.fail(&mut attempt, error).await?;
                            return Ok(attempt);
                        }
                    },
                };

                let session = match session {
                    Some(session) => {
                        self.advance(&mut attempt, AttemptStatus::Submitting, |_| {})
                            .await?;
                        session
                    }
                    // the reviewed form is gone with the old worker; fill a fresh one
                    None => match self.open_and_fill(None, &inputs, &attempt, &guard).await {
                        FillStep::Ready(session, report) => {
                            self.advance(&mut attempt, AttemptStatus::Submitting, |a| {
                                a.fill_report = Some(report)
                            })
                            .await?;
                            session
                        }
                        FillStep::Stopped {
                            status,
                            error,
                            report,
                        } => {
                            self.advance(&mut attempt, status, |a| {
                                a.error = Some(error);
                                a.fill_report = report.or(a.fill_report.take());
                            })
                            .await?;
                            return Ok(attempt);
                        }
                    },
                };
                self.drive(attempt, &inputs, Some(session), &guard).await
            }
        }
    }

    /// Requests cancellation. A running attempt stops at its next step boundary, or at
    /// once if it is queued for a browser slot; an idle one (parked for review or
    /// orphaned) is failed right away. The returned attempt is its state at the time
    /// of the call.
    pub async fn cancel(&self, attempt_id: Uuid) -> Result<ApplicationAttempt, EngineError> {
        let attempt = self.ledger.get_attempt(attempt_id).await?;
        if attempt.is_terminal() {
            return Ok(attempt);
        }

        let Some(_guard) = self.claim_or_signal_cancel(attempt_id) else {
            info!("Cancellation requested for running attempt {attempt_id}");
            return Ok(attempt);
        };

        let mut attempt = self.ledger.get_attempt(attempt_id).await?;
        if attempt.is_terminal() {
            return Ok(attempt);
        }
        let parked = lock(&self.live).reviews.remove(&attempt_id);
        if let Some(parked) = parked {
            self.driver.close(parked.session).await;
        }
        self.fail(&mut attempt, AttemptError::Cancelled).await?;
        Ok(attempt)
    }

    /// Continues an open attempt whose worker is gone. Attempts awaiting review stay
    /// parked; an attempt that was submitting is failed rather than submitted twice.
    pub async fn recover(&self, attempt_id: Uuid) -> Result<ApplicationAttempt, EngineError> {
        let attempt = self.ledger.get_attempt(attempt_id).await?;
        if attempt.is_terminal() || attempt.status == AttemptStatus::AwaitingReview {
            return Ok(attempt);
        }

        let guard = self.claim(attempt_id)?;
        let mut attempt = self.ledger.get_attempt(attempt_id).await?;
        if attempt.is_terminal() || attempt.status == AttemptStatus::AwaitingReview {
            return Ok(attempt);
        }
        warn!("Recovering attempt {attempt_id} from {}", attempt.status);

        if attempt.status == AttemptStatus::Submitting {
            let status = attempt.status;
            self.fail(&mut attempt, AttemptError::Interrupted { status })
                .await?;
            return Ok(attempt);
        }

        match self.stored_inputs(&attempt).await {
            Ok(inputs) => self.drive(attempt, &inputs, None, &guard).await,
            Err(error) => {
                self.fail(&mut attempt, error).await?;
                Ok(attempt)
            }
        }
    }

    /// Recovers every open attempt not driven by this process. Run at start-up.
    pub async fn recover_interrupted(&self) -> Result<Vec<ApplicationAttempt>, EngineError> {
        let open = self.ledger.list_attempts(&AttemptFilter::open()).await?;
        let mut recovered = Vec::new();
        for attempt in open {
            let running = lock(&self.live).running.contains_key(&attempt.attempt_id);
            if running || attempt.status == AttemptStatus::AwaitingReview {
                continue;
            }
            match self.recover(attempt.attempt_id).await {
                Ok(attempt) => recovered.push(attempt),
                Err(e) => error!("Recovering attempt {} failed: {e}", attempt.attempt_id),
            }
        }
        if !recovered.is_empty() {
            info!("Recovered {} interrupted attempts", recovered.len());
        }
        Ok(recovered)
    }

    // ────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ────────────────────────────────────────────────────────────────────────

    async fn create(
        &self,
        job_id: &str,
        profile_id: &str,
        mode: Mode,
    ) -> Result<Created, EngineError> {
        if let Some(open) = self.ledger.get_open_attempt(job_id, profile_id).await? {
            info!(
                "Attempt {} already open for job {job_id} / profile {profile_id}",
                open.attempt_id
            );
            return Ok(Created::Existing(open));
        }

        let inputs = AttemptInputs {
            posting: self.postings.posting(job_id).await?,
            profile: self.profiles.profile(profile_id).await?,
        };

        let attempt = ApplicationAttempt::new(job_id, profile_id, mode);
        match self.ledger.create(&Transition::initial(&attempt), &inputs).await {
            Ok(()) => {
                info!(
                    "Attempt {} created for {} ({:?})",
                    attempt.attempt_id,
                    inputs.posting.headline(),
                    mode
                );
                Ok(Created::New { attempt, inputs })
            }
            Err(LedgerError::Conflict { .. }) => {
                // another worker created one between the check and the append
                match self.ledger.get_open_attempt(job_id, profile_id).await? {
                    Some(open) => Ok(Created::Existing(open)),
                    None => Err(EngineError::Busy(attempt.attempt_id)),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Steps the attempt until it is terminal or parked for review.
    async fn drive(
        &self,
        mut attempt: ApplicationAttempt,
        inputs: &AttemptInputs,
        mut session: Option<Session>,
        guard: &RunGuard,
    ) -> Result<ApplicationAttempt, EngineError> {
        let AttemptInputs { posting, profile } = inputs;
        loop {
            if attempt.is_terminal() {
                if let Some(session) = session.take() {
                    self.driver.close(session).await;
                }
                return Ok(attempt);
            }

            if self.take_cancel(attempt.attempt_id) {
                if let Some(session) = session.take() {
                    self.driver.close(session).await;
                }
                self.fail(&mut attempt, AttemptError::Cancelled).await?;
                continue;
            }

            match attempt.status {
                AttemptStatus::Created => {
                    self.advance(&mut attempt, AttemptStatus::Mapping, |_| {})
                        .await?;
                }
                AttemptStatus::Mapping => {
                    let bindings = self.mapper.map(&posting.form_fields, profile);
                    self.advance(&mut attempt, AttemptStatus::Resolving, |a| {
                        a.bindings = bindings
                    })
                    .await?;
                }
                AttemptStatus::Resolving => {
                    let resolved = self
                        .resolver
                        .resolve(
                            attempt.bindings.clone(),
                            posting,
                            profile,
                            self.generator.as_ref(),
                        )
                        .await;
                    let blocking: Vec<String> = resolved
                        .iter()
                        .filter(|b| b.is_blocking())
                        .map(|b| b.field.label.clone())
                        .collect();
                    if blocking.is_empty() {
                        self.advance(&mut attempt, AttemptStatus::Filling, |a| {
                            a.bindings = resolved
                        })
                        .await?;
                    } else {
                        self.advance(&mut attempt, AttemptStatus::Blocked, |a| {
                            a.bindings = resolved;
                            a.error = Some(AttemptError::MissingRequiredField { fields: blocking });
                        })
                        .await?;
                    }
                }
                AttemptStatus::Filling => {
                    match self.open_and_fill(session.take(), inputs, &attempt, guard).await {
                        FillStep::Ready(ready, report) => {
                            let next = match attempt.mode {
                                Mode::SemiAuto => AttemptStatus::AwaitingReview,
                                Mode::FullAuto => AttemptStatus::Submitting,
                            };
                            self.advance(&mut attempt, next, |a| a.fill_report = Some(report))
                                .await?;
                            session = Some(ready);
                        }
                        FillStep::Stopped {
                            status,
                            error,
                            report,
                        } => {
                            self.advance(&mut attempt, status, |a| {
                                a.error = Some(error);
                                a.fill_report = report;
                            })
                            .await?;
                        }
                    }
                }
                AttemptStatus::AwaitingReview => {
                    // parking and the cancel check share one lock so a late request is not lost
                    let cancelled = {
                        let mut live = lock(&self.live);
                        let cancelled = live.cancel_requested.remove(&attempt.attempt_id);
                        if !cancelled {
                            if let Some(session) = session.take() {
                                live.reviews.insert(
                                    attempt.attempt_id,
                                    ParkedReview {
                                        session,
                                        inputs: inputs.clone(),
                                    },
                                );
                            }
                        }
                        cancelled
                    };
                    if cancelled {
                        if let Some(session) = session.take() {
                            self.driver.close(session).await;
                        }
                        self.fail(&mut attempt, AttemptError::Cancelled).await?;
                        continue;
                    }
                    info!("Attempt {} is waiting for review", attempt.attempt_id);
                    return Ok(attempt);
                }
                AttemptStatus::Submitting => {
                    let Some(active) = session.take() else {
                        // no live session means the earlier click may have happened
                        let status = attempt.status;
                        self.fail(&mut attempt, AttemptError::Interrupted { status })
                            .await?;
                        continue;
                    };
                    let outcome = self.driver.submit(&active).await;
                    self.driver.close(active).await;
                    match outcome {
                        Ok(outcome) => {
                            let note = match outcome {
                                SubmitOutcome::Confirmed => "confirmation page detected",
                                SubmitOutcome::Unconfirmed => {
                                    "no confirmation message recognized; check the site"
                                }
                            };
                            self.advance(&mut attempt, AttemptStatus::Submitted, |a| {
                                a.summary = Some(format!("{} ({note}).", submitted_summary(a)))
                            })
                            .await?;
                        }
                        Err(e) => {
                            warn!("Attempt {} gave up during {}", attempt.attempt_id, e.action());
                            self.fail(&mut attempt, e.into()).await?
                        }
                    }
                }
                AttemptStatus::Submitted | AttemptStatus::Failed | AttemptStatus::Blocked => {}
            }
        }
    }

    /// Reuses `session` or opens a new one, then fills the attempt's bindings.
    /// Sessions are closed on every path that does not return `Ready`.
    async fn open_and_fill(
        &self,
        session: Option<Session>,
        inputs: &AttemptInputs,
        attempt: &ApplicationAttempt,
        guard: &RunGuard,
    ) -> FillStep {
        let session = match session {
            Some(session) => session,
            None => match self.driver.open(&inputs.posting, guard.cancelled()).await {
                Ok(session) => session,
                Err(e) => return stopped_by(e, None),
            },
        };

        match self.driver.fill(&session, &attempt.bindings).await {
            Ok(report) => {
                let missing = report.required_failures();
                if missing.is_empty() {
                    return FillStep::Ready(session, report);
                }
                self.driver.close(session).await;
                FillStep::Stopped {
                    status: AttemptStatus::Blocked,
                    error: AttemptError::MissingRequiredField { fields: missing },
                    report: Some(report),
                }
            }
            Err(FillAborted { report, error }) => {
                self.driver.close(session).await;
                stopped_by(error, Some(report))
            }
        }
    }

    /// Persists one step. `update` edits the snapshot that becomes the new state.
    async fn advance(
        &self,
        attempt: &mut ApplicationAttempt,
        to: AttemptStatus,
        update: impl FnOnce(&mut ApplicationAttempt),
    ) -> Result<(), EngineError> {
        let from = attempt.status;
        let mut next = attempt.clone();
        update(&mut next);
        next.status = to;
        next.revision += 1;
        next.updated_at = Utc::now();
        if to.is_terminal() {
            next.finalized_at = Some(next.updated_at);
            if next.summary.is_none() {
                next.summary = Some(terminal_summary(&next));
            }
        }

        let transition = Transition {
            attempt_id: next.attempt_id,
            sequence: next.revision,
            from: Some(from),
            to,
            recorded_at: next.updated_at,
            attempt: next.clone(),
        };
        self.ledger.append(&transition).await?;

        match &next.error {
            Some(e) if to.is_terminal() => {
                info!("Attempt {} {from} -> {to}: {e}", next.attempt_id)
            }
            _ => info!("Attempt {} {from} -> {to}", next.attempt_id),
        }
        *attempt = next;
        Ok(())
    }

    async fn fail(
        &self,
        attempt: &mut ApplicationAttempt,
        error: AttemptError,
    ) -> Result<(), EngineError> {
        self.advance(attempt, AttemptStatus::Failed, |a| a.error = Some(error))
            .await
    }

    /// Posting and profile stored when the attempt was created. An attempt without
    /// them cannot be resumed and is failed.
    async fn stored_inputs(
        &self,
        attempt: &ApplicationAttempt,
    ) -> Result<AttemptInputs, AttemptError> {
        self.ledger
            .inputs(attempt.attempt_id)
            .await
            .map_err(|e| AttemptError::FatalError {
                action: "resume attempt".to_string(),
                message: e.to_string(),
            })
    }

    fn claim(&self, attempt_id: Uuid) -> Result<RunGuard, EngineError> {
        let mut live = lock(&self.live);
        self.claim_locked(&mut live, attempt_id)
            .ok_or(EngineError::Busy(attempt_id))
    }

    /// Claims an idle attempt, or flags a running one for cancellation and wakes its
    /// waits. One lock covers both so a worker finishing in between cannot leave a
    /// stale flag behind.
    fn claim_or_signal_cancel(&self, attempt_id: Uuid) -> Option<RunGuard> {
        let mut live = lock(&self.live);
        if let Some(signal) = live.running.get(&attempt_id) {
            signal.notify_one();
            live.cancel_requested.insert(attempt_id);
            return None;
        }
        self.claim_locked(&mut live, attempt_id)
    }

    fn claim_locked(&self, live: &mut LiveState, attempt_id: Uuid) -> Option<RunGuard> {
        if live.running.contains_key(&attempt_id) {
            return None;
        }
        let cancelled = Arc::new(Notify::new());
        live.running.insert(attempt_id, Arc::clone(&cancelled));
        Some(RunGuard {
            live: Arc::clone(&self.live),
            attempt_id,
            cancelled,
        })
    }

    fn take_cancel(&self, attempt_id: Uuid) -> bool {
        lock(&self.live).cancel_requested.remove(&attempt_id)
    }
}

enum Created {
    New {
        attempt: ApplicationAttempt,
        inputs: AttemptInputs,
    },
    Existing(ApplicationAttempt),
}

fn stopped_by(error: DriverError, report: Option<FillReport>) -> FillStep {
    FillStep::Stopped {
        status: AttemptStatus::Failed,
        error: error.into(),
        report,
    }
}

fn submitted_summary(attempt: &ApplicationAttempt) -> String {
    let from_profile = attempt
        .bindings
        .iter()
        .filter(|b| b.source == BindingSource::Profile)
        .count();
    let generated = attempt
        .bindings
        .iter()
        .filter(|b| b.source == BindingSource::Generator)
        .count();
    format!(
        "Submitted {} fields ({from_profile} from the profile, {generated} generated)",
        attempt.fill_report.as_ref().map_or(0, |r| r.filled.len())
    )
}

fn terminal_summary(attempt: &ApplicationAttempt) -> String {
    let entered = attempt.fill_report.as_ref().map_or(0, |r| r.filled.len());
    match (&attempt.status, &attempt.error) {
        (AttemptStatus::Submitted, _) => format!("{}.", submitted_summary(attempt)),
        (AttemptStatus::Blocked, Some(e)) => format!("Blocked: {e}. Nothing was submitted."),
        (_, Some(e @ AttemptError::Interrupted { .. })) => format!("Failed: {e}."),
        (_, Some(e)) => format!(
            "Failed: {e}. {entered} of {} fields had been entered; nothing was submitted.",
            attempt.bindings.len()
        ),
        (status, None) => format!("Stopped in state {status}."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::scripted::ScriptedGenerator;
    use crate::browser::fake::FakeBrowser;
    use crate::engine::Catalog;
    use crate::ledger::InMemoryLedger;

    fn engine() -> ApplicationEngine {
        let catalog = Arc::new(Catalog::default());
        ApplicationEngine::new(
            Arc::new(InMemoryLedger::default()),
            catalog.clone(),
            catalog,
            Arc::new(ScriptedGenerator::default()),
            SessionDriver::new(Arc::new(FakeBrowser::default()), DriverSettings::default()),
            EngineSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_cancel_signal_does_not_outlive_the_run() {
        let engine = engine();
        let attempt_id = Uuid::new_v4();

        let worker = engine.claim(attempt_id).unwrap();
        assert!(engine.claim_or_signal_cancel(attempt_id).is_none());
        worker.cancelled().await;
        drop(worker);
        assert!(lock(&engine.live).cancel_requested.is_empty());

        // the worker is gone, so a later request claims the attempt instead of flagging it
        let idle = engine.claim_or_signal_cancel(attempt_id).unwrap();
        assert!(!engine.take_cancel(attempt_id));
        drop(idle);
        assert!(lock(&engine.live).running.is_empty());
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let engine = engine();
        let attempt_id = Uuid::new_v4();

        let _worker = engine.claim(attempt_id).unwrap();
        assert!(matches!(
            engine.claim(attempt_id),
            Err(EngineError::Busy(id)) if id == attempt_id
        ));
    }
}
