//! Session Driver: owns one browser session per attempt.
//!
//! Flow: acquire a per-source slot → start session → load the form (checking for
//! challenges, removed postings and login walls) → fill bindings → optionally submit
//! → close. Every browser action runs under `run_with_retry`; failures come back as
//! values carrying the action that failed.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::browser::backend::{BrowserBackend, BrowserError, ElementRef, SessionHandle};
use crate::browser::heuristics::{inspect, looks_confirmed, PageCheck};
use crate::browser::limiter::{SessionLimiter, DEFAULT_SESSIONS_PER_SOURCE};
use crate::browser::locator::Locator;
use crate::browser::retry::{run_with_retry, RetryFailure, RetryPolicy};
use crate::models::{
    AttemptError, BindingValue, FieldBinding, FieldKind, FillFailure, FillReport, JobPosting,
};

pub const DEFAULT_SUBMIT_SELECTOR: &str = "button[type='submit'], input[type='submit']";
pub const DEFAULT_ELEMENT_WAIT: Duration = Duration::from_secs(10);
const ELEMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct DriverSettings {
    pub retry: RetryPolicy,
    pub submit_selector: String,
    pub max_sessions_per_source: usize,
    /// How long a control may take to appear after the page loaded. Kept below
    /// `retry.op_timeout` so the wait fits inside one try.
    pub element_wait: Duration,
}

impl Default for DriverSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            submit_selector: DEFAULT_SUBMIT_SELECTOR.to_string(),
            max_sessions_per_source: DEFAULT_SESSIONS_PER_SOURCE,
            element_wait: DEFAULT_ELEMENT_WAIT,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Errors and outcomes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    #[error("{action} still failing after {attempts} attempts: {message}")]
    Transient {
        action: String,
        attempts: u32,
        message: String,
    },

    #[error("{action} failed: {message}")]
    Fatal { action: String, message: String },

    #[error("cancelled during {action}")]
    Cancelled { action: String },
}

impl DriverError {
    fn from_retry(action: &str, failure: RetryFailure) -> Self {
        match failure {
            RetryFailure::Exhausted { attempts, last } => DriverError::Transient {
                action: action.to_string(),
                attempts,
                message: last.to_string(),
            },
            RetryFailure::Permanent(e) => DriverError::Fatal {
                action: action.to_string(),
                message: e.to_string(),
            },
        }
    }

    pub fn action(&self) -> &str {
        match self {
            DriverError::Transient { action, .. }
            | DriverError::Fatal { action, .. }
            | DriverError::Cancelled { action } => action,
        }
    }
}

impl From<DriverError> for AttemptError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::Transient {
                action,
                attempts,
                message,
            } => AttemptError::TransientError {
                action,
                attempts,
                message,
            },
            DriverError::Fatal { action, message } => AttemptError::FatalError { action, message },
            DriverError::Cancelled { .. } => AttemptError::Cancelled,
        }
    }
}

/// A fill that had to stop. `report` holds whatever was entered before.
#[derive(Debug, Clone, PartialEq)]
pub struct FillAborted {
    pub report: FillReport,
    pub error: DriverError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The page after submit shows a confirmation message.
    Confirmed,
    /// Submit went through but the page did not show a recognizable confirmation.
    Unconfirmed,
}

// ────────────────────────────────────────────────────────────────────────────
// Session
// ────────────────────────────────────────────────────────────────────────────

/// Exclusive browser session of one attempt. Dropping an unclosed session closes it
/// in the background and releases its source slot afterwards.
pub struct Session {
    handle: SessionHandle,
    job_id: String,
    backend: Arc<dyn BrowserBackend>,
    permit: Option<OwnedSemaphorePermit>,
    closed: bool,
}

impl Session {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Err(e) = self.backend.close(&self.handle).await {
            warn!("Closing session {} for job {} failed: {e}", self.handle.0, self.job_id);
        }
        self.permit.take();
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("handle", &self.handle)
            .field("job_id", &self.job_id)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("Session {} dropped outside a runtime; not closed", self.handle.0);
            return;
        };
        let backend = self.backend.clone();
        let handle = self.handle.clone();
        let permit = self.permit.take();
        runtime.spawn(async move {
            if let Err(e) = backend.close(&handle).await {
                warn!("Closing dropped session {} failed: {e}", handle.0);
            }
            drop(permit);
        });
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Driver
// ────────────────────────────────────────────────────────────────────────────

pub struct SessionDriver {
    backend: Arc<dyn BrowserBackend>,
    limiter: SessionLimiter,
    settings: DriverSettings,
}

impl SessionDriver {
    pub fn new(backend: Arc<dyn BrowserBackend>, settings: DriverSettings) -> Self {
        Self {
            backend,
            limiter: SessionLimiter::new(settings.max_sessions_per_source),
            settings,
        }
    }

    #[cfg(test)]
    pub fn limiter(&self) -> &SessionLimiter {
        &self.limiter
    }

    /// Waits for a slot for the posting's source, starts a session and loads the form.
    /// The session is closed again on every failure path. The slot wait ends early
    /// once `cancelled` completes; a session that is already starting is not
    /// interrupted.
    pub async fn open(
        &self,
        posting: &JobPosting,
        cancelled: impl Future<Output = ()>,
    ) -> Result<Session, DriverError> {
        let action = "acquire session slot";
        if self.limiter.available(posting.source) == 0 {
            debug!(
                "Waiting for a {} session slot for job {}",
                posting.source.as_str(),
                posting.id
            );
        }
        let permit = tokio::select! {
            permit = self.limiter.acquire(posting.source) => {
                permit.map_err(|e| DriverError::Fatal {
                    action: action.to_string(),
                    message: e.to_string(),
                })?
            }
            () = cancelled => {
                info!("Stopped waiting for a session slot for job {}", posting.id);
                return Err(DriverError::Cancelled {
                    action: action.to_string(),
                });
            }
        };

        let policy = &self.settings.retry;
        let backend = self.backend.as_ref();

        let action = "start browser session";
        let handle = run_with_retry(policy, action, move || backend.new_session())
            .await
            .map_err(|f| DriverError::from_retry(action, f))?;

        let mut session = Session {
            handle,
            job_id: posting.id.clone(),
            backend: self.backend.clone(),
            permit: Some(permit),
            closed: false,
        };

        let action = "load application form";
        let handle = &session.handle;
        let url = posting.url.as_str();
        let loaded = run_with_retry(policy, action, move || async move {
            backend.navigate(handle, url).await?;
            let html = backend.page_source(handle).await?;
            ensure_usable(&html)
        })
        .await;

        if let Err(failure) = loaded {
            let err = DriverError::from_retry(action, failure);
            error!("Opening form for job {} failed: {err}", posting.id);
            session.shutdown().await;
            return Err(err);
        }

        info!(
            "Session {} open for job {} ({})",
            session.handle.0,
            posting.id,
            posting.source.as_str()
        );
        Ok(session)
    }

    /// Enters every resolved binding. Missing or unusable controls are recorded and
    /// skipped; a retry-exhausted or fatal error stops the fill.
    pub async fn fill(
        &self,
        session: &Session,
        bindings: &[FieldBinding],
    ) -> Result<FillReport, FillAborted> {
        let mut report = FillReport::default();
        if session.is_closed() {
            return Err(FillAborted {
                report,
                error: DriverError::Fatal {
                    action: "fill form".to_string(),
                    message: "session already closed".to_string(),
                },
            });
        }

        let policy = &self.settings.retry;
        let backend = self.backend.as_ref();
        let handle = &session.handle;

        for binding in bindings {
            let label = binding.field.label.clone();
            if !binding.is_resolved() || binding.value == BindingValue::None {
                if binding.field.required {
                    report.failures.push(failure(binding, "no value to enter".to_string()));
                } else {
                    report.skipped.push(label);
                }
                continue;
            }
            if !value_fits(binding.field.kind, &binding.value) {
                report.failures.push(failure(
                    binding,
                    format!("value does not fit a {:?} control", binding.field.kind),
                ));
                continue;
            }
            if let BindingValue::File(file) = &binding.value {
                if tokio::fs::metadata(&file.path).await.is_err() {
                    report.failures.push(failure(
                        binding,
                        format!("file {} is not readable", file.path.display()),
                    ));
                    continue;
                }
            }

            let action = format!("fill '{label}'");
            let locator = &Locator::parse(&binding.field.selector_hint);
            let wait = self.settings.element_wait;
            let result = run_with_retry(policy, &action, move || {
                enter_value(backend, handle, locator, binding, wait)
            })
            .await;

            match result {
                Ok(()) => report.filled.push(label),
                Err(RetryFailure::Permanent(e)) if e.is_field_local() => {
                    warn!("Could not fill '{label}' for job {}: {e}", session.job_id);
                    report.failures.push(failure(binding, e.to_string()));
                }
                Err(f) => {
                    let error = DriverError::from_retry(&action, f);
                    error!("Fill aborted for job {}: {error}", session.job_id);
                    return Err(FillAborted { report, error });
                }
            }
        }

        info!(
            "Filled job {}: {} entered, {} skipped, {} failed",
            session.job_id,
            report.filled.len(),
            report.skipped.len(),
            report.failures.len()
        );
        Ok(report)
    }

    /// Clicks the submit control. A retry first checks whether the previous click
    /// already went through, so a confirmed form is never sent twice.
    pub async fn submit(&self, session: &Session) -> Result<SubmitOutcome, DriverError> {
        let action = "submit application";
        if session.is_closed() {
            return Err(DriverError::Fatal {
                action: action.to_string(),
                message: "session already closed".to_string(),
            });
        }

        let policy = &self.settings.retry;
        let backend = self.backend.as_ref();
        let handle = &session.handle;
        let locator = &Locator::parse(&self.settings.submit_selector);
        let tries = &AtomicU32::new(0);
        let wait = self.settings.element_wait;

        let outcome = run_with_retry(policy, action, move || async move {
            if tries.fetch_add(1, Ordering::SeqCst) > 0 {
                let html = backend.page_source(handle).await?;
                if looks_confirmed(&html) {
                    return Ok(SubmitOutcome::Confirmed);
                }
            }
            let button = find_element(backend, handle, locator, wait).await?;
            backend.click(handle, &button).await?;
            let html = backend.page_source(handle).await?;
            if let PageCheck::Challenge(marker) = inspect(&html) {
                return Err(BrowserError::Challenge(marker.to_string()));
            }
            Ok(if looks_confirmed(&html) {
                SubmitOutcome::Confirmed
            } else {
                SubmitOutcome::Unconfirmed
            })
        })
        .await
        .map_err(|f| DriverError::from_retry(action, f));

        match &outcome {
            Ok(result) => info!("Submitted job {}: {result:?}", session.job_id),
            Err(e) => error!("Submit failed for job {}: {e}", session.job_id),
        }
        outcome
    }

    /// Closes the session and frees its source slot. Close errors are logged only.
    pub async fn close(&self, mut session: Session) {
        let timeout = self.settings.retry.op_timeout;
        if tokio::time::timeout(timeout, session.shutdown()).await.is_err() {
            warn!("Closing session {} timed out", session.handle.0);
        }
    }
}

fn ensure_usable(html: &str) -> Result<(), BrowserError> {
    match inspect(html) {
        PageCheck::Usable => Ok(()),
        PageCheck::Challenge(marker) => Err(BrowserError::Challenge(marker.to_string())),
        PageCheck::FormGone(marker) => Err(BrowserError::FormGone(marker.to_string())),
        PageCheck::AuthRequired(marker) => Err(BrowserError::AuthRequired(marker.to_string())),
    }
}

fn value_fits(kind: FieldKind, value: &BindingValue) -> bool {
    matches!(
        (kind, value),
        (FieldKind::ShortText | FieldKind::LongText, BindingValue::Text(_))
            | (FieldKind::Select | FieldKind::Radio, BindingValue::Text(_))
            | (FieldKind::Checkbox, BindingValue::Flag(_))
            | (FieldKind::File, BindingValue::File(_))
    )
}

/// Looks `locator` up until it appears or `wait` runs out. Script-rendered forms add
/// their controls after the page itself has loaded.
async fn find_element(
    backend: &dyn BrowserBackend,
    session: &SessionHandle,
    locator: &Locator,
    wait: Duration,
) -> Result<ElementRef, BrowserError> {
    let deadline = Instant::now() + wait;
    loop {
        match backend.find(session, locator).await {
            Err(BrowserError::NoSuchElement(_)) if Instant::now() < deadline => {
                let left = deadline.saturating_duration_since(Instant::now());
                tokio::time::sleep(ELEMENT_POLL_INTERVAL.min(left)).await;
            }
            result => return result,
        }
    }
}

async fn enter_value(
    backend: &dyn BrowserBackend,
    session: &SessionHandle,
    locator: &Locator,
    binding: &FieldBinding,
    wait: Duration,
) -> Result<(), BrowserError> {
    let element = find_element(backend, session, locator, wait).await?;
    match (binding.field.kind, &binding.value) {
        (FieldKind::ShortText | FieldKind::LongText, BindingValue::Text(text)) => {
            backend.type_text(session, &element, text).await
        }
        (FieldKind::Select | FieldKind::Radio, BindingValue::Text(option)) => {
            backend.choose_option(session, &element, option).await
        }
        (FieldKind::Checkbox, BindingValue::Flag(checked)) => {
            backend.set_checked(session, &element, *checked).await
        }
        (FieldKind::File, BindingValue::File(file)) => {
            backend.attach_file(session, &element, &file.path).await
        }
        (kind, _) => Err(BrowserError::NotInteractable(format!(
            "value does not fit a {kind:?} control"
        ))),
    }
}

fn failure(binding: &FieldBinding, reason: String) -> FillFailure {
    FillFailure {
        label: binding.field.label.clone(),
        selector: binding.field.selector_hint.clone(),
        required: binding.field.required,
        reason,
    }
}
