use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::ledger::{AttemptFilter, LedgerStats};
use crate::models::{
    ApplicationAttempt, JobPosting, Mode, Profile, ReviewDecision, Transition,
};
use crate::state::AppState;

#[derive(Serialize)]
pub struct RegisteredResponse {
    pub id: String,
    /// True when an earlier snapshot with the same id was replaced.
    pub replaced: bool,
}

#[derive(Deserialize)]
pub struct CreateApplicationRequest {
    pub job_id: String,
    pub profile_id: String,
    #[serde(default = "default_mode")]
    pub mode: Mode,
}

fn default_mode() -> Mode {
    Mode::SemiAuto
}

#[derive(Deserialize)]
pub struct ReviewRequest {
    pub decision: ReviewDecision,
}

/// PUT /api/v1/postings
pub async fn handle_put_posting(
    State(state): State<AppState>,
    Json(posting): Json<JobPosting>,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    validate_posting(&posting)?;
    let id = posting.id.clone();
    let replaced = state.catalog.put_posting(posting);
    Ok(registered(id, replaced))
}

/// PUT /api/v1/profiles
pub async fn handle_put_profile(
    State(state): State<AppState>,
    Json(profile): Json<Profile>,
) -> Result<(StatusCode, Json<RegisteredResponse>), AppError> {
    if profile.profile_id.trim().is_empty() {
        return Err(AppError::Validation("profile_id must not be empty".to_string()));
    }
    let id = profile.profile_id.clone();
    let replaced = state.catalog.put_profile(profile);
    Ok(registered(id, replaced))
}

/// POST /api/v1/applications
/// Starts an attempt in the background. An attempt already open for the pair is
/// returned instead of starting another.
pub async fn handle_create_application(
    State(state): State<AppState>,
    Json(req): Json<CreateApplicationRequest>,
) -> Result<(StatusCode, Json<ApplicationAttempt>), AppError> {
    let attempt = state
        .engine
        .start(&req.job_id, &req.profile_id, req.mode)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(attempt)))
}

/// GET /api/v1/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Query(filter): Query<AttemptFilter>,
) -> Result<Json<Vec<ApplicationAttempt>>, AppError> {
    let attempts = state.ledger.list_attempts(&filter).await?;
    Ok(Json(attempts))
}

/// GET /api/v1/applications/stats
pub async fn handle_application_stats(
    State(state): State<AppState>,
) -> Result<Json<LedgerStats>, AppError> {
    let attempts = state.ledger.list_attempts(&AttemptFilter::default()).await?;
    Ok(Json(LedgerStats::from_attempts(&attempts)))
}

/// GET /api/v1/applications/:id
pub async fn handle_get_application(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationAttempt>, AppError> {
    Ok(Json(state.ledger.get_attempt(id).await?))
}

/// GET /api/v1/applications/:id/transitions
pub async fn handle_get_transitions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Transition>>, AppError> {
    Ok(Json(state.ledger.transitions(id).await?))
}

/// POST /api/v1/applications/:id/review
pub async fn handle_review(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<ApplicationAttempt>, AppError> {
    Ok(Json(state.engine.resume_review(id, req.decision).await?))
}

/// POST /api/v1/applications/:id/cancel
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationAttempt>, AppError> {
    Ok(Json(state.engine.cancel(id).await?))
}

/// POST /api/v1/applications/:id/recover
pub async fn handle_recover(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApplicationAttempt>, AppError> {
    Ok(Json(state.engine.recover(id).await?))
}

fn registered(id: String, replaced: bool) -> (StatusCode, Json<RegisteredResponse>) {
    let status = if replaced {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(RegisteredResponse { id, replaced }))
}

fn validate_posting(posting: &JobPosting) -> Result<(), AppError> {
    if posting.id.trim().is_empty() {
        return Err(AppError::Validation("posting id must not be empty".to_string()));
    }
    if !posting.url.starts_with("http://") && !posting.url.starts_with("https://") {
        return Err(AppError::Validation(format!(
            "posting url '{}' must be an http(s) URL",
            posting.url
        )));
    }
    for field in &posting.form_fields {
        if field.label.trim().is_empty() || field.selector_hint.trim().is_empty() {
            return Err(AppError::Validation(
                "every form field needs a label and a selector".to_string(),
            ));
        }
        if !field.kind.has_options() && !field.options.is_empty() {
            return Err(AppError::Validation(format!(
                "only select and radio fields list options, '{}' is {:?}",
                field.label, field.kind
            )));
        }
    }
    Ok(())
}
