//! PostgreSQL ledger. `application_attempts` holds the current projection of each
//! attempt; `attempt_transitions` is the append-only log; `attempt_inputs` keeps the
//! posting and profile an attempt was created from. Each append is one database
//! transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::ledger::{validate_append, validate_inputs, AttemptFilter, Ledger, LedgerError};
use crate::models::{
    ApplicationAttempt, AttemptInputs, AttemptStatus, JobPosting, Profile, Transition,
};

/// SQL list of terminal status names, matching `AttemptStatus::TERMINAL`.
const TERMINAL_STATUSES: &str = "'submitted', 'failed', 'blocked'";

/// Idempotent schema statements, run at start-up.
pub const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS application_attempts (
        attempt_id   UUID PRIMARY KEY,
        job_id       TEXT NOT NULL,
        profile_id   TEXT NOT NULL,
        mode         TEXT NOT NULL,
        status       TEXT NOT NULL,
        revision     BIGINT NOT NULL,
        attempt      JSONB NOT NULL,
        created_at   TIMESTAMPTZ NOT NULL,
        updated_at   TIMESTAMPTZ NOT NULL,
        finalized_at TIMESTAMPTZ
    )
    "#,
    // at most one open attempt per job/profile pair
    r#"
    CREATE UNIQUE INDEX IF NOT EXISTS application_attempts_one_open
        ON application_attempts (job_id, profile_id)
        WHERE status NOT IN ('submitted', 'failed', 'blocked')
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS application_attempts_created
        ON application_attempts (created_at DESC)
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attempt_transitions (
        attempt_id  UUID NOT NULL REFERENCES application_attempts (attempt_id),
        sequence    BIGINT NOT NULL,
        from_status TEXT,
        to_status   TEXT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        attempt     JSONB NOT NULL,
        PRIMARY KEY (attempt_id, sequence)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS attempt_inputs (
        attempt_id  UUID PRIMARY KEY REFERENCES application_attempts (attempt_id),
        posting     JSONB NOT NULL,
        profile     JSONB NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Ledger schema ready");
    Ok(())
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    attempt_id: Uuid,
    sequence: i64,
    from_status: Option<String>,
    to_status: String,
    recorded_at: DateTime<Utc>,
    attempt: Json<ApplicationAttempt>,
}

impl TransitionRow {
    fn into_transition(self) -> Result<Transition, LedgerError> {
        let parse = |name: &str| {
            name.parse::<AttemptStatus>()
                .map_err(|reason| LedgerError::InvalidTransition {
                    attempt_id: self.attempt_id,
                    reason,
                })
        };
        let from = self.from_status.as_deref().map(parse).transpose()?;
        let to = parse(&self.to_status)?;
        let sequence = u32::try_from(self.sequence).map_err(|_| LedgerError::InvalidTransition {
            attempt_id: self.attempt_id,
            reason: format!("stored sequence {} out of range", self.sequence),
        })?;
        Ok(Transition {
            attempt_id: self.attempt_id,
            sequence,
            from,
            to,
            recorded_at: self.recorded_at,
            attempt: self.attempt.0,
        })
    }
}

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Validates and writes one transition inside `tx`. The caller commits.
async fn write_transition(
    tx: &mut Transaction<'_, Postgres>,
    transition: &Transition,
) -> Result<(), LedgerError> {
    let attempt = &transition.attempt;

    let current: Option<Json<ApplicationAttempt>> = sqlx::query_scalar(
        "SELECT attempt FROM application_attempts WHERE attempt_id = $1 FOR UPDATE",
    )
    .bind(transition.attempt_id)
    .fetch_optional(&mut **tx)
    .await?;
    validate_append(current.as_ref().map(|c| &c.0), transition)?;

    if transition.is_initial() {
        let open: Option<Uuid> = sqlx::query_scalar(&format!(
            "SELECT attempt_id FROM application_attempts \
             WHERE job_id = $1 AND profile_id = $2 AND status NOT IN ({TERMINAL_STATUSES})"
        ))
        .bind(&attempt.job_id)
        .bind(&attempt.profile_id)
        .fetch_optional(&mut **tx)
        .await?;
        if let Some(existing) = open {
            return Err(conflict(attempt, existing));
        }

        sqlx::query(
            r#"
            INSERT INTO application_attempts
                (attempt_id, job_id, profile_id, mode, status, revision, attempt,
                 created_at, updated_at, finalized_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(attempt.attempt_id)
        .bind(&attempt.job_id)
        .bind(&attempt.profile_id)
        .bind(attempt.mode.as_str())
        .bind(attempt.status.as_str())
        .bind(i64::from(attempt.revision))
        .bind(Json(attempt))
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .bind(attempt.finalized_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| match &e {
            // lost a race with a concurrent initial append for the same pair
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                conflict(attempt, Uuid::nil())
            }
            _ => LedgerError::Database(e),
        })?;
    } else {
        sqlx::query(
            r#"
            UPDATE application_attempts
            SET status = $2, revision = $3, attempt = $4, updated_at = $5, finalized_at = $6
            WHERE attempt_id = $1
            "#,
        )
        .bind(attempt.attempt_id)
        .bind(attempt.status.as_str())
        .bind(i64::from(attempt.revision))
        .bind(Json(attempt))
        .bind(attempt.updated_at)
        .bind(attempt.finalized_at)
        .execute(&mut **tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO attempt_transitions
            (attempt_id, sequence, from_status, to_status, recorded_at, attempt)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(transition.attempt_id)
    .bind(i64::from(transition.sequence))
    .bind(transition.from.map(|s| s.as_str()))
    .bind(transition.to.as_str())
    .bind(transition.recorded_at)
    .bind(Json(attempt))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl Ledger for PgLedger {
    async fn append(&self, transition: &Transition) -> Result<(), LedgerError> {
        let mut tx = self.pool.begin().await?;
        write_transition(&mut tx, transition).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn create(
        &self,
        initial: &Transition,
        inputs: &AttemptInputs,
    ) -> Result<(), LedgerError> {
        validate_inputs(initial, inputs)?;
        let mut tx = self.pool.begin().await?;
        write_transition(&mut tx, initial).await?;
        sqlx::query(
            r#"
            INSERT INTO attempt_inputs (attempt_id, posting, profile, recorded_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(initial.attempt_id)
        .bind(Json(&inputs.posting))
        .bind(Json(&inputs.profile))
        .bind(initial.recorded_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn inputs(&self, attempt_id: Uuid) -> Result<AttemptInputs, LedgerError> {
        let row: Option<(Json<JobPosting>, Json<Profile>)> = sqlx::query_as(
            "SELECT posting, profile FROM attempt_inputs WHERE attempt_id = $1",
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some((posting, profile)) => Ok(AttemptInputs {
                posting: posting.0,
                profile: profile.0,
            }),
            None => {
                // distinguish an unknown attempt from one created without inputs
                self.get_attempt(attempt_id).await?;
                Err(LedgerError::MissingInputs(attempt_id))
            }
        }
    }

    async fn get_open_attempt(
        &self,
        job_id: &str,
        profile_id: &str,
    ) -> Result<Option<ApplicationAttempt>, LedgerError> {
        let row: Option<Json<ApplicationAttempt>> = sqlx::query_scalar(&format!(
            "SELECT attempt FROM application_attempts \
             WHERE job_id = $1 AND profile_id = $2 AND status NOT IN ({TERMINAL_STATUSES})"
        ))
        .bind(job_id)
        .bind(profile_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.0))
    }

    async fn get_attempt(&self, attempt_id: Uuid) -> Result<ApplicationAttempt, LedgerError> {
        let row: Option<Json<ApplicationAttempt>> =
            sqlx::query_scalar("SELECT attempt FROM application_attempts WHERE attempt_id = $1")
                .bind(attempt_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(|r| r.0).ok_or(LedgerError::NotFound(attempt_id))
    }

    async fn transitions(&self, attempt_id: Uuid) -> Result<Vec<Transition>, LedgerError> {
        let rows = sqlx::query_as::<_, TransitionRow>(
            r#"
            SELECT attempt_id, sequence, from_status, to_status, recorded_at, attempt
            FROM attempt_transitions
            WHERE attempt_id = $1
            ORDER BY sequence ASC
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;
        if rows.is_empty() {
            return Err(LedgerError::NotFound(attempt_id));
        }
        rows.into_iter().map(TransitionRow::into_transition).collect()
    }

    async fn list_attempts(
        &self,
        filter: &AttemptFilter,
    ) -> Result<Vec<ApplicationAttempt>, LedgerError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT attempt FROM application_attempts WHERE TRUE");
        if let Some(job_id) = &filter.job_id {
            query.push(" AND job_id = ").push_bind(job_id.clone());
        }
        if let Some(profile_id) = &filter.profile_id {
            query.push(" AND profile_id = ").push_bind(profile_id.clone());
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if filter.open_only {
            query.push(format!(" AND status NOT IN ({TERMINAL_STATUSES})"));
        }
        query.push(" ORDER BY created_at DESC, attempt_id ASC");
        if let Some(limit) = filter.limit {
            query
                .push(" LIMIT ")
                .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows: Vec<Json<ApplicationAttempt>> =
            query.build_query_scalar().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.0).collect())
    }
}

fn conflict(attempt: &ApplicationAttempt, existing: Uuid) -> LedgerError {
    LedgerError::Conflict {
        job_id: attempt.job_id.clone(),
        profile_id: attempt.profile_id.clone(),
        existing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_status_list_matches_lifecycle() {
        let expected = AttemptStatus::TERMINAL
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ");
        assert_eq!(TERMINAL_STATUSES, expected);
        assert!(SCHEMA[1].contains(&expected));
    }

    #[test]
    fn test_stored_row_converts_back_to_transition() {
        let attempt = ApplicationAttempt::new("job-1", "p-1", crate::models::Mode::SemiAuto);
        let row = TransitionRow {
            attempt_id: attempt.attempt_id,
            sequence: 0,
            from_status: None,
            to_status: "created".to_string(),
            recorded_at: attempt.updated_at,
            attempt: Json(attempt.clone()),
        };
        assert_eq!(row.into_transition().unwrap(), Transition::initial(&attempt));
    }
}
