//! Postgres-backed job store.
//!
//! Reads and writes the `jobs`, `progress_logs` and `scrub_results` tables owned by
//! the upload front end. The worker never creates or migrates them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tracing::instrument;

use scrub_core::{ColumnMapping, Job, JobId, JobStatus, ProgressLogEntry, ScrubResult};

use super::store::{JobStore, StoreError};

/// Postgres-backed job store.
///
/// ## Lifecycle enforcement
///
/// Status changes are single-row compare-and-set updates guarded by
/// `status = ANY($allowed)`, so a job claimed by another worker, or already in a
/// terminal status, is left untouched and the call reports `false`.
///
/// ## Progress
///
/// Progress updates carry `processed_companies <= $processed` in the WHERE clause;
/// a stale writer can never move the counter backwards.
#[derive(Clone)]
pub struct PostgresJobStore {
    pool: Arc<PgPool>,
}

impl PostgresJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl JobStore for PostgresJobStore {
    #[instrument(skip(self), err)]
    async fn next_pending(&self) -> Result<Option<JobId>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id
            FROM jobs
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("next_pending", e))?;

        match row {
            Some(row) => {
                let id: uuid::Uuid = row
                    .try_get("id")
                    .map_err(|e| map_sqlx_error("next_pending", e))?;
                Ok(Some(JobId::from_uuid(id)))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT
                id,
                status,
                input_file_path,
                output_file_path,
                total_companies,
                processed_companies,
                progress_percentage,
                started_at,
                completed_at,
                error_message,
                email,
                id_column,
                company_name_column,
                website_column,
                owner_column,
                created_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_job", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let job = JobRow::from_row(&row)
            .map_err(|e| StoreError::Malformed {
                job_id,
                reason: e.to_string(),
            })?
            .into_job(job_id)?;
        Ok(Some(job))
    }

    #[instrument(skip(self, error), fields(job_id = %job_id, next = %next), err)]
    async fn transition_status(
        &self,
        job_id: JobId,
        next: JobStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let allowed: Vec<String> = next
            .allowed_predecessors()
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();

        let result = match next {
            JobStatus::Processing => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = $2, started_at = $3
                    WHERE id = $1 AND status = ANY($4)
                    "#,
                )
                .bind(job_id.as_uuid())
                .bind(next.as_str())
                .bind(at)
                .bind(allowed)
                .execute(&*self.pool)
                .await
            }
            JobStatus::Completed | JobStatus::Failed => {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET status = $2, completed_at = $3, error_message = COALESCE($4, error_message)
                    WHERE id = $1 AND status = ANY($5)
                    "#,
                )
                .bind(job_id.as_uuid())
                .bind(next.as_str())
                .bind(at)
                .bind(error)
                .bind(allowed)
                .execute(&*self.pool)
                .await
            }
            // nothing may transition back into pending
            JobStatus::Pending => return Ok(false),
        }
        .map_err(|e| map_sqlx_error("transition_status", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn update_progress(
        &self,
        job_id: JobId,
        processed: u32,
        total: u32,
        percent: f64,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET processed_companies = $2, total_companies = $3, progress_percentage = $4
            WHERE id = $1 AND COALESCE(processed_companies, 0) <= $2
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(processed as i32)
        .bind(total as i32)
        .bind(percent)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_progress", e))?;

        Ok(result.rows_affected() == 1)
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn set_output_location(&self, job_id: JobId, location: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE jobs SET output_file_path = $2 WHERE id = $1")
            .bind(job_id.as_uuid())
            .bind(location)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("set_output_location", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(job_id));
        }
        Ok(())
    }

    #[instrument(skip(self, entry), fields(job_id = %entry.job_id), err)]
    async fn append_log(&self, entry: &ProgressLogEntry) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO progress_logs (job_id, message, created_at) VALUES ($1, $2, $3)")
            .bind(entry.job_id.as_uuid())
            .bind(&entry.message)
            .bind(entry.timestamp)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("append_log", e))?;
        Ok(())
    }

    #[instrument(
        skip(self, result),
        fields(job_id = %job_id, record_id = %result.record_id),
        err
    )]
    async fn save_result(
        &self,
        job_id: JobId,
        result: &ScrubResult,
        researched_on: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO scrub_results (
                job_id,
                record_id,
                account_name,
                website,
                ae,
                scrub_summary,
                num_jobs_est,
                num_jobs_over_80k_est,
                researched_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (job_id, record_id)
            DO UPDATE SET
                account_name = EXCLUDED.account_name,
                website = EXCLUDED.website,
                ae = EXCLUDED.ae,
                scrub_summary = EXCLUDED.scrub_summary,
                num_jobs_est = EXCLUDED.num_jobs_est,
                num_jobs_over_80k_est = EXCLUDED.num_jobs_over_80k_est,
                researched_on = EXCLUDED.researched_on
            "#,
        )
        .bind(job_id.as_uuid())
        .bind(result.record_id.as_str())
        .bind(&result.name)
        .bind(result.website.as_deref())
        .bind(result.owner.as_deref())
        .bind(&result.summary)
        .bind(result.numeric_estimate_primary.map(clamp_i32))
        .bind(result.numeric_estimate_secondary.map(clamp_i32))
        .bind(researched_on)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_result", e))?;
        Ok(())
    }
}

fn clamp_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

struct JobRow {
    status: String,
    input_file_path: String,
    output_file_path: Option<String>,
    total_companies: Option<i32>,
    processed_companies: Option<i32>,
    progress_percentage: Option<f64>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    error_message: Option<String>,
    email: String,
    id_column: Option<String>,
    company_name_column: String,
    website_column: Option<String>,
    owner_column: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for JobRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(JobRow {
            status: row.try_get("status")?,
            input_file_path: row.try_get("input_file_path")?,
            output_file_path: row.try_get("output_file_path")?,
            total_companies: row.try_get("total_companies")?,
            processed_companies: row.try_get("processed_companies")?,
            progress_percentage: row.try_get("progress_percentage")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            error_message: row.try_get("error_message")?,
            email: row.try_get("email")?,
            id_column: row.try_get("id_column")?,
            company_name_column: row.try_get("company_name_column")?,
            website_column: row.try_get("website_column")?,
            owner_column: row.try_get("owner_column")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl JobRow {
    fn into_job(self, job_id: JobId) -> Result<Job, StoreError> {
        let malformed = |reason: String| StoreError::Malformed { job_id, reason };

        let status: JobStatus = self.status.parse().map_err(|e| malformed(format!("{}", e)))?;
        let count = |column: &str, v: Option<i32>| {
            u32::try_from(v.unwrap_or(0))
                .map_err(|_| malformed(format!("negative {}: {}", column, v.unwrap_or(0))))
        };
        let total_records = count("total_companies", self.total_companies)?;
        let processed_records = count("processed_companies", self.processed_companies)?;

        Ok(Job {
            id: job_id,
            status,
            input_location: self.input_file_path,
            output_location: self.output_file_path,
            total_records,
            processed_records,
            progress_percent: self.progress_percentage.unwrap_or(0.0),
            started_at: self.started_at,
            completed_at: self.completed_at,
            error_message: self.error_message,
            requester_contact: self.email,
            column_mapping: ColumnMapping {
                id: self.id_column,
                name: self.company_name_column,
                website: self.website_column,
                owner: self.owner_column,
            },
            created_at: self.created_at,
        })
    }
}

/// Map SQLx errors to `StoreError`.
///
/// | SQLx error | StoreError |
/// |------------|------------|
/// | `Database` | `Database` with the server message |
/// | `PoolClosed` / `PoolTimedOut` | `Database` naming the pool condition |
/// | anything else | `Database` with the error text |
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::Database(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Database(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Database(format!("connection pool timed out in {}", operation))
        }
        other => StoreError::Database(format!("{} failed: {}", operation, other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> JobRow {
        JobRow {
            status: "pending".into(),
            input_file_path: "accounts.csv".into(),
            output_file_path: None,
            total_companies: None,
            processed_companies: None,
            progress_percentage: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            email: "ae@example.com".into(),
            id_column: None,
            company_name_column: "Account Name".into(),
            website_column: None,
            owner_column: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn null_counters_decode_as_zero() {
        let job = row().into_job(JobId::new()).unwrap();
        assert_eq!(job.total_records, 0);
        assert_eq!(job.processed_records, 0);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn negative_counter_is_malformed() {
        let id = JobId::new();
        let err = JobRow {
            processed_companies: Some(-3),
            ..row()
        }
        .into_job(id)
        .unwrap_err();
        match err {
            StoreError::Malformed { job_id, reason } => {
                assert_eq!(job_id, id);
                assert!(reason.contains("processed_companies"));
            }
            other => panic!("expected malformed row, got {:?}", other),
        }
    }

    #[test]
    fn unknown_status_is_malformed() {
        let err = JobRow {
            status: "paused".into(),
            ..row()
        }
        .into_job(JobId::new())
        .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
