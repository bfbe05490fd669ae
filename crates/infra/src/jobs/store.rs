//! Job storage implementations.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use scrub_core::{Job, JobId, JobStatus, ProgressLogEntry, RecordId, ScrubResult};

/// Job store abstraction.
///
/// Every mutation is a single-row update; no operation spans several rows.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Oldest job still in `pending`, if any.
    async fn next_pending(&self) -> Result<Option<JobId>, StoreError>;

    /// Load a full job row. `Ok(None)` when the row no longer exists.
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError>;

    /// Compare-and-set status change.
    ///
    /// Applies only when the current status is one of `next.allowed_predecessors()`.
    /// Returns `false` when the transition was not applied.
    async fn transition_status(
        &self,
        job_id: JobId,
        next: JobStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Persist cumulative progress.
    ///
    /// Returns `false` (and changes nothing) if `processed` is below the stored value.
    async fn update_progress(
        &self,
        job_id: JobId,
        processed: u32,
        total: u32,
        percent: f64,
    ) -> Result<bool, StoreError>;

    /// Record where the output artifact was written.
    async fn set_output_location(&self, job_id: JobId, location: &str) -> Result<(), StoreError>;

    /// Append to the job's progress log.
    async fn append_log(&self, entry: &ProgressLogEntry) -> Result<(), StoreError>;

    /// Upsert one record's result, keyed by `(job_id, record_id)`.
    async fn save_result(
        &self,
        job_id: JobId,
        result: &ScrubResult,
        researched_on: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

/// Job store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("malformed job row {job_id}: {reason}")]
    Malformed { job_id: JobId, reason: String },
    #[error("database error: {0}")]
    Database(String),
}

/// A persisted per-record result.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub result: ScrubResult,
    pub researched_on: DateTime<Utc>,
}

/// In-memory job store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    logs: RwLock<Vec<ProgressLogEntry>>,
    results: RwLock<HashMap<(JobId, RecordId), StoredResult>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Insert a job as if created by the upload front end.
    pub fn insert(&self, job: Job) {
        self.jobs.write().unwrap().insert(job.id, job);
    }

    pub fn job(&self, job_id: JobId) -> Option<Job> {
        self.jobs.read().unwrap().get(&job_id).cloned()
    }

    /// Progress log messages for a job, oldest first.
    pub fn log_messages(&self, job_id: JobId) -> Vec<String> {
        self.logs
            .read()
            .unwrap()
            .iter()
            .filter(|e| e.job_id == job_id)
            .map(|e| e.message.clone())
            .collect()
    }

    /// Stored results for a job, in input order.
    pub fn results(&self, job_id: JobId) -> Vec<StoredResult> {
        let mut out: Vec<_> = self
            .results
            .read()
            .unwrap()
            .iter()
            .filter(|((j, _), _)| *j == job_id)
            .map(|(_, r)| r.clone())
            .collect();
        out.sort_by_key(|r| r.result.row_index);
        out
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn next_pending(&self) -> Result<Option<JobId>, StoreError> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .min_by_key(|j| j.created_at)
            .map(|j| j.id))
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.read().unwrap().get(&job_id).cloned())
    }

    async fn transition_status(
        &self,
        job_id: JobId,
        next: JobStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        Ok(job.transition(next, error, at).is_ok())
    }

    async fn update_progress(
        &self,
        job_id: JobId,
        processed: u32,
        total: u32,
        percent: f64,
    ) -> Result<bool, StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        if job.record_progress(processed, total).is_err() {
            return Ok(false);
        }
        job.progress_percent = percent;
        Ok(true)
    }

    async fn set_output_location(&self, job_id: JobId, location: &str) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap();
        let job = jobs.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        job.output_location = Some(location.to_string());
        Ok(())
    }

    async fn append_log(&self, entry: &ProgressLogEntry) -> Result<(), StoreError> {
        self.logs.write().unwrap().push(entry.clone());
        Ok(())
    }

    async fn save_result(
        &self,
        job_id: JobId,
        result: &ScrubResult,
        researched_on: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.results.write().unwrap().insert(
            (job_id, result.record_id.clone()),
            StoredResult {
                result: result.clone(),
                researched_on,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl<S: JobStore + ?Sized> JobStore for Arc<S> {
    async fn next_pending(&self) -> Result<Option<JobId>, StoreError> {
        (**self).next_pending().await
    }

    async fn get(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        (**self).get(job_id).await
    }

    async fn transition_status(
        &self,
        job_id: JobId,
        next: JobStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        (**self).transition_status(job_id, next, error, at).await
    }

    async fn update_progress(
        &self,
        job_id: JobId,
        processed: u32,
        total: u32,
        percent: f64,
    ) -> Result<bool, StoreError> {
        (**self).update_progress(job_id, processed, total, percent).await
    }

    async fn set_output_location(&self, job_id: JobId, location: &str) -> Result<(), StoreError> {
        (**self).set_output_location(job_id, location).await
    }

    async fn append_log(&self, entry: &ProgressLogEntry) -> Result<(), StoreError> {
        (**self).append_log(entry).await
    }

    async fn save_result(
        &self,
        job_id: JobId,
        result: &ScrubResult,
        researched_on: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).save_result(job_id, result, researched_on).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scrub_core::ColumnMapping;

    fn pending_job() -> Job {
        Job::new("accounts.csv", "ae@example.com", ColumnMapping::new("Account Name"))
    }

    #[tokio::test]
    async fn next_pending_is_fifo() {
        let store = InMemoryJobStore::new();
        let mut first = pending_job();
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        let second = pending_job();
        store.insert(second.clone());
        store.insert(first.clone());

        assert_eq!(store.next_pending().await.unwrap(), Some(first.id));

        store
            .transition_status(first.id, JobStatus::Processing, None, Utc::now())
            .await
            .unwrap();
        assert_eq!(store.next_pending().await.unwrap(), Some(second.id));
    }

    #[tokio::test]
    async fn claim_is_compare_and_set() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(job.clone());

        let now = Utc::now();
        assert!(store.transition_status(job.id, JobStatus::Processing, None, now).await.unwrap());
        // a second claim of the same job loses
        assert!(!store.transition_status(job.id, JobStatus::Processing, None, now).await.unwrap());
    }

    #[tokio::test]
    async fn terminal_status_is_sticky() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(job.clone());
        let now = Utc::now();

        store.transition_status(job.id, JobStatus::Processing, None, now).await.unwrap();
        assert!(store.transition_status(job.id, JobStatus::Completed, None, now).await.unwrap());
        assert!(!store.transition_status(job.id, JobStatus::Failed, Some("late"), now).await.unwrap());

        let stored = store.job(job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn progress_never_moves_backwards() {
        let store = InMemoryJobStore::new();
        let job = pending_job();
        store.insert(job.clone());

        assert!(store.update_progress(job.id, 3, 9, 33.3).await.unwrap());
        assert!(!store.update_progress(job.id, 2, 9, 22.2).await.unwrap());
        assert_eq!(store.job(job.id).unwrap().processed_records, 3);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let store = InMemoryJobStore::new();
        let err = store.set_output_location(JobId::new(), "x.csv").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
