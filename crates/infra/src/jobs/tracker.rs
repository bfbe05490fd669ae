//! Progress tracking for a running job.
//!
//! Wraps the job store with the lifecycle and progress rules: status changes must
//! follow the one-way lifecycle and progress never moves backwards.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use scrub_core::{DomainError, JobId, JobStatus, ProgressLogEntry, progress_percent};

use super::store::{JobStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// The stored status was not an allowed predecessor of the requested one.
    #[error("job {job_id}: transition to {to} rejected")]
    TransitionRejected { job_id: JobId, to: JobStatus },
    #[error("job {job_id}: progress {processed} is behind the stored value")]
    ProgressRegressed { job_id: JobId, processed: u32 },
}

/// Records progress, status and log lines for jobs.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn JobStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Append a timestamped message to the job's progress log.
    ///
    /// The message is also emitted as a structured `info` event.
    pub async fn log_progress(&self, job_id: JobId, message: &str) -> Result<(), TrackerError> {
        info!(job_id = %job_id, "{}", message);
        let entry = ProgressLogEntry::new(job_id, message);
        self.store.append_log(&entry).await?;
        Ok(())
    }

    /// Like [`log_progress`](Self::log_progress), but a failed write is only warned about.
    pub async fn log_best_effort(&self, job_id: JobId, message: &str) {
        if let Err(e) = self.log_progress(job_id, message).await {
            warn!(job_id = %job_id, error = %e, "failed to write progress log");
        }
    }

    /// Persist cumulative progress and the derived percentage.
    pub async fn update_progress(
        &self,
        job_id: JobId,
        processed: u32,
        total: u32,
    ) -> Result<(), TrackerError> {
        if processed > total {
            return Err(DomainError::invariant(format!(
                "processed records ({}) exceed total ({})",
                processed, total
            ))
            .into());
        }

        let percent = progress_percent(processed, total);
        let applied = self
            .store
            .update_progress(job_id, processed, total, percent)
            .await?;
        if !applied {
            return Err(TrackerError::ProgressRegressed { job_id, processed });
        }
        Ok(())
    }

    /// Move the job to `status`, stamping the matching timestamp.
    ///
    /// `error` is stored only when entering `failed`.
    pub async fn update_status(
        &self,
        job_id: JobId,
        status: JobStatus,
        error: Option<&str>,
    ) -> Result<(), TrackerError> {
        let error = if status == JobStatus::Failed { error } else { None };
        let applied = self
            .store
            .transition_status(job_id, status, error, Utc::now())
            .await?;
        if !applied {
            return Err(TrackerError::TransitionRejected { job_id, to: status });
        }
        Ok(())
    }
}
