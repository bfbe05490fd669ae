//! Job model and lifecycle rules.
//!
//! A job moves one way through `pending -> processing -> {completed | failed}`.
//! Terminal states are sticky: once a job is completed or failed, no further
//! status change is accepted.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::JobId;
use crate::record::ColumnMapping;

/// Job execution status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created externally, waiting to be claimed
    Pending,
    /// Claimed by the worker and currently running
    Processing,
    /// Output artifact written
    Completed,
    /// Aborted with a captured error message
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Statuses from which a job may move into `self`.
    pub fn allowed_predecessors(&self) -> &'static [JobStatus] {
        match self {
            JobStatus::Pending => &[],
            JobStatus::Processing => &[JobStatus::Pending],
            JobStatus::Completed | JobStatus::Failed => &[JobStatus::Processing],
        }
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        next.allowed_predecessors().contains(self)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(DomainError::validation(format!("unknown job status: {}", other))),
        }
    }
}

/// Percentage of processed records, `100 * processed / total`.
///
/// Returns 0 when `total` is 0 and never exceeds 100.
pub fn progress_percent(processed: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let processed = processed.min(total);
    (f64::from(processed) / f64::from(total)) * 100.0
}

/// One enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Object storage path of the uploaded input table
    pub input_location: String,
    /// Object storage path of the result table (set on success)
    pub output_location: Option<String>,
    pub total_records: u32,
    pub processed_records: u32,
    pub progress_percent: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Address the completion notice is sent to
    pub requester_contact: String,
    pub column_mapping: ColumnMapping,
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a pending job.
    pub fn new(
        input_location: impl Into<String>,
        requester_contact: impl Into<String>,
        column_mapping: ColumnMapping,
    ) -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Pending,
            input_location: input_location.into(),
            output_location: None,
            total_records: 0,
            processed_records: 0,
            progress_percent: 0.0,
            started_at: None,
            completed_at: None,
            error_message: None,
            requester_contact: requester_contact.into(),
            column_mapping,
            created_at: Utc::now(),
        }
    }

    /// Apply a lifecycle transition.
    ///
    /// Entering `processing` stamps `started_at`; entering a terminal status stamps
    /// `completed_at` and, for `failed`, stores the error text.
    pub fn transition(
        &mut self,
        next: JobStatus,
        error: Option<&str>,
        at: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }

        self.status = next;
        match next {
            JobStatus::Processing => self.started_at = Some(at),
            JobStatus::Completed => self.completed_at = Some(at),
            JobStatus::Failed => {
                self.completed_at = Some(at);
                self.error_message = error.map(str::to_string);
            }
            JobStatus::Pending => {}
        }
        Ok(())
    }

    /// Record cumulative progress.
    ///
    /// Progress only moves forward: a `processed` count lower than the one
    /// already recorded is rejected.
    pub fn record_progress(&mut self, processed: u32, total: u32) -> DomainResult<()> {
        if processed > total {
            return Err(DomainError::invariant(format!(
                "processed records ({}) exceed total ({})",
                processed, total
            )));
        }
        if processed < self.processed_records {
            return Err(DomainError::invariant(format!(
                "progress regressed from {} to {}",
                self.processed_records, processed
            )));
        }

        self.processed_records = processed;
        self.total_records = total;
        self.progress_percent = progress_percent(processed, total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_job() -> Job {
        Job::new("uploads/accounts.csv", "ae@example.com", ColumnMapping::new("Account Name"))
    }

    #[test]
    fn lifecycle_runs_one_way() {
        let mut job = test_job();
        let now = Utc::now();

        job.transition(JobStatus::Processing, None, now).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.started_at, Some(now));

        job.transition(JobStatus::Completed, None, now).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut job = test_job();
        let now = Utc::now();
        job.transition(JobStatus::Processing, None, now).unwrap();
        job.transition(JobStatus::Completed, None, now).unwrap();

        let err = job.transition(JobStatus::Failed, Some("late"), now).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidTransition {
                from: JobStatus::Completed,
                to: JobStatus::Failed
            }
        );
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error_message.is_none());
    }

    #[test]
    fn pending_cannot_skip_processing() {
        let mut job = test_job();
        assert!(job.transition(JobStatus::Completed, None, Utc::now()).is_err());
        assert!(job.transition(JobStatus::Pending, None, Utc::now()).is_err());
    }

    #[test]
    fn failure_stores_error_text() {
        let mut job = test_job();
        let now = Utc::now();
        job.transition(JobStatus::Processing, None, now).unwrap();
        job.transition(JobStatus::Failed, Some("input table is empty"), now).unwrap();
        assert_eq!(job.error_message.as_deref(), Some("input table is empty"));
        assert_eq!(job.completed_at, Some(now));
    }

    #[test]
    fn status_parses_from_storage_form() {
        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
        assert!("queued".parse::<JobStatus>().is_err());
    }

    #[test]
    fn progress_rejects_regression() {
        let mut job = test_job();
        job.record_progress(6, 10).unwrap();
        assert!(job.record_progress(3, 10).is_err());
        assert_eq!(job.processed_records, 6);
        assert!((job.progress_percent - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_total_reports_zero_percent() {
        assert_eq!(progress_percent(0, 0), 0.0);
    }

    proptest! {
        /// Property: percent always lies in [0, 100] and equals 100 * processed / total.
        #[test]
        fn percent_is_bounded(total in 0u32..100_000, processed in 0u32..100_000) {
            let pct = progress_percent(processed, total);
            prop_assert!((0.0..=100.0).contains(&pct));
            if total > 0 && processed <= total {
                let expected = 100.0 * f64::from(processed) / f64::from(total);
                prop_assert!((pct - expected).abs() < 1e-9);
            }
        }
    }
}
