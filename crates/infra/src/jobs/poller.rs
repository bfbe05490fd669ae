//! Job poller: claims pending jobs one at a time and runs them.
//!
//! ## States
//!
//! `Idle → Claiming → Running { batch, of } → Finalizing → Idle`
//!
//! Each cycle returns a [`PollOutcome`] that fixes the sleep before the next one.
//! The current state is published on a `watch` channel.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, warn};

use scrub_core::{JobId, JobStatus, Sleeper};

use super::runner::{JobRunner, RunnerConfig, WorkerDeps};
use super::store::StoreError;
use super::tracker::{ProgressTracker, TrackerError};

/// Where the poller currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Claiming { job_id: JobId },
    Running { job_id: JobId, batch: usize, of: usize },
    Finalizing { job_id: JobId },
}

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No pending job was found.
    NoJob,
    /// The pending-job query (or the claim itself) hit a store error.
    QueryFailed(String),
    /// The job vanished, was malformed, or was claimed elsewhere; nothing was marked.
    Abandoned(JobId),
    Completed(JobId),
    Failed { job_id: JobId, error: String },
}

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Sleep after finding no pending job
    pub poll_interval: Duration,
    /// Sleep after a query error or a failed job
    pub error_interval: Duration,
    pub runner: RunnerConfig,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            error_interval: Duration::from_secs(30),
            runner: RunnerConfig::default(),
        }
    }
}

impl PollerConfig {
    /// Sleep that follows `outcome`.
    pub fn delay_after(&self, outcome: &PollOutcome) -> Duration {
        match outcome {
            PollOutcome::NoJob => self.poll_interval,
            PollOutcome::QueryFailed(_) | PollOutcome::Failed { .. } => self.error_interval,
            PollOutcome::Abandoned(_) | PollOutcome::Completed(_) => Duration::ZERO,
        }
    }
}

pub struct JobPoller {
    deps: WorkerDeps,
    config: PollerConfig,
    runner: JobRunner,
    tracker: ProgressTracker,
    state: watch::Sender<PollerState>,
}

impl JobPoller {
    pub fn new(deps: WorkerDeps, config: PollerConfig) -> Self {
        let runner = JobRunner::new(deps.clone(), config.runner.clone());
        let tracker = runner.tracker().clone();
        let (state, _) = watch::channel(PollerState::Idle);
        Self {
            deps,
            config,
            runner,
            tracker,
            state,
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Poll forever. Never returns; job failures are recorded on the job.
    pub async fn run(&self) {
        info!("starting job worker");
        loop {
            self.step().await;
        }
    }

    /// One cycle followed by the sleep its outcome calls for.
    pub async fn step(&self) -> PollOutcome {
        let outcome = self.run_once().await;
        let delay = self.config.delay_after(&outcome);
        if !delay.is_zero() {
            self.deps.sleeper.sleep(delay).await;
        }
        outcome
    }

    /// Claim and process at most one pending job, without sleeping afterwards.
    pub async fn run_once(&self) -> PollOutcome {
        self.state.send_replace(PollerState::Idle);
        let outcome = self.cycle().await;
        self.state.send_replace(PollerState::Idle);
        outcome
    }

    async fn cycle(&self) -> PollOutcome {
        let job_id = match self.deps.store.next_pending().await {
            Ok(Some(id)) => id,
            Ok(None) => return PollOutcome::NoJob,
            Err(e) => {
                error!(error = %e, "error querying for pending jobs");
                return PollOutcome::QueryFailed(e.to_string());
            }
        };

        info!(job_id = %job_id, "found pending job");
        self.state.send_replace(PollerState::Claiming { job_id });

        let job = match self.deps.store.get(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!(job_id = %job_id, "job disappeared before it could be claimed");
                return PollOutcome::Abandoned(job_id);
            }
            Err(StoreError::Malformed { reason, .. }) => {
                warn!(job_id = %job_id, reason = %reason, "abandoning malformed job");
                return PollOutcome::Abandoned(job_id);
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to load job");
                return PollOutcome::QueryFailed(e.to_string());
            }
        };

        match self
            .tracker
            .update_status(job_id, JobStatus::Processing, None)
            .await
        {
            Ok(()) => {
                self.tracker
                    .log_best_effort(job_id, "Starting company analysis...")
                    .await;
            }
            Err(TrackerError::TransitionRejected { .. })
            | Err(TrackerError::Store(StoreError::NotFound(_))) => {
                warn!(job_id = %job_id, "job was no longer pending; claim abandoned");
                return PollOutcome::Abandoned(job_id);
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "failed to claim job");
                return PollOutcome::QueryFailed(e.to_string());
            }
        }

        match self.runner.run(&job, &self.state).await {
            Ok(summary) => {
                info!(
                    job_id = %job_id,
                    batches = summary.batches,
                    call_failures = summary.call_failures,
                    parse_failures = summary.parse_failures,
                    "job finished"
                );
                PollOutcome::Completed(job_id)
            }
            Err(e) => {
                let message = e.to_string();
                error!(job_id = %job_id, error = %message, "job failed");
                self.tracker
                    .log_best_effort(job_id, &format!("Error processing job: {}", message))
                    .await;
                if let Err(mark) = self
                    .tracker
                    .update_status(job_id, JobStatus::Failed, Some(&message))
                    .await
                {
                    warn!(job_id = %job_id, error = %mark, "could not mark job failed");
                }
                PollOutcome::Failed {
                    job_id,
                    error: message,
                }
            }
        }
    }
}
