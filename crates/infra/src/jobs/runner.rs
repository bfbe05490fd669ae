//! Runs one claimed job from input artifact to completed status.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use scrub_ai::{AnalysisClient, AnalysisRequest, GenerationSettings, RetryPolicy, analyze_with_retry, parse_batch};
use scrub_core::{
    DomainError, Job, JobId, JobStatus, NormalizedRecords, ScrubResult, SkipReason, Sleeper,
    SummaryKind, split_batches,
};

use super::poller::PollerState;
use super::store::JobStore;
use super::tracker::{ProgressTracker, TrackerError};
use crate::assembler::{AssembleError, ResultAssembler};
use crate::codec::{self, CodecError};
use crate::notify::{CompletionNotice, Notifier};
use crate::storage::{ObjectStore, StorageError};

/// Handles to every external collaborator a worker talks to.
#[derive(Clone)]
pub struct WorkerDeps {
    pub store: Arc<dyn JobStore>,
    pub inputs: Arc<dyn ObjectStore>,
    pub outputs: Arc<dyn ObjectStore>,
    pub analysis: Arc<dyn AnalysisClient>,
    pub notifier: Arc<dyn Notifier>,
    pub sleeper: Arc<dyn Sleeper>,
}

/// Per-job processing settings.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Records per analysis call
    pub batch_size: usize,
    /// Pause between consecutive batches (not after the last)
    pub inter_batch_delay: Duration,
    pub retry: RetryPolicy,
    pub generation: GenerationSettings,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            inter_batch_delay: Duration::from_millis(1400),
            retry: RetryPolicy::default(),
            generation: GenerationSettings::default(),
        }
    }
}

/// A failure that ends the job as `failed`.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to load input: {0}")]
    Input(#[from] StorageError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
}

/// What a completed run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total_records: u32,
    pub batches: usize,
    pub call_failures: usize,
    pub parse_failures: usize,
    pub output_location: String,
}

/// Drives a claimed job through `Running` and `Finalizing`.
#[derive(Clone)]
pub struct JobRunner {
    deps: WorkerDeps,
    config: RunnerConfig,
    tracker: ProgressTracker,
    assembler: ResultAssembler,
}

impl JobRunner {
    pub fn new(deps: WorkerDeps, config: RunnerConfig) -> Self {
        let tracker = ProgressTracker::new(deps.store.clone());
        let assembler = ResultAssembler::new(deps.outputs.clone(), deps.store.clone());
        Self {
            deps,
            config,
            tracker,
            assembler,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    /// Process `job`, which must already be in `processing`.
    ///
    /// Any returned error is fatal to the job; the caller marks it `failed`.
    #[instrument(skip(self, job, state), fields(job_id = %job.id), err)]
    pub async fn run(
        &self,
        job: &Job,
        state: &watch::Sender<PollerState>,
    ) -> Result<RunSummary, JobError> {
        let bytes = self.deps.inputs.get(&job.input_location).await?;
        let table = codec::read_table(&bytes)?;
        let normalized = NormalizedRecords::from_table(&table, &job.column_mapping)?;
        self.log_skipped(job.id, &normalized).await;

        let records = normalized.records;
        let total = u32::try_from(records.len())
            .map_err(|_| DomainError::invariant("input has more records than can be tracked"))?;
        self.progress_best_effort(job.id, 0, total).await;

        let batches = split_batches(records, self.config.batch_size)?;
        let batch_count = batches.len();
        let mut results: Vec<ScrubResult> = Vec::with_capacity(total as usize);
        let mut processed: u32 = 0;

        for batch in &batches {
            state.send_replace(PollerState::Running {
                job_id: job.id,
                batch: batch.number,
                of: batch.of,
            });
            self.tracker
                .log_best_effort(job.id, &format!("Processing batch {}/{}", batch.number, batch.of))
                .await;

            let request = AnalysisRequest::for_batch(batch, &self.config.generation);
            let report = analyze_with_retry(
                &*self.deps.analysis,
                &request,
                &self.config.retry,
                &*self.deps.sleeper,
            )
            .await;
            for failure in &report.failures {
                self.tracker
                    .log_best_effort(
                        job.id,
                        &format!("API attempt {} failed: {}", failure.attempt, failure.reason),
                    )
                    .await;
            }

            let batch_results = parse_batch(&report.response, &batch.records);
            self.save_results(job.id, &batch_results).await;
            results.extend(batch_results);

            processed += batch.len() as u32;
            self.progress_best_effort(job.id, processed, total).await;

            if !batch.is_last() {
                self.deps.sleeper.sleep(self.config.inter_batch_delay).await;
            }
        }

        state.send_replace(PollerState::Finalizing { job_id: job.id });
        let artifact = self.assembler.emit(job.id, &table.headers, &results).await?;
        self.tracker
            .log_best_effort(job.id, "Analysis completed successfully!")
            .await;
        self.tracker
            .update_status(job.id, JobStatus::Completed, None)
            .await?;
        info!(job_id = %job.id, total, "job completed");

        self.notify(job, total, artifact.bytes).await;

        Ok(RunSummary {
            total_records: total,
            batches: batch_count,
            call_failures: count_kind(&results, SummaryKind::CallFailure),
            parse_failures: count_kind(&results, SummaryKind::ParseFailure),
            output_location: artifact.location,
        })
    }

    async fn log_skipped(&self, job_id: JobId, normalized: &NormalizedRecords) {
        if normalized.skipped.is_empty() {
            return;
        }
        let duplicates = normalized
            .skipped
            .iter()
            .filter(|s| matches!(s.reason, SkipReason::DuplicateId(_)))
            .count();
        let missing = normalized.skipped.len() - duplicates;
        self.tracker
            .log_best_effort(
                job_id,
                &format!(
                    "Skipped {} rows without a usable id ({} missing, {} duplicate)",
                    normalized.skipped.len(),
                    missing,
                    duplicates
                ),
            )
            .await;
    }

    async fn save_results(&self, job_id: JobId, results: &[ScrubResult]) {
        let researched_on = Utc::now();
        for result in results {
            if let Err(e) = self.deps.store.save_result(job_id, result, researched_on).await {
                warn!(
                    job_id = %job_id,
                    record_id = %result.record_id,
                    error = %e,
                    "failed to save result"
                );
            }
        }
    }

    async fn progress_best_effort(&self, job_id: JobId, processed: u32, total: u32) {
        if let Err(e) = self.tracker.update_progress(job_id, processed, total).await {
            warn!(job_id = %job_id, processed, total, error = %e, "failed to update progress");
        }
    }

    async fn notify(&self, job: &Job, total: u32, attachment: Vec<u8>) {
        let notice = CompletionNotice {
            job_id: job.id,
            recipient: job.requester_contact.clone(),
            total_records: total,
            attachment,
        };
        match self.deps.notifier.notify(&notice).await {
            Ok(()) => {
                self.tracker
                    .log_best_effort(job.id, "Completion email sent successfully")
                    .await;
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "completion notice failed");
                self.tracker
                    .log_best_effort(job.id, &format!("Failed to send email: {}", e))
                    .await;
            }
        }
    }
}

fn count_kind(results: &[ScrubResult], kind: SummaryKind) -> usize {
    results.iter().filter(|r| r.kind == kind).count()
}
