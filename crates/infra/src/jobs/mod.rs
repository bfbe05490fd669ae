//! Job processing: storage of job state, progress tracking, and the poll loop.
//!
//! ## Components
//!
//! - `JobStore`: persistence for jobs, progress logs and per-record results
//! - `ProgressTracker`: lifecycle and progress rules on top of the store
//! - `JobRunner`: drives one claimed job through its batches and finalization
//! - `JobPoller`: claims pending jobs one at a time and decides the polling cadence

pub mod poller;
pub mod postgres;
pub mod runner;
pub mod store;
pub mod tracker;

pub use poller::{JobPoller, PollOutcome, PollerConfig, PollerState};
pub use postgres::PostgresJobStore;
pub use runner::{JobError, JobRunner, RunSummary, RunnerConfig, WorkerDeps};
pub use store::{InMemoryJobStore, JobStore, StoreError, StoredResult};
pub use tracker::{ProgressTracker, TrackerError};
