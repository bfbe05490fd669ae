//! `scrub-core`: domain foundation for the account scrub worker.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! record normalization, job lifecycle rules, batching and result types.

pub mod batch;
pub mod error;
pub mod id;
pub mod job;
pub mod progress;
pub mod record;
pub mod scrub;
pub mod sleep;

pub use batch::{Batch, split_batches};
pub use error::{DomainError, DomainResult};
pub use id::{JobId, RecordId};
pub use job::{Job, JobStatus, progress_percent};
pub use progress::ProgressLogEntry;
pub use record::{ColumnMapping, InputTable, NormalizedRecords, Record, ResolvedColumns, SkipReason, SkippedRow};
pub use scrub::{CALL_FAILURE_SUMMARY, Estimates, PARSE_FAILURE_SUMMARY, ScrubResult, SummaryKind};
pub use sleep::Sleeper;
