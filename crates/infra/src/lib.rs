//! Infrastructure layer: job store, object storage, analysis and mail clients,
//! and the job poller that ties them together.

pub mod analysis;
pub mod assembler;
pub mod codec;
pub mod jobs;
pub mod notify;
pub mod sleep;
pub mod storage;


pub use analysis::ChatCompletionsClient;
pub use assembler::{ResultAssembler, SUMMARY_COLUMN};
pub use jobs::{
    InMemoryJobStore, JobPoller, JobStore, PollOutcome, PollerConfig, PollerState,
    PostgresJobStore, RunnerConfig, WorkerDeps,
};
pub use notify::{LogNotifier, Notifier, SmtpNotifier, SmtpSettings};
pub use sleep::TokioSleeper;
pub use storage::{HttpObjectStore, InMemoryObjectStore, ObjectStore};
