//! Result assembly: merge per-record results back into an output artifact.

use std::sync::Arc;

use tracing::instrument;

use scrub_core::{JobId, ScrubResult};

use crate::codec::{self, CodecError};
use crate::jobs::store::{JobStore, StoreError};
use crate::storage::{ObjectStore, StorageError};

/// Header of the column appended to every output row.
pub const SUMMARY_COLUMN: &str = "scrub_summary";

const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, thiserror::Error)]
pub enum AssembleError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("failed to store output artifact: {0}")]
    Storage(#[from] StorageError),
    #[error("failed to record output location: {0}")]
    Store(#[from] StoreError),
}

/// An emitted output artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub location: String,
    pub bytes: Vec<u8>,
}

/// Name of the output artifact for a job.
pub fn output_location(job_id: JobId) -> String {
    format!("results_{}.csv", job_id)
}

/// Build output rows: the input header plus [`SUMMARY_COLUMN`], one row per result
/// in original input order.
pub fn assemble_rows(headers: &[String], results: &[ScrubResult]) -> (Vec<String>, Vec<Vec<String>>) {
    let mut out_headers = headers.to_vec();
    out_headers.push(SUMMARY_COLUMN.to_string());

    let mut ordered: Vec<&ScrubResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.row_index);

    let rows = ordered
        .into_iter()
        .map(|r| {
            let mut row = r.fields.clone();
            row.resize(headers.len(), String::new());
            row.push(r.summary.clone());
            row
        })
        .collect();

    (out_headers, rows)
}

/// Writes the output artifact and records its location on the job.
#[derive(Clone)]
pub struct ResultAssembler {
    outputs: Arc<dyn ObjectStore>,
    store: Arc<dyn JobStore>,
}

impl ResultAssembler {
    pub fn new(outputs: Arc<dyn ObjectStore>, store: Arc<dyn JobStore>) -> Self {
        Self { outputs, store }
    }

    #[instrument(skip(self, headers, results), fields(job_id = %job_id, rows = results.len()), err)]
    pub async fn emit(
        &self,
        job_id: JobId,
        headers: &[String],
        results: &[ScrubResult],
    ) -> Result<OutputArtifact, AssembleError> {
        let (out_headers, rows) = assemble_rows(headers, results);
        let bytes = codec::write_table(&out_headers, &rows)?;
        let location = output_location(job_id);

        self.outputs
            .put(&location, bytes.clone(), CSV_CONTENT_TYPE)
            .await?;
        self.store.set_output_location(job_id, &location).await?;

        Ok(OutputArtifact { location, bytes })
    }
}
