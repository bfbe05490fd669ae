//! Append-only audit trail entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::JobId;

/// One operator-facing progress message. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressLogEntry {
    pub job_id: JobId,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl ProgressLogEntry {
    pub fn new(job_id: JobId, message: impl Into<String>) -> Self {
        Self {
            job_id,
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}
