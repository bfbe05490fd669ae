//! Per-record enrichment output.

use serde::{Deserialize, Serialize};

use crate::id::RecordId;
use crate::record::Record;

/// Summary substituted when the analysis call produced no usable text.
pub const CALL_FAILURE_SUMMARY: &str = "ANALYSIS ERROR";

/// Summary substituted when a response had no numbered line for a record.
pub const PARSE_FAILURE_SUMMARY: &str = "PARSING ERROR - MANUAL REVIEW NEEDED";

/// How a summary was obtained.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryKind {
    /// Recovered from a numbered line of the response
    Parsed,
    /// The call failed after all retries
    CallFailure,
    /// The response had no line for this record
    ParseFailure,
}

/// Counts heuristically extracted from a summary.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Estimates {
    pub primary: Option<u32>,
    pub secondary: Option<u32>,
}

/// Enrichment result for one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrubResult {
    pub record_id: RecordId,
    pub row_index: usize,
    pub name: String,
    pub website: Option<String>,
    pub owner: Option<String>,
    /// Source row, unchanged
    pub fields: Vec<String>,
    pub summary: String,
    pub kind: SummaryKind,
    pub numeric_estimate_primary: Option<u32>,
    pub numeric_estimate_secondary: Option<u32>,
}

impl ScrubResult {
    pub fn parsed(record: &Record, summary: impl Into<String>, estimates: Estimates) -> Self {
        Self::build(record, summary.into(), SummaryKind::Parsed, estimates)
    }

    pub fn call_failure(record: &Record) -> Self {
        Self::build(
            record,
            CALL_FAILURE_SUMMARY.to_string(),
            SummaryKind::CallFailure,
            Estimates::default(),
        )
    }

    pub fn parse_failure(record: &Record) -> Self {
        Self::build(
            record,
            PARSE_FAILURE_SUMMARY.to_string(),
            SummaryKind::ParseFailure,
            Estimates::default(),
        )
    }

    fn build(record: &Record, summary: String, kind: SummaryKind, estimates: Estimates) -> Self {
        Self {
            record_id: record.id.clone(),
            row_index: record.row_index,
            name: record.name.clone(),
            website: record.website.clone(),
            owner: record.owner.clone(),
            fields: record.fields.clone(),
            summary,
            kind,
            numeric_estimate_primary: estimates.primary,
            numeric_estimate_secondary: estimates.secondary,
        }
    }
}
