//! Record model: normalizes heterogeneous input rows into a canonical shape.
//!
//! Input tables come from different exports with inconsistently named columns
//! ("SFDC ID", "Account Name", "website", ...). Each job carries a
//! [`ColumnMapping`] that is resolved once against the table headers; rows are
//! then read by column index only.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::RecordId;

/// Which input columns hold the canonical record attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    /// Stable id column; rows are keyed by row number when absent.
    pub id: Option<String>,
    pub name: String,
    pub website: Option<String>,
    pub owner: Option<String>,
}

impl ColumnMapping {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            website: None,
            owner: None,
        }
    }

    pub fn with_id(mut self, column: impl Into<String>) -> Self {
        self.id = Some(column.into());
        self
    }

    pub fn with_website(mut self, column: impl Into<String>) -> Self {
        self.website = Some(column.into());
        self
    }

    pub fn with_owner(mut self, column: impl Into<String>) -> Self {
        self.owner = Some(column.into());
        self
    }

    /// Resolve column names to header positions.
    ///
    /// Exact matches win; otherwise a single case-insensitive, whitespace-trimmed
    /// match is accepted. Every configured column must resolve.
    pub fn resolve(&self, headers: &[String]) -> DomainResult<ResolvedColumns> {
        let optional = |column: &Option<String>| -> DomainResult<Option<usize>> {
            column.as_deref().map(|c| find_header(headers, c)).transpose()
        };

        Ok(ResolvedColumns {
            id: optional(&self.id)?,
            name: find_header(headers, &self.name)?,
            website: optional(&self.website)?,
            owner: optional(&self.owner)?,
        })
    }
}

fn find_header(headers: &[String], column: &str) -> DomainResult<usize> {
    if let Some(pos) = headers.iter().position(|h| h == column) {
        return Ok(pos);
    }

    let wanted = column.trim().to_lowercase();
    let mut matches = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.trim().to_lowercase() == wanted)
        .map(|(i, _)| i);

    match (matches.next(), matches.next()) {
        (Some(pos), None) => Ok(pos),
        (Some(_), Some(_)) => Err(DomainError::validation(format!(
            "column '{}' matches more than one header",
            column
        ))),
        (None, _) => Err(DomainError::validation(format!(
            "column '{}' not found in input headers",
            column
        ))),
    }
}

/// Header positions of the mapped columns.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    pub id: Option<usize>,
    pub name: usize,
    pub website: Option<usize>,
    pub owner: Option<usize>,
}

/// A parsed tabular input artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl InputTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One organization to be researched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    /// Position of the source row in the input table (0-based)
    pub row_index: usize,
    pub name: String,
    pub website: Option<String>,
    pub owner: Option<String>,
    /// The full source row, carried unchanged into the output
    pub fields: Vec<String>,
}

/// Why a row was excluded before batching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingId,
    DuplicateId(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based row number (header excluded)
    pub row_number: usize,
    pub reason: SkipReason,
}

/// Records that entered batching, plus the rows that did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedRecords {
    pub records: Vec<Record>,
    pub skipped: Vec<SkippedRow>,
}

impl NormalizedRecords {
    /// Normalize every row of `table` using `mapping`.
    ///
    /// Rows without a resolvable id, or repeating an id already seen in this
    /// table, are excluded: they cannot be matched against stored results.
    pub fn from_table(table: &InputTable, mapping: &ColumnMapping) -> DomainResult<Self> {
        let columns = mapping.resolve(&table.headers)?;
        let mut seen = HashSet::new();
        let mut out = NormalizedRecords::default();

        for (row_index, row) in table.rows.iter().enumerate() {
            let row_number = row_index + 1;

            let id = match columns.id {
                Some(col) => match cell(row, col).map(RecordId::parse) {
                    Some(Ok(id)) => id,
                    _ => {
                        out.skipped.push(SkippedRow {
                            row_number,
                            reason: SkipReason::MissingId,
                        });
                        continue;
                    }
                },
                None => RecordId::from_row(row_number),
            };

            if !seen.insert(id.clone()) {
                out.skipped.push(SkippedRow {
                    row_number,
                    reason: SkipReason::DuplicateId(id),
                });
                continue;
            }

            out.records.push(Record {
                id,
                row_index,
                name: cell(row, columns.name).unwrap_or_default().to_string(),
                website: columns.website.and_then(|c| cell(row, c)).map(str::to_string),
                owner: columns.owner.and_then(|c| cell(row, c)).map(str::to_string),
                fields: row.clone(),
            });
        }

        Ok(out)
    }
}

/// Trimmed cell value; blank cells read as absent.
fn cell(row: &[String], col: usize) -> Option<&str> {
    row.get(col).map(|v| v.trim()).filter(|v| !v.is_empty())
}
