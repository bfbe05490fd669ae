//! Batch splitter: fixed-size, order-preserving slices of a job's records.

use crate::error::{DomainError, DomainResult};
use crate::record::Record;

/// An ordered slice of records sent together to the analysis service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position of this batch within the job
    pub number: usize,
    /// Total number of batches in the job
    pub of: usize,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.number == self.of
    }
}

/// Split `records` into `ceil(N / size)` batches of `size`, the last one possibly shorter.
pub fn split_batches(records: Vec<Record>, size: usize) -> DomainResult<Vec<Batch>> {
    if size == 0 {
        return Err(DomainError::validation("batch size must be positive"));
    }

    let of = records.len().div_ceil(size);
    let mut batches = Vec::with_capacity(of);
    let mut iter = records.into_iter().peekable();

    while iter.peek().is_some() {
        let chunk: Vec<Record> = iter.by_ref().take(size).collect();
        batches.push(Batch {
            number: batches.len() + 1,
            of,
            records: chunk,
        });
    }

    Ok(batches)
}
