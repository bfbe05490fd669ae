//! Response parser: maps a numbered free-text response back onto its batch.
//!
//! The result always has exactly one entry per input record, in input order,
//! whatever the response looks like.

use scrub_core::{Record, ScrubResult};

use crate::estimates::extract_estimates;
use crate::retry::BatchResponse;

/// Longest summary kept verbatim; longer ones are cut to 497 chars plus `...`.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// Results for a batch, using call-failure placeholders when no text came back.
///
/// A blank reply counts as no reply.
pub fn parse_batch(response: &BatchResponse, records: &[Record]) -> Vec<ScrubResult> {
    match response.text() {
        Some(text) if !text.trim().is_empty() => parse_numbered_lines(text, records),
        _ => records.iter().map(ScrubResult::call_failure).collect(),
    }
}

/// Scan `text` for a line starting with `<i>.` for every record position `i`.
///
/// The first matching line wins. Positions without a matching line receive
/// the parse-failure placeholder; siblings are unaffected.
pub fn parse_numbered_lines(text: &str, records: &[Record]) -> Vec<ScrubResult> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let marker = format!("{}.", i + 1);
            match lines.iter().find_map(|line| line.strip_prefix(marker.as_str())) {
                Some(rest) => {
                    let summary = truncate_summary(rest.trim());
                    let estimates = extract_estimates(&summary);
                    ScrubResult::parsed(record, summary, estimates)
                }
                None => ScrubResult::parse_failure(record),
            }
        })
        .collect()
}

fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() <= MAX_SUMMARY_CHARS {
        return summary.to_string();
    }
    let head: String = summary.chars().take(MAX_SUMMARY_CHARS - 3).collect();
    format!("{}...", head.trim_end())
}
