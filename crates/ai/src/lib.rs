//! `scrub-ai`
//!
//! **Responsibility:** the boundary to the external text-generation service.
//!
//! This crate stays storage-agnostic and transport-agnostic:
//! - It builds the numbered batch prompt and defines the [`AnalysisClient`] seam.
//! - It drives bounded retry with exponential backoff, reporting failures as data.
//! - It maps free-text responses back onto the originating batch.
//!
//! Concrete HTTP clients live in `scrub-infra`.

pub mod client;
pub mod estimates;
pub mod parser;
pub mod prompt;
pub mod retry;

pub use client::{AnalysisClient, AnalysisError, CallOutcome};
pub use estimates::extract_estimates;
pub use parser::{MAX_SUMMARY_CHARS, parse_batch, parse_numbered_lines};
pub use prompt::{AnalysisRequest, GenerationSettings, SYSTEM_INSTRUCTION, VERDICT_TEMPLATES};
pub use retry::{AttemptFailure, BatchResponse, RetryPolicy, RetryReport, analyze_with_retry};
