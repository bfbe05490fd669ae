//! Bounded retry with exponential backoff for batch calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use scrub_core::Sleeper;

use crate::client::{AnalysisClient, CallOutcome};
use crate::prompt::AnalysisRequest;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of calls allowed per batch (first call included)
    pub max_attempts: u32,
    /// Base delay between calls
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            ..Default::default()
        }
    }

    /// Delay after the failed call `attempt` (0-based): `base * 2^attempt`, capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether another call is allowed after `attempts` calls have been made.
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_attempts
    }
}

/// Result of driving one batch through the retry policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResponse {
    Text(String),
    /// Soft failure: no text after exhausting (or abandoning) retries
    Failed { attempts: u32, last_error: String },
}

impl BatchResponse {
    pub fn text(&self) -> Option<&str> {
        match self {
            BatchResponse::Text(text) => Some(text),
            BatchResponse::Failed { .. } => None,
        }
    }
}

/// A failed call, recorded for the job's audit trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    /// 1-based attempt number
    pub attempt: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryReport {
    pub response: BatchResponse,
    pub failures: Vec<AttemptFailure>,
}

/// Send `request` until it succeeds, fails terminally, or the policy is exhausted.
///
/// Every retry re-sends the identical request. Backoff sleeps happen between
/// calls only, never after the last one.
pub async fn analyze_with_retry<C, S>(
    client: &C,
    request: &AnalysisRequest,
    policy: &RetryPolicy,
    sleeper: &S,
) -> RetryReport
where
    C: AnalysisClient + ?Sized,
    S: Sleeper + ?Sized,
{
    let mut failures = Vec::new();
    let mut attempt: u32 = 0;

    loop {
        let outcome = client.complete(request).await;
        attempt += 1;

        let (reason, retryable) = match outcome {
            CallOutcome::Success(text) => {
                return RetryReport {
                    response: BatchResponse::Text(text),
                    failures,
                };
            }
            CallOutcome::Retryable(reason) => (reason, true),
            CallOutcome::Terminal(reason) => (reason, false),
        };

        warn!(attempt, retryable, error = %reason, "analysis call failed");
        failures.push(AttemptFailure {
            attempt,
            reason: reason.clone(),
        });

        if !retryable || !policy.should_retry(attempt) {
            return RetryReport {
                response: BatchResponse::Failed {
                    attempts: attempt,
                    last_error: reason,
                },
                failures,
            };
        }

        sleeper.sleep(policy.delay_after(attempt - 1)).await;
    }
}
