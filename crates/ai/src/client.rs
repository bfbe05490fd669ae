//! The analysis service seam.

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::AnalysisRequest;

/// Outcome of one call to the analysis service.
///
/// Failures are data, not control flow: the retry driver decides what to do
/// with each variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The service returned response text
    Success(String),
    /// A transient failure; the same request may be sent again
    Retryable(String),
    /// Retrying cannot help (e.g. rejected credentials)
    Terminal(String),
}

/// A client for the external text-generation service.
///
/// Implementations must send the request as one call and never panic.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn complete(&self, request: &AnalysisRequest) -> CallOutcome;
}

#[async_trait]
impl<C: AnalysisClient + ?Sized> AnalysisClient for std::sync::Arc<C> {
    async fn complete(&self, request: &AnalysisRequest) -> CallOutcome {
        (**self).complete(request).await
    }
}

/// Failure of a single call, before classification.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response envelope: {0}")]
    MalformedEnvelope(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Whether sending the identical request again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AnalysisError::Transport(_) | AnalysisError::MalformedEnvelope(_) => true,
            AnalysisError::Status { status, .. } => {
                *status == 408 || *status == 429 || *status >= 500
            }
            AnalysisError::Config(_) => false,
        }
    }

    pub fn into_outcome(self) -> CallOutcome {
        if self.is_retryable() {
            CallOutcome::Retryable(self.to_string())
        } else {
            CallOutcome::Terminal(self.to_string())
        }
    }
}
