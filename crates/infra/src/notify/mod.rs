//! Completion notifications.

mod smtp;

pub use smtp::{SmtpNotifier, SmtpSettings};

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use scrub_core::JobId;

pub const COMPLETION_SUBJECT: &str = "Your Company Analysis is Complete!";

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("invalid address {address}: {reason}")]
    Address { address: String, reason: String },
    #[error("failed to build message: {0}")]
    Message(String),
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// A "your results are ready" message for the job's requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub job_id: JobId,
    pub recipient: String,
    pub total_records: u32,
    pub attachment: Vec<u8>,
}

impl CompletionNotice {
    pub fn attachment_name(&self) -> String {
        format!("results_{}.csv", self.job_id)
    }

    pub fn body(&self) -> String {
        format!(
            "Your company analysis job has completed successfully!\n\n\
             Total companies processed: {}\n\n\
             Please find your results attached.\n\n\
             You can also download your results from the dashboard.\n",
            self.total_records
        )
    }
}

/// Delivers completion notices. Failures are reported, never retried here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &CompletionNotice) -> Result<(), NotifyError>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        (**self).notify(notice).await
    }
}

/// Used when no mail relay is configured: the notice is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        info!(
            job_id = %notice.job_id,
            recipient = %notice.recipient,
            attachment = %notice.attachment_name(),
            "mail relay not configured; skipping completion notice"
        );
        Ok(())
    }
}

/// Records notices in memory; can be told to fail.
#[derive(Debug, Default)]
pub struct InMemoryNotifier {
    sent: Mutex<Vec<CompletionNotice>>,
    fail_with: Option<String>,
}

impl InMemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_with: Some(reason.into()),
        }
    }

    pub fn sent(&self) -> Vec<CompletionNotice> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        if let Some(reason) = &self.fail_with {
            return Err(NotifyError::Delivery(reason.clone()));
        }
        self.sent.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_mentions_total() {
        let notice = CompletionNotice {
            job_id: JobId::new(),
            recipient: "ae@example.com".into(),
            total_records: 42,
            attachment: Vec::new(),
        };
        assert!(notice.body().contains("Total companies processed: 42"));
        assert_eq!(notice.attachment_name(), format!("results_{}.csv", notice.job_id));
    }
}
