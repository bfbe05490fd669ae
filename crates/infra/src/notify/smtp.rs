//! SMTP delivery over STARTTLS.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::instrument;

use super::{COMPLETION_SUBJECT, CompletionNotice, Notifier, NotifyError};

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; defaults to the username when unset.
    pub from: Option<String>,
}

/// Sends completion notices with the result file attached.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(settings: SmtpSettings) -> Result<Self, NotifyError> {
        let from_raw = settings.from.clone().unwrap_or_else(|| settings.username.clone());
        let from = parse_mailbox(&from_raw)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
            .map_err(|e| NotifyError::Delivery(e.to_string()))?
            .port(settings.port)
            .credentials(Credentials::new(settings.username, settings.password))
            .build();

        Ok(Self { transport, from })
    }

    fn build_message(&self, notice: &CompletionNotice) -> Result<Message, NotifyError> {
        let to = parse_mailbox(&notice.recipient)?;
        let csv = ContentType::parse("text/csv").map_err(|e| NotifyError::Message(e.to_string()))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(COMPLETION_SUBJECT)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(notice.body()))
                    .singlepart(Attachment::new(notice.attachment_name()).body(notice.attachment.clone(), csv)),
            )
            .map_err(|e| NotifyError::Message(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip(self, notice), fields(job_id = %notice.job_id), err)]
    async fn notify(&self, notice: &CompletionNotice) -> Result<(), NotifyError> {
        let message = self.build_message(notice)?;
        self.transport
            .send(message)
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;
        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|e: lettre::address::AddressError| NotifyError::Address {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
