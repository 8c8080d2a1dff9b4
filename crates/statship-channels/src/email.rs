//! Email report delivery — async SMTP via lettre.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use statship_core::traits::EmailTransport;
use statship_core::types::{Job, SendOutcome, Sender, Summary};

use crate::render::{render_html, render_text};

/// SMTP email transport. One instance serves all senders; connection
/// parameters come from the per-job [`Sender`] record.
pub struct SmtpEmailTransport {
    timeout: std::time::Duration,
}

impl SmtpEmailTransport {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self { timeout }
    }

    async fn deliver(&self, job: &Job, sender: &Sender, summary: &Summary) -> Result<(), String> {
        let from: Mailbox = sender
            .from_address
            .parse()
            .map_err(|e| format!("Invalid from address: {e}"))?;

        let mut builder = Message::builder().from(from).subject(job.name.clone());
        for recipient in &job.email_recipients {
            let to: Mailbox = recipient
                .parse()
                .map_err(|e| format!("Invalid recipient '{recipient}': {e}"))?;
            builder = builder.to(to);
        }

        let email = builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(render_text(summary)),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(render_html(summary)),
                    ),
            )
            .map_err(|e| format!("Build email: {e}"))?;

        let creds = Credentials::new(sender.username.clone(), sender.password.clone());
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&sender.smtp_host)
            .map_err(|e| format!("SMTP relay: {e}"))?
            .port(sender.smtp_port)
            .credentials(creds)
            .timeout(Some(self.timeout))
            .build();

        mailer
            .send(email)
            .await
            .map_err(|e| format!("SMTP send: {e}"))?;

        tracing::info!(
            "📤 Report '{}' emailed to {} recipient(s)",
            job.name,
            job.email_recipients.len()
        );
        Ok(())
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send_email(&self, job: &Job, sender: &Sender, summary: &Summary) -> SendOutcome {
        if job.email_recipients.is_empty() {
            return SendOutcome::Skipped("No email recipients specified for the job.".into());
        }
        match self.deliver(job, sender, summary).await {
            Ok(()) => SendOutcome::Sent,
            Err(msg) => SendOutcome::Failed(msg),
        }
    }
}
