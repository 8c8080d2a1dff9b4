//! Collaborator seams the dispatch orchestrator calls across.
//!
//! Summary generation and transports live behind traits so the scheduler can
//! be exercised with mocks and swapped implementations.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Job, SendOutcome, Sender, Summary, WebhookRecipient};

/// Produces the analytics payload for a job.
#[async_trait]
pub trait SummarySource: Send + Sync {
    /// Fetch and shape the summary for `job`. An error here is fatal to the
    /// whole run — no channel has content to send without it.
    async fn generate_summary(&self, job: &Job) -> Result<Summary>;
}

/// Renders and sends the email form of a report.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(&self, job: &Job, sender: &Sender, summary: &Summary) -> SendOutcome;
}

/// Renders and sends the webhook form of a report.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn send_webhook(
        &self,
        job: &Job,
        summary: &Summary,
        webhook: &WebhookRecipient,
    ) -> SendOutcome;
}
