//! Channel resolution and same-day idempotency.
//!
//! Frequencies are day-or-coarser, so at most one successful delivery per
//! channel per calendar day (UTC) is wanted even though the due window can
//! match on several consecutive ticks.

use statship_core::types::{Job, WebhookRecipient};

use crate::runlog::{CHANNEL_EMAIL, DetailStatus, Run};

/// One delivery target of a job.
#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    /// The implicit email channel; present iff the job has a sender.
    Email { sender_id: i64 },
    /// One configured webhook recipient.
    Webhook(WebhookRecipient),
}

impl Channel {
    /// Channel name as recorded in run details.
    pub fn kind(&self) -> &str {
        match self {
            Channel::Email { .. } => CHANNEL_EMAIL,
            Channel::Webhook(wh) => &wh.kind,
        }
    }

    /// Sender id for email, webhook id otherwise.
    pub fn target_id(&self) -> i64 {
        match self {
            Channel::Email { sender_id } => *sender_id,
            Channel::Webhook(wh) => wh.id,
        }
    }
}

/// Resolve a job's delivery channels.
///
/// The email channel exists whenever a sender is configured, even with an
/// empty recipient list — emptiness is a send-time skip, not a resolution
/// gap. `recipients` is the already-resolved webhook set; ids that no
/// longer exist were dropped during lookup.
pub fn resolve_channels(job: &Job, recipients: Vec<WebhookRecipient>) -> Vec<Channel> {
    let mut channels = Vec::with_capacity(recipients.len() + 1);
    if let Some(sender_id) = job.sender_id {
        channels.push(Channel::Email { sender_id });
    }
    channels.extend(recipients.into_iter().map(Channel::Webhook));
    channels
}

/// Channels not yet satisfied by one of today's prior runs.
///
/// A channel is satisfied only by a detail entry with matching kind and
/// target id and status `success`; failed or skipped attempts leave the
/// channel eligible for retry on later ticks the same day. `force` bypasses
/// the guard entirely.
pub fn unsatisfied_channels(
    channels: &[Channel],
    todays_runs: &[Run],
    force: bool,
) -> Vec<Channel> {
    if force {
        return channels.to_vec();
    }
    channels
        .iter()
        .filter(|ch| !had_success_today(ch, todays_runs))
        .cloned()
        .collect()
}

fn had_success_today(channel: &Channel, todays_runs: &[Run]) -> bool {
    todays_runs.iter().any(|run| {
        run.details.iter().any(|d| {
            d.channel == channel.kind()
                && d.target_id == Some(channel.target_id())
                && d.status == DetailStatus::Success
        })
    })
}
