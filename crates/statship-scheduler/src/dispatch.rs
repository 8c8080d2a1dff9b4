//! Dispatch orchestrator — turns due jobs into runs.
//!
//! One run per job execution: resolve channels, drop the ones already
//! satisfied today, fetch the summary, deliver per channel with failures
//! isolated, close the run with an aggregated status. Nothing that happens
//! inside one job's processing can stop the rest of the batch.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use statship_core::error::Result;
use statship_core::traits::{EmailTransport, SummarySource, WebhookTransport};
use statship_core::types::{Frequency, Job, SendOutcome};

use crate::channels::{Channel, resolve_channels, unsatisfied_channels};
use crate::clock;
use crate::runlog::{CHANNEL_GLOBAL, DetailStatus, RunScope};
use crate::store::SchedulerDb;

/// Per-job locks serializing the guard-read + run-open sequence, so a forced
/// run racing a scheduled run can never double-send.
///
/// In-process only: a `run` invocation from a second process can still race
/// the serve loop's guard window. Single-process deployment is assumed.
#[derive(Default)]
struct JobLocks {
    locks: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl JobLocks {
    fn lock_for(&self, job_id: i64) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.entry(job_id).or_default().clone()
    }
}

/// The dispatch orchestrator. Holds the collaborators and drives the run
/// lifecycle; all persistence goes through the store it is handed per call.
pub struct Dispatcher {
    summary_source: Arc<dyn SummarySource>,
    email: Arc<dyn EmailTransport>,
    webhook: Arc<dyn WebhookTransport>,
    locks: JobLocks,
}

impl Dispatcher {
    pub fn new(
        summary_source: Arc<dyn SummarySource>,
        email: Arc<dyn EmailTransport>,
        webhook: Arc<dyn WebhookTransport>,
    ) -> Self {
        Self {
            summary_source,
            email,
            webhook,
            locks: JobLocks::default(),
        }
    }

    /// One timer tick: sweep the three frequencies and process whatever is
    /// due at `now`. Sweep-level errors are logged, never propagated — the
    /// next tick gets a fresh chance.
    pub async fn run_due_jobs(&self, db: &SchedulerDb, now: DateTime<Utc>) {
        for frequency in [Frequency::Daily, Frequency::Weekly, Frequency::Monthly] {
            let jobs = match db.list_active_jobs(frequency) {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::error!("Sweep {frequency}: failed to list jobs: {e}");
                    continue;
                }
            };
            let due: Vec<Job> = jobs.into_iter().filter(|j| clock::is_due(j, now)).collect();
            if !due.is_empty() {
                tracing::info!("🔔 Sweep {frequency}: {} job(s) due", due.len());
                self.process_jobs(db, &due, now, false).await;
            }
        }
    }

    /// Process a batch of jobs. `force` bypasses the idempotency guard (the
    /// "run now" override). Per-job errors are isolated: an unexpected
    /// failure is recorded on that job's run, logged, and the batch moves on.
    pub async fn process_jobs(&self, db: &SchedulerDb, jobs: &[Job], now: DateTime<Utc>, force: bool) {
        for job in jobs {
            if let Err(e) = self.process_job(db, job, now, force).await {
                tracing::error!("💥 Job '{}' run hit an unexpected error: {e}", job.name);
            }
        }
    }

    async fn process_job(
        &self,
        db: &SchedulerDb,
        job: &Job,
        now: DateTime<Utc>,
        force: bool,
    ) -> Result<()> {
        // Serialize guard-read + run-open per job id; a slow previous tick
        // or a concurrent forced run waits here instead of double-sending.
        let lock = self.locks.lock_for(job.id);
        let _guard = lock.lock().await;

        // Prior runs only: the guard reads history before this run opens.
        let todays_runs = db.runs_on_day(job.id, now.date_naive())?;

        let mut scope = db.open_run(job.id, now)?;
        let result = self
            .execute_run(db, job, &todays_runs, &mut scope, force)
            .await;
        if let Err(e) = &result {
            // Unexpected error: record it, still close and persist the run,
            // then let the batch-level logging see it.
            scope.append(CHANNEL_GLOBAL, None, DetailStatus::Failed, Some(e.to_string()));
        }
        // Close against the same injected instant the guard day-matched on,
        // so the run is visible to later ticks of that day.
        let run = db.close_run(scope, now)?;
        tracing::info!(
            "🏁 Job '{}' run #{} finished: {} ({} ok / {} failed / {} skipped)",
            job.name,
            run.id,
            run.status,
            run.count_success,
            run.count_failed,
            run.count_skipped
        );
        result
    }

    /// The fallible middle of a run. Expected delivery outcomes become
    /// detail entries; only genuinely unexpected errors (store access and
    /// the like) bubble up to `process_job`.
    async fn execute_run(
        &self,
        db: &SchedulerDb,
        job: &Job,
        todays_runs: &[crate::runlog::Run],
        scope: &mut RunScope,
        force: bool,
    ) -> Result<()> {
        let recipients = db.list_webhook_recipients(&job.webhook_recipients)?;
        let channels = resolve_channels(job, recipients);
        let targets = unsatisfied_channels(&channels, todays_runs, force);

        if !force && targets.is_empty() {
            scope.append(
                CHANNEL_GLOBAL,
                None,
                DetailStatus::Skipped,
                Some("Nothing to send: already completed for today.".into()),
            );
            return Ok(());
        }

        // Summary failure is fatal to the whole run: no channel has content.
        let summary = match self.summary_source.generate_summary(job).await {
            Ok(summary) => summary,
            Err(e) => {
                scope.append(CHANNEL_GLOBAL, None, DetailStatus::Failed, Some(e.to_string()));
                return Ok(());
            }
        };

        for channel in &targets {
            let outcome = match channel {
                Channel::Email { sender_id } => match db.get_sender(*sender_id)? {
                    Some(sender) => self.email.send_email(job, &sender, &summary).await,
                    None => SendOutcome::Failed(format!("No sender found for ID {sender_id}")),
                },
                Channel::Webhook(wh) => self.webhook.send_webhook(job, &summary, wh).await,
            };
            let (status, error) = match outcome {
                SendOutcome::Sent => (DetailStatus::Success, None),
                SendOutcome::Skipped(reason) => (DetailStatus::Skipped, Some(reason)),
                SendOutcome::Failed(reason) => {
                    tracing::warn!(
                        "⚠️ Job '{}' channel {} ({}) failed: {reason}",
                        job.name,
                        channel.kind(),
                        channel.target_id()
                    );
                    (DetailStatus::Failed, Some(reason))
                }
            };
            scope.append(channel.kind(), Some(channel.target_id()), status, error);
        }
        Ok(())
    }
}
