//! Scheduler engine — the main loop that wakes up once per tick and hands
//! the current instant to the dispatcher. Uses tokio::interval (sleeps
//! between checks). Each tick runs as its own task so a slow sweep never
//! delays the timer; the per-job locks in the dispatcher keep overlapping
//! sweeps from double-sending.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::dispatch::Dispatcher;
use crate::store::SchedulerDb;

/// Run the scheduler loop until the process exits.
pub async fn run_scheduler(db: Arc<SchedulerDb>, dispatcher: Arc<Dispatcher>, tick_secs: u64) {
    tracing::info!("⏰ Scheduler started (check every {}s)", tick_secs);

    let mut interval = tokio::time::interval(Duration::from_secs(tick_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        let db = db.clone();
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher.run_due_jobs(&db, Utc::now()).await;
        });
    }
}
