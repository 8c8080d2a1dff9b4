//! Run records — one per dispatch attempt, with per-channel detail entries.
//!
//! Details are collected append-only in memory while a run executes and
//! persisted atomically when the run closes, so the status aggregation is a
//! pure function over the final list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel name for job-level outcomes that belong to no single target.
pub const CHANNEL_GLOBAL: &str = "GLOBAL";
/// Channel name for the implicit email channel.
pub const CHANNEL_EMAIL: &str = "EMAIL";

/// Aggregated status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Warning,
    Failed,
    Skipped,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Warning => "warning",
            RunStatus::Failed => "failed",
            RunStatus::Skipped => "skipped",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "success" => RunStatus::Success,
            "warning" => RunStatus::Warning,
            "failed" => RunStatus::Failed,
            "skipped" => RunStatus::Skipped,
            _ => RunStatus::Running,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one channel within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Success,
    Skipped,
    Failed,
}

/// One per-channel outcome entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    /// "EMAIL", a webhook kind ("DISCORD", ...), or "GLOBAL".
    pub channel: String,
    /// Sender id for EMAIL, webhook id otherwise; None for GLOBAL entries.
    pub target_id: Option<i64>,
    pub status: DetailStatus,
    pub error: Option<String>,
}

/// One dispatch attempt for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: i64,
    pub job_id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub details: Vec<RunDetail>,
    pub count_success: u32,
    pub count_failed: u32,
    pub count_skipped: u32,
}

impl Run {
    /// The instant dedup compares against: finish time, or start time while
    /// the run is still open.
    pub fn reference_instant(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or(self.started_at)
    }
}

/// Aggregate a run status from its final detail list.
///
/// Empty or all-skipped runs had nothing to do; mixed outcomes downgrade to
/// `warning` so partial failure never reads as clean success, but total
/// failure stays distinguishable.
pub fn aggregate_status(details: &[RunDetail]) -> RunStatus {
    if details.is_empty() {
        return RunStatus::Skipped;
    }
    if details.iter().all(|d| d.status == DetailStatus::Success) {
        return RunStatus::Success;
    }
    if details.iter().all(|d| d.status == DetailStatus::Failed) {
        return RunStatus::Failed;
    }
    if details.iter().all(|d| d.status == DetailStatus::Skipped) {
        return RunStatus::Skipped;
    }
    RunStatus::Warning
}

/// Scoped lifecycle of one open run: append details, then close exactly once.
///
/// The orchestrator appends outcomes as channels complete; closing computes
/// the aggregate status and stamps `finished_at`. Persistence happens in the
/// store when the scope is handed back.
#[derive(Debug)]
pub struct RunScope {
    run: Run,
}

impl RunScope {
    pub fn new(run: Run) -> Self {
        Self { run }
    }

    pub fn run(&self) -> &Run {
        &self.run
    }

    pub fn job_id(&self) -> i64 {
        self.run.job_id
    }

    /// Append one detail entry and bump the matching counter.
    pub fn append(
        &mut self,
        channel: &str,
        target_id: Option<i64>,
        status: DetailStatus,
        error: Option<String>,
    ) {
        match status {
            DetailStatus::Success => self.run.count_success += 1,
            DetailStatus::Failed => self.run.count_failed += 1,
            DetailStatus::Skipped => self.run.count_skipped += 1,
        }
        self.run.details.push(RunDetail {
            channel: channel.to_string(),
            target_id,
            status,
            error,
        });
    }

    /// Close the scope: stamp the finish time and aggregate the status.
    /// Consumes the scope so a run cannot be closed twice.
    pub fn into_closed(mut self, now: DateTime<Utc>) -> Run {
        self.run.finished_at = Some(now);
        self.run.status = aggregate_status(&self.run.details);
        self.run
    }
}
