//! # Statship Scheduler
//!
//! Scheduled report dispatch: due-job selection, per-channel same-day
//! idempotency, partial-failure-tolerant delivery, and run logging.
//!
//! ## Architecture
//! ```text
//! Engine (tokio interval, one tick per minute)
//!   └── Dispatcher.run_due_jobs(now)
//!         ├── clock: is the job's wall-clock slot within ±30s of now?
//!         ├── channels: which targets still need today's report?
//!         ├── summary → email / webhook transports (failures isolated)
//!         └── runlog → SQLite (one run per execution, append-only details)
//! ```
//!
//! Every execution leaves exactly one run row, even when everything was
//! already delivered (a skipped run) or the summary fetch blew up (a failed
//! run). Re-running within the same UTC day only touches channels without a
//! recorded success.

pub mod channels;
pub mod clock;
pub mod dispatch;
pub mod engine;
pub mod runlog;
pub mod store;

pub use channels::{Channel, resolve_channels, unsatisfied_channels};
pub use clock::{DUE_TOLERANCE_SECS, is_due, project_next_runs};
pub use dispatch::Dispatcher;
pub use engine::run_scheduler;
pub use runlog::{DetailStatus, Run, RunDetail, RunScope, RunStatus, CHANNEL_EMAIL, CHANNEL_GLOBAL};
pub use store::SchedulerDb;
