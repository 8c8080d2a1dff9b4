//! # Statship Core
//!
//! Shared foundation for all Statship crates: the job/report data model,
//! the configuration system, the error type, and the collaborator traits
//! the dispatch orchestrator is generic over.

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::StatshipConfig;
pub use error::{Result, StatshipError};
pub use types::{
    Frequency, Instance, Job, Metric, ReportType, SendOutcome, Sender, Summary, WebhookRecipient,
};
