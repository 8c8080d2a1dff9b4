//! # Statship Report
//!
//! Analytics summary retrieval: a thin HTTP client for Umami-compatible
//! stats APIs and the [`HttpSummarySource`] collaborator the dispatch
//! orchestrator asks for report payloads.

pub mod client;
pub mod summary;

pub use client::{AnalyticsClient, WebsiteStats};
pub use summary::{HttpSummarySource, InstanceResolver};
