//! Core data model — jobs, delivery targets, and report summaries.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Frequency::Daily),
            "weekly" => Some(Frequency::Weekly),
            "monthly" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What kind of report a job produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// Headline website metrics plus selected summary items.
    Summary,
    /// A saved report on the analytics instance, referenced by id.
    Report,
}

impl Default for ReportType {
    fn default() -> Self {
        ReportType::Summary
    }
}

/// A report job: schedule + delivery configuration for one recurring report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: i64,
    pub name: String,
    /// SMTP sender to use; None means no email channel.
    pub sender_id: Option<i64>,
    /// Analytics instance the report is pulled from.
    pub instance_id: i64,
    /// Website on that instance.
    pub website_id: String,
    #[serde(default)]
    pub report_type: ReportType,
    /// Metric names to include when `report_type` is `summary`.
    #[serde(default)]
    pub summary_items: Vec<String>,
    /// Saved report id when `report_type` is `report`.
    #[serde(default)]
    pub report_id: Option<String>,
    pub frequency: Frequency,
    /// Weekday 0–6 (Monday = 0) for weekly, day-of-month 1–31 for monthly.
    /// Unused for daily.
    pub day: Option<u32>,
    /// Time-of-day the job fires, stored in UTC.
    pub execution_time: NaiveTime,
    #[serde(default)]
    pub email_recipients: Vec<String>,
    #[serde(default)]
    pub webhook_recipients: Vec<i64>,
    /// Informational only — frames the report period text, never the schedule.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

fn default_timezone() -> String {
    "Europe/Berlin".into()
}
fn default_true() -> bool {
    true
}

/// An SMTP account jobs can send email through.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    pub id: i64,
    pub name: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    /// From address, e.g. "Reports <reports@example.com>".
    pub from_address: String,
}

/// An analytics instance reports are pulled from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: i64,
    pub name: String,
    /// Base URL, e.g. "https://stats.example.com".
    pub base_url: String,
    pub api_token: String,
}

/// A webhook delivery target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookRecipient {
    pub id: i64,
    pub name: String,
    pub url: String,
    /// Channel kind, e.g. "DISCORD", "TEAMS", "WEBHOOK". Doubles as the
    /// channel name in run details.
    pub kind: String,
}

/// A single metric in a report summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub key: String,
    pub value: i64,
    /// Change against the previous period, if the API reported one.
    #[serde(default)]
    pub change: Option<i64>,
}

/// The analytics payload a job delivers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Job name, used as the report title.
    pub name: String,
    /// Website this summary covers.
    pub website_id: String,
    /// Human-readable period framing, e.g. "last 7 days (Europe/Berlin)".
    pub period: String,
    pub metrics: Vec<Metric>,
}

impl Summary {
    pub fn metric(&self, key: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.key == key)
    }
}

/// Outcome of one channel delivery attempt.
///
/// Transports return this instead of encoding "nothing to send" into error
/// messages, so the orchestrator never parses strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The message went out.
    Sent,
    /// Nothing to send for this channel (e.g. no recipients configured).
    /// Not an error.
    Skipped(String),
    /// Rendering or transport failed.
    Failed(String),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, SendOutcome::Sent)
    }
}
