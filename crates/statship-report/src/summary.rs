//! Summary generation — resolves the job's instance, pulls stats, and shapes
//! them into the payload transports render.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use statship_core::error::{Result, StatshipError};
use statship_core::traits::SummarySource;
use statship_core::types::{Frequency, Instance, Job, Metric, ReportType, Summary};

use crate::client::{AnalyticsClient, bounce_rate, format_total_time};

/// Resolves a job's instance id to the instance record. A callback rather
/// than a store reference keeps this crate free of persistence concerns.
pub type InstanceResolver = Arc<dyn Fn(i64) -> Option<Instance> + Send + Sync>;

/// The production [`SummarySource`]: HTTP against the job's analytics
/// instance.
pub struct HttpSummarySource {
    client: AnalyticsClient,
    resolver: InstanceResolver,
}

impl HttpSummarySource {
    pub fn new(timeout: Duration, resolver: InstanceResolver) -> Self {
        Self {
            client: AnalyticsClient::new(timeout),
            resolver,
        }
    }

    fn report_window(job: &Job, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let span = match job.frequency {
            Frequency::Daily => ChronoDuration::hours(24),
            Frequency::Weekly => ChronoDuration::days(7),
            Frequency::Monthly => ChronoDuration::days(30),
        };
        (now - span, now)
    }

    fn period_text(job: &Job) -> String {
        let span = match job.frequency {
            Frequency::Daily => "last 24 hours",
            Frequency::Weekly => "last 7 days",
            Frequency::Monthly => "last 30 days",
        };
        format!("{span} ({})", job.timezone)
    }
}

#[async_trait]
impl SummarySource for HttpSummarySource {
    async fn generate_summary(&self, job: &Job) -> Result<Summary> {
        let instance = (self.resolver)(job.instance_id).ok_or_else(|| {
            StatshipError::Summary(format!("No analytics instance found for ID {}", job.instance_id))
        })?;

        if job.report_type == ReportType::Report {
            // Saved reports are not exposed by the stats endpoint. Jobs of
            // this type fall back to headline stats until the reports API
            // lands; the report id is carried in the payload for templates.
            tracing::debug!("📊 Job '{}' uses report_type=report, fetching stats", job.name);
        }

        let now = Utc::now();
        let (start, end) = Self::report_window(job, now);
        let stats = self
            .client
            .website_stats(
                &instance,
                &job.website_id,
                start.timestamp_millis(),
                end.timestamp_millis(),
            )
            .await?;

        let all_metrics = [
            ("pageviews", stats.pageviews.clone()),
            ("visitors", stats.visitors.clone()),
            ("visits", stats.visits.clone()),
            ("bounces", stats.bounces.clone()),
            ("totaltime", stats.totaltime.clone()),
        ];

        let wanted = &job.summary_items;
        let metrics: Vec<Metric> = all_metrics
            .into_iter()
            .filter(|(key, _)| wanted.is_empty() || wanted.iter().any(|w| w == key))
            .map(|(key, v)| Metric {
                key: key.to_string(),
                value: v.value,
                change: v.prev.map(|p| v.value - p),
            })
            .collect();

        if metrics.is_empty() {
            return Err(StatshipError::Summary("No summary data returned.".into()));
        }

        tracing::debug!(
            "📊 Summary for '{}': {} metric(s), bounce rate {}, total time {}",
            job.name,
            metrics.len(),
            bounce_rate(stats.visits.value, stats.bounces.value),
            format_total_time(stats.totaltime.value),
        );

        Ok(Summary {
            name: job.name.clone(),
            website_id: job.website_id.clone(),
            period: Self::period_text(job),
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn job(frequency: Frequency) -> Job {
        Job {
            id: 1,
            name: "Weekly traffic".into(),
            sender_id: None,
            instance_id: 1,
            website_id: "site-1".into(),
            report_type: ReportType::Summary,
            summary_items: vec![],
            report_id: None,
            frequency,
            day: None,
            execution_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            email_recipients: vec![],
            webhook_recipients: vec![],
            timezone: "Europe/Berlin".into(),
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_report_window_spans() {
        let now = Utc::now();
        let (start, end) = HttpSummarySource::report_window(&job(Frequency::Daily), now);
        assert_eq!(end - start, ChronoDuration::hours(24));
        let (start, _) = HttpSummarySource::report_window(&job(Frequency::Monthly), now);
        assert_eq!(now - start, ChronoDuration::days(30));
    }

    #[test]
    fn test_period_text_carries_timezone() {
        let text = HttpSummarySource::period_text(&job(Frequency::Weekly));
        assert_eq!(text, "last 7 days (Europe/Berlin)");
    }

    #[tokio::test]
    async fn test_missing_instance_is_summary_fatal() {
        let source = HttpSummarySource::new(Duration::from_secs(5), Arc::new(|_| None));
        let err = source.generate_summary(&job(Frequency::Daily)).await.unwrap_err();
        assert!(err.to_string().contains("No analytics instance"));
    }
}
