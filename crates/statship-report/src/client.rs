//! HTTP client for an Umami-compatible stats API.

use std::time::Duration;

use serde::Deserialize;
use statship_core::error::{Result, StatshipError};
use statship_core::types::Instance;

/// One stat field as the API reports it: current value + change vs the
/// previous period.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatValue {
    #[serde(default)]
    pub value: i64,
    #[serde(default)]
    pub prev: Option<i64>,
}

/// Response of `GET /api/websites/{id}/stats`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebsiteStats {
    #[serde(default)]
    pub pageviews: StatValue,
    #[serde(default)]
    pub visitors: StatValue,
    #[serde(default)]
    pub visits: StatValue,
    #[serde(default)]
    pub bounces: StatValue,
    #[serde(default)]
    pub totaltime: StatValue,
}

/// Thin client around one analytics instance.
pub struct AnalyticsClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl AnalyticsClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Fetch headline stats for a website over `[start_ms, end_ms]`
    /// (unix millis, as the API expects).
    pub async fn website_stats(
        &self,
        instance: &Instance,
        website_id: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<WebsiteStats> {
        let url = format!(
            "{}/api/websites/{}/stats?startAt={}&endAt={}",
            instance.base_url.trim_end_matches('/'),
            website_id,
            start_ms,
            end_ms
        );

        let resp = self
            .http
            .get(&url)
            .bearer_auth(&instance.api_token)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| StatshipError::Summary(format!("Stats request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(StatshipError::Summary(format!(
                "Stats API error {status}: {body}"
            )));
        }

        resp.json::<WebsiteStats>()
            .await
            .map_err(|e| StatshipError::Summary(format!("Stats response decode: {e}")))
    }
}

/// Format a dwell time in seconds as "1d 2h 3m 4s".
pub fn format_total_time(mut secs: i64) -> String {
    if secs <= 0 {
        return "0s".into();
    }
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3_600;
    secs %= 3_600;
    let minutes = secs / 60;
    secs %= 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 {
        parts.push(format!("{minutes}m"));
    }
    if secs > 0 {
        parts.push(format!("{secs}s"));
    }
    parts.join(" ")
}

/// Bounce rate in percent, rounded. Zero visits reads as 0%.
pub fn bounce_rate(visits: i64, bounces: i64) -> String {
    if visits <= 0 {
        return "0%".into();
    }
    let rate = (bounces as f64 / visits as f64) * 100.0;
    format!("{}%", rate.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_total_time() {
        assert_eq!(format_total_time(0), "0s");
        assert_eq!(format_total_time(59), "59s");
        assert_eq!(format_total_time(3_661), "1h 1m 1s");
        assert_eq!(format_total_time(90_000), "1d 1h");
    }

    #[test]
    fn test_bounce_rate() {
        assert_eq!(bounce_rate(0, 5), "0%");
        assert_eq!(bounce_rate(200, 50), "25%");
        assert_eq!(bounce_rate(3, 1), "33%");
    }
}
