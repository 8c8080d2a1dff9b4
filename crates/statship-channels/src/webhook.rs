//! Webhook report delivery — Discord embeds, MS Teams cards, generic JSON.

use async_trait::async_trait;
use statship_core::traits::WebhookTransport;
use statship_core::types::{Job, SendOutcome, Summary, WebhookRecipient};

use crate::render::{change_suffix, metric_label};

/// HTTP webhook transport. The recipient's `kind` selects the payload shape.
pub struct HttpWebhookTransport {
    http: reqwest::Client,
    timeout: std::time::Duration,
}

impl HttpWebhookTransport {
    pub fn new(timeout: std::time::Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    async fn post(&self, url: &str, payload: serde_json::Value) -> Result<(), String> {
        let resp = self
            .http
            .post(url)
            .json(&payload)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Webhook send failed: {e}"))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(format!("Webhook error {status}: {body}"))
        }
    }
}

/// Build the payload for one recipient kind.
pub fn build_payload(summary: &Summary, webhook: &WebhookRecipient) -> serde_json::Value {
    match webhook.kind.to_uppercase().as_str() {
        "DISCORD" => {
            let fields: Vec<serde_json::Value> = summary
                .metrics
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "name": metric_label(&m.key),
                        "value": format!("{}{}", m.value, change_suffix(m.change)),
                        "inline": true,
                    })
                })
                .collect();
            serde_json::json!({
                "embeds": [{
                    "title": summary.name,
                    "description": summary.period,
                    "color": 0x00AAFF,
                    "fields": fields,
                }]
            })
        }
        "TEAMS" => {
            let facts: Vec<serde_json::Value> = summary
                .metrics
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "name": metric_label(&m.key),
                        "value": format!("{}{}", m.value, change_suffix(m.change)),
                    })
                })
                .collect();
            serde_json::json!({
                "@type": "MessageCard",
                "@context": "http://schema.org/extensions",
                "summary": summary.name,
                "title": summary.name,
                "sections": [{
                    "activitySubtitle": summary.period,
                    "facts": facts,
                }]
            })
        }
        _ => serde_json::json!({
            "name": summary.name,
            "website_id": summary.website_id,
            "period": summary.period,
            "metrics": summary.metrics,
        }),
    }
}

#[async_trait]
impl WebhookTransport for HttpWebhookTransport {
    async fn send_webhook(
        &self,
        job: &Job,
        summary: &Summary,
        webhook: &WebhookRecipient,
    ) -> SendOutcome {
        let payload = build_payload(summary, webhook);
        match self.post(&webhook.url, payload).await {
            Ok(()) => {
                tracing::info!(
                    "✅ Webhook '{}' ({}) delivered for job '{}'",
                    webhook.name,
                    webhook.kind,
                    job.name
                );
                SendOutcome::Sent
            }
            Err(msg) => SendOutcome::Failed(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statship_core::types::Metric;

    fn summary() -> Summary {
        Summary {
            name: "Shop traffic".into(),
            website_id: "site-1".into(),
            period: "last 7 days (UTC)".into(),
            metrics: vec![Metric { key: "pageviews".into(), value: 42, change: None }],
        }
    }

    fn recipient(kind: &str) -> WebhookRecipient {
        WebhookRecipient {
            id: 7,
            name: "ops".into(),
            url: "https://hooks.example.com/x".into(),
            kind: kind.into(),
        }
    }

    #[test]
    fn test_discord_payload_is_embed() {
        let payload = build_payload(&summary(), &recipient("DISCORD"));
        assert_eq!(payload["embeds"][0]["title"], "Shop traffic");
        assert_eq!(payload["embeds"][0]["fields"][0]["name"], "Page views");
    }

    #[test]
    fn test_teams_payload_is_message_card() {
        let payload = build_payload(&summary(), &recipient("teams"));
        assert_eq!(payload["@type"], "MessageCard");
        assert_eq!(payload["sections"][0]["facts"][0]["value"], "42");
    }

    #[test]
    fn test_generic_payload_keeps_raw_metrics() {
        let payload = build_payload(&summary(), &recipient("WEBHOOK"));
        assert_eq!(payload["metrics"][0]["key"], "pageviews");
        assert_eq!(payload["metrics"][0]["value"], 42);
    }
}
