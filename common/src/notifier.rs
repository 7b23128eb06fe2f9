// Notification channels for first-time acceptances
//
// Every channel implements `NotificationSink`. `FanOutSink` delivers one
// notification to several channels at once and isolates their failures.

use crate::errors::NotificationError;
use crate::models::AcceptedNotification;
use crate::telemetry;
use async_trait::async_trait;
use chrono_tz::Tz;
use futures::future::join_all;
use reqwest::Client;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, instrument, warn};

/// Green embed colour used for accepted submissions
const DISCORD_EMBED_COLOR: u32 = 0x00c000;

/// NotificationSink delivers a notification to one external channel
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Channel name used in logs and metrics
    fn name(&self) -> &str;

    /// Deliver a single notification
    async fn notify(&self, notification: &AcceptedNotification) -> Result<(), NotificationError>;
}

/// Writes one line per notification to stdout
pub struct ConsoleSink {
    timezone: Tz,
}

impl ConsoleSink {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// e.g. `2026-02-27 09:00:00 tourist AC:abc300 abc300_a point:100 (C++ 23 (gcc 12.2))`
    pub fn format_line(&self, notification: &AcceptedNotification) -> String {
        let local = notification.timestamp.with_timezone(&self.timezone);
        format!(
            "{} {} AC:{} {} point:{} ({})",
            local.format("%Y-%m-%d %H:%M:%S"),
            notification.user_id,
            notification.contest_id,
            notification.problem_id,
            notification.point,
            notification.language
        )
    }
}

#[async_trait]
impl NotificationSink for ConsoleSink {
    fn name(&self) -> &str {
        "console"
    }

    async fn notify(&self, notification: &AcceptedNotification) -> Result<(), NotificationError> {
        println!("{}", self.format_line(notification));
        Ok(())
    }
}

/// Posts an embed to a Discord incoming webhook
pub struct DiscordWebhookSink {
    client: Client,
    webhook_url: Option<String>,
}

impl DiscordWebhookSink {
    /// Create the sink. Without a URL every delivery is skipped with a warning.
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            NotificationError::DeliveryFailed {
                channel: "discord".to_string(),
                reason: format!("Failed to create HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            client,
            webhook_url,
        })
    }

    /// Webhook body for a notification
    pub fn build_payload(notification: &AcceptedNotification) -> Value {
        json!({
            "embeds": [{
                "title": format!(
                    "✅ {} solved {}",
                    notification.user_id, notification.problem_id
                ),
                "url": notification.submission_url(),
                "color": DISCORD_EMBED_COLOR,
                "fields": [
                    { "name": "Contest", "value": notification.contest_id, "inline": true },
                    { "name": "Points", "value": format!("{}", notification.point), "inline": true },
                    { "name": "Language", "value": notification.language, "inline": true },
                ],
                "timestamp": notification.timestamp.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationSink for DiscordWebhookSink {
    fn name(&self) -> &str {
        "discord"
    }

    #[instrument(skip_all, fields(user_id = %notification.user_id, problem_id = %notification.problem_id))]
    async fn notify(&self, notification: &AcceptedNotification) -> Result<(), NotificationError> {
        let Some(url) = &self.webhook_url else {
            warn!("Discord webhook URL is not configured, skipping");
            return Ok(());
        };

        let response = self
            .client
            .post(url)
            .json(&Self::build_payload(notification))
            .send()
            .await
            .map_err(|e| NotificationError::DeliveryFailed {
                channel: self.name().to_string(),
                reason: e.to_string(),
            })?;

        // Discord answers 204 No Content on success
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::HttpStatus {
                channel: self.name().to_string(),
                status: status.as_u16(),
            });
        }

        debug!(status = status.as_u16(), "Discord notification delivered");
        Ok(())
    }
}

/// Delivers to every wrapped sink concurrently; never fails
pub struct FanOutSink {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl FanOutSink {
    pub fn new(sinks: Vec<Arc<dyn NotificationSink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl NotificationSink for FanOutSink {
    fn name(&self) -> &str {
        "fan-out"
    }

    async fn notify(&self, notification: &AcceptedNotification) -> Result<(), NotificationError> {
        let deliveries = self.sinks.iter().map(|sink| async move {
            if let Err(e) = sink.notify(notification).await {
                error!(
                    channel = sink.name(),
                    user_id = %notification.user_id,
                    problem_id = %notification.problem_id,
                    error = %e,
                    "Failed to deliver notification"
                );
                telemetry::record_notification_failure(sink.name());
            }
        });

        join_all(deliveries).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn notification() -> AcceptedNotification {
        AcceptedNotification {
            submission_id: 12345678,
            timestamp: Utc.with_ymd_and_hms(2026, 2, 27, 0, 0, 0).unwrap(),
            user_id: "tourist".to_string(),
            contest_id: "abc300".to_string(),
            problem_id: "abc300_a".to_string(),
            language: "C++ 23 (gcc 12.2)".to_string(),
            point: 100.0,
        }
    }

    struct CountingSink {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for CountingSink {
        fn name(&self) -> &str {
            "counting"
        }

        async fn notify(&self, _: &AcceptedNotification) -> Result<(), NotificationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(NotificationError::DeliveryFailed {
                    channel: "counting".to_string(),
                    reason: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    #[test]
    fn test_console_line_uses_configured_timezone() {
        let sink = ConsoleSink::new(chrono_tz::Asia::Tokyo);
        assert_eq!(
            sink.format_line(&notification()),
            "2026-02-27 09:00:00 tourist AC:abc300 abc300_a point:100 (C++ 23 (gcc 12.2))"
        );
    }

    #[test]
    fn test_discord_payload_links_submission() {
        let payload = DiscordWebhookSink::build_payload(&notification());
        let embed = &payload["embeds"][0];
        assert_eq!(
            embed["url"],
            "https://atcoder.jp/contests/abc300/submissions/12345678"
        );
        assert_eq!(embed["color"], DISCORD_EMBED_COLOR);
        assert_eq!(embed["fields"][0]["value"], "abc300");
    }

    #[tokio::test]
    async fn test_discord_without_url_is_skipped() {
        let sink = DiscordWebhookSink::new(None, Duration::from_secs(5)).unwrap();
        assert!(sink.notify(&notification()).await.is_ok());
    }

    #[tokio::test]
    async fn test_fan_out_isolates_failures() {
        let failing = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let healthy = Arc::new(CountingSink {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let sink = FanOutSink::new(vec![
            failing.clone() as Arc<dyn NotificationSink>,
            healthy.clone() as Arc<dyn NotificationSink>,
        ]);

        assert!(sink.notify(&notification()).await.is_ok());
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(healthy.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_fan_out_succeeds() {
        let sink = FanOutSink::new(Vec::new());
        assert!(sink.is_empty());
        assert!(sink.notify(&notification()).await.is_ok());
    }
}
