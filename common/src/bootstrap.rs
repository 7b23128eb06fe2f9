// Bootstrap utilities for binary initialization
// Wires settings into the submission source, state store and notification channels

use crate::config::Settings;
use crate::notifier::{ConsoleSink, DiscordWebhookSink, FanOutSink, NotificationSink};
use crate::schedule::parse_timezone;
use crate::source::{AtCoderProblemsClient, SubmissionSource};
use crate::state::{JsonFileStateStore, StateStore};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Initialize the AtCoder Problems client
///
/// # Errors
/// Returns error if the HTTP client cannot be built from the API settings
#[tracing::instrument(skip(settings))]
pub fn init_submission_source(settings: &Settings) -> Result<Arc<dyn SubmissionSource>> {
    let client = AtCoderProblemsClient::new(&settings.api)
        .context("Failed to initialize AtCoder Problems client")?;

    info!(base_url = %settings.api.base_url, "Submission source initialized");
    Ok(Arc::new(client))
}

/// Open the JSON state file; a missing or unreadable file starts empty
#[tracing::instrument(skip(settings))]
pub fn init_state_store(settings: &Settings) -> Box<dyn StateStore> {
    let store = JsonFileStateStore::open(&settings.state_path);
    info!(path = %store.path().display(), "State store opened");
    Box::new(store)
}

/// Build the enabled notification channels behind a single fan-out sink
///
/// # Errors
/// Returns error if the timezone is invalid or the webhook client cannot be built
#[tracing::instrument(skip(settings))]
pub fn init_notification_sink(settings: &Settings) -> Result<Arc<dyn NotificationSink>> {
    Ok(Arc::new(build_fan_out(settings)?))
}

fn build_fan_out(settings: &Settings) -> Result<FanOutSink> {
    let timezone = parse_timezone(&settings.timezone)?;
    let mut sinks: Vec<Arc<dyn NotificationSink>> = Vec::new();

    if settings.notifications.console {
        sinks.push(Arc::new(ConsoleSink::new(timezone)));
    }

    if let Some(url) = settings.discord_webhook_url() {
        let discord = DiscordWebhookSink::new(
            Some(url),
            Duration::from_secs(settings.api.timeout_seconds),
        )
        .context("Failed to initialize Discord webhook sink")?;
        sinks.push(Arc::new(discord));
    }

    let channels: Vec<String> = sinks.iter().map(|s| s.name().to_string()).collect();
    let fan_out = FanOutSink::new(sinks);

    if fan_out.is_empty() {
        warn!("No notification channels enabled, detections will only be logged");
    }
    info!(count = fan_out.len(), channels = ?channels, "Notification channels initialized");

    Ok(fan_out)
}
