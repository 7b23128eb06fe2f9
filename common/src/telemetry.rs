// Telemetry module for structured logging and metrics

use crate::config::LogFormat;
use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize structured logging
///
/// `RUST_LOG` takes precedence over `log_level`. JSON output is meant for
/// daemons whose logs are collected; `Pretty` is for interactive runs.
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, format: LogFormat) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => level_filter(log_level)?,
    };

    let layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;

    tracing::info!(log_level = log_level, format = ?format, "Logging initialized");
    Ok(())
}

/// Filter built from the configured level directives, e.g. `info,common=debug`
fn level_filter(log_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(log_level)
        .map_err(|e| anyhow::anyhow!("Failed to create env filter from '{}': {}", log_level, e))
}

/// Initialize Prometheus metrics exporter
///
/// Registers:
/// - ac_notifications_total: first-time acceptances notified
/// - fetch_failures_total: failed submission fetches
/// - notification_failures_total: failed deliveries per channel
/// - check_cycle_duration_seconds: duration of a full pass over all users
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "ac_notifications_total",
        "Total number of first-time accepted submissions notified"
    );
    describe_counter!(
        "fetch_failures_total",
        "Total number of failed submission fetches"
    );
    describe_counter!(
        "notification_failures_total",
        "Total number of failed notification deliveries"
    );
    describe_histogram!(
        "check_cycle_duration_seconds",
        "Duration of a check pass over all users in seconds"
    );

    tracing::info!(
        metrics_port = metrics_port,
        metrics_endpoint = format!("http://0.0.0.0:{}/metrics", metrics_port),
        "Prometheus metrics exporter initialized"
    );

    Ok(())
}

/// Record a notification emitted for a user
#[inline]
pub fn record_notification(user_id: &str) {
    counter!("ac_notifications_total", "user_id" => user_id.to_string()).increment(1);
}

/// Record a failed fetch
#[inline]
pub fn record_fetch_failure(user_id: &str, reason: &str) {
    counter!(
        "fetch_failures_total",
        "user_id" => user_id.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// Record a failed delivery on one channel
#[inline]
pub fn record_notification_failure(channel: &str) {
    counter!("notification_failures_total", "channel" => channel.to_string()).increment(1);
}

/// Record how long a pass over all users took
#[inline]
pub fn record_cycle_duration(duration_seconds: f64) {
    histogram!("check_cycle_duration_seconds").record(duration_seconds);
}
