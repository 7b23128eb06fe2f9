// Monitor engine implementation

use crate::detector::{process_batch, BatchReport};
use crate::errors::MonitorError;
use crate::notifier::NotificationSink;
use crate::schedule::{next_fire_time, TimeSpec};
use crate::source::SubmissionSource;
use crate::state::StateStore;
use crate::telemetry;
use async_trait::async_trait;
use chrono::Utc;
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// How often checks run
#[derive(Debug, Clone)]
pub enum Cadence {
    /// Check all users, then sleep `interval`, forever
    Polling { interval: Duration },
    /// Check all users at each firing of any spec
    Scheduled { specs: Vec<TimeSpec>, timezone: Tz },
}

/// Configuration for the monitor engine
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Users to check, in order
    pub users: Vec<String>,
    /// Wait after a user fails before moving on
    pub retry_delay: Duration,
    pub cadence: Cadence,
}

/// Totals for one pass over all users
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub users_checked: usize,
    pub users_failed: usize,
    pub notifications: usize,
    pub delivery_failures: usize,
}

/// Monitor trait for the check loop
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Run the configured cadence until stopped
    async fn start(&self) -> Result<(), MonitorError>;

    /// Request a graceful stop; in-flight work completes
    async fn stop(&self);

    /// Check every user once. Per-user failures are logged and skipped.
    async fn check_all_users(&self) -> CycleSummary;
}

/// Main monitor engine implementation
pub struct MonitorEngine {
    config: MonitorConfig,
    source: Arc<dyn SubmissionSource>,
    // Single writer: every state access goes through this lock
    store: Mutex<Box<dyn StateStore>>,
    sink: Arc<dyn NotificationSink>,
    shutdown_tx: watch::Sender<bool>,
}

impl MonitorEngine {
    /// Create a new monitor engine
    pub fn new(
        config: MonitorConfig,
        source: Arc<dyn SubmissionSource>,
        store: Box<dyn StateStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);

        Self {
            config,
            source,
            store: Mutex::new(store),
            sink,
            shutdown_tx,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Whether a stop was requested
    pub fn is_stopped(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Get a receiver that observes stop requests
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Current cursor for a user
    pub async fn cursor(&self, user_id: &str) -> Option<i64> {
        self.store.lock().await.cursor(user_id)
    }

    /// Whether the problem was already notified for a user
    pub async fn is_solved(&self, user_id: &str, problem_id: &str) -> bool {
        self.store.lock().await.is_solved(user_id, problem_id)
    }

    /// Sleep for `duration`, returning early with `false` if a stop is requested
    async fn wait(&self, duration: Duration) -> bool {
        let mut shutdown_rx = self.shutdown_receiver();
        if *shutdown_rx.borrow() {
            return false;
        }

        tokio::select! {
            _ = sleep(duration) => true,
            _ = shutdown_rx.wait_for(|stopped| *stopped) => false,
        }
    }

    /// Fetch and process one user's new submissions
    #[instrument(skip(self))]
    pub async fn check_user(&self, user_id: &str) -> Result<BatchReport, MonitorError> {
        let since = self.store.lock().await.cursor(user_id);
        debug!(since = ?since, "Checking user");

        let batch = self.source.fetch(user_id, since).await.map_err(|e| {
            telemetry::record_fetch_failure(user_id, e.reason());
            e
        })?;

        let mut store = self.store.lock().await;
        let report = process_batch(user_id, batch, &mut **store, self.sink.as_ref()).await;

        for e in &report.state_errors {
            warn!(error = %e, "State was updated in memory but not persisted");
        }
        if !report.notified.is_empty() {
            info!(
                notified = report.notified.len(),
                cursor = ?report.cursor,
                "User check found new accepted problems"
            );
        }

        Ok(report)
    }

    /// Run a single pass over all users
    pub async fn run_once(&self) -> CycleSummary {
        self.check_all_users().await
    }

    async fn run_polling(&self, interval: Duration) -> Result<(), MonitorError> {
        info!(
            interval_seconds = interval.as_secs_f64(),
            "Starting monitor in polling mode"
        );

        while !self.is_stopped() {
            self.check_all_users().await;
            if !self.wait(interval).await {
                break;
            }
        }

        Ok(())
    }

    async fn run_scheduled(&self, specs: &[TimeSpec], timezone: Tz) -> Result<(), MonitorError> {
        info!(timezone = %timezone, "Starting monitor in scheduled mode");
        for spec in specs {
            info!(
                schedule = spec.source(),
                expression = spec.expression(),
                "Schedule registered"
            );
        }

        while !self.is_stopped() {
            let now = Utc::now();
            let next = next_fire_time(specs, timezone, now)?;
            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);

            info!(
                next_run = %next.with_timezone(&timezone),
                "Waiting for next scheduled run"
            );
            if !self.wait(delay).await {
                break;
            }

            info!("Scheduled run started");
            self.check_all_users().await;
            info!("Scheduled run finished");
        }

        Ok(())
    }
}

#[async_trait]
impl Monitor for MonitorEngine {
    #[instrument(skip(self))]
    async fn start(&self) -> Result<(), MonitorError> {
        info!(users = ?self.config.users, "Starting AC monitor");

        match &self.config.cadence {
            Cadence::Polling { interval } => self.run_polling(*interval).await?,
            Cadence::Scheduled { specs, timezone } => {
                self.run_scheduled(specs, *timezone).await?
            }
        }

        info!("Monitor stopped");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop(&self) {
        info!("Stopping monitor");
        self.shutdown_tx.send_replace(true);
    }

    #[instrument(skip(self))]
    async fn check_all_users(&self) -> CycleSummary {
        let started = Instant::now();
        let mut summary = CycleSummary::default();
        info!(users = self.config.users.len(), "Check cycle started");

        for user_id in &self.config.users {
            if self.is_stopped() {
                info!("Stop requested, ending cycle early");
                break;
            }

            match self.check_user(user_id).await {
                Ok(report) => {
                    summary.users_checked += 1;
                    summary.notifications += report.notified.len();
                    summary.delivery_failures += report.delivery_errors.len();
                }
                Err(e) => {
                    summary.users_failed += 1;
                    error!(user_id = %user_id, error = %e, "Failed to check user");
                    warn!(
                        retry_delay_seconds = self.config.retry_delay.as_secs_f64(),
                        "Waiting before continuing with the next user"
                    );
                    if !self.wait(self.config.retry_delay).await {
                        break;
                    }
                }
            }
        }

        let elapsed = started.elapsed().as_secs_f64();
        telemetry::record_cycle_duration(elapsed);
        info!(
            users_checked = summary.users_checked,
            users_failed = summary.users_failed,
            notifications = summary.notifications,
            duration_seconds = elapsed,
            "Check cycle finished"
        );

        summary
    }
}
