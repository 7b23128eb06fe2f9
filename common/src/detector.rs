// Change detection and deduplication of accepted submissions
//
// A batch is processed in submission-time order. Each (user, problem) pair is
// marked solved before its notification is sent, so a failed delivery is
// never retried on a later cycle. The cursor always moves to the newest
// submission of the batch, accepted or not.

use crate::errors::{NotificationError, StateError};
use crate::models::{AcceptedNotification, Submission};
use crate::notifier::NotificationSink;
use crate::source::{filter_accepted, sort_by_time};
use crate::state::StateStore;
use crate::telemetry;
use tracing::{debug, info, instrument, warn};

/// Outcome of processing one fetched batch for one user
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Submissions in the batch
    pub fetched: usize,
    /// Accepted submissions in the batch
    pub accepted: usize,
    /// Notifications emitted, in chronological order
    pub notified: Vec<AcceptedNotification>,
    /// Accepted submissions skipped because the problem was already notified
    pub skipped_duplicates: usize,
    /// New cursor, `None` when the batch was empty
    pub cursor: Option<i64>,
    pub delivery_errors: Vec<NotificationError>,
    pub state_errors: Vec<StateError>,
}

impl BatchReport {
    pub fn is_noop(&self) -> bool {
        self.fetched == 0
    }
}

/// Process a fetched batch for `user_id` against the state store and emit
/// notifications for first-time acceptances.
///
/// Delivery and persistence failures are collected in the report; they never
/// stop the batch or prevent the cursor from advancing.
#[instrument(skip(batch, store, sink), fields(batch_size = batch.len()))]
pub async fn process_batch(
    user_id: &str,
    mut batch: Vec<Submission>,
    store: &mut dyn StateStore,
    sink: &dyn NotificationSink,
) -> BatchReport {
    let mut report = BatchReport {
        fetched: batch.len(),
        ..BatchReport::default()
    };

    if batch.is_empty() {
        debug!("No new submissions");
        return report;
    }

    sort_by_time(&mut batch);
    let accepted = filter_accepted(&batch);
    report.accepted = accepted.len();

    for submission in accepted {
        if store.is_solved(user_id, &submission.problem_id) {
            report.skipped_duplicates += 1;
            continue;
        }

        if let Err(e) = store.mark_solved(user_id, &submission.problem_id) {
            report.state_errors.push(e);
        }

        let notification = AcceptedNotification::from(submission);
        info!(
            problem_id = %notification.problem_id,
            contest_id = %notification.contest_id,
            submission_id = notification.submission_id,
            epoch_second = submission.epoch_second,
            "New accepted problem detected"
        );
        telemetry::record_notification(user_id);

        if let Err(e) = sink.notify(&notification).await {
            warn!(
                problem_id = %notification.problem_id,
                channel = sink.name(),
                error = %e,
                "Notification delivery failed, problem stays marked"
            );
            report.delivery_errors.push(e);
        }
        report.notified.push(notification);
    }

    // Sorted, so the last element carries the newest timestamp
    if let Some(latest) = batch.last() {
        if let Err(e) = store.set_cursor(user_id, latest.epoch_second) {
            report.state_errors.push(e);
        }
        report.cursor = Some(latest.epoch_second);
    }

    debug!(
        accepted = report.accepted,
        notified = report.notified.len(),
        skipped = report.skipped_duplicates,
        cursor = ?report.cursor,
        "Batch processed"
    );

    report
}
