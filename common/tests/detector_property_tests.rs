// Property-based tests for change detection and deduplication

use async_trait::async_trait;
use common::detector::process_batch;
use common::errors::NotificationError;
use common::models::{AcceptedNotification, Submission, SubmissionResult};
use common::notifier::NotificationSink;
use common::state::{MemoryStateStore, StateStore};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct RecordingSink {
    received: Mutex<Vec<AcceptedNotification>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notification: &AcceptedNotification) -> Result<(), NotificationError> {
        self.received.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(future)
}

fn arb_submission() -> impl Strategy<Value = Submission> {
    (
        0u64..1_000_000,
        0i64..10_000,
        prop::sample::select(vec!["a", "b", "c", "d", "e"]),
        prop::sample::select(vec!["AC", "WA", "TLE", "RE", "WJ"]),
    )
        .prop_map(|(id, epoch_second, problem, result)| Submission {
            id,
            epoch_second,
            problem_id: format!("abc300_{}", problem),
            contest_id: "abc300".to_string(),
            user_id: "tourist".to_string(),
            language: "Rust".to_string(),
            point: 100.0,
            length: 0,
            result: SubmissionResult::from(result.to_string()),
            execution_time: None,
        })
}

proptest! {
    /// At most one notification per problem, and exactly one for each accepted problem
    #[test]
    fn property_one_notification_per_problem(batch in prop::collection::vec(arb_submission(), 0..40)) {
        let mut store = MemoryStateStore::new();
        let sink = RecordingSink::default();

        let report = block_on(process_batch("tourist", batch.clone(), &mut store, &sink));

        let accepted: HashSet<&str> = batch
            .iter()
            .filter(|s| s.result == SubmissionResult::Ac)
            .map(|s| s.problem_id.as_str())
            .collect();
        let notified: Vec<&str> = report.notified.iter().map(|n| n.problem_id.as_str()).collect();
        let unique: HashSet<&str> = notified.iter().copied().collect();

        prop_assert_eq!(notified.len(), unique.len());
        prop_assert_eq!(unique, accepted);
        prop_assert_eq!(sink.received.lock().unwrap().len(), report.notified.len());
    }

    /// The cursor lands on the newest submission time of a non-empty batch
    #[test]
    fn property_cursor_is_latest_time(batch in prop::collection::vec(arb_submission(), 1..40)) {
        let mut store = MemoryStateStore::new();
        let sink = RecordingSink::default();
        let latest = batch.iter().map(|s| s.epoch_second).max();

        let report = block_on(process_batch("tourist", batch, &mut store, &sink));

        prop_assert_eq!(report.cursor, latest);
        prop_assert_eq!(store.cursor("tourist"), latest);
    }

    /// Notified submissions are the earliest accepted one per problem, in time order
    #[test]
    fn property_earliest_acceptance_wins(batch in prop::collection::vec(arb_submission(), 0..40)) {
        let mut store = MemoryStateStore::new();
        let sink = RecordingSink::default();

        let report = block_on(process_batch("tourist", batch.clone(), &mut store, &sink));

        for notification in &report.notified {
            let earliest = batch
                .iter()
                .filter(|s| s.problem_id == notification.problem_id && s.is_accepted())
                .map(|s| s.epoch_second)
                .min();
            prop_assert_eq!(Some(notification.timestamp.timestamp()), earliest);
        }
        let times: Vec<i64> = report.notified.iter().map(|n| n.timestamp.timestamp()).collect();
        let mut sorted = times.clone();
        sorted.sort();
        prop_assert_eq!(times, sorted);
    }

    /// Reprocessing the same batch emits nothing and keeps the cursor
    #[test]
    fn property_replay_is_silent(batch in prop::collection::vec(arb_submission(), 0..40)) {
        let mut store = MemoryStateStore::new();
        let sink = RecordingSink::default();

        let first = block_on(process_batch("tourist", batch.clone(), &mut store, &sink));
        let second = block_on(process_batch("tourist", batch, &mut store, &sink));

        prop_assert!(second.notified.is_empty());
        prop_assert_eq!(second.cursor, first.cursor);
        prop_assert_eq!(second.skipped_duplicates, second.accepted);
    }

    /// An empty batch leaves existing state untouched
    #[test]
    fn property_empty_batch_is_noop(cursor in prop::option::of(0i64..10_000)) {
        let mut store = MemoryStateStore::new();
        if let Some(cursor) = cursor {
            store.set_cursor("tourist", cursor).unwrap();
        }
        let sink = RecordingSink::default();

        let report = block_on(process_batch("tourist", Vec::new(), &mut store, &sink));

        prop_assert!(report.is_noop());
        prop_assert_eq!(store.cursor("tourist"), cursor);
        prop_assert!(sink.received.lock().unwrap().is_empty());
    }
}
