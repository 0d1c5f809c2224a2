//! Batch orchestrator pipeline tests with stub scorers.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use modkit::batch::BatchOrchestrator;
use modkit::cancel::CancelHandle;
use modkit::category::Category;
use modkit::client::ModerationCapability;
use modkit::error::ModerationError;
use modkit::types::{CategoryScores, Message, MessageId};

fn scores() -> CategoryScores {
    Category::ALL.iter().map(|c| (*c, 0.5)).collect()
}

fn messages(n: i64) -> Vec<Message> {
    (0..n)
        .map(|i| Message {
            message_id: MessageId::Int(i),
            role_idx: (i % 2) as u8,
            content: format!("message {i}"),
        })
        .collect()
}

fn result_ids(records: &[modkit::types::ModerationRecord]) -> HashSet<String> {
    records.iter().map(|r| r.message_id.canonical()).collect()
}

/// Scorer that faults on content containing "fail" and reports
/// "unavailable" on content containing "skip".
struct SelectiveScorer;

#[async_trait]
impl ModerationCapability for SelectiveScorer {
    async fn moderate(&self, content: &str) -> Result<Option<CategoryScores>, ModerationError> {
        if content.contains("fail") {
            Err(ModerationError::api_error(400, "malformed request"))
        } else if content.contains("skip") {
            Ok(None)
        } else {
            Ok(Some(scores()))
        }
    }
}

/// Scorer that sleeps before answering, to hold units in flight.
struct SlowScorer {
    delay: Duration,
}

#[async_trait]
impl ModerationCapability for SlowScorer {
    async fn moderate(&self, _content: &str) -> Result<Option<CategoryScores>, ModerationError> {
        tokio::time::sleep(self.delay).await;
        Ok(Some(scores()))
    }
}

/// Scorer that records the maximum number of concurrent in-flight calls.
struct CountingScorer {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

#[async_trait]
impl ModerationCapability for CountingScorer {
    async fn moderate(&self, _content: &str) -> Result<Option<CategoryScores>, ModerationError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Some(scores()))
    }
}

#[tokio::test]
async fn failing_units_do_not_suppress_siblings() {
    let mut batch = messages(4);
    batch.push(Message {
        message_id: MessageId::Int(4),
        role_idx: 0,
        content: "this one will fail".to_string(),
    });
    batch.push(Message {
        message_id: MessageId::Int(5),
        role_idx: 1,
        content: "this one gets skipped".to_string(),
    });

    let orchestrator =
        BatchOrchestrator::new(Arc::new(SelectiveScorer), 4, CancelHandle::new());
    let outcome = orchestrator
        .run(batch, &[Category::Sexual], |_| {})
        .await;

    assert!(!outcome.interrupted);
    assert_eq!(outcome.completed, 6);
    let expected: HashSet<String> = (0..4).map(|i| i.to_string()).collect();
    assert_eq!(result_ids(&outcome.results), expected);
}

#[tokio::test]
async fn progress_is_monotonic_and_counts_drops() {
    let mut batch = messages(3);
    batch.push(Message {
        message_id: MessageId::Int(3),
        role_idx: 0,
        content: "fail".to_string(),
    });

    let orchestrator =
        BatchOrchestrator::new(Arc::new(SelectiveScorer), 2, CancelHandle::new());
    let mut progress = Vec::new();
    let outcome = orchestrator
        .run(batch, &[Category::Hate], |n| progress.push(n))
        .await;

    assert_eq!(progress, vec![1, 2, 3, 4]);
    assert_eq!(outcome.completed, 4);
    assert_eq!(outcome.results.len(), 3);
}

#[tokio::test]
async fn requested_categories_are_projected_into_records() {
    let orchestrator =
        BatchOrchestrator::new(Arc::new(SelectiveScorer), 2, CancelHandle::new());
    let outcome = orchestrator
        .run(messages(1), &[Category::Violence, Category::Hate], |_| {})
        .await;

    let record = &outcome.results[0];
    assert_eq!(record.category_scores.len(), 2);
    assert!(record.category_scores.contains_key(&Category::Violence));
    assert!(record.category_scores.contains_key(&Category::Hate));
}

#[tokio::test]
async fn in_flight_calls_never_exceed_the_concurrency_bound() {
    let scorer = Arc::new(CountingScorer {
        in_flight: AtomicUsize::new(0),
        max_in_flight: AtomicUsize::new(0),
    });
    let orchestrator = BatchOrchestrator::new(scorer.clone(), 3, CancelHandle::new());
    let outcome = orchestrator
        .run(messages(12), &[Category::Sexual], |_| {})
        .await;

    assert_eq!(outcome.results.len(), 12);
    assert!(scorer.max_in_flight.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn cancellation_returns_promptly_with_partial_output() {
    let cancel = CancelHandle::new();
    let orchestrator = BatchOrchestrator::new(
        Arc::new(SlowScorer {
            delay: Duration::from_millis(100),
        }),
        2,
        cancel.clone(),
    );

    let input_ids: HashSet<String> = (0..20).map(|i| i.to_string()).collect();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            cancel.cancel();
        });
    }

    let outcome = tokio::time::timeout(
        Duration::from_secs(2),
        orchestrator.run(messages(20), &[Category::Sexual], |_| {}),
    )
    .await
    .expect("cancelled run must return within bounded time");

    assert!(outcome.interrupted);
    assert!(
        outcome.results.len() < 20,
        "cancellation should prevent queued units from completing"
    );
    // Every admitted result corresponds to a unit that completed normally.
    for id in result_ids(&outcome.results) {
        assert!(input_ids.contains(&id));
    }
}

#[tokio::test]
async fn cancelling_before_run_produces_no_results() {
    let cancel = CancelHandle::new();
    cancel.cancel();
    let orchestrator = BatchOrchestrator::new(Arc::new(SelectiveScorer), 4, cancel);

    let outcome = orchestrator
        .run(messages(5), &[Category::Sexual], |_| {})
        .await;

    assert!(outcome.interrupted);
    assert!(outcome.results.is_empty());
}
