//! Batch moderation orchestrator.
//!
//! Fans out one upstream call per message under a bounded worker pool,
//! collects results in completion order, and supports cooperative
//! cancellation. Per-message failures are dropped and logged; they never
//! abort sibling units.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cancel::CancelHandle;
use crate::category::Category;
use crate::client::ModerationCapability;
use crate::error::ModerationError;
use crate::types::{CategoryScores, Conversation, Message, ModerationRecord};

/// Default number of concurrent in-flight upstream calls.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// Result of one batch run.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Records in completion order. Ordering is nondeterministic under
    /// concurrency; consumers must not rely on it.
    pub results: Vec<ModerationRecord>,
    /// Units that finished (scored, dropped, or cancelled).
    pub completed: usize,
    /// Whether the run was interrupted by the cancel handle.
    pub interrupted: bool,
}

/// Drives concurrent moderation of many messages.
pub struct BatchOrchestrator {
    scorer: Arc<dyn ModerationCapability>,
    concurrency: usize,
    cancel: CancelHandle,
}

impl BatchOrchestrator {
    pub fn new(
        scorer: Arc<dyn ModerationCapability>,
        concurrency: usize,
        cancel: CancelHandle,
    ) -> Self {
        Self {
            scorer,
            concurrency: concurrency.max(1),
            cancel,
        }
    }

    /// Flatten conversations into the unordered message collection the pool
    /// dispatches from.
    pub fn flatten(conversations: Vec<Conversation>) -> Vec<Message> {
        conversations
            .into_iter()
            .flat_map(|conversation| conversation.messages)
            .collect()
    }

    /// Moderate every message, keeping at most `concurrency` calls in
    /// flight. `on_progress` receives the monotonically increasing count of
    /// finished units, success or drop alike.
    ///
    /// Blocks until every unit has completed, been dropped, or been
    /// cancelled; after cancellation queued units never start and in-flight
    /// units are abandoned at their next suspension point, so control
    /// returns within bounded time with the partial output intact. The
    /// orchestrator performs no persistence; the caller decides what to do
    /// with a partial result set.
    pub async fn run<F>(
        &self,
        messages: Vec<Message>,
        categories: &[Category],
        mut on_progress: F,
    ) -> BatchOutcome
    where
        F: FnMut(usize),
    {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let categories: Arc<[Category]> = categories.into();
        let mut join_set = JoinSet::new();

        for message in messages {
            let scorer = Arc::clone(&self.scorer);
            let semaphore = Arc::clone(&semaphore);
            let cancel = self.cancel.clone();
            let categories = Arc::clone(&categories);
            join_set
                .spawn(async move { process_message(scorer, semaphore, cancel, message, &categories).await });
        }

        let mut results = Vec::new();
        let mut completed = 0usize;
        while let Some(joined) = join_set.join_next().await {
            completed += 1;
            on_progress(completed);
            match joined {
                Ok(Some(record)) => results.push(record),
                Ok(None) => {}
                Err(join_error) => {
                    tracing::error!(error = %join_error, "moderation task aborted");
                }
            }
        }

        BatchOutcome {
            results,
            completed,
            interrupted: self.cancel.is_cancelled(),
        }
    }
}

/// One unit of work: moderate a single message.
///
/// Returns `None` when the unit is dropped (unavailable scorer, per-item
/// fault, or cancellation); the caller continues with sibling units either
/// way.
async fn process_message(
    scorer: Arc<dyn ModerationCapability>,
    semaphore: Arc<Semaphore>,
    cancel: CancelHandle,
    message: Message,
    categories: &[Category],
) -> Option<ModerationRecord> {
    let _permit = tokio::select! {
        _ = cancel.cancelled() => return None,
        permit = semaphore.acquire_owned() => permit.ok()?,
    };
    if cancel.is_cancelled() {
        return None;
    }

    let outcome = tokio::select! {
        _ = cancel.cancelled() => return None,
        outcome = scorer.moderate(&message.content) => outcome,
    };

    let scores = match outcome {
        Ok(Some(scores)) => scores,
        Ok(None) => {
            tracing::warn!(message_id = %message.message_id, "scorer unavailable, dropping message");
            return None;
        }
        Err(
            error @ (ModerationError::Api { .. }
            | ModerationError::Authentication(_)
            | ModerationError::Parse(_)),
        ) => {
            tracing::warn!(message_id = %message.message_id, %error, "moderation failed, dropping message");
            return None;
        }
        Err(error) => {
            tracing::error!(message_id = %message.message_id, %error, "unexpected failure, dropping message");
            return None;
        }
    };

    // A result completed after cancellation is not admitted into the output.
    if cancel.is_cancelled() {
        return None;
    }

    let selected: CategoryScores = categories
        .iter()
        .map(|category| (*category, scores.get(category).copied().unwrap_or(0.0)))
        .collect();

    Some(ModerationRecord {
        message_id: message.message_id,
        content: message.content,
        category_scores: selected,
    })
}
