//! Cancellation handle for long-running batch work.
//!
//! Wraps a `CancellationToken` so callers can wire an interrupt signal into
//! the batch orchestrator without any process-global state.

use tokio_util::sync::CancellationToken;

/// A cloneable handle that can request cooperative cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Workers observing this handle stop admitting
    /// results and abandon in-flight upstream calls at their next
    /// suspension point.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// A future that resolves when cancellation is requested.
    pub fn cancelled(&self) -> tokio_util::sync::WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }
}
