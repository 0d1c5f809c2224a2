//! # modkit
//!
//! Content moderation pipeline built around a third-party scoring API:
//!
//! - [`category`] — the closed moderation category catalog and selection
//!   validation
//! - [`client`] — the upstream moderation client with bounded retry
//! - [`batch`] — the concurrent batch orchestrator (bounded worker pool,
//!   cooperative cancellation, progress reporting)
//! - [`compare`] — discrepancy reporting between batch results and a live
//!   service
//! - [`server`] — the axum service facade exposing `POST /moderate`
//! - [`transcript`] — transcript parsing and JSON persistence
//!
//! The crate never computes moderation scores itself; it orchestrates calls
//! to an external scorer, validates category selections, and persists
//! results.

pub mod batch;
pub mod cancel;
pub mod category;
pub mod client;
pub mod compare;
pub mod error;
pub mod retry;
pub mod server;
pub mod transcript;
pub mod types;

pub use batch::{BatchOrchestrator, BatchOutcome, DEFAULT_CONCURRENCY};
pub use cancel::CancelHandle;
pub use category::{Category, parse_selection};
pub use client::{ModerationCapability, ModerationClient, ModerationConfig};
pub use compare::{Discrepancy, ServiceClient, compare, index_records};
pub use error::ModerationError;
pub use retry::{RetryExecutor, RetryPolicy};
pub use types::{
    CategoryScores, Conversation, Message, MessageId, ModerateRequest, ModerateResponse,
    ModerationRecord,
};
