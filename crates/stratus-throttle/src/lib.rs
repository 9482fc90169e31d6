//! Stratus Throttle - Bandwidth limiting for download streams
//!
//! Two cooperating token buckets shape every stream: a process-wide global
//! bucket protecting egress and a per-connection bucket enforcing fairness.
//! The per-connection rate follows the transfer length and the owner's tier
//! and adapts to download progress; both waits are cancellable so a client
//! disconnect releases the stream immediately.

use thiserror::Error;

pub mod bucket;
pub mod plan;
pub mod writer;

pub use bucket::TokenBucket;
pub use plan::{adjusted_rate, base_rate_for_length, buffer_size_for, connection_plan, global_plan, RatePlan};
pub use writer::{ByteSink, RateLimitedWriter};

/// Errors surfaced by rate-limited writes
#[derive(Debug, Error)]
pub enum WriteError {
    /// The stream's cancellation token fired during a token wait or write
    #[error("write cancelled")]
    Cancelled,

    /// The underlying sink rejected the bytes (client gone, channel closed)
    #[error("sink error: {0}")]
    Io(#[from] std::io::Error),
}
