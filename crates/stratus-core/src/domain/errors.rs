//! Error taxonomy for the data plane
//!
//! Every fallible operation in the core and its adapters classifies failures
//! into one of these kinds. Adapters map backend-specific errors (SQL, S3)
//! into the matching kind before they cross a port boundary.

use thiserror::Error;

/// Errors produced by namespace, upload and download operations
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: bad path, empty part list, unparseable range header
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Owner-scoped lookup miss
    #[error("not found: {0}")]
    NotFound(String),

    /// Path already taken, directory moved into itself, missing copy source
    #[error("conflict: {0}")]
    Conflict(String),

    /// Compose precondition failed, missing part, size mismatch
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Requested byte range cannot be satisfied against an object of `total` bytes
    #[error("range not satisfiable (object is {total} bytes)")]
    RangeNotSatisfiable {
        /// Total object size, serialized into `Content-Range: bytes */{total}`
        total: u64,
    },

    /// Object-store RPC failure; retryable by the caller, never retried here
    #[error("object store unavailable: {0}")]
    StorageUnavailable(String),

    /// Client disconnect or deadline hit mid-operation
    #[error("operation cancelled")]
    Cancelled,

    /// Unclassified failure; always logged at the site that produced it
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Short stable name of the error kind, used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::InvalidArgument(_) => "invalid_argument",
            CoreError::NotFound(_) => "not_found",
            CoreError::Conflict(_) => "conflict",
            CoreError::Integrity(_) => "integrity",
            CoreError::RangeNotSatisfiable { .. } => "range_not_satisfiable",
            CoreError::StorageUnavailable(_) => "storage_unavailable",
            CoreError::Cancelled => "cancelled",
            CoreError::Internal(_) => "internal",
        }
    }
}
