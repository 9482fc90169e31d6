//! Stratus Store - Persistent namespace metadata
//!
//! SQLite-backed implementation of the `IFileRepository` port:
//! - Path-indexed file/folder rows with soft delete
//! - Transactional create/move honoring the path invariants
//! - Hash-based dedup and reference-count queries

use thiserror::Error;

pub mod pool;
pub mod repository;

pub use pool::DatabasePool;
pub use repository::SqliteFileRepository;

/// Errors raised while setting up the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Could not open or create the database
    #[error("database connection failed: {0}")]
    ConnectionFailed(String),

    /// Schema migration failed
    #[error("database migration failed: {0}")]
    MigrationFailed(String),
}
