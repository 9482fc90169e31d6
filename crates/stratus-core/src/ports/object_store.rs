//! Object-store gateway port (driven/secondary port)
//!
//! Fixes the contract against the S3-compatible backend. The production
//! implementation lives in `stratus-gateway`; tests substitute an in-memory
//! store. Errors are classified into [`CoreError`] kinds before they cross
//! this boundary: a failed compose precondition is `Integrity`, a transport
//! failure is `StorageUnavailable`.

use std::pin::Pin;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::AsyncRead;

use crate::domain::CoreError;

/// Opaque readable byte stream positioned according to the requested range
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Metadata of a stored object
#[derive(Debug, Clone)]
pub struct ObjectStat {
    pub size: u64,
    pub etag: String,
    pub content_type: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One listing entry under a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub etag: String,
}

/// One source of a compose operation
#[derive(Debug, Clone)]
pub struct ComposeSource {
    pub key: String,
    /// When present, passed as an If-Match precondition; a mismatch fails
    /// the compose atomically.
    pub etag: Option<String>,
}

/// Inclusive byte range of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Number of bytes covered; ranges are inclusive so this is never 0.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Port trait for the S3-compatible object store
#[async_trait::async_trait]
pub trait IObjectStore: Send + Sync {
    /// Issues a client-direct PUT URL for `key`, valid for `ttl`.
    async fn presign_put(&self, key: &str, ttl: Duration) -> Result<String, CoreError>;

    /// Issues a GET URL that downloads as an attachment named `filename`.
    async fn presign_get(
        &self,
        key: &str,
        filename: &str,
        ttl: Duration,
    ) -> Result<String, CoreError>;

    /// Server-side multi-source copy into `dest`.
    ///
    /// Sources are concatenated in slice order. Any declared etag acts as a
    /// precondition; on mismatch or a missing source the compose fails with
    /// `CoreError::Integrity` and `dest` is not created.
    async fn compose(&self, sources: &[ComposeSource], dest: &str) -> Result<(), CoreError>;

    /// Reads object metadata.
    async fn stat(&self, key: &str) -> Result<ObjectStat, CoreError>;

    /// Opens the object for reading, optionally restricted to `range`.
    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectReader, CoreError>;

    /// Lists objects under `prefix` with their etags.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, CoreError>;

    /// Removes one object; deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CoreError>;

    /// Bucket-qualified URL stored in the metadata row for `key`.
    fn object_url(&self, key: &str) -> String;

    /// Reverses [`IObjectStore::object_url`], tolerating arbitrary hosts.
    ///
    /// If the first path segment names a known bucket it is stripped;
    /// otherwise the full path is returned.
    fn extract_object_key(&self, url: &str) -> String;
}
