//! The file entity
//!
//! A single relation stores both files and directories, discriminated by
//! `is_dir`. Directory rows carry no size, URL or hash; file rows with a
//! non-empty hash share their stored object with every other live row of the
//! same owner and hash.

use serde::{Deserialize, Serialize};

use super::errors::CoreError;
use super::path::VirtualPath;

/// Soft-delete status of a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Deleted,
    Live,
}

impl FileStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            FileStatus::Deleted => 0,
            FileStatus::Live => 1,
        }
    }

    pub fn from_i64(v: i64) -> Result<Self, CoreError> {
        match v {
            0 => Ok(FileStatus::Deleted),
            1 => Ok(FileStatus::Live),
            other => Err(CoreError::Internal(format!("unknown file status: {other}"))),
        }
    }
}

/// A persisted namespace row: file or directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stable identifier assigned on create
    pub id: i64,
    /// Owning user; every query is scoped by it
    pub owner_id: i64,
    /// Final path segment
    pub name: String,
    /// Absolute path, unique per (owner, live)
    pub path: VirtualPath,
    pub is_dir: bool,
    /// Bytes; 0 for directories
    pub size: i64,
    /// Bucket-qualified reference into the object store; empty for directories
    pub url: String,
    /// Content fingerprint (hex); empty for directories
    pub hash: String,
    /// Advisory version counter, defaulted to 1 and never recomputed
    pub version: i64,
    pub device_id: String,
    pub last_modified_by: String,
    pub status: FileStatus,
    /// Unix seconds
    pub ctime: i64,
    /// Unix seconds
    pub utime: i64,
}

impl FileRecord {
    /// Bytes the row contributes to quota accounting.
    pub fn byte_size(&self) -> i64 {
        if self.is_dir {
            0
        } else {
            self.size
        }
    }
}

/// Input for creating a namespace row
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub owner_id: i64,
    pub name: String,
    pub path: VirtualPath,
    pub is_dir: bool,
    pub size: i64,
    pub url: String,
    pub hash: String,
    pub device_id: String,
}

impl NewFileRecord {
    /// Creates a directory row at `path`.
    pub fn directory(owner_id: i64, path: VirtualPath) -> Self {
        Self {
            owner_id,
            name: path.name().to_string(),
            path,
            is_dir: true,
            size: 0,
            url: String::new(),
            hash: String::new(),
            device_id: String::new(),
        }
    }

    /// Checks the structural invariants that do not need the store.
    ///
    /// The remaining invariants (live ancestor exists, path uniqueness) are
    /// enforced transactionally by the repository.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.path.is_root() {
            return Err(CoreError::InvalidArgument(
                "cannot create a row at the namespace root".to_string(),
            ));
        }
        if self.name != self.path.name() {
            return Err(CoreError::InvalidArgument(format!(
                "name {:?} does not match final path segment of {}",
                self.name, self.path
            )));
        }
        if self.is_dir && (self.size != 0 || !self.url.is_empty() || !self.hash.is_empty()) {
            return Err(CoreError::InvalidArgument(
                "directories carry no size, url or hash".to_string(),
            ));
        }
        if self.size < 0 {
            return Err(CoreError::InvalidArgument(format!(
                "negative size: {}",
                self.size
            )));
        }
        Ok(())
    }
}
