//! Namespace store port (driven/secondary port)
//!
//! Path-indexed, owner-scoped, soft-deleted persistence of [`FileRecord`]
//! rows. The production implementation is the SQLite repository in
//! `stratus-store`. Every method that answers on behalf of an owner takes
//! the owner id explicitly; the repository never infers identity.

use crate::domain::{CoreError, FileRecord, NewFileRecord, VirtualPath};

/// Partial update of a file row
///
/// Path changes are deliberately absent: they go through
/// [`IFileRepository::move_path`] so that directory subtrees stay consistent.
#[derive(Debug, Clone, Default)]
pub struct FilePatch {
    pub name: Option<String>,
    pub size: Option<i64>,
    pub url: Option<String>,
    pub hash: Option<String>,
    pub device_id: Option<String>,
}

impl FilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.size.is_none()
            && self.url.is_none()
            && self.hash.is_none()
            && self.device_id.is_none()
    }
}

/// Aggregate counts for an owner's namespace
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NamespaceStats {
    pub total_files: i64,
    pub total_folders: i64,
    pub total_size: i64,
}

/// Port trait for the persistent namespace store
#[async_trait::async_trait]
pub trait IFileRepository: Send + Sync {
    /// Creates a row after validating the path invariants transactionally:
    /// the live directory ancestor must exist and `(owner, path, live)` must
    /// be free. Returns the created row with id and timestamps filled in.
    async fn create_file(&self, rec: &NewFileRecord) -> Result<FileRecord, CoreError>;

    async fn get_by_path(&self, owner_id: i64, path: &VirtualPath)
        -> Result<FileRecord, CoreError>;

    async fn get_by_id(&self, owner_id: i64, id: i64) -> Result<FileRecord, CoreError>;

    /// Loads live rows for the given ids; missing ids are simply absent
    /// from the result.
    async fn find_by_ids(&self, owner_id: i64, ids: &[i64]) -> Result<Vec<FileRecord>, CoreError>;

    /// Direct children of a live directory: directories first, then by name
    /// ascending. Never returns grandchildren.
    async fn list_children(
        &self,
        owner_id: i64,
        dir: &VirtualPath,
    ) -> Result<Vec<FileRecord>, CoreError>;

    async fn path_exists(
        &self,
        owner_id: i64,
        path: &VirtualPath,
        must_be_dir: bool,
    ) -> Result<bool, CoreError>;

    /// Atomically rewrites the row at `old` to `new` and, for directories,
    /// the path of every live descendant by prefix replacement.
    async fn move_path(
        &self,
        owner_id: i64,
        old: &VirtualPath,
        new: &VirtualPath,
    ) -> Result<(), CoreError>;

    /// Dedup probe: the most recent live file row of this owner carrying
    /// `hash`, if any.
    async fn find_live_by_hash(
        &self,
        owner_id: i64,
        hash: &str,
    ) -> Result<Option<FileRecord>, CoreError>;

    /// Reclamation check: true when at least one live row other than
    /// `exclude_id` still references the content.
    ///
    /// The decision is made on the hash alone; `url` is only cross-checked
    /// for logging because distinct contents can share an empty URL.
    async fn has_other_references(
        &self,
        hash: &str,
        url: &str,
        exclude_id: i64,
    ) -> Result<bool, CoreError>;

    /// Marks the row at `path` deleted and stamps `utime`. Non-recursive;
    /// subtree traversal belongs to the namespace service.
    async fn soft_delete(&self, owner_id: i64, path: &VirtualPath) -> Result<(), CoreError>;

    /// Applies a partial update and returns the fresh row.
    async fn update(
        &self,
        owner_id: i64,
        id: i64,
        patch: &FilePatch,
    ) -> Result<FileRecord, CoreError>;

    /// Live rows of this owner sharing `hash`, newest first. Serves the
    /// version-history endpoint.
    async fn find_by_hash(&self, owner_id: i64, hash: &str)
        -> Result<Vec<FileRecord>, CoreError>;

    async fn stats(&self, owner_id: i64) -> Result<NamespaceStats, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_is_empty() {
        assert!(FilePatch::default().is_empty());
        let patch = FilePatch {
            size: Some(9),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
