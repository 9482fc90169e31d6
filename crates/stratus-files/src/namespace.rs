//! Namespace operations
//!
//! CRUD over the path-indexed file graph, recursive copy and delete, and
//! the dedup-aware content reclamation rule: a stored object is removed only
//! when the last live row referencing its hash goes away, and a failure to
//! remove it never blocks the metadata soft-delete.

use std::sync::Arc;

use stratus_core::domain::{CoreError, FileRecord, NewFileRecord, VirtualPath};
use stratus_core::ports::{FilePatch, IFileRepository, IObjectStore};

use crate::models::{
    CreateFileRequest, ListResponse, StatsResponse, UpdateFileRequest, VersionEntry,
};

/// Nominal per-user quota surfaced by the stats endpoint: 10 GiB.
const TOTAL_SPACE: i64 = 10 * 1024 * 1024 * 1024;

/// Service for namespace CRUD, move/copy and delete
pub struct NamespaceService {
    repo: Arc<dyn IFileRepository>,
    store: Arc<dyn IObjectStore>,
}

impl NamespaceService {
    pub fn new(repo: Arc<dyn IFileRepository>, store: Arc<dyn IObjectStore>) -> Self {
        Self { repo, store }
    }

    /// Creates a directory or registers a file row over an already-stored
    /// object.
    pub async fn create(
        &self,
        owner_id: i64,
        req: &CreateFileRequest,
    ) -> Result<FileRecord, CoreError> {
        let path = VirtualPath::new(req.path.as_str())?;

        // A fresh row may not duplicate content under a different object:
        // every live (owner, hash) pair maps to exactly one stored URL.
        if !req.is_dir && !req.hash.is_empty() {
            if let Some(existing) = self.repo.find_live_by_hash(owner_id, &req.hash).await? {
                if existing.url != req.url {
                    return Err(CoreError::Conflict(format!(
                        "content already stored at {}; re-register it instead of \
                         attaching a second object",
                        existing.path
                    )));
                }
            }
        }

        let rec = NewFileRecord {
            owner_id,
            name: req.name.clone(),
            path,
            is_dir: req.is_dir,
            size: if req.is_dir { 0 } else { req.size },
            url: if req.is_dir { String::new() } else { req.url.clone() },
            hash: if req.is_dir { String::new() } else { req.hash.clone() },
            device_id: req.device_id.clone(),
        };
        self.repo.create_file(&rec).await
    }

    /// Lists the direct contents of a live directory.
    pub async fn list(&self, owner_id: i64, path: &str) -> Result<ListResponse, CoreError> {
        let dir = VirtualPath::new(path)?;
        if !dir.is_root() && !self.repo.path_exists(owner_id, &dir, true).await? {
            return Err(CoreError::NotFound(format!("directory not found: {dir}")));
        }

        let contents = self.repo.list_children(owner_id, &dir).await?;
        Ok(ListResponse {
            path: dir.as_str().to_string(),
            total: contents.len(),
            contents,
        })
    }

    pub async fn get(&self, owner_id: i64, id: i64) -> Result<FileRecord, CoreError> {
        self.repo.get_by_id(owner_id, id).await
    }

    /// Partial update. Renames and path changes both route through
    /// [`IFileRepository::move_path`] so the name column always matches the
    /// final path segment.
    pub async fn update(
        &self,
        owner_id: i64,
        id: i64,
        req: &UpdateFileRequest,
    ) -> Result<FileRecord, CoreError> {
        let current = self.repo.get_by_id(owner_id, id).await?;

        let target = match (&req.new_path, &req.name) {
            (Some(new_path), _) => Some(VirtualPath::new(new_path.as_str())?),
            (None, Some(name)) => Some(current.path.parent().join(name)?),
            (None, None) => None,
        };
        if let Some(target) = target {
            if target != current.path {
                self.repo.move_path(owner_id, &current.path, &target).await?;
            }
        }

        let patch = FilePatch {
            // handled above; the patch only carries content fields
            name: None,
            size: req.size,
            url: req.url.clone(),
            hash: req.hash.clone(),
            device_id: req.device_id.clone(),
        };
        self.repo.update(owner_id, id, &patch).await
    }

    pub async fn move_path(&self, owner_id: i64, old: &str, new: &str) -> Result<(), CoreError> {
        let old = VirtualPath::new(old)?;
        let new = VirtualPath::new(new)?;
        self.repo.move_path(owner_id, &old, &new).await
    }

    /// Copies a file or directory subtree. Copied files share the source's
    /// stored object; no bytes move.
    pub async fn copy_path(
        &self,
        owner_id: i64,
        source: &str,
        target: &str,
    ) -> Result<(), CoreError> {
        let source = VirtualPath::new(source)?;
        let target = VirtualPath::new(target)?;

        let source_rec = self.repo.get_by_path(owner_id, &source).await.map_err(|_| {
            CoreError::Conflict(format!("source path not found: {source}"))
        })?;

        if self.repo.path_exists(owner_id, &target, false).await? {
            return Err(CoreError::Conflict(format!(
                "target path already exists: {target}"
            )));
        }
        let parent = target.parent();
        if !parent.is_root() && !self.repo.path_exists(owner_id, &parent, true).await? {
            return Err(CoreError::NotFound(format!(
                "target parent directory not found: {parent}"
            )));
        }
        if source_rec.is_dir && target.is_inside(&source) {
            return Err(CoreError::Conflict(format!(
                "cannot copy directory {source} into its own subtree {target}"
            )));
        }

        self.copy_recursive(owner_id, &source_rec, &target).await
    }

    /// Depth-first subtree copy. Recursion is boxed because the future is
    /// self-referential across levels.
    fn copy_recursive<'a>(
        &'a self,
        owner_id: i64,
        source: &'a FileRecord,
        target: &'a VirtualPath,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), CoreError>> + Send + 'a>,
    > {
        Box::pin(async move {
            if !source.is_dir {
                let rec = NewFileRecord {
                    owner_id,
                    name: target.name().to_string(),
                    path: target.clone(),
                    is_dir: false,
                    size: source.size,
                    url: source.url.clone(),
                    hash: source.hash.clone(),
                    device_id: source.device_id.clone(),
                };
                self.repo.create_file(&rec).await?;
                return Ok(());
            }

            self.repo
                .create_file(&NewFileRecord::directory(owner_id, target.clone()))
                .await?;

            let children = self.repo.list_children(owner_id, &source.path).await?;
            for child in &children {
                let child_target = target.join(&child.name)?;
                self.copy_recursive(owner_id, child, &child_target).await?;
            }
            Ok(())
        })
    }

    /// Recursive soft-delete with content reclamation.
    ///
    /// Children go first so the subtree never contains orphans. For the last
    /// live reference to a hash the stored object is deleted best-effort:
    /// storage failures are logged and the metadata delete proceeds.
    pub fn delete_path<'a>(
        &'a self,
        owner_id: i64,
        path: &'a VirtualPath,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<(), CoreError>> + Send + 'a>,
    > {
        Box::pin(async move {
            let record = self.repo.get_by_path(owner_id, path).await?;

            if record.is_dir {
                let children = self.repo.list_children(owner_id, path).await?;
                for child in &children {
                    self.delete_path(owner_id, &child.path).await?;
                }
            } else if !record.hash.is_empty() {
                let referenced = self
                    .repo
                    .has_other_references(&record.hash, &record.url, record.id)
                    .await?;
                if !referenced {
                    let key = self.store.extract_object_key(&record.url);
                    if !key.is_empty() {
                        if let Err(e) = self.store.delete(&key).await {
                            tracing::warn!(
                                owner_id,
                                path = %path,
                                key,
                                error = %e,
                                "failed to reclaim stored object; leaving orphan"
                            );
                        }
                    }
                }
            }

            self.repo.soft_delete(owner_id, path).await
        })
    }

    pub async fn delete(&self, owner_id: i64, path: &str) -> Result<(), CoreError> {
        let path = VirtualPath::new(path)?;
        self.delete_path(owner_id, &path).await
    }

    pub async fn batch_delete(&self, owner_id: i64, paths: &[String]) -> Result<(), CoreError> {
        for path in paths {
            self.delete(owner_id, path).await?;
        }
        Ok(())
    }

    /// Rows sharing the file's content hash, newest first, with a 1-based
    /// position standing in for a real version number.
    pub async fn versions(
        &self,
        owner_id: i64,
        file_id: i64,
    ) -> Result<Vec<VersionEntry>, CoreError> {
        let record = self.repo.get_by_id(owner_id, file_id).await?;
        if record.is_dir || record.hash.is_empty() {
            return Err(CoreError::InvalidArgument(
                "version history requires a content-bearing file".to_string(),
            ));
        }

        let rows = self.repo.find_by_hash(owner_id, &record.hash).await?;
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(idx, row)| VersionEntry {
                id: row.id,
                version: idx + 1,
                hash: row.hash,
                size: row.size,
                url: row.url,
                device_id: row.device_id,
                created_at: row.ctime,
            })
            .collect())
    }

    pub async fn stats(&self, owner_id: i64) -> Result<StatsResponse, CoreError> {
        let stats = self.repo.stats(owner_id).await?;
        Ok(StatsResponse {
            total_files: stats.total_files,
            total_folders: stats.total_folders,
            total_size: stats.total_size,
            total_space: TOTAL_SPACE,
            used_space: stats.total_size,
        })
    }

    /// A row is verifiable when it is a live file carrying a content hash.
    pub async fn verify(&self, owner_id: i64, file_id: i64) -> Result<bool, CoreError> {
        let record = self.repo.get_by_id(owner_id, file_id).await?;
        Ok(!record.is_dir && !record.hash.is_empty())
    }
}
