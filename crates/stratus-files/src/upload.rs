//! Upload orchestration
//!
//! Three entry points cover the upload surface:
//! - `pre_check`: hash lookup for instant upload, falling back to a single
//!   presigned PUT for small files
//! - `init_chunked`: derives the chunk plan, issues per-part PUT URLs and
//!   reports parts already present so clients resume instead of re-sending
//! - `complete_chunked`: composes the parts server-side with ETag
//!   preconditions, registers the row, then cleans the chunks up
//!   asynchronously
//!
//! The upload id `{owner}_{hash}_{size}` is deterministic, so retrying any
//! of these steps converges on the same object keys.

use std::sync::Arc;
use std::time::Duration;

use stratus_core::domain::{plan, CoreError, FileRecord, NewFileRecord, VirtualPath};
use stratus_core::ports::{ComposeSource, IFileRepository, IObjectStore};

use crate::models::{
    ChunkUrl, CompleteChunkedRequest, ConfirmUploadRequest, ConfirmUploadResponse,
    ExistingPart, InitChunkedRequest, InitChunkedResponse, PreCheckRequest, PreCheckResponse,
};

/// Service orchestrating direct and chunked uploads
pub struct UploadService {
    repo: Arc<dyn IFileRepository>,
    store: Arc<dyn IObjectStore>,
    /// Lifetime of issued PUT URLs
    put_ttl: Duration,
}

impl UploadService {
    pub fn new(
        repo: Arc<dyn IFileRepository>,
        store: Arc<dyn IObjectStore>,
        put_ttl: Duration,
    ) -> Self {
        Self {
            repo,
            store,
            put_ttl,
        }
    }

    async fn ensure_parent_dir(&self, owner_id: i64, parent: &VirtualPath) -> Result<(), CoreError> {
        if parent.is_root() {
            return Ok(());
        }
        if !self.repo.path_exists(owner_id, parent, true).await? {
            return Err(CoreError::NotFound(format!(
                "parent directory not found: {parent}"
            )));
        }
        Ok(())
    }

    /// Instant-upload check: a hash hit returns the existing row and issues
    /// nothing; a miss grants a direct PUT for the small-file path.
    pub async fn pre_check(
        &self,
        owner_id: i64,
        req: &PreCheckRequest,
    ) -> Result<PreCheckResponse, CoreError> {
        if req.hash.is_empty() {
            return Err(CoreError::InvalidArgument("missing content hash".to_string()));
        }
        let parent = VirtualPath::new(req.parent_path.as_str())?;
        self.ensure_parent_dir(owner_id, &parent).await?;

        if let Some(existing) = self.repo.find_live_by_hash(owner_id, &req.hash).await? {
            tracing::debug!(owner_id, hash = %req.hash, file_id = existing.id, "instant upload hit");
            return Ok(PreCheckResponse {
                file_exists: true,
                file_id: Some(existing.id),
                file_path: Some(existing.path.as_str().to_string()),
                presigned_url: None,
                object_key: None,
            });
        }

        let key = plan::object_key(owner_id, &req.name);
        let url = self.store.presign_put(&key, self.put_ttl).await?;
        Ok(PreCheckResponse {
            file_exists: false,
            file_id: None,
            file_path: None,
            presigned_url: Some(url),
            object_key: Some(key),
        })
    }

    /// Registers metadata after a client-direct PUT.
    ///
    /// The row's size comes from the store, not the client, so what gets
    /// listed is what was actually uploaded. A concurrent upload of the same
    /// content resolves to the winner's row.
    pub async fn confirm_upload(
        &self,
        owner_id: i64,
        req: &ConfirmUploadRequest,
    ) -> Result<ConfirmUploadResponse, CoreError> {
        let parent = VirtualPath::new(req.parent_path.as_str())?;
        self.ensure_parent_dir(owner_id, &parent).await?;

        if let Some(existing) = self.repo.find_live_by_hash(owner_id, &req.hash).await? {
            return Ok(ConfirmUploadResponse {
                existed: true,
                file: existing,
            });
        }

        let key = plan::object_key(owner_id, &req.name);
        let stat = self.store.stat(&key).await.map_err(|e| match e {
            CoreError::NotFound(_) => {
                CoreError::Integrity(format!("uploaded object missing at {key}"))
            }
            other => other,
        })?;
        if stat.size as i64 != req.size {
            tracing::warn!(
                owner_id,
                key,
                declared = req.size,
                stored = stat.size,
                "declared size differs from stored object; trusting the store"
            );
        }

        let path = parent.join(&req.name)?;
        let record = self
            .repo
            .create_file(&NewFileRecord {
                owner_id,
                name: req.name.clone(),
                path,
                is_dir: false,
                size: stat.size as i64,
                url: self.store.object_url(&key),
                hash: req.hash.clone(),
                device_id: req.device_id.clone(),
            })
            .await?;

        Ok(ConfirmUploadResponse {
            existed: false,
            file: record,
        })
    }

    /// Starts (or resumes) a chunked upload.
    pub async fn init_chunked(
        &self,
        owner_id: i64,
        req: &InitChunkedRequest,
    ) -> Result<InitChunkedResponse, CoreError> {
        if req.hash.is_empty() {
            return Err(CoreError::InvalidArgument("missing content hash".to_string()));
        }
        let parent = VirtualPath::new(req.parent_path.as_str())?;
        self.ensure_parent_dir(owner_id, &parent).await?;

        // Same content already stored: instant upload, no URLs issued.
        if let Some(existing) = self.repo.find_live_by_hash(owner_id, &req.hash).await? {
            return Ok(InitChunkedResponse {
                file_exists: true,
                file_id: Some(existing.id),
                file_url: Some(existing.url),
                upload_id: None,
                chunk_urls: Vec::new(),
                total_chunks: 0,
                optimal_chunk_size: 0,
                recommended_concurrency: 0,
                existing_parts: Vec::new(),
                expires_in: 0,
            });
        }

        let upload_plan = plan::UploadPlan::for_size(req.size)?;
        let upload_id = plan::format_upload_id(owner_id, &req.hash, req.size);

        let mut chunk_urls = Vec::with_capacity(upload_plan.total_chunks as usize);
        for part_number in 1..=upload_plan.total_chunks {
            let key = plan::chunk_key(owner_id, &upload_id, part_number);
            let url = self.store.presign_put(&key, self.put_ttl).await?;
            chunk_urls.push(ChunkUrl {
                part_number,
                presigned_url: url,
            });
        }

        // Chunks surviving from an earlier attempt let the client skip
        // re-uploading those parts.
        let existing_parts = self
            .store
            .list(&plan::chunk_prefix(owner_id, &upload_id))
            .await?
            .into_iter()
            .map(|entry| ExistingPart {
                key: entry.key,
                etag: entry.etag,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            owner_id,
            upload_id = %upload_id,
            total_chunks = upload_plan.total_chunks,
            resumed_parts = existing_parts.len(),
            "initialized chunked upload"
        );

        Ok(InitChunkedResponse {
            file_exists: false,
            file_id: None,
            file_url: None,
            upload_id: Some(upload_id),
            chunk_urls,
            total_chunks: upload_plan.total_chunks,
            optimal_chunk_size: upload_plan.chunk_size,
            recommended_concurrency: upload_plan.concurrency,
            existing_parts,
            expires_in: self.put_ttl.as_secs(),
        })
    }

    /// Completes a chunked upload: compose, register, clean up.
    pub async fn complete_chunked(
        &self,
        owner_id: i64,
        upload_id: &str,
        req: &CompleteChunkedRequest,
    ) -> Result<FileRecord, CoreError> {
        if req.parts.is_empty() {
            return Err(CoreError::InvalidArgument(
                "completion requires at least one part".to_string(),
            ));
        }
        let (id_owner, _, declared_size) = plan::parse_upload_id(upload_id)?;
        if id_owner != owner_id {
            return Err(CoreError::InvalidArgument(
                "upload id belongs to a different owner".to_string(),
            ));
        }

        let parent = VirtualPath::new(req.parent_path.as_str())?;
        self.ensure_parent_dir(owner_id, &parent).await?;
        let target_path = parent.join(&req.file_name)?;
        if self.repo.path_exists(owner_id, &target_path, false).await? {
            return Err(CoreError::Conflict(format!(
                "path already exists: {target_path}"
            )));
        }

        // Clients may PUT parts in any order; composition order is fixed
        // here by part number. Each declared etag rides along as an
        // If-Match precondition.
        let mut parts = req.parts.clone();
        parts.sort_by_key(|p| p.part_number);
        for part in &parts {
            if part.part_number < 1 {
                return Err(CoreError::InvalidArgument(format!(
                    "part numbers are 1-based, got {}",
                    part.part_number
                )));
            }
        }

        let sources: Vec<ComposeSource> = parts
            .iter()
            .map(|p| ComposeSource {
                key: plan::chunk_key(owner_id, upload_id, p.part_number),
                etag: Some(p.etag.clone()),
            })
            .collect();

        let dest_key = plan::object_key(owner_id, &req.file_name);
        // A failed compose leaves the chunks untouched; the client re-PUTs
        // the offending part and retries.
        self.store.compose(&sources, &dest_key).await?;

        let size = self.resolve_size(&dest_key, declared_size, parts.len()).await;

        let record = self
            .repo
            .create_file(&NewFileRecord {
                owner_id,
                name: req.file_name.clone(),
                path: target_path,
                is_dir: false,
                size,
                url: self.store.object_url(&dest_key),
                hash: req.file_hash.clone(),
                device_id: req.device_id.clone(),
            })
            .await?;

        self.spawn_chunk_cleanup(owner_id, upload_id.to_string());

        tracing::info!(
            owner_id,
            upload_id,
            file_id = record.id,
            size,
            "completed chunked upload"
        );
        Ok(record)
    }

    /// Size of the composed object: the store's answer, then the size
    /// declared in the upload id, then a chunk-count estimate.
    async fn resolve_size(&self, dest_key: &str, declared_size: i64, part_count: usize) -> i64 {
        match self.store.stat(dest_key).await {
            Ok(stat) => stat.size as i64,
            Err(e) => {
                tracing::warn!(dest_key, error = %e, "stat after compose failed");
                if declared_size > 0 {
                    declared_size
                } else {
                    part_count as i64 * plan::optimal_chunk_size(declared_size)
                }
            }
        }
    }

    /// Best-effort asynchronous removal of the upload's chunk objects.
    fn spawn_chunk_cleanup(&self, owner_id: i64, upload_id: String) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            let prefix = plan::chunk_prefix(owner_id, &upload_id);
            let entries = match store.list(&prefix).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!(upload_id, error = %e, "chunk cleanup listing failed");
                    return;
                }
            };
            for entry in entries {
                if let Err(e) = store.delete(&entry.key).await {
                    tracing::warn!(key = %entry.key, error = %e, "chunk cleanup delete failed");
                }
            }
            tracing::debug!(upload_id, "chunk cleanup finished");
        });
    }
}
