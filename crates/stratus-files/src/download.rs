//! Download engine
//!
//! Three delivery shapes:
//! - single file: a presigned GET link, the server stays out of the byte path
//! - multiple files: an in-memory ZIP, bounded by the configured cap
//! - streamed single file: range-capable, pumped through the rate limiter
//!
//! Streaming is split into `prepare_stream` (metadata, range resolution,
//! header material) and `run_stream` (the pump), so the HTTP layer can
//! commit status and headers before the first body byte.

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use zip::write::FileOptions;

use stratus_core::domain::{CoreError, FileRecord, Tier};
use stratus_core::ports::{ByteRange, IFileRepository, IObjectStore};
use stratus_throttle::{buffer_size_for, global_plan, ByteSink, RateLimitedWriter, TokenBucket, WriteError};

use crate::content_type::content_type_for;
use crate::models::{DownloadRequest, ProgressInfo};
use crate::range::{parse_range_header, RangeSpec};

/// Result of a multi-target download request
#[derive(Debug)]
pub enum DownloadOutcome {
    /// One file: redirect the client straight at the object store
    Single { dlink: String, total_size: i64 },
    /// Several files packed into a ZIP
    Zip {
        zip_name: String,
        total_size: i64,
        data: Vec<u8>,
    },
}

/// Resolved metadata for a streamed download
#[derive(Debug, Clone)]
pub struct StreamPlan {
    pub file: FileRecord,
    pub object_size: u64,
    /// Present when the client sent a valid Range header
    pub range: Option<RangeSpec>,
    pub content_type: String,
    pub etag: Option<String>,
    /// Preformatted HTTP-date for the Last-Modified header
    pub last_modified: Option<String>,
}

impl StreamPlan {
    /// Bytes this response will carry.
    pub fn transfer_len(&self) -> u64 {
        match self.range {
            Some(range) => range.length(),
            None => self.object_size,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.range.is_some()
    }

    /// `Content-Range` value for partial responses.
    pub fn content_range(&self) -> Option<String> {
        self.range
            .map(|r| format!("bytes {}-{}/{}", r.start, r.end, r.total))
    }
}

/// How a stream ended
pub struct StreamOutcome {
    /// Bytes that reached the sink; on cancellation these are already on
    /// the wire and stay delivered
    pub bytes_written: u64,
    pub result: Result<(), CoreError>,
}

/// Service answering download requests
pub struct DownloadService {
    repo: Arc<dyn IFileRepository>,
    store: Arc<dyn IObjectStore>,
    /// Lifetime of presigned download links
    link_ttl: Duration,
    /// Upper bound for in-memory ZIP assembly
    zip_max_bytes: u64,
    /// Process-wide egress limiter shared by every stream
    global_limiter: Arc<TokenBucket>,
}

impl DownloadService {
    pub fn new(
        repo: Arc<dyn IFileRepository>,
        store: Arc<dyn IObjectStore>,
        link_ttl: Duration,
        zip_max_bytes: u64,
        global_bytes_per_sec: u64,
    ) -> Self {
        let plan = global_plan(global_bytes_per_sec);
        Self {
            repo,
            store,
            link_ttl,
            zip_max_bytes,
            global_limiter: Arc::new(TokenBucket::new(plan.rate, plan.burst)),
        }
    }

    /// The shared global limiter, exposed for wiring and tests.
    pub fn global_limiter(&self) -> Arc<TokenBucket> {
        Arc::clone(&self.global_limiter)
    }

    /// Multi-target entry point: presigned link for one file, ZIP for many.
    pub async fn download_targets(
        &self,
        owner_id: i64,
        req: &DownloadRequest,
    ) -> Result<DownloadOutcome, CoreError> {
        if req.file_ids.is_empty() {
            return Err(CoreError::InvalidArgument("no files requested".to_string()));
        }

        let files = self.repo.find_by_ids(owner_id, &req.file_ids).await?;
        if files.is_empty() {
            return Err(CoreError::NotFound("requested files not found".to_string()));
        }

        let mut total_size: i64 = 0;
        for file in &files {
            if file.is_dir {
                return Err(CoreError::InvalidArgument(format!(
                    "cannot download a directory: {}",
                    file.name
                )));
            }
            total_size += file.size;
        }

        if files.len() == 1 {
            let file = &files[0];
            let key = self.store.extract_object_key(&file.url);
            let dlink = self.store.presign_get(&key, &file.name, self.link_ttl).await?;
            return Ok(DownloadOutcome::Single {
                dlink,
                total_size,
            });
        }

        if total_size as u64 > self.zip_max_bytes {
            return Err(CoreError::InvalidArgument(format!(
                "zip assembly of {total_size} bytes exceeds the {} byte cap",
                self.zip_max_bytes
            )));
        }

        let data = self.build_zip(&files).await?;
        let zip_name = normalize_zip_name(req.zip_name.as_deref(), files.len());
        Ok(DownloadOutcome::Zip {
            zip_name,
            total_size,
            data,
        })
    }

    /// Packs each file into one ZIP entry named after the row.
    async fn build_zip(&self, files: &[FileRecord]) -> Result<Vec<u8>, CoreError> {
        let zip_err = |e: zip::result::ZipError| CoreError::Internal(format!("zip assembly: {e}"));
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for file in files {
            let key = self.store.extract_object_key(&file.url);
            let mut reader = self.store.get(&key, None).await?;
            let mut content = Vec::with_capacity(file.size.max(0) as usize);
            reader.read_to_end(&mut content).await.map_err(|e| {
                CoreError::StorageUnavailable(format!("reading {key} for zip: {e}"))
            })?;

            writer
                .start_file(file.name.as_str(), FileOptions::default())
                .map_err(zip_err)?;
            writer
                .write_all(&content)
                .map_err(|e| CoreError::Internal(format!("zip write: {e}")))?;
        }

        let cursor = writer.finish().map_err(zip_err)?;
        Ok(cursor.into_inner())
    }

    /// Resolves metadata and the requested range for a streamed download.
    pub async fn prepare_stream(
        &self,
        owner_id: i64,
        file_id: i64,
        range_header: Option<&str>,
    ) -> Result<StreamPlan, CoreError> {
        let file = self.repo.get_by_id(owner_id, file_id).await?;
        if file.is_dir {
            return Err(CoreError::InvalidArgument(
                "cannot stream a directory".to_string(),
            ));
        }

        let key = self.store.extract_object_key(&file.url);
        let stat = self.store.stat(&key).await?;

        let range = match range_header {
            Some(header) => Some(parse_range_header(header, stat.size)?),
            None => None,
        };

        let content_type = stat
            .content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or_else(|| content_type_for(&file.name).to_string());

        Ok(StreamPlan {
            object_size: stat.size,
            range,
            content_type,
            etag: if stat.etag.is_empty() {
                None
            } else {
                Some(stat.etag)
            },
            last_modified: stat.last_modified.map(http_date),
            file,
        })
    }

    /// Pumps the object through the rate limiter into `sink`.
    ///
    /// Each buffer is handed to the sink as its own chunk, so clients see
    /// steady progress instead of one burst at the end. Cancellation stops
    /// the pump immediately; bytes already written count as delivered.
    pub async fn run_stream<S: ByteSink>(
        &self,
        plan: &StreamPlan,
        tier: Tier,
        sink: S,
        cancel: CancellationToken,
    ) -> StreamOutcome {
        let key = self.store.extract_object_key(&plan.file.url);
        let byte_range = plan.range.map(|r| ByteRange {
            start: r.start,
            end: r.end,
        });

        let mut reader = match self.store.get(&key, byte_range).await {
            Ok(reader) => reader,
            Err(e) => {
                return StreamOutcome {
                    bytes_written: 0,
                    result: Err(e),
                }
            }
        };

        let transfer_len = plan.transfer_len();
        let mut writer =
            RateLimitedWriter::new(sink, self.global_limiter(), transfer_len, tier, cancel.clone());
        let mut buffer = vec![0u8; buffer_size_for(transfer_len)];

        loop {
            if cancel.is_cancelled() {
                return StreamOutcome {
                    bytes_written: writer.bytes_written(),
                    result: Err(CoreError::Cancelled),
                };
            }

            let n = match reader.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    return StreamOutcome {
                        bytes_written: writer.bytes_written(),
                        result: Err(CoreError::StorageUnavailable(format!(
                            "object read failed: {e}"
                        ))),
                    }
                }
            };

            if let Err(e) = writer.write(&buffer[..n]).await {
                let result = match e {
                    WriteError::Cancelled => Err(CoreError::Cancelled),
                    // a broken sink means the client went away mid-transfer
                    WriteError::Io(_) => Err(CoreError::Cancelled),
                };
                return StreamOutcome {
                    bytes_written: writer.bytes_written(),
                    result,
                };
            }
        }

        StreamOutcome {
            bytes_written: writer.bytes_written(),
            result: Ok(()),
        }
    }

    /// Head-style metadata for resume decisions.
    pub async fn progress(&self, owner_id: i64, file_id: i64) -> Result<ProgressInfo, CoreError> {
        let file = self.repo.get_by_id(owner_id, file_id).await?;
        if file.is_dir {
            return Err(CoreError::InvalidArgument(
                "directories have no download progress".to_string(),
            ));
        }

        let key = self.store.extract_object_key(&file.url);
        let stat = self.store.stat(&key).await?;

        Ok(ProgressInfo {
            file_id: file.id,
            file_name: file.name.clone(),
            content_type: stat
                .content_type
                .filter(|ct| !ct.is_empty())
                .unwrap_or_else(|| content_type_for(&file.name).to_string()),
            total_size: stat.size,
            accept_ranges: true,
            etag: if stat.etag.is_empty() {
                None
            } else {
                Some(stat.etag)
            },
            last_modified: stat.last_modified.map(http_date),
        })
    }
}

/// Default `download_{n}_files.zip`, with `.zip` appended when missing.
fn normalize_zip_name(requested: Option<&str>, file_count: usize) -> String {
    let mut name = match requested {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => format!("download_{file_count}_files.zip"),
    };
    if !name.ends_with(".zip") {
        name.push_str(".zip");
    }
    name
}

/// RFC 7231 HTTP-date, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
fn http_date(dt: chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
