//! S3 gateway implementation of the IObjectStore port
//!
//! Two buckets exist: the file bucket carries user content and upload
//! chunks, the user bucket carries avatars and is never touched here. The
//! compose operation maps onto a multipart upload whose parts are
//! server-side copies (`UploadPartCopy`) with `x-amz-copy-source-if-match`
//! carrying each declared ETag, so one corrupt chunk fails the whole
//! compose before the destination object exists.

use std::time::Duration;

use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;

use stratus_core::config::ObjectStoreConfig;
use stratus_core::domain::CoreError;
use stratus_core::ports::{ByteRange, ComposeSource, IObjectStore, ObjectEntry, ObjectReader, ObjectStat};

/// Gateway over an S3-compatible object store
pub struct S3Gateway {
    client: Client,
    file_bucket: String,
    user_bucket: String,
}

impl S3Gateway {
    pub fn new(client: Client, config: &ObjectStoreConfig) -> Self {
        Self {
            client,
            file_bucket: config.file_bucket.clone(),
            user_bucket: config.user_bucket.clone(),
        }
    }

    fn presigning(ttl: Duration) -> Result<PresigningConfig, CoreError> {
        PresigningConfig::expires_in(ttl)
            .map_err(|e| CoreError::Internal(format!("invalid presign ttl: {e}")))
    }

    /// Best-effort abort of a failed multipart compose; chunks stay intact
    /// either way so the client can retry.
    async fn abort_compose(&self, dest: &str, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.file_bucket)
            .key(dest)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(dest, error = %e, "failed to abort multipart compose");
        }
    }
}

/// Strips the surrounding quotes S3 puts on ETag values.
fn normalize_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

/// Maps an SDK error into the core taxonomy.
fn sdk_error<E, R>(op: &str, err: &SdkError<E, R>) -> CoreError
where
    E: ProvideErrorMetadata,
{
    match err {
        SdkError::ServiceError(ctx) => {
            let service_err = ctx.err();
            let code = service_err.code().unwrap_or("unknown");
            match code {
                "NoSuchKey" | "NotFound" => CoreError::NotFound(format!("{op}: {code}")),
                "PreconditionFailed" => {
                    CoreError::Integrity(format!("{op}: etag precondition failed"))
                }
                _ => CoreError::StorageUnavailable(format!(
                    "{op}: {code}: {}",
                    service_err.message().unwrap_or("no message")
                )),
            }
        }
        _ => CoreError::StorageUnavailable(format!("{op}: transport failure")),
    }
}

/// Compose failures around missing or mismatched parts are integrity
/// violations, not lookup misses.
fn compose_error(kind: CoreError) -> CoreError {
    match kind {
        CoreError::NotFound(msg) => CoreError::Integrity(format!("missing part: {msg}")),
        other => other,
    }
}

#[async_trait::async_trait]
impl IObjectStore for S3Gateway {
    async fn presign_put(&self, key: &str, ttl: Duration) -> Result<String, CoreError> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.file_bucket)
            .key(key)
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(|e| sdk_error("presign put", &e))?;

        Ok(presigned.uri().to_string())
    }

    async fn presign_get(
        &self,
        key: &str,
        filename: &str,
        ttl: Duration,
    ) -> Result<String, CoreError> {
        let disposition = format!("attachment; filename=\"{filename}\"");
        let presigned = self
            .client
            .get_object()
            .bucket(&self.file_bucket)
            .key(key)
            .response_content_disposition(disposition)
            .presigned(Self::presigning(ttl)?)
            .await
            .map_err(|e| sdk_error("presign get", &e))?;

        Ok(presigned.uri().to_string())
    }

    async fn compose(&self, sources: &[ComposeSource], dest: &str) -> Result<(), CoreError> {
        if sources.is_empty() {
            return Err(CoreError::InvalidArgument(
                "compose requires at least one source".to_string(),
            ));
        }

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.file_bucket)
            .key(dest)
            .send()
            .await
            .map_err(|e| sdk_error("create compose", &e))?;
        let upload_id = created.upload_id().unwrap_or_default().to_string();

        let mut completed_parts = Vec::with_capacity(sources.len());
        for (idx, source) in sources.iter().enumerate() {
            let part_number = idx as i32 + 1;
            let copied = self
                .client
                .upload_part_copy()
                .bucket(&self.file_bucket)
                .key(dest)
                .upload_id(&upload_id)
                .part_number(part_number)
                .copy_source(format!("{}/{}", self.file_bucket, source.key))
                .set_copy_source_if_match(source.etag.clone())
                .send()
                .await;

            let copied = match copied {
                Ok(out) => out,
                Err(e) => {
                    let mapped = compose_error(sdk_error("compose part", &e));
                    tracing::warn!(
                        dest,
                        part_number,
                        source_key = %source.key,
                        error = %mapped,
                        "compose part failed"
                    );
                    self.abort_compose(dest, &upload_id).await;
                    return Err(mapped);
                }
            };

            let etag = copied
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .map(normalize_etag)
                .unwrap_or_default();
            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );
        }

        let assembled = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();
        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.file_bucket)
            .key(dest)
            .upload_id(&upload_id)
            .multipart_upload(assembled)
            .send()
            .await;

        if let Err(e) = completed {
            let mapped = compose_error(sdk_error("complete compose", &e));
            self.abort_compose(dest, &upload_id).await;
            return Err(mapped);
        }

        tracing::debug!(dest, parts = sources.len(), "composed object");
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat, CoreError> {
        let head = self
            .client
            .head_object()
            .bucket(&self.file_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|se| se.is_not_found()) == Some(true) {
                    CoreError::NotFound(format!("no object at {key}"))
                } else {
                    sdk_error("stat", &e)
                }
            })?;

        Ok(ObjectStat {
            size: head.content_length().unwrap_or(0).max(0) as u64,
            etag: head.e_tag().map(normalize_etag).unwrap_or_default(),
            content_type: head.content_type().map(str::to_string),
            last_modified: head
                .last_modified()
                .and_then(|dt| chrono::DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())),
        })
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectReader, CoreError> {
        let mut request = self
            .client
            .get_object()
            .bucket(&self.file_bucket)
            .key(key);
        if let Some(range) = range {
            request = request.range(format!("bytes={}-{}", range.start, range.end));
        }

        let output = request.send().await.map_err(|e| {
            if e.as_service_error().map(|se| se.is_no_such_key()) == Some(true) {
                CoreError::NotFound(format!("no object at {key}"))
            } else {
                sdk_error("get object", &e)
            }
        })?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, CoreError> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.file_bucket)
                .prefix(prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let page = request
                .send()
                .await
                .map_err(|e| sdk_error("list objects", &e))?;

            for object in page.contents() {
                let key = match object.key() {
                    Some(k) => k.to_string(),
                    None => continue,
                };
                entries.push(ObjectEntry {
                    key,
                    etag: object.e_tag().map(normalize_etag).unwrap_or_default(),
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated() == Some(true) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.client
            .delete_object()
            .bucket(&self.file_bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| sdk_error("delete object", &e))?;
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.file_bucket, key)
    }

    fn extract_object_key(&self, url: &str) -> String {
        // Strip any scheme and host, then the query string.
        let path = match url.split_once("://") {
            Some((_, rest)) => match rest.find('/') {
                Some(idx) => &rest[idx + 1..],
                None => "",
            },
            None => url,
        };
        let path = path.trim_start_matches('/');
        let path = path.split('?').next().unwrap_or(path);

        // A leading known-bucket segment is not part of the key.
        if let Some((first, rest)) = path.split_once('/') {
            if first == self.file_bucket || first == self.user_bucket {
                return rest.to_string();
            }
        }
        path.to_string()
    }
}
