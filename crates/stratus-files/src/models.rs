//! Request and response DTOs for the HTTP surface
//!
//! Field names follow the wire convention (camelCase) while the domain
//! types stay idiomatic Rust. Everything here is plain data; validation
//! happens in the services.

use serde::{Deserialize, Serialize};

use stratus_core::domain::FileRecord;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFileRequest {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub is_dir: bool,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFileRequest {
    pub name: Option<String>,
    pub new_path: Option<String>,
    pub size: Option<i64>,
    pub url: Option<String>,
    pub hash: Option<String>,
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRequest {
    pub old_path: String,
    pub new_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyRequest {
    pub source_path: String,
    pub target_path: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCheckRequest {
    pub name: String,
    pub size: i64,
    pub hash: String,
    #[serde(default = "default_parent")]
    pub parent_path: String,
}

fn default_parent() -> String {
    "/".to_string()
}

/// Pre-check answer: either an instant-upload hit or a direct PUT grant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCheckResponse {
    pub file_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presigned_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadRequest {
    pub name: String,
    pub size: i64,
    pub hash: String,
    #[serde(default = "default_parent")]
    pub parent_path: String,
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadResponse {
    pub existed: bool,
    pub file: FileRecord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitChunkedRequest {
    pub name: String,
    pub size: i64,
    pub hash: String,
    #[serde(default = "default_parent")]
    pub parent_path: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkUrl {
    pub part_number: i64,
    pub presigned_url: String,
}

/// A chunk already present in the store from an earlier attempt
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingPart {
    pub key: String,
    pub etag: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitChunkedResponse {
    pub file_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upload_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chunk_urls: Vec<ChunkUrl>,
    pub total_chunks: i64,
    pub optimal_chunk_size: i64,
    pub recommended_concurrency: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub existing_parts: Vec<ExistingPart>,
    /// Seconds until the issued URLs expire
    pub expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartETag {
    pub part_number: i64,
    pub etag: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteChunkedRequest {
    pub parts: Vec<PartETag>,
    pub file_name: String,
    #[serde(default = "default_parent")]
    pub parent_path: String,
    pub file_hash: String,
    #[serde(default)]
    pub device_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    pub file_ids: Vec<i64>,
    #[serde(default)]
    pub zip_name: Option<String>,
}

/// Head-style metadata for client-side resume decisions
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    pub file_id: i64,
    pub file_name: String,
    pub content_type: String,
    pub total_size: u64,
    pub accept_ranges: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub path: String,
    pub contents: Vec<FileRecord>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub total_files: i64,
    pub total_folders: i64,
    pub total_size: i64,
    pub total_space: i64,
    pub used_space: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub id: i64,
    /// 1-based position in the newest-first listing; advisory only
    pub version: usize,
    pub hash: String,
    pub size: i64,
    pub url: String,
    pub device_id: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub valid: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precheck_request_defaults_parent_to_root() {
        let req: PreCheckRequest =
            serde_json::from_str(r#"{"name":"a.bin","size":10,"hash":"h"}"#).unwrap();
        assert_eq!(req.parent_path, "/");
    }

    #[test]
    fn test_precheck_response_omits_empty_fields() {
        let resp = PreCheckResponse {
            file_exists: true,
            file_id: Some(7),
            file_path: Some("/old.bin".to_string()),
            presigned_url: None,
            object_key: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"fileExists\":true"));
        assert!(!json.contains("presignedUrl"));
    }

    #[test]
    fn test_complete_request_wire_names() {
        let req: CompleteChunkedRequest = serde_json::from_str(
            r#"{"parts":[{"partNumber":2,"etag":"e2"},{"partNumber":1,"etag":"e1"}],
                "fileName":"big.bin","parentPath":"/","fileHash":"h"}"#,
        )
        .unwrap();
        assert_eq!(req.parts.len(), 2);
        assert_eq!(req.parts[0].part_number, 2);
        assert_eq!(req.file_name, "big.bin");
    }
}
