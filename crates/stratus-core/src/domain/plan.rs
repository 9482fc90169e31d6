//! Chunked-upload planning
//!
//! The upload plan is derived purely from the declared file size. The
//! deterministic upload id `{owner}_{hash}_{size}` makes re-initialization of
//! the same logical upload idempotent: chunk keys, and therefore resumable
//! state, live entirely in the object store.

use super::errors::CoreError;

const MIB: i64 = 1024 * 1024;
const GIB: i64 = 1024 * MIB;

/// Plan for a single chunked upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPlan {
    pub chunk_size: i64,
    pub total_chunks: i64,
    /// Client-side parallelism hint
    pub concurrency: u32,
}

impl UploadPlan {
    /// Derives the plan for a file of `size` bytes.
    pub fn for_size(size: i64) -> Result<Self, CoreError> {
        if size <= 0 {
            return Err(CoreError::InvalidArgument(format!(
                "upload size must be positive, got {size}"
            )));
        }
        let chunk_size = optimal_chunk_size(size);
        Ok(Self {
            chunk_size,
            total_chunks: (size + chunk_size - 1) / chunk_size,
            concurrency: recommended_concurrency(size),
        })
    }
}

/// Chunk size by declared file size.
pub fn optimal_chunk_size(size: i64) -> i64 {
    if size <= 0 {
        return 5 * MIB;
    }
    match size {
        s if s < 10 * MIB => MIB,
        s if s < 100 * MIB => 5 * MIB,
        s if s < GIB => 10 * MIB,
        _ => 20 * MIB,
    }
}

/// Suggested number of parallel chunk PUTs by declared file size.
pub fn recommended_concurrency(size: i64) -> u32 {
    if size <= 0 {
        return 3;
    }
    match size {
        s if s < 10 * MIB => 2,
        s if s < 100 * MIB => 4,
        s if s < GIB => 6,
        _ => 8,
    }
}

/// Formats the deterministic upload id for a logical upload.
pub fn format_upload_id(owner_id: i64, hash: &str, size: i64) -> String {
    format!("{owner_id}_{hash}_{size}")
}

/// Splits an upload id back into `(owner_id, hash, size)`.
///
/// The hash is hex and never contains `_`, so the first and last underscore
/// delimit it unambiguously.
pub fn parse_upload_id(upload_id: &str) -> Result<(i64, String, i64), CoreError> {
    let bad = || CoreError::InvalidArgument(format!("malformed upload id: {upload_id:?}"));
    let first = upload_id.find('_').ok_or_else(bad)?;
    let last = upload_id.rfind('_').ok_or_else(bad)?;
    if first == last {
        return Err(bad());
    }
    let owner_id: i64 = upload_id[..first].parse().map_err(|_| bad())?;
    let hash = &upload_id[first + 1..last];
    let size: i64 = upload_id[last + 1..].parse().map_err(|_| bad())?;
    if hash.is_empty() || size <= 0 {
        return Err(bad());
    }
    Ok((owner_id, hash.to_string(), size))
}

/// Object key of one uploaded chunk: `{owner}/chunks/{upload_id}/{part}`.
pub fn chunk_key(owner_id: i64, upload_id: &str, part_number: i64) -> String {
    format!("{owner_id}/chunks/{upload_id}/{part_number}")
}

/// Prefix under which every chunk of an upload lives.
pub fn chunk_prefix(owner_id: i64, upload_id: &str) -> String {
    format!("{owner_id}/chunks/{upload_id}/")
}

/// Final object key of an owner's file: `{owner}/{name}`.
pub fn object_key(owner_id: i64, name: &str) -> String {
    format!("{owner_id}/{name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_table() {
        assert_eq!(optimal_chunk_size(MIB), MIB);
        assert_eq!(optimal_chunk_size(10 * MIB - 1), MIB);
        assert_eq!(optimal_chunk_size(10 * MIB), 5 * MIB);
        assert_eq!(optimal_chunk_size(100 * MIB), 10 * MIB);
        assert_eq!(optimal_chunk_size(GIB), 20 * MIB);
        assert_eq!(optimal_chunk_size(0), 5 * MIB);
    }

    #[test]
    fn test_concurrency_table() {
        assert_eq!(recommended_concurrency(MIB), 2);
        assert_eq!(recommended_concurrency(50 * MIB), 4);
        assert_eq!(recommended_concurrency(500 * MIB), 6);
        assert_eq!(recommended_concurrency(2 * GIB), 8);
    }

    #[test]
    fn test_plan_rounds_up() {
        // 30 MiB at 5 MiB chunks -> exactly 6
        let plan = UploadPlan::for_size(30 * MIB).unwrap();
        assert_eq!(plan.chunk_size, 5 * MIB);
        assert_eq!(plan.total_chunks, 6);
        assert_eq!(plan.concurrency, 4);

        // one extra byte needs one extra chunk
        let plan = UploadPlan::for_size(30 * MIB + 1).unwrap();
        assert_eq!(plan.total_chunks, 7);

        assert!(UploadPlan::for_size(0).is_err());
    }

    #[test]
    fn test_upload_id_round_trip() {
        let id = format_upload_id(7, "deadbeef", 31457280);
        assert_eq!(id, "7_deadbeef_31457280");
        let (owner, hash, size) = parse_upload_id(&id).unwrap();
        assert_eq!(owner, 7);
        assert_eq!(hash, "deadbeef");
        assert_eq!(size, 31457280);
    }

    #[test]
    fn test_parse_upload_id_rejects_garbage() {
        assert!(parse_upload_id("").is_err());
        assert!(parse_upload_id("no-underscores").is_err());
        assert!(parse_upload_id("7_onlyone").is_err());
        assert!(parse_upload_id("x_hash_10").is_err());
        assert!(parse_upload_id("7_hash_x").is_err());
        assert!(parse_upload_id("7__10").is_err());
        assert!(parse_upload_id("7_hash_0").is_err());
    }

    #[test]
    fn test_object_keys() {
        assert_eq!(chunk_key(9, "9_h_10", 3), "9/chunks/9_h_10/3");
        assert_eq!(chunk_prefix(9, "9_h_10"), "9/chunks/9_h_10/");
        assert_eq!(object_key(9, "a.bin"), "9/a.bin");
    }
}
