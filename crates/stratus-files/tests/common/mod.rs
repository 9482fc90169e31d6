//! Shared test fixtures: an in-memory object store and service wiring
//! against a real (in-memory SQLite) namespace repository.

// not every test binary touches every helper
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sha2::{Digest, Sha256};

use stratus_core::domain::CoreError;
use stratus_core::ports::{
    ByteRange, ComposeSource, IObjectStore, ObjectEntry, ObjectReader, ObjectStat,
};
use stratus_files::{DownloadService, NamespaceService, UploadService};
use stratus_store::{DatabasePool, SqliteFileRepository};

const FILE_BUCKET: &str = "cloud-file";

#[derive(Clone)]
struct StoredObject {
    data: Vec<u8>,
    etag: String,
}

/// In-memory stand-in for the S3 gateway
#[derive(Default)]
pub struct MockObjectStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    pub presign_put_calls: AtomicUsize,
    /// When set, `stat` answers StorageUnavailable to exercise fallbacks
    pub fail_stat: AtomicBool,
}

pub fn etag_for(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    format!("{digest:x}")[..16].to_string()
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a client-direct PUT.
    pub fn put(&self, key: &str, data: &[u8]) -> String {
        let etag = etag_for(data);
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                data: data.to_vec(),
                etag: etag.clone(),
            },
        );
        etag
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn data_of(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).map(|o| o.data.clone())
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl IObjectStore for MockObjectStore {
    async fn presign_put(&self, key: &str, ttl: Duration) -> Result<String, CoreError> {
        self.presign_put_calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "https://mock-store/{FILE_BUCKET}/{key}?X-Amz-Expires={}",
            ttl.as_secs()
        ))
    }

    async fn presign_get(
        &self,
        key: &str,
        filename: &str,
        ttl: Duration,
    ) -> Result<String, CoreError> {
        Ok(format!(
            "https://mock-store/{FILE_BUCKET}/{key}?filename={filename}&X-Amz-Expires={}",
            ttl.as_secs()
        ))
    }

    async fn compose(&self, sources: &[ComposeSource], dest: &str) -> Result<(), CoreError> {
        let mut objects = self.objects.lock().unwrap();

        // validate every precondition before writing anything
        for source in sources {
            let stored = objects.get(&source.key).ok_or_else(|| {
                CoreError::Integrity(format!("missing part: {}", source.key))
            })?;
            if let Some(ref expected) = source.etag {
                if *expected != stored.etag {
                    return Err(CoreError::Integrity(format!(
                        "etag precondition failed for {}",
                        source.key
                    )));
                }
            }
        }

        let mut data = Vec::new();
        for source in sources {
            data.extend_from_slice(&objects[&source.key].data);
        }
        let etag = etag_for(&data);
        objects.insert(dest.to_string(), StoredObject { data, etag });
        Ok(())
    }

    async fn stat(&self, key: &str) -> Result<ObjectStat, CoreError> {
        if self.fail_stat.load(Ordering::SeqCst) {
            return Err(CoreError::StorageUnavailable("stat disabled".to_string()));
        }
        let objects = self.objects.lock().unwrap();
        let stored = objects
            .get(key)
            .ok_or_else(|| CoreError::NotFound(format!("no object at {key}")))?;
        Ok(ObjectStat {
            size: stored.data.len() as u64,
            etag: stored.etag.clone(),
            content_type: None,
            last_modified: None,
        })
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> Result<ObjectReader, CoreError> {
        let objects = self.objects.lock().unwrap();
        let stored = objects
            .get(key)
            .ok_or_else(|| CoreError::NotFound(format!("no object at {key}")))?;
        let data = match range {
            Some(range) => stored.data[range.start as usize..=range.end as usize].to_vec(),
            None => stored.data.clone(),
        };
        Ok(Box::pin(std::io::Cursor::new(data)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, CoreError> {
        let objects = self.objects.lock().unwrap();
        let mut entries: Vec<ObjectEntry> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, stored)| ObjectEntry {
                key: key.clone(),
                etag: stored.etag.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    async fn delete(&self, key: &str) -> Result<(), CoreError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    fn object_url(&self, key: &str) -> String {
        format!("{FILE_BUCKET}/{key}")
    }

    fn extract_object_key(&self, url: &str) -> String {
        let path = match url.split_once("://") {
            Some((_, rest)) => match rest.find('/') {
                Some(idx) => &rest[idx + 1..],
                None => "",
            },
            None => url,
        };
        let path = path.trim_start_matches('/');
        let path = path.split('?').next().unwrap_or(path);
        match path.split_once('/') {
            Some((first, rest)) if first == FILE_BUCKET => rest.to_string(),
            _ => path.to_string(),
        }
    }
}

/// Everything a flow test needs, wired against one repository and one store
pub struct TestHarness {
    pub store: Arc<MockObjectStore>,
    pub repo: Arc<SqliteFileRepository>,
    pub namespace: NamespaceService,
    pub upload: UploadService,
    pub download: DownloadService,
}

pub async fn harness() -> TestHarness {
    let pool = DatabasePool::in_memory()
        .await
        .expect("failed to create in-memory database");
    let repo = Arc::new(SqliteFileRepository::new(&pool));
    let store = Arc::new(MockObjectStore::new());

    let namespace = NamespaceService::new(repo.clone(), store.clone());
    let upload = UploadService::new(repo.clone(), store.clone(), Duration::from_secs(3600));
    let download = DownloadService::new(
        repo.clone(),
        store.clone(),
        Duration::from_secs(24 * 3600),
        256 * 1024 * 1024,
        500 * 1024 * 1024,
    );

    TestHarness {
        store,
        repo,
        namespace,
        upload,
        download,
    }
}
