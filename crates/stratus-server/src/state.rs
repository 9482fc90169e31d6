//! Shared application state

use stratus_files::{DownloadService, NamespaceService, UploadService};

use crate::limit::RequestLimiter;

/// Everything a request handler needs, shared behind one `Arc`
pub struct AppState {
    pub namespace: NamespaceService,
    pub upload: UploadService,
    pub download: DownloadService,
    pub limiter: RequestLimiter,
}
