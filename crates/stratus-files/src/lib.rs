//! Stratus Files - Upload/download use cases
//!
//! The services in this crate orchestrate the data plane through the core
//! ports:
//! - [`NamespaceService`] - path-indexed CRUD, move/copy, dedup-aware delete
//! - [`UploadService`] - instant-upload pre-check, chunked upload init and
//!   completion with server-side compose
//! - [`DownloadService`] - presigned single-file links, multi-file ZIP
//!   assembly, range-capable rate-limited streaming

pub mod content_type;
pub mod download;
pub mod models;
pub mod namespace;
pub mod range;
pub mod upload;

pub use download::{DownloadOutcome, DownloadService, StreamOutcome, StreamPlan};
pub use namespace::NamespaceService;
pub use upload::UploadService;
