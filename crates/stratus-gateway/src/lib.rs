//! Stratus Gateway - Object store access
//!
//! Implements the `IObjectStore` port against any S3-compatible backend
//! (MinIO in development, S3 proper in production):
//! - Presigned PUT/GET URL issuance for client-direct transfers
//! - Server-side compose of uploaded chunks with per-part ETag preconditions
//! - Stat/get/list/delete primitives used by the download engine and
//!   the reclamation path

pub mod client;
pub mod store;

pub use client::build_client;
pub use store::S3Gateway;
