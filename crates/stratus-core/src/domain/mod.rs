//! Domain types for the storage namespace and transfer planning.

pub mod entity;
pub mod errors;
pub mod path;
pub mod plan;
pub mod tier;

pub use entity::{FileRecord, FileStatus, NewFileRecord};
pub use errors::CoreError;
pub use path::VirtualPath;
pub use plan::UploadPlan;
pub use tier::Tier;
