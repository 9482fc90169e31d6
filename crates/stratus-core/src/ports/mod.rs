//! Port traits implemented by adapter crates.

pub mod file_repository;
pub mod object_store;

pub use file_repository::{FilePatch, IFileRepository, NamespaceStats};
pub use object_store::{
    ByteRange, ComposeSource, IObjectStore, ObjectEntry, ObjectReader, ObjectStat,
};
