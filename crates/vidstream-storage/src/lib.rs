//! Vidstream Storage Library
//!
//! Storage abstraction used by the processing pipeline to reach raw video
//! bytes without owning storage credentials. The pipeline only ever asks for
//! a time-limited presigned read URL; upload/download/delete exist for the
//! surrounding intake and CRUD collaborators.
//!
//! # Storage key format
//!
//! Keys are tenant-scoped: `videos/{tenant_id}/{filename}`. Keys must not
//! contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so all backends stay consistent.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{Storage, StorageError, StorageResult};
pub use vidstream_core::StorageBackend;
