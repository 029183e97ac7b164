//! Storage abstraction trait
//!
//! All storage backends must implement this trait so the pipeline and the
//! surrounding intake layer can work against any backend without coupling to
//! implementation details.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use vidstream_core::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage abstraction trait.
///
/// **Key format:** keys are tenant-scoped `videos/{tenant_id}/{filename}`;
/// see the crate root documentation.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Upload a file and return (storage_key, storage_url).
    async fn upload(
        &self,
        tenant_id: Uuid,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StorageResult<(String, String)>;

    /// Download a file by its storage key.
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Delete a file by its storage key.
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Generate a time-limited URL for direct read access.
    ///
    /// This is how the pipeline's media tools reach the raw bytes without the
    /// pipeline holding storage credentials.
    async fn get_presigned_url(
        &self,
        storage_key: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Check if a file exists.
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Get the size in bytes of an object, if it exists.
    async fn content_length(&self, storage_key: &str) -> StorageResult<u64>;

    /// Get the storage backend type.
    fn backend_type(&self) -> StorageBackend;
}
