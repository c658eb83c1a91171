//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use futures::Stream;
use skystore_core::models::{guess_content_type, StoredObject};
use skystore_core::{ErrorMetadata, LogLevel};
use std::path::Path;
use std::pin::Pin;
use thiserror::Error;
use tokio::fs;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Cannot reach storage: {0}")]
    ConnectionFailed(String),

    #[error("Listing failed: {0}")]
    ListFailed(String),

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

impl ErrorMetadata for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            StorageError::ConnectionFailed(_) => "STORAGE_UNREACHABLE",
            StorageError::ListFailed(_) => "STORAGE_LIST_FAILED",
            StorageError::UploadFailed(_) => "STORAGE_UPLOAD_FAILED",
            StorageError::DownloadFailed(_) => "STORAGE_DOWNLOAD_FAILED",
            StorageError::DeleteFailed(_) => "STORAGE_DELETE_FAILED",
            StorageError::NotFound(_) => "STORAGE_NOT_FOUND",
            StorageError::InvalidKey(_) => "STORAGE_INVALID_KEY",
            StorageError::BackendError(_) => "STORAGE_BACKEND_ERROR",
            StorageError::IoError(_) => "STORAGE_IO_ERROR",
            StorageError::ConfigError(_) => "STORAGE_CONFIG_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            StorageError::NotFound(_) | StorageError::InvalidKey(_) | StorageError::ConfigError(_)
        )
    }

    fn log_level(&self) -> LogLevel {
        match self {
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Lazy, finite stream of listed objects. Pagination is handled by the backend.
pub type ObjectStream = Pin<Box<dyn Stream<Item = StorageResult<StoredObject>> + Send>>;

/// Storage abstraction trait
///
/// All storage backends (S3, local filesystem) implement this trait so the pipelines
/// work with any of them without coupling to backend details.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Bucket (or bucket-equivalent root) this backend is bound to
    fn bucket(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Verify the bucket is reachable. Callers treat a failure as fatal.
    async fn check_connection(&self) -> StorageResult<()>;

    /// List every object under `prefix`, lazily.
    ///
    /// Directory markers are not listed. An `InvalidKey` item names one object the
    /// backend cannot address and the listing goes on after it; any other error item
    /// is the last one.
    fn list(&self, prefix: &str) -> ObjectStream;

    /// Download an object into memory
    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>>;

    /// Upload data to a specific storage key. Returns the URL of the stored object.
    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Check if an object exists
    async fn exists(&self, storage_key: &str) -> StorageResult<bool>;

    /// Delete an object by its storage key
    async fn delete(&self, storage_key: &str) -> StorageResult<()>;

    /// Download an object to a local file, creating parent directories.
    async fn download_to_path(&self, storage_key: &str, local_path: &Path) -> StorageResult<u64> {
        let data = self.download(storage_key).await?;
        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let size = data.len() as u64;
        fs::write(local_path, data).await?;
        Ok(size)
    }

    /// Upload a local file under `storage_key`. The content type is guessed from the
    /// file name.
    async fn upload_file(&self, local_path: &Path, storage_key: &str) -> StorageResult<String> {
        let data = fs::read(local_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to read {}: {}",
                local_path.display(),
                e
            ))
        })?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content_type = guess_content_type(&file_name);
        self.upload_with_key(storage_key, data, &content_type).await
    }
}
