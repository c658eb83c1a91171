use crate::keys::is_safe_key;
use crate::traits::{ObjectStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream;
use skystore_core::constants::KEY_SEPARATOR;
use skystore_core::models::StoredObject;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// The bucket is a directory; keys map onto paths below it.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    bucket: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Directory acting as the bucket root (e.g., "/var/lib/skystore/skystore")
    /// * `bucket` - Bucket name reported to callers
    pub async fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            bucket: bucket.into(),
        })
    }

    /// Convert storage key to filesystem path, rejecting keys that would escape the
    /// base directory.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        if !is_safe_key(storage_key) {
            return Err(StorageError::InvalidKey(format!(
                "Storage key '{}' contains invalid segments",
                storage_key
            )));
        }

        Ok(self.base_path.join(storage_key))
    }

    fn generate_url(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

/// Depth-first walk over the directories below a listing root.
struct Walk {
    base_path: PathBuf,
    prefix: String,
    pending_dirs: Vec<PathBuf>,
    current: Option<fs::ReadDir>,
}

impl Walk {
    fn new(base_path: PathBuf, prefix: &str) -> Self {
        // Start at the deepest directory fully named by the prefix; the remaining
        // partial segment is matched against keys.
        let dir_part = match prefix.rfind(KEY_SEPARATOR) {
            Some(idx) => &prefix[..idx],
            None => "",
        };
        let start = if dir_part.is_empty() || !is_safe_key(dir_part) {
            base_path.clone()
        } else {
            base_path.join(dir_part)
        };

        Self {
            base_path,
            prefix: prefix.to_string(),
            pending_dirs: vec![start],
            current: None,
        }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        Some(segments.join(&KEY_SEPARATOR.to_string()))
    }

    async fn next_object(&mut self) -> Option<StorageResult<StoredObject>> {
        loop {
            if self.current.is_none() {
                let dir = self.pending_dirs.pop()?;
                match fs::read_dir(&dir).await {
                    Ok(read_dir) => self.current = Some(read_dir),
                    Err(e) if e.kind() == ErrorKind::NotFound => continue,
                    Err(e) => {
                        return Some(Err(StorageError::ListFailed(format!(
                            "Failed to read {}: {}",
                            dir.display(),
                            e
                        ))))
                    }
                }
            }

            let read_dir = self.current.as_mut()?;
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.current = None;
                    continue;
                }
                Err(e) => {
                    self.current = None;
                    return Some(Err(StorageError::ListFailed(e.to_string())));
                }
            };

            let path = entry.path();
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(e) => return Some(Err(StorageError::ListFailed(e.to_string()))),
            };

            if metadata.is_dir() {
                self.pending_dirs.push(path);
                continue;
            }

            let Some(key) = self.key_for(&path) else {
                continue;
            };
            if !key.starts_with(&self.prefix) {
                continue;
            }

            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            return Some(Ok(StoredObject::new(key, metadata.len(), last_modified)));
        }
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn check_connection(&self) -> StorageResult<()> {
        match fs::metadata(&self.base_path).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            Ok(_) => Err(StorageError::ConnectionFailed(format!(
                "{} is not a directory",
                self.base_path.display()
            ))),
            Err(e) => Err(StorageError::ConnectionFailed(format!(
                "{}: {}",
                self.base_path.display(),
                e
            ))),
        }
    }

    fn list(&self, prefix: &str) -> ObjectStream {
        let walk = Walk::new(self.base_path.clone(), prefix);

        Box::pin(stream::unfold(walk, |mut walk| async move {
            let item = walk.next_object().await?;
            Some((item, walk))
        }))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                StorageError::NotFound(storage_key.to_string())
            } else {
                StorageError::DownloadFailed(format!(
                    "Failed to read file {}: {}",
                    path.display(),
                    e
                ))
            }
        })?;

        tracing::debug!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage download successful"
        );

        Ok(data)
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let size = data.len();

        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(&data).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(Self::generate_url(&path))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(storage_key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let path = self.key_to_path(storage_key)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(key = %storage_key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    async fn storage() -> (TempDir, LocalStorage) {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path().join("skystore"), "skystore")
            .await
            .unwrap();
        (dir, storage)
    }

    async fn keys_under(storage: &LocalStorage, prefix: &str) -> Vec<String> {
        let mut keys: Vec<String> = storage
            .list(prefix)
            .map_ok(|object| object.key)
            .try_collect()
            .await
            .unwrap();
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_upload_download_roundtrip() {
        let (_dir, storage) = storage().await;

        storage
            .upload_with_key("dropbox/u1/a.jpg", b"jpeg".to_vec(), "image/jpeg")
            .await
            .unwrap();

        assert!(storage.exists("dropbox/u1/a.jpg").await.unwrap());
        assert_eq!(storage.download("dropbox/u1/a.jpg").await.unwrap(), b"jpeg");
        assert_eq!(storage.bucket(), "skystore");
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_list_is_recursive_and_prefix_bound() {
        let (_dir, storage) = storage().await;
        for key in [
            "dropbox/.keep",
            "dropbox/u1/a.jpg",
            "dropbox/u2/nested/b.png",
            "dropboxes/u3/c.jpg",
            "test_images/d.jpg",
        ] {
            storage
                .upload_with_key(key, vec![1, 2, 3], "application/octet-stream")
                .await
                .unwrap();
        }

        assert_eq!(
            keys_under(&storage, "dropbox/").await,
            vec!["dropbox/.keep", "dropbox/u1/a.jpg", "dropbox/u2/nested/b.png"]
        );
        assert_eq!(keys_under(&storage, "").await.len(), 5);
    }

    #[tokio::test]
    async fn test_list_reports_sizes() {
        let (_dir, storage) = storage().await;
        storage
            .upload_with_key("dropbox/u1/a.jpg", vec![0; 42], "image/jpeg")
            .await
            .unwrap();

        let objects: Vec<StoredObject> = storage.list("dropbox/").try_collect().await.unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].size, 42);
        assert_eq!(objects[0].file_name(), "a.jpg");
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let (_dir, storage) = storage().await;
        assert!(keys_under(&storage, "dropbox/").await.is_empty());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let (_dir, storage) = storage().await;
        let err = storage.download("dropbox/u1/missing.jpg").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let (_dir, storage) = storage().await;
        let err = storage
            .upload_with_key("../escape.txt", vec![], "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, storage) = storage().await;
        storage
            .upload_with_key("dropbox/u1/a.jpg", vec![1], "image/jpeg")
            .await
            .unwrap();
        storage.delete("dropbox/u1/a.jpg").await.unwrap();
        storage.delete("dropbox/u1/a.jpg").await.unwrap();
        assert!(!storage.exists("dropbox/u1/a.jpg").await.unwrap());
    }

    #[tokio::test]
    async fn test_download_to_path_and_upload_file() {
        let (dir, storage) = storage().await;
        storage
            .upload_with_key("test_images/a.png", b"png".to_vec(), "image/png")
            .await
            .unwrap();

        let local = dir.path().join("work/0000_a.png");
        let size = storage
            .download_to_path("test_images/a.png", &local)
            .await
            .unwrap();
        assert_eq!(size, 3);

        storage.upload_file(&local, "copies/a.png").await.unwrap();
        assert_eq!(storage.download("copies/a.png").await.unwrap(), b"png");
    }

    #[tokio::test]
    async fn test_check_connection() {
        let (dir, storage) = storage().await;
        assert!(storage.check_connection().await.is_ok());

        std::fs::remove_dir_all(dir.path().join("skystore")).unwrap();
        let err = storage.check_connection().await.unwrap_err();
        assert!(matches!(err, StorageError::ConnectionFailed(_)));
    }
}
