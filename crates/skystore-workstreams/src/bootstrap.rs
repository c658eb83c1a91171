//! Bucket preparation for local and test deployments.

use skystore_core::constants::BOOTSTRAP_PREFIXES;
use skystore_storage::keys::{join_key, placeholder_key};
use skystore_storage::Storage;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::error::WorkstreamError;
use crate::retry::RetryPolicy;

/// Attempts made while waiting for the object store to come up.
pub const CONNECT_ATTEMPTS: u32 = 5;
pub const CONNECT_DELAY: Duration = Duration::from_secs(5);

/// Extensions picked up by [`upload_images`], compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "tif", "tiff"];

/// Wait for the bucket, then create a `.keep` placeholder under every working prefix
/// that does not have one. Returns the placeholders created by this call.
pub async fn init_bucket(
    storage: &dyn Storage,
    connect_retry: RetryPolicy,
) -> Result<Vec<String>, WorkstreamError> {
    connect_retry
        .run("check_connection", || storage.check_connection())
        .await?;

    tracing::info!(bucket = %storage.bucket(), "Bucket reachable");

    let mut created = Vec::new();
    for prefix in BOOTSTRAP_PREFIXES {
        let key = placeholder_key(prefix);
        if storage.exists(&key).await? {
            tracing::debug!(key = %key, "Placeholder already present");
            continue;
        }
        storage
            .upload_with_key(&key, Vec::new(), "application/octet-stream")
            .await?;
        tracing::info!(key = %key, "Created placeholder");
        created.push(key);
    }

    Ok(created)
}

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// Upload every image file directly inside `dir` to `{prefix}/{file_name}`, in file
/// name order. Returns the uploaded keys.
pub async fn upload_images(
    storage: &dyn Storage,
    dir: &Path,
    prefix: &str,
) -> Result<Vec<String>, WorkstreamError> {
    let mut entries = fs::read_dir(dir).await?;
    let mut images: Vec<PathBuf> = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_image_file(&path) {
            images.push(path);
        }
    }
    images.sort();

    if images.is_empty() {
        tracing::warn!(dir = %dir.display(), "No images found to upload");
    }

    let mut keys = Vec::with_capacity(images.len());
    for path in images {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            tracing::warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };
        let key = join_key(prefix, name);
        storage.upload_file(&path, &key).await?;
        keys.push(key);
    }

    tracing::info!(
        bucket = %storage.bucket(),
        prefix = %prefix,
        uploaded = keys.len(),
        "Images uploaded"
    );

    Ok(keys)
}
