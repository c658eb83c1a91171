use crate::traits::{ObjectStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::list::{PaginatedListOptions, PaginatedListStore};
use object_store::path::{Error as PathError, Path, DELIMITER};
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutPayload, Result as ObjectResult};
use skystore_core::models::StoredObject;
use skystore_core::StorageConfig;
use std::borrow::Cow;
use std::collections::VecDeque;

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Credentials come from the config when present and otherwise from the usual
    /// `AWS_*` environment variables. A custom endpoint (e.g. "http://localhost:9000"
    /// for MinIO) switches to path-style requests and allows plain http when the
    /// endpoint uses it.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone());

        if let Some(ref access_key_id) = config.access_key_id {
            builder = builder.with_access_key_id(access_key_id.clone());
        }
        if let Some(ref secret_access_key) = config.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key.clone());
        }

        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_virtual_hosted_style_request(false)
                .with_allow_http(allow_http);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint.clone(),
        })
    }

    /// Generate public URL for S3 object
    ///
    /// For AWS S3, uses the standard format: https://{bucket}.s3.{region}.amazonaws.com/{key}
    /// For S3-compatible providers, uses path-style: {endpoint}/{bucket}/{key}
    fn generate_url(&self, key: &str) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            let base_url = endpoint.trim_end_matches('/');
            format!("{}/{}/{}", base_url, self.bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, key
            )
        }
    }
}

/// Directory a listing starts from: no leading separator, one trailing separator,
/// empty for the whole bucket. `dropbox/` and `dropbox` list the same objects.
fn listing_dir(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}{}", trimmed, DELIMITER)
    }
}

/// Raw key named by a path parse failure.
fn unparseable_key(error: &PathError) -> Option<String> {
    match error {
        PathError::EmptySegment { path }
        | PathError::BadSegment { path, .. }
        | PathError::NonUnicode { path, .. } => Some(path.clone()),
        _ => None,
    }
}

/// Position inside the listing of one directory.
struct Cursor {
    dir: String,
    page_token: Option<String>,
    start_after: Option<String>,
    /// One key per page, used to isolate a key object_store cannot parse.
    narrow: bool,
}

impl Cursor {
    fn new(dir: String) -> Self {
        Self {
            dir,
            page_token: None,
            start_after: None,
            narrow: false,
        }
    }

    fn options(&self) -> PaginatedListOptions {
        PaginatedListOptions {
            delimiter: Some(Cow::Borrowed(DELIMITER)),
            page_token: self.page_token.clone(),
            offset: match self.page_token {
                Some(_) => None,
                None => self.start_after.clone(),
            },
            max_keys: self.narrow.then_some(1),
            ..Default::default()
        }
    }

    /// Continue after `key`. A common prefix is skipped with everything below it.
    fn skip(&mut self, key: &str) {
        self.start_after = Some(if key.ends_with(DELIMITER) {
            format!("{}{}", key, char::MAX)
        } else {
            key.to_string()
        });
        self.page_token = None;
        self.narrow = false;
    }
}

/// Breadth-first walk over the directories below a prefix, one delimited listing per
/// directory.
///
/// Directory markers (`dropbox/u1/`) come back either as a common prefix or as the
/// listed directory itself and never reach the caller. A key object_store cannot parse
/// (`dropbox/u1//a.jpg`) fails its whole page: the directory is then re-read one key at
/// a time, the key is reported as `InvalidKey` and the walk resumes after it.
struct Walk {
    store: AmazonS3,
    bucket: String,
    pending: VecDeque<String>,
    current: Option<Cursor>,
    ready: VecDeque<StorageResult<StoredObject>>,
    failed: bool,
}

impl Walk {
    fn new(store: AmazonS3, bucket: String, dir: String) -> Self {
        Self {
            store,
            bucket,
            pending: VecDeque::from([dir]),
            current: None,
            ready: VecDeque::new(),
            failed: false,
        }
    }

    async fn next(mut self) -> Option<(StorageResult<StoredObject>, Self)> {
        loop {
            if let Some(item) = self.ready.pop_front() {
                return Some((item, self));
            }
            if self.failed {
                return None;
            }
            let cursor = match self.current.take() {
                Some(cursor) => cursor,
                None => Cursor::new(self.pending.pop_front()?),
            };
            self.read_page(cursor).await;
        }
    }

    async fn read_page(&mut self, mut cursor: Cursor) {
        let prefix = (!cursor.dir.is_empty()).then_some(cursor.dir.as_str());
        let result = self.store.list_paginated(prefix, cursor.options()).await;

        match result {
            Ok(page) => {
                let marker = cursor.dir.trim_end_matches(DELIMITER);
                for meta in page.result.objects {
                    if meta.location.as_ref() == marker {
                        continue;
                    }
                    self.ready.push_back(Ok(StoredObject::new(
                        meta.location.to_string(),
                        meta.size,
                        meta.last_modified,
                    )));
                }
                for common_prefix in page.result.common_prefixes {
                    self.pending
                        .push_back(format!("{}{}", common_prefix, DELIMITER));
                }
                if let Some(token) = page.page_token {
                    cursor.page_token = Some(token);
                    self.current = Some(cursor);
                }
            }
            Err(ObjectStoreError::InvalidPath { source }) => match unparseable_key(&source) {
                Some(key) if cursor.narrow => {
                    tracing::warn!(
                        bucket = %self.bucket,
                        key = %key,
                        error = %source,
                        "Skipping object with an unusable key"
                    );
                    self.ready.push_back(Err(StorageError::InvalidKey(key.clone())));
                    cursor.skip(&key);
                    self.current = Some(cursor);
                }
                Some(key) => {
                    tracing::debug!(
                        bucket = %self.bucket,
                        dir = %cursor.dir,
                        key = %key,
                        "Unusable key in page, re-reading one key at a time"
                    );
                    cursor.narrow = true;
                    self.current = Some(cursor);
                }
                None => self.fail(&cursor.dir, source.to_string()),
            },
            Err(e) => self.fail(&cursor.dir, e.to_string()),
        }
    }

    fn fail(&mut self, dir: &str, error: String) {
        tracing::error!(
            error = %error,
            bucket = %self.bucket,
            dir = %dir,
            "S3 listing failed"
        );
        self.ready.push_back(Err(StorageError::ListFailed(error)));
        self.failed = true;
    }
}

#[async_trait]
impl Storage for S3Storage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    async fn check_connection(&self) -> StorageResult<()> {
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self.store.list_with_delimiter(None).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                endpoint = ?self.endpoint_url,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 connectivity check failed"
            );
            StorageError::ConnectionFailed(e.to_string())
        })?;

        tracing::debug!(
            bucket = %self.bucket,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 bucket reachable"
        );

        Ok(())
    }

    fn list(&self, prefix: &str) -> ObjectStream {
        let walk = Walk::new(self.store.clone(), self.bucket.clone(), listing_dir(prefix));
        Box::pin(stream::unfold(walk, Walk::next))
    }

    async fn download(&self, storage_key: &str) -> StorageResult<Vec<u8>> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(storage_key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %storage_key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 download successful"
        );

        Ok(bytes.to_vec())
    }

    async fn upload_with_key(
        &self,
        storage_key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> StorageResult<String> {
        let size = data.len() as u64;
        let location = Path::from(storage_key.to_string());
        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put(&location, PutPayload::from(Bytes::from(data)))
            .await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(self.generate_url(storage_key))
    }

    async fn exists(&self, storage_key: &str) -> StorageResult<bool> {
        let location = Path::from(storage_key.to_string());
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, storage_key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let location = Path::from(storage_key.to_string());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %storage_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 delete failed"
            );
            StorageError::DeleteFailed(e.to_string())
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %storage_key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 delete successful"
        );

        Ok(())
    }
}
