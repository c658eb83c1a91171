//! Configuration module
//!
//! Every component receives its slice of [`WorkstreamConfig`] at construction time;
//! nothing reads the environment after startup. `from_env` loads `.env` (if present)
//! and delegates to `from_lookup`, which takes an arbitrary key lookup so the parsing
//! rules can be exercised without mutating the process environment.

use std::env;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::time::Duration;

use crate::constants::{DEFAULT_BUCKET, DEFAULT_DROPBOX_PREFIX};
use crate::error::CoreError;
use crate::storage_types::StorageBackend;

// Common constants
const DEFAULT_S3_ENDPOINT: &str = "http://localhost:9000";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_API_URL: &str = "http://localhost:4151";
const API_TIMEOUT_SECS: u64 = 30;
const SCAN_CONCURRENCY: usize = 16;
const RETRY_MAX_ATTEMPTS: u32 = 3;
const RETRY_INITIAL_BACKOFF_MS: u64 = 1_000;
const RETRY_MAX_BACKOFF_MS: u64 = 30_000;
const VGGT_TIMEOUT_SECS: u64 = 900;

/// Object storage connection settings
#[derive(Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO)
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub local_storage_path: Option<String>,
}

impl Debug for StorageConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("local_storage_path", &self.local_storage_path)
            .finish()
    }
}

/// Asset API settings
#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub token: String,
    pub timeout_secs: u64,
}

impl Debug for ApiConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The scan pipeline cannot authenticate without a token.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.token.trim().is_empty() {
            return Err(CoreError::Config(
                "SKYSTORE_API_TOKEN must be set to create assets".to_string(),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CoreError::Config(format!(
                "SKYSTORE_API_URL must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        Ok(())
    }
}

/// Dropbox scan settings
#[derive(Clone, Debug)]
pub struct ScanConfig {
    pub dropbox_prefix: String,
    pub concurrency: usize,
    /// Collection every created asset is attached to, if any
    pub flight_uuid: Option<String>,
}

/// Retry policy settings for per-item work
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryConfig {
    /// Total attempts per item; 1 disables retries
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RETRY_MAX_ATTEMPTS,
            initial_backoff_ms: RETRY_INITIAL_BACKOFF_MS,
            max_backoff_ms: RETRY_MAX_BACKOFF_MS,
        }
    }
}

/// Reconstruction model settings
#[derive(Clone, Debug)]
pub struct ReconstructionConfig {
    /// Base URL of the model sidecar; the pipeline refuses to start without it
    pub model_url: Option<String>,
    pub timeout_secs: u64,
    pub use_point_map: bool,
}

/// Application configuration for every workstream.
#[derive(Clone, Debug)]
pub struct WorkstreamConfig {
    pub storage: StorageConfig,
    pub api: ApiConfig,
    pub scan: ScanConfig,
    pub retry: RetryConfig,
    pub reconstruction: ReconstructionConfig,
}

impl WorkstreamConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup("STORAGE_BACKEND") {
            Some(value) => value.parse::<StorageBackend>()?,
            None => StorageBackend::S3,
        };

        let storage = StorageConfig {
            backend,
            bucket: lookup("S3_BUCKET").unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            region: lookup("S3_REGION")
                .or_else(|| lookup("AWS_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint: Some(
                lookup("S3_ENDPOINT").unwrap_or_else(|| DEFAULT_S3_ENDPOINT.to_string()),
            )
            .filter(|endpoint| !endpoint.trim().is_empty()),
            access_key_id: lookup("AWS_ACCESS_KEY_ID"),
            secret_access_key: lookup("AWS_SECRET_ACCESS_KEY"),
            local_storage_path: lookup("LOCAL_STORAGE_PATH"),
        };

        let api = ApiConfig {
            base_url: lookup("SKYSTORE_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            token: lookup("SKYSTORE_API_TOKEN").unwrap_or_default(),
            timeout_secs: parse_or(&lookup, "API_TIMEOUT_SECS", API_TIMEOUT_SECS),
        };

        let mut dropbox_prefix =
            lookup("DROPBOX_PREFIX").unwrap_or_else(|| DEFAULT_DROPBOX_PREFIX.to_string());
        if !dropbox_prefix.ends_with('/') {
            dropbox_prefix.push('/');
        }

        let scan = ScanConfig {
            dropbox_prefix,
            concurrency: parse_or(&lookup, "SCAN_CONCURRENCY", SCAN_CONCURRENCY),
            flight_uuid: lookup("SCAN_FLIGHT_UUID").filter(|v| !v.trim().is_empty()),
        };

        let retry = RetryConfig {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", RETRY_MAX_ATTEMPTS),
            initial_backoff_ms: parse_or(
                &lookup,
                "RETRY_INITIAL_BACKOFF_MS",
                RETRY_INITIAL_BACKOFF_MS,
            ),
            max_backoff_ms: parse_or(&lookup, "RETRY_MAX_BACKOFF_MS", RETRY_MAX_BACKOFF_MS),
        };

        let reconstruction = ReconstructionConfig {
            model_url: lookup("VGGT_MODEL_URL")
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim_end_matches('/').to_string()),
            timeout_secs: parse_or(&lookup, "VGGT_TIMEOUT_SECS", VGGT_TIMEOUT_SECS),
            use_point_map: lookup("VGGT_USE_POINT_MAP")
                .unwrap_or_else(|| "false".to_string())
                .to_lowercase()
                .parse()
                .unwrap_or(false),
        };

        Ok(WorkstreamConfig {
            storage,
            api,
            scan,
            retry,
            reconstruction,
        })
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.storage.bucket.trim().is_empty() {
            return Err(CoreError::Config("S3_BUCKET must not be empty".to_string()));
        }

        if self.storage.backend == StorageBackend::Local
            && self.storage.local_storage_path.is_none()
        {
            return Err(CoreError::Config(
                "LOCAL_STORAGE_PATH must be set when using local storage backend".to_string(),
            ));
        }

        if self.scan.concurrency == 0 {
            return Err(CoreError::Config(
                "SCAN_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(CoreError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(CoreError::Config(
                "RETRY_INITIAL_BACKOFF_MS must not exceed RETRY_MAX_BACKOFF_MS".to_string(),
            ));
        }

        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
