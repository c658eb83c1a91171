use async_trait::async_trait;
use skystore_api_client::{ApiClient, ApiError};
use skystore_core::models::{AssetCreationRequest, AssetCreationResult, StoredObject};
use skystore_core::{ErrorMetadata, ScanConfig};
use std::sync::Arc;

use crate::retry::RetryPolicy;

/// Anything that can turn an existing stored object into an asset.
#[async_trait]
pub trait AssetRegistry: Send + Sync {
    /// Create the asset and return its uuid.
    async fn create_from_existing(&self, request: &AssetCreationRequest)
        -> Result<String, ApiError>;
}

#[async_trait]
impl AssetRegistry for ApiClient {
    async fn create_from_existing(
        &self,
        request: &AssetCreationRequest,
    ) -> Result<String, ApiError> {
        self.create_asset_from_existing(request).await
    }
}

/// Registers one dropbox object as an asset. Never fails: every outcome, including a
/// malformed key, becomes an [`AssetCreationResult`].
pub struct AssetRegistrar {
    registry: Arc<dyn AssetRegistry>,
    dropbox_prefix: String,
    flight_uuid: Option<String>,
    retry: RetryPolicy,
}

impl AssetRegistrar {
    pub fn new(registry: Arc<dyn AssetRegistry>, config: &ScanConfig, retry: RetryPolicy) -> Self {
        Self {
            registry,
            dropbox_prefix: config.dropbox_prefix.clone(),
            flight_uuid: config.flight_uuid.clone(),
            retry,
        }
    }

    #[tracing::instrument(skip(self, object), fields(key = %object.key, size_bytes = object.size))]
    pub async fn register(&self, object: &StoredObject) -> AssetCreationResult {
        let request = match AssetCreationRequest::from_object(
            object,
            &self.dropbox_prefix,
            self.flight_uuid.as_deref(),
        ) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    error_code = e.error_code(),
                    "Malformed dropbox key, not registering"
                );
                return AssetCreationResult::failed(&object.key, e.to_string());
            }
        };

        let result = self
            .retry
            .run("create_asset_from_existing", || {
                self.registry.create_from_existing(&request)
            })
            .await;

        match result {
            Ok(asset_uuid) => {
                tracing::info!(
                    owner_uuid = %request.owner_uuid,
                    asset_uuid = %asset_uuid,
                    "Asset created"
                );
                AssetCreationResult::created(&object.key, asset_uuid)
            }
            Err(e) => {
                tracing::warn!(
                    owner_uuid = %request.owner_uuid,
                    error = %e,
                    error_code = e.error_code(),
                    "Asset creation failed"
                );
                AssetCreationResult::failed(&object.key, e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Fails with the queued errors first, then succeeds.
    struct ScriptedRegistry {
        errors: Mutex<Vec<ApiError>>,
        requests: Mutex<Vec<AssetCreationRequest>>,
    }

    impl ScriptedRegistry {
        fn new(errors: Vec<ApiError>) -> Self {
            Self {
                errors: Mutex::new(errors),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AssetRegistry for ScriptedRegistry {
        async fn create_from_existing(
            &self,
            request: &AssetCreationRequest,
        ) -> Result<String, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            match self.errors.lock().unwrap().pop() {
                Some(e) => Err(e),
                None => Ok(format!("asset-for-{}", request.file_name)),
            }
        }
    }

    fn scan_config() -> ScanConfig {
        ScanConfig {
            dropbox_prefix: "dropbox/".to_string(),
            concurrency: 4,
            flight_uuid: Some("flight-1".to_string()),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(1))
    }

    fn object(key: &str) -> StoredObject {
        StoredObject::new(key, 10, Utc::now())
    }

    #[tokio::test]
    async fn test_register_builds_request_from_key() {
        let registry = Arc::new(ScriptedRegistry::new(vec![]));
        let registrar = AssetRegistrar::new(registry.clone(), &scan_config(), fast_retry());

        let result = registrar.register(&object("dropbox/u123/photo.jpg")).await;

        assert!(result.is_success());
        assert_eq!(result.asset_uuid(), Some("asset-for-photo.jpg"));
        let requests = registry.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].owner_uuid, "u123");
        assert_eq!(requests[0].uploader_uuid, "u123");
        assert_eq!(requests[0].file_type, "image/jpeg");
        assert_eq!(requests[0].flight_uuid.as_deref(), Some("flight-1"));
    }

    #[tokio::test]
    async fn test_malformed_key_fails_without_calling_api() {
        let registry = Arc::new(ScriptedRegistry::new(vec![]));
        let registrar = AssetRegistrar::new(registry.clone(), &scan_config(), fast_retry());

        let result = registrar.register(&object("dropbox/bad")).await;

        assert!(!result.is_success());
        assert!(result.error().unwrap().contains("dropbox/bad"));
        assert!(registry.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transient_errors_are_retried() {
        let registry = Arc::new(ScriptedRegistry::new(vec![
            ApiError::Status {
                status: 503,
                body: "busy".to_string(),
            },
            ApiError::Timeout(Duration::from_secs(30)),
        ]));
        let registrar = AssetRegistrar::new(registry.clone(), &scan_config(), fast_retry());

        let result = registrar.register(&object("dropbox/u1/a.png")).await;

        assert!(result.is_success());
        assert_eq!(registry.requests.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let registry = Arc::new(ScriptedRegistry::new(vec![ApiError::Status {
            status: 422,
            body: "unknown owner".to_string(),
        }]));
        let registrar = AssetRegistrar::new(registry.clone(), &scan_config(), fast_retry());

        let result = registrar.register(&object("dropbox/u1/a.png")).await;

        assert_eq!(
            result.error(),
            Some("API request failed with status 422: unknown owner")
        );
        assert_eq!(registry.requests.lock().unwrap().len(), 1);
    }
}
