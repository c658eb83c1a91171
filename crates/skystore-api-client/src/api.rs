//! Domain methods for the Asset API client.

use crate::{ApiClient, ApiError};
use serde::{Deserialize, Serialize};
use skystore_core::constants::CREATE_FROM_EXISTING_PATH;
use skystore_core::models::AssetCreationRequest;

/// Envelope returned by the Asset API: `{"data": {...}}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: Option<T>,
}

/// The part of a created asset the workstreams care about.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedAsset {
    pub uuid: Option<String>,
}

impl ApiClient {
    /// Register an object that already exists in storage as an asset.
    ///
    /// Returns the new asset's uuid. A 2xx response without `data.uuid` is an error.
    pub async fn create_asset_from_existing(
        &self,
        request: &AssetCreationRequest,
    ) -> Result<String, ApiError> {
        let start = std::time::Instant::now();
        let response: serde_json::Value = self
            .post_json(CREATE_FROM_EXISTING_PATH, request)
            .await?;

        let uuid = serde_json::from_value::<DataEnvelope<CreatedAsset>>(response.clone())
            .ok()
            .and_then(|envelope| envelope.data)
            .and_then(|asset| asset.uuid)
            .filter(|uuid| !uuid.is_empty())
            .ok_or_else(|| ApiError::MissingAssetId(response.to_string()))?;

        tracing::debug!(
            stored_path = %request.stored_path,
            asset_uuid = %uuid,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Asset created from existing object"
        );

        Ok(uuid)
    }
}
