//! Reconstruction model served over HTTP by a sidecar colocated with the worker.
//!
//! `GET {base}/health` answers 2xx once the weights are loaded.
//! `POST {base}/predict` takes `{"image_paths": [...]}` (paths on the shared local
//! filesystem) and answers `{"tensors": {name: {"shape": [...], "data": [...]}}}` with
//! row-major `f32` data.

use async_trait::async_trait;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use skystore_core::ReconstructionConfig;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::time::Duration;

use super::model::{ModelError, ReconstructionModel, ScenePredictions};

const HEALTH_TIMEOUT_SECS: u64 = 10;

pub struct HttpReconstructionModel {
    http_client: reqwest::Client,
    base_url: String,
}

impl Debug for HttpReconstructionModel {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("HttpReconstructionModel")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    image_paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WireTensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    tensors: HashMap<String, WireTensor>,
}

impl PredictResponse {
    fn take(&mut self, name: &str) -> Result<ArrayD<f32>, ModelError> {
        let tensor = self
            .tensors
            .remove(name)
            .ok_or_else(|| ModelError::InvalidOutput(format!("missing tensor '{}'", name)))?;
        ArrayD::from_shape_vec(IxDyn(&tensor.shape), tensor.data).map_err(|e| {
            ModelError::InvalidOutput(format!("tensor '{}' has inconsistent data: {}", name, e))
        })
    }

    fn into_predictions(mut self) -> Result<ScenePredictions, ModelError> {
        Ok(ScenePredictions {
            extrinsic: self.take("extrinsic")?,
            intrinsic: self.take("intrinsic")?,
            depth_map: self.take("depth_map")?,
            depth_conf: self.take("depth_conf")?,
            point_map: self.take("point_map")?,
            point_conf: self.take("point_conf")?,
        })
    }
}

impl HttpReconstructionModel {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ModelError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Unavailable(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ReconstructionConfig) -> Result<Self, ModelError> {
        let base_url = config
            .model_url
            .as_deref()
            .ok_or_else(|| ModelError::Unavailable("VGGT_MODEL_URL is not set".to_string()))?;
        Self::new(base_url, Duration::from_secs(config.timeout_secs))
    }
}

#[async_trait]
impl ReconstructionModel for HttpReconstructionModel {
    fn name(&self) -> &str {
        "vggt-http"
    }

    async fn ensure_available(&self) -> Result<(), ModelError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(HEALTH_TIMEOUT_SECS))
            .send()
            .await
            .map_err(|e| ModelError::Unavailable(format!("{}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(ModelError::Unavailable(format!(
                "health check returned {}",
                response.status()
            )));
        }

        tracing::debug!(model_url = %self.base_url, "Reconstruction model is available");
        Ok(())
    }

    async fn predict(&self, image_paths: &[PathBuf]) -> Result<ScenePredictions, ModelError> {
        let start = std::time::Instant::now();
        let request = PredictRequest {
            image_paths: image_paths
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect(),
        };

        let response = self
            .http_client
            .post(format!("{}/predict", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::Inference(format!(
                "predict returned {}: {}",
                status, error_text
            )));
        }

        let body: PredictResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidOutput(e.to_string()))?;

        tracing::info!(
            images = image_paths.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Reconstruction model inference completed"
        );

        body.into_predictions()
    }
}
