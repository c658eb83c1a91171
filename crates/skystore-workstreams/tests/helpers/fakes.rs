//! Fake Asset API, storage and reconstruction model.

use async_trait::async_trait;
use futures::stream;
use ndarray::{Array2, Array3, ArrayD, Axis, IxDyn};
use skystore_api_client::ApiError;
use skystore_core::models::AssetCreationRequest;
use skystore_storage::{ObjectStream, Storage, StorageBackend, StorageError, StorageResult};
use skystore_workstreams::{AssetRegistry, ModelError, ReconstructionModel, ScenePredictions};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-memory Asset API. Files are matched by file name.
#[derive(Default)]
pub struct FakeRegistry {
    pub requests: Mutex<Vec<AssetCreationRequest>>,
    failing: HashSet<String>,
    slow: HashSet<String>,
    panicking: HashSet<String>,
    delay: Duration,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer 500 for these files.
    pub fn failing(mut self, names: &[&str]) -> Self {
        self.failing = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Never answer (in test time) for these files.
    pub fn slow(mut self, names: &[&str]) -> Self {
        self.slow = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn panicking(mut self, names: &[&str]) -> Self {
        self.panicking = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Latency of every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn calls_for(&self, file_name: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.file_name == file_name)
            .count()
    }
}

#[async_trait]
impl AssetRegistry for FakeRegistry {
    async fn create_from_existing(
        &self,
        request: &AssetCreationRequest,
    ) -> Result<String, ApiError> {
        self.requests.lock().unwrap().push(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.slow.contains(&request.file_name) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        } else if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panicking.contains(&request.file_name) {
            panic!("registry exploded on {}", request.file_name);
        }
        if self.failing.contains(&request.file_name) {
            return Err(ApiError::Status {
                status: 500,
                body: format!("cannot register {}", request.file_name),
            });
        }

        Ok(format!("asset-{}", request.file_name))
    }
}

/// Storage whose connectivity check or listing fails.
pub struct BrokenStorage {
    pub unreachable: bool,
}

#[async_trait]
impl Storage for BrokenStorage {
    fn bucket(&self) -> &str {
        "broken"
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }

    async fn check_connection(&self) -> StorageResult<()> {
        if self.unreachable {
            Err(StorageError::ConnectionFailed("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn list(&self, _prefix: &str) -> ObjectStream {
        Box::pin(stream::iter(vec![Err(StorageError::ListFailed(
            "AccessDenied".to_string(),
        ))]))
    }

    async fn download(&self, key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn upload_with_key(&self, _key: &str, _data: Vec<u8>, _ct: &str) -> StorageResult<String> {
        Err(StorageError::UploadFailed("read-only".to_string()))
    }

    async fn exists(&self, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn delete(&self, _key: &str) -> StorageResult<()> {
        Ok(())
    }
}

/// Reconstruction model producing a deterministic scene of `H x W` frames.
///
/// Cameras are identity poses with `fx = fy = 1` and the principal point at the origin,
/// every depth is 2, the point head predicts 7 everywhere.
pub struct FakeModel {
    available: bool,
    height: usize,
    width: usize,
    batched: bool,
    pub seen_paths: Mutex<Vec<PathBuf>>,
    pub inputs_existed: Mutex<bool>,
}

impl FakeModel {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            available: true,
            height,
            width,
            batched: true,
            seen_paths: Mutex::new(Vec::new()),
            inputs_existed: Mutex::new(false),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(1, 1)
        }
    }

    fn tensor(&self, dims: &[usize], value: f32) -> ArrayD<f32> {
        let mut shape = Vec::new();
        if self.batched {
            shape.push(1);
        }
        shape.extend_from_slice(dims);
        ArrayD::from_elem(IxDyn(&shape), value)
    }

    fn cameras(&self, frames: usize, matrix: Array2<f32>) -> ArrayD<f32> {
        let (rows, cols) = matrix.dim();
        let stacked = Array3::from_shape_fn((frames, rows, cols), |(_, i, j)| matrix[[i, j]]);
        if self.batched {
            stacked.insert_axis(Axis(0)).into_dyn()
        } else {
            stacked.into_dyn()
        }
    }
}

#[async_trait]
impl ReconstructionModel for FakeModel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn ensure_available(&self) -> Result<(), ModelError> {
        if self.available {
            Ok(())
        } else {
            Err(ModelError::Unavailable("weights not loaded".to_string()))
        }
    }

    async fn predict(&self, image_paths: &[PathBuf]) -> Result<ScenePredictions, ModelError> {
        *self.seen_paths.lock().unwrap() = image_paths.to_vec();
        *self.inputs_existed.lock().unwrap() = image_paths.iter().all(|p| p.is_file());

        let (s, h, w) = (image_paths.len(), self.height, self.width);
        let extrinsic = Array2::from_shape_vec(
            (3, 4),
            vec![1., 0., 0., 0., 0., 1., 0., 0., 0., 0., 1., 0.],
        )
        .map_err(|e| ModelError::Inference(e.to_string()))?;
        let intrinsic = Array2::from_shape_vec((3, 3), vec![1., 0., 0., 0., 1., 0., 0., 0., 1.])
            .map_err(|e| ModelError::Inference(e.to_string()))?;

        Ok(ScenePredictions {
            extrinsic: self.cameras(s, extrinsic),
            intrinsic: self.cameras(s, intrinsic),
            depth_map: self.tensor(&[s, h, w, 1], 2.0),
            depth_conf: self.tensor(&[s, h, w], 0.5),
            point_map: self.tensor(&[s, h, w, 3], 7.0),
            point_conf: self.tensor(&[s, h, w], 0.9),
        })
    }
}
