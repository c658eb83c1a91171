use skystore_core::models::{file_name, ReconstructionJob, ReconstructionReport};
use skystore_storage::Storage;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::model::ReconstructionModel;
use super::tensors::{encode_outputs, tensor_key, NPY_CONTENT_TYPE};
use crate::error::WorkstreamError;

/// Download, infer, upload.
///
/// Inputs are staged in a temporary directory that is removed on every exit path.
pub struct ReconstructionPipeline {
    storage: Arc<dyn Storage>,
    model: Arc<dyn ReconstructionModel>,
}

impl ReconstructionPipeline {
    pub fn new(storage: Arc<dyn Storage>, model: Arc<dyn ReconstructionModel>) -> Self {
        Self { storage, model }
    }

    #[tracing::instrument(
        skip(self, job),
        fields(images = job.image_keys.len(), output_prefix = %job.output_prefix, model = %self.model.name())
    )]
    pub async fn run(&self, job: &ReconstructionJob) -> Result<ReconstructionReport, WorkstreamError> {
        let start = Instant::now();

        if job.image_keys.is_empty() {
            return Err(WorkstreamError::InvalidJob(
                "at least one input image is required".to_string(),
            ));
        }
        if job.output_prefix.trim_matches('/').is_empty() {
            return Err(WorkstreamError::InvalidJob(
                "output prefix must not be empty".to_string(),
            ));
        }

        // Nothing is downloaded unless the model can serve the request.
        self.model.ensure_available().await?;

        let workdir = tempfile::Builder::new()
            .prefix("skystore-reconstruction-")
            .tempdir()?;

        let image_paths = self.download_images(&job.image_keys, workdir.path()).await?;

        let predictions = self.model.predict(&image_paths).await?.squeeze_batch();
        predictions.validate(image_paths.len())?;

        let use_point_map = job.use_point_map;
        let encoded =
            tokio::task::spawn_blocking(move || encode_outputs(predictions, use_point_map))
                .await??;

        let mut outputs = BTreeMap::new();
        for (name, bytes) in encoded {
            let key = tensor_key(&job.output_prefix, name);
            self.storage
                .upload_with_key(&key, bytes, NPY_CONTENT_TYPE)
                .await?;
            outputs.insert(name.to_string(), key);
        }

        workdir.close()?;

        let report = ReconstructionReport {
            bucket: self.storage.bucket().to_string(),
            images_processed: image_paths.len(),
            outputs,
            duration_secs: start.elapsed().as_secs_f64(),
        };

        tracing::info!(
            bucket = %report.bucket,
            images = report.images_processed,
            tensors = report.outputs.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Reconstruction completed"
        );

        Ok(report)
    }

    /// Download every image into `dir`. Local names are prefixed with the image index
    /// so equal basenames from different prefixes do not collide.
    async fn download_images(
        &self,
        keys: &[String],
        dir: &Path,
    ) -> Result<Vec<PathBuf>, WorkstreamError> {
        let mut paths = Vec::with_capacity(keys.len());
        for (index, key) in keys.iter().enumerate() {
            let path = dir.join(format!("{:04}_{}", index, file_name(key)));
            let size = self.storage.download_to_path(key, &path).await?;
            tracing::debug!(key = %key, path = %path.display(), size_bytes = size, "Image downloaded");
            paths.push(path);
        }
        Ok(paths)
    }
}
