use async_trait::async_trait;
use ndarray::{ArrayD, Axis};
use skystore_core::{ErrorMetadata, LogLevel};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Reconstruction model unavailable: {0}")]
    Unavailable(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),
}

impl ErrorMetadata for ModelError {
    fn error_code(&self) -> &'static str {
        match self {
            ModelError::Unavailable(_) => "MODEL_UNAVAILABLE",
            ModelError::Inference(_) => "MODEL_INFERENCE_FAILED",
            ModelError::InvalidOutput(_) => "MODEL_INVALID_OUTPUT",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, ModelError::Inference(_))
    }

    fn log_level(&self) -> LogLevel {
        LogLevel::Error
    }
}

/// Raw model outputs for `S` input images of size `H x W`.
///
/// Shapes after [`ScenePredictions::squeeze_batch`]:
/// `extrinsic [S,3,4]`, `intrinsic [S,3,3]`, `depth_map [S,H,W,1]`, `depth_conf [S,H,W]`,
/// `point_map [S,H,W,3]`, `point_conf [S,H,W]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenePredictions {
    pub extrinsic: ArrayD<f32>,
    pub intrinsic: ArrayD<f32>,
    pub depth_map: ArrayD<f32>,
    pub depth_conf: ArrayD<f32>,
    pub point_map: ArrayD<f32>,
    pub point_conf: ArrayD<f32>,
}

/// Rank of each tensor once the batch dimension is gone.
const EXPECTED_RANKS: [(&str, usize); 6] = [
    ("extrinsic", 3),
    ("intrinsic", 3),
    ("depth_map", 4),
    ("depth_conf", 3),
    ("point_map", 4),
    ("point_conf", 3),
];

impl ScenePredictions {
    fn tensors_mut(&mut self) -> [&mut ArrayD<f32>; 6] {
        [
            &mut self.extrinsic,
            &mut self.intrinsic,
            &mut self.depth_map,
            &mut self.depth_conf,
            &mut self.point_map,
            &mut self.point_conf,
        ]
    }

    /// Drop a leading batch dimension of size 1 from every tensor that carries one.
    pub fn squeeze_batch(mut self) -> Self {
        for (tensor, (_, rank)) in self.tensors_mut().into_iter().zip(EXPECTED_RANKS) {
            if tensor.ndim() == rank + 1 && tensor.shape()[0] == 1 {
                *tensor = tensor.index_axis(Axis(0), 0).to_owned();
            }
        }
        self
    }

    /// Check ranks and that every tensor describes the same `S` images of the same size.
    pub fn validate(&self, num_images: usize) -> Result<(), ModelError> {
        let tensors = [
            &self.extrinsic,
            &self.intrinsic,
            &self.depth_map,
            &self.depth_conf,
            &self.point_map,
            &self.point_conf,
        ];
        for (tensor, (name, rank)) in tensors.into_iter().zip(EXPECTED_RANKS) {
            if tensor.ndim() != rank {
                return Err(ModelError::InvalidOutput(format!(
                    "{} has shape {:?}, expected rank {}",
                    name,
                    tensor.shape(),
                    rank
                )));
            }
            if tensor.shape()[0] != num_images {
                return Err(ModelError::InvalidOutput(format!(
                    "{} covers {} images, expected {}",
                    name,
                    tensor.shape()[0],
                    num_images
                )));
            }
        }

        let check = |name: &str, actual: &[usize], expected: &[usize]| {
            if actual == expected {
                Ok(())
            } else {
                Err(ModelError::InvalidOutput(format!(
                    "{} has shape {:?}, expected {:?}",
                    name, actual, expected
                )))
            }
        };

        let s = num_images;
        let (h, w) = (self.depth_map.shape()[1], self.depth_map.shape()[2]);
        check("extrinsic", self.extrinsic.shape(), &[s, 3, 4])?;
        check("intrinsic", self.intrinsic.shape(), &[s, 3, 3])?;
        check("depth_map", self.depth_map.shape(), &[s, h, w, 1])?;
        check("depth_conf", self.depth_conf.shape(), &[s, h, w])?;
        check("point_map", self.point_map.shape(), &[s, h, w, 3])?;
        check("point_conf", self.point_conf.shape(), &[s, h, w])?;
        Ok(())
    }
}

/// A multi-view reconstruction model.
#[async_trait]
pub trait ReconstructionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Fails with [`ModelError::Unavailable`] when the model cannot serve requests.
    /// The pipeline calls this before downloading anything.
    async fn ensure_available(&self) -> Result<(), ModelError>;

    /// Run inference over the images at `image_paths`, in order.
    async fn predict(&self, image_paths: &[PathBuf]) -> Result<ScenePredictions, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn zeros(shape: &[usize]) -> ArrayD<f32> {
        ArrayD::zeros(IxDyn(shape))
    }

    fn predictions(batch: Option<usize>, s: usize, h: usize, w: usize) -> ScenePredictions {
        let shape = |dims: &[usize]| {
            let mut full = Vec::new();
            full.extend(batch);
            full.extend_from_slice(dims);
            zeros(&full)
        };
        ScenePredictions {
            extrinsic: shape(&[s, 3, 4]),
            intrinsic: shape(&[s, 3, 3]),
            depth_map: shape(&[s, h, w, 1]),
            depth_conf: shape(&[s, h, w]),
            point_map: shape(&[s, h, w, 3]),
            point_conf: shape(&[s, h, w]),
        }
    }

    #[test]
    fn test_squeeze_batch_drops_leading_one() {
        let squeezed = predictions(Some(1), 2, 4, 5).squeeze_batch();
        assert_eq!(squeezed.extrinsic.shape(), &[2, 3, 4]);
        assert_eq!(squeezed.depth_map.shape(), &[2, 4, 5, 1]);
        assert_eq!(squeezed.point_conf.shape(), &[2, 4, 5]);
        assert!(squeezed.validate(2).is_ok());
    }

    #[test]
    fn test_squeeze_batch_keeps_unbatched_tensors() {
        let predictions = predictions(None, 1, 4, 5);
        assert_eq!(predictions.clone().squeeze_batch(), predictions);
    }

    #[test]
    fn test_validate_rejects_image_count_mismatch() {
        let err = predictions(None, 2, 4, 5).validate(3).unwrap_err();
        assert!(matches!(err, ModelError::InvalidOutput(_)));
    }

    #[test]
    fn test_validate_rejects_inconsistent_resolution() {
        let mut predictions = predictions(None, 2, 4, 5);
        predictions.point_map = zeros(&[2, 4, 6, 3]);
        assert!(predictions.validate(2).is_err());
    }
}
