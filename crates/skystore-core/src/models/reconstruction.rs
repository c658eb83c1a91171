//! Reconstruction job models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One run of the image-reconstruction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconstructionJob {
    /// Keys of the input images, in the order the model receives them
    pub image_keys: Vec<String>,
    /// Prefix every output tensor is uploaded under
    pub output_prefix: String,
    /// Take the final point cloud from the point head instead of unprojecting depth
    #[serde(default)]
    pub use_point_map: bool,
}

/// Where each output tensor was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionReport {
    pub bucket: String,
    pub images_processed: usize,
    /// Tensor name to object key
    pub outputs: BTreeMap<String, String>,
    pub duration_secs: f64,
}
