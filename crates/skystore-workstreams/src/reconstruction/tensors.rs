//! Output tensors: naming, `.npy` serialization and object keys.

use ndarray::ArrayD;
use ndarray_npy::{ReadNpyExt, WriteNpyExt};
use skystore_storage::keys::join_key;

use super::geometry::final_point_cloud;
use super::model::ScenePredictions;
use crate::error::WorkstreamError;

/// Content type of uploaded tensors.
pub const NPY_CONTENT_TYPE: &str = "application/octet-stream";

/// Every tensor the pipeline uploads, in upload order.
pub const OUTPUT_TENSORS: [&str; 8] = [
    "extrinsic",
    "intrinsic",
    "depth_map",
    "depth_conf",
    "point_map",
    "point_conf",
    "final_point_map",
    "final_point_conf",
];

/// Object key of tensor `name` under `output_prefix`.
pub fn tensor_key(output_prefix: &str, name: &str) -> String {
    join_key(output_prefix, &format!("{}.npy", name))
}

/// Name every output tensor, deriving the final point cloud.
pub fn prepare_outputs(
    predictions: ScenePredictions,
    use_point_map: bool,
) -> Result<Vec<(&'static str, ArrayD<f32>)>, WorkstreamError> {
    let (final_point_map, final_point_conf) = final_point_cloud(&predictions, use_point_map)?;
    let ScenePredictions {
        extrinsic,
        intrinsic,
        depth_map,
        depth_conf,
        point_map,
        point_conf,
    } = predictions;

    Ok(OUTPUT_TENSORS
        .into_iter()
        .zip([
            extrinsic,
            intrinsic,
            depth_map,
            depth_conf,
            point_map,
            point_conf,
            final_point_map,
            final_point_conf,
        ])
        .collect())
}

/// Serialize one tensor as a NumPy `.npy` file.
pub fn encode_npy(tensor: &ArrayD<f32>) -> Result<Vec<u8>, WorkstreamError> {
    let mut buffer = Vec::new();
    tensor
        .write_npy(&mut buffer)
        .map_err(|e| WorkstreamError::Tensor(e.to_string()))?;
    Ok(buffer)
}

pub fn decode_npy(bytes: &[u8]) -> Result<ArrayD<f32>, WorkstreamError> {
    ArrayD::<f32>::read_npy(bytes).map_err(|e| WorkstreamError::Tensor(e.to_string()))
}

/// Prepare and serialize every output. CPU-bound; run it off the async runtime.
pub fn encode_outputs(
    predictions: ScenePredictions,
    use_point_map: bool,
) -> Result<Vec<(&'static str, Vec<u8>)>, WorkstreamError> {
    prepare_outputs(predictions, use_point_map)?
        .into_iter()
        .map(|(name, tensor)| encode_npy(&tensor).map(|bytes| (name, bytes)))
        .collect()
}
