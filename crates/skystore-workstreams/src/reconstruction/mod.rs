//! Multi-view reconstruction: download a batch of images, run the reconstruction model
//! over them, derive the final point cloud and upload every predicted tensor.

pub mod geometry;
pub mod http_model;
pub mod model;
pub mod pipeline;
pub mod tensors;

pub use http_model::HttpReconstructionModel;
pub use model::{ModelError, ReconstructionModel, ScenePredictions};
pub use pipeline::ReconstructionPipeline;
