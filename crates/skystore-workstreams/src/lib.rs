//! SkyStore workstreams.
//!
//! Two pipelines operate on the same bucket:
//! - the dropbox scan ([`dropbox::DropboxScanner`]) registers every file uploaded under
//!   `dropbox/{user_id}/` as an asset through the Asset API;
//! - the reconstruction pipeline ([`reconstruction::ReconstructionPipeline`]) runs a
//!   multi-view reconstruction model over a batch of images and uploads the predicted
//!   tensors next to them.
//!
//! [`bootstrap`] holds the bucket preparation helpers used by local deployments.

pub mod bootstrap;
pub mod dropbox;
pub mod error;
pub mod reconstruction;
pub mod retry;

pub use dropbox::{AssetRegistrar, AssetRegistry, DropboxScanner, ObjectLister};
pub use error::WorkstreamError;
pub use reconstruction::{
    HttpReconstructionModel, ModelError, ReconstructionModel, ReconstructionPipeline,
    ScenePredictions,
};
pub use retry::RetryPolicy;
