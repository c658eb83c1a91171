//! Pipeline-level error type.
//!
//! Only fatal conditions travel through [`WorkstreamError`]: per-file failures of the
//! dropbox scan are folded into failed `AssetCreationResult`s and never reach it.

use skystore_api_client::ApiError;
use skystore_core::{CoreError, ErrorMetadata, LogLevel};
use skystore_storage::StorageError;
use thiserror::Error;

use crate::reconstruction::ModelError;

#[derive(Debug, Error)]
pub enum WorkstreamError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Tensor error: {0}")]
    Tensor(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ErrorMetadata for WorkstreamError {
    fn error_code(&self) -> &'static str {
        match self {
            WorkstreamError::Core(e) => e.error_code(),
            WorkstreamError::Storage(e) => e.error_code(),
            WorkstreamError::Api(e) => e.error_code(),
            WorkstreamError::Model(e) => e.error_code(),
            WorkstreamError::Tensor(_) => "TENSOR_ERROR",
            WorkstreamError::InvalidJob(_) => "INVALID_JOB",
            WorkstreamError::Io(_) => "IO_ERROR",
            WorkstreamError::Join(_) => "TASK_JOIN_ERROR",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            WorkstreamError::Core(e) => e.is_recoverable(),
            WorkstreamError::Storage(e) => e.is_recoverable(),
            WorkstreamError::Api(e) => e.is_recoverable(),
            WorkstreamError::Model(e) => e.is_recoverable(),
            WorkstreamError::Io(_) => true,
            WorkstreamError::Tensor(_)
            | WorkstreamError::InvalidJob(_)
            | WorkstreamError::Join(_) => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            WorkstreamError::Core(e) => e.log_level(),
            WorkstreamError::Storage(e) => e.log_level(),
            WorkstreamError::Api(e) => e.log_level(),
            WorkstreamError::Model(e) => e.log_level(),
            WorkstreamError::InvalidJob(_) => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}
