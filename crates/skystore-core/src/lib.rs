//! SkyStore Core Library
//!
//! This crate provides the domain models, error types, configuration and constants
//! shared by the SkyStore workstream crates (storage, API client, pipelines, CLI).

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{
    ApiConfig, ReconstructionConfig, RetryConfig, ScanConfig, StorageConfig, WorkstreamConfig,
};
pub use error::{CoreError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
// Note: Storage, StorageError, StorageResult live in the skystore-storage crate
