//! SkyStore Storage Library
//!
//! This crate provides the storage abstraction used by the workstreams and its
//! implementations for S3-compatible object stores (MinIO in development) and the
//! local filesystem.
//!
//! # Key format
//!
//! Keys are `/`-separated paths relative to the bucket root, e.g.
//! `dropbox/{user_id}/{filename}` or `vggt_results/{run}/{tensor}.npy`. Keys must not
//! contain `..` segments or a leading `/`. Joining helpers live in the `keys` module so
//! all callers build keys the same way.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use skystore_core::StorageBackend;
pub use traits::{ObjectStream, Storage, StorageError, StorageResult};
