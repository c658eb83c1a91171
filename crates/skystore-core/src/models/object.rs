//! Stored object model: one entry produced by listing object storage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::KEY_SEPARATOR;

/// An object found in storage. Immutable; only lives for the duration of a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

impl StoredObject {
    pub fn new(key: impl Into<String>, size: u64, last_modified: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified,
        }
    }

    /// Last path segment of the key.
    pub fn file_name(&self) -> &str {
        file_name(&self.key)
    }
}

/// Last path segment of an object key (the key itself when it has no separator).
pub fn file_name(key: &str) -> &str {
    key.rsplit(KEY_SEPARATOR).next().unwrap_or(key)
}
