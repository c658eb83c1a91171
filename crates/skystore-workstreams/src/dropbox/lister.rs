use futures::{future, Stream, StreamExt};
use skystore_core::constants::{KEY_SEPARATOR, PLACEHOLDER_SUFFIX, RESERVED_SEGMENTS};
use skystore_core::models::StoredObject;
use skystore_storage::{Storage, StorageError, StorageResult};
use std::pin::pin;
use std::sync::Arc;

/// Whether a listed key is a file awaiting registration.
///
/// Directory markers (trailing `/`), `.keep` placeholders and anything under a
/// `_failed/` or `_skipped/` sub-path are excluded.
pub fn is_candidate_key(key: &str) -> bool {
    !key.ends_with(KEY_SEPARATOR) && !key.ends_with(PLACEHOLDER_SUFFIX) && !is_set_aside(key)
}

fn is_set_aside(key: &str) -> bool {
    RESERVED_SEGMENTS
        .iter()
        .any(|segment| key.contains(segment))
}

/// Result of draining a listing.
#[derive(Debug, Default)]
pub struct Listing {
    pub objects: Vec<StoredObject>,
    /// Keys the storage backend could not address, with the reason.
    pub unreadable: Vec<(String, String)>,
}

impl Listing {
    /// Files seen, registrable or not.
    pub fn len(&self) -> usize {
        self.objects.len() + self.unreadable.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lists the registrable objects under a prefix.
#[derive(Clone)]
pub struct ObjectLister {
    storage: Arc<dyn Storage>,
    prefix: String,
}

impl ObjectLister {
    pub fn new(storage: Arc<dyn Storage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Lazy stream of candidate objects.
    ///
    /// Unaddressable keys outside `_failed/` and `_skipped/` come through as
    /// `InvalidKey` items. Other storage errors are passed through untouched.
    pub fn stream(&self) -> impl Stream<Item = StorageResult<StoredObject>> + Send + 'static {
        self.storage.list(&self.prefix).filter(|item| {
            future::ready(match item {
                Ok(object) => is_candidate_key(&object.key),
                Err(StorageError::InvalidKey(key)) => !is_set_aside(key),
                Err(_) => true,
            })
        })
    }

    /// Drain the listing. Unreadable keys are collected; any other storage error
    /// aborts it.
    pub async fn collect(&self) -> StorageResult<Listing> {
        let start = std::time::Instant::now();
        let mut listing = Listing::default();
        let mut stream = pin!(self.stream());

        while let Some(item) = stream.next().await {
            match item {
                Ok(object) => listing.objects.push(object),
                Err(StorageError::InvalidKey(key)) => {
                    let reason = StorageError::InvalidKey(key.clone()).to_string();
                    tracing::warn!(key = %key, "Dropbox file cannot be read");
                    listing.unreadable.push((key, reason));
                }
                Err(e) => return Err(e),
            }
        }

        tracing::info!(
            bucket = %self.storage.bucket(),
            prefix = %self.prefix,
            files = listing.objects.len(),
            unreadable = listing.unreadable.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Listed dropbox files"
        );

        Ok(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_filter() {
        assert!(is_candidate_key("dropbox/u123/photo.jpg"));
        assert!(is_candidate_key("dropbox/u123/sub/photo.jpg"));
        assert!(is_candidate_key("dropbox/u123/failed_photo.jpg"));

        assert!(!is_candidate_key("dropbox/.keep"));
        assert!(!is_candidate_key("dropbox/u123/.keep"));
        assert!(!is_candidate_key("dropbox/u123/"));
        assert!(!is_candidate_key("dropbox/u123/_failed/photo.jpg"));
        assert!(!is_candidate_key("dropbox/u123/_skipped/photo.jpg"));
    }

    #[test]
    fn test_keep_suffix_needs_separator() {
        // Only a `.keep` path segment is a placeholder.
        assert!(is_candidate_key("dropbox/u123/photo.keep"));
    }

    #[test]
    fn test_listing_counts_unreadable_keys() {
        let mut listing = Listing::default();
        assert!(listing.is_empty());

        listing.unreadable.push((
            "dropbox/u1//".to_string(),
            "Invalid storage key: dropbox/u1//".to_string(),
        ));
        assert!(!listing.is_empty());
        assert_eq!(listing.len(), 1);
    }
}
