//! Test helpers: seeded local storage and fake collaborators for the pipelines.
//!
//! Run from workspace root: `cargo test -p skystore-workstreams`.

#![allow(dead_code)]

pub mod fakes;

use mockito::{Matcher, Mock, ServerGuard};
use skystore_core::{ScanConfig, StorageBackend, StorageConfig};
use skystore_storage::{LocalStorage, S3Storage, Storage};
use std::sync::Arc;
use tempfile::TempDir;

/// Local storage rooted in a fresh temp dir, holding `keys` (content = key bytes).
pub async fn seeded_storage(keys: &[&str]) -> (TempDir, Arc<LocalStorage>) {
    let dir = TempDir::new().expect("create temp dir");
    let storage = LocalStorage::new(dir.path().join("skystore"), "skystore")
        .await
        .expect("create local storage");

    for key in keys {
        storage
            .upload_with_key(key, key.as_bytes().to_vec(), "application/octet-stream")
            .await
            .expect("seed object");
    }

    (dir, Arc::new(storage))
}

pub fn scan_config(concurrency: usize) -> ScanConfig {
    ScanConfig {
        dropbox_prefix: "dropbox/".to_string(),
        concurrency,
        flight_uuid: None,
    }
}

/// S3 storage against a mock S3 endpoint, bucket `skystore`.
pub fn mocked_s3_storage(server: &ServerGuard) -> Arc<S3Storage> {
    let config = StorageConfig {
        backend: StorageBackend::S3,
        bucket: "skystore".to_string(),
        region: "us-east-1".to_string(),
        endpoint: Some(server.url()),
        access_key_id: Some("minioadmin".to_string()),
        secret_access_key: Some("minioadmin".to_string()),
        local_storage_path: None,
    };
    Arc::new(S3Storage::new(&config).expect("create s3 storage"))
}

/// ListObjectsV2 response body. Keys ending in `/` are zero-byte markers, other
/// objects are 16 bytes.
pub fn list_page(keys: &[&str], common_prefixes: &[&str], next_token: Option<&str>) -> String {
    let truncation = match next_token {
        Some(token) => format!(
            "<IsTruncated>true</IsTruncated><NextContinuationToken>{}</NextContinuationToken>",
            token
        ),
        None => "<IsTruncated>false</IsTruncated>".to_string(),
    };
    let contents: String = keys
        .iter()
        .map(|key| {
            format!(
                "<Contents><Key>{}</Key><LastModified>2024-05-01T12:00:00.000Z</LastModified>\
                 <ETag>\"etag\"</ETag><Size>{}</Size></Contents>",
                key,
                if key.ends_with('/') { 0 } else { 16 }
            )
        })
        .collect();
    let prefixes: String = common_prefixes
        .iter()
        .map(|prefix| format!("<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>", prefix))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/"><Name>skystore</Name>{}{}{}</ListBucketResult>"#,
        truncation, contents, prefixes
    )
}

/// Mock one delimited ListObjectsV2 page of `prefix`, served once.
pub async fn mock_listing(
    server: &mut ServerGuard,
    prefix: &str,
    extra_query: &[(&str, &str)],
    body: String,
) -> Mock {
    let mut query = vec![
        Matcher::UrlEncoded("list-type".into(), "2".into()),
        Matcher::UrlEncoded("delimiter".into(), "/".into()),
        Matcher::UrlEncoded("prefix".into(), prefix.into()),
    ];
    query.extend(
        extra_query
            .iter()
            .map(|(field, value)| Matcher::UrlEncoded(field.to_string(), value.to_string())),
    );

    server
        .mock("GET", "/skystore")
        .match_query(Matcher::AllOf(query))
        .with_status(200)
        .with_header("content-type", "application/xml")
        .with_body(body)
        .expect(1)
        .create_async()
        .await
}
