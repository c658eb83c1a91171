//! Asset registration models: the request sent to the Asset API for one stored
//! object and the per-file result the scan aggregates.

use serde::{Deserialize, Serialize};

use super::object::StoredObject;
use crate::constants::{FALLBACK_CONTENT_TYPE, KEY_SEPARATOR};
use crate::error::CoreError;

/// Body of `POST /assets/create-from-existing`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCreationRequest {
    pub stored_path: String,
    pub file_name: String,
    pub file_type: String,
    pub size_bytes: u64,
    pub owner_uuid: String,
    pub uploader_uuid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flight_uuid: Option<String>,
}

impl AssetCreationRequest {
    /// Build the request for an object found under `dropbox_prefix`.
    ///
    /// The uploading user is the owner: the dropbox is partitioned by user id.
    pub fn from_object(
        object: &StoredObject,
        dropbox_prefix: &str,
        flight_uuid: Option<&str>,
    ) -> Result<Self, CoreError> {
        let owner = owner_from_key(&object.key, dropbox_prefix)?;
        let file_name = object.file_name().to_string();

        Ok(Self {
            stored_path: object.key.clone(),
            file_type: guess_content_type(&file_name),
            file_name,
            size_bytes: object.size,
            owner_uuid: owner.to_string(),
            uploader_uuid: owner.to_string(),
            flight_uuid: flight_uuid.map(String::from),
        })
    }
}

/// Owning user of a dropbox key: the first path segment below the prefix.
///
/// `dropbox/u123/photo.jpg` yields `u123`. A key with no segment after the owner
/// (e.g. `dropbox/bad`) is malformed.
pub fn owner_from_key<'a>(key: &'a str, dropbox_prefix: &str) -> Result<&'a str, CoreError> {
    let root = dropbox_prefix.trim_end_matches(KEY_SEPARATOR);
    let relative = if root.is_empty() {
        key
    } else {
        key.strip_prefix(root)
            .and_then(|rest| rest.strip_prefix(KEY_SEPARATOR))
            .ok_or_else(|| {
                CoreError::malformed_key(key, format!("not under prefix '{}'", dropbox_prefix))
            })?
    };

    let mut segments = relative.split(KEY_SEPARATOR);
    let owner = segments.next().unwrap_or_default();
    if owner.is_empty() {
        return Err(CoreError::malformed_key(key, "empty owner segment"));
    }
    if segments.next().is_none() {
        return Err(CoreError::malformed_key(
            key,
            format!("expected '{}<owner>/<file>'", dropbox_prefix),
        ));
    }

    Ok(owner)
}

/// MIME type guessed from the file extension.
pub fn guess_content_type(file_name: &str) -> String {
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string())
}

/// Outcome of registering one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AssetOutcome {
    Created { asset_uuid: String },
    Failed { error: String },
}

/// Per-file result collected by the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetCreationResult {
    pub key: String,
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: AssetOutcome,
}

impl AssetCreationResult {
    pub fn created(key: &str, asset_uuid: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            file_name: super::object::file_name(key).to_string(),
            outcome: AssetOutcome::Created {
                asset_uuid: asset_uuid.into(),
            },
        }
    }

    pub fn failed(key: &str, error: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            file_name: super::object::file_name(key).to_string(),
            outcome: AssetOutcome::Failed {
                error: error.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, AssetOutcome::Created { .. })
    }

    pub fn asset_uuid(&self) -> Option<&str> {
        match &self.outcome {
            AssetOutcome::Created { asset_uuid } => Some(asset_uuid),
            AssetOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AssetOutcome::Created { .. } => None,
            AssetOutcome::Failed { error } => Some(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_owner_is_second_segment() {
        assert_eq!(
            owner_from_key("dropbox/u123/photo.jpg", "dropbox/").unwrap(),
            "u123"
        );
        assert_eq!(
            owner_from_key("dropbox/u123/2024/flight/photo.jpg", "dropbox/").unwrap(),
            "u123"
        );
    }

    #[test]
    fn test_owner_missing_is_malformed() {
        let err = owner_from_key("dropbox/bad", "dropbox/").unwrap_err();
        assert!(matches!(err, CoreError::MalformedKey { ref key, .. } if key == "dropbox/bad"));

        assert!(owner_from_key("dropbox//photo.jpg", "dropbox/").is_err());
        assert!(owner_from_key("elsewhere/u1/photo.jpg", "dropbox/").is_err());
    }

    #[test]
    fn test_owner_with_nested_prefix() {
        assert_eq!(
            owner_from_key("uploads/dropbox/u9/a.png", "uploads/dropbox").unwrap(),
            "u9"
        );
    }

    #[test]
    fn test_request_from_object() {
        let object = StoredObject::new("dropbox/u123/photo.jpg", 2048, Utc::now());
        let request = AssetCreationRequest::from_object(&object, "dropbox/", None).unwrap();
        assert_eq!(request.stored_path, "dropbox/u123/photo.jpg");
        assert_eq!(request.file_name, "photo.jpg");
        assert_eq!(request.file_type, "image/jpeg");
        assert_eq!(request.size_bytes, 2048);
        assert_eq!(request.owner_uuid, "u123");
        assert_eq!(request.uploader_uuid, "u123");
        assert_eq!(request.flight_uuid, None);
    }

    #[test]
    fn test_request_body_shape() {
        let object = StoredObject::new("dropbox/u1/scan.xyz123", 1, Utc::now());
        let request =
            AssetCreationRequest::from_object(&object, "dropbox/", Some("flight-7")).unwrap();
        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["file_type"], "application/octet-stream");
        assert_eq!(body["flight_uuid"], "flight-7");

        let without_flight = AssetCreationRequest {
            flight_uuid: None,
            ..request
        };
        let body = serde_json::to_value(&without_flight).unwrap();
        assert!(body.get("flight_uuid").is_none());
    }

    #[test]
    fn test_result_serialization() {
        let ok = AssetCreationResult::created("dropbox/u1/a.jpg", "asset-1");
        assert!(ok.is_success());
        assert_eq!(ok.file_name, "a.jpg");
        assert_eq!(ok.asset_uuid(), Some("asset-1"));
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["asset_uuid"], "asset-1");

        let failed = AssetCreationResult::failed("dropbox/u1/b.jpg", "boom");
        assert!(!failed.is_success());
        assert_eq!(failed.error(), Some("boom"));
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["file_name"], "b.jpg");
    }
}
