//! HTTP client for the SkyStore Asset API.
//!
//! Provides a minimal client with bearer or API-key auth, a JSON POST helper, and the
//! domain call used by the dropbox scan (`create_asset_from_existing`). Errors carry
//! enough classification for the caller's retry policy to tell transient failures
//! (transport, timeout, 429, 5xx) from permanent ones.

pub mod api;

use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use skystore_core::{ApiConfig, ErrorMetadata, LogLevel};
use std::time::Duration;
use thiserror::Error;

/// Authentication strategy for the API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Failed to create HTTP client: {0}")]
    ClientBuild(String),

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse response as JSON: {0}")]
    Decode(String),

    #[error("API response did not include an asset uuid: {0}")]
    MissingAssetId(String),
}

impl ApiError {
    /// HTTP status of the failed call, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl ErrorMetadata for ApiError {
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::ClientBuild(_) => "API_CLIENT_BUILD",
            ApiError::Transport(_) => "API_TRANSPORT",
            ApiError::Timeout(_) => "API_TIMEOUT",
            ApiError::Status { .. } => "API_STATUS",
            ApiError::Decode(_) => "API_DECODE",
            ApiError::MissingAssetId(_) => "API_MISSING_ASSET_ID",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout(_) => true,
            ApiError::Status { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            ApiError::ClientBuild(_) | ApiError::Decode(_) | ApiError::MissingAssetId(_) => false,
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            ApiError::ClientBuild(_) => LogLevel::Error,
            _ => LogLevel::Warn,
        }
    }
}

/// HTTP client for the Asset API with configurable auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: Auth, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            timeout,
        })
    }

    /// Client authenticated with the configured bearer token.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            &config.base_url,
            Auth::Bearer(config.token.clone()),
            config.timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Auth::Bearer(token) => request.header("Authorization", format!("Bearer {}", token)),
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout(self.timeout)
        } else {
            ApiError::Transport(error.to_string())
        }
    }

    /// POST JSON body and deserialize response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let url = self.build_url(path);
        let request = self.client.post(&url).json(body);
        let request = self.apply_auth(request);

        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: if text.is_empty() {
                    "Unknown error".to_string()
                } else {
                    text
                },
            });
        }

        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
