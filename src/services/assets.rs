//! Asset host client: fetching source images and persisting composites
//!
//! Fetches surface the HTTP status so the compositor can tell a missing
//! background from a network failure. Uploads go to a Cloudinary-style host
//! with signed parameters and return the public `secure_url`.

use crate::{
    config::AssetHostConfig,
    error::{ComposeError, Result},
};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Why a fetch did not produce bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    /// HTTP status when the host answered, `None` for transport failures
    pub status: Option<u16>,
    pub message: String,
}

impl FetchFailure {
    pub fn status(status: u16, url: &str) -> Self {
        Self {
            status: Some(status),
            message: format!("HTTP {} for {}", status, url),
        }
    }

    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Encoded format of a persisted asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetFormat {
    Png,
}

impl AssetFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
        }
    }
}

/// Reads binary assets by URL
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Fetch the bytes behind `url`
    ///
    /// # Errors
    /// - Transport failure or non-success HTTP status
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure>;
}

/// Persists binary assets and hands back a stable public URL
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Upload `bytes` and return the public URL
    ///
    /// # Errors
    /// - `ComposeError::Persist` when the host rejects or cannot be reached
    async fn upload(&self, bytes: &[u8], format: AssetFormat) -> Result<String>;
}

/// Plain HTTP(S) fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher with the given request timeout
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bgcompose/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ComposeError::internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    #[must_use]
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, FetchFailure> {
        log::debug!("Fetching asset: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchFailure::transport(format!("Failed to request {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::status(status.as_u16(), url));
        }

        let bytes = response.bytes().await.map_err(|e| {
            FetchFailure::transport(format!("Failed to read body of {}: {}", url, e))
        })?;

        log::debug!("Fetched {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// Signed-upload client for a Cloudinary-style content host
#[derive(Debug, Clone)]
pub struct CloudinaryStore {
    client: Client,
    config: AssetHostConfig,
}

impl CloudinaryStore {
    /// Create a store client
    ///
    /// # Errors
    /// - Missing cloud name, key or secret
    /// - Failed to create HTTP client
    pub fn new(config: AssetHostConfig) -> Result<Self> {
        if config.cloud_name.is_empty() || config.api_key.is_empty() || config.api_secret.is_empty()
        {
            return Err(ComposeError::validation(
                "Asset host requires cloud name, API key and API secret",
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                ComposeError::internal(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    /// Signature over the signed parameters: sorted `key=value` pairs joined
    /// with `&`, followed by the API secret, SHA-256 hex encoded
    fn sign(params: &[(&str, String)], secret: &str) -> String {
        let mut sorted: Vec<&(&str, String)> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let joined = sorted
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        format!("{:x}", Sha256::digest(format!("{}{}", joined, secret).as_bytes()))
    }
}

#[async_trait]
impl AssetStore for CloudinaryStore {
    async fn upload(&self, bytes: &[u8], format: AssetFormat) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp().to_string();

        let mut signed: Vec<(&str, String)> = vec![
            ("format", format.extension().to_string()),
            ("timestamp", timestamp),
        ];
        if let Some(folder) = &self.config.folder {
            signed.push(("folder", folder.clone()));
        }
        let signature = Self::sign(&signed, &self.config.api_secret);

        let data_uri = format!(
            "data:{};base64,{}",
            format.mime_type(),
            base64::engine::general_purpose::STANDARD.encode(bytes)
        );

        let mut form = signed;
        form.push(("file", data_uri));
        form.push(("api_key", self.config.api_key.clone()));
        form.push(("signature", signature));
        form.push(("signature_algorithm", "sha256".to_string()));

        let response = self
            .client
            .post(self.config.upload_url())
            .form(&form)
            .send()
            .await
            .map_err(|e| ComposeError::persist(format!("Upload request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Asset host rejected upload");
            return Err(ComposeError::persist(format!(
                "Asset host answered HTTP {}",
                status
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| ComposeError::persist(format!("Malformed upload response: {}", e)))?;

        tracing::debug!(url = %uploaded.secure_url, size = bytes.len(), "Composite uploaded");
        Ok(uploaded.secure_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_is_order_independent() {
        let a = CloudinaryStore::sign(
            &[
                ("timestamp", "1700000000".to_string()),
                ("format", "png".to_string()),
            ],
            "secret",
        );
        let b = CloudinaryStore::sign(
            &[
                ("format", "png".to_string()),
                ("timestamp", "1700000000".to_string()),
            ],
            "secret",
        );
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("timestamp", "1".to_string())];
        assert_ne!(
            CloudinaryStore::sign(&params, "one"),
            CloudinaryStore::sign(&params, "two")
        );
    }

    #[test]
    fn test_store_requires_credentials() {
        let err = CloudinaryStore::new(AssetHostConfig::default()).unwrap_err();
        assert!(matches!(err, ComposeError::Validation(_)));
    }

    #[test]
    fn test_fetch_failure_display() {
        let failure = FetchFailure::status(404, "https://cdn.test/bg.png");
        assert_eq!(failure.status, Some(404));
        assert_eq!(failure.to_string(), "HTTP 404 for https://cdn.test/bg.png");
        assert_eq!(AssetFormat::Png.mime_type(), "image/png");
    }
}
